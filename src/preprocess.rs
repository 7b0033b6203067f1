use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use rust_stemmers::{Algorithm, Stemmer};
use unicode_segmentation::UnicodeSegmentation;

use crate::options::{Language, PreprocessOptions};
use crate::stopwords;

fn algorithm(language: Language) -> Algorithm {
    match language {
        Language::English => Algorithm::English,
        Language::Russian => Algorithm::Russian,
    }
}

/// Stemmed words of one text, plus the character length of the raw input
/// used by [`ProcessedText::weights`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedText {
    stems: Vec<String>,
    text_chars: usize,
}

impl ProcessedText {
    #[must_use]
    pub fn stems(&self) -> &[String] {
        &self.stems
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    /// `count / n * ln(text_chars / count)` for every distinct stem, where `n`
    /// is the number of stems and `text_chars` the raw text length.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn weights(&self) -> BTreeMap<String, f64> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for stem in &self.stems {
            *counts.entry(stem.as_str()).or_default() += 1;
        }

        let total = self.stems.len() as f64;
        let text_chars = self.text_chars as f64;
        counts
            .into_iter()
            .map(|(stem, count)| {
                let count = count as f64;
                (stem.to_string(), count / total * (text_chars / count).ln())
            })
            .collect()
    }
}

impl fmt::Display for ProcessedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stems.join(" "))
    }
}

/// Lowercases, strips punctuation and stop words, then stems.
pub struct TextPreprocessor {
    stemmer: Stemmer,
    stop_words: HashSet<String>,
}

impl TextPreprocessor {
    #[must_use]
    pub fn new(options: &PreprocessOptions) -> Self {
        let stop_words = stopwords::builtin(options.language)
            .iter()
            .map(|word| (*word).to_string())
            .chain(options.extra_stop_words.iter().map(|word| word.to_lowercase()))
            .collect();
        Self::with_stop_words(options.language, stop_words)
    }

    #[must_use]
    pub fn with_stop_words(language: Language, stop_words: HashSet<String>) -> Self {
        Self {
            stemmer: Stemmer::create(algorithm(language)),
            stop_words,
        }
    }

    #[must_use]
    pub fn clean_text(&self, text: &str) -> Vec<String> {
        let lowered = text
            .to_lowercase()
            .chars()
            .filter(|ch| !ch.is_ascii_punctuation())
            .collect::<String>();

        lowered
            .unicode_words()
            .filter(|word| !self.stop_words.contains(*word))
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub fn stem_words(&self, words: &[String]) -> Vec<String> {
        words
            .iter()
            .map(|word| self.stemmer.stem(word).into_owned())
            .collect()
    }

    #[must_use]
    pub fn preprocess(&self, text: &str) -> ProcessedText {
        let words = self.clean_text(text);
        ProcessedText {
            stems: self.stem_words(&words),
            text_chars: text.chars().count(),
        }
    }
}
