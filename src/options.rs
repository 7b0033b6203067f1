use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

/// Where image regions get their pixels from before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBackend {
    /// Decode embedded image XObjects in memory, crop-render with `pdftoppm` otherwise.
    Auto,
    Embedded,
    Pdftoppm,
}

impl FromStr for RenderBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "embedded" => Ok(Self::Embedded),
            "pdftoppm" => Ok(Self::Pdftoppm),
            other => Err(format!(
                "unknown renderer '{other}', expected auto, embedded or pdftoppm"
            )),
        }
    }
}

/// Language used for stemming and the built-in stop-word list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Russian,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(Self::English),
            "russian" | "ru" => Ok(Self::Russian),
            other => Err(format!(
                "unsupported language '{other}', expected english or russian"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl PageSelection {
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut pages = BTreeSet::new();
        for token in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range start: '{start}'"))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range end: '{end}'"))?;
                if start == 0 || end == 0 {
                    return Err("pages are 1-based".to_string());
                }
                if end < start {
                    return Err(format!(
                        "invalid range '{token}': end is smaller than start"
                    ));
                }
                pages.extend(start..=end);
            } else {
                let page: u32 = token
                    .parse()
                    .map_err(|_| format!("invalid page number: '{token}'"))?;
                if page == 0 {
                    return Err("pages are 1-based".to_string());
                }
                pages.insert(page);
            }
        }

        if pages.is_empty() {
            return Err("page selection cannot be empty".to_string());
        }

        Ok(Self { pages })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    pub pages: Option<PageSelection>,
    /// Tesseract language code, e.g. `eng` or `rus+eng`.
    pub ocr_language: String,
    pub dpi: u32,
    pub render_backend: RenderBackend,
    pub tesseract_cmd: PathBuf,
    pub pdftoppm_cmd: PathBuf,
    pub soffice_cmd: PathBuf,
    /// Drop text lines that parse as a bare integer (page numbers, but also
    /// any other numeric-only line).
    pub drop_numeric_lines: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pages: None,
            ocr_language: "eng".to_string(),
            dpi: 300,
            render_backend: RenderBackend::Auto,
            tesseract_cmd: PathBuf::from("tesseract"),
            pdftoppm_cmd: PathBuf::from("pdftoppm"),
            soffice_cmd: PathBuf::from("soffice"),
            drop_numeric_lines: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub language: Language,
    pub extra_stop_words: Vec<String>,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            language: Language::Russian,
            extra_stop_words: Vec::new(),
        }
    }
}
