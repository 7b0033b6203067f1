use std::path::PathBuf;
use std::process::Command;

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::ExtractError;

/// Recognizes text in a bitmap.
pub trait OcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError>;
}

/// Runs the `tesseract` command line tool on a scoped temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
    language: String,
}

impl TesseractEngine {
    #[must_use]
    pub fn new(command: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError> {
        let mut input = tempfile::Builder::new()
            .prefix("doctext-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.write_to(input.as_file_mut(), ImageFormat::Png)?;

        debug!(
            width = image.width(),
            height = image.height(),
            language = %self.language,
            "running tesseract"
        );
        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|err| {
                ExtractError::Ocr(format!("failed to run {}: {err}", self.command.display()))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(clean_output(&output.stdout))
    }
}

/// Tesseract terminates each page with a form feed.
fn clean_output(stdout: &[u8]) -> String {
    let text = String::from_utf8_lossy(stdout);
    text.strip_suffix('\u{c}').unwrap_or(&text).to_string()
}

#[cfg(test)]
mod tests {
    use super::{OcrEngine, TesseractEngine, clean_output};
    use crate::error::ExtractError;

    #[test]
    fn strips_trailing_form_feed_only() {
        assert_eq!(clean_output(b"Scanned text\n\x0c"), "Scanned text\n");
        assert_eq!(clean_output(b"plain"), "plain");
    }

    #[test]
    fn missing_binary_is_an_ocr_error() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary", "eng");
        let image = image::DynamicImage::new_luma8(4, 4);
        let err = engine.recognize(&image).expect_err("binary does not exist");
        assert!(matches!(err, ExtractError::Ocr(message) if message.contains("failed to run")));
    }
}
