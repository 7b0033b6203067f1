use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::docx::extract_docx_text;
use crate::error::ExtractError;
use crate::options::ExtractOptions;
use crate::pdf_extractor::PageLayoutExtractor;
use crate::rtf::extract_rtf_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Doc,
    Docx,
    Rtf,
    Pdf,
}

impl DocumentKind {
    /// Kind named by the file extension, compared case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "rtf" => Some(Self::Rtf),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Something that turns a document file into plain text.
pub trait TextSource {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocxSource;

impl TextSource for DocxSource {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        extract_docx_text(path)
    }
}

/// Legacy Word files, converted to DOCX with LibreOffice first.
#[derive(Debug, Clone)]
pub struct DocSource {
    soffice: PathBuf,
}

impl DocSource {
    #[must_use]
    pub fn new(soffice: impl Into<PathBuf>) -> Self {
        Self {
            soffice: soffice.into(),
        }
    }
}

impl TextSource for DocSource {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let outdir = tempfile::tempdir()?;
        debug!(path = %path.display(), "converting DOC to DOCX");
        let output = Command::new(&self.soffice)
            .arg("--headless")
            .arg("--convert-to")
            .arg("docx")
            .arg("--outdir")
            .arg(outdir.path())
            .arg(path)
            .output()
            .map_err(|err| {
                ExtractError::Conversion(format!("failed to run {}: {err}", self.soffice.display()))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Conversion(format!(
                "{} exited with {}: {}",
                self.soffice.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stem = path.file_stem().ok_or_else(|| {
            ExtractError::Conversion(format!("{} has no file name", path.display()))
        })?;
        let mut name = stem.to_os_string();
        name.push(".docx");
        let converted = outdir.path().join(name);
        if !converted.is_file() {
            return Err(ExtractError::Conversion(format!(
                "{} produced no DOCX for {}",
                self.soffice.display(),
                path.display()
            )));
        }

        extract_docx_text(&converted)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RtfSource;

impl TextSource for RtfSource {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        extract_rtf_text(path)
    }
}

impl TextSource for PageLayoutExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        PageLayoutExtractor::extract(self, path).map(|result| result.text)
    }
}

/// Routes a path to the text source for its extension.
pub struct DocumentTextExtractor {
    doc: DocSource,
    docx: DocxSource,
    rtf: RtfSource,
    pdf: PageLayoutExtractor,
}

impl DocumentTextExtractor {
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            doc: DocSource::new(&options.soffice_cmd),
            docx: DocxSource,
            rtf: RtfSource,
            pdf: PageLayoutExtractor::new(options),
        }
    }

    /// Replaces the PDF extractor, e.g. one with a custom OCR engine.
    #[must_use]
    pub fn with_pdf_extractor(mut self, pdf: PageLayoutExtractor) -> Self {
        self.pdf = pdf;
        self
    }

    fn source(&self, kind: DocumentKind) -> &dyn TextSource {
        match kind {
            DocumentKind::Doc => &self.doc,
            DocumentKind::Docx => &self.docx,
            DocumentKind::Rtf => &self.rtf,
            DocumentKind::Pdf => &self.pdf,
        }
    }

    /// Text of the document, or `None` when its extension is not one of
    /// `doc`, `docx`, `rtf` or `pdf`.
    pub fn extract(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        let Some(kind) = DocumentKind::from_path(path) else {
            debug!(path = %path.display(), "unrecognized document extension");
            return Ok(None);
        };

        info!(path = %path.display(), ?kind, "extracting document text");
        self.source(kind).extract(path).map(Some)
    }
}
