use std::fs;
use std::path::Path;

use rtf_parser::RtfDocument;

use crate::error::ExtractError;

/// Plain text of an RTF document: the text of its body blocks, concatenated.
pub(crate) fn rtf_text(source: &str) -> Result<String, ExtractError> {
    let document =
        RtfDocument::try_from(source).map_err(|err| ExtractError::Rtf(err.to_string()))?;
    Ok(document
        .body
        .iter()
        .map(|block| block.text.as_str())
        .collect())
}

pub(crate) fn extract_rtf_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path)?;
    let source = String::from_utf8(bytes)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned());
    rtf_text(&source)
}
