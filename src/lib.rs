mod csv_out;
mod document;
mod docx;
mod error;
mod geometry;
mod layout;
mod model;
mod ocr;
mod options;
mod pdf_extractor;
mod pdf_reader;
mod preprocess;
mod raster;
mod rtf;
mod stopwords;
mod table_detect;
mod table_parse;
mod warning;

use std::path::Path;

pub use csv_out::{PROCESSED_COLUMN, PreprocessReport};
pub use document::{
    DocSource, DocumentKind, DocumentTextExtractor, DocxSource, RtfSource, TextSource,
};
pub use error::ExtractError;
pub use geometry::BBox;
pub use model::{
    ElementKind, ExtractionResult, Fragment, Page, PageContent, PositionedElement, Ruling,
    TableRegion, XObjectKind, XObjectRef,
};
pub use ocr::{OcrEngine, TesseractEngine};
pub use options::{ExtractOptions, Language, PageSelection, PreprocessOptions, RenderBackend};
pub use pdf_extractor::PageLayoutExtractor;
pub use preprocess::{ProcessedText, TextPreprocessor};
pub use raster::{
    EmbeddedImageRasterizer, PdftoppmRasterizer, RasterChain, RasterRequest, Rasterizer,
};
pub use stopwords::{builtin as builtin_stop_words, load_stop_words};
pub use table_parse::table_to_string;
pub use warning::{ExtractWarning, WarningCode};

/// Extracts the reading-order text of a PDF, with per-page fragments and
/// warnings.
pub fn extract_pdf_text(
    input_pdf: &Path,
    options: &ExtractOptions,
) -> Result<ExtractionResult, ExtractError> {
    PageLayoutExtractor::new(options.clone()).extract(input_pdf)
}

/// Extracts the text of a DOC, DOCX, RTF or PDF file. Returns `Ok(None)` for
/// any other extension.
pub fn extract_document_text(
    input: &Path,
    options: &ExtractOptions,
) -> Result<Option<String>, ExtractError> {
    DocumentTextExtractor::new(options.clone()).extract(input)
}

/// Appends a `processed` column with the preprocessed text of `column` to a
/// CSV file, optionally writing per-row weights as JSON.
pub fn preprocess_csv(
    input_csv: &Path,
    output_csv: &Path,
    column: &str,
    options: &PreprocessOptions,
    weights_json: Option<&Path>,
) -> Result<PreprocessReport, ExtractError> {
    let preprocessor = TextPreprocessor::new(options);
    csv_out::preprocess_csv_file(input_csv, output_csv, column, &preprocessor, weights_json)
}
