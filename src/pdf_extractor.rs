use std::path::Path;

use lopdf::Document;
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::layout::{Step, sort_reading_order, walk};
use crate::model::{
    ElementKind, ExtractionResult, Fragment, Page, PageContent, PositionedElement, TableRegion,
};
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::options::ExtractOptions;
use crate::pdf_reader::{load_document, read_page, select_pages};
use crate::raster::{RasterChain, RasterRequest, Rasterizer};
use crate::table_detect::detect_tables;
use crate::table_parse::table_to_string;
use crate::warning::{ExtractWarning, WarningCode};

/// Reconstructs the reading order of PDF pages that mix text, ruled tables
/// and images, producing one string per document.
pub struct PageLayoutExtractor {
    options: ExtractOptions,
    rasterizer: Box<dyn Rasterizer>,
    ocr: Box<dyn OcrEngine>,
}

impl PageLayoutExtractor {
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        let rasterizer = Box::new(RasterChain::from_options(&options));
        let ocr = Box::new(TesseractEngine::new(
            &options.tesseract_cmd,
            options.ocr_language.clone(),
        ));
        Self {
            options,
            rasterizer,
            ocr,
        }
    }

    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: Box<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    #[must_use]
    pub fn with_ocr_engine(mut self, ocr: Box<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractError> {
        if self.options.dpi == 0 {
            return Err(ExtractError::InvalidOption(
                "dpi must be greater than zero".to_string(),
            ));
        }

        let document = load_document(path)?;
        let pages = select_pages(&document, self.options.pages.as_ref())?;
        info!(path = %path.display(), pages = pages.len(), "extracting PDF text");

        let mut warnings = Vec::new();
        let mut contents = Vec::with_capacity(pages.len());
        for (page_number, page_id) in pages {
            let Some(page) = read_page(&document, page_number, page_id) else {
                warn!(page = page_number, "page content stream is unreadable");
                warnings.push(
                    ExtractWarning::new(
                        WarningCode::PageContentUnreadable,
                        "page content stream could not be decoded",
                    )
                    .with_page(page_number),
                );
                contents.push(PageContent {
                    page_number,
                    fragments: Vec::new(),
                });
                continue;
            };
            contents.push(self.extract_page(&document, path, page, &mut warnings)?);
        }

        Ok(ExtractionResult::from_pages(contents, warnings))
    }

    fn extract_page(
        &self,
        document: &Document,
        path: &Path,
        mut page: Page,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<PageContent, ExtractError> {
        let tables = detect_tables(&page);
        sort_reading_order(&mut page.elements);
        let layout = walk(&page.elements, &tables, self.options.drop_numeric_lines);
        debug!(
            page = page.page_number,
            elements = page.elements.len(),
            tables = tables.len(),
            "walking page"
        );

        let mut fragments = Vec::new();
        for step in layout.steps {
            match step {
                Step::EmitText(position) => {
                    if let Some(text) = element_text(&page.elements[position]) {
                        fragments.push(Fragment::Text(text.to_string()));
                    }
                }
                Step::DropNumeric(position) => {
                    debug!(
                        page = page.page_number,
                        text = element_text(&page.elements[position]).unwrap_or_default(),
                        "dropping numeric line"
                    );
                }
                Step::SkipInTable(position) => {
                    debug!(
                        page = page.page_number,
                        text = element_text(&page.elements[position]).unwrap_or_default(),
                        "text covered by table"
                    );
                }
                Step::EmitTable(index) => {
                    fragments.push(Fragment::Table(table_to_string(&tables[index])));
                }
                Step::Ocr(position) => {
                    let element = &page.elements[position];
                    if let Some(text) =
                        self.recognize_image(document, path, &page, element, warnings)?
                        && !text.is_empty()
                    {
                        fragments.push(Fragment::ImageText(text));
                    }
                }
            }
        }

        report_unplaced(&page, &tables, &layout.unplaced, warnings);

        Ok(PageContent {
            page_number: page.page_number,
            fragments,
        })
    }

    /// Rasterizes and OCRs one image element. A region no backend could
    /// render is skipped with a warning; OCR failures are fatal.
    fn recognize_image(
        &self,
        document: &Document,
        path: &Path,
        page: &Page,
        element: &PositionedElement,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Option<String>, ExtractError> {
        let ElementKind::Image(xobject) = &element.kind else {
            return Ok(None);
        };

        let request = RasterRequest {
            document,
            path,
            page,
            bbox: element.bbox,
            xobject,
        };
        let reason = match self.rasterizer.rasterize(&request) {
            Ok(Some(image)) => return self.ocr.recognize(&image).map(Some),
            Ok(None) => "no raster backend could decode it".to_string(),
            Err(err) => err.to_string(),
        };

        warn!(page = page.page_number, xobject = %xobject.name, %reason, "skipping image");
        warnings.push(
            ExtractWarning::new(
                WarningCode::ImageSkipped,
                format!("image {} skipped: {reason}", xobject.name),
            )
            .with_page(page.page_number),
        );
        Ok(None)
    }
}

fn element_text(element: &PositionedElement) -> Option<&str> {
    match &element.kind {
        ElementKind::Text(text) => Some(text),
        _ => None,
    }
}

fn report_unplaced(
    page: &Page,
    tables: &[TableRegion],
    unplaced: &[usize],
    warnings: &mut Vec<ExtractWarning>,
) {
    for &index in unplaced {
        let rows = tables.get(index).map_or(0, |table| table.rows.len());
        warn!(page = page.page_number, table = index, rows, "table was never placed");
        warnings.push(
            ExtractWarning::new(
                WarningCode::TableNotPlaced,
                "detected table had no rectangle in reading order; \
                 its cells were not emitted as a table",
            )
            .with_page(page.page_number)
            .with_table_index(index),
        );
    }
}
