mod common;

use std::fs;
use std::str::FromStr;

use common::Item;
use doctext::{
    DocumentTextExtractor, ExtractError, ExtractOptions, Fragment, OcrEngine, PageLayoutExtractor,
    PageSelection, RenderBackend, WarningCode, extract_document_text, extract_pdf_text,
};
use image::DynamicImage;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

/// Reports the size of each bitmap it is handed instead of running OCR.
struct SizeReportingOcr;

impl OcrEngine for SizeReportingOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError> {
        Ok(format!("[ocr {}x{}]", image.width(), image.height()))
    }
}

fn embedded_only() -> ExtractOptions {
    ExtractOptions {
        render_backend: RenderBackend::Embedded,
        ..ExtractOptions::default()
    }
}

fn table_page() -> Vec<Item<'static>> {
    vec![
        Item::Text { x: 50, y: 750, text: "Title" },
        Item::Rect { x: 50, y: 600, width: 150, height: 40 },
        Item::Rect { x: 200, y: 600, width: 150, height: 40 },
        Item::Rect { x: 50, y: 560, width: 150, height: 40 },
        Item::Rect { x: 200, y: 560, width: 150, height: 40 },
        Item::Text { x: 55, y: 615, text: "Name" },
        Item::Text { x: 205, y: 615, text: "Age" },
        Item::Text { x: 55, y: 575, text: "Alice" },
        Item::Text { x: 205, y: 575, text: "30" },
        Item::Text { x: 50, y: 400, text: "Footer text" },
        Item::Text { x: 300, y: 40, text: "7" },
    ]
}

#[test]
fn text_only_pdf_reads_top_down_and_drops_page_numbers() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("text.pdf");
    common::create_text_pdf(&input, &[vec!["Intro", "12", "Body text"]])
        .expect("PDF fixture should be created");

    let result =
        extract_pdf_text(&input, &ExtractOptions::default()).expect("extraction should succeed");
    assert_eq!(result.text, "IntroBody text");
    assert!(result.warnings.is_empty());

    let keep = ExtractOptions {
        drop_numeric_lines: false,
        ..ExtractOptions::default()
    };
    let result = extract_pdf_text(&input, &keep).expect("extraction should succeed");
    assert_eq!(result.text, "Intro12Body text");
}

#[test]
fn reading_order_follows_position_not_stream_order() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("order.pdf");
    common::create_layout_pdf(
        &input,
        &[vec![
            Item::Text { x: 50, y: 300, text: "third" },
            Item::Text { x: 50, y: 700, text: "first" },
            Item::Text { x: 50, y: 500, text: "second" },
        ]],
    )
    .expect("PDF fixture should be created");

    let result =
        extract_pdf_text(&input, &ExtractOptions::default()).expect("extraction should succeed");
    assert_eq!(result.text, "firstsecondthird");
}

#[test]
fn pages_are_joined_without_separators() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("pages.pdf");
    common::create_text_pdf(&input, &[vec!["Hello"], vec!["World"]])
        .expect("PDF fixture should be created");

    let result =
        extract_pdf_text(&input, &ExtractOptions::default()).expect("extraction should succeed");
    assert_eq!(result.text, "HelloWorld");
    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.pages[1].page_number, 2);
}

#[test]
fn page_selection_limits_pages() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("pages.pdf");
    common::create_text_pdf(&input, &[vec!["Hello"], vec!["World"]])
        .expect("PDF fixture should be created");

    let options = ExtractOptions {
        pages: Some(PageSelection::from_str("2").expect("selection should parse")),
        ..ExtractOptions::default()
    };
    let result = extract_pdf_text(&input, &options).expect("extraction should succeed");
    assert_eq!(result.text, "World");

    let options = ExtractOptions {
        pages: Some(PageSelection::from_str("5-6").expect("selection should parse")),
        ..ExtractOptions::default()
    };
    let err = extract_pdf_text(&input, &options).expect_err("no page matches");
    assert!(matches!(err, ExtractError::NoPagesSelected));
}

#[test]
fn table_is_flattened_once_in_reading_order() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("table.pdf");
    common::create_layout_pdf(&input, &[table_page()]).expect("PDF fixture should be created");

    let result =
        extract_pdf_text(&input, &ExtractOptions::default()).expect("extraction should succeed");
    assert_eq!(result.text, "Title|Name|Age|\n|Alice|30|Footer text");
    assert_eq!(
        result.pages[0].fragments,
        vec![
            Fragment::Text("Title".to_string()),
            Fragment::Table("|Name|Age|\n|Alice|30|".to_string()),
            Fragment::Text("Footer text".to_string()),
        ]
    );
    assert!(result.warnings.is_empty());
}

#[test]
fn image_is_ocred_at_its_reading_position() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("image.pdf");
    common::create_layout_pdf(
        &input,
        &[vec![
            Item::Text { x: 50, y: 700, text: "Before" },
            Item::Image { x: 100, y: 400, width: 200, height: 100 },
            Item::Text { x: 50, y: 300, text: "After" },
        ]],
    )
    .expect("PDF fixture should be created");

    let extractor =
        PageLayoutExtractor::new(embedded_only()).with_ocr_engine(Box::new(SizeReportingOcr));
    let result = extractor.extract(&input).expect("extraction should succeed");
    assert_eq!(result.text, "Before[ocr 2x2]After");
    assert_eq!(result.pages[0].fragments[1], Fragment::ImageText("[ocr 2x2]".to_string()));

    let leftovers = fs::read_dir(dir.path())
        .expect("tempdir should be readable")
        .count();
    assert_eq!(leftovers, 1, "only the input PDF should remain");
}

#[test]
fn extraction_is_idempotent() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("table.pdf");
    let mut page = table_page();
    page.push(Item::Image { x: 400, y: 700, width: 50, height: 50 });
    common::create_layout_pdf(&input, &[page]).expect("PDF fixture should be created");

    let extractor =
        PageLayoutExtractor::new(embedded_only()).with_ocr_engine(Box::new(SizeReportingOcr));
    let first = extractor.extract(&input).expect("first extraction should succeed");
    let second = extractor.extract(&input).expect("second extraction should succeed");
    assert_eq!(first, second);
}

#[test]
fn rejects_non_pdf_and_unparseable_input() {
    let dir = tempdir().expect("tempdir should be created");

    let text_file = dir.path().join("notes.txt");
    fs::write(&text_file, "plain").expect("fixture should be written");
    let err = extract_pdf_text(&text_file, &ExtractOptions::default()).expect_err("not a PDF");
    assert!(matches!(err, ExtractError::UnsupportedFormat(_)));

    let garbage = dir.path().join("broken.pdf");
    fs::write(&garbage, b"definitely not a pdf").expect("fixture should be written");
    let err = extract_pdf_text(&garbage, &ExtractOptions::default()).expect_err("not parseable");
    assert!(matches!(err, ExtractError::UnsupportedFormat(_)));

    let missing = dir.path().join("missing.pdf");
    let err = extract_pdf_text(&missing, &ExtractOptions::default()).expect_err("missing file");
    assert!(matches!(err, ExtractError::Io(_)));
}

#[test]
fn zero_dpi_is_an_invalid_option() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("text.pdf");
    common::create_text_pdf(&input, &[vec!["Hello"]]).expect("PDF fixture should be created");

    let options = ExtractOptions {
        dpi: 0,
        ..ExtractOptions::default()
    };
    let err = extract_pdf_text(&input, &options).expect_err("dpi 0 is rejected");
    assert!(matches!(err, ExtractError::InvalidOption(_)));
}

#[test]
fn dispatches_docx_by_extension() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("letter.DOCX");
    common::create_docx(
        &input,
        r"<w:p><w:r><w:t>Dear</w:t></w:r><w:r><w:tab/><w:t>team</w:t></w:r></w:p><w:p><w:r><w:t>Thanks</w:t></w:r></w:p>",
    )
    .expect("DOCX fixture should be created");

    let text = extract_document_text(&input, &ExtractOptions::default())
        .expect("extraction should succeed");
    assert_eq!(text.as_deref(), Some("Dear\tteamThanks"));
}

#[test]
fn docx_without_document_part_is_a_docx_error() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("empty.docx");
    fs::write(&input, b"PK not really a zip").expect("fixture should be written");

    let err = extract_document_text(&input, &ExtractOptions::default())
        .expect_err("broken archive");
    assert!(matches!(err, ExtractError::Docx(_)));
}

#[test]
fn dispatches_rtf_by_extension() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("memo.rtf");
    fs::write(
        &input,
        r"{\rtf1\ansi{\fonttbl\f0\fswiss Helvetica;}\f0\pard Quarterly report {\b draft}.\par}",
    )
    .expect("fixture should be written");

    let text = extract_document_text(&input, &ExtractOptions::default())
        .expect("extraction should succeed")
        .expect("rtf is a supported kind");
    assert!(text.contains("Quarterly report"), "unexpected RTF text: {text:?}");
    assert!(text.contains("draft"), "unexpected RTF text: {text:?}");
}

#[test]
fn dispatcher_routes_pdf_through_layout_extractor() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("table.pdf");
    common::create_layout_pdf(&input, &[table_page()]).expect("PDF fixture should be created");

    let extractor = DocumentTextExtractor::new(ExtractOptions::default());
    let text = extractor.extract(&input).expect("extraction should succeed");
    assert_eq!(text.as_deref(), Some("Title|Name|Age|\n|Alice|30|Footer text"));
}

#[test]
fn unknown_extension_yields_none() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("slides.pptx");
    fs::write(&input, b"irrelevant").expect("fixture should be written");

    let text = extract_document_text(&input, &ExtractOptions::default())
        .expect("unknown extensions are not errors");
    assert_eq!(text, None);
}

#[test]
fn unrenderable_image_is_skipped_with_warning() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("image.pdf");
    common::create_layout_pdf(
        &input,
        &[vec![
            Item::Text { x: 50, y: 700, text: "Caption" },
            Item::Image { x: 100, y: 400, width: 200, height: 100 },
        ]],
    )
    .expect("PDF fixture should be created");

    let options = ExtractOptions {
        render_backend: RenderBackend::Pdftoppm,
        pdftoppm_cmd: "/nonexistent/pdftoppm".into(),
        ..ExtractOptions::default()
    };
    let extractor = PageLayoutExtractor::new(options).with_ocr_engine(Box::new(SizeReportingOcr));
    let result = extractor.extract(&input).expect("extraction should succeed");

    assert_eq!(result.text, "Caption");
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code, WarningCode::ImageSkipped);
    assert_eq!(result.warnings[0].page, Some(1));
}

#[test]
fn misaligned_cell_borders_do_not_duplicate_last_row() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("misaligned.pdf");
    common::create_layout_pdf(
        &input,
        &[vec![
            Item::Rect { x: 50, y: 600, width: 150, height: 40 },
            Item::Rect { x: 200, y: 600, width: 150, height: 40 },
            Item::Rect { x: 50, y: 561, width: 150, height: 39 },
            Item::Rect { x: 200, y: 559, width: 150, height: 41 },
            Item::Text { x: 55, y: 615, text: "Name" },
            Item::Text { x: 205, y: 615, text: "Age" },
            Item::Text { x: 55, y: 575, text: "Alice" },
            Item::Text { x: 205, y: 575, text: "Bob" },
        ]],
    )
    .expect("PDF fixture should be created");

    let result =
        extract_pdf_text(&input, &ExtractOptions::default()).expect("extraction should succeed");
    assert_eq!(
        result.pages[0].fragments,
        vec![Fragment::Table("|Name|Age|\n|Alice|Bob|".to_string())]
    );
    assert_eq!(result.text, "|Name|Age|\n|Alice|Bob|");
}

#[test]
fn side_by_side_tables_keep_both_contents() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("side_by_side.pdf");
    common::create_layout_pdf(
        &input,
        &[vec![
            Item::Rect { x: 50, y: 600, width: 100, height: 40 },
            Item::Rect { x: 50, y: 560, width: 100, height: 40 },
            Item::Rect { x: 300, y: 600, width: 100, height: 40 },
            Item::Rect { x: 300, y: 560, width: 100, height: 40 },
            Item::Text { x: 55, y: 615, text: "Left1" },
            Item::Text { x: 305, y: 615, text: "Right1" },
            Item::Text { x: 55, y: 575, text: "Left2" },
            Item::Text { x: 305, y: 575, text: "Right2" },
            Item::Text { x: 50, y: 400, text: "Tail" },
        ]],
    )
    .expect("PDF fixture should be created");

    let result =
        extract_pdf_text(&input, &ExtractOptions::default()).expect("extraction should succeed");
    assert_eq!(result.text, "|Left1|\n|Left2||Right1|\n|Right2|Tail");
    assert!(result.warnings.is_empty());
}
