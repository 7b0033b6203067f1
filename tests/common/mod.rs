#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// One thing painted on a fixture page, in PDF user space.
#[derive(Debug, Clone, Copy)]
pub enum Item<'a> {
    Text { x: i64, y: i64, text: &'a str },
    Rect { x: i64, y: i64, width: i64, height: i64 },
    Image { x: i64, y: i64, width: i64, height: i64 },
}

fn item_operations(item: &Item<'_>) -> Vec<Operation> {
    match *item {
        Item::Text { x, y, text } => vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
        Item::Rect {
            x,
            y,
            width,
            height,
        } => vec![
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("S", vec![]),
        ],
        Item::Image {
            x,
            y,
            width,
            height,
        } => vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), y.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ],
    }
}

/// Writes a PDF with one page per entry of `pages`, each painting its items in
/// the given order. Every page shares a Courier font `F1` and a 2x2 RGB image
/// `Im1`.
pub fn create_layout_pdf(
    path: &Path,
    pages: &[Vec<Item<'_>>],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        vec![0, 0, 0, 255, 255, 255, 255, 255, 255, 0, 0, 0],
    ));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
        "XObject" => dictionary! {
            "Im1" => image_id,
        },
    });

    let mut page_ids = Vec::new();
    for items in pages {
        let operations = items.iter().flat_map(item_operations).collect::<Vec<_>>();
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}

/// One text line per entry, written top-down from y=700 at 20pt spacing.
pub fn create_text_pdf(
    path: &Path,
    pages: &[Vec<&str>],
) -> Result<(), Box<dyn std::error::Error>> {
    let pages = pages
        .iter()
        .map(|lines| {
            lines
                .iter()
                .zip((0..).map(|index: i64| 700 - index * 20))
                .map(|(text, y)| Item::Text { x: 50, y, text: *text })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    create_layout_pdf(path, &pages)
}

/// Writes a minimal DOCX whose body holds `body_xml`.
pub fn create_docx(path: &Path, body_xml: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
    )?;

    zip.start_file("word/document.xml", options)?;
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body_xml}</w:body></w:document>"#
    )?;

    zip.finish()?;
    Ok(())
}
