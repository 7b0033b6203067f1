use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use crate::error::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Element path of a run directly inside a body-level paragraph.
const BODY_RUN: [&[u8]; 3] = [b"w:body", b"w:p", b"w:r"];

fn in_body_run(stack: &[Vec<u8>]) -> bool {
    stack.len() >= BODY_RUN.len()
        && stack[stack.len() - BODY_RUN.len()..]
            .iter()
            .zip(BODY_RUN)
            .all(|(open, expected)| open.as_slice() == expected)
}

fn in_body_run_text(stack: &[Vec<u8>]) -> bool {
    stack
        .split_last()
        .is_some_and(|(last, parents)| last.as_slice() == b"w:t" && in_body_run(parents))
}

/// Concatenates the run text of body-level paragraphs in `document.xml`.
///
/// `w:tab` becomes a tab and `w:br`/`w:cr` a newline. Paragraphs nested in
/// tables, text boxes or hyperlinks are not body runs and are skipped.
pub(crate) fn document_xml_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut out = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => stack.push(element.name().as_ref().to_vec()),
            Event::End(_) => {
                stack.pop();
            }
            Event::Empty(element) => {
                if in_body_run(&stack) {
                    match element.name().as_ref() {
                        b"w:tab" => out.push('\t'),
                        b"w:br" | b"w:cr" => out.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(text) => {
                if in_body_run_text(&stack) {
                    out.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if in_body_run_text(&stack) {
                    out.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

pub(crate) fn extract_docx_text(path: &Path) -> Result<String, ExtractError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| ExtractError::Docx(format!("{DOCUMENT_PART}: {err}")))?
        .read_to_string(&mut xml)?;

    document_xml_text(&xml)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::document_xml_text;

    fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{inner}</w:body></w:document>"#
        )
    }

    #[test]
    fn concatenates_runs_and_paragraphs_without_separators() {
        let xml = body(
            r#"<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p><w:p><w:r><w:t>Next</w:t></w:r></w:p>"#,
        );
        assert_eq!(document_xml_text(&xml).expect("parse"), "Hello worldNext");
    }

    #[test]
    fn maps_tabs_and_breaks() {
        let xml =
            body(r"<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>");
        assert_eq!(document_xml_text(&xml).expect("parse"), "a\tb\nc");
    }

    #[test]
    fn skips_table_cells_and_hyperlinks() {
        let xml = body(
            r#"<w:p><w:r><w:t>kept</w:t></w:r><w:hyperlink><w:r><w:t>link</w:t></w:r></w:hyperlink></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        );
        assert_eq!(document_xml_text(&xml).expect("parse"), "kept");
    }

    #[test]
    fn unescapes_entities() {
        let xml = body(r"<w:p><w:r><w:t>Fish &amp; chips</w:t></w:r></w:p>");
        assert_eq!(document_xml_text(&xml).expect("parse"), "Fish & chips");
    }
}
