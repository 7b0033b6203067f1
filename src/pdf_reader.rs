use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::{UTF_16BE, WINDOWS_1251};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::ExtractError;
use crate::geometry::{BBox, Matrix};
use crate::model::{ElementKind, Page, PositionedElement, Ruling, XObjectKind, XObjectRef};
use crate::options::PageSelection;

const US_LETTER: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};
const DEFAULT_GLYPH_WIDTH: f64 = 500.0;
const DEFAULT_CID_WIDTH: f64 = 1000.0;
const ASCENT: f64 = 0.8;
const DESCENT: f64 = 0.2;
/// Horizontal gap (in font sizes) above which a space is inserted between runs.
const WORD_GAP: f64 = 0.15;
/// Horizontal gap (in font sizes) above which runs become separate lines.
const LINE_SPLIT_GAP: f64 = 1.0;
const BASELINE_TOLERANCE: f64 = 0.5;
const AXIS_TOLERANCE: f64 = 1.0;
const MAX_PARENT_DEPTH: usize = 32;

fn looks_decoding_broken(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();

    replacement * 8 > total || control * 5 > total
}

pub(crate) fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(&bytes[2..]);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if let Some(name) = encoding {
        let lower = name.to_ascii_lowercase();

        if lower.contains("utf16")
            || lower.contains("ucs2")
            || lower.contains("identity-h")
            || lower.contains("unicode")
        {
            let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
            if !had_errors && !utf16.is_empty() {
                return utf16.into_owned();
            }
        }

        if lower.contains("1251") || lower.contains("cyrillic") {
            let (cyrillic, _, had_errors) = WINDOWS_1251.decode(bytes);
            if !had_errors && !cyrillic.is_empty() {
                return cyrillic.into_owned();
            }
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

pub(crate) fn load_document(path: &Path) -> Result<Document, ExtractError> {
    let has_pdf_extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_none_or(|extension| extension.eq_ignore_ascii_case("pdf"));
    if !has_pdf_extension {
        return Err(ExtractError::UnsupportedFormat(format!(
            "'{}' is not a PDF file",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    Document::load_mem(&bytes).map_err(|error| {
        ExtractError::UnsupportedFormat(format!(
            "'{}' is not a parseable PDF: {error}",
            path.display()
        ))
    })
}

pub(crate) fn select_pages(
    document: &Document,
    selection: Option<&PageSelection>,
) -> Result<Vec<(u32, ObjectId)>, ExtractError> {
    let pages = document
        .get_pages()
        .into_iter()
        .filter(|(page_no, _)| selection.is_none_or(|selection| selection.contains(*page_no)))
        .collect::<Vec<_>>();

    if pages.is_empty() && selection.is_some() {
        return Err(ExtractError::NoPagesSelected);
    }

    Ok(pages)
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(document, object)?.as_dict().ok()
}

fn as_number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(as_number).collect()
}

/// Looks a key up on the page and, failing that, on its ancestors in the page tree.
fn inherited<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = document.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        node = resolve_dict(document, node.get(b"Parent").ok()?)?;
    }
    None
}

fn rect_from_array(document: &Document, object: &Object) -> Option<BBox> {
    let values = resolve(document, object)?
        .as_array()
        .ok()?
        .iter()
        .filter_map(as_number)
        .collect::<Vec<_>>();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some(BBox::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

pub(crate) fn page_media_box(document: &Document, page_id: ObjectId) -> BBox {
    inherited(document, page_id, b"MediaBox")
        .and_then(|object| rect_from_array(document, object))
        .unwrap_or(US_LETTER)
}

#[derive(Debug, Clone)]
struct FontMetrics<'a> {
    encoding: Option<&'a str>,
    first_char: i64,
    widths: Vec<f64>,
    two_byte: bool,
    default_width: f64,
}

impl<'a> FontMetrics<'a> {
    fn fallback() -> Self {
        Self {
            encoding: None,
            first_char: 0,
            widths: Vec::new(),
            two_byte: false,
            default_width: DEFAULT_GLYPH_WIDTH,
        }
    }

    fn from_dict(document: &'a Document, font: &'a Dictionary) -> Self {
        let two_byte = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Type0");

        let default_width = if two_byte {
            font.get(b"DescendantFonts")
                .ok()
                .and_then(|object| resolve(document, object))
                .and_then(|object| object.as_array().ok())
                .and_then(|fonts| fonts.first())
                .and_then(|object| resolve_dict(document, object))
                .and_then(|descendant| descendant.get(b"DW").ok())
                .and_then(as_number)
                .unwrap_or(DEFAULT_CID_WIDTH)
        } else {
            DEFAULT_GLYPH_WIDTH
        };

        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_array().ok())
            .map(|values| values.iter().filter_map(as_number).collect())
            .unwrap_or_default();

        Self {
            encoding: Some(font.get_font_encoding()),
            first_char: font
                .get(b"FirstChar")
                .and_then(Object::as_i64)
                .unwrap_or(0),
            widths,
            two_byte,
            default_width,
        }
    }

    fn glyph_width(&self, code: u32) -> f64 {
        usize::try_from(i64::from(code) - self.first_char)
            .ok()
            .and_then(|index| self.widths.get(index).copied())
            .filter(|width| *width > 0.0)
            .unwrap_or(self.default_width)
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0_u32, |acc, byte| (acc << 8) | u32::from(*byte)))
                .collect()
        } else {
            bytes.iter().map(|byte| u32::from(*byte)).collect()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GlyphRun {
    text: String,
    x0: f64,
    x1: f64,
    baseline: f64,
    size: f64,
}

#[derive(Debug, Default)]
struct LineCollector {
    current: Option<GlyphRun>,
    elements: Vec<PositionedElement>,
}

impl LineCollector {
    fn push_run(&mut self, run: GlyphRun) {
        if run.text.is_empty() {
            return;
        }

        if let Some(current) = self.current.as_mut() {
            let size = current.size.max(run.size).max(1.0);
            let gap = run.x0 - current.x1;
            let same_baseline =
                (run.baseline - current.baseline).abs() <= BASELINE_TOLERANCE * size;
            if same_baseline && gap > -size && gap <= LINE_SPLIT_GAP * size {
                let needs_space = gap > WORD_GAP * size
                    && !current.text.ends_with(char::is_whitespace)
                    && !run.text.starts_with(char::is_whitespace);
                if needs_space {
                    current.text.push(' ');
                }
                current.text.push_str(&run.text);
                current.x1 = current.x1.max(run.x1);
                current.size = current.size.max(run.size);
                return;
            }
        }

        self.flush();
        self.current = Some(run);
    }

    fn flush(&mut self) {
        let Some(line) = self.current.take() else {
            return;
        };
        if line.text.trim().is_empty() {
            return;
        }

        let bbox = BBox::new(
            line.x0,
            line.baseline - DESCENT * line.size,
            line.x1,
            line.baseline + ASCENT * line.size,
        );
        self.elements.push(PositionedElement {
            bbox,
            kind: ElementKind::Text(line.text),
        });
    }
}

#[derive(Debug, Default)]
struct Subpath {
    points: Vec<(f64, f64)>,
    curved: bool,
}

fn is_axis_aligned(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() <= AXIS_TOLERANCE || (a.1 - b.1).abs() <= AXIS_TOLERANCE
}

fn rectangle_bbox(points: &[(f64, f64)]) -> Option<BBox> {
    if points.len() != 4 {
        return None;
    }
    let alternating = (0..4).all(|index| {
        let a = points[index];
        let b = points[(index + 1) % 4];
        is_axis_aligned(a, b)
    });
    if alternating {
        BBox::from_points(points)
    } else {
        None
    }
}

struct PageInterpreter<'a> {
    document: &'a Document,
    fonts: BTreeMap<Vec<u8>, FontMetrics<'a>>,
    xobjects: Option<&'a Dictionary>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    font: Option<Vec<u8>>,
    font_stack: Vec<Option<Vec<u8>>>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    path: Vec<Subpath>,
    lines: LineCollector,
    shapes: Vec<PositionedElement>,
    rulings: Vec<Ruling>,
}

impl<'a> PageInterpreter<'a> {
    fn new(document: &'a Document, page_id: ObjectId) -> Self {
        let fonts = document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| (name, FontMetrics::from_dict(document, font)))
            .collect();
        let xobjects = inherited(document, page_id, b"Resources")
            .and_then(|object| object.as_dict().ok())
            .and_then(|resources| resources.get(b"XObject").ok())
            .and_then(|object| resolve_dict(document, object));

        Self {
            document,
            fonts,
            xobjects,
            state: GraphicsState::default(),
            stack: Vec::new(),
            font: None,
            font_stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            path: Vec::new(),
            lines: LineCollector::default(),
            shapes: Vec::new(),
            rulings: Vec::new(),
        }
    }

    fn current_font(&self) -> FontMetrics<'a> {
        self.font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .cloned()
            .unwrap_or_else(FontMetrics::fallback)
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn show_string(&mut self, bytes: &[u8]) {
        let font = self.current_font();
        let rendering = self.text_matrix.then(&self.state.ctm);
        let (x0, baseline) = rendering.apply(0.0, 0.0);
        let size = self.state.font_size * rendering.vertical_scale();

        let mut advance = 0.0;
        for code in font.codes(bytes) {
            advance += font.glyph_width(code) / 1000.0 * self.state.font_size
                + self.state.char_spacing;
            if !font.two_byte && code == 32 {
                advance += self.state.word_spacing;
            }
        }
        advance *= self.state.horizontal_scale;
        self.text_matrix = Matrix::translate(advance, 0.0).then(&self.text_matrix);
        let (x1, _) = self.text_matrix.then(&self.state.ctm).apply(0.0, 0.0);

        self.lines.push_run(GlyphRun {
            text: decode_pdf_bytes(font.encoding, bytes),
            x0,
            x1,
            baseline,
            size,
        });
    }

    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes, _) => self.show_string(bytes),
                other => {
                    if let Some(adjustment) = as_number(other) {
                        let shift = -adjustment / 1000.0
                            * self.state.font_size
                            * self.state.horizontal_scale;
                        self.text_matrix = Matrix::translate(shift, 0.0).then(&self.text_matrix);
                    }
                }
            }
        }
    }

    fn show_operands(&mut self, operands: &[Object]) {
        for operand in operands {
            match operand {
                Object::String(bytes, _) => self.show_string(bytes),
                Object::Array(items) => self.show_array(items),
                _ => {}
            }
        }
    }

    fn device_point(&self, x: f64, y: f64) -> (f64, f64) {
        self.state.ctm.apply(x, y)
    }

    fn path_point(&mut self, x: f64, y: f64, curved: bool) {
        let point = self.device_point(x, y);
        match self.path.last_mut() {
            Some(subpath) => {
                subpath.points.push(point);
                subpath.curved |= curved;
            }
            None => self.path.push(Subpath {
                points: vec![point],
                curved,
            }),
        }
    }

    fn paint_path(&mut self) {
        for subpath in std::mem::take(&mut self.path) {
            if subpath.curved {
                continue;
            }
            let mut points = subpath.points;
            points.dedup();
            if points.len() > 1 && points.first() == points.last() {
                points.pop();
            }

            if let Some(bbox) = rectangle_bbox(&points) {
                self.shapes.push(PositionedElement {
                    bbox,
                    kind: ElementKind::VectorShape,
                });
                continue;
            }

            for pair in points.windows(2) {
                if is_axis_aligned(pair[0], pair[1]) {
                    self.rulings.push(Ruling {
                        x0: pair[0].0,
                        y0: pair[0].1,
                        x1: pair[1].0,
                        y1: pair[1].1,
                    });
                }
            }
        }
    }

    fn paint_xobject(&mut self, name: &[u8]) {
        let Some(entry) = self.xobjects.and_then(|xobjects| xobjects.get(name).ok()) else {
            debug!(name = %String::from_utf8_lossy(name), "XObject not found in page resources");
            return;
        };
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let Some(stream) = resolve(self.document, entry).and_then(|object| object.as_stream().ok())
        else {
            return;
        };

        let unit = BBox::new(0.0, 0.0, 1.0, 1.0);
        let (kind, bbox) = match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => (XObjectKind::Image, self.state.ctm.transform_box(&unit)),
            Ok(b"Form") => {
                let form_box = stream
                    .dict
                    .get(b"BBox")
                    .ok()
                    .and_then(|object| rect_from_array(self.document, object))
                    .unwrap_or(unit);
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|object| resolve(self.document, object))
                    .and_then(|object| object.as_array().ok())
                    .and_then(|values| matrix_from_operands(values))
                    .unwrap_or(Matrix::IDENTITY);
                (
                    XObjectKind::Form,
                    form_matrix.then(&self.state.ctm).transform_box(&form_box),
                )
            }
            _ => return,
        };

        self.shapes.push(PositionedElement {
            bbox,
            kind: ElementKind::Image(XObjectRef {
                name: String::from_utf8_lossy(name).into_owned(),
                id,
                kind,
            }),
        });
    }

    fn run(&mut self, content: Content) {
        for operation in content.operations {
            let operands = operation.operands.as_slice();
            match operation.operator.as_str() {
                "q" => {
                    self.stack.push(self.state);
                    self.font_stack.push(self.font.clone());
                }
                "Q" => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                    if let Some(font) = self.font_stack.pop() {
                        self.font = font;
                    }
                }
                "cm" => {
                    if let Some(matrix) = matrix_from_operands(operands) {
                        self.state.ctm = matrix.then(&self.state.ctm);
                    }
                }
                "BT" => {
                    self.text_matrix = Matrix::IDENTITY;
                    self.line_matrix = Matrix::IDENTITY;
                }
                "Tf" => {
                    self.font = operands
                        .first()
                        .and_then(|operand| operand.as_name().ok())
                        .map(<[u8]>::to_vec);
                    if let Some(size) = operands.get(1).and_then(as_number) {
                        self.state.font_size = size;
                    }
                }
                "Tc" => {
                    if let Some(value) = operands.first().and_then(as_number) {
                        self.state.char_spacing = value;
                    }
                }
                "Tw" => {
                    if let Some(value) = operands.first().and_then(as_number) {
                        self.state.word_spacing = value;
                    }
                }
                "Tz" => {
                    if let Some(value) = operands.first().and_then(as_number) {
                        self.state.horizontal_scale = value / 100.0;
                    }
                }
                "TL" => {
                    if let Some(value) = operands.first().and_then(as_number) {
                        self.state.leading = value;
                    }
                }
                "Td" => {
                    if let [tx, ty] = numbers(operands)[..] {
                        self.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = numbers(operands)[..] {
                        self.state.leading = -ty;
                        self.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(matrix) = matrix_from_operands(operands) {
                        self.line_matrix = matrix;
                        self.text_matrix = matrix;
                    }
                }
                "T*" => self.next_line(),
                "Tj" | "TJ" => self.show_operands(operands),
                "'" => {
                    self.next_line();
                    self.show_operands(operands);
                }
                "\"" => {
                    if let [word_spacing, char_spacing, ..] = numbers(operands)[..] {
                        self.state.word_spacing = word_spacing;
                        self.state.char_spacing = char_spacing;
                    }
                    self.next_line();
                    self.show_operands(operands.get(2..).unwrap_or_default());
                }
                "m" => {
                    if let [x, y] = numbers(operands)[..] {
                        let point = self.device_point(x, y);
                        self.path.push(Subpath {
                            points: vec![point],
                            curved: false,
                        });
                    }
                }
                "l" => {
                    if let [x, y] = numbers(operands)[..] {
                        self.path_point(x, y, false);
                    }
                }
                "c" | "v" | "y" => {
                    if let [.., x, y] = numbers(operands)[..] {
                        self.path_point(x, y, true);
                    }
                }
                "h" => {
                    if let Some(subpath) = self.path.last_mut()
                        && let Some(&first) = subpath.points.first()
                    {
                        subpath.points.push(first);
                    }
                }
                "re" => {
                    if let [x, y, width, height] = numbers(operands)[..] {
                        let corners = [
                            (x, y),
                            (x + width, y),
                            (x + width, y + height),
                            (x, y + height),
                        ];
                        let points = corners
                            .iter()
                            .map(|&(px, py)| self.device_point(px, py))
                            .collect();
                        self.path.push(Subpath {
                            points,
                            curved: false,
                        });
                    }
                }
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => self.paint_path(),
                "n" => self.path.clear(),
                "Do" => {
                    if let Some(name) = operands.first().and_then(|operand| operand.as_name().ok())
                    {
                        self.paint_xobject(name);
                    }
                }
                _ => {}
            }
        }
    }

    fn finish(mut self) -> (Vec<PositionedElement>, Vec<Ruling>) {
        self.lines.flush();
        let mut elements = self.lines.elements;
        elements.extend(self.shapes);
        (elements, self.rulings)
    }
}

fn matrix_from_operands(operands: &[Object]) -> Option<Matrix> {
    match numbers(operands)[..] {
        [a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
        _ => None,
    }
}

/// Interprets one page's content stream into positioned elements.
///
/// Returns `None` when the content stream cannot be read or decoded.
pub(crate) fn read_page(document: &Document, page_number: u32, page_id: ObjectId) -> Option<Page> {
    let raw_content = document.get_page_content(page_id).ok()?;
    let content = Content::decode(&raw_content).ok()?;

    let mut interpreter = PageInterpreter::new(document, page_id);
    interpreter.run(content);
    let (elements, rulings) = interpreter.finish();

    debug!(
        page = page_number,
        elements = elements.len(),
        rulings = rulings.len(),
        "collected page elements"
    );

    Some(Page {
        page_number,
        media_box: page_media_box(document, page_id),
        elements,
        rulings,
    })
}
