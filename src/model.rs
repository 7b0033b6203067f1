use lopdf::ObjectId;
use serde::Serialize;

use crate::geometry::BBox;
use crate::warning::ExtractWarning;

/// Kind of XObject an image element was painted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    Image,
    Form,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XObjectRef {
    pub name: String,
    pub id: Option<ObjectId>,
    pub kind: XObjectKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Text(String),
    Image(XObjectRef),
    VectorShape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedElement {
    pub bbox: BBox,
    pub kind: ElementKind,
}

impl PositionedElement {
    #[must_use]
    pub fn top(&self) -> f64 {
        self.bbox.y1
    }

    #[must_use]
    pub fn is_rect(&self) -> bool {
        matches!(self.kind, ElementKind::VectorShape)
    }
}

/// Straight stroked segment that is not part of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_number: u32,
    pub media_box: BBox,
    pub elements: Vec<PositionedElement>,
    pub rulings: Vec<Ruling>,
}

impl Page {
    pub(crate) fn text_elements(&self) -> impl Iterator<Item = (&BBox, &str)> {
        self.elements.iter().filter_map(|element| match &element.kind {
            ElementKind::Text(text) => Some((&element.bbox, text.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRegion {
    pub bbox: BBox,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Fragment {
    Text(String),
    ImageText(String),
    Table(String),
}

impl Fragment {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) | Self::ImageText(text) | Self::Table(text) => text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageContent {
    pub page_number: u32,
    pub fragments: Vec<Fragment>,
}

impl PageContent {
    #[must_use]
    pub fn text(&self) -> String {
        self.fragments.iter().map(Fragment::as_str).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub pages: Vec<PageContent>,
    pub warnings: Vec<ExtractWarning>,
}

impl ExtractionResult {
    pub(crate) fn from_pages(pages: Vec<PageContent>, warnings: Vec<ExtractWarning>) -> Self {
        let text = pages.iter().map(PageContent::text).collect();
        Self {
            text,
            pages,
            warnings,
        }
    }
}
