use std::sync::LazyLock;

use regex::Regex;

use crate::geometry::{BBox, GEOMETRY_EPSILON};
use crate::model::{ElementKind, PositionedElement, TableRegion};

/// Slack allowed when deciding whether a rectangle belongs to a detected table.
const TABLE_TOLERANCE: f64 = 3.0;

/// Lines consisting of a bare integer, such as page numbers.
static NUMERIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?\d+(_\d+)*$").expect("hardcoded numeric line regex is valid")
});

pub(crate) fn is_numeric_line(text: &str) -> bool {
    NUMERIC_LINE.is_match(text.trim())
}

/// Orders elements top-down by the top edge of their boxes. Elements sharing
/// a top keep their content-stream order.
pub(crate) fn sort_reading_order(elements: &mut [PositionedElement]) {
    elements.sort_by(|a, b| b.top().total_cmp(&a.top()));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WalkState {
    Scanning,
    /// `region` spans the open tables horizontally and runs from their bottom
    /// edge up to the top of the rectangle that opened them.
    InTable { region: BBox },
}

/// What to do with one element (or one table) while walking a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    EmitText(usize),
    DropNumeric(usize),
    SkipInTable(usize),
    Ocr(usize),
    EmitTable(usize),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LayoutWalk {
    pub steps: Vec<Step>,
    /// Indexes of detected tables that no rectangle ever opened.
    pub unplaced: Vec<usize>,
}

struct Walker<'a> {
    tables: &'a [TableRegion],
    drop_numeric_lines: bool,
    state: WalkState,
    next_table: usize,
    placed: Vec<bool>,
    steps: Vec<Step>,
}

impl<'a> Walker<'a> {
    fn new(tables: &'a [TableRegion], drop_numeric_lines: bool) -> Self {
        Self {
            tables,
            drop_numeric_lines,
            state: WalkState::Scanning,
            next_table: 0,
            placed: vec![false; tables.len()],
            steps: Vec::new(),
        }
    }

    /// First pending table whose box holds `element`.
    fn pending_table_for(&self, element: &PositionedElement) -> Option<usize> {
        (self.next_table..self.tables.len())
            .find(|&index| self.tables[index].bbox.contains_box(&element.bbox, TABLE_TOLERANCE))
    }

    /// Emits table `index`. A table beside the open region joins it; any other
    /// table replaces it.
    fn open_table(&mut self, index: usize, element: &PositionedElement) {
        self.steps.push(Step::EmitTable(index));
        self.placed[index] = true;
        self.next_table = index + 1;

        let table = &self.tables[index].bbox;
        let opened = BBox::new(table.x0, table.y0, table.x1, element.bbox.y1);
        let region = match self.state {
            WalkState::InTable { region } if table.y1 > region.y0 + TABLE_TOLERANCE => {
                region.union(&opened)
            }
            _ => opened,
        };
        self.state = WalkState::InTable { region };
    }

    fn close_table(&mut self) {
        self.state = WalkState::Scanning;
    }

    fn scan(&mut self, position: usize, element: &PositionedElement) {
        match &element.kind {
            ElementKind::Text(text) => {
                if self.drop_numeric_lines && is_numeric_line(text) {
                    self.steps.push(Step::DropNumeric(position));
                } else {
                    self.steps.push(Step::EmitText(position));
                }
            }
            ElementKind::Image(_) => self.steps.push(Step::Ocr(position)),
            ElementKind::VectorShape => {
                if let Some(index) = self.pending_table_for(element) {
                    self.open_table(index, element);
                }
            }
        }
    }

    fn step(&mut self, position: usize, element: &PositionedElement, next_is_rect: bool) {
        let WalkState::InTable { region } = self.state else {
            self.scan(position, element);
            return;
        };

        match &element.kind {
            ElementKind::Text(_) => {
                if element.bbox.y1 < region.y0 - GEOMETRY_EPSILON {
                    self.close_table();
                    self.scan(position, element);
                } else if region.contains_box(&anchor(&element.bbox), TABLE_TOLERANCE) {
                    self.steps.push(Step::SkipInTable(position));
                } else {
                    self.scan(position, element);
                }
            }
            ElementKind::Image(_) => self.steps.push(Step::Ocr(position)),
            ElementKind::VectorShape => {
                if let Some(index) = self.pending_table_for(element) {
                    self.open_table(index, element);
                    return;
                }
                let inside = element.bbox.y0 >= region.y0 - TABLE_TOLERANCE
                    && element.bbox.y1 <= region.y1 + TABLE_TOLERANCE;
                if !inside && !next_is_rect {
                    self.close_table();
                }
            }
        }
    }
}

/// Centre of a text line, the point tested against an open table region.
fn anchor(bbox: &BBox) -> BBox {
    let x = (bbox.x0 + bbox.x1) / 2.0;
    let y = (bbox.y0 + bbox.y1) / 2.0;
    BBox::new(x, y, x, y)
}

/// Walks elements already in reading order and decides, per element, whether
/// it is emitted as text, dropped, OCRed or covered by a table.
///
/// A rectangle that falls inside a pending table emits that table once and
/// suppresses text lying inside the table until the region ends. The region ends at a rectangle
/// outside it that is not followed by another rectangle, at text lying wholly
/// below it, or at the start of the next table.
pub(crate) fn walk(
    elements: &[PositionedElement],
    tables: &[TableRegion],
    drop_numeric_lines: bool,
) -> LayoutWalk {
    let mut walker = Walker::new(tables, drop_numeric_lines);

    for (position, element) in elements.iter().enumerate() {
        let next_is_rect = elements
            .get(position + 1)
            .is_some_and(PositionedElement::is_rect);
        walker.step(position, element, next_is_rect);
    }

    let unplaced = walker
        .placed
        .iter()
        .enumerate()
        .filter(|(_, placed)| !**placed)
        .map(|(index, _)| index)
        .collect();

    LayoutWalk {
        steps: walker.steps,
        unplaced,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Step, is_numeric_line, sort_reading_order, walk};
    use crate::geometry::BBox;
    use crate::model::{ElementKind, PositionedElement, TableRegion, XObjectKind, XObjectRef};

    fn text(top: f64, value: &str) -> PositionedElement {
        PositionedElement {
            bbox: BBox::new(60.0, top - 12.0, 200.0, top),
            kind: ElementKind::Text(value.to_string()),
        }
    }

    fn text_at(x0: f64, top: f64, value: &str) -> PositionedElement {
        PositionedElement {
            bbox: BBox::new(x0, top - 12.0, x0 + 40.0, top),
            kind: ElementKind::Text(value.to_string()),
        }
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> PositionedElement {
        PositionedElement {
            bbox: BBox::new(x0, y0, x1, y1),
            kind: ElementKind::VectorShape,
        }
    }

    fn image(top: f64) -> PositionedElement {
        PositionedElement {
            bbox: BBox::new(100.0, top - 50.0, 200.0, top),
            kind: ElementKind::Image(XObjectRef {
                name: "Im1".to_string(),
                id: None,
                kind: XObjectKind::Image,
            }),
        }
    }

    fn table(x0: f64, y0: f64, x1: f64, y1: f64) -> TableRegion {
        TableRegion {
            bbox: BBox::new(x0, y0, x1, y1),
            rows: vec![vec![Some("cell".to_string())]],
        }
    }

    #[test]
    fn numeric_lines_follow_integer_literal_rules() {
        assert!(is_numeric_line(" 12 "));
        assert!(is_numeric_line("-7"));
        assert!(is_numeric_line("1_000"));
        assert!(!is_numeric_line("1.5"));
        assert!(!is_numeric_line("Page 3"));
        assert!(!is_numeric_line(""));
    }

    #[test]
    fn sorts_by_top_descending_and_keeps_ties_stable() {
        let mut elements = vec![text(100.0, "low"), text(700.0, "first"), text(700.0, "second")];
        sort_reading_order(&mut elements);
        let order = elements
            .iter()
            .map(|element| match &element.kind {
                ElementKind::Text(text) => text.as_str(),
                _ => "",
            })
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["first", "second", "low"]);
    }

    #[test]
    fn plain_page_emits_text_and_drops_page_numbers() {
        let elements = vec![text(700.0, "Hello"), text(680.0, "42")];
        let dropped = walk(&elements, &[], true);
        assert_eq!(dropped.steps, vec![Step::EmitText(0), Step::DropNumeric(1)]);

        let kept = walk(&elements, &[], false);
        assert_eq!(kept.steps, vec![Step::EmitText(0), Step::EmitText(1)]);
    }

    #[test]
    fn table_is_emitted_once_and_covers_its_text() {
        let elements = vec![
            text(700.0, "Title"),
            rect(50.0, 600.0, 200.0, 640.0),
            rect(200.0, 600.0, 350.0, 640.0),
            text(630.0, "Name"),
            rect(50.0, 560.0, 200.0, 600.0),
            rect(200.0, 560.0, 350.0, 600.0),
            text(590.0, "Alice"),
            text(400.0, "Footer"),
        ];
        let tables = vec![table(50.0, 560.0, 350.0, 640.0)];

        let walk = walk(&elements, &tables, true);
        assert_eq!(
            walk.steps,
            vec![
                Step::EmitText(0),
                Step::EmitTable(0),
                Step::SkipInTable(3),
                Step::SkipInTable(6),
                Step::EmitText(7),
            ]
        );
        assert!(walk.unplaced.is_empty());
    }

    #[test]
    fn outside_rect_before_text_closes_region() {
        let elements = vec![
            rect(50.0, 600.0, 350.0, 640.0),
            rect(50.0, 560.0, 350.0, 600.0),
            rect(10.0, 100.0, 20.0, 300.0),
            text(250.0, "after"),
        ];
        let tables = vec![table(50.0, 560.0, 350.0, 640.0)];

        let walk = walk(&elements, &tables, true);
        assert_eq!(walk.steps, vec![Step::EmitTable(0), Step::EmitText(3)]);
    }

    #[test]
    fn outside_rect_followed_by_rect_keeps_region_open() {
        let elements = vec![
            rect(50.0, 600.0, 350.0, 640.0),
            rect(400.0, 100.0, 420.0, 630.0),
            rect(50.0, 560.0, 350.0, 600.0),
            text(590.0, "Alice"),
            text(400.0, "Footer"),
        ];
        let tables = vec![table(50.0, 560.0, 350.0, 640.0)];

        let walk = walk(&elements, &tables, true);
        assert_eq!(
            walk.steps,
            vec![Step::EmitTable(0), Step::SkipInTable(3), Step::EmitText(4)]
        );
    }

    #[test]
    fn misaligned_bottom_borders_stay_in_region() {
        let elements = vec![
            rect(50.0, 600.0, 200.0, 640.0),
            rect(200.0, 600.0, 350.0, 640.0),
            text_at(55.0, 625.0, "Name"),
            text_at(205.0, 625.0, "Age"),
            rect(50.0, 561.0, 200.0, 600.0),
            rect(200.0, 559.0, 350.0, 600.0),
            text_at(55.0, 585.0, "Alice"),
            text_at(205.0, 585.0, "Bob"),
        ];
        let tables = vec![table(50.0, 560.0, 350.0, 640.0)];

        let walk = walk(&elements, &tables, true);
        assert_eq!(
            walk.steps,
            vec![
                Step::EmitTable(0),
                Step::SkipInTable(2),
                Step::SkipInTable(3),
                Step::SkipInTable(6),
                Step::SkipInTable(7),
            ]
        );
    }

    #[test]
    fn side_by_side_tables_are_both_placed() {
        let elements = vec![
            rect(50.0, 600.0, 150.0, 640.0),
            rect(300.0, 600.0, 400.0, 640.0),
            text_at(55.0, 625.0, "Left1"),
            text_at(305.0, 625.0, "Right1"),
            rect(50.0, 560.0, 150.0, 600.0),
            rect(300.0, 560.0, 400.0, 600.0),
            text_at(55.0, 585.0, "Left2"),
            text_at(305.0, 585.0, "Right2"),
            text(400.0, "Tail"),
        ];
        let tables = vec![
            table(50.0, 560.0, 150.0, 640.0),
            table(300.0, 560.0, 400.0, 640.0),
        ];

        let walk = walk(&elements, &tables, true);
        assert_eq!(
            walk.steps,
            vec![
                Step::EmitTable(0),
                Step::EmitTable(1),
                Step::SkipInTable(2),
                Step::SkipInTable(3),
                Step::SkipInTable(6),
                Step::SkipInTable(7),
                Step::EmitText(8),
            ]
        );
        assert!(walk.unplaced.is_empty());
    }

    #[test]
    fn text_beside_open_region_is_emitted() {
        let elements = vec![
            rect(50.0, 600.0, 200.0, 640.0),
            rect(50.0, 560.0, 200.0, 600.0),
            text_at(400.0, 620.0, "margin note"),
        ];
        let tables = vec![table(50.0, 560.0, 200.0, 640.0)];

        let walk = walk(&elements, &tables, true);
        assert_eq!(walk.steps, vec![Step::EmitTable(0), Step::EmitText(2)]);
    }

    #[test]
    fn image_inside_region_is_still_ocred() {
        let elements = vec![
            rect(50.0, 500.0, 350.0, 640.0),
            rect(50.0, 460.0, 350.0, 500.0),
            image(620.0),
        ];
        let tables = vec![table(50.0, 460.0, 350.0, 640.0)];

        let walk = walk(&elements, &tables, true);
        assert_eq!(walk.steps, vec![Step::EmitTable(0), Step::Ocr(2)]);
    }

    #[test]
    fn stacked_tables_switch_regions() {
        let elements = vec![
            rect(50.0, 600.0, 350.0, 640.0),
            rect(50.0, 560.0, 350.0, 600.0),
            rect(50.0, 400.0, 350.0, 440.0),
            rect(50.0, 360.0, 350.0, 400.0),
            text(300.0, "tail"),
        ];
        let tables = vec![
            table(50.0, 560.0, 350.0, 640.0),
            table(50.0, 360.0, 350.0, 440.0),
        ];

        let walk = walk(&elements, &tables, true);
        assert_eq!(
            walk.steps,
            vec![Step::EmitTable(0), Step::EmitTable(1), Step::EmitText(4)]
        );
    }

    #[test]
    fn table_without_rectangles_is_reported_unplaced() {
        let elements = vec![text(700.0, "only text")];
        let tables = vec![table(50.0, 560.0, 350.0, 640.0)];

        let walk = walk(&elements, &tables, true);
        assert_eq!(walk.steps, vec![Step::EmitText(0)]);
        assert_eq!(walk.unplaced, vec![0]);
    }

    #[test]
    fn stray_rectangles_outside_tables_are_ignored() {
        let elements = vec![rect(0.0, 0.0, 10.0, 10.0), text(5.0, "x")];
        let walk = walk(&elements, &[], true);
        assert_eq!(walk.steps, vec![Step::EmitText(1)]);
    }
}
