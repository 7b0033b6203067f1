use std::cmp::Ordering;

use crate::geometry::BBox;
use crate::model::{ElementKind, Page, TableRegion};

/// Coordinates closer than this are treated as the same grid line.
const SNAP_TOLERANCE: f64 = 3.0;
/// Collinear segments separated by less than this are joined into one edge.
const JOIN_TOLERANCE: f64 = 3.0;
const MIN_EDGE_LENGTH: f64 = 3.0;
const MIN_TABLE_CELLS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// Axis-aligned segment: `position` is y for horizontal edges and x for
/// vertical ones, `start..end` runs along the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    orientation: Orientation,
    position: f64,
    start: f64,
    end: f64,
}

impl Edge {
    fn new(orientation: Orientation, position: f64, a: f64, b: f64) -> Self {
        Self {
            orientation,
            position,
            start: a.min(b),
            end: a.max(b),
        }
    }

    fn length(&self) -> f64 {
        self.end - self.start
    }

    fn bbox(&self) -> BBox {
        match self.orientation {
            Orientation::Horizontal => {
                BBox::new(self.start, self.position, self.end, self.position)
            }
            Orientation::Vertical => {
                BBox::new(self.position, self.start, self.position, self.end)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    row: usize,
    column: usize,
    bbox: BBox,
}

fn page_edges(page: &Page) -> Vec<Edge> {
    let mut edges = Vec::new();

    for element in &page.elements {
        if !matches!(element.kind, ElementKind::VectorShape) {
            continue;
        }
        let bbox = element.bbox;
        edges.push(Edge::new(Orientation::Horizontal, bbox.y0, bbox.x0, bbox.x1));
        edges.push(Edge::new(Orientation::Horizontal, bbox.y1, bbox.x0, bbox.x1));
        edges.push(Edge::new(Orientation::Vertical, bbox.x0, bbox.y0, bbox.y1));
        edges.push(Edge::new(Orientation::Vertical, bbox.x1, bbox.y0, bbox.y1));
    }

    for ruling in &page.rulings {
        if (ruling.y0 - ruling.y1).abs() <= (ruling.x0 - ruling.x1).abs() {
            let y = (ruling.y0 + ruling.y1) / 2.0;
            edges.push(Edge::new(Orientation::Horizontal, y, ruling.x0, ruling.x1));
        } else {
            let x = (ruling.x0 + ruling.x1) / 2.0;
            edges.push(Edge::new(Orientation::Vertical, x, ruling.y0, ruling.y1));
        }
    }

    edges.retain(|edge| edge.length() >= MIN_EDGE_LENGTH);
    edges
}

/// Moves edges whose positions lie within `SNAP_TOLERANCE` of each other onto
/// their mean position, then joins overlapping collinear edges.
fn normalize_edges(edges: Vec<Edge>, orientation: Orientation) -> Vec<Edge> {
    let mut edges = edges
        .into_iter()
        .filter(|edge| edge.orientation == orientation)
        .collect::<Vec<_>>();
    edges.sort_by(|a, b| a.position.total_cmp(&b.position));

    let mut snapped = Vec::with_capacity(edges.len());
    let mut group: Vec<Edge> = Vec::new();
    for edge in edges {
        if let Some(first) = group.first()
            && edge.position - first.position > SNAP_TOLERANCE
        {
            snapped.extend(snap_group(&group));
            group.clear();
        }
        group.push(edge);
    }
    snapped.extend(snap_group(&group));

    snapped.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then_with(|| a.start.total_cmp(&b.start))
    });

    let mut joined: Vec<Edge> = Vec::with_capacity(snapped.len());
    for edge in snapped {
        if let Some(last) = joined.last_mut()
            && (last.position - edge.position).abs() < f64::EPSILON
            && edge.start <= last.end + JOIN_TOLERANCE
        {
            last.end = last.end.max(edge.end);
            continue;
        }
        joined.push(edge);
    }
    joined
}

fn snap_group(group: &[Edge]) -> Vec<Edge> {
    if group.is_empty() {
        return Vec::new();
    }
    let mean = group.iter().map(|edge| edge.position).sum::<f64>() / group.len() as f64;
    group
        .iter()
        .map(|edge| Edge {
            position: mean,
            ..*edge
        })
        .collect()
}

/// Groups edges that touch each other (transitively).
fn connected_components(edges: &[Edge]) -> Vec<Vec<Edge>> {
    let mut parent = (0..edges.len()).collect::<Vec<_>>();

    fn find(parent: &mut [usize], mut index: usize) -> usize {
        while parent[index] != index {
            parent[index] = parent[parent[index]];
            index = parent[index];
        }
        index
    }

    let boxes = edges.iter().map(Edge::bbox).collect::<Vec<_>>();
    for left in 0..edges.len() {
        for right in (left + 1)..edges.len() {
            if boxes[left].intersects(&boxes[right], JOIN_TOLERANCE) {
                let a = find(&mut parent, left);
                let b = find(&mut parent, right);
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut components: Vec<(usize, Vec<Edge>)> = Vec::new();
    for (index, edge) in edges.iter().enumerate() {
        let root = find(&mut parent, index);
        match components.iter_mut().find(|(id, _)| *id == root) {
            Some((_, members)) => members.push(*edge),
            None => components.push((root, vec![*edge])),
        }
    }

    components.into_iter().map(|(_, members)| members).collect()
}

fn distinct_positions(edges: &[Edge], orientation: Orientation) -> Vec<f64> {
    let mut positions = edges
        .iter()
        .filter(|edge| edge.orientation == orientation)
        .map(|edge| edge.position)
        .collect::<Vec<_>>();
    positions.sort_by(f64::total_cmp);
    positions.dedup_by(|a, b| (*a - *b).abs() <= SNAP_TOLERANCE);
    positions
}

fn covered(edges: &[Edge], orientation: Orientation, position: f64, a: f64, b: f64) -> bool {
    let (start, end) = (a.min(b), a.max(b));
    edges.iter().any(|edge| {
        edge.orientation == orientation
            && (edge.position - position).abs() <= SNAP_TOLERANCE
            && edge.start <= start + SNAP_TOLERANCE
            && edge.end >= end - SNAP_TOLERANCE
    })
}

/// Finds, for every grid corner, the smallest rectangle closed on all four
/// sides whose top-left corner it is.
fn find_cells(edges: &[Edge]) -> Vec<Cell> {
    let xs = distinct_positions(edges, Orientation::Vertical);
    let mut ys = distinct_positions(edges, Orientation::Horizontal);
    ys.reverse();

    let mut cells = Vec::new();
    if xs.len() < 2 || ys.len() < 2 {
        return cells;
    }

    for (row, &top) in ys.iter().enumerate().take(ys.len() - 1) {
        for (column, &left) in xs.iter().enumerate().take(xs.len() - 1) {
            if !covered(edges, Orientation::Horizontal, top, left, xs[column + 1])
                || !covered(edges, Orientation::Vertical, left, ys[row + 1], top)
            {
                continue;
            }

            'search: for &bottom in &ys[row + 1..] {
                if !covered(edges, Orientation::Vertical, left, bottom, top) {
                    break;
                }
                for &right in &xs[column + 1..] {
                    if !covered(edges, Orientation::Horizontal, top, left, right) {
                        break;
                    }
                    if covered(edges, Orientation::Vertical, right, bottom, top)
                        && covered(edges, Orientation::Horizontal, bottom, left, right)
                    {
                        cells.push(Cell {
                            row,
                            column,
                            bbox: BBox::new(left, bottom, right, top),
                        });
                        break 'search;
                    }
                }
            }
        }
    }

    cells
}

fn compare_reading_order(a: &BBox, b: &BBox) -> Ordering {
    b.y1.total_cmp(&a.y1).then_with(|| a.x0.total_cmp(&b.x0))
}

/// Text of the lines anchored inside `cell`: runs on one baseline are joined
/// with a space, separate baselines with a newline.
fn cell_text(cell: &BBox, lines: &[(&BBox, &str)]) -> String {
    let mut inside = lines
        .iter()
        .filter(|(bbox, _)| {
            let anchor_x = (bbox.x0 + 1.0).min(bbox.x1);
            let anchor_y = (bbox.y0 + bbox.y1) / 2.0;
            cell.contains_point(anchor_x, anchor_y)
        })
        .collect::<Vec<_>>();
    inside.sort_by(|a, b| compare_reading_order(a.0, b.0));

    let mut text = String::new();
    let mut previous: Option<&BBox> = None;
    for &(bbox, line) in inside {
        if let Some(previous) = previous {
            let same_line = ((previous.y0 + previous.y1) / 2.0 - (bbox.y0 + bbox.y1) / 2.0).abs()
                < bbox.height() / 2.0;
            text.push(if same_line { ' ' } else { '\n' });
        }
        text.push_str(line.trim());
        previous = Some(bbox);
    }
    text
}

fn build_table(cells: &[Cell], lines: &[(&BBox, &str)]) -> Option<TableRegion> {
    if cells.len() < MIN_TABLE_CELLS {
        return None;
    }

    let mut row_keys = cells.iter().map(|cell| cell.row).collect::<Vec<_>>();
    row_keys.sort_unstable();
    row_keys.dedup();
    let mut column_keys = cells.iter().map(|cell| cell.column).collect::<Vec<_>>();
    column_keys.sort_unstable();
    column_keys.dedup();

    let rows = row_keys
        .iter()
        .map(|&row| {
            column_keys
                .iter()
                .map(|&column| {
                    cells
                        .iter()
                        .find(|cell| cell.row == row && cell.column == column)
                        .map(|cell| cell_text(&cell.bbox, lines))
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let bbox = cells
        .iter()
        .skip(1)
        .fold(cells[0].bbox, |acc, cell| acc.union(&cell.bbox));

    Some(TableRegion { bbox, rows })
}

/// Detects ruled tables on a page from its rectangles and rulings.
///
/// Tables are returned top-to-bottom, then left-to-right.
pub(crate) fn detect_tables(page: &Page) -> Vec<TableRegion> {
    let edges = page_edges(page);
    if edges.is_empty() {
        return Vec::new();
    }

    let mut normalized = normalize_edges(edges.clone(), Orientation::Horizontal);
    normalized.extend(normalize_edges(edges, Orientation::Vertical));

    let lines = page.text_elements().collect::<Vec<_>>();
    let mut tables = connected_components(&normalized)
        .iter()
        .filter_map(|component| build_table(&find_cells(component), &lines))
        .collect::<Vec<_>>();

    tables.sort_by(|a, b| compare_reading_order(&a.bbox, &b.bbox));
    tables
}
