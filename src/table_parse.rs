use crate::model::TableRegion;

const MISSING_CELL: &str = "None";

fn render_cell(cell: Option<&str>) -> String {
    cell.map_or_else(|| MISSING_CELL.to_string(), |text| text.replace('\n', " "))
}

/// Flattens a table into pipe-delimited rows, `|a|b|` per row, rows joined
/// by `\n` with no trailing newline.
///
/// Line breaks inside a cell become spaces and cells with no backing grid
/// cell are written as `None`.
#[must_use]
pub fn table_to_string(table: &TableRegion) -> String {
    let mut out = String::new();
    for row in &table.rows {
        out.push('|');
        for cell in row {
            out.push_str(&render_cell(cell.as_deref()));
            out.push('|');
        }
        out.push('\n');
    }

    if out.ends_with('\n') {
        out.pop();
    }
    out
}
