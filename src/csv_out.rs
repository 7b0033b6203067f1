use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::ExtractError;
use crate::preprocess::TextPreprocessor;

pub const PROCESSED_COLUMN: &str = "processed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessReport {
    pub row_count: usize,
}

fn column_index(headers: &StringRecord, column: &str) -> Result<usize, ExtractError> {
    headers
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| {
            ExtractError::InvalidOption(format!("column '{column}' not found in CSV header"))
        })
}

/// Copies `input` to `output` with a `processed` column appended, holding the
/// preprocessed text of `column`. Per-row weights go to `weights_out` as a JSON
/// array when given.
pub(crate) fn preprocess_csv_file(
    input: &Path,
    output: &Path,
    column: &str,
    preprocessor: &TextPreprocessor,
    weights_out: Option<&Path>,
) -> Result<PreprocessReport, ExtractError> {
    let mut reader = ReaderBuilder::new().from_path(input)?;
    let headers = reader.headers()?.clone();
    let index = column_index(&headers, column)?;

    let mut writer = WriterBuilder::new().from_path(output)?;
    let mut out_headers = headers.clone();
    out_headers.push_field(PROCESSED_COLUMN);
    writer.write_record(&out_headers)?;

    let mut weights: Vec<BTreeMap<String, f64>> = Vec::new();
    let mut row_count = 0;
    for record in reader.records() {
        let mut record = record?;
        let processed = preprocessor.preprocess(record.get(index).unwrap_or_default());
        if weights_out.is_some() {
            weights.push(processed.weights());
        }
        record.push_field(&processed.to_string());
        writer.write_record(&record)?;
        row_count += 1;
    }
    writer.flush()?;

    if let Some(path) = weights_out {
        let mut file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut file, &weights).map_err(io::Error::from)?;
        file.flush()?;
    }

    Ok(PreprocessReport { row_count })
}
