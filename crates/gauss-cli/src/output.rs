//! CSV and JSON writers for descriptor arrays and their summaries.

use crate::error::Result;
use gaussbio3d::core::models::structure::Structure;
use gaussbio3d::engine::descriptor::FeatureShapes;
use nalgebra::DMatrix;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Row labels of a matrix, written as its first column.
pub struct RowIndex<'a> {
    pub name: &'a str,
    pub labels: Vec<String>,
}

/// Writes `matrix` as CSV with a header row. Values use Rust's shortest round-trip
/// formatting, so re-reading the file recovers every value exactly.
pub fn write_matrix_csv<W: Write>(
    writer: W,
    columns: &[String],
    index: Option<&RowIndex>,
    matrix: &DMatrix<f64>,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = Vec::with_capacity(columns.len() + 1);
    if let Some(index) = index {
        header.push(index.name);
    }
    header.extend(columns.iter().map(String::as_str));
    csv.write_record(&header)?;

    for (i, row) in matrix.row_iter().enumerate() {
        let mut record: Vec<String> = Vec::with_capacity(row.len() + 1);
        if let Some(index) = index {
            record.push(index.labels.get(i).cloned().unwrap_or_default());
        }
        record.extend(row.iter().map(f64::to_string));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_matrix_file(
    path: &Path,
    columns: &[String],
    index: Option<&RowIndex>,
    matrix: &DMatrix<f64>,
) -> Result<()> {
    debug!(path = %path.display(), rows = matrix.nrows(), cols = matrix.ncols(), "Writing CSV.");
    let file = BufWriter::new(File::create(path)?);
    write_matrix_csv(file, columns, index, matrix)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    debug!(path = %path.display(), "Writing JSON summary.");
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

/// Column names of the global descriptor, in its flattening order:
/// group of A, then group of B, then scale, then statistic.
pub fn global_columns(shapes: &FeatureShapes) -> Vec<String> {
    let mut names = Vec::with_capacity(shapes.global);
    for ga in &shapes.groups_a {
        for gb in &shapes.groups_b {
            for k in 0..shapes.num_scales {
                for stat in &shapes.stats {
                    names.push(format!("{ga}|{gb}|s{k}|{stat}"));
                }
            }
        }
    }
    names
}

/// Column names of a node-feature matrix: scale-major, statistic-minor.
pub fn node_columns(shapes: &FeatureShapes) -> Vec<String> {
    (0..shapes.num_scales)
        .flat_map(|k| shapes.stats.iter().map(move |stat| format!("s{k}|{stat}")))
        .collect()
}

pub fn node_ids(structure: &Structure) -> Vec<String> {
    structure.nodes().iter().map(|n| n.id.to_string()).collect()
}

/// Generic feature names `{prefix}0, {prefix}1, ...`.
pub fn numbered_columns(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|j| format!("{prefix}{j}")).collect()
}
