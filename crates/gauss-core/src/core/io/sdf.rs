use crate::core::io::traits::StructureFile;
use crate::core::models::builder::StructureBuilder;
use crate::core::models::node::Node;
use crate::core::models::structure::{Structure, StructureError};
use nalgebra::Point3;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("V3000 connection tables are not supported (line {0})")]
    UnsupportedV3000(usize),
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

impl SdfError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        SdfError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Reader for the first molecule block of an SDF / MOL (V2000) file.
///
/// Node ids are the 0-based atom indices of the atom block. The molecule title
/// (first header line) is kept in the `title` metadata entry.
pub struct SdfFile;

impl StructureFile for SdfFile {
    type Error = SdfError;

    fn read_from(reader: &mut impl BufRead, name: &str) -> Result<Structure, Self::Error> {
        let lines = collect_first_block(reader)?;
        if lines.len() < 4 {
            return Err(SdfError::parse(
                lines.len().max(1),
                "molecule block must contain a header and a counts line",
            ));
        }

        let (counts_no, counts_line) = (lines[3].0, &lines[3].1);
        if counts_line.contains("V3000") {
            return Err(SdfError::UnsupportedV3000(counts_no));
        }
        let (atom_count, bond_count) = parse_counts(counts_line, counts_no)?;

        let atom_start = 4;
        let bond_start = atom_start + atom_count;
        if lines.len() < bond_start + bond_count {
            return Err(SdfError::parse(
                lines.last().map_or(counts_no, |(ln, _)| *ln),
                "block ended before all atoms and bonds were listed",
            ));
        }

        let mut builder = StructureBuilder::new(name);
        builder.insert_metadata("format", "sdf");
        let title = lines[0].1.trim();
        if !title.is_empty() {
            builder.insert_metadata("title", title);
        }

        for (index, (ln, raw)) in lines[atom_start..bond_start].iter().enumerate() {
            let (position, element) = parse_atom(raw, *ln)?;
            builder.add_node(Node::new(index, position, &element));
        }
        for (ln, raw) in &lines[bond_start..bond_start + bond_count] {
            let (a, b) = parse_bond(raw, *ln, atom_count)?;
            builder.add_bond(a, b);
        }

        Ok(builder.build()?)
    }
}

fn collect_first_block(reader: &mut impl BufRead) -> Result<Vec<(usize, String)>, SdfError> {
    let mut lines = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let content = line?;
        if content.trim() == "$$$$" && !lines.is_empty() {
            break;
        }
        lines.push((i + 1, content));
    }
    Ok(lines)
}

// Counts are fixed-width 3-column fields: "aaabbb...".
fn parse_counts(line: &str, line_no: usize) -> Result<(usize, usize), SdfError> {
    let field = |start: usize| line.get(start..start + 3).unwrap_or("").trim();
    let atoms = field(0)
        .parse::<usize>()
        .map_err(|_| SdfError::parse(line_no, format!("invalid atom count '{}'", field(0))))?;
    let bonds = field(3)
        .parse::<usize>()
        .map_err(|_| SdfError::parse(line_no, format!("invalid bond count '{}'", field(3))))?;
    Ok((atoms, bonds))
}

fn parse_atom(line: &str, line_no: usize) -> Result<(Point3<f64>, String), SdfError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(SdfError::parse(line_no, "atom line needs x, y, z and a symbol"));
    }
    let mut xyz = [0.0; 3];
    for (axis, token) in tokens[..3].iter().enumerate() {
        xyz[axis] = token
            .parse::<f64>()
            .map_err(|_| SdfError::parse(line_no, format!("invalid coordinate '{token}'")))?;
    }
    Ok((Point3::from(xyz), tokens[3].to_string()))
}

fn parse_bond(line: &str, line_no: usize, atom_count: usize) -> Result<(usize, usize), SdfError> {
    let field = |start: usize| line.get(start..start + 3).unwrap_or("").trim();
    let parse_index = |raw: &str| {
        raw.parse::<usize>()
            .ok()
            .filter(|&i| i >= 1 && i <= atom_count)
            .ok_or_else(|| {
                SdfError::parse(
                    line_no,
                    format!("bond atom index '{raw}' outside 1..={atom_count}"),
                )
            })
    };
    let a = parse_index(field(0))?;
    let b = parse_index(field(3))?;
    Ok((a - 1, b - 1))
}
