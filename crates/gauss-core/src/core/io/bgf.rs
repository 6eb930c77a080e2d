use crate::core::io::traits::StructureFile;
use crate::core::models::builder::StructureBuilder;
use crate::core::models::node::Node;
use crate::core::models::structure::{Structure, StructureError};
use nalgebra::Point3;
use std::collections::{BTreeSet, HashSet};
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BgfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: BgfParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error("Invalid structure: {0}")]
    Structure(#[from] StructureError),
}

#[derive(Debug, Error)]
pub enum BgfParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must reach column 66)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_coord(line: &str, line_num: usize, start: usize, columns: &str) -> Result<f64, BgfError> {
    let raw = slice_and_trim(line, start, start + 10);
    raw.parse().map_err(|_| BgfError::Parse {
        line: line_num,
        kind: BgfParseErrorKind::InvalidFloat {
            columns: columns.into(),
            value: raw.into(),
        },
    })
}

/// Element symbol encoded in a DREIDING-style force-field type (`C_R` -> `C`).
fn element_from_ff_type(ff_type: &str) -> &str {
    ff_type.split('_').next().unwrap_or(ff_type)
}

/// Reader for BGF files (fixed-column ATOM/HETATM records plus CONECT records).
///
/// Node ids are atom serials. ATOM records carry their residue name into the node;
/// HETATM records do not, so they group as ligand atoms under residue-class pooling.
/// Chain identifiers seen in the file are listed in the `chains` metadata entry.
pub struct BgfFile;

impl StructureFile for BgfFile {
    type Error = BgfError;

    fn read_from(reader: &mut impl BufRead, name: &str) -> Result<Structure, Self::Error> {
        let mut builder = StructureBuilder::new(name);
        builder.insert_metadata("format", "bgf");

        let mut seen_serials = HashSet::new();
        let mut chains = BTreeSet::new();
        let mut conect: Vec<(usize, usize)> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                record_type @ ("ATOM" | "HETATM") => {
                    if line.len() < 66 {
                        return Err(BgfError::Parse {
                            line: line_num,
                            kind: BgfParseErrorKind::LineTooShort,
                        });
                    }

                    let serial_str = slice_and_trim(&line, 7, 12);
                    let serial: usize = serial_str.parse().map_err(|_| BgfError::Parse {
                        line: line_num,
                        kind: BgfParseErrorKind::InvalidInt {
                            columns: "8-12".into(),
                            value: serial_str.into(),
                        },
                    })?;
                    if !seen_serials.insert(serial) {
                        return Err(BgfError::Inconsistency(format!(
                            "Duplicate atom serial: {}",
                            serial
                        )));
                    }

                    let res_name = slice_and_trim(&line, 19, 22);
                    let chain_id = slice_and_trim(&line, 23, 24);
                    let x = parse_coord(&line, line_num, 30, "31-40")?;
                    let y = parse_coord(&line, line_num, 40, "41-50")?;
                    let z = parse_coord(&line, line_num, 50, "51-60")?;

                    let element = element_from_ff_type(slice_and_trim(&line, 61, 66));
                    if element.is_empty() {
                        return Err(BgfError::Parse {
                            line: line_num,
                            kind: BgfParseErrorKind::MissingRequiredField {
                                columns: "62-66".into(),
                            },
                        });
                    }

                    let mut node = Node::new(serial, Point3::new(x, y, z), element);
                    if record_type == "ATOM" && !res_name.is_empty() {
                        node = node.with_residue(res_name);
                    }
                    builder.add_node(node);
                    if !chain_id.is_empty() {
                        chains.insert(chain_id.to_string());
                    }
                }
                "CONECT" => {
                    let mut serials = line.split_whitespace().skip(1).map(|token| {
                        token.parse::<usize>().map_err(|_| BgfError::Parse {
                            line: line_num,
                            kind: BgfParseErrorKind::InvalidInt {
                                columns: "CONECT".into(),
                                value: token.into(),
                            },
                        })
                    });
                    let Some(base) = serials.next().transpose()? else {
                        continue;
                    };
                    for partner in serials {
                        let partner = partner?;
                        if partner != base {
                            conect.push((base.min(partner), base.max(partner)));
                        }
                    }
                }
                "END" => break,
                _ => {}
            }
        }

        if seen_serials.is_empty() {
            return Err(BgfError::MissingRecord("ATOM/HETATM records".into()));
        }

        // Each bond is usually listed from both ends.
        conect.sort_unstable();
        conect.dedup();
        for (a, b) in conect {
            builder.add_bond(a, b);
        }
        if !chains.is_empty() {
            let joined = chains.into_iter().collect::<Vec<_>>().join(",");
            builder.insert_metadata("chains", &joined);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn atom_line(record: &str, serial: usize, res: &str, chain: &str, xyz: [f64; 3], ff: &str) -> String {
        format!(
            "{:<6} {:>5} {:<5} {:>3} {:1} {:>5}{:>10.5}{:>10.5}{:>10.5} {:<5}{:>3}{:>2} {:>8.5}",
            record, serial, "X", res, chain, 1, xyz[0], xyz[1], xyz[2], ff, 1, 0, 0.0
        )
    }

    fn dipeptide_with_ligand() -> String {
        [
            "BIOGRF  332".to_string(),
            "FORMAT ATOM   (a6,1x,i5,1x,a5,1x,a3,1x,a1,1x,a5,3f10.5,1x,a5,i3,i2,1x,f8.5)".to_string(),
            atom_line("ATOM", 1, "ALA", "A", [0.0, 0.0, 0.0], "N_R"),
            atom_line("ATOM", 2, "ALA", "A", [1.45, 0.0, 0.0], "C_3"),
            atom_line("ATOM", 3, "LYS", "B", [2.0, 1.2, 0.0], "C_R"),
            atom_line("HETATM", 10, "LIG", "X", [5.0, 5.0, 5.0], "Cl"),
            "CONECT    1    2".to_string(),
            "CONECT    2    1    3".to_string(),
            "CONECT    3    2".to_string(),
            "END".to_string(),
        ]
        .join("\n")
    }

    fn read(text: &str) -> Result<Structure, BgfError> {
        BgfFile::read_from(&mut Cursor::new(text), "bgf-test")
    }

    #[test]
    fn reads_atoms_with_serials_as_ids() {
        let s = read(&dipeptide_with_ligand()).unwrap();
        assert_eq!(s.num_nodes(), 4);
        let n = s.node(2).unwrap();
        assert_eq!(n.element, "C");
        assert_eq!(n.residue_name.as_deref(), Some("ALA"));
        assert!((n.position.x - 1.45).abs() < 1e-9);
        assert_eq!(s.node(10).unwrap().element, "Cl");
    }

    #[test]
    fn hetatm_records_have_no_residue_name() {
        let s = read(&dipeptide_with_ligand()).unwrap();
        assert!(s.node(10).unwrap().residue_name.is_none());
    }

    #[test]
    fn conect_records_become_deduplicated_half_bonds() {
        let s = read(&dipeptide_with_ligand()).unwrap();
        assert_eq!(s.curves().len(), 2);
        assert_eq!(s.num_segments(), 4);
    }

    #[test]
    fn chains_and_format_are_recorded_in_metadata() {
        let s = read(&dipeptide_with_ligand()).unwrap();
        assert_eq!(s.metadata().get("chains").map(String::as_str), Some("A,B,X"));
        assert_eq!(s.metadata().get("format").map(String::as_str), Some("bgf"));
    }

    #[test]
    fn conect_to_unknown_serial_is_an_error() {
        let text = [
            atom_line("ATOM", 1, "GLY", "A", [0.0, 0.0, 0.0], "C_3"),
            "CONECT    1   99".to_string(),
        ]
        .join("\n");
        assert!(matches!(
            read(&text),
            Err(BgfError::Structure(StructureError::UnknownNode { id: 99, .. }))
        ));
    }

    #[test]
    fn duplicate_serial_is_an_error() {
        let text = [
            atom_line("ATOM", 4, "GLY", "A", [0.0, 0.0, 0.0], "C_3"),
            atom_line("ATOM", 4, "GLY", "A", [1.0, 0.0, 0.0], "C_3"),
        ]
        .join("\n");
        assert!(matches!(read(&text), Err(BgfError::Inconsistency(_))));
    }

    #[test]
    fn short_atom_line_is_rejected() {
        let text = "ATOM      1 N    ALA A    1   0.00000";
        assert!(matches!(
            read(text),
            Err(BgfError::Parse {
                line: 1,
                kind: BgfParseErrorKind::LineTooShort
            })
        ));
    }

    #[test]
    fn file_without_atoms_is_rejected() {
        assert!(matches!(
            read("BIOGRF 332\nEND\n"),
            Err(BgfError::MissingRecord(_))
        ));
    }

    #[test]
    fn element_is_prefix_of_force_field_type() {
        assert_eq!(element_from_ff_type("C_R"), "C");
        assert_eq!(element_from_ff_type("H___A"), "H");
        assert_eq!(element_from_ff_type("Zn"), "Zn");
    }
}
