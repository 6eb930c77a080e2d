pub mod batch;
pub mod compute;

use crate::error::{CliError, Result};
use gaussbio3d::core::io::{bgf::BgfFile, sdf::SdfFile, traits::StructureFile};
use gaussbio3d::core::models::structure::Structure;
use std::path::Path;
use tracing::info;

/// Reads a structure, choosing the parser from the file extension.
pub fn read_structure(path: &Path) -> Result<Structure> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    info!("Loading structure from {:?}", path);
    let parsed = match extension.as_str() {
        "sdf" | "mol" => SdfFile::read_from_path(path).map_err(anyhow::Error::from),
        "bgf" => BgfFile::read_from_path(path).map_err(anyhow::Error::from),
        other => {
            return Err(CliError::Argument(format!(
                "Unsupported structure format '{}' for {} (expected .sdf, .mol or .bgf)",
                other,
                path.display()
            )));
        }
    };

    parsed.map_err(|source| CliError::FileParsing {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn unknown_extension_is_an_argument_error() {
        let err = read_structure(Path::new("protein.pdb")).unwrap_err();
        assert!(matches!(err, CliError::Argument(msg) if msg.contains("pdb")));
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.sdf");
        fs::write(&path, "only a title\n").unwrap();
        let err = read_structure(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { path: p, .. } if p == path));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ligand.SDF");
        fs::write(
            &path,
            "ligand\n\n\n  2  1  0  0  0  0  0  0  0  0999 V2000\n\
             \x20   0.0000    0.0000    0.0000 C   0  0\n\
             \x20   1.5000    0.0000    0.0000 O   0  0\n\
             \x20 1  2  1  0\nM  END\n",
        )
        .unwrap();
        let structure = read_structure(&path).unwrap();
        assert_eq!(structure.num_nodes(), 2);
        assert_eq!(structure.name(), "ligand");
    }
}
