use super::read_structure;
use crate::cli::BatchArgs;
use crate::config::PartialConfig;
use crate::error::{CliError, Result};
use crate::output::{self, RowIndex};
use crate::progress::BatchProgress;
use gaussbio3d::core::models::structure::Structure;
use gaussbio3d::workflows::pipeline::{FitOutcome, MgliPipeline, ProjectionState, StructurePair};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct ManifestRow {
    structure_a: String,
    #[serde(default)]
    structure_b: Option<String>,
}

/// Structures of a manifest, loaded once each, and the pairs that index them.
#[derive(Debug)]
struct Manifest {
    structures: Vec<Structure>,
    pairs: Vec<(usize, Option<usize>)>,
}

impl Manifest {
    /// Reads a CSV manifest; relative paths are resolved against its directory.
    fn load(path: &Path) -> Result<Self> {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut manifest = Manifest {
            structures: Vec::new(),
            pairs: Vec::new(),
        };
        let mut loaded: HashMap<PathBuf, usize> = HashMap::new();
        let mut index_of = |raw: &str, structures: &mut Vec<Structure>| -> Result<usize> {
            let candidate = Path::new(raw);
            let resolved = if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                base.join(candidate)
            };
            if let Some(&index) = loaded.get(&resolved) {
                return Ok(index);
            }
            structures.push(read_structure(&resolved)?);
            let index = structures.len() - 1;
            loaded.insert(resolved, index);
            Ok(index)
        };

        for row in reader.deserialize() {
            let row: ManifestRow = row?;
            let a = index_of(&row.structure_a, &mut manifest.structures)?;
            let b = match row.structure_b.as_deref() {
                Some(raw) if !raw.is_empty() => Some(index_of(raw, &mut manifest.structures)?),
                _ => None,
            };
            manifest.pairs.push((a, b));
        }
        Ok(manifest)
    }

    fn pairs(&self) -> Vec<StructurePair<'_>> {
        self.pairs
            .iter()
            .map(|&(a, b)| (&self.structures[a], b.map(|i| &self.structures[i])))
            .collect()
    }

    fn pair_labels(&self) -> Vec<String> {
        self.pairs
            .iter()
            .map(|&(a, b)| match b {
                Some(b) => format!("{}:{}", self.structures[a].name(), self.structures[b].name()),
                None => self.structures[a].name().to_string(),
            })
            .collect()
    }
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum FitSummary {
    Unprojected,
    Projected {
        components: usize,
        explained_variance: Vec<f64>,
    },
    Degraded {
        reason: String,
    },
}

impl FitSummary {
    fn new(outcome: &FitOutcome, state: &ProjectionState) -> Self {
        match (outcome, state) {
            (FitOutcome::Projected { components }, ProjectionState::Fitted(pca)) => {
                FitSummary::Projected {
                    components: *components,
                    explained_variance: pca.explained_variance().iter().copied().collect(),
                }
            }
            (FitOutcome::Degraded { reason }, _) => FitSummary::Degraded {
                reason: reason.clone(),
            },
            _ => FitSummary::Unprojected,
        }
    }
}

#[derive(Serialize)]
struct BatchSummary {
    manifest: PathBuf,
    features: PathBuf,
    pairs: usize,
    shape: [usize; 2],
    fit: FitSummary,
    config: PartialConfig,
}

pub fn run(args: BatchArgs, quiet: bool) -> Result<()> {
    info!("Merging configuration layers...");
    let mut partial = PartialConfig::load(&args.config)?;
    partial.apply_projection_args(&args.projection);
    let settings = partial.resolve()?;

    let manifest = Manifest::load(&args.manifest)?;
    let pairs = manifest.pairs();
    info!(
        pairs = pairs.len(),
        structures = manifest.structures.len(),
        "Manifest loaded."
    );
    if pairs.is_empty() {
        warn!("Manifest {:?} lists no structure pairs.", args.manifest);
    }

    let progress = BatchProgress::new(manifest.pair_labels(), quiet);
    let reporter = progress.reporter();

    let description = PartialConfig::describe(&settings.config, &settings.projection);
    let mut pipeline = MgliPipeline::new(settings.config, settings.projection);

    println!("Featurizing {} structure pair(s)...", pairs.len());
    let (features, outcome) = pipeline.fit_transform(&pairs, &reporter)?;

    let prefix = match outcome {
        FitOutcome::Projected { .. } => "pc",
        _ => "f",
    };
    output::write_matrix_file(
        &args.output,
        &output::numbered_columns(prefix, features.ncols()),
        Some(&RowIndex {
            name: "pair",
            labels: manifest.pair_labels(),
        }),
        &features,
    )?;

    let summary_path = summary_path_for(&args.output)?;
    let summary = BatchSummary {
        manifest: args.manifest.clone(),
        features: args.output.clone(),
        pairs: pairs.len(),
        shape: [features.nrows(), features.ncols()],
        fit: FitSummary::new(&outcome, pipeline.state()),
        config: description,
    };
    output::write_json(&summary_path, &summary)?;

    println!(
        "✓ {} × {} feature matrix written to: {}",
        features.nrows(),
        features.ncols(),
        args.output.display()
    );
    Ok(())
}

fn summary_path_for(output: &Path) -> Result<PathBuf> {
    if output.extension().is_some_and(|e| e == "json") {
        return Err(CliError::Argument(format!(
            "Feature output {} would be overwritten by its JSON summary",
            output.display()
        )));
    }
    Ok(output.with_extension("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;

    fn chain_sdf(dir: &Path, name: &str, offset: f64) {
        let atoms = [
            [0.0, 0.0, 0.0],
            [1.5, 0.2 + offset, 0.3],
            [2.1, 1.4, -0.5 * offset],
            [1.0, 2.2 + offset, 1.1],
        ];
        let mut text = format!("{name}\n\n\n  4  3  0  0  0  0  0  0  0  0999 V2000\n");
        for p in atoms {
            text.push_str(&format!(
                "{:>10.4}{:>10.4}{:>10.4} C   0  0\n",
                p[0], p[1], p[2]
            ));
        }
        text.push_str("  1  2  1  0\n  2  3  1  0\n  3  4  1  0\nM  END\n$$$$\n");
        fs::write(dir.join(format!("{name}.sdf")), text).unwrap();
    }

    fn batch_args(argv: &[&str]) -> BatchArgs {
        let mut full = vec!["gaussbio3d", "batch"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Batch(args) => args,
            Commands::Compute(_) => panic!("expected batch"),
        }
    }

    #[test]
    fn manifest_resolves_relative_paths_and_shares_structures() {
        let dir = tempfile::tempdir().unwrap();
        chain_sdf(dir.path(), "s0", 0.0);
        chain_sdf(dir.path(), "ligand", 0.7);
        let manifest_path = dir.path().join("pairs.csv");
        fs::write(
            &manifest_path,
            "structure_a,structure_b\ns0.sdf,ligand.sdf\ns0.sdf,\nligand.sdf,s0.sdf\n",
        )
        .unwrap();

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.structures.len(), 2);
        assert_eq!(manifest.pairs, vec![(0, Some(1)), (0, None), (1, Some(0))]);
        assert_eq!(manifest.pair_labels(), vec!["s0:ligand", "s0", "ligand:s0"]);
    }

    #[test]
    fn batch_writes_unprojected_features_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            chain_sdf(dir.path(), &format!("s{i}"), 0.2 * i as f64);
        }
        let manifest_path = dir.path().join("pairs.csv");
        fs::write(&manifest_path, "structure_a\ns0.sdf\ns1.sdf\ns2.sdf\n").unwrap();
        let out = dir.path().join("features.csv");

        run(
            batch_args(&[
                "-m",
                manifest_path.to_str().unwrap(),
                "-o",
                out.to_str().unwrap(),
                "--stats",
                "sum,std",
            ]),
            true,
        )
        .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        // One element group, four default scales, two statistics.
        assert_eq!(lines[0].split(',').count(), 1 + 8);
        assert!(lines[0].starts_with("pair,f0,f1"));
        assert!(lines[1].starts_with("s0,"));

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("features.json")).unwrap())
                .unwrap();
        assert_eq!(summary["pairs"], 3);
        assert_eq!(summary["shape"][1], 8);
        assert_eq!(summary["fit"]["status"], "unprojected");
    }

    #[test]
    fn batch_with_too_many_components_degrades() {
        let dir = tempfile::tempdir().unwrap();
        chain_sdf(dir.path(), "s0", 0.0);
        chain_sdf(dir.path(), "s1", 0.4);
        let manifest_path = dir.path().join("pairs.csv");
        fs::write(&manifest_path, "structure_a\ns0.sdf\ns1.sdf\n").unwrap();
        let out = dir.path().join("features.csv");

        run(
            batch_args(&[
                "-m",
                manifest_path.to_str().unwrap(),
                "-o",
                out.to_str().unwrap(),
                "--pca",
                "16",
            ]),
            true,
        )
        .unwrap();

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("features.json")).unwrap())
                .unwrap();
        assert_eq!(summary["fit"]["status"], "degraded");
        assert_eq!(summary["shape"][1], 20);
    }

    #[test]
    fn batch_projects_onto_principal_components() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            chain_sdf(dir.path(), &format!("s{i}"), 0.15 * i as f64);
        }
        chain_sdf(dir.path(), "ligand", 0.9);
        let manifest_path = dir.path().join("pairs.csv");
        let mut manifest = String::from("structure_a,structure_b\n");
        for i in 0..5 {
            manifest.push_str(&format!("s{i}.sdf,ligand.sdf\n"));
        }
        fs::write(&manifest_path, manifest).unwrap();
        let out = dir.path().join("features.csv");

        run(
            batch_args(&[
                "-m",
                manifest_path.to_str().unwrap(),
                "-o",
                out.to_str().unwrap(),
                "--pca",
                "2",
                "--no-whiten",
                "--signed",
                "--rbf-centers",
                "1,2,3",
            ]),
            true,
        )
        .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().next(), Some("pair,pc0,pc1"));
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("features.json")).unwrap())
                .unwrap();
        assert_eq!(summary["fit"]["status"], "projected");
        assert_eq!(summary["fit"]["explained_variance"].as_array().unwrap().len(), 2);
        assert_eq!(summary["config"]["projection"]["whiten"], false);
    }

    #[test]
    fn json_output_path_is_rejected() {
        assert!(summary_path_for(Path::new("out/features.json")).is_err());
        assert_eq!(
            summary_path_for(Path::new("out/features.csv")).unwrap(),
            PathBuf::from("out/features.json")
        );
    }
}
