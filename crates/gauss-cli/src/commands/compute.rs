use super::read_structure;
use crate::cli::ComputeArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::output::{self, RowIndex};
use gaussbio3d::engine::descriptor::{self, FeatureShapes};
use nalgebra::DMatrix;
use serde::Serialize;
use std::fs;
use tracing::info;

#[derive(Serialize)]
struct ComputeSummary<'a> {
    #[serde(flatten)]
    shapes: &'a FeatureShapes,
    files: [&'static str; 4],
    config: PartialConfig,
}

pub fn run(args: ComputeArgs) -> Result<()> {
    info!("Merging configuration layers...");
    let settings = PartialConfig::load(&args.config)?.resolve()?;

    let a = read_structure(&args.structure_a)?;
    let b = match &args.structure_b {
        Some(path) => Some(read_structure(path)?),
        None => None,
    };
    let b = b.as_ref().unwrap_or(&a);

    println!(
        "Computing descriptors for '{}' ({} nodes) against '{}' ({} nodes)...",
        a.name(),
        a.num_nodes(),
        b.name(),
        b.num_nodes()
    );
    let features = descriptor::compute_all(&a, b, &settings.config)?;
    let shapes = &features.shapes;
    info!(
        global = shapes.global,
        node_a = ?shapes.node_a,
        node_b = ?shapes.node_b,
        "Descriptors computed."
    );

    fs::create_dir_all(&args.output)?;
    let dir = &args.output;

    let global = DMatrix::from_row_slice(1, features.global.len(), features.global.as_slice());
    output::write_matrix_file(
        &dir.join("global.csv"),
        &output::global_columns(shapes),
        None,
        &global,
    )?;

    let node_columns = output::node_columns(shapes);
    output::write_matrix_file(
        &dir.join("node_a.csv"),
        &node_columns,
        Some(&RowIndex {
            name: "node_id",
            labels: output::node_ids(&a),
        }),
        &features.node_a,
    )?;
    output::write_matrix_file(
        &dir.join("node_b.csv"),
        &node_columns,
        Some(&RowIndex {
            name: "node_id",
            labels: output::node_ids(b),
        }),
        &features.node_b,
    )?;
    output::write_matrix_file(
        &dir.join("pairwise.csv"),
        &output::node_ids(b),
        Some(&RowIndex {
            name: "node_id",
            labels: output::node_ids(&a),
        }),
        &features.pairwise,
    )?;

    let summary = ComputeSummary {
        shapes,
        files: ["global.csv", "node_a.csv", "node_b.csv", "pairwise.csv"],
        config: PartialConfig::describe(&settings.config, &settings.projection),
    };
    output::write_json(&dir.join("summary.json"), &summary)?;

    println!(
        "✓ Global descriptor of length {} and node features written to: {}",
        shapes.global,
        dir.display()
    );
    Ok(())
}
