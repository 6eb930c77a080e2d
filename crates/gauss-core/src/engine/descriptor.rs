use super::config::MgliConfig;
use super::error::EngineError;
use crate::core::grouping::GroupAxis;
use crate::core::linking::pairwise::{Aggregation, pairwise_node_gli};
use crate::core::models::structure::Structure;
use crate::core::scale::{ScaleScheme, ScaledStack};
use crate::core::stats::Statistic;
use itertools::iproduct;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::{debug, instrument};

/// The kernel output for one structure pair, computed once and shared by every
/// descriptor built from it.
struct LinkingLayers {
    gij: DMatrix<f64>,
    stack: ScaledStack,
}

impl LinkingLayers {
    fn compute(a: &Structure, b: &Structure, config: &MgliConfig) -> Self {
        let (gij, rij) = pairwise_node_gli(a, b, config.signed, config.aggregation);
        let stack = config.scales.apply(&gij, &rij);
        Self { gij, stack }
    }
}

/// Length of a global descriptor for the given group counts.
pub fn descriptor_len(groups_a: usize, groups_b: usize, config: &MgliConfig) -> usize {
    groups_a * groups_b * config.num_scales() * config.num_stats()
}

/// Computes the global descriptor of a structure pair.
///
/// Nodes of each side are partitioned into groups under the configured group modes
/// (and vocabularies, if any). For every group pair and scale, the statistics are
/// evaluated over the scaled linking values of all node pairs in the block. The
/// vector has length `G_A × G_B × K × S` and is flattened with the group of `A`
/// outermost, then the group of `B`, then the scale, then the statistic.
///
/// # Errors
///
/// Currently infallible for a valid configuration; the `Result` mirrors the rest of
/// the descriptor API.
#[instrument(skip_all, name = "global_descriptor", fields(a = a.name(), b = b.name()))]
pub fn global_descriptor(
    a: &Structure,
    b: &Structure,
    config: &MgliConfig,
) -> Result<DVector<f64>, EngineError> {
    let layers = LinkingLayers::compute(a, b, config);
    let axis_a = GroupAxis::resolve(a, config.group_mode_a, config.groups_a.as_deref());
    let axis_b = GroupAxis::resolve(b, config.group_mode_b, config.groups_b.as_deref());
    let descriptor = pool_global(&layers.stack, &axis_a, &axis_b, &config.stats);
    debug!(
        groups_a = axis_a.len(),
        groups_b = axis_b.len(),
        len = descriptor.len(),
        "Global descriptor assembled."
    );
    Ok(descriptor)
}

/// Computes per-node features of `focal`, pooled over every node of `partner`.
///
/// The matrix has shape `(N_focal, K × S)`; column `k * S + s` holds statistic `s`
/// of scale `k`.
#[instrument(skip_all, name = "node_features", fields(focal = focal.name()))]
pub fn node_features(
    focal: &Structure,
    partner: &Structure,
    config: &MgliConfig,
) -> Result<DMatrix<f64>, EngineError> {
    let layers = LinkingLayers::compute(focal, partner, config);
    Ok(pool_rows(&layers.stack, &config.stats))
}

/// The raw `(N_A, N_B)` linking matrix, before any distance weighting.
pub fn pairwise_matrix(a: &Structure, b: &Structure, signed: bool, agg: Aggregation) -> DMatrix<f64> {
    pairwise_node_gli(a, b, signed, agg).0
}

/// The `(N_A, N_B)` linking matrix with each cell weighted by the sum of its scale
/// weights, i.e. the sum of the `K` scaled layers.
pub fn pairwise_scaled_matrix(a: &Structure, b: &Structure, config: &MgliConfig) -> DMatrix<f64> {
    let layers = LinkingLayers::compute(a, b, config);
    sum_layers(&layers.stack, layers.gij.nrows(), layers.gij.ncols())
}

/// Shapes and axis labels of a [`FeatureSet`], suitable for a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureShapes {
    pub structure_a: String,
    pub structure_b: String,
    pub groups_a: Vec<String>,
    pub groups_b: Vec<String>,
    pub num_scales: usize,
    pub stats: Vec<String>,
    pub signed: bool,
    pub aggregation: String,
    pub global: usize,
    pub node_a: [usize; 2],
    pub node_b: [usize; 2],
    pub pairwise: [usize; 2],
}

/// Every descriptor of one structure pair, from a single kernel evaluation.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub global: DVector<f64>,
    pub node_a: DMatrix<f64>,
    pub node_b: DMatrix<f64>,
    pub pairwise: DMatrix<f64>,
    pub shapes: FeatureShapes,
}

/// Computes the global descriptor, both node-feature matrices and the raw pairwise
/// matrix of a structure pair.
///
/// `node_b` pools each node of `b` over all nodes of `a`, so it equals
/// `node_features(b, a, config)`.
#[instrument(skip_all, name = "compute_all", fields(a = a.name(), b = b.name()))]
pub fn compute_all(
    a: &Structure,
    b: &Structure,
    config: &MgliConfig,
) -> Result<FeatureSet, EngineError> {
    let layers = LinkingLayers::compute(a, b, config);
    let axis_a = GroupAxis::resolve(a, config.group_mode_a, config.groups_a.as_deref());
    let axis_b = GroupAxis::resolve(b, config.group_mode_b, config.groups_b.as_deref());

    let global = pool_global(&layers.stack, &axis_a, &axis_b, &config.stats);
    let node_a = pool_rows(&layers.stack, &config.stats);
    let transposed: ScaledStack = layers.stack.iter().map(|l| l.transpose()).collect();
    let node_b = pool_rows(&transposed, &config.stats);

    let shapes = FeatureShapes {
        structure_a: a.name().to_string(),
        structure_b: b.name().to_string(),
        groups_a: axis_a.labels().to_vec(),
        groups_b: axis_b.labels().to_vec(),
        num_scales: config.num_scales(),
        stats: config.stats.iter().map(|s| s.to_string()).collect(),
        signed: config.signed,
        aggregation: config.aggregation.to_string(),
        global: global.len(),
        node_a: [node_a.nrows(), node_a.ncols()],
        node_b: [node_b.nrows(), node_b.ncols()],
        pairwise: [layers.gij.nrows(), layers.gij.ncols()],
    };
    debug!(?shapes, "Feature set assembled.");

    Ok(FeatureSet {
        global,
        node_a,
        node_b,
        pairwise: layers.gij,
        shapes,
    })
}

fn pool_global(
    stack: &ScaledStack,
    axis_a: &GroupAxis,
    axis_b: &GroupAxis,
    stats: &[Statistic],
) -> DVector<f64> {
    let members_a: Vec<Vec<usize>> = (0..axis_a.len()).map(|g| axis_a.members(g)).collect();
    let members_b: Vec<Vec<usize>> = (0..axis_b.len()).map(|g| axis_b.members(g)).collect();

    let mut out = Vec::with_capacity(members_a.len() * members_b.len() * stack.len() * stats.len());
    let mut values = Vec::new();
    for (rows, cols, layer) in iproduct!(members_a.iter(), members_b.iter(), stack.iter()) {
        values.clear();
        values.extend(iproduct!(rows, cols).map(|(&i, &j)| layer[(i, j)]));
        out.extend(stats.iter().map(|s| s.compute(&values)));
    }
    DVector::from_vec(out)
}

fn pool_rows(stack: &ScaledStack, stats: &[Statistic]) -> DMatrix<f64> {
    let (nrows, ncols) = stack.first().map_or((0, 0), |l| l.shape());
    let width = stack.len() * stats.len();
    let mut values = Vec::with_capacity(ncols);
    let mut out = Vec::with_capacity(nrows * width);
    for i in 0..nrows {
        for layer in stack {
            values.clear();
            values.extend(layer.row(i).iter().copied());
            out.extend(stats.iter().map(|s| s.compute(&values)));
        }
    }
    DMatrix::from_row_slice(nrows, width, &out)
}

fn sum_layers(stack: &ScaledStack, nrows: usize, ncols: usize) -> DMatrix<f64> {
    stack
        .iter()
        .fold(DMatrix::zeros(nrows, ncols), |acc, layer| acc + layer)
}
