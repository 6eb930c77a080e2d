//! Ready-made configurations for the two standard use cases: protein-ligand
//! interaction descriptors and protein flexibility (self-linking) descriptors.

use super::pipeline::{MgliPipeline, Projection};
use super::projection::PcaProjector;
use crate::core::grouping::GroupMode;
use crate::core::stats::Statistic;
use crate::engine::config::{ConfigError, MgliConfig, MgliConfigBuilder};

pub const DTI_DISTANCE_BINS: [f64; 5] = [3.0, 5.0, 7.0, 10.0, 15.0];
pub const DTI_MAX_DISTANCE: f64 = 15.0;
pub const DTI_DEFAULT_COMPONENTS: usize = 256;
pub const FLEXIBILITY_MAX_DISTANCE: f64 = 27.0;

const PRESET_STATS: [Statistic; 3] = [Statistic::Sum, Statistic::Median, Statistic::Std];

/// Protein-ligand configuration: bins at 3, 5, 7, 10 and 15 Å, unsigned linking,
/// `sum`/`median`/`std` pooling over element groups.
pub fn dti_config() -> Result<MgliConfig, ConfigError> {
    MgliConfigBuilder::new()
        .distance_bins(DTI_DISTANCE_BINS.to_vec())
        .signed(false)
        .stats(PRESET_STATS.to_vec())
        .group_mode_a(GroupMode::Element)
        .group_mode_b(GroupMode::Element)
        .max_distance(DTI_MAX_DISTANCE)
        .build()
}

/// [`dti_config`] followed by a whitened PCA (256 components unless overridden).
pub fn dti_pipeline(n_components: Option<usize>) -> Result<MgliPipeline, ConfigError> {
    let projector = PcaProjector::new(n_components.unwrap_or(DTI_DEFAULT_COMPONENTS), true);
    Ok(MgliPipeline::new(dti_config()?, Projection::Pca(projector)))
}

/// Protein flexibility configuration: 1 Å bins from 5 to 27 Å, unsigned linking,
/// `sum`/`median`/`std` pooling over element groups.
pub fn flexibility_config() -> Result<MgliConfig, ConfigError> {
    let edges = (5..=27).map(f64::from).collect();
    MgliConfigBuilder::new()
        .distance_bins(edges)
        .signed(false)
        .stats(PRESET_STATS.to_vec())
        .group_mode_a(GroupMode::Element)
        .group_mode_b(GroupMode::Element)
        .max_distance(FLEXIBILITY_MAX_DISTANCE)
        .build()
}

/// [`flexibility_config`] without projection; pairs usually omit the partner.
pub fn flexibility_pipeline() -> Result<MgliPipeline, ConfigError> {
    Ok(MgliPipeline::new(flexibility_config()?, Projection::None))
}
