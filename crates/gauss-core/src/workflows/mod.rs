//! # Workflows Module
//!
//! High-level entry points over many structure pairs.
//!
//! - **Pipeline** ([`pipeline`]) - Batch featurization with fit/transform semantics
//! - **Projection** ([`projection`]) - PCA on the stacked descriptors
//! - **Presets** ([`presets`]) - Protein-ligand and protein flexibility bundles

pub mod pipeline;
pub mod presets;
pub mod projection;
