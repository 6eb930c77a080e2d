use super::config::ConfigError;
use crate::workflows::projection::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error(
        "Descriptor of pair {pair} has width {found}, expected {expected}; \
         fix the group vocabularies to stack pairs with different groups"
    )]
    FeatureWidthMismatch {
        pair: usize,
        expected: usize,
        found: usize,
    },

    #[error("Projection failed: {0}")]
    Projection(#[from] ProjectionError),
}
