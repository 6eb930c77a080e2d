//! # Linking Kernel
//!
//! The numerical heart of the library: the closed-form Gauss linking integral between
//! two directed straight segments ([`kernel::segment_linking`]) and its aggregation
//! into a node-by-node linking matrix for two whole structures
//! ([`pairwise::pairwise_node_gli`]).
//!
//! The pairwise loop is `O(|segments_a| × |segments_b|)` and dominates the cost of
//! every descriptor. With the `parallel` feature it is split across rows of the
//! output matrix with `rayon`.

pub mod kernel;
pub mod pairwise;

pub use kernel::segment_linking;
pub use pairwise::{Aggregation, distance_matrix, pairwise_node_gli};
