//! # Core Module
//!
//! Stateless building blocks of the descriptor engine: the geometry model every
//! molecular structure is reduced to, the Gauss linking kernel over bond segments,
//! distance scale schemes, grouping and pooling statistics, and structure readers.
//!
//! ## Architecture
//!
//! - **Geometry** ([`models`]) - Nodes, segments, curves and the validated `Structure`
//! - **Linking** ([`linking`]) - Segment-pair kernel and per-node-pair aggregation
//! - **Scales** ([`scale`]) - Hard distance bins and Gaussian radial basis weighting
//! - **Grouping** ([`grouping`]) - Element, residue-class and custom group labels
//! - **Statistics** ([`stats`]) - Pooling statistics over linking values
//! - **File I/O** ([`io`]) - SDF and BGF readers with explicit connectivity

pub mod grouping;
pub mod io;
pub mod linking;
pub mod models;
pub mod scale;
pub mod stats;
