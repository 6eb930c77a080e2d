//! # GaussBio3D Core Library
//!
//! Multiscale Gaussian linking integral (mGLI) descriptors for pairs of 3D molecular
//! structures. Bonds of two structures are treated as polygonal curves; the linking
//! integral between every pair of bond segments is aggregated per atom pair, weighted
//! by distance scale, and pooled by atom group into fixed-layout feature vectors.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless geometry model, the linking kernel, scale
//!   schemes, grouping, pooling statistics and file readers.
//!
//! - **[`engine`]: The Logic Core.** The validated configuration and the descriptor
//!   assembler that turns a structure pair into global, per-node and pairwise features.
//!
//! - **[`workflows`]: The Public API.** The fit/transform pipeline over many structure
//!   pairs, the optional PCA projection, and the preset configurations.
//!
//! ## Quick Start
//!
//! ```
//! use gaussbio3d::core::models::{builder::StructureBuilder, node::Node};
//! use gaussbio3d::engine::config::MgliConfigBuilder;
//! use gaussbio3d::engine::descriptor::global_descriptor;
//! use nalgebra::Point3;
//!
//! let mut a = StructureBuilder::new("A");
//! a.add_node(Node::new(0, Point3::new(-1.0, 0.0, 0.0), "C"))
//!     .add_node(Node::new(1, Point3::new(1.0, 0.0, 0.0), "C"))
//!     .add_bond(0, 1);
//! let mut b = StructureBuilder::new("B");
//! b.add_node(Node::new(0, Point3::new(0.0, -1.0, 1.0), "N"))
//!     .add_node(Node::new(1, Point3::new(0.0, 1.0, 1.0), "N"))
//!     .add_bond(0, 1);
//! let (a, b) = (a.build().unwrap(), b.build().unwrap());
//!
//! let config = MgliConfigBuilder::new().build().unwrap();
//! let descriptor = global_descriptor(&a, &b, &config).unwrap();
//! assert_eq!(descriptor.len(), 1 * 1 * 4 * 5);
//! ```

pub mod core;
pub mod engine;
pub mod workflows;
