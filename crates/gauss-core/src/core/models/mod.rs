//! # Geometry Model
//!
//! The entity set every molecular structure is reduced to before the linking kernel
//! runs: atoms ([`node::Node`]), directed bond pieces ([`curve::Segment`]), bonds or other
//! connectivity edges ([`curve::Curve`]), and the validated container
//! ([`structure::Structure`]).
//!
//! ## Usage
//!
//! ```
//! use gaussbio3d::core::models::{builder::StructureBuilder, node::Node};
//! use nalgebra::Point3;
//!
//! let mut builder = StructureBuilder::new("CO");
//! builder
//!     .add_node(Node::new(0, Point3::new(0.0, 0.0, 0.0), "C"))
//!     .add_node(Node::new(1, Point3::new(1.13, 0.0, 0.0), "O"))
//!     .add_bond(0, 1);
//! let structure = builder.build().unwrap();
//! assert_eq!(structure.num_segments(), 2);
//! ```

pub mod builder;
pub mod curve;
pub mod node;
pub mod structure;
