//! Readers for molecular file formats with explicit connectivity.
//!
//! Each reader turns atoms into [`Node`](crate::core::models::node::Node)s and each
//! listed bond into a half-bond curve. Bonds are never inferred from geometry; a file
//! without bond records yields a structure without segments.

pub mod bgf;
pub mod sdf;
pub mod traits;
