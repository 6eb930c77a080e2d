//! # Engine Module
//!
//! Turns a validated configuration and a pair of structures into descriptors.
//!
//! - **Configuration** ([`config`]) - `MgliConfig` and its validating builder
//! - **Descriptors** ([`descriptor`]) - Global, per-node and pairwise features
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod descriptor;
pub mod error;
pub mod progress;
