//! Crate-level test module.
//!
//! - `determinism.rs`: identical inputs must reproduce identical matches
//! - `integration.rs`: end-to-end turn scenarios through the public API
//! - `properties.rs`: property tests over the solver and damage curves
//! - `helpers.rs`: world/command factories shared by the above

mod helpers;

pub use helpers::*;
