//! Data-driven model loading for the regulatory sequence simulator.
//!
//! A model directory holds a `network` file (gene names and regulatory
//! links) and an optional `parameters` file, each in RON, TOML or JSON.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, ModelData, load_model, load_network, load_parameters};
