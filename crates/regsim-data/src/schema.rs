//! Serde data file structs for model definitions.
//!
//! A network file lists gene names and the regulatory links between them.
//! Links refer to genes by name; the loader resolves them.

use serde::Deserialize;

/// A regulatory network as written on disk.
///
/// RON / JSON: a single struct. TOML: top-level `genes` and `links` keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkData {
    #[serde(default)]
    pub genes: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkData>,
}

/// One regulatory link.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkData {
    pub regulator: String,
    pub target: String,
    /// Omitted means neutral; neutral promoters are re-drawn as +1 or -1.
    #[serde(default)]
    pub regulation: i32,
}
