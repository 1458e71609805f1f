//! Resolution pipeline: reads data files, resolves gene references, builds
//! parameters and networks.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers used by the higher-level loading functions.

use crate::schema::NetworkData;
use regsim_core::config::{ConfigError, Parameters};
use regsim_core::engine::Engine;
use regsim_core::graph::{NetworkError, RegulatoryNetwork};
use regsim_core::id::GeneNodeId;
use regsim_core::topology::{GeneMap, TopologyError, build_engine};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// Parameters parsed but failed validation.
    #[error("invalid parameters in {file}: {source}")]
    InvalidConfig {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_err(e.to_string())),
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load and validate a parameter set. Missing sections take their defaults.
pub fn load_parameters(path: &Path) -> Result<Parameters, DataLoadError> {
    let params: Parameters = deserialize_file(path)?;
    params
        .validate()
        .map_err(|source| DataLoadError::InvalidConfig {
            file: path.to_path_buf(),
            source,
        })?;
    debug!(file = %path.display(), "parameters loaded");
    Ok(params)
}

/// Load a regulatory network, resolving link endpoints by gene name.
pub fn load_network(path: &Path) -> Result<RegulatoryNetwork, DataLoadError> {
    let data: NetworkData = deserialize_file(path)?;
    let mut network = RegulatoryNetwork::new();

    for name in &data.genes {
        network.add_gene(name).map_err(|e| match e {
            NetworkError::DuplicateGene(name) => DataLoadError::DuplicateName {
                file: path.to_path_buf(),
                name,
            },
            other => other.into(),
        })?;
    }

    for link in &data.links {
        let regulator = gene_ref(&network, &link.regulator, path)?;
        let target = gene_ref(&network, &link.target, path)?;
        network.connect(regulator, target, link.regulation)?;
    }

    debug!(
        file = %path.display(),
        genes = network.gene_count(),
        links = network.link_count(),
        "network loaded"
    );
    Ok(network)
}

fn gene_ref(
    network: &RegulatoryNetwork,
    name: &str,
    file: &Path,
) -> Result<GeneNodeId, DataLoadError> {
    network
        .gene_id(name)
        .ok_or_else(|| DataLoadError::UnresolvedRef {
            file: file.to_path_buf(),
            name: name.to_string(),
            expected_kind: "gene",
        })
}

/// A network plus the parameters to simulate it with.
#[derive(Debug)]
pub struct ModelData {
    pub parameters: Parameters,
    pub network: RegulatoryNetwork,
}

impl ModelData {
    /// Lay the network out on a fresh, initialised engine.
    pub fn into_engine(self, seed: u64) -> Result<(Engine, GeneMap), DataLoadError> {
        Ok(build_engine(&self.network, self.parameters, seed)?)
    }
}

/// Load a model directory: `network.{ron,toml,json}` is required,
/// `parameters.{ron,toml,json}` is optional and defaults when absent.
pub fn load_model(dir: &Path) -> Result<ModelData, DataLoadError> {
    let network = load_network(&require_data_file(dir, "network")?)?;
    let parameters = match find_data_file(dir, "parameters")? {
        Some(path) => load_parameters(&path)?,
        None => Parameters::default(),
    };
    Ok(ModelData {
        parameters,
        network,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use regsim_core::config::Sampler;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "regsim_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const TOGGLE_JSON: &str = r#"{
        "genes": ["lacI", "tetR"],
        "links": [
            { "regulator": "lacI", "target": "tetR", "regulation": -1 },
            { "regulator": "tetR", "target": "lacI", "regulation": -1 }
        ]
    }"#;

    // -----------------------------------------------------------------------
    // detect_format / find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("n.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("n.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("n.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        assert!(matches!(
            detect_format(Path::new("network.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("network")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_missing_is_none() {
        let dir = make_test_dir("find_missing");
        assert_eq!(find_data_file(&dir, "network").unwrap(), None);
        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("network.ron"), "()").unwrap();
        fs::write(dir.join("network.json"), "{}").unwrap();
        assert!(matches!(
            find_data_file(&dir, "network"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn require_data_file_names_the_missing_file() {
        let dir = make_test_dir("require_missing");
        let err = require_data_file(&dir, "network").unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { ref file, .. } if file == "network"));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_network
    // -----------------------------------------------------------------------

    #[test]
    fn load_network_json() {
        let dir = make_test_dir("net_json");
        let path = dir.join("network.json");
        fs::write(&path, TOGGLE_JSON).unwrap();

        let net = load_network(&path).unwrap();
        assert_eq!(net.gene_count(), 2);
        assert_eq!(net.link_count(), 2);
        let lac = net.gene_id("lacI").unwrap();
        let tet = net.gene_id("tetR").unwrap();
        assert_eq!(net.regulators_of(tet), vec![(lac, -1)]);

        cleanup(&dir);
    }

    #[test]
    fn load_network_toml() {
        let dir = make_test_dir("net_toml");
        let path = dir.join("network.toml");
        fs::write(
            &path,
            r#"
genes = ["a", "b", "c"]

[[links]]
regulator = "a"
target = "b"
regulation = 1

[[links]]
regulator = "b"
target = "c"
"#,
        )
        .unwrap();

        let net = load_network(&path).unwrap();
        let b = net.gene_id("b").unwrap();
        let c = net.gene_id("c").unwrap();
        assert_eq!(net.regulators_of(c), vec![(b, 0)]);

        cleanup(&dir);
    }

    #[test]
    fn load_network_unresolved_gene() {
        let dir = make_test_dir("net_unresolved");
        let path = dir.join("network.json");
        fs::write(
            &path,
            r#"{ "genes": ["a"], "links": [{ "regulator": "a", "target": "ghost" }] }"#,
        )
        .unwrap();

        let err = load_network(&path).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { ref name, expected_kind: "gene", .. } if name == "ghost"
        ));

        cleanup(&dir);
    }

    #[test]
    fn load_network_duplicate_gene() {
        let dir = make_test_dir("net_duplicate");
        let path = dir.join("network.ron");
        fs::write(&path, r#"(genes: ["a", "a"])"#).unwrap();

        match load_network(&path) {
            Err(DataLoadError::DuplicateName { file, name }) => {
                assert_eq!(file, path);
                assert_eq!(name, "a");
            }
            other => panic!("expected duplicate name, got {other:?}"),
        }

        cleanup(&dir);
    }

    #[test]
    fn load_network_parse_error_names_file() {
        let dir = make_test_dir("net_parse");
        let path = dir.join("network.json");
        fs::write(&path, "{ not json").unwrap();

        match load_network(&path) {
            Err(DataLoadError::Parse { file, .. }) => assert_eq!(file, path),
            other => panic!("expected parse error, got {other:?}"),
        }

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_parameters
    // -----------------------------------------------------------------------

    #[test]
    fn load_parameters_partial_ron() {
        let dir = make_test_dir("params_ron");
        let path = dir.join("parameters.ron");
        fs::write(
            &path,
            r#"(
                sequence: (tf: (threshold: 2.5)),
                mobile: (tf: (degradation: uniform(min: 0.1, max: 0.3))),
            )"#,
        )
        .unwrap();

        let params = load_parameters(&path).unwrap();
        assert_eq!(params.sequence.tf.threshold, 2.5);
        assert_eq!(
            params.mobile.tf.degradation,
            Sampler::Uniform { min: 0.1, max: 0.3 }
        );
        assert_eq!(params.mobile.nap, Parameters::default().mobile.nap);

        cleanup(&dir);
    }

    #[test]
    fn load_parameters_toml() {
        let dir = make_test_dir("params_toml");
        let path = dir.join("parameters.toml");
        fs::write(
            &path,
            r#"
[sequence.gene]
leakage = { constant = 0.25 }

[rules]
degradation = "binomial"
"#,
        )
        .unwrap();

        let params = load_parameters(&path).unwrap();
        assert_eq!(params.sequence.gene.leakage, Sampler::Constant(0.25));
        assert_eq!(
            params.rules.degradation,
            regsim_core::config::DegradationRule::Binomial
        );

        cleanup(&dir);
    }

    #[test]
    fn load_parameters_rejects_invalid_values() {
        let dir = make_test_dir("params_invalid");
        let path = dir.join("parameters.json");
        fs::write(
            &path,
            r#"{ "mobile": { "rnap": { "diffusion": { "constant": 0.0 } } } }"#,
        )
        .unwrap();

        assert!(matches!(
            load_parameters(&path),
            Err(DataLoadError::InvalidConfig {
                source: ConfigError::NonPositiveDiffusion { .. },
                ..
            })
        ));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_model
    // -----------------------------------------------------------------------

    #[test]
    fn load_model_without_parameters_uses_defaults() {
        let dir = make_test_dir("model_defaults");
        fs::write(dir.join("network.json"), TOGGLE_JSON).unwrap();

        let model = load_model(&dir).unwrap();
        assert_eq!(model.parameters, Parameters::default());
        assert_eq!(model.network.gene_count(), 2);

        cleanup(&dir);
    }

    #[test]
    fn load_model_requires_network() {
        let dir = make_test_dir("model_missing");
        fs::write(dir.join("parameters.json"), "{}").unwrap();

        assert!(matches!(
            load_model(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn model_into_engine_is_ready() {
        let dir = make_test_dir("model_engine");
        fs::write(dir.join("network.json"), TOGGLE_JSON).unwrap();

        let (mut engine, genes) = load_model(&dir).unwrap().into_engine(3).unwrap();
        assert_eq!(genes.len(), 2);
        assert!(engine.is_initialised());
        assert!(engine.introduce_polymerase());
        assert!(engine.step().is_ok());

        cleanup(&dir);
    }

    #[test]
    fn out_of_range_regulation_surfaces_as_topology_error() {
        let dir = make_test_dir("model_bad_regulation");
        fs::write(
            dir.join("network.json"),
            r#"{ "genes": ["a", "b"], "links": [{ "regulator": "a", "target": "b", "regulation": 5 }] }"#,
        )
        .unwrap();

        let model = load_model(&dir).unwrap();
        assert!(matches!(
            model.into_engine(1),
            Err(DataLoadError::Topology(TopologyError::Site(_)))
        ));

        cleanup(&dir);
    }
}
