//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::{Parameters, Sampler};
use crate::engine::Engine;
use crate::fixed::Fixed64;
use crate::graph::RegulatoryNetwork;
use crate::id::{ProductId, SiteId};
use crate::mobile::ProductKind;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Parameters
// ===========================================================================

/// Parameters with every sampler constant: genes 1000 long, spacers 500,
/// binding sites 10, production 1, leakage 0, no degradation.
pub fn deterministic_params() -> Parameters {
    let mut params = Parameters::default();
    params.sequence.gene.length = Sampler::Constant(1000.0);
    params.sequence.empty.length = Sampler::Constant(500.0);
    for rates in [
        &mut params.mobile.enzyme,
        &mut params.mobile.tf,
        &mut params.mobile.nap,
        &mut params.mobile.rnap,
    ] {
        rates.degradation = Sampler::Constant(0.0);
    }
    params
}

// ===========================================================================
// Engines
// ===========================================================================

/// One promoter-less gene transcribing a transcription factor at `leakage`,
/// initialised and ready to step.
pub fn single_gene_engine(leakage: f64) -> (Engine, SiteId, ProductId) {
    let mut params = deterministic_params();
    params.sequence.gene.leakage = Sampler::Constant(leakage);
    let mut engine = Engine::new(params, 1).expect("deterministic params are valid");
    let product = engine.product(ProductKind::TranscriptionFactor, Some("out"));
    let gene = engine.gene_site(Some("g"), Some(product));
    engine.push_site(gene).expect("gene was just created");
    engine.initialise();
    (engine, gene, product)
}

// ===========================================================================
// Networks
// ===========================================================================

/// Two mutually repressing genes.
pub fn toggle_network() -> RegulatoryNetwork {
    let mut net = RegulatoryNetwork::new();
    let a = net.add_gene("lacI").expect("fresh network");
    let b = net.add_gene("tetR").expect("fresh network");
    net.connect(a, b, -1).expect("both genes exist");
    net.connect(b, a, -1).expect("both genes exist");
    net
}

/// A ring of `n` genes, each repressing the next.
pub fn repressilator_network(n: usize) -> RegulatoryNetwork {
    let mut net = RegulatoryNetwork::new();
    let genes: Vec<_> = (0..n)
        .map(|i| net.add_gene(&format!("gene{i}")).expect("unique names"))
        .collect();
    for i in 0..n {
        net.connect(genes[i], genes[(i + 1) % n], -1)
            .expect("both genes exist");
    }
    net
}

/// A linear chain where each gene activates the next.
pub fn activation_cascade(n: usize) -> RegulatoryNetwork {
    let mut net = RegulatoryNetwork::new();
    let genes: Vec<_> = (0..n)
        .map(|i| net.add_gene(&format!("stage{i}")).expect("unique names"))
        .collect();
    for pair in genes.windows(2) {
        net.connect(pair[0], pair[1], 1).expect("both genes exist");
    }
    net
}
