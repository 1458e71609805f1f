//! Toggle switch: two genes that repress each other.
//!
//! Builds the network in code, seeds one repressor, and streams
//! polymerases along the sequence. The seeded gene keeps its partner
//! switched off, so only it is transcribed.
//!
//! Run with: `RUST_LOG=debug cargo run -p regsim-examples --example toggle_switch`

use regsim_core::config::{Parameters, Sampler};
use regsim_core::fixed::Fixed64;
use regsim_core::graph::RegulatoryNetwork;
use regsim_core::mobile::ProductKind;
use regsim_core::topology::build_engine;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- Network ---

    let mut network = RegulatoryNetwork::new();
    let lac = network.add_gene("lacI").expect("add lacI");
    let tet = network.add_gene("tetR").expect("add tetR");
    network.connect(lac, tet, -1).expect("lacI -| tetR");
    network.connect(tet, lac, -1).expect("tetR -| lacI");

    // --- Parameters: fixed lengths, slow decay ---

    let mut params = Parameters::default();
    params.sequence.gene.length = Sampler::Constant(1000.0);
    params.sequence.gene.leakage = Sampler::Constant(2.0);
    params.mobile.tf.degradation = Sampler::Constant(0.05);

    let (mut engine, _genes) = build_engine(&network, params, 42).expect("build toggle switch");
    println!("sequence: {}", engine.describe_sequence());

    let lac_tf = engine
        .products()
        .lookup(ProductKind::TranscriptionFactor, "lacI")
        .expect("lacI product");
    let tet_tf = engine
        .products()
        .lookup(ProductKind::TranscriptionFactor, "tetR")
        .expect("tetR product");
    engine.set_concentration(lac_tf, Fixed64::from_num(20));

    // --- Run ---

    for _ in 0..60 {
        engine.introduce_polymerase();
        let report = engine.step().expect("engine is initialised");
        if report.tick % 10 == 0 {
            println!(
                "tick {:>3}  lacI {:>8.3}  tetR {:>8.3}  polymerases {}",
                report.tick,
                engine.concentration(lac_tf).to_num::<f64>(),
                engine.concentration(tet_tf).to_num::<f64>(),
                engine.polymerases().len(),
            );
        }
    }
}
