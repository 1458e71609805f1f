//! Nucleoid-associated proteins on an activation cascade.
//!
//! Lays out a four-stage cascade, turns the last stage into a NAP gene,
//! and reports the NAP binding sites appended to the sequence along with
//! their distances and binding factors.
//!
//! Run with: `cargo run -p regsim-examples --example nap_seeding`

use regsim_core::config::{Parameters, Sampler};
use regsim_core::engine::Engine;
use regsim_core::graph::RegulatoryNetwork;
use regsim_core::site::SiteKind;
use regsim_core::topology::TopologyBuilder;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut network = RegulatoryNetwork::new();
    let stages: Vec<_> = (0..4)
        .map(|i| network.add_gene(&format!("stage{i}")).expect("unique stage names"))
        .collect();
    for pair in stages.windows(2) {
        network.connect(pair[0], pair[1], 1).expect("stages exist");
    }

    let mut params = Parameters::default();
    params.sequence.gene.length = Sampler::Constant(800.0);
    params.sequence.nap.mean = 3.0;
    params.sequence.nap.prob = 0.5;

    let mut engine = Engine::new(params, 11).expect("valid parameters");
    let mut builder = TopologyBuilder::new(&mut engine);
    let genes = builder.from_network(&network).expect("lay out cascade");
    let last = genes.sites()[genes.len() - 1];
    let naps = builder.seed_naps(&[last]).expect("seed NAP sites");
    engine.initialise();

    println!("sequence: {}", engine.describe_sequence());
    println!("NAP product: {:?}", naps[0]);

    for (index, &site) in engine.sequence().sites().iter().enumerate() {
        let element = engine.sites().get(site).expect("sequence sites exist");
        if element.kind() != SiteKind::NapBinding {
            continue;
        }
        let binding = engine.sites().binding(site).expect("NAP sites are binding sites");
        println!(
            "  [{index}] {element}  regulation {:+}  distance {:>5}  factor {:.4}",
            binding.regulation,
            binding.distance,
            binding.factor.to_num::<f64>(),
        );
    }

    engine.introduce_polymerase();
    let reports = engine.run(12).expect("engine is initialised");
    for t in reports.iter().flat_map(|r| r.transcriptions.iter()) {
        println!("transcribed {} from {:?}", t.amount, t.gene);
    }
}
