//! Repressilator loaded from data files.
//!
//! Reads `data/repressilator/network.ron` and `parameters.toml`, builds the
//! engine, seeds the first repressor and prints the three transcription
//! factor pools as polymerases flow over the ring.
//!
//! Run with: `cargo run -p regsim-examples --example repressilator_from_files`

use std::path::Path;

use regsim_core::fixed::Fixed64;
use regsim_core::mobile::ProductKind;
use regsim_data::load_model;
use tracing::info;
use tracing_subscriber::EnvFilter;

const GENES: [&str; 3] = ["lacI", "tetR", "cI"];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/repressilator");
    let model = load_model(&dir).expect("load repressilator model");
    let (mut engine, genes) = model.into_engine(7).expect("build repressilator");
    println!("{} genes: {}", genes.len(), engine.describe_sequence());

    let products: Vec<_> = GENES
        .iter()
        .map(|name| {
            engine
                .products()
                .lookup(ProductKind::TranscriptionFactor, name)
                .expect("every ring gene regulates the next")
        })
        .collect();
    engine.set_concentration(products[0], Fixed64::from_num(10));

    let mut transcribed = Fixed64::ZERO;
    for step in 0..200 {
        if step % 2 == 0 {
            engine.introduce_polymerase();
        }
        let report = engine.step().expect("engine is initialised");
        transcribed += report.total_transcribed();

        if report.tick % 25 == 0 {
            let pools: Vec<String> = GENES
                .iter()
                .zip(&products)
                .map(|(name, &p)| format!("{name} {:>7.2}", engine.concentration(p).to_num::<f64>()))
                .collect();
            println!("tick {:>3}  {}", report.tick, pools.join("  "));
        }
    }

    info!(
        %transcribed,
        hash = format_args!("{:#018x}", engine.state_hash()),
        "run finished"
    );
}
