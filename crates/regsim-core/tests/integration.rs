//! Integration tests for the sequence engine.
//!
//! These tests exercise end-to-end behaviour across the public API:
//! topology construction, initialisation, the step pipeline, polymerase
//! traffic, and reset.

use regsim_core::config::{Parameters, Sampler};
use regsim_core::engine::Engine;
use regsim_core::fixed::Fixed64;
use regsim_core::mobile::ProductKind;
use regsim_core::test_utils::*;
use regsim_core::topology::{TopologyBuilder, build_engine};

// ===========================================================================
// Test 1: Single gene, single polymerase
// ===========================================================================
//
// G (no promoters, leakage L) with one polymerase: bind, transcribe, leave,
// removed. Four steps.

#[test]
fn single_gene_four_step_lifecycle() {
    let (mut engine, _, product) = single_gene_engine(2.5);
    assert!(engine.introduce_polymerase());

    let reports = engine.run(4).unwrap();
    assert_eq!(reports[0].bound.len(), 1);
    assert_eq!(reports[1].total_transcribed(), fixed(2.5));
    assert_eq!(reports[2].departed.len(), 1);
    assert_eq!(reports[3].removed.len(), 1);

    assert_eq!(engine.concentration(product), fixed(2.5));
    assert!(engine.polymerases().is_empty());
}

#[test]
fn default_degradation_consumes_output_in_the_same_step() {
    let mut params = Parameters::default();
    params.sequence.gene.leakage = Sampler::Constant(4.0);
    let mut engine = Engine::new(params, 3).unwrap();
    let product = engine.product(ProductKind::TranscriptionFactor, None);
    let gene = engine.gene_site(None, Some(product));
    engine.push_site(gene).unwrap();
    engine.initialise();
    engine.introduce_polymerase();

    let reports = engine.run(2).unwrap();
    assert_eq!(reports[1].total_transcribed(), fixed(4.0));
    assert_eq!(engine.concentration(product), Fixed64::ZERO);
}

// ===========================================================================
// Test 2: Toggle switch
// ===========================================================================
//
// lacI -| tetR and tetR -| lacI. Seeding lacI represses tetR, so a
// polymerase transcribes lacI and runs past tetR.

#[test]
fn toggle_switch_follows_the_seeded_repressor() {
    let mut params = deterministic_params();
    params.sequence.gene.leakage = Sampler::Constant(1.0);
    let (mut engine, genes) = build_engine(&toggle_network(), params, 5).unwrap();
    let lac = engine
        .products()
        .lookup(ProductKind::TranscriptionFactor, "lacI")
        .unwrap();
    let tet = engine
        .products()
        .lookup(ProductKind::TranscriptionFactor, "tetR")
        .unwrap();
    engine.set_concentration(lac, fixed(100.0));
    engine.introduce_polymerase();

    let reports = engine.run(6).unwrap();
    let transcribed: Vec<_> = reports
        .iter()
        .flat_map(|r| r.transcriptions.iter())
        .map(|t| t.product)
        .collect();
    assert_eq!(transcribed, vec![Some(lac)]);
    assert_eq!(engine.concentration(tet), Fixed64::ZERO);

    let tet_gene = genes.sites()[1];
    assert!(!engine.sites().gene(tet_gene).unwrap().is_active_flag());
}

// ===========================================================================
// Test 3: Activation cascade
// ===========================================================================
//
// stage0 -> stage1 -> stage2. Only seeded activators switch genes to their
// production rate.

#[test]
fn activation_cascade_induces_downstream_gene() {
    let mut params = deterministic_params();
    params.sequence.gene.production = Sampler::Constant(3.0);
    params.sequence.gene.leakage = Sampler::Constant(0.5);
    let (mut engine, genes) = build_engine(&activation_cascade(3), params, 9).unwrap();
    let stage0 = engine
        .products()
        .lookup(ProductKind::TranscriptionFactor, "stage0")
        .unwrap();
    let stage1 = engine
        .products()
        .lookup(ProductKind::TranscriptionFactor, "stage1")
        .unwrap();
    engine.set_concentration(stage0, fixed(50.0));

    // Move the polymerase over stage0 (bind, transcribe, move on), then
    // stage1 (bind, transcribe).
    engine.introduce_polymerase();
    let reports = engine.run(5).unwrap();

    let amounts: Vec<_> = reports
        .iter()
        .flat_map(|r| r.transcriptions.iter())
        .map(|t| (t.gene, t.amount))
        .collect();
    let sites = genes.sites();
    assert_eq!(amounts, vec![(sites[0], fixed(0.5)), (sites[1], fixed(3.0))]);
    assert_eq!(engine.concentration(stage1), fixed(3.0));
}

// ===========================================================================
// Test 4: Polymerase traffic
// ===========================================================================

#[test]
fn polymerase_convoy_keeps_single_occupancy() {
    let (mut engine, _) = build_engine(&repressilator_network(4), deterministic_params(), 2).unwrap();
    let len = engine.sequence().len();
    for _ in 0..40 {
        engine.introduce_polymerase();
        engine.step().unwrap();
        let mut positions: Vec<usize> = engine
            .polymerases()
            .values()
            .copied()
            .filter(|&p| p < len)
            .collect();
        let before = positions.len();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions.len(), before);
    }
}

#[test]
fn blocked_entry_is_retriable() {
    let (mut engine, _, _) = single_gene_engine(1.0);
    assert!(engine.introduce_polymerase());
    assert!(!engine.introduce_polymerase());
    engine.run(3).unwrap();
    assert!(engine.introduce_polymerase());
}

// ===========================================================================
// Test 5: NAP seeding
// ===========================================================================

#[test]
fn nap_seeded_genes_transcribe_their_nap() {
    let mut params = deterministic_params();
    params.sequence.nap.mean = 1.0;
    params.sequence.nap.prob = 0.5;
    params.sequence.gene.leakage = Sampler::Constant(2.0);
    let mut engine = Engine::new(params, 4).unwrap();
    let net = activation_cascade(1);
    let mut builder = TopologyBuilder::new(&mut engine);
    let map = builder.from_network(&net).unwrap();
    let naps = builder.seed_naps(&map.sites()).unwrap();
    engine.initialise();

    assert!(engine.sequence().len() >= 2);
    assert!(engine.describe_sequence().starts_with("G-1|N-1"));

    engine.introduce_polymerase();
    engine.run(2).unwrap();
    assert_eq!(engine.concentration(naps[0]), fixed(2.0));
}

// ===========================================================================
// Test 6: Reset and replay
// ===========================================================================

#[test]
fn reset_then_replay_is_identical() {
    let mut params = deterministic_params();
    params.sequence.gene.leakage = Sampler::Constant(1.0);
    let (mut engine, _) = build_engine(&repressilator_network(3), params, 8).unwrap();

    let record = |engine: &mut Engine| {
        let mut hashes = Vec::new();
        for i in 0..20 {
            if i % 3 == 0 {
                engine.introduce_polymerase();
            }
            engine.step().unwrap();
            hashes.push(engine.state_hash());
        }
        hashes
    };

    let first = record(&mut engine);
    engine.reset();
    let second = record(&mut engine);
    assert_eq!(first, second);
}
