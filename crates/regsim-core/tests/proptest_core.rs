//! Property-based tests for the sequence engine.
//!
//! Uses proptest to generate random networks, parameter sets and
//! polymerase schedules, then verify structural invariants hold.

use proptest::prelude::*;
use regsim_core::config::{BindingRule, DegradationRule, Parameters, Sampler};
use regsim_core::engine::Engine;
use regsim_core::fixed::Fixed64;
use regsim_core::test_utils::*;
use regsim_core::topology::build_engine;
use std::collections::BTreeSet;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
struct Scenario {
    genes: usize,
    ring: bool,
    leakage: f64,
    production: f64,
    degradation: f64,
    stochastic: bool,
    binomial: bool,
    seed: u64,
    schedule: Vec<bool>,
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    (
        1..8usize,
        any::<bool>(),
        0.0..5.0f64,
        0.0..5.0f64,
        0.0..1.0f64,
        any::<bool>(),
        any::<bool>(),
        any::<u64>(),
        proptest::collection::vec(any::<bool>(), 1..60),
    )
        .prop_map(
            |(genes, ring, leakage, production, degradation, stochastic, binomial, seed, schedule)| {
                Scenario {
                    genes,
                    ring,
                    leakage,
                    production,
                    degradation,
                    stochastic,
                    binomial,
                    seed,
                    schedule,
                }
            },
        )
}

fn params_for(s: &Scenario) -> Parameters {
    let mut params = deterministic_params();
    params.sequence.gene.leakage = Sampler::Constant(s.leakage);
    params.sequence.gene.production = Sampler::Constant(s.production);
    params.mobile.tf.degradation = Sampler::Constant(s.degradation);
    if s.stochastic {
        params.rules.binding = BindingRule::Stochastic;
    }
    if s.binomial {
        params.rules.degradation = DegradationRule::Binomial;
    }
    params
}

fn build(s: &Scenario) -> Engine {
    let net = if s.ring {
        repressilator_network(s.genes)
    } else {
        activation_cascade(s.genes)
    };
    let (engine, _) = build_engine(&net, params_for(s), s.seed).unwrap();
    engine
}

/// Drive the engine through the schedule, introducing a polymerase before
/// each step whose flag is set.
fn drive(engine: &mut Engine, schedule: &[bool], mut check: impl FnMut(&Engine)) {
    for &introduce in schedule {
        if introduce {
            engine.introduce_polymerase();
        }
        engine.step().unwrap();
        check(engine);
    }
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #[test]
    fn concentrations_never_negative(s in arb_scenario()) {
        let mut engine = build(&s);
        let mut ok = true;
        drive(&mut engine, &s.schedule, |e| {
            ok &= e.concentrations().values().all(|&c| c >= Fixed64::ZERO);
        });
        prop_assert!(ok);
    }

    #[test]
    fn occupancy_matches_polymerase_positions(s in arb_scenario()) {
        let mut engine = build(&s);
        let mut ok = true;
        drive(&mut engine, &s.schedule, |e| {
            let len = e.sequence().len();
            let on_sequence: Vec<usize> = e
                .polymerases()
                .values()
                .copied()
                .filter(|&p| p < len)
                .collect();
            let positions: BTreeSet<usize> = on_sequence.iter().copied().collect();
            let occupied: BTreeSet<usize> = e
                .sequence()
                .sites()
                .iter()
                .enumerate()
                .filter(|(_, s)| e.sites().get(**s).is_some_and(|site| site.occupied))
                .map(|(i, _)| i)
                .collect();
            ok &= positions.len() == on_sequence.len() && positions == occupied;
            ok &= e.polymerases().values().all(|&p| p <= len);
        });
        prop_assert!(ok);
    }

    #[test]
    fn reset_clears_all_dynamic_state(s in arb_scenario()) {
        let mut engine = build(&s);
        drive(&mut engine, &s.schedule, |_| {});
        engine.reset();

        prop_assert!(engine.concentrations().is_empty());
        prop_assert!(engine.polymerases().is_empty());
        prop_assert_eq!(engine.tick(), 0);
        for &id in engine.sequence().sites() {
            let site = engine.sites().get(id).unwrap();
            prop_assert!(!site.occupied);
            if let Some(gene) = site.gene() {
                prop_assert!(!gene.is_active_flag());
                for &p in &gene.promoters {
                    prop_assert!(!engine.sites().binding(p).unwrap().bound);
                }
            }
        }
    }

    #[test]
    fn same_seed_same_hashes(s in arb_scenario()) {
        let mut a = build(&s);
        let mut b = build(&s);
        let mut ha = Vec::new();
        let mut hb = Vec::new();
        drive(&mut a, &s.schedule, |e| ha.push(e.state_hash()));
        drive(&mut b, &s.schedule, |e| hb.push(e.state_hash()));
        prop_assert_eq!(ha, hb);
    }

    #[test]
    fn full_ceiling_decay_empties_every_pool(s in arb_scenario()) {
        let mut s = s;
        s.degradation = 1.0;
        s.binomial = false;
        let mut engine = build(&s);
        let mut ok = true;
        drive(&mut engine, &s.schedule, |e| {
            ok &= e.concentrations().values().all(|&c| c == Fixed64::ZERO);
        });
        prop_assert!(ok);
    }
}
