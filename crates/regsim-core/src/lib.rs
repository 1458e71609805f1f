//! Regsim Core -- a discrete-time simulator for prokaryotic gene-regulatory
//! networks laid out on a linear genome.
//!
//! Mobile products (transcription factors, nucleoid-associated proteins,
//! RNA polymerases, enzymes) bind to sites on an ordered sequence, switch
//! genes on and off, and are produced and degraded step by step.
//!
//! # Step pipeline
//!
//! Each call to [`engine::Engine::step`] advances the model by one tick:
//!
//! 1. **Snapshot** -- Copy the concentration pools; binding reads only these.
//! 2. **Promoters** -- Decide every gene promoter's `bound` flag.
//! 3. **Polymerases** -- Bind, transcribe, move on or leave, in creation order.
//! 4. **Decay** -- Degrade every pool, clamped at zero.
//! 5. **Bookkeeping** -- Increment the tick counter and compute the state hash.
//!
//! # Building a model
//!
//! ```rust,ignore
//! let mut net = RegulatoryNetwork::new();
//! let a = net.add_gene("lacI")?;
//! let b = net.add_gene("tetR")?;
//! net.connect(a, b, -1)?;
//! net.connect(b, a, -1)?;
//!
//! let (mut engine, _genes) = build_engine(&net, Parameters::default(), 42)?;
//! engine.introduce_polymerase();
//! engine.run(100)?;
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the registries and the sequence; runs steps.
//! - [`mobile::ProductRegistry`] -- One product per `(kind, name)`.
//! - [`site::SiteRegistry`] -- One site per `(kind, name)`; gene activation.
//! - [`config::Parameters`] -- Validated rate constants and samplers.
//! - [`graph::RegulatoryNetwork`] -- Directed gene graph used as input.
//! - [`topology::TopologyBuilder`] -- Lays a network out as a site sequence.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for per-step values.

pub mod config;
pub mod engine;
pub mod fixed;
pub mod graph;
pub mod id;
pub mod mobile;
pub mod rng;
pub mod sequence;
pub mod sim;
pub mod site;
pub mod topology;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
