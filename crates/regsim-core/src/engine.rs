//! The simulation engine: owns the registries and the sequence and runs the
//! discrete step.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - The validated [`Parameters`] every entity samples its constants from
//! - A [`ProductRegistry`] and a [`SiteRegistry`] (identity tables)
//! - The [`Sequence`]: ordered sites, concentration pools, polymerase positions
//! - A [`SimRng`] through which every random draw flows
//! - A [`SimState`] (tick counter)
//!
//! # Step pipeline
//!
//! Each `step()` runs:
//! 1. **Snapshot** -- copy the concentration pools
//! 2. **Promoters** -- update every gene promoter's `bound` flag from the snapshot
//! 3. **Polymerases** -- advance each polymerase's state machine, in creation order
//! 4. **Decay** -- degrade every concentration pool, clamped at zero
//! 5. **Bookkeeping** -- update tick counter, compute state hash

use crate::config::{BindingRule, ConfigError, DegradationRule, Parameters};
use crate::fixed::{Fixed64, Ticks, f64_to_fixed64};
use crate::id::{ProductId, SiteId};
use crate::mobile::{PolymeraseState, ProductKind, ProductRegistry};
use crate::rng::SimRng;
use crate::sequence::Sequence;
use crate::sim::{SimState, StateHash, StepReport, Transcription};
use crate::site::{SiteError, SiteRegistry, SiteVariant};
use slotmap::{Key, SecondaryMap};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the step loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("engine stepped before initialise() computed binding factors")]
    NotInitialised,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The sequence simulation engine.
#[derive(Debug)]
pub struct Engine {
    params: Parameters,
    pub(crate) rng: SimRng,
    products: ProductRegistry,
    sites: SiteRegistry,
    sequence: Sequence,
    sim_state: SimState,

    /// Binding factors are current for the sequence layout.
    initialised: bool,

    /// `sequence.tf.threshold`, converted once.
    threshold: Fixed64,

    /// The most recently computed state hash.
    last_state_hash: u64,
}

impl Engine {
    /// Create an engine over an empty sequence. Fails if the parameters
    /// could produce invalid entities.
    pub fn new(params: Parameters, seed: u64) -> Result<Self, ConfigError> {
        params.validate()?;
        let threshold = f64_to_fixed64(params.sequence.tf.threshold);
        let mut engine = Self {
            params,
            rng: SimRng::new(seed),
            products: ProductRegistry::new(),
            sites: SiteRegistry::new(),
            sequence: Sequence::new(),
            sim_state: SimState::new(),
            initialised: false,
            threshold,
            last_state_hash: 0,
        };
        engine.last_state_hash = engine.compute_state_hash();
        Ok(engine)
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    // -----------------------------------------------------------------------
    // Entity construction
    // -----------------------------------------------------------------------

    /// Return the product registered as `(kind, name)`, creating it first.
    pub fn product(&mut self, kind: ProductKind, name: Option<&str>) -> ProductId {
        self.products
            .create_or_get(kind, name, &self.params.mobile, &mut self.rng)
    }

    /// Set the site index a product diffuses from.
    pub fn set_location(&mut self, product: ProductId, location: usize) -> bool {
        self.products.set_location(product, location)
    }

    pub fn empty_site(&mut self, name: Option<&str>) -> SiteId {
        self.sites.empty(name, &self.params.sequence, &mut self.rng)
    }

    pub fn gene_site(&mut self, name: Option<&str>, product: Option<ProductId>) -> SiteId {
        self.sites
            .create_gene(name, product, &self.params.sequence, &mut self.rng)
    }

    pub fn tf_binding_site(
        &mut self,
        name: Option<&str>,
        ligand: ProductId,
        regulation: i32,
    ) -> Result<SiteId, SiteError> {
        self.sites
            .tf_binding(name, ligand, regulation, &self.params.sequence, &mut self.rng)
    }

    pub fn nap_binding_site(
        &mut self,
        name: Option<&str>,
        ligand: ProductId,
        regulation: i32,
    ) -> Result<SiteId, SiteError> {
        self.sites
            .nap_binding(name, ligand, regulation, &self.params.sequence, &mut self.rng)
    }

    /// Append a TF binding site to a gene's promoters. Invalidates binding
    /// factors.
    pub fn add_promoter(&mut self, gene: SiteId, promoter: SiteId) -> Result<(), SiteError> {
        self.sites.add_promoter(gene, promoter)?;
        self.initialised = false;
        Ok(())
    }

    pub fn set_gene_product(
        &mut self,
        gene: SiteId,
        product: Option<ProductId>,
    ) -> Result<(), SiteError> {
        self.sites.set_product(gene, product)
    }

    /// Overwrite the regulation code of a binding site.
    pub fn set_regulation(&mut self, site: SiteId, regulation: i32) -> Result<(), SiteError> {
        let kind = self
            .sites
            .get(site)
            .map(|s| s.kind())
            .ok_or(SiteError::NotFound(site))?;
        let (min, max) = kind.regulation_range().unwrap_or((0, 0));
        if regulation < min as i32 || regulation > max as i32 {
            return Err(SiteError::RegulationOutOfRange {
                kind,
                code: regulation,
                min,
                max,
            });
        }
        if let Some(binding) = self.sites.binding_mut(site) {
            binding.regulation = regulation as i8;
        }
        Ok(())
    }

    /// Append a site to the end of the sequence and return its index.
    /// Invalidates binding factors.
    pub fn push_site(&mut self, site: SiteId) -> Result<usize, SiteError> {
        if self.sites.get(site).is_none() {
            return Err(SiteError::NotFound(site));
        }
        self.sequence.sites.push(site);
        self.initialised = false;
        Ok(self.sequence.sites.len() - 1)
    }

    /// Seed a product's concentration pool. Returns false for an unknown
    /// product.
    pub fn set_concentration(&mut self, product: ProductId, value: Fixed64) -> bool {
        if self.products.get(product).is_none() {
            return false;
        }
        self.sequence
            .concentrations
            .insert(product, value.max(Fixed64::ZERO));
        true
    }

    // -----------------------------------------------------------------------
    // Initialisation
    // -----------------------------------------------------------------------

    /// Compute the distance and binding factor of every binding site on the
    /// sequence and of every gene promoter. Promoters use their gene's index.
    pub fn initialise(&mut self) {
        let spans: Vec<u64> = self
            .sequence
            .sites
            .iter()
            .map(|&s| self.sites.span(s))
            .collect();
        let layout = self.sequence.sites.clone();
        for (index, site) in layout.into_iter().enumerate() {
            let targets = match self.sites.get(site).map(|s| &s.variant) {
                Some(SiteVariant::Gene(gene)) => gene.promoters.clone(),
                Some(SiteVariant::TfBinding(_) | SiteVariant::NapBinding(_)) => vec![site],
                _ => Vec::new(),
            };
            for target in targets {
                self.update_binding_factor(target, index, &spans);
            }
        }
        self.initialised = true;
        self.last_state_hash = self.compute_state_hash();
        debug!(sites = spans.len(), "initialised binding factors");
    }

    fn update_binding_factor(&mut self, site: SiteId, index: usize, spans: &[u64]) {
        let Some(ligand) = self.sites.binding(site).map(|b| b.ligand) else {
            return;
        };
        let Some(product) = self.products.get(ligand) else {
            return;
        };
        let (location, association, diffusion) = (
            product.location,
            product.rates.association,
            product.rates.diffusion,
        );
        if let Some(binding) = self.sites.binding_mut(site) {
            let distance = binding.update_distance(index, location, spans);
            let factor = binding.update_factor(association, diffusion);
            debug!(?site, index, distance, %factor, "binding factor");
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Run one discrete time step.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        if !self.initialised {
            return Err(SimError::NotInitialised);
        }
        let mut report = StepReport::default();

        // Phase 1: Snapshot -- binding reads only the prior pools.
        let snapshot = self.sequence.concentrations.clone();

        // Phase 2: Promoters.
        self.phase_promoters(&snapshot);

        // Phase 3: Polymerases.
        self.phase_polymerases(&mut report);

        // Phase 4: Decay.
        self.phase_decay();

        // Phase 5: Bookkeeping.
        self.phase_bookkeeping();
        report.tick = self.sim_state.tick;

        debug!(
            tick = report.tick,
            polymerases = self.sequence.polymerases.len(),
            transcribed = %report.total_transcribed(),
            "step complete"
        );
        Ok(report)
    }

    /// Run `steps` steps, returning one report per step.
    pub fn run(&mut self, steps: u64) -> Result<Vec<StepReport>, SimError> {
        (0..steps).map(|_| self.step()).collect()
    }

    // -----------------------------------------------------------------------
    // Phase 2: Promoters
    // -----------------------------------------------------------------------

    fn phase_promoters(&mut self, snapshot: &SecondaryMap<ProductId, Fixed64>) {
        let promoters: Vec<SiteId> = self
            .sequence
            .sites
            .iter()
            .filter_map(|&s| self.sites.get(s).and_then(|site| site.gene()))
            .flat_map(|gene| gene.promoters.iter().copied())
            .collect();

        let rule = self.params.rules.binding;
        for promoter in promoters {
            let Some(binding) = self.sites.binding(promoter) else {
                continue;
            };
            let ligand = binding.ligand;
            let conc = snapshot.get(ligand).copied().unwrap_or(Fixed64::ZERO);
            let propensity = binding.factor.saturating_mul(conc);
            let bound = match rule {
                BindingRule::Threshold => propensity >= self.threshold,
                BindingRule::Stochastic => {
                    if binding.bound {
                        let dissociation = self
                            .products
                            .get(ligand)
                            .map_or(Fixed64::ZERO, |p| p.rates.dissociation);
                        !self.rng.chance(dissociation)
                    } else {
                        conc > Fixed64::ZERO && self.rng.chance(propensity)
                    }
                }
            };
            if let Some(binding) = self.sites.binding_mut(promoter) {
                binding.bound = bound;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 3: Polymerases
    // -----------------------------------------------------------------------

    fn phase_polymerases(&mut self, report: &mut StepReport) {
        let len = self.sequence.sites.len();
        let activation = self.params.rules.activation;
        let tracked: Vec<(ProductId, usize)> = self
            .sequence
            .polymerases
            .iter()
            .map(|(id, &pos)| (id, pos))
            .collect();

        for (rnap, pos) in tracked {
            if pos >= len {
                report.removed.push(rnap);
                continue;
            }
            let Some(state) = self.products.polymerase(rnap).copied() else {
                continue;
            };
            let site = self.sequence.sites[pos];

            if state.bound {
                self.transcribe(rnap, site, report);
                self.set_polymerase_state(rnap, PolymeraseState {
                    bound: false,
                    was_bound: true,
                });
                trace!(?rnap, pos, "released");
            } else if self.sites.evaluate_gene(site, activation) == Some(true) && !state.was_bound {
                self.set_polymerase_state(rnap, PolymeraseState {
                    bound: true,
                    ..state
                });
                report.bound.push(rnap);
                trace!(?rnap, pos, "bound");
            } else if pos + 1 == len {
                self.sequence.polymerases.insert(rnap, pos + 1);
                if let Some(s) = self.sites.get_mut(site) {
                    s.occupied = false;
                }
                report.departed.push(rnap);
                trace!(?rnap, pos, "left the sequence");
            } else {
                let next = self.sequence.sites[pos + 1];
                let next_free = self.sites.get(next).is_some_and(|s| !s.occupied);
                if next_free {
                    self.sequence.polymerases.insert(rnap, pos + 1);
                    if let Some(s) = self.sites.get_mut(site) {
                        s.occupied = false;
                    }
                    if let Some(s) = self.sites.get_mut(next) {
                        s.occupied = true;
                    }
                    self.set_polymerase_state(rnap, PolymeraseState {
                        was_bound: false,
                        ..state
                    });
                    report.advanced.push(rnap);
                    trace!(?rnap, from = pos, to = pos + 1, "moved on");
                } else {
                    report.blocked.push(rnap);
                    trace!(?rnap, pos, "blocked");
                }
            }
        }

        for rnap in &report.removed {
            self.sequence.polymerases.remove(*rnap);
        }
    }

    /// Add the gene's current rate to its product's pool.
    fn transcribe(&mut self, rnap: ProductId, site: SiteId, report: &mut StepReport) {
        let Some(gene) = self.sites.get(site).and_then(|s| s.gene()) else {
            return;
        };
        let product = gene.product;
        let amount = match product {
            Some(product) => {
                self.sequence.add_concentration(product, gene.rate);
                gene.rate
            }
            None => {
                trace!(?site, "gene has no product; nothing transcribed");
                Fixed64::ZERO
            }
        };
        report.transcriptions.push(Transcription {
            polymerase: rnap,
            gene: site,
            product,
            amount,
        });
        trace!(?rnap, ?site, %amount, "transcribed");
    }

    fn set_polymerase_state(&mut self, rnap: ProductId, state: PolymeraseState) {
        if let Some(s) = self.products.polymerase_mut(rnap) {
            *s = state;
        }
    }

    // -----------------------------------------------------------------------
    // Phase 4: Decay
    // -----------------------------------------------------------------------

    fn phase_decay(&mut self) {
        let rule = self.params.rules.degradation;
        let pools: Vec<(ProductId, Fixed64)> = self
            .sequence
            .concentrations
            .iter()
            .map(|(id, &c)| (id, c))
            .collect();
        for (id, conc) in pools {
            let Some(product) = self.products.get(id) else {
                continue;
            };
            let degraded = match rule {
                DegradationRule::Ceiling => product
                    .rates
                    .degradation
                    .saturating_mul(conc)
                    .saturating_ceil(),
                DegradationRule::Binomial => product.degrade(conc, &mut self.rng),
            };
            let next = conc.saturating_sub(degraded).max(Fixed64::ZERO);
            self.sequence.concentrations.insert(id, next);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 5: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self) {
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
    }

    /// Hash tick, pools, polymerases and every dynamic site flag.
    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);

        for (id, &conc) in &self.sequence.concentrations {
            hasher.write_u64(id.data().as_ffi());
            hasher.write_fixed64(conc);
        }

        // Creation order only; polymerase ids are not reused across resets.
        for (id, &pos) in &self.sequence.polymerases {
            hasher.write_u64(pos as u64);
            if let Some(state) = self.products.polymerase(id) {
                hasher.write_bool(state.bound);
                hasher.write_bool(state.was_bound);
            }
        }

        for &site_id in &self.sequence.sites {
            let Some(site) = self.sites.get(site_id) else {
                continue;
            };
            hasher.write_bool(site.occupied);
            match &site.variant {
                SiteVariant::Gene(gene) => {
                    hasher.write_bool(gene.is_active_flag());
                    hasher.write_fixed64(gene.rate);
                    for &p in &gene.promoters {
                        if let Some(b) = self.sites.binding(p) {
                            hasher.write_bool(b.bound);
                        }
                    }
                }
                SiteVariant::TfBinding(b) | SiteVariant::NapBinding(b) => {
                    hasher.write_bool(b.bound);
                }
                SiteVariant::Empty => {}
            }
        }

        hasher.finish()
    }

    // -----------------------------------------------------------------------
    // Polymerases and reset
    // -----------------------------------------------------------------------

    /// Place a new RNA polymerase on site 0. Returns false when the
    /// sequence is empty or its first site is occupied.
    pub fn introduce_polymerase(&mut self) -> bool {
        let Some(&first) = self.sequence.sites.first() else {
            return false;
        };
        match self.sites.get_mut(first) {
            Some(site) if !site.occupied => site.occupied = true,
            _ => return false,
        }
        let rnap = self.product(ProductKind::RnaPolymerase, None);
        self.set_polymerase_state(rnap, PolymeraseState::default());
        self.sequence.polymerases.insert(rnap, 0);
        trace!(?rnap, "polymerase introduced");
        true
    }

    /// Clear pools, polymerases and every site's dynamic flags, and rewind
    /// the tick counter. Binding factors are kept.
    pub fn reset(&mut self) {
        self.sequence.clear();
        let layout = self.sequence.sites.clone();
        for site in layout {
            self.sites.reset(site);
        }
        self.sim_state = SimState::new();
        self.last_state_hash = self.compute_state_hash();
        debug!("engine reset");
    }

    // -----------------------------------------------------------------------
    // Query API (read-only)
    // -----------------------------------------------------------------------

    pub fn concentrations(&self) -> &SecondaryMap<ProductId, Fixed64> {
        self.sequence.concentrations()
    }

    pub fn concentration(&self, product: ProductId) -> Fixed64 {
        self.sequence.concentration(product)
    }

    pub fn polymerases(&self) -> &SecondaryMap<ProductId, usize> {
        self.sequence.polymerases()
    }

    pub fn polymerase_position(&self, rnap: ProductId) -> Option<usize> {
        self.sequence.polymerases.get(rnap).copied()
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    pub fn products(&self) -> &ProductRegistry {
        &self.products
    }

    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    /// The sequence rendered as `|`-joined site descriptions.
    pub fn describe_sequence(&self) -> String {
        self.sequence.describe(&self.sites)
    }
}
