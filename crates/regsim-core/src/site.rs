//! Sequence elements: the sites that make up a genome.
//!
//! A site is one contiguous span of the sequence. Its kind-specific data is
//! a closed [`SiteVariant`]; behaviour dispatches on it with `match`. Sites
//! are unique per `(kind, name)` and referenced by [`SiteId`] everywhere,
//! including from a gene's promoter list.

use crate::config::{ActivationRule, SequenceParams};
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::{ProductId, SiteId};
use rand::Rng;
use slotmap::SlotMap;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from site construction and lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SiteError {
    #[error("regulation code {code} outside {min}..={max} for {kind:?}")]
    RegulationOutOfRange {
        kind: SiteKind,
        code: i32,
        min: i8,
        max: i8,
    },
    #[error("site not found: {0:?}")]
    NotFound(SiteId),
    #[error("site {site:?} is not a {expected:?}")]
    WrongKind { site: SiteId, expected: SiteKind },
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The kind of a sequence element. Part of its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SiteKind {
    Empty,
    Gene,
    TfBinding,
    NapBinding,
}

impl SiteKind {
    /// Prefix of generated default names.
    pub fn name(self) -> &'static str {
        match self {
            SiteKind::Empty => "EmptySite",
            SiteKind::Gene => "GeneSite",
            SiteKind::TfBinding => "TFBindingSite",
            SiteKind::NapBinding => "NAPBindingSite",
        }
    }

    pub fn symbol(self) -> char {
        match self {
            SiteKind::Empty => 'E',
            SiteKind::Gene => 'G',
            SiteKind::TfBinding => 'T',
            SiteKind::NapBinding => 'N',
        }
    }

    /// Valid regulation codes for binding-site kinds.
    pub fn regulation_range(self) -> Option<(i8, i8)> {
        match self {
            SiteKind::TfBinding => Some((-1, 1)),
            SiteKind::NapBinding => Some((-2, 2)),
            SiteKind::Empty | SiteKind::Gene => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Kind-specific data
// ---------------------------------------------------------------------------

/// A transcribable gene and its promoter region.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSite {
    /// TF binding sites regulating this gene, in order.
    pub promoters: Vec<SiteId>,
    /// What this gene is transcribed into, if anything.
    pub product: Option<ProductId>,
    /// Current transcription rate.
    pub rate: Fixed64,
    production: Fixed64,
    leakage: Fixed64,
    active: bool,
}

impl GeneSite {
    pub fn is_active_flag(&self) -> bool {
        self.active
    }

    pub fn production(&self) -> Fixed64 {
        self.production
    }

    pub fn leakage(&self) -> Fixed64 {
        self.leakage
    }

    /// Decide activity from the promoter contributions (the regulation code
    /// of each bound promoter, 0 for unbound ones) and update `rate`.
    ///
    /// No promoters: transcribed at leakage, activity flag untouched.
    /// Combined value > 0: active at production. < 0: inactive, rate
    /// unchanged. == 0: active at leakage.
    pub fn apply_contributions(&mut self, contributions: &[i32], rule: ActivationRule) -> bool {
        if contributions.is_empty() {
            self.rate = self.leakage;
            return true;
        }
        let sign = match rule {
            ActivationRule::Multiplicative => contributions
                .iter()
                .fold(1i32, |acc, &c| acc * c.signum()),
            ActivationRule::Additive => contributions.iter().sum::<i32>().signum(),
        };
        match sign {
            1 => {
                self.rate = self.production;
                self.active = true;
            }
            -1 => self.active = false,
            _ => {
                self.rate = self.leakage;
                self.active = true;
            }
        }
        self.active
    }
}

/// A ligand binding site (TF or NAP).
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSite {
    pub ligand: ProductId,
    pub regulation: i8,
    /// Summed span between the ligand's location and this site.
    pub distance: u64,
    /// `association * exp(-distance / diffusion)`, fixed at initialisation.
    pub factor: Fixed64,
    pub bound: bool,
}

impl BindingSite {
    fn new(ligand: ProductId, regulation: i8) -> Self {
        Self {
            ligand,
            regulation,
            distance: 0,
            factor: Fixed64::ZERO,
            bound: false,
        }
    }

    /// Sum the spans of the sites between `index` and the ligand's
    /// `location` (half-open, lower end included), clamped to the sequence.
    pub fn update_distance(&mut self, index: usize, location: usize, spans: &[u64]) -> u64 {
        let (lo, hi) = if index > location {
            (location, index)
        } else {
            (index, location)
        };
        let hi = hi.min(spans.len());
        let lo = lo.min(hi);
        self.distance = spans[lo..hi].iter().sum();
        self.distance
    }

    /// Set the binding factor from the ligand's association and diffusion
    /// constants and the current distance.
    pub fn update_factor(&mut self, association: f64, diffusion: f64) -> Fixed64 {
        let factor = association * (-(self.distance as f64) / diffusion).exp();
        self.factor = f64_to_fixed64(factor);
        self.factor
    }

    /// Contribution to the gene this site regulates.
    pub fn contribution(&self) -> i32 {
        if self.bound {
            self.regulation as i32
        } else {
            0
        }
    }
}

/// Kind-specific site data.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteVariant {
    Empty,
    Gene(GeneSite),
    TfBinding(BindingSite),
    NapBinding(BindingSite),
}

/// One site of the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceElement {
    name: String,
    serial: u32,
    length: u64,
    /// Steric flag for RNA polymerases.
    pub occupied: bool,
    pub variant: SiteVariant,
}

impl SequenceElement {
    pub fn kind(&self) -> SiteKind {
        match self.variant {
            SiteVariant::Empty => SiteKind::Empty,
            SiteVariant::Gene(_) => SiteKind::Gene,
            SiteVariant::TfBinding(_) => SiteKind::TfBinding,
            SiteVariant::NapBinding(_) => SiteKind::NapBinding,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Length of this site alone.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn gene(&self) -> Option<&GeneSite> {
        match &self.variant {
            SiteVariant::Gene(gene) => Some(gene),
            _ => None,
        }
    }

    pub fn gene_mut(&mut self) -> Option<&mut GeneSite> {
        match &mut self.variant {
            SiteVariant::Gene(gene) => Some(gene),
            _ => None,
        }
    }

    pub fn binding(&self) -> Option<&BindingSite> {
        match &self.variant {
            SiteVariant::TfBinding(site) | SiteVariant::NapBinding(site) => Some(site),
            _ => None,
        }
    }

    pub fn binding_mut(&mut self) -> Option<&mut BindingSite> {
        match &mut self.variant {
            SiteVariant::TfBinding(site) | SiteVariant::NapBinding(site) => Some(site),
            _ => None,
        }
    }
}

impl std::fmt::Display for SequenceElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.kind().symbol(), self.serial)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Identity table for sequence elements, owned by one engine.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: SlotMap<SiteId, SequenceElement>,
    by_name: HashMap<(SiteKind, String), SiteId>,
    counters: HashMap<SiteKind, u32>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared creation path: identity lookup, counter, default name, length.
    fn create_or_get<R: Rng + ?Sized>(
        &mut self,
        kind: SiteKind,
        name: Option<&str>,
        params: &SequenceParams,
        rng: &mut R,
        variant: impl FnOnce(&mut R) -> SiteVariant,
    ) -> SiteId {
        let requested = name.filter(|n| !n.is_empty());
        if let Some(n) = requested
            && let Some(&id) = self.by_name.get(&(kind, n.to_string()))
        {
            return id;
        }

        let counter = self.counters.entry(kind).or_insert(0);
        let name = match requested {
            Some(n) => {
                *counter += 1;
                n.to_string()
            }
            // Skip generated names a caller already registered explicitly.
            None => loop {
                *counter += 1;
                let candidate = format!("{}_{}", kind.name(), *counter);
                if !self.by_name.contains_key(&(kind, candidate.clone())) {
                    break candidate;
                }
            },
        };
        let serial = *counter;

        let length = match kind {
            SiteKind::Empty => params.empty.length.sample_length(rng),
            SiteKind::Gene => params.gene.length.sample_length(rng),
            SiteKind::TfBinding => params.tf.length.sample_length(rng),
            SiteKind::NapBinding => params.nap.length.sample_length(rng),
        };
        let id = self.sites.insert(SequenceElement {
            name: name.clone(),
            serial,
            length,
            occupied: false,
            variant: variant(rng),
        });
        self.by_name.insert((kind, name), id);
        id
    }

    /// Create (or fetch) an empty spacer site.
    pub fn empty<R: Rng + ?Sized>(
        &mut self,
        name: Option<&str>,
        params: &SequenceParams,
        rng: &mut R,
    ) -> SiteId {
        self.create_or_get(SiteKind::Empty, name, params, rng, |_| SiteVariant::Empty)
    }

    /// Create (or fetch) a gene. Production and leakage rates are drawn once
    /// here; the initial rate is the production rate.
    pub fn create_gene<R: Rng + ?Sized>(
        &mut self,
        name: Option<&str>,
        product: Option<ProductId>,
        params: &SequenceParams,
        rng: &mut R,
    ) -> SiteId {
        let gene_params = &params.gene;
        self.create_or_get(SiteKind::Gene, name, params, rng, |rng| {
            let production = f64_to_fixed64(gene_params.production.sample(rng));
            let leakage = f64_to_fixed64(gene_params.leakage.sample(rng));
            SiteVariant::Gene(GeneSite {
                promoters: Vec::new(),
                product,
                rate: production,
                production,
                leakage,
                active: false,
            })
        })
    }

    /// Create (or fetch) a TF binding site. Codes must lie in -1..=1.
    pub fn tf_binding<R: Rng + ?Sized>(
        &mut self,
        name: Option<&str>,
        ligand: ProductId,
        regulation: i32,
        params: &SequenceParams,
        rng: &mut R,
    ) -> Result<SiteId, SiteError> {
        let code = check_regulation(SiteKind::TfBinding, regulation)?;
        Ok(self.create_or_get(SiteKind::TfBinding, name, params, rng, |_| {
            SiteVariant::TfBinding(BindingSite::new(ligand, code))
        }))
    }

    /// Create (or fetch) a NAP binding site. Codes must lie in -2..=2.
    pub fn nap_binding<R: Rng + ?Sized>(
        &mut self,
        name: Option<&str>,
        ligand: ProductId,
        regulation: i32,
        params: &SequenceParams,
        rng: &mut R,
    ) -> Result<SiteId, SiteError> {
        let code = check_regulation(SiteKind::NapBinding, regulation)?;
        Ok(self.create_or_get(SiteKind::NapBinding, name, params, rng, |_| {
            SiteVariant::NapBinding(BindingSite::new(ligand, code))
        }))
    }

    pub fn get(&self, id: SiteId) -> Option<&SequenceElement> {
        self.sites.get(id)
    }

    pub fn get_mut(&mut self, id: SiteId) -> Option<&mut SequenceElement> {
        self.sites.get_mut(id)
    }

    pub fn lookup(&self, kind: SiteKind, name: &str) -> Option<SiteId> {
        self.by_name.get(&(kind, name.to_string())).copied()
    }

    pub fn gene(&self, id: SiteId) -> Result<&GeneSite, SiteError> {
        let site = self.sites.get(id).ok_or(SiteError::NotFound(id))?;
        site.gene().ok_or(SiteError::WrongKind {
            site: id,
            expected: SiteKind::Gene,
        })
    }

    pub fn gene_mut(&mut self, id: SiteId) -> Result<&mut GeneSite, SiteError> {
        let site = self.sites.get_mut(id).ok_or(SiteError::NotFound(id))?;
        site.gene_mut().ok_or(SiteError::WrongKind {
            site: id,
            expected: SiteKind::Gene,
        })
    }

    pub fn binding(&self, id: SiteId) -> Option<&BindingSite> {
        self.sites.get(id).and_then(SequenceElement::binding)
    }

    pub fn binding_mut(&mut self, id: SiteId) -> Option<&mut BindingSite> {
        self.sites.get_mut(id).and_then(SequenceElement::binding_mut)
    }

    /// Append a TF binding site to a gene's promoter list.
    pub fn add_promoter(&mut self, gene: SiteId, promoter: SiteId) -> Result<(), SiteError> {
        match self.sites.get(promoter).map(SequenceElement::kind) {
            Some(SiteKind::TfBinding) => {}
            Some(_) => {
                return Err(SiteError::WrongKind {
                    site: promoter,
                    expected: SiteKind::TfBinding,
                });
            }
            None => return Err(SiteError::NotFound(promoter)),
        }
        self.gene_mut(gene)?.promoters.push(promoter);
        Ok(())
    }

    /// Make `product` the transcript of `gene`.
    pub fn set_product(&mut self, gene: SiteId, product: Option<ProductId>) -> Result<(), SiteError> {
        self.gene_mut(gene)?.product = product;
        Ok(())
    }

    /// The span a site covers on the sequence: its own length, plus the
    /// lengths of its promoters for a gene.
    pub fn span(&self, id: SiteId) -> u64 {
        let Some(site) = self.sites.get(id) else {
            return 0;
        };
        match &site.variant {
            SiteVariant::Gene(gene) => {
                site.length
                    + gene
                        .promoters
                        .iter()
                        .filter_map(|&p| self.sites.get(p))
                        .map(SequenceElement::length)
                        .sum::<u64>()
            }
            _ => site.length,
        }
    }

    /// Evaluate a gene's activity from its promoters' current binding state.
    /// Returns `None` when `id` is not a gene.
    pub fn evaluate_gene(&mut self, id: SiteId, rule: ActivationRule) -> Option<bool> {
        let contributions: Vec<i32> = self
            .sites
            .get(id)?
            .gene()?
            .promoters
            .iter()
            .map(|&p| self.binding(p).map_or(0, BindingSite::contribution))
            .collect();
        Some(self.sites.get_mut(id)?.gene_mut()?.apply_contributions(&contributions, rule))
    }

    /// Clear the dynamic state of a site: occupancy, binding, gene activity,
    /// and for a gene, its promoters.
    pub fn reset(&mut self, id: SiteId) {
        let promoters = match self.sites.get_mut(id) {
            Some(site) => {
                site.occupied = false;
                match &mut site.variant {
                    SiteVariant::Gene(gene) => {
                        gene.active = false;
                        gene.promoters.clone()
                    }
                    SiteVariant::TfBinding(binding) | SiteVariant::NapBinding(binding) => {
                        binding.bound = false;
                        Vec::new()
                    }
                    SiteVariant::Empty => Vec::new(),
                }
            }
            None => return,
        };
        for promoter in promoters {
            self.reset(promoter);
        }
    }

    /// Render a site; a gene is preceded by its promoters: `T-1|T-2|G-3`.
    pub fn describe(&self, id: SiteId) -> String {
        let Some(site) = self.sites.get(id) else {
            return String::from("?");
        };
        match &site.variant {
            SiteVariant::Gene(gene) if !gene.promoters.is_empty() => {
                let mut parts: Vec<String> = gene
                    .promoters
                    .iter()
                    .map(|&p| self.describe(p))
                    .collect();
                parts.push(site.to_string());
                parts.join("|")
            }
            _ => site.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SiteId, &SequenceElement)> {
        self.sites.iter()
    }
}

fn check_regulation(kind: SiteKind, regulation: i32) -> Result<i8, SiteError> {
    let (min, max) = kind.regulation_range().unwrap_or((0, 0));
    if regulation < min as i32 || regulation > max as i32 {
        return Err(SiteError::RegulationOutOfRange {
            kind,
            code: regulation,
            min,
            max,
        });
    }
    Ok(regulation as i8)
}
