//! Mobile products: the diffusible molecules of the model.
//!
//! Every product is unique per `(kind, name)`. The [`ProductRegistry`] hands
//! out stable [`ProductId`] handles and samples each product's rate constants
//! exactly once, when it is first requested.

use crate::config::MobileParams;
use crate::fixed::{Fixed64, f64_to_fixed64, fixed64_to_f64};
use crate::id::ProductId;
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use slotmap::SlotMap;
use std::collections::HashMap;
use tracing::trace;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The kind of a mobile product. Part of its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProductKind {
    Enzyme,
    TranscriptionFactor,
    NucleoidAssociatedProtein,
    RnaPolymerase,
}

impl ProductKind {
    pub const ALL: [ProductKind; 4] = [
        ProductKind::Enzyme,
        ProductKind::TranscriptionFactor,
        ProductKind::NucleoidAssociatedProtein,
        ProductKind::RnaPolymerase,
    ];

    /// Prefix of generated default names.
    pub fn name(self) -> &'static str {
        match self {
            ProductKind::Enzyme => "Enzyme",
            ProductKind::TranscriptionFactor => "TranscriptionFactor",
            ProductKind::NucleoidAssociatedProtein => "NucleoidAssociatedProtein",
            ProductKind::RnaPolymerase => "RNAPolymerase",
        }
    }

    /// Key of this kind's section under `mobile` in the parameters.
    pub fn category(self) -> &'static str {
        match self {
            ProductKind::Enzyme => "enzyme",
            ProductKind::TranscriptionFactor => "tf",
            ProductKind::NucleoidAssociatedProtein => "nap",
            ProductKind::RnaPolymerase => "rnap",
        }
    }
}

// ---------------------------------------------------------------------------
// Product data
// ---------------------------------------------------------------------------

/// Rate constants, frozen at creation.
///
/// Association and diffusion only enter the binding factor computed at
/// initialisation, so they stay floating point. Dissociation and degradation
/// are read every step and are stored fixed-point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConstants {
    pub association: f64,
    pub diffusion: f64,
    pub dissociation: Fixed64,
    pub degradation: Fixed64,
}

/// Transcription-complex state of an RNA polymerase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolymeraseState {
    /// Bound to the gene at its current position.
    pub bound: bool,
    /// Released in a previous step and not yet moved on; blocks rebinding.
    pub was_bound: bool,
}

/// Kind-specific product data.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductVariant {
    Enzyme,
    TranscriptionFactor,
    NucleoidAssociatedProtein,
    RnaPolymerase(PolymeraseState),
}

impl ProductVariant {
    fn for_kind(kind: ProductKind) -> Self {
        match kind {
            ProductKind::Enzyme => ProductVariant::Enzyme,
            ProductKind::TranscriptionFactor => ProductVariant::TranscriptionFactor,
            ProductKind::NucleoidAssociatedProtein => ProductVariant::NucleoidAssociatedProtein,
            ProductKind::RnaPolymerase => ProductVariant::RnaPolymerase(PolymeraseState::default()),
        }
    }
}

/// One mobile product.
#[derive(Debug, Clone, PartialEq)]
pub struct MobileProduct {
    name: String,
    serial: u32,
    pub rates: RateConstants,
    /// Site index the product diffuses from. Set externally; defaults to 0.
    pub location: usize,
    pub variant: ProductVariant,
}

impl MobileProduct {
    pub fn kind(&self) -> ProductKind {
        match self.variant {
            ProductVariant::Enzyme => ProductKind::Enzyme,
            ProductVariant::TranscriptionFactor => ProductKind::TranscriptionFactor,
            ProductVariant::NucleoidAssociatedProtein => ProductKind::NucleoidAssociatedProtein,
            ProductVariant::RnaPolymerase(_) => ProductKind::RnaPolymerase,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of this product in its kind's creation order, starting at 1.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn polymerase(&self) -> Option<&PolymeraseState> {
        match &self.variant {
            ProductVariant::RnaPolymerase(state) => Some(state),
            _ => None,
        }
    }

    pub fn polymerase_mut(&mut self) -> Option<&mut PolymeraseState> {
        match &mut self.variant {
            ProductVariant::RnaPolymerase(state) => Some(state),
            _ => None,
        }
    }

    /// Draw the amount of `concentration` that decays this step as
    /// `Binomial(floor(concentration), degradation)`.
    pub fn degrade<R: Rng + ?Sized>(&self, concentration: Fixed64, rng: &mut R) -> Fixed64 {
        if concentration <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        let trials = concentration.floor().to_num::<i64>().max(0) as u64;
        let prob = fixed64_to_f64(self.rates.degradation).clamp(0.0, 1.0);
        match Binomial::new(trials, prob) {
            Ok(binomial) => Fixed64::saturating_from_num(binomial.sample(rng)),
            Err(_) => Fixed64::ZERO,
        }
    }
}

impl std::fmt::Display for MobileProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Identity table for mobile products, owned by one engine.
#[derive(Debug, Default)]
pub struct ProductRegistry {
    products: SlotMap<ProductId, MobileProduct>,
    by_name: HashMap<(ProductKind, String), ProductId>,
    counters: HashMap<ProductKind, u32>,
}

impl ProductRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the product registered as `(kind, name)`, creating it on first
    /// request. A missing or empty name is replaced by `"{Kind}_{n}"` with a
    /// per-kind counter. Rate constants are drawn from the kind's category.
    pub fn create_or_get<R: Rng + ?Sized>(
        &mut self,
        kind: ProductKind,
        name: Option<&str>,
        params: &MobileParams,
        rng: &mut R,
    ) -> ProductId {
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

        let source = params.for_kind(kind);
        let rates = RateConstants {
            association: source.association.sample(rng),
            dissociation: f64_to_fixed64(source.dissociation.sample(rng)),
            diffusion: source.diffusion.sample(rng),
            degradation: f64_to_fixed64(source.degradation.sample(rng)),
        };
        let id = self.products.insert(MobileProduct {
            name: name.clone(),
            serial,
            rates,
            location: 0,
            variant: ProductVariant::for_kind(kind),
        });
        trace!(?id, %name, ?kind, "product created");
        self.by_name.insert((kind, name), id);
        id
    }

    pub fn get(&self, id: ProductId) -> Option<&MobileProduct> {
        self.products.get(id)
    }

    pub fn get_mut(&mut self, id: ProductId) -> Option<&mut MobileProduct> {
        self.products.get_mut(id)
    }

    /// Look up a product by identity without creating it.
    pub fn lookup(&self, kind: ProductKind, name: &str) -> Option<ProductId> {
        self.by_name.get(&(kind, name.to_string())).copied()
    }

    /// Set the site index a product diffuses from. Returns false for an
    /// unknown id.
    pub fn set_location(&mut self, id: ProductId, location: usize) -> bool {
        match self.products.get_mut(id) {
            Some(product) => {
                product.location = location;
                true
            }
            None => false,
        }
    }

    pub fn polymerase(&self, id: ProductId) -> Option<&PolymeraseState> {
        self.products.get(id).and_then(MobileProduct::polymerase)
    }

    pub fn polymerase_mut(&mut self, id: ProductId) -> Option<&mut PolymeraseState> {
        self.products.get_mut(id).and_then(MobileProduct::polymerase_mut)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// All products in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ProductId, &MobileProduct)> {
        self.products.iter()
    }
}
