//! The ordered site sequence and the dynamic state that lives on it.

use crate::fixed::Fixed64;
use crate::id::{ProductId, SiteId};
use crate::site::SiteRegistry;
use slotmap::SecondaryMap;

/// An ordered list of sites plus the concentration pools and polymerase
/// positions the engine updates every step.
///
/// Both maps iterate in product slot order, which is creation order since
/// products are never removed from their registry.
#[derive(Debug, Default)]
pub struct Sequence {
    pub(crate) sites: Vec<SiteId>,
    pub(crate) concentrations: SecondaryMap<ProductId, Fixed64>,
    pub(crate) polymerases: SecondaryMap<ProductId, usize>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sites(&self) -> &[SiteId] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<SiteId> {
        self.sites.get(index).copied()
    }

    /// Index of the first occurrence of `site`.
    pub fn index_of(&self, site: SiteId) -> Option<usize> {
        self.sites.iter().position(|&s| s == site)
    }

    pub fn concentrations(&self) -> &SecondaryMap<ProductId, Fixed64> {
        &self.concentrations
    }

    /// Concentration of `product`; zero when it has no pool yet.
    pub fn concentration(&self, product: ProductId) -> Fixed64 {
        self.concentrations
            .get(product)
            .copied()
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn polymerases(&self) -> &SecondaryMap<ProductId, usize> {
        &self.polymerases
    }

    /// Add `amount` to a product's pool, creating it at zero first.
    pub(crate) fn add_concentration(&mut self, product: ProductId, amount: Fixed64) {
        if let Some(entry) = self.concentrations.entry(product) {
            let pool = entry.or_insert(Fixed64::ZERO);
            *pool = pool.saturating_add(amount);
        }
    }

    /// Drop every concentration pool and tracked polymerase.
    pub(crate) fn clear(&mut self) {
        self.concentrations.clear();
        self.polymerases.clear();
    }

    /// Render as `|`-joined site descriptions, e.g. `E-1|T-1|G-1|N-1`.
    pub fn describe(&self, registry: &SiteRegistry) -> String {
        self.sites
            .iter()
            .map(|&s| registry.describe(s))
            .collect::<Vec<_>>()
            .join("|")
    }
}
