//! Turning a [`RegulatoryNetwork`] into a site sequence.
//!
//! Every gene node becomes a gene site; every incoming link becomes a TF
//! binding site in the target gene's promoter region, bound by the
//! regulator's product. Genes are laid out in network insertion order.

use crate::config::{ConfigError, Parameters};
use crate::engine::Engine;
use crate::graph::{NetworkError, RegulatoryNetwork};
use crate::id::{GeneNodeId, ProductId, SiteId};
use crate::mobile::ProductKind;
use crate::site::SiteError;
use rand::Rng;
use tracing::{debug, info, warn};

/// Upper bound on draws for any "must not be zero" sample.
pub const MAX_RESAMPLE_ATTEMPTS: usize = 10_000;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("regulator {0} has no product to bind its targets' promoters")]
    RegulatorWithoutProduct(String),
    #[error("{what}: no non-zero draw in {attempts} attempts")]
    ResampleExhausted { what: &'static str, attempts: usize },
}

// ---------------------------------------------------------------------------
// GeneMap
// ---------------------------------------------------------------------------

/// Gene node to gene site, in network insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneMap {
    entries: Vec<(GeneNodeId, SiteId)>,
}

impl GeneMap {
    pub fn site(&self, node: GeneNodeId) -> Option<SiteId> {
        self.entries
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, s)| *s)
    }

    /// Gene sites in network order.
    pub fn sites(&self) -> Vec<SiteId> {
        self.entries.iter().map(|(_, s)| *s).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeneNodeId, SiteId)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TopologyBuilder
// ---------------------------------------------------------------------------

/// Lays out sites on an engine's sequence.
pub struct TopologyBuilder<'a> {
    engine: &'a mut Engine,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(engine: &'a mut Engine) -> Self {
        Self { engine }
    }

    /// One gene site per node. Nodes that regulate anything get a
    /// transcription factor product named after them.
    pub fn build_genes(&mut self, network: &RegulatoryNetwork) -> GeneMap {
        let mut map = GeneMap::default();
        for (node, gene) in network.genes() {
            let product = (network.out_degree(node) > 0).then(|| {
                self.engine
                    .product(ProductKind::TranscriptionFactor, Some(&gene.name))
            });
            let site = self.engine.gene_site(Some(&gene.name), product);
            map.entries.push((node, site));
        }
        map
    }

    /// Give each gene one promoter per incoming link, then append the gene
    /// to the sequence.
    pub fn linearise(
        &mut self,
        network: &RegulatoryNetwork,
        map: &GeneMap,
    ) -> Result<(), TopologyError> {
        for (node, site) in map.iter() {
            for (regulator, regulation) in network.regulators_of(node) {
                let regulator_site = map
                    .site(regulator)
                    .ok_or(NetworkError::NodeNotFound(regulator))?;
                let ligand = self
                    .engine
                    .sites()
                    .gene(regulator_site)?
                    .product
                    .ok_or_else(|| {
                        let name = network
                            .gene(regulator)
                            .map_or_else(String::new, |g| g.name.clone());
                        TopologyError::RegulatorWithoutProduct(name)
                    })?;
                let promoter = self.engine.tf_binding_site(None, ligand, regulation)?;
                self.engine.add_promoter(site, promoter)?;
            }
            let index = self.engine.push_site(site)?;
            debug!(?site, index, "gene placed");
        }
        Ok(())
    }

    /// Turn every neutral promoter into an activator or a repressor with
    /// equal probability. Returns how many codes were changed.
    pub fn initialise_promoters(&mut self, genes: &[SiteId]) -> Result<usize, TopologyError> {
        let mut changed = 0;
        for &gene in genes {
            let promoters = self.engine.sites().gene(gene)?.promoters.clone();
            for promoter in promoters {
                let neutral = self
                    .engine
                    .sites()
                    .binding(promoter)
                    .is_some_and(|b| b.regulation == 0);
                if neutral {
                    let code = if self.engine.rng.random_bool(0.5) { 1 } else { -1 };
                    self.engine.set_regulation(promoter, code)?;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    /// Give each gene a fresh nucleoid-associated protein as its product and
    /// append that protein's binding sites to the sequence.
    ///
    /// The site count is drawn from `sequence.nap.num()`, each regulation
    /// code uniformly from `states` codes starting at -2; zeros are
    /// re-drawn in both cases.
    pub fn seed_naps(&mut self, genes: &[SiteId]) -> Result<Vec<ProductId>, TopologyError> {
        let nap_params = self.engine.params().sequence.nap.clone();
        let num = nap_params.num();
        let states = nap_params.states.max(1);
        let mut naps = Vec::with_capacity(genes.len());

        for &gene in genes {
            let nap = self
                .engine
                .product(ProductKind::NucleoidAssociatedProtein, None);
            self.engine.set_gene_product(gene, Some(nap))?;

            let rng = &mut self.engine.rng;
            let count = resample_nonzero("NAP site count", || num.sample(&mut *rng) as u64)?;
            for _ in 0..count {
                let rng = &mut self.engine.rng;
                let code = resample_nonzero("NAP regulation", || draw_state(&mut *rng, states))?;
                let site = self.engine.nap_binding_site(None, nap, code)?;
                self.engine.push_site(site)?;
            }
            debug!(?gene, ?nap, count, "NAP sites seeded");
            naps.push(nap);
        }
        Ok(naps)
    }

    /// `build_genes`, `linearise` and `initialise_promoters` in one go.
    pub fn from_network(&mut self, network: &RegulatoryNetwork) -> Result<GeneMap, TopologyError> {
        let map = self.build_genes(network);
        self.linearise(network, &map)?;
        let changed = self.initialise_promoters(&map.sites())?;
        info!(
            genes = map.len(),
            links = network.link_count(),
            sites = self.engine.sequence().len(),
            resampled = changed,
            "topology built"
        );
        Ok(map)
    }
}

/// Build a ready-to-step engine from a network: validate parameters, lay
/// out the topology and compute binding factors.
pub fn build_engine(
    network: &RegulatoryNetwork,
    params: Parameters,
    seed: u64,
) -> Result<(Engine, GeneMap), TopologyError> {
    let mut engine = Engine::new(params, seed)?;
    let map = TopologyBuilder::new(&mut engine).from_network(network)?;
    engine.initialise();
    Ok((engine, map))
}

/// Draw a regulation code: the first of `states` equal-width bins the
/// uniform draw falls in, shifted by -2.
fn draw_state<R: Rng + ?Sized>(rng: &mut R, states: u32) -> i32 {
    let draw: f64 = rng.random();
    let bin = (0..states)
        .find(|&i| draw <= f64::from(i + 1) / f64::from(states))
        .unwrap_or(states - 1);
    bin as i32 - 2
}

fn resample_nonzero<T, F>(what: &'static str, mut draw: F) -> Result<T, TopologyError>
where
    T: PartialEq + Default,
    F: FnMut() -> T,
{
    for _ in 0..MAX_RESAMPLE_ATTEMPTS {
        let value = draw();
        if value != T::default() {
            return Ok(value);
        }
    }
    warn!(what, attempts = MAX_RESAMPLE_ATTEMPTS, "re-sampling gave up");
    Err(TopologyError::ResampleExhausted {
        what,
        attempts: MAX_RESAMPLE_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimRng;
    use crate::test_utils::deterministic_params;

    fn toggle_network(regulation: i32) -> RegulatoryNetwork {
        let mut net = RegulatoryNetwork::new();
        let a = net.add_gene("lacI").unwrap();
        let b = net.add_gene("tetR").unwrap();
        net.connect(a, b, regulation).unwrap();
        net.connect(b, a, regulation).unwrap();
        net
    }

    fn engine() -> Engine {
        Engine::new(deterministic_params(), 11).unwrap()
    }

    #[test]
    fn toggle_switch_layout() {
        let net = toggle_network(-1);
        let mut engine = engine();
        let map = TopologyBuilder::new(&mut engine).from_network(&net).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(engine.describe_sequence(), "T-1|G-1|T-2|G-2");

        let lac = engine.products().lookup(ProductKind::TranscriptionFactor, "lacI");
        let tet_gene = map.site(net.gene_id("tetR").unwrap()).unwrap();
        let promoter = engine.sites().gene(tet_gene).unwrap().promoters[0];
        assert_eq!(engine.sites().binding(promoter).unwrap().ligand, lac.unwrap());
        assert_eq!(engine.sites().binding(promoter).unwrap().regulation, -1);
    }

    #[test]
    fn only_regulators_get_products() {
        let mut net = RegulatoryNetwork::new();
        let a = net.add_gene("a").unwrap();
        let b = net.add_gene("b").unwrap();
        net.connect(a, b, 1).unwrap();
        let mut engine = engine();
        let map = TopologyBuilder::new(&mut engine).build_genes(&net);
        assert!(engine.sites().gene(map.site(a).unwrap()).unwrap().product.is_some());
        assert!(engine.sites().gene(map.site(b).unwrap()).unwrap().product.is_none());
    }

    #[test]
    fn neutral_links_become_signed() {
        let net = toggle_network(0);
        let mut engine = engine();
        let map = TopologyBuilder::new(&mut engine).from_network(&net).unwrap();
        for gene in map.sites() {
            for &p in &engine.sites().gene(gene).unwrap().promoters {
                let code = engine.sites().binding(p).unwrap().regulation;
                assert!(code == 1 || code == -1);
            }
        }
    }

    #[test]
    fn regulator_without_product_is_an_error() {
        let net = toggle_network(1);
        let mut engine = engine();
        let mut builder = TopologyBuilder::new(&mut engine);
        let map = builder.build_genes(&net);
        let lac = map.site(net.gene_id("lacI").unwrap()).unwrap();
        builder.engine.set_gene_product(lac, None).unwrap();
        assert_eq!(
            builder.linearise(&net, &map),
            Err(TopologyError::RegulatorWithoutProduct("lacI".into()))
        );
    }

    #[test]
    fn out_of_range_link_regulation_is_rejected() {
        let net = toggle_network(3);
        let mut engine = engine();
        assert!(matches!(
            TopologyBuilder::new(&mut engine).from_network(&net),
            Err(TopologyError::Site(SiteError::RegulationOutOfRange { code: 3, .. }))
        ));
    }

    #[test]
    fn seed_naps_replaces_products_and_appends_sites() {
        let mut params = deterministic_params();
        params.sequence.nap.mean = 2.0;
        params.sequence.nap.prob = 0.5;
        let mut engine = Engine::new(params, 5).unwrap();
        let net = toggle_network(1);
        let mut builder = TopologyBuilder::new(&mut engine);
        let map = builder.from_network(&net).unwrap();
        let naps = builder.seed_naps(&map.sites()).unwrap();
        assert_eq!(naps.len(), 2);

        for (gene, nap) in map.sites().into_iter().zip(&naps) {
            assert_eq!(engine.sites().gene(gene).unwrap().product, Some(*nap));
        }
        let nap_sites: Vec<_> = engine
            .sequence()
            .sites()
            .iter()
            .filter_map(|&s| engine.sites().get(s))
            .filter(|s| s.kind() == crate::site::SiteKind::NapBinding)
            .collect();
        assert!(nap_sites.len() >= 2);
        for site in nap_sites {
            let code = site.binding().unwrap().regulation;
            assert!(code != 0 && (-2..=2).contains(&code));
        }
    }

    #[test]
    fn seed_naps_with_zero_mean_gives_up() {
        let net = toggle_network(1);
        let mut engine = engine();
        let mut builder = TopologyBuilder::new(&mut engine);
        let map = builder.from_network(&net).unwrap();
        assert_eq!(
            builder.seed_naps(&map.sites()),
            Err(TopologyError::ResampleExhausted {
                what: "NAP site count",
                attempts: MAX_RESAMPLE_ATTEMPTS,
            })
        );
    }

    #[test]
    fn build_engine_is_ready_to_step() {
        let net = toggle_network(-1);
        let (mut engine, map) = build_engine(&net, deterministic_params(), 3).unwrap();
        assert!(engine.is_initialised());
        assert_eq!(map.len(), 2);
        assert!(engine.introduce_polymerase());
        assert!(engine.step().is_ok());
    }

    #[test]
    fn build_engine_rejects_bad_parameters() {
        let mut params = deterministic_params();
        params.sequence.nap.states = 0;
        assert!(matches!(
            build_engine(&RegulatoryNetwork::new(), params, 1),
            Err(TopologyError::Config(ConfigError::NapStatesOutOfRange(0)))
        ));
    }

    #[test]
    fn draw_state_covers_all_codes() {
        let mut rng = SimRng::new(8);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..2000 {
            seen.insert(draw_state(&mut rng, 5));
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![-2, -1, 0, 1, 2]);
    }

    #[test]
    fn single_state_only_draws_minus_two() {
        let mut rng = SimRng::new(8);
        for _ in 0..50 {
            assert_eq!(draw_state(&mut rng, 1), -2);
        }
    }
}
