use crate::id::{GeneNodeId, LinkId};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while building a regulatory network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("gene node not found: {0:?}")]
    NodeNotFound(GeneNodeId),
    #[error("duplicate gene name: {0}")]
    DuplicateGene(String),
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Adjacency lists for a single gene, in link insertion order.
#[derive(Debug, Clone, Default)]
struct NodeAdjacency {
    /// Links whose target is this gene.
    inputs: Vec<LinkId>,
    /// Links whose regulator is this gene.
    outputs: Vec<LinkId>,
}

/// A gene in the regulatory network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneNode {
    pub name: String,
}

/// A regulatory link: `regulator`'s product acts on `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub regulator: GeneNodeId,
    pub target: GeneNodeId,
    /// Signed effect: positive activates, negative represses, zero is
    /// neutral and re-sampled when promoters are initialised.
    pub regulation: i32,
}

// ---------------------------------------------------------------------------
// RegulatoryNetwork
// ---------------------------------------------------------------------------

/// A directed graph of named genes. At most one link exists per ordered
/// `(regulator, target)` pair; self-links model autoregulation.
#[derive(Debug, Default)]
pub struct RegulatoryNetwork {
    genes: SlotMap<GeneNodeId, GeneNode>,
    links: SlotMap<LinkId, Link>,
    adjacency: SecondaryMap<GeneNodeId, NodeAdjacency>,
    by_name: HashMap<String, GeneNodeId>,
}

impl RegulatoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a gene. Names are unique within a network.
    pub fn add_gene(&mut self, name: &str) -> Result<GeneNodeId, NetworkError> {
        if self.by_name.contains_key(name) {
            return Err(NetworkError::DuplicateGene(name.to_string()));
        }
        let id = self.genes.insert(GeneNode {
            name: name.to_string(),
        });
        self.adjacency.insert(id, NodeAdjacency::default());
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Link `regulator` to `target`. Connecting an already linked pair
    /// overwrites its regulation and returns the existing link.
    pub fn connect(
        &mut self,
        regulator: GeneNodeId,
        target: GeneNodeId,
        regulation: i32,
    ) -> Result<LinkId, NetworkError> {
        for node in [regulator, target] {
            if !self.genes.contains_key(node) {
                return Err(NetworkError::NodeNotFound(node));
            }
        }
        if let Some(existing) = self.find_link(regulator, target) {
            if let Some(link) = self.links.get_mut(existing) {
                link.regulation = regulation;
            }
            return Ok(existing);
        }

        let id = self.links.insert(Link {
            regulator,
            target,
            regulation,
        });
        if let Some(adj) = self.adjacency.get_mut(regulator) {
            adj.outputs.push(id);
        }
        if let Some(adj) = self.adjacency.get_mut(target) {
            adj.inputs.push(id);
        }
        Ok(id)
    }

    fn find_link(&self, regulator: GeneNodeId, target: GeneNodeId) -> Option<LinkId> {
        self.adjacency
            .get(regulator)?
            .outputs
            .iter()
            .copied()
            .find(|&l| self.links.get(l).is_some_and(|link| link.target == target))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn gene(&self, id: GeneNodeId) -> Option<&GeneNode> {
        self.genes.get(id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn gene_id(&self, name: &str) -> Option<GeneNodeId> {
        self.by_name.get(name).copied()
    }

    /// All genes in insertion order.
    pub fn genes(&self) -> impl Iterator<Item = (GeneNodeId, &GeneNode)> {
        self.genes.iter()
    }

    /// All links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter()
    }

    /// Incoming links of `target` as `(regulator, regulation)`, in insertion
    /// order.
    pub fn regulators_of(&self, target: GeneNodeId) -> Vec<(GeneNodeId, i32)> {
        self.adjacency
            .get(target)
            .map(|adj| {
                adj.inputs
                    .iter()
                    .filter_map(|&l| self.links.get(l))
                    .map(|link| (link.regulator, link.regulation))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of genes `id` regulates.
    pub fn out_degree(&self, id: GeneNodeId) -> usize {
        self.adjacency.get(id).map_or(0, |adj| adj.outputs.len())
    }

    pub fn in_degree(&self, id: GeneNodeId) -> usize {
        self.adjacency.get(id).map_or(0, |adj| adj.inputs.len())
    }

    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}
