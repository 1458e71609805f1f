use slotmap::new_key_type;

new_key_type! {
    /// Identifies a mobile product (enzyme, TF, NAP, RNA polymerase) in the
    /// product registry.
    pub struct ProductId;

    /// Identifies a sequence element (empty site, gene, binding site) in the
    /// site registry.
    pub struct SiteId;

    /// Identifies a gene node in a regulatory network.
    pub struct GeneNodeId;

    /// Identifies a regulatory link between two gene nodes.
    pub struct LinkId;
}
