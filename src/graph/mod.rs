//! Splicing graph of one gene locus.
//!
//! Nodes, edges and super-edges live in arenas addressed by integer ids.
//! Removal leaves a `None` hole so ids stay stable for the lifetime of the
//! graph; nothing is ever re-numbered.

pub mod builder;
pub mod config;
pub mod contract;
pub mod edge;
pub mod extension;
pub mod node;
pub mod query;
pub mod supers;

use std::collections::HashMap;

pub use config::GraphConfig;
pub use edge::{EdgeId, EdgeKey, EdgeRef, SimpleEdge, SuperEdge, SuperEdgeId, SuperEdgeKind};
pub use extension::ExtensionTable;
pub use node::{Node, NodeId};
pub use query::{ConstitutiveRegion, Junction};

use crate::model::site::{SiteKey, SiteKind, SpliceSite};
use crate::model::transcript::Transcript;
use crate::model::types::SourceType;
use crate::transcript_set::TranscriptSet;
use crate::types::Strand;

pub struct SpliceGraph<'a> {
    pub(crate) config: GraphConfig,
    /// Locus transcripts sorted by stable id; position = bit index.
    pub(crate) transcripts: Vec<&'a Transcript>,
    pub(crate) chr_id: usize,
    pub(crate) strand: Strand,

    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) node_index: HashMap<SiteKey, NodeId>,
    pub(crate) edges: Vec<Option<SimpleEdge>>,
    pub(crate) edge_index: HashMap<EdgeKey, EdgeId>,
    pub(crate) super_edges: Vec<Option<SuperEdge>>,
    pub(crate) super_index: HashMap<(SuperEdgeKind, Vec<EdgeRef>), SuperEdgeId>,

    pub(crate) root: NodeId,
    pub(crate) leaf: NodeId,

    /// Boundary sites that only exist because transcripts were extended to
    /// them, with the transcripts they are synthetic for.
    pub(crate) soft_sites: HashMap<SiteKey, TranscriptSet>,
    pub(crate) extensions: ExtensionTable,
}

impl<'a> SpliceGraph<'a> {
    /// Empty graph holding only the two sentinels. `transcripts` must already
    /// be sorted by stable id.
    pub(crate) fn with_transcripts(
        transcripts: Vec<&'a Transcript>,
        config: GraphConfig,
        chr_id: usize,
        strand: Strand,
    ) -> Self {
        let n = transcripts.len();
        let mut graph = Self {
            config,
            transcripts,
            chr_id,
            strand,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            super_edges: Vec::new(),
            super_index: HashMap::new(),
            root: NodeId(0),
            leaf: NodeId(1),
            soft_sites: HashMap::new(),
            extensions: ExtensionTable::default(),
        };
        graph.root = graph.push_node(SpliceSite::root(), TranscriptSet::empty(n));
        graph.leaf = graph.push_node(SpliceSite::leaf(), TranscriptSet::empty(n));
        graph
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn chr_id(&self) -> usize {
        self.chr_id
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn leaf(&self) -> NodeId {
        self.leaf
    }

    pub fn extensions(&self) -> &ExtensionTable {
        &self.extensions
    }

    // ---- transcripts ----

    pub fn transcript_count(&self) -> usize {
        self.transcripts.len()
    }

    /// Transcripts in bit order.
    pub fn transcripts(&self) -> &[&'a Transcript] {
        &self.transcripts
    }

    pub fn transcript(&self, index: usize) -> &'a Transcript {
        self.transcripts[index]
    }

    pub fn index_of(&self, stable_id: &str) -> Option<usize> {
        self.transcripts
            .binary_search_by(|t| t.stable_id.as_str().cmp(stable_id))
            .ok()
    }

    pub fn empty_set(&self) -> TranscriptSet {
        TranscriptSet::empty(self.transcripts.len())
    }

    pub fn full_set(&self) -> TranscriptSet {
        TranscriptSet::full(self.transcripts.len())
    }

    /// Bit set of the given transcripts. Panics on a transcript that is not
    /// part of this locus.
    pub fn encode(&self, transcripts: &[&Transcript]) -> TranscriptSet {
        let mut set = self.empty_set();
        for tx in transcripts {
            match self.index_of(&tx.stable_id) {
                Some(i) => set.insert(i),
                None => panic!("transcript '{}' is not part of this locus", tx.stable_id),
            }
        }
        set
    }

    /// Stable ids of the members of `set`, in bit order.
    pub fn transcript_ids(&self, set: &TranscriptSet) -> Vec<&'a str> {
        set.iter()
            .map(|i| self.transcripts[i].stable_id.as_str())
            .collect()
    }

    /// Whether `site` was only introduced as an extension for transcript `tx`.
    pub fn is_soft_site(&self, site: &SpliceSite, tx: usize) -> bool {
        self.soft_sites
            .get(&site.key())
            .is_some_and(|set| set.contains(tx))
    }

    // ---- arena access ----

    pub fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(id.index()).and_then(|n| n.as_ref()) {
            Some(n) => n,
            None => panic!("node {id:?} does not exist"),
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id.index()).and_then(|n| n.as_mut()) {
            Some(n) => n,
            None => panic!("node {id:?} does not exist"),
        }
    }

    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    pub fn edge(&self, id: EdgeId) -> &SimpleEdge {
        match self.edges.get(id.index()).and_then(|e| e.as_ref()) {
            Some(e) => e,
            None => panic!("edge {id:?} does not exist"),
        }
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> &mut SimpleEdge {
        match self.edges.get_mut(id.index()).and_then(|e| e.as_mut()) {
            Some(e) => e,
            None => panic!("edge {id:?} does not exist"),
        }
    }

    pub fn try_edge(&self, id: EdgeId) -> Option<&SimpleEdge> {
        self.edges.get(id.index()).and_then(|e| e.as_ref())
    }

    pub fn super_edge(&self, id: SuperEdgeId) -> &SuperEdge {
        match self.super_edges.get(id.index()).and_then(|e| e.as_ref()) {
            Some(e) => e,
            None => panic!("super-edge {id:?} does not exist"),
        }
    }

    pub fn try_super_edge(&self, id: SuperEdgeId) -> Option<&SuperEdge> {
        self.super_edges.get(id.index()).and_then(|e| e.as_ref())
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| EdgeId(i as u32))
    }

    pub fn super_edge_ids(&self) -> impl Iterator<Item = SuperEdgeId> + '_ {
        self.super_edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| SuperEdgeId(i as u32))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    pub fn super_edge_count(&self) -> usize {
        self.super_edges.iter().filter(|e| e.is_some()).count()
    }

    /// Live nodes in 5' -> 3' order, root first and leaf last.
    pub fn nodes_in_order(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.node_ids().collect();
        ids.sort_by_key(|&id| self.node(id).site.key());
        ids
    }

    pub fn find_node(&self, key: SiteKey) -> Option<NodeId> {
        self.node_index.get(&key).copied()
    }

    pub fn find_edge(&self, tail: NodeId, head: NodeId, exonic: bool) -> Option<EdgeId> {
        self.edge_index
            .get(&EdgeKey { tail, head, exonic })
            .copied()
    }

    pub fn site(&self, id: NodeId) -> &SpliceSite {
        &self.node(id).site
    }

    // ---- construction ----

    fn push_node(&mut self, site: SpliceSite, transcripts: TranscriptSet) -> NodeId {
        assert!(self.nodes.len() < u32::MAX as usize, "node arena overflow");
        let id = NodeId(self.nodes.len() as u32);
        self.node_index.insert(site.key(), id);
        self.nodes.push(Some(Node::new(site, transcripts)));
        id
    }

    /// Node for `site`, created on first use.
    ///
    /// Returns `None` when canonical filtering is on and `site` is a
    /// non-canonical donor or acceptor.
    pub fn create_node(&mut self, site: SpliceSite) -> Option<NodeId> {
        if let Some(&id) = self.node_index.get(&site.key()) {
            return Some(id);
        }
        if self.config.canonical_sites_only && site.kind.is_splice() && !site.canonical {
            return None;
        }
        let empty = self.empty_set();
        Some(self.push_node(site, empty))
    }

    /// Add `transcripts` to the edge `tail -> head`, creating it if needed.
    ///
    /// The edge is exonic iff `tail` is a left flank and `head` a right flank.
    pub fn create_edge(
        &mut self,
        tail: NodeId,
        head: NodeId,
        transcripts: &TranscriptSet,
        source: SourceType,
    ) -> EdgeId {
        let tail_site = self.node(tail).site;
        let head_site = self.node(head).site;
        assert!(tail_site < head_site, "edge {tail_site} -> {head_site} runs backwards");
        let exonic = tail_site.kind.is_left_flank() && head_site.kind.is_right_flank();
        let key = EdgeKey { tail, head, exonic };

        let id = if let Some(&id) = self.edge_index.get(&key) {
            let edge = self.edge_mut(id);
            edge.transcripts.union_with(transcripts);
            edge.source = edge.source.min(source);
            let best = edge.source;
            let valid = self.intron_valid(&tail_site, &head_site, best);
            self.edge_mut(id).valid = valid;
            id
        } else {
            let exonic_length = if exonic && !tail_site.is_sentinel() && !head_site.is_sentinel() {
                (head_site.pos - tail_site.pos + 1) as u64
            } else {
                0
            };
            let edge = SimpleEdge {
                tail,
                head,
                transcripts: transcripts.clone(),
                source,
                exonic,
                valid: self.intron_valid(&tail_site, &head_site, source),
                contracted: false,
                processed: false,
                exonic_length,
                via: Vec::new(),
                super_edges: Vec::new(),
            };
            let id = self.push_edge(edge);
            self.edge_index.insert(key, id);
            id
        };

        self.node_mut(tail).transcripts.union_with(transcripts);
        self.node_mut(head).transcripts.union_with(transcripts);
        id
    }

    /// Insert an edge into the arena and the adjacency lists (not the key index).
    pub(crate) fn push_edge(&mut self, edge: SimpleEdge) -> EdgeId {
        assert!(self.edges.len() < u32::MAX as usize, "edge arena overflow");
        let id = EdgeId(self.edges.len() as u32);
        let (tail, head) = (edge.tail, edge.head);
        self.edges.push(Some(edge));
        self.node_mut(tail).out_edges.push(id);
        self.node_mut(head).in_edges.push(id);
        id
    }

    /// Remove an edge and, transitively, every super-edge built on it.
    pub fn remove_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        if let Some(n) = self.nodes[edge.tail.index()].as_mut() {
            n.out_edges.retain(|&e| e != id);
        }
        if let Some(n) = self.nodes[edge.head.index()].as_mut() {
            n.in_edges.retain(|&e| e != id);
        }
        let key = EdgeKey {
            tail: edge.tail,
            head: edge.head,
            exonic: edge.exonic,
        };
        if self.edge_index.get(&key) == Some(&id) {
            self.edge_index.remove(&key);
        }
        for sid in edge.super_edges {
            self.remove_super_edge(sid);
        }
    }

    /// Remove a node together with its incident edges. Sentinels stay.
    pub fn remove_node(&mut self, id: NodeId) {
        assert!(id != self.root && id != self.leaf, "sentinels cannot be removed");
        let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        // The node is gone already; edge removal skips its adjacency lists.
        for e in node.in_edges.iter().chain(node.out_edges.iter()) {
            self.remove_edge(*e);
        }
        if self.node_index.get(&node.site.key()) == Some(&id) {
            self.node_index.remove(&node.site.key());
        }
    }

    /// Intron length and acceptability rules; non-intron edges are always valid.
    fn intron_valid(&self, tail: &SpliceSite, head: &SpliceSite, source: SourceType) -> bool {
        if tail.kind != SiteKind::Donor || head.kind != SiteKind::Acceptor {
            return true;
        }
        let len = head.pos - tail.pos - 1;
        if len < i64::from(self.config.min_intron_length) {
            return false;
        }
        if source > self.config.intron_confidence && self.config.acceptable_intron_check {
            let short_enough = self
                .config
                .max_intron_length
                .map_or(true, |max| len <= i64::from(max));
            return tail.canonical && head.canonical && short_enough;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::InMemoryGenome;
    use crate::types::RefBlock;

    fn tx(id: &str, source: SourceType, exons: &[(u32, u32)]) -> Transcript {
        let blocks: Vec<RefBlock> = exons
            .iter()
            .map(|&(a, b)| RefBlock::from_one_based(a, b))
            .collect();
        Transcript::from_exons(id, Strand::Plus, source, &blocks)
    }

    fn intron_edge(g: &SpliceGraph<'_>) -> EdgeId {
        g.edge_ids()
            .find(|&e| {
                let edge = g.edge(e);
                g.site(edge.tail).kind == SiteKind::Donor
                    && g.site(edge.head).kind == SiteKind::Acceptor
            })
            .unwrap()
    }

    #[test]
    fn exonic_and_intronic_edges_between_same_sites_are_distinct() {
        let a = tx("A", 0, &[(100, 200), (300, 400)]);
        let b = tx("B", 0, &[(100, 400)]);
        let mut g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let n1 = g.create_node(SpliceSite::new(300, SiteKind::Acceptor, 0)).unwrap();
        let n2 = g.create_node(SpliceSite::new(400, SiteKind::Donor, 0)).unwrap();
        let set = g.encode(&[&b]);
        let e = g.create_edge(n1, n2, &set, 0);
        assert!(g.edge(e).is_exonic());
        assert_eq!(g.edge(e).exonic_length, 101);
        assert_eq!(g.edge(e).transcripts.popcount(), 2);
        let cnt = g.edge_ids().filter(|&x| g.edge(x).tail == n1).count();
        assert_eq!(cnt, 1);
    }

    #[test]
    fn short_introns_are_invalid() {
        let a = tx("A", 0, &[(100, 200), (205, 300)]);
        let cfg = GraphConfig {
            min_intron_length: 10,
            ..GraphConfig::default()
        };
        let g = SpliceGraph::build(&[&a], cfg, None).unwrap();
        assert!(!g.edge(intron_edge(&g)).valid);
    }

    #[test]
    fn better_source_flips_intron_to_valid() {
        // Poly-A genome: every motif is non-canonical.
        let mut genome = InMemoryGenome::new();
        genome.insert(0, &[b'A'; 1_000]);
        let cfg = GraphConfig {
            intron_confidence: 1,
            acceptable_intron_check: true,
            ..GraphConfig::default()
        };

        let weak = tx("A", 3, &[(100, 200), (300, 400)]);
        let g = SpliceGraph::build(&[&weak], cfg.clone(), Some(&genome)).unwrap();
        assert!(!g.edge(intron_edge(&g)).valid);

        let strong = tx("B", 0, &[(100, 200), (300, 400)]);
        let g = SpliceGraph::build(&[&weak, &strong], cfg, Some(&genome)).unwrap();
        let e = intron_edge(&g);
        assert!(g.edge(e).valid);
        assert_eq!(g.edge(e).source, 0);
    }

    #[test]
    fn canonical_filter_rejects_nodes() {
        let a = tx("A", 0, &[(100, 200)]);
        let cfg = GraphConfig {
            canonical_sites_only: true,
            ..GraphConfig::default()
        };
        let mut g = SpliceGraph::build(&[&a], cfg, None).unwrap();
        let mut site = SpliceSite::new(500, SiteKind::Donor, 0);
        site.canonical = false;
        assert!(g.create_node(site).is_none());
        site.kind = SiteKind::Tes;
        assert!(g.create_node(site).is_some());
    }

    #[test]
    fn removing_an_edge_cascades_to_super_edges() {
        let a = tx("A", 0, &[(100, 200), (300, 400)]);
        let mut g = SpliceGraph::build(&[&a], GraphConfig::default(), None).unwrap();
        let junctions = g.build_junction_edges();
        assert_eq!(junctions.len(), 1);
        let sid = junctions[0];
        let first = match g.super_edge(sid).members[0] {
            EdgeRef::Simple(e) => e,
            EdgeRef::Super(_) => unreachable!(),
        };
        g.remove_edge(first);
        assert!(g.try_super_edge(sid).is_none());
        assert_eq!(g.super_edge_count(), 0);
    }

    #[test]
    fn encode_uses_sorted_order() {
        let b = tx("B", 0, &[(100, 200)]);
        let a = tx("A", 0, &[(100, 200)]);
        let g = SpliceGraph::build(&[&b, &a], GraphConfig::default(), None).unwrap();
        assert_eq!(g.index_of("A"), Some(0));
        assert_eq!(g.encode(&[&b]).iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(g.transcript_ids(&g.full_set()), vec!["A", "B"]);
    }
}
