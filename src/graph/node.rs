use crate::graph::edge::EdgeId;
use crate::model::site::SpliceSite;
use crate::transcript_set::TranscriptSet;

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A site in the graph plus the transcripts passing through it.
#[derive(Debug, Clone)]
pub struct Node {
    pub site: SpliceSite,
    pub transcripts: TranscriptSet,
    pub(crate) in_edges: Vec<EdgeId>,
    pub(crate) out_edges: Vec<EdgeId>,
}

impl Node {
    pub(crate) fn new(site: SpliceSite, transcripts: TranscriptSet) -> Self {
        Self {
            site,
            transcripts,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        }
    }

    /// In-edges in insertion order.
    pub fn in_edges(&self) -> &[EdgeId] {
        &self.in_edges
    }

    /// Out-edges in insertion order.
    pub fn out_edges(&self) -> &[EdgeId] {
        &self.out_edges
    }

    #[inline]
    pub fn in_degree(&self) -> usize {
        self.in_edges.len()
    }

    #[inline]
    pub fn out_degree(&self) -> usize {
        self.out_edges.len()
    }
}
