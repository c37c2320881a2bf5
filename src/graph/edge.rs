use crate::graph::node::NodeId;
use crate::model::site::SpliceSite;
use crate::model::types::SourceType;
use crate::transcript_set::TranscriptSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuperEdgeId(pub u32);

impl SuperEdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Member of a super-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeRef {
    Simple(EdgeId),
    Super(SuperEdgeId),
}

/// Lookup key of an atomic edge. Exonic and intronic edges between the same
/// two sites are different edges (intron retention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub tail: NodeId,
    pub head: NodeId,
    pub exonic: bool,
}

/// A genomic segment between two adjacent sites of at least one transcript,
/// or a contracted chain of such segments.
#[derive(Debug, Clone)]
pub struct SimpleEdge {
    pub tail: NodeId,
    pub head: NodeId,
    pub transcripts: TranscriptSet,
    /// Best (lowest) source type among the supporting transcripts.
    pub source: SourceType,
    pub exonic: bool,
    pub valid: bool,
    pub contracted: bool,
    pub processed: bool,
    /// Exonic bases covered by the edge, flank sites included.
    pub exonic_length: u64,
    /// Sites absorbed by contraction, 5' -> 3'.
    pub via: Vec<SpliceSite>,
    pub(crate) super_edges: Vec<SuperEdgeId>,
}

impl SimpleEdge {
    #[inline]
    pub fn is_exonic(&self) -> bool {
        self.exonic
    }

    #[inline]
    pub fn is_intronic(&self) -> bool {
        !self.exonic
    }

    /// Atomic edges are either entirely exonic or entirely intronic.
    #[inline]
    pub fn is_all_intronic(&self) -> bool {
        !self.exonic
    }

    pub fn super_edges(&self) -> &[SuperEdgeId] {
        &self.super_edges
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SuperEdgeKind {
    /// Wraps exactly one edge.
    Simple,
    /// Chain of edges read by one fragment (junction).
    Composed,
    /// Two non-adjacent edges linked by mates.
    Paired,
    /// Unordered bag, only used for de-duplication lookups.
    Set,
}

#[derive(Debug, Clone)]
pub struct SuperEdge {
    pub kind: SuperEdgeKind,
    pub members: Vec<EdgeRef>,
    pub transcripts: TranscriptSet,
    pub(crate) exonic: bool,
    pub(crate) intronic: bool,
    pub(crate) all_intronic: bool,
    pub(crate) valid: bool,
    pub(crate) super_edges: Vec<SuperEdgeId>,
}

impl SuperEdge {
    #[inline]
    pub fn is_pend(&self) -> bool {
        self.kind == SuperEdgeKind::Paired
    }

    #[inline]
    pub fn is_exonic(&self) -> bool {
        self.exonic
    }

    #[inline]
    pub fn is_intronic(&self) -> bool {
        self.intronic
    }

    #[inline]
    pub fn is_all_intronic(&self) -> bool {
        self.all_intronic
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn super_edges(&self) -> &[SuperEdgeId] {
        &self.super_edges
    }
}

/// Flags of a member as seen by an enclosing super-edge.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MemberFlags {
    pub exonic: bool,
    pub intronic: bool,
    pub all_intronic: bool,
    pub valid: bool,
}

/// Combine member flags: AND for exonic/all-intronic/valid, OR for intronic.
/// Sets are containers, never exonic or intronic.
pub(crate) fn combine_flags(kind: SuperEdgeKind, members: &[MemberFlags]) -> MemberFlags {
    let valid = members.iter().all(|m| m.valid);
    if kind == SuperEdgeKind::Set {
        return MemberFlags {
            exonic: false,
            intronic: false,
            all_intronic: false,
            valid,
        };
    }
    MemberFlags {
        exonic: members.iter().all(|m| m.exonic),
        intronic: members.iter().any(|m| m.intronic),
        all_intronic: members.iter().all(|m| m.all_intronic),
        valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXON: MemberFlags = MemberFlags {
        exonic: true,
        intronic: false,
        all_intronic: false,
        valid: true,
    };
    const INTRON: MemberFlags = MemberFlags {
        exonic: false,
        intronic: true,
        all_intronic: true,
        valid: false,
    };

    #[test]
    fn composed_flags_and_or() {
        let f = combine_flags(SuperEdgeKind::Composed, &[EXON, EXON]);
        assert!(f.exonic && !f.intronic && f.valid);

        let f = combine_flags(SuperEdgeKind::Composed, &[EXON, INTRON]);
        assert!(!f.exonic && f.intronic && !f.all_intronic && !f.valid);

        let f = combine_flags(SuperEdgeKind::Paired, &[INTRON, INTRON]);
        assert!(f.all_intronic);
    }

    #[test]
    fn sets_are_never_exonic_or_intronic() {
        let f = combine_flags(SuperEdgeKind::Set, &[EXON, INTRON]);
        assert!(!f.exonic && !f.intronic && !f.all_intronic);
    }
}
