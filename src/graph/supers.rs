use crate::graph::edge::{combine_flags, MemberFlags};
use crate::graph::{EdgeId, EdgeRef, NodeId, SpliceGraph, SuperEdge, SuperEdgeId, SuperEdgeKind};
use crate::model::site::SiteKind;
use crate::transcript_set::TranscriptSet;

impl<'a> SpliceGraph<'a> {
    fn member_set(&self, member: EdgeRef) -> &TranscriptSet {
        match member {
            EdgeRef::Simple(id) => &self.edge(id).transcripts,
            EdgeRef::Super(id) => &self.super_edge(id).transcripts,
        }
    }

    fn member_flags(&self, member: EdgeRef) -> MemberFlags {
        match member {
            EdgeRef::Simple(id) => {
                let e = self.edge(id);
                MemberFlags {
                    exonic: e.is_exonic(),
                    intronic: e.is_intronic(),
                    all_intronic: e.is_all_intronic(),
                    valid: e.valid,
                }
            }
            EdgeRef::Super(id) => {
                let e = self.super_edge(id);
                MemberFlags {
                    exonic: e.exonic,
                    intronic: e.intronic,
                    all_intronic: e.all_intronic,
                    valid: e.valid,
                }
            }
        }
    }

    /// Tail node of the first atomic edge below `member`.
    pub fn member_tail(&self, member: EdgeRef) -> NodeId {
        match member {
            EdgeRef::Simple(id) => self.edge(id).tail,
            EdgeRef::Super(id) => self.member_tail(self.super_edge(id).members[0]),
        }
    }

    /// Head node of the last atomic edge below `member`.
    pub fn member_head(&self, member: EdgeRef) -> NodeId {
        match member {
            EdgeRef::Simple(id) => self.edge(id).head,
            EdgeRef::Super(id) => {
                let members = &self.super_edge(id).members;
                self.member_head(members[members.len() - 1])
            }
        }
    }

    /// Super-edge over `members`, or the existing one with the same kind and
    /// members.
    ///
    /// Support defaults to the intersection of the member sets. Returns
    /// `None` when the support is empty.
    pub fn create_super_edge(
        &mut self,
        kind: SuperEdgeKind,
        mut members: Vec<EdgeRef>,
        support: Option<TranscriptSet>,
    ) -> Option<SuperEdgeId> {
        match kind {
            SuperEdgeKind::Simple => assert_eq!(members.len(), 1, "simple super-edge takes one member"),
            SuperEdgeKind::Composed | SuperEdgeKind::Paired => {
                assert!(members.len() >= 2, "{kind:?} super-edge needs at least two members")
            }
            SuperEdgeKind::Set => {
                assert!(!members.is_empty(), "empty super-edge set");
                members.sort_unstable();
            }
        }

        if let Some(&id) = self.super_index.get(&(kind, members.clone())) {
            return Some(id);
        }

        let transcripts = match support {
            Some(set) => set,
            None => {
                let mut set = self.member_set(members[0]).clone();
                for &m in &members[1..] {
                    set.intersect_with(self.member_set(m));
                }
                set
            }
        };
        if transcripts.is_empty() {
            return None;
        }

        let flags: Vec<MemberFlags> = members.iter().map(|&m| self.member_flags(m)).collect();
        let combined = combine_flags(kind, &flags);

        assert!(self.super_edges.len() < u32::MAX as usize, "super-edge arena overflow");
        let id = SuperEdgeId(self.super_edges.len() as u32);
        for &m in &members {
            match m {
                EdgeRef::Simple(e) => self.edge_mut(e).super_edges.push(id),
                EdgeRef::Super(s) => {
                    if let Some(sup) = self.super_edges[s.index()].as_mut() {
                        sup.super_edges.push(id);
                    }
                }
            }
        }
        self.super_index.insert((kind, members.clone()), id);
        self.super_edges.push(Some(SuperEdge {
            kind,
            members,
            transcripts,
            exonic: combined.exonic,
            intronic: combined.intronic,
            all_intronic: combined.all_intronic,
            valid: combined.valid,
            super_edges: Vec::new(),
        }));
        Some(id)
    }

    /// Remove a super-edge, every super-edge built on it, and its back-refs.
    pub fn remove_super_edge(&mut self, id: SuperEdgeId) {
        let Some(sup) = self.super_edges.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        self.super_index.remove(&(sup.kind, sup.members.clone()));
        for m in &sup.members {
            match *m {
                EdgeRef::Simple(e) => {
                    if let Some(edge) = self.edges.get_mut(e.index()).and_then(|x| x.as_mut()) {
                        edge.super_edges.retain(|&s| s != id);
                    }
                }
                EdgeRef::Super(s) => {
                    if let Some(parent) = self.super_edges.get_mut(s.index()).and_then(|x| x.as_mut()) {
                        parent.super_edges.retain(|&x| x != id);
                    }
                }
            }
        }
        for outer in sup.super_edges {
            self.remove_super_edge(outer);
        }
    }

    /// Pair two non-adjacent edges (mates). Member order follows the genome,
    /// so `(a, b)` and `(b, a)` give the same super-edge.
    pub fn create_paired_edge(&mut self, a: EdgeRef, b: EdgeRef) -> Option<SuperEdgeId> {
        let key = |g: &Self, r: EdgeRef| {
            let t = g.member_tail(r);
            let h = g.member_head(r);
            (g.site(t).key(), g.site(h).key())
        };
        let members = if key(self, a) <= key(self, b) {
            vec![a, b]
        } else {
            vec![b, a]
        };
        self.create_super_edge(SuperEdgeKind::Paired, members, None)
    }

    /// One COMPOSED super-edge per exon-intron-exon path: the two exonic edges
    /// flanking each intron, supported by the transcripts using all three.
    pub fn build_junction_edges(&mut self) -> Vec<SuperEdgeId> {
        let introns: Vec<EdgeId> = self
            .edge_ids()
            .filter(|&e| {
                let edge = self.edge(e);
                self.site(edge.tail).kind == SiteKind::Donor
                    && self.site(edge.head).kind == SiteKind::Acceptor
            })
            .collect();

        let mut out = Vec::new();
        for intron in introns {
            let (donor, acceptor) = (self.edge(intron).tail, self.edge(intron).head);
            let upstream: Vec<EdgeId> = self
                .node(donor)
                .in_edges()
                .iter()
                .copied()
                .filter(|&e| self.edge(e).is_exonic())
                .collect();
            let downstream: Vec<EdgeId> = self
                .node(acceptor)
                .out_edges()
                .iter()
                .copied()
                .filter(|&e| self.edge(e).is_exonic())
                .collect();
            for &up in &upstream {
                for &down in &downstream {
                    let mut support = self.edge(up).transcripts.intersect(&self.edge(intron).transcripts);
                    support.intersect_with(&self.edge(down).transcripts);
                    let members = vec![EdgeRef::Simple(up), EdgeRef::Simple(down)];
                    if let Some(id) =
                        self.create_super_edge(SuperEdgeKind::Composed, members, Some(support))
                    {
                        out.push(id);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{EdgeRef, GraphConfig, SpliceGraph, SuperEdgeKind};
    use crate::model::transcript::Transcript;
    use crate::types::{RefBlock, Strand};

    fn tx(id: &str, exons: &[(u32, u32)]) -> Transcript {
        let blocks: Vec<RefBlock> = exons
            .iter()
            .map(|&(a, b)| RefBlock::from_one_based(a, b))
            .collect();
        Transcript::from_exons(id, Strand::Plus, 0, &blocks)
    }

    fn exonic_edges(g: &SpliceGraph<'_>) -> Vec<crate::graph::EdgeId> {
        let mut v: Vec<_> = g.edge_ids().filter(|&e| g.edge(e).is_exonic()).collect();
        v.sort_by_key(|&e| g.site(g.edge(e).tail).key());
        v
    }

    #[test]
    fn junctions_need_transcript_evidence() {
        let a = tx("A", &[(100, 200), (300, 400), (500, 600)]);
        let b = tx("B", &[(100, 200), (500, 600)]);
        let mut g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let junctions = g.build_junction_edges();
        // 100-200|300-400, 300-400|500-600, 100-200|500-600
        assert_eq!(junctions.len(), 3);
        for id in junctions {
            let sup = g.super_edge(id);
            assert!(sup.is_exonic());
            assert!(!sup.is_pend());
            assert_eq!(sup.transcripts.popcount(), 1);
        }
    }

    #[test]
    fn empty_support_yields_none_and_lookups_are_cached() {
        let a = tx("A", &[(100, 200)]);
        let b = tx("B", &[(300, 400)]);
        let mut g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let ex = exonic_edges(&g);
        let (ea, eb) = (EdgeRef::Simple(ex[0]), EdgeRef::Simple(ex[1]));

        assert!(g.create_super_edge(SuperEdgeKind::Composed, vec![ea, eb], None).is_none());

        let set1 = g.create_super_edge(SuperEdgeKind::Set, vec![eb, ea], Some(g.full_set()));
        let set2 = g.create_super_edge(SuperEdgeKind::Set, vec![ea, eb], Some(g.full_set()));
        assert!(set1.is_some());
        assert_eq!(set1, set2);
        let s = g.super_edge(set1.unwrap());
        assert!(!s.is_exonic() && !s.is_intronic());

        let single = g.create_super_edge(SuperEdgeKind::Simple, vec![ea], None).unwrap();
        assert!(g.super_edge(single).is_exonic());
    }

    #[test]
    fn paired_edges_are_order_independent() {
        let a = tx("A", &[(100, 200), (300, 400), (500, 600)]);
        let mut g = SpliceGraph::build(&[&a], GraphConfig::default(), None).unwrap();
        let ex = exonic_edges(&g);
        let (first, last) = (EdgeRef::Simple(ex[0]), EdgeRef::Simple(ex[2]));
        let p1 = g.create_paired_edge(last, first).unwrap();
        let p2 = g.create_paired_edge(first, last).unwrap();
        assert_eq!(p1, p2);
        let sup = g.super_edge(p1);
        assert!(sup.is_pend());
        assert_eq!(sup.members, vec![first, last]);

        // Nested super-edges go away with their members.
        let outer = g
            .create_super_edge(SuperEdgeKind::Simple, vec![EdgeRef::Super(p1)], None)
            .unwrap();
        g.remove_edge(ex[0]);
        assert!(g.try_super_edge(p1).is_none());
        assert!(g.try_super_edge(outer).is_none());
    }
}
