use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::graph::{EdgeId, NodeId, SimpleEdge, SpliceGraph};
use crate::transcript_set::TranscriptSet;

/// First (or last) exon edges sharing the same inner splice site.
struct FlankMember {
    boundary: NodeId,
    edge: EdgeId,
}

impl<'a> SpliceGraph<'a> {
    /// Merge first exons that only differ in their TSS into the most upstream
    /// one, and last exons that only differ in their TES into the most
    /// downstream one. Moved transcripts are recorded in the extension table.
    pub fn collapse_fuzzy_flanks(&mut self) {
        let moved_starts = self.collapse_flank(true);
        let moved_ends = self.collapse_flank(false);
        let pruned = self.prune_dead_ends();
        debug!(moved_starts, moved_ends, pruned, "collapsed fuzzy flanks");
    }

    /// Returns the number of first/last exon edges folded into an anchor.
    fn collapse_flank(&mut self, five_prime: bool) -> usize {
        let sentinel = if five_prime { self.root } else { self.leaf };

        // boundary TSS/TES nodes adjacent to the sentinel
        let boundaries: Vec<NodeId> = if five_prime {
            self.node(sentinel)
                .out_edges()
                .iter()
                .map(|&e| self.edge(e).head)
                .collect()
        } else {
            self.node(sentinel)
                .in_edges()
                .iter()
                .map(|&e| self.edge(e).tail)
                .collect()
        };

        let mut groups: BTreeMap<NodeId, Vec<FlankMember>> = BTreeMap::new();
        for boundary in boundaries {
            let flank_edges = if five_prime {
                self.node(boundary).out_edges().to_vec()
            } else {
                self.node(boundary).in_edges().to_vec()
            };
            for edge in flank_edges {
                let e = self.edge(edge);
                let inner = if five_prime { e.head } else { e.tail };
                // Single exons have no inner splice site.
                if !self.site(inner).kind.is_splice() {
                    continue;
                }
                groups.entry(inner).or_default().push(FlankMember { boundary, edge });
            }
        }

        let mut folded = 0;
        for (inner, members) in groups {
            if members.len() < 2 {
                continue;
            }
            let anchor = members
                .iter()
                .map(|m| m.boundary)
                .min_by_key(|&b| {
                    let pos = self.site(b).pos;
                    if five_prime { pos } else { -pos }
                })
                .unwrap_or(members[0].boundary);
            let anchor_site = self.node(anchor).site;
            let Some(genomic) = anchor_site.genomic() else {
                continue;
            };

            for m in members.iter().filter(|m| m.boundary != anchor) {
                let edge = self.edge(m.edge);
                let moved = edge.transcripts.clone();
                let source = edge.source;

                if five_prime {
                    self.create_edge(anchor, inner, &moved, source);
                    self.create_edge(sentinel, anchor, &moved, source);
                } else {
                    self.create_edge(inner, anchor, &moved, source);
                    self.create_edge(anchor, sentinel, &moved, source);
                }
                for t in moved.iter() {
                    self.mark_extended(anchor_site, t, genomic, five_prime);
                }

                self.remove_edge(m.edge);
                self.shrink_sentinel_edge(sentinel, m.boundary, &moved, five_prime);
                self.node_mut(m.boundary).transcripts.subtract(&moved);
                folded += 1;
            }
        }
        folded
    }

    /// Drop `moved` from the edge linking `sentinel` and `boundary`.
    fn shrink_sentinel_edge(
        &mut self,
        sentinel: NodeId,
        boundary: NodeId,
        moved: &TranscriptSet,
        five_prime: bool,
    ) {
        let (tail, head) = if five_prime {
            (sentinel, boundary)
        } else {
            (boundary, sentinel)
        };
        let Some(id) = self.find_edge(tail, head, false) else {
            return;
        };
        let edge = self.edge_mut(id);
        edge.transcripts.subtract(moved);
        if edge.transcripts.is_empty() {
            self.remove_edge(id);
        }
    }

    /// Remove root edges leading nowhere, leaf edges coming from nowhere and
    /// the nodes this leaves without edges. Returns the number of removals.
    pub(crate) fn prune_dead_ends(&mut self) -> usize {
        let mut removed = 0;
        let root_edges = self.node(self.root).out_edges().to_vec();
        for e in root_edges {
            let head = self.edge(e).head;
            if head != self.leaf && self.node(head).out_degree() == 0 {
                self.remove_edge(e);
                removed += 1;
            }
        }
        let leaf_edges = self.node(self.leaf).in_edges().to_vec();
        for e in leaf_edges {
            let tail = self.edge(e).tail;
            if tail != self.root && self.node(tail).in_degree() == 0 {
                self.remove_edge(e);
                removed += 1;
            }
        }
        removed + self.remove_orphans()
    }

    /// Remove non-sentinel nodes without edges.
    pub(crate) fn remove_orphans(&mut self) -> usize {
        let orphans: Vec<NodeId> = self
            .node_ids()
            .filter(|&id| id != self.root && id != self.leaf)
            .filter(|&id| {
                let n = self.node(id);
                n.in_degree() == 0 && n.out_degree() == 0
            })
            .collect();
        for &id in &orphans {
            self.remove_node(id);
        }
        orphans.len()
    }

    /// Replace every maximal chain through nodes with in-degree `< k` and a
    /// single out-edge by one edge carrying the intersection of the chain's
    /// transcript sets.
    ///
    /// A chain stops early when the running intersection would become empty;
    /// the blocking node then starts a chain of its own. Edges that do not end
    /// up as (or inside) a contracted edge are deleted afterwards, as are the
    /// nodes left without edges.
    pub fn contract(&mut self, k: usize) {
        assert!(k >= 1, "contraction degree must be positive");
        let before = (self.node_count(), self.edge_count());

        let mut stack: Vec<EdgeId> = Vec::new();
        let mut queued: HashSet<NodeId> = HashSet::new();
        let mut started: HashSet<EdgeId> = HashSet::new();

        // Contracted edges join the adjacency lists as they are emitted;
        // chain decisions use the degrees of the input graph.
        let degrees: HashMap<NodeId, (usize, usize)> = self
            .node_ids()
            .map(|id| {
                let node = self.node(id);
                (id, (node.in_degree(), node.out_degree()))
            })
            .collect();

        let starts: Vec<NodeId> = self
            .node_ids()
            .filter(|id| degrees.get(id).is_some_and(|&(i, _)| i == 0))
            .collect();
        for id in starts {
            queued.insert(id);
            stack.extend(self.node(id).out_edges().iter().rev());
        }

        while let Some(first) = stack.pop() {
            if !started.insert(first) {
                continue;
            }
            let mut chain = vec![first];
            let mut running = self.edge(first).transcripts.clone();
            let mut cur = self.edge(first).head;

            loop {
                let (in_degree, out_degree) = degrees.get(&cur).copied().unwrap_or((0, 0));
                if in_degree >= k || out_degree != 1 {
                    break;
                }
                let next = self.node(cur).out_edges()[0];
                let inter = running.intersect(&self.edge(next).transcripts);
                if inter.is_empty() {
                    break;
                }
                running = inter;
                chain.push(next);
                cur = self.edge(next).head;
            }

            self.emit_chain(&chain, running);

            if queued.insert(cur) {
                stack.extend(self.node(cur).out_edges().iter().rev());
            }
        }

        let stale: Vec<EdgeId> = self
            .edge_ids()
            .filter(|&e| !self.edge(e).contracted)
            .collect();
        for e in stale {
            self.remove_edge(e);
        }
        self.remove_orphans();

        debug!(
            k,
            nodes_before = before.0,
            edges_before = before.1,
            nodes = self.node_count(),
            edges = self.edge_count(),
            "contracted splice graph"
        );
    }

    fn emit_chain(&mut self, chain: &[EdgeId], transcripts: TranscriptSet) {
        if let [only] = chain {
            self.edge_mut(*only).contracted = true;
            return;
        }
        let first = self.edge(chain[0]);
        let tail = first.tail;
        let mut source = first.source;
        let mut valid = true;
        let mut exonic_length = 0;
        let mut via = Vec::new();
        let mut head = tail;
        for (i, &id) in chain.iter().enumerate() {
            let e = self.edge(id);
            source = source.min(e.source);
            valid &= e.valid;
            exonic_length += e.exonic_length;
            via.extend(e.via.iter().copied());
            if i + 1 < chain.len() {
                via.push(self.node(e.head).site);
            }
            head = e.head;
        }
        for &id in chain {
            self.edge_mut(id).processed = true;
        }
        let (tail_site, head_site) = (self.node(tail).site, self.node(head).site);
        let edge = SimpleEdge {
            tail,
            head,
            transcripts,
            source,
            exonic: tail_site.kind.is_left_flank() && head_site.kind.is_right_flank(),
            valid,
            contracted: true,
            processed: true,
            exonic_length,
            via,
            super_edges: Vec::new(),
        };
        self.push_edge(edge);
    }
}
