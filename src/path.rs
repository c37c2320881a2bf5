//! Bounded path search between two exonic anchors.
//!
//! Used to check whether two read anchors (mates, or the two halves of a
//! split alignment) can be joined by some transcript within a given
//! distance.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::graph::{EdgeId, EdgeRef, SpliceGraph, SuperEdgeKind};
use crate::transcript_set::TranscriptSet;
use crate::types::{RefBlock, Strand};

/// A path joining the two anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHit {
    /// Exonic distance from the first base of the start anchor to the last
    /// base of the end anchor.
    pub length: u64,
    /// Atomic edges walked, 5' -> 3'.
    pub edges: Vec<EdgeId>,
    /// Transcripts compatible with the whole path.
    pub transcripts: TranscriptSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPathReason {
    StartEdgeNotFound,
    EndEdgeNotFound,
    DisjointPartitions,
    NoPathInRange,
}

impl fmt::Display for NoPathReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoPathReason::StartEdgeNotFound => "START_EDGE_NOT_FOUND",
            NoPathReason::EndEdgeNotFound => "END_EDGE_NOT_FOUND",
            NoPathReason::DisjointPartitions => "DISJOINT_PARTITIONS",
            NoPathReason::NoPathInRange => "NO_PATH_IN_RANGE",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOutcome {
    Found(PathHit),
    /// Every length observed, sorted and de-duplicated (find-all mode).
    Lengths(Vec<u64>),
    NotFound(NoPathReason),
}

#[derive(Debug, Clone)]
pub struct PathReport {
    pub outcome: PathOutcome,
    pub elapsed: Duration,
}

impl PathReport {
    pub fn is_found(&self) -> bool {
        match &self.outcome {
            PathOutcome::Found(_) => true,
            PathOutcome::Lengths(l) => !l.is_empty(),
            PathOutcome::NotFound(_) => false,
        }
    }
}

/// Signed, inclusive anchor coordinates.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    lo: i64,
    hi: i64,
}

struct Cursor {
    edge: EdgeId,
    /// Exonic bases after the start anchor up to the head of `edge`.
    length: u64,
    transcripts: TranscriptSet,
    path: Vec<EdgeId>,
}

pub struct PathWalker<'g, 'a> {
    graph: &'g SpliceGraph<'a>,
}

impl<'g, 'a> PathWalker<'g, 'a> {
    pub fn new(graph: &'g SpliceGraph<'a>) -> Self {
        Self { graph }
    }

    fn anchor(&self, region: RefBlock) -> Anchor {
        let (first, last) = (i64::from(region.first_base()), i64::from(region.last_base()));
        if self.graph.strand() == Strand::Minus {
            Anchor { lo: -last, hi: -first }
        } else {
            Anchor { lo: first, hi: last }
        }
    }

    /// Uncontracted exonic edges fully containing `a`.
    fn containing_edges(&self, a: Anchor) -> Vec<EdgeId> {
        let g = self.graph;
        g.edge_ids()
            .filter(|&e| {
                let edge = g.edge(e);
                let (tail, head) = (g.site(edge.tail), g.site(edge.head));
                edge.is_exonic()
                    && edge.via.is_empty()
                    && !tail.is_sentinel()
                    && !head.is_sentinel()
                    && tail.pos <= a.lo
                    && a.hi <= head.pos
            })
            .collect()
    }

    /// Search a path from `start` to `end` (genomic regions, any order)
    /// whose exonic length lies in `[len_min, len_max]`.
    ///
    /// Returns the first hit, or with `find_all` every length in range.
    pub fn query(
        &self,
        start: RefBlock,
        end: RefBlock,
        len_min: u64,
        len_max: u64,
        find_all: bool,
    ) -> PathReport {
        let timer = Instant::now();
        let outcome = self.search(start, end, len_min, len_max, find_all);
        let elapsed = timer.elapsed();
        debug!(?outcome, ?elapsed, "path query");
        PathReport { outcome, elapsed }
    }

    fn search(
        &self,
        start: RefBlock,
        end: RefBlock,
        len_min: u64,
        len_max: u64,
        find_all: bool,
    ) -> PathOutcome {
        let g = self.graph;
        let (mut a, mut b) = (self.anchor(start), self.anchor(end));
        if b.lo < a.lo {
            std::mem::swap(&mut a, &mut b);
        }

        let starts = self.containing_edges(a);
        if starts.is_empty() {
            return PathOutcome::NotFound(NoPathReason::StartEdgeNotFound);
        }
        let ends = self.containing_edges(b);
        if ends.is_empty() {
            return PathOutcome::NotFound(NoPathReason::EndEdgeNotFound);
        }

        let mut end_support = g.empty_set();
        for &e in &ends {
            end_support.union_with(&g.edge(e).transcripts);
        }
        let in_range = |len: u64| len_min <= len && len <= len_max;

        let mut lengths: Vec<u64> = Vec::new();
        let mut stack: Vec<Cursor> = Vec::new();
        let mut compatible = false;
        for &s in starts.iter().rev() {
            let edge = g.edge(s);
            let transcripts = edge.transcripts.intersect(&end_support);
            if transcripts.is_empty() {
                continue;
            }
            compatible = true;
            if ends.contains(&s) && b.hi <= g.site(edge.head).pos {
                let len = (b.hi - a.lo).max(0) as u64;
                if in_range(len) {
                    if !find_all {
                        return PathOutcome::Found(PathHit {
                            length: len,
                            edges: vec![s],
                            transcripts,
                        });
                    }
                    lengths.push(len);
                }
                continue;
            }
            stack.push(Cursor {
                edge: s,
                length: (g.site(edge.head).pos - a.lo) as u64,
                transcripts,
                path: vec![s],
            });
        }
        if !compatible {
            return PathOutcome::NotFound(NoPathReason::DisjointPartitions);
        }

        while let Some(cur) = stack.pop() {
            if cur.length > len_max {
                continue;
            }
            for (next, via, support) in self.next_steps(cur.edge).into_iter().rev() {
                let transcripts = cur.transcripts.intersect(&support);
                if transcripts.is_empty() {
                    continue;
                }
                let edge = g.edge(next);
                let mut path = cur.path.clone();
                path.extend(via);
                path.push(next);

                if ends.contains(&next) {
                    let tail = g.site(edge.tail).pos;
                    let len = cur.length + (b.hi - tail + 1) as u64;
                    if in_range(len) {
                        if !find_all {
                            return PathOutcome::Found(PathHit {
                                length: len,
                                edges: path,
                                transcripts,
                            });
                        }
                        lengths.push(len);
                    }
                    continue;
                }
                if g.site(edge.head).is_sentinel() {
                    continue;
                }
                let gained = if edge.is_exonic() { edge.exonic_length } else { 0 };
                stack.push(Cursor {
                    edge: next,
                    length: cur.length + gained,
                    transcripts,
                    path,
                });
            }
        }

        if find_all && !lengths.is_empty() {
            lengths.sort_unstable();
            lengths.dedup();
            return PathOutcome::Lengths(lengths);
        }
        PathOutcome::NotFound(NoPathReason::NoPathInRange)
    }

    /// Continuations of `edge`: the shortest COMPOSED super-edge per distinct
    /// next edge when junction edges exist, else the atomic out-edges.
    /// Each step is `(next edge, edges skipped over, support)`.
    fn next_steps(&self, edge: EdgeId) -> Vec<(EdgeId, Vec<EdgeId>, TranscriptSet)> {
        let g = self.graph;
        let mut best: Vec<(EdgeId, usize, Vec<EdgeId>, TranscriptSet)> = Vec::new();
        for &sid in g.edge(edge).super_edges() {
            let sup = g.super_edge(sid);
            if sup.kind != SuperEdgeKind::Composed || sup.members.first() != Some(&EdgeRef::Simple(edge)) {
                continue;
            }
            let flat = g.flatten_members(EdgeRef::Super(sid));
            let Some((&last, inner)) = flat[1..].split_last() else {
                continue;
            };
            // Junction members are adjacent exons; the intron between them
            // is part of the walked path.
            let mut skipped = Vec::new();
            let mut prev = edge;
            for &m in inner.iter().chain(std::iter::once(&last)) {
                if let Some(intron) = g.find_edge(g.edge(prev).head, g.edge(m).tail, false) {
                    skipped.push(intron);
                }
                if m != last {
                    skipped.push(m);
                }
                prev = m;
            }
            match best.iter_mut().find(|(n, ..)| *n == last) {
                Some(slot) if slot.1 > flat.len() => {
                    *slot = (last, flat.len(), skipped, sup.transcripts.clone());
                }
                Some(_) => {}
                None => best.push((last, flat.len(), skipped, sup.transcripts.clone())),
            }
        }
        if !best.is_empty() {
            return best.into_iter().map(|(n, _, s, t)| (n, s, t)).collect();
        }

        let head = g.edge(edge).head;
        g.node(head)
            .out_edges()
            .iter()
            .map(|&e| (e, Vec::new(), g.edge(e).transcripts.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphConfig;
    use crate::model::transcript::Transcript;

    fn tx(id: &str, exons: &[(u32, u32)]) -> Transcript {
        let blocks: Vec<RefBlock> = exons
            .iter()
            .map(|&(a, b)| RefBlock::from_one_based(a, b))
            .collect();
        Transcript::from_exons(id, Strand::Plus, 0, &blocks)
    }

    fn region(first: u32, last: u32) -> RefBlock {
        RefBlock::from_one_based(first, last)
    }

    #[test]
    fn anchors_on_one_exon_give_a_trivial_path() {
        let a = tx("A", &[(100, 300)]);
        let g = SpliceGraph::build(&[&a], GraphConfig::default(), None).unwrap();
        let walker = PathWalker::new(&g);
        let report = walker.query(region(120, 130), region(190, 200), 50, 150, false);
        match report.outcome {
            PathOutcome::Found(hit) => {
                assert_eq!(hit.length, 80);
                assert_eq!(hit.edges.len(), 1);
            }
            other => panic!("expected a path, got {other:?}"),
        }
        // Same anchors, range excludes 80.
        let report = walker.query(region(120, 130), region(190, 200), 100, 150, false);
        assert_eq!(report.outcome, PathOutcome::NotFound(NoPathReason::NoPathInRange));
    }

    #[test]
    fn anchors_in_disjoint_partitions_have_no_path() {
        let a = tx("A", &[(100, 300)]);
        let b = tx("B", &[(500, 700)]);
        let g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let report = PathWalker::new(&g).query(region(120, 130), region(550, 560), 0, 1_000, false);
        assert_eq!(report.outcome, PathOutcome::NotFound(NoPathReason::DisjointPartitions));
        assert!(!report.is_found());
    }

    #[test]
    fn missing_anchor_edges_are_reported() {
        let a = tx("A", &[(100, 200), (300, 400)]);
        let g = SpliceGraph::build(&[&a], GraphConfig::default(), None).unwrap();
        let walker = PathWalker::new(&g);
        assert_eq!(
            walker.query(region(250, 260), region(350, 360), 0, 500, false).outcome,
            PathOutcome::NotFound(NoPathReason::StartEdgeNotFound)
        );
        assert_eq!(
            walker.query(region(150, 160), region(390, 410), 0, 500, false).outcome,
            PathOutcome::NotFound(NoPathReason::EndEdgeNotFound)
        );
    }

    #[test]
    fn spliced_paths_with_and_without_junction_edges() {
        let a = tx("A", &[(100, 200), (300, 400)]);
        let b = tx("B", &[(100, 200), (250, 280), (300, 400)]);
        let mut g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();

        let all = |g: &SpliceGraph<'_>| {
            PathWalker::new(g)
                .query(region(150, 150), region(350, 350), 0, 200, true)
                .outcome
        };
        // A: 50 + 51; B adds the 31 bases of its middle exon.
        assert_eq!(all(&g), PathOutcome::Lengths(vec![101, 132]));

        let first = PathWalker::new(&g).query(region(150, 150), region(350, 350), 120, 200, false);
        match first.outcome {
            PathOutcome::Found(hit) => {
                assert_eq!(hit.length, 132);
                assert_eq!(g.transcript_ids(&hit.transcripts), vec!["B"]);
                assert_eq!(hit.edges.len(), 5);
            }
            other => panic!("expected a path, got {other:?}"),
        }

        g.build_junction_edges();
        assert_eq!(all(&g), PathOutcome::Lengths(vec![101, 132]));
        match PathWalker::new(&g)
            .query(region(150, 150), region(350, 350), 0, 110, false)
            .outcome
        {
            PathOutcome::Found(hit) => {
                assert_eq!(hit.length, 101);
                // exon, intron, exon
                assert_eq!(hit.edges.len(), 3);
            }
            other => panic!("expected a path, got {other:?}"),
        }
    }
}
