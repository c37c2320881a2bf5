//! Event discovery over a splicing graph.
//!
//! Every node with at least two valid in-edges is a target. Its in-edges
//! seed one partition each; walking upstream over branching nodes, the
//! partitions are split along the out-edges they take, and every time they
//! leave a source node on `n` different edges an `n`-dimensional event is
//! reported unless an event downstream already covers the combination.

use std::convert::Infallible;

use tracing::debug;

use crate::error::Result;
use crate::events::cds::CdsProjector;
use crate::events::event::{EventVariant, SplicingEvent};
use crate::events::partition::{PartitionArena, PartitionId, SetId};
use crate::graph::{EdgeId, NodeId, SpliceGraph};
use crate::model::site::SpliceSite;
use crate::sequence::GenomeSequence;
use crate::transcript_set::TranscriptSet;

pub struct EventEngine<'g, 'a> {
    graph: &'g SpliceGraph<'a>,
    arity: usize,
    cds: Option<CdsProjector<'g>>,
}

/// Counters of one full walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub targets: usize,
    pub emitted: usize,
    pub subsumed: usize,
    pub skipped_external: usize,
    /// Upstream nodes looked at across all targets.
    pub visited: usize,
}

impl<'g, 'a> EventEngine<'g, 'a> {
    pub fn new(graph: &'g SpliceGraph<'a>) -> Result<Self> {
        let config = graph.config();
        config.validate()?;
        Ok(Self {
            graph,
            arity: config.event_arity,
            cds: config.predict_cds.then(|| CdsProjector::new(None)),
        })
    }

    /// Sequence used to predict frames of transcripts without a CDS.
    /// Has no effect unless frame prediction is enabled.
    pub fn with_genome(mut self, genome: &'g dyn GenomeSequence) -> Self {
        if self.cds.is_some() {
            self.cds = Some(CdsProjector::new(Some(genome)));
        }
        self
    }

    /// All events of the graph, in discovery order.
    pub fn events(&self) -> Vec<SplicingEvent> {
        let mut out = Vec::new();
        let collected = self.walk(|ev| {
            out.push(ev);
            Ok::<(), Infallible>(())
        });
        match collected {
            Ok(_) => out,
            Err(never) => match never {},
        }
    }

    /// Hand every event to `emit` as soon as it is found. Stops at the first
    /// error returned by `emit`.
    pub fn for_each_event<F>(&self, emit: F) -> Result<WalkStats>
    where
        F: FnMut(SplicingEvent) -> Result<()>,
    {
        self.walk(emit)
    }

    fn walk<E, F>(&self, mut emit: F) -> std::result::Result<WalkStats, E>
    where
        F: FnMut(SplicingEvent) -> std::result::Result<(), E>,
    {
        let g = self.graph;
        let order = g.nodes_in_order();
        let mut stats = WalkStats::default();

        for (idx, &target) in order.iter().enumerate() {
            let valid_in: Vec<EdgeId> = g
                .node(target)
                .in_edges()
                .iter()
                .copied()
                .filter(|&e| g.edge(e).valid)
                .collect();
            if valid_in.len() < 2 {
                continue;
            }
            stats.targets += 1;
            self.walk_target(target, &valid_in, &order[..idx], &mut stats, &mut emit)?;
        }

        debug!(
            targets = stats.targets,
            emitted = stats.emitted,
            subsumed = stats.subsumed,
            skipped_external = stats.skipped_external,
            visited = stats.visited,
            "event walk finished"
        );
        Ok(stats)
    }

    fn walk_target<E, F>(
        &self,
        target: NodeId,
        valid_in: &[EdgeId],
        upstream: &[NodeId],
        stats: &mut WalkStats,
        emit: &mut F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(SplicingEvent) -> std::result::Result<(), E>,
    {
        let g = self.graph;
        let target_set = &g.node(target).transcripts;

        let mut arena = PartitionArena::new();
        let mut live: Vec<PartitionId> = valid_in
            .iter()
            .map(|&e| arena.new_partition(g.edge(e).transcripts.clone()))
            .collect();

        for &source in upstream.iter().rev() {
            let node = g.node(source);
            if !node.transcripts.intersects(target_set) {
                continue;
            }
            stats.visited += 1;
            // Every target transcript passes here: nothing further upstream
            // can separate them again.
            let converged = node.transcripts.intersect(target_set) == *target_set;
            if node.out_degree() < 2 {
                if converged {
                    break;
                }
                continue;
            }

            // Transcripts leaving through an invalid edge take no part.
            for &e in node.out_edges() {
                let edge = g.edge(e);
                if edge.valid {
                    continue;
                }
                for &p in &live {
                    if arena.is_live(p) {
                        arena.subtract(p, &edge.transcripts);
                    }
                }
            }
            live.retain(|&p| arena.is_live(p));
            if live.len() < 2 {
                break;
            }

            let branches = split_partitions(g, &mut arena, &mut live, node.out_edges());
            if branches.len() >= self.arity {
                let external = source == g.root() || target == g.leaf();
                let tuples = valid_tuples(&arena, &branches, self.arity);
                stats.subsumed += count_tuples(&branches, self.arity) - tuples.len();
                for chosen in tuples {
                    if external && g.config().internal_events_only {
                        stats.skipped_external += 1;
                        continue;
                    }
                    emit(self.make_event(source, target, &arena, &chosen))?;
                    stats.emitted += 1;
                }
            }

            if branches.len() > 1 {
                let members: Vec<PartitionId> = branches.iter().flatten().copied().collect();
                let set = arena.new_set(&members);
                arena.retire_subsumed(set);
            }

            if converged {
                break;
            }
        }
        Ok(())
    }

    fn make_event(
        &self,
        source: NodeId,
        target: NodeId,
        arena: &PartitionArena,
        chosen: &[PartitionId],
    ) -> SplicingEvent {
        let g = self.graph;
        let variants = chosen
            .iter()
            .map(|&p| {
                let set = &arena.partition(p).transcripts;
                EventVariant {
                    transcript_ids: g.transcript_ids(set).into_iter().map(String::from).collect(),
                    sites: self.variant_sites(source, target, set),
                    frames: Vec::new(),
                }
            })
            .collect();

        let mut event = SplicingEvent {
            chr_id: g.chr_id(),
            strand: g.strand(),
            src: *g.site(source),
            snk: *g.site(target),
            dimension: chosen.len(),
            variants,
            cds_summary: None,
        };
        event.normalize();

        if let Some(cds) = &self.cds {
            let sets: Vec<TranscriptSet> = event
                .variants
                .iter()
                .map(|v| {
                    TranscriptSet::from_indices(
                        g.transcript_count(),
                        v.transcript_ids.iter().filter_map(|id| g.index_of(id)),
                    )
                })
                .collect();
            let annotation = cds.annotate(g, &event.src, &event.snk, &sets);
            for (v, codes) in event.variants.iter_mut().zip(&annotation.variant_codes) {
                v.frames = codes.clone();
            }
            event.cds_summary = Some(annotation.summary());
        }
        event
    }

    /// Sites strictly between `source` and `target` on the path of the
    /// partition's transcripts. Extension sites synthetic for every member
    /// are left out.
    fn variant_sites(&self, source: NodeId, target: NodeId, set: &TranscriptSet) -> Vec<SpliceSite> {
        let g = self.graph;
        let Some(t) = set.first() else {
            return Vec::new();
        };
        let synthetic = |s: &SpliceSite| set.iter().all(|m| g.is_soft_site(s, m));

        let mut sites = Vec::new();
        let mut current = source;
        let stop = g.site(target).key();
        for _ in 0..g.node_count() {
            let Some(e) = g
                .node(current)
                .out_edges()
                .iter()
                .copied()
                .find(|&e| g.edge(e).transcripts.contains(t))
            else {
                break;
            };
            let edge = g.edge(e);
            sites.extend(edge.via.iter().filter(|s| !synthetic(s)).copied());
            if edge.head == target || g.site(edge.head).key() >= stop {
                break;
            }
            let head = *g.site(edge.head);
            if !synthetic(&head) {
                sites.push(head);
            }
            current = edge.head;
        }
        sites
    }
}

/// Distribute the live partitions over the out-edges of a source node.
/// Returns the non-empty branches; clones are appended to `live`.
fn split_partitions(
    g: &SpliceGraph<'_>,
    arena: &mut PartitionArena,
    live: &mut Vec<PartitionId>,
    out_edges: &[EdgeId],
) -> Vec<Vec<PartitionId>> {
    let mut branches: Vec<Vec<PartitionId>> = vec![Vec::new(); out_edges.len()];
    let snapshot = live.clone();
    for p in snapshot {
        for (b, &e) in out_edges.iter().enumerate() {
            let edge = g.edge(e);
            if !edge.valid {
                continue;
            }
            let inter = arena.partition(p).transcripts.intersect(&edge.transcripts);
            if inter.is_empty() {
                continue;
            }
            if inter == arena.partition(p).transcripts {
                branches[b].push(p);
                break;
            }
            let clone = arena.split_off(p, &inter);
            live.push(clone);
            branches[b].push(clone);
        }
    }
    branches.retain(|b| !b.is_empty());
    branches
}

/// Every `k`-subset of `0..n`, in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        let Some(i) = (0..k).rev().find(|&i| idx[i] != i + n - k) else {
            return out;
        };
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// One partition from each of `k` different branches, keeping only the
/// combinations no live partition set covers.
fn valid_tuples(arena: &PartitionArena, branches: &[Vec<PartitionId>], k: usize) -> Vec<Vec<PartitionId>> {
    let mut out = Vec::new();
    for pick in combinations(branches.len(), k) {
        // (depth, chosen so far, sets shared by all of them)
        let mut stack: Vec<(usize, Vec<PartitionId>, Vec<SetId>)> = branches[pick[0]]
            .iter()
            .rev()
            .map(|&p| (1, vec![p], arena.live_parents(p)))
            .collect();
        while let Some((depth, chosen, primers)) = stack.pop() {
            if depth == k {
                if primers.is_empty() {
                    out.push(chosen);
                }
                continue;
            }
            for &p in branches[pick[depth]].iter().rev() {
                let narrowed = if primers.is_empty() {
                    primers.clone()
                } else {
                    arena.check_valid_primers(&primers, p)
                };
                let mut next = chosen.clone();
                next.push(p);
                stack.push((depth + 1, next, narrowed));
            }
        }
    }
    out
}

fn count_tuples(branches: &[Vec<PartitionId>], k: usize) -> usize {
    combinations(branches.len(), k)
        .iter()
        .map(|pick| pick.iter().map(|&b| branches[b].len()).product::<usize>())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpliceGraphError;
    use crate::graph::GraphConfig;
    use crate::model::transcript::Transcript;
    use crate::types::{RefBlock, Strand};

    fn tx(id: &str, exons: &[(u32, u32)]) -> Transcript {
        let blocks: Vec<RefBlock> = exons
            .iter()
            .map(|&(a, b)| RefBlock::from_one_based(a, b))
            .collect();
        Transcript::from_exons(id, Strand::Plus, 0, &blocks)
    }

    fn anchors(ev: &SplicingEvent) -> (String, String) {
        (ev.src.to_string(), ev.snk.to_string())
    }

    #[test]
    fn combinations_are_lexicographic() {
        assert_eq!(
            combinations(4, 2),
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
        assert_eq!(combinations(3, 3), vec![vec![0, 1, 2]]);
        assert!(combinations(2, 3).is_empty());
    }

    #[test]
    fn exon_skip_yields_one_event() {
        let a = tx("A", &[(100, 200), (300, 400), (500, 600)]);
        let b = tx("B", &[(100, 200), (500, 600)]);
        let g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let events = EventEngine::new(&g).unwrap().events();
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(anchors(ev), ("200^".to_string(), "500-".to_string()));
        assert_eq!(ev.structure_code(), "0,1-2^");
        assert!(ev.has_variant(&["A"]) && ev.has_variant(&["B"]));
    }

    #[test]
    fn internal_only_drops_bubbles_at_the_sentinels() {
        // Alternative first exons meet at the shared acceptor only via the root.
        let a = tx("A", &[(100, 200), (500, 600)]);
        let b = tx("B", &[(300, 400), (500, 600)]);
        let g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let all = EventEngine::new(&g).unwrap().events();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].src, SpliceSite::root());

        let cfg = GraphConfig {
            internal_events_only: true,
            ..GraphConfig::default()
        };
        let g = SpliceGraph::build(&[&a, &b], cfg, None).unwrap();
        let engine = EventEngine::new(&g).unwrap();
        let stats = engine.for_each_event(|_| Ok(())).unwrap();
        assert_eq!(stats.emitted, 0);
        assert_eq!(stats.skipped_external, 1);
    }

    #[test]
    fn walk_stops_where_the_target_transcripts_meet() {
        let a = tx("A", &[(100, 200), (300, 400), (500, 600), (700, 800), (900, 1000)]);
        let b = tx("B", &[(100, 200), (300, 400), (500, 600), (900, 1000)]);
        let g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let stats = EventEngine::new(&g).unwrap().for_each_event(|_| Ok(())).unwrap();
        assert_eq!(stats.targets, 1);
        assert_eq!(stats.emitted, 1);
        // 800^, 700- and the shared donor 600^; the common prefix is never entered.
        assert_eq!(stats.visited, 3);
    }

    #[test]
    fn collected_events_match_the_streamed_ones() {
        let a = tx("A", &[(100, 200), (300, 400), (500, 600)]);
        let b = tx("B", &[(100, 250), (500, 600)]);
        let g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let engine = EventEngine::new(&g).unwrap();
        let mut streamed = Vec::new();
        let stats = engine
            .for_each_event(|ev| {
                streamed.push(ev);
                Ok(())
            })
            .unwrap();
        assert_eq!(engine.events(), streamed);
        assert_eq!(stats.emitted, streamed.len());
    }

    #[test]
    fn three_way_events_need_three_branches() {
        let a = tx("A", &[(100, 200), (300, 400)]);
        let b = tx("B", &[(100, 250), (300, 400)]);
        let c = tx("C", &[(100, 280), (300, 400)]);
        let cfg = GraphConfig {
            event_arity: 3,
            ..GraphConfig::default()
        };
        let g = SpliceGraph::build(&[&a, &b, &c], cfg, None).unwrap();
        let events = EventEngine::new(&g).unwrap().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].dimension, 3);
        assert_eq!(events[0].structure_code(), "1^,2^,3^");
    }

    #[test]
    fn arity_below_two_is_rejected() {
        let a = tx("A", &[(100, 200)]);
        let cfg = GraphConfig {
            event_arity: 1,
            ..GraphConfig::default()
        };
        let g = SpliceGraph::build(&[&a], cfg, None).unwrap();
        assert!(matches!(EventEngine::new(&g), Err(SpliceGraphError::InvalidArity(1))));
    }
}
