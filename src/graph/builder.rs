use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Result, SpliceGraphError};
use crate::graph::{GraphConfig, NodeId, SpliceGraph};
use crate::model::site::SpliceSite;
use crate::model::transcript::Transcript;
use crate::model::types::SourceType;
use crate::sequence::{is_canonical_motif, splice_motif, GenomeSequence};
use crate::transcript_set::TranscriptSet;

/// Soft transcript ends sharing the same adjacent hard node.
struct SoftGroup {
    /// Most extended boundary seen so far.
    site: SpliceSite,
    transcripts: TranscriptSet,
    source: SourceType,
    members: Vec<usize>,
}

impl SoftGroup {
    fn new(site: SpliceSite, transcripts: TranscriptSet, source: SourceType, member: usize) -> Self {
        Self {
            site,
            transcripts,
            source,
            members: vec![member],
        }
    }

    fn absorb(&mut self, site: SpliceSite, member: usize, source: SourceType, more_extended: bool) {
        if more_extended {
            self.site = site;
        }
        self.transcripts.insert(member);
        self.source = self.source.min(source);
        self.members.push(member);
    }
}

impl<'a> SpliceGraph<'a> {
    /// Build the graph of one locus.
    ///
    /// The transcripts are sorted by stable id; their input order does not
    /// matter. With a genome, donor/acceptor sites are flagged canonical from
    /// their motif, otherwise every site counts as canonical.
    pub fn build(
        transcripts: &[&'a Transcript],
        config: GraphConfig,
        genome: Option<&dyn GenomeSequence>,
    ) -> Result<Self> {
        let Some(first) = transcripts.first() else {
            return Err(SpliceGraphError::EmptyLocus);
        };
        let (chr_id, strand) = (first.chr_id, first.strand);
        for tx in transcripts {
            if tx.exons().is_empty() {
                return Err(SpliceGraphError::NoExons(tx.stable_id.clone()));
            }
            if tx.strand != strand {
                return Err(SpliceGraphError::MixedStrand {
                    id: tx.stable_id.clone(),
                    expected: strand.symbol(),
                    found: tx.strand.symbol(),
                });
            }
            if tx.chr_id != chr_id {
                return Err(SpliceGraphError::MixedChromosome {
                    id: tx.stable_id.clone(),
                    expected: chr_id,
                    found: tx.chr_id,
                });
            }
        }

        let mut sorted: Vec<&'a Transcript> = transcripts.to_vec();
        sorted.sort_by(|a, b| a.stable_id.cmp(&b.stable_id));
        if let Some(w) = sorted.windows(2).find(|w| w[0].stable_id == w[1].stable_id) {
            return Err(SpliceGraphError::DuplicateTranscript(w[0].stable_id.clone()));
        }

        let mut graph = SpliceGraph::with_transcripts(sorted, config, chr_id, strand);
        graph.add_transcripts(genome);

        debug!(
            transcripts = graph.transcript_count(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            soft_sites = graph.soft_sites.len(),
            "built splice graph"
        );
        Ok(graph)
    }

    fn site_chain(&self, tx: &Transcript, genome: Option<&dyn GenomeSequence>) -> Vec<SpliceSite> {
        let mut sites = tx.splice_sites();
        if let Some(genome) = genome {
            for site in sites.iter_mut().filter(|s| s.kind.is_splice()) {
                // Sites whose motif cannot be read keep the benefit of the doubt.
                if let Some(motif) = splice_motif(genome, tx.chr_id, tx.strand, site) {
                    site.canonical = is_canonical_motif(site.kind, motif);
                }
            }
        }
        sites
    }

    fn add_transcripts(&mut self, genome: Option<&dyn GenomeSequence>) {
        let n = self.transcript_count();
        let edge_confidence = self.config.edge_confidence;
        let (root, leaf) = (self.root, self.leaf);

        let mut soft_starts: BTreeMap<NodeId, SoftGroup> = BTreeMap::new();
        let mut soft_ends: BTreeMap<NodeId, SoftGroup> = BTreeMap::new();

        // Intermediate chains first; soft ends are resolved once every
        // transcript has been seen.
        'tx: for t in 0..n {
            let tx = self.transcripts[t];
            let sites = self.site_chain(tx, genome);
            if self.config.canonical_sites_only
                && sites.iter().any(|s| s.kind.is_splice() && !s.canonical)
            {
                debug!(transcript = %tx.stable_id, "skipping transcript with non-canonical splice site");
                continue;
            }

            let set = TranscriptSet::encode(n, t);
            let source = tx.source;
            let last = sites.len() - 1;
            let (tss, tes) = (sites[0], sites[last]);

            if last == 1 {
                // Single exon: nothing to anchor a soft end on.
                let (Some(s), Some(e)) = (self.create_node(tss), self.create_node(tes)) else {
                    continue;
                };
                self.create_edge(root, s, &set, source);
                self.create_edge(s, e, &set, source);
                self.create_edge(e, leaf, &set, source);
                continue;
            }

            let mut inner = Vec::with_capacity(last - 1);
            for site in &sites[1..last] {
                let Some(id) = self.create_node(*site) else {
                    continue 'tx;
                };
                inner.push(id);
            }
            for w in inner.windows(2) {
                self.create_edge(w[0], w[1], &set, source);
            }

            let soft = edge_confidence.is_some_and(|th| source > th) && inner.len() >= 2;
            let (first_hard, last_hard) = (inner[0], inner[inner.len() - 1]);

            if soft {
                match soft_starts.get_mut(&first_hard) {
                    Some(group) => {
                        let more = tss.pos < group.site.pos;
                        group.absorb(tss, t, source, more);
                    }
                    None => {
                        soft_starts.insert(first_hard, SoftGroup::new(tss, set.clone(), source, t));
                    }
                }
                match soft_ends.get_mut(&last_hard) {
                    Some(group) => {
                        let more = tes.pos > group.site.pos;
                        group.absorb(tes, t, source, more);
                    }
                    None => {
                        soft_ends.insert(last_hard, SoftGroup::new(tes, set, source, t));
                    }
                }
            } else {
                let (Some(s), Some(e)) = (self.create_node(tss), self.create_node(tes)) else {
                    continue;
                };
                self.create_edge(root, s, &set, source);
                self.create_edge(s, first_hard, &set, source);
                self.create_edge(last_hard, e, &set, source);
                self.create_edge(e, leaf, &set, source);
            }
        }

        for (hard, group) in soft_starts {
            let Some(ext) = self.create_node(group.site) else {
                continue;
            };
            self.create_edge(root, ext, &group.transcripts, group.source);
            self.create_edge(ext, hard, &group.transcripts, group.source);
            self.record_extensions(&group, true);
        }
        for (hard, group) in soft_ends {
            let Some(ext) = self.create_node(group.site) else {
                continue;
            };
            self.create_edge(hard, ext, &group.transcripts, group.source);
            self.create_edge(ext, leaf, &group.transcripts, group.source);
            self.record_extensions(&group, false);
        }
    }

    /// Remember which members were moved onto the group's boundary.
    fn record_extensions(&mut self, group: &SoftGroup, five_prime: bool) {
        let Some(genomic) = group.site.genomic() else {
            return;
        };
        for &t in &group.members {
            let tx = self.transcripts[t];
            let sites = tx.splice_sites();
            let own = if five_prime { sites.first() } else { sites.last() };
            if own.is_some_and(|s| s.pos == group.site.pos) {
                continue;
            }
            self.mark_extended(group.site, t, genomic, five_prime);
        }
    }

    pub(crate) fn mark_extended(&mut self, site: SpliceSite, t: usize, genomic: u32, five_prime: bool) {
        let n = self.transcript_count();
        let id = self.transcripts[t].stable_id.as_str();
        if five_prime {
            self.extensions.extend_start(id, genomic);
        } else {
            self.extensions.extend_end(id, genomic);
        }
        self.soft_sites
            .entry(site.key())
            .or_insert_with(|| TranscriptSet::empty(n))
            .insert(t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::site::SiteKind;
    use crate::types::{RefBlock, Strand};

    fn tx(id: &str, source: SourceType, exons: &[(u32, u32)]) -> Transcript {
        let blocks: Vec<RefBlock> = exons
            .iter()
            .map(|&(a, b)| RefBlock::from_one_based(a, b))
            .collect();
        Transcript::from_exons(id, Strand::Plus, source, &blocks)
    }

    /// Sorted (site, transcript ids) of every edge, for isomorphism checks.
    fn edge_signature(g: &SpliceGraph<'_>) -> Vec<(String, String, Vec<String>)> {
        let mut out: Vec<_> = g
            .edge_ids()
            .map(|e| {
                let edge = g.edge(e);
                (
                    g.site(edge.tail).to_string(),
                    g.site(edge.head).to_string(),
                    g.transcript_ids(&edge.transcripts)
                        .into_iter()
                        .map(String::from)
                        .collect(),
                )
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn rejects_bad_loci() {
        assert!(matches!(
            SpliceGraph::build(&[], GraphConfig::default(), None),
            Err(SpliceGraphError::EmptyLocus)
        ));

        let a = tx("A", 0, &[(100, 200)]);
        let dup = tx("A", 0, &[(300, 400)]);
        assert!(matches!(
            SpliceGraph::build(&[&a, &dup], GraphConfig::default(), None),
            Err(SpliceGraphError::DuplicateTranscript(id)) if id == "A"
        ));

        let mut minus = tx("M", 0, &[(100, 200)]);
        minus.strand = Strand::Minus;
        assert!(matches!(
            SpliceGraph::build(&[&a, &minus], GraphConfig::default(), None),
            Err(SpliceGraphError::MixedStrand { .. })
        ));

        let mut other_chr = tx("C", 0, &[(100, 200)]);
        other_chr.chr_id = 3;
        assert!(matches!(
            SpliceGraph::build(&[&a, &other_chr], GraphConfig::default(), None),
            Err(SpliceGraphError::MixedChromosome { found: 3, .. })
        ));

        let empty = Transcript::new(0, 0, "E", 0, Strand::Plus);
        assert!(matches!(
            SpliceGraph::build(&[&empty], GraphConfig::default(), None),
            Err(SpliceGraphError::NoExons(_))
        ));
    }

    #[test]
    fn single_exon_transcript_is_wired_to_both_sentinels() {
        let a = tx("A", 0, &[(100, 200)]);
        let g = SpliceGraph::build(&[&a], GraphConfig::default(), None).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.node(g.root()).out_degree(), 1);
        assert_eq!(g.node(g.leaf()).in_degree(), 1);
        assert_eq!(g.node(g.root()).transcripts.popcount(), 1);
    }

    #[test]
    fn build_is_independent_of_input_order() {
        let a = tx("A", 0, &[(100, 200), (300, 400), (500, 600)]);
        let b = tx("B", 0, &[(100, 200), (500, 600)]);
        let c = tx("C", 0, &[(100, 250), (500, 600)]);
        let g1 = SpliceGraph::build(&[&a, &b, &c], GraphConfig::default(), None).unwrap();
        let g2 = SpliceGraph::build(&[&c, &a, &b], GraphConfig::default(), None).unwrap();
        assert_eq!(edge_signature(&g1), edge_signature(&g2));
        assert_eq!(g1.node_count(), g2.node_count());
    }

    #[test]
    fn soft_starts_extend_to_the_most_upstream_boundary() {
        let cfg = GraphConfig {
            edge_confidence: Some(0),
            ..GraphConfig::default()
        };
        // Two EST-like transcripts sharing their first donor and last acceptor.
        let a = tx("A", 2, &[(120, 200), (300, 380)]);
        let b = tx("B", 2, &[(90, 200), (300, 420)]);
        let g = SpliceGraph::build(&[&a, &b], cfg, None).unwrap();

        // Only the most extended boundaries become nodes.
        let starts: Vec<i64> = g
            .node(g.root())
            .out_edges()
            .iter()
            .map(|&e| g.site(g.edge(e).head).pos)
            .collect();
        assert_eq!(starts, vec![90]);
        let ends: Vec<i64> = g
            .node(g.leaf())
            .in_edges()
            .iter()
            .map(|&e| g.site(g.edge(e).tail).pos)
            .collect();
        assert_eq!(ends, vec![420]);
        assert!(g.find_node(SpliceSite::new(120, SiteKind::Tss, 0).key()).is_none());

        // The side table moves A, never B, and the input is untouched.
        assert_eq!(g.extensions().start_of("A"), Some(90));
        assert_eq!(g.extensions().end_of("A"), Some(420));
        assert_eq!(g.extensions().start_of("B"), None);
        assert_eq!(a.exons()[0], RefBlock::from_one_based(120, 200));
        assert_eq!(
            g.extensions().extended_exons(&a),
            vec![RefBlock::from_one_based(90, 200), RefBlock::from_one_based(300, 420)]
        );

        let tss = SpliceSite::new(90, SiteKind::Tss, 0);
        assert!(g.is_soft_site(&tss, 0));
        assert!(!g.is_soft_site(&tss, 1));
    }

    #[test]
    fn confident_ends_stay_hard() {
        let cfg = GraphConfig {
            edge_confidence: Some(1),
            ..GraphConfig::default()
        };
        let a = tx("A", 0, &[(120, 200), (300, 380)]);
        let b = tx("B", 2, &[(90, 200), (300, 420)]);
        let g = SpliceGraph::build(&[&a, &b], cfg, None).unwrap();
        assert_eq!(g.node(g.root()).out_degree(), 2);
        assert!(g.extensions().is_empty());
    }
}
