use std::fmt;

use crate::graph::{EdgeId, EdgeRef, SpliceGraph, SuperEdgeId, SuperEdgeKind};
use crate::model::site::SpliceSite;
use crate::sequence::{reverse_complement, GenomeSequence};
use crate::transcript_set::TranscriptSet;
use crate::types::Strand;

/// Exonic or intronic stretch used by every transcript spanning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstitutiveRegion {
    /// 1-based inclusive genomic coordinates, `start <= end`.
    pub start: u32,
    pub end: u32,
    pub exonic: bool,
    pub transcript_ids: Vec<String>,
}

impl fmt::Display for ConstitutiveRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}\t{}\t{}",
            self.start,
            self.end,
            if self.exonic { "exon" } else { "intron" },
            self.transcript_ids.join(",")
        )
    }
}

/// Donor/acceptor pair of a COMPOSED junction super-edge.
#[derive(Debug, Clone)]
pub struct Junction {
    pub id: SuperEdgeId,
    pub donor: SpliceSite,
    pub acceptor: SpliceSite,
    pub transcripts: TranscriptSet,
}

impl<'a> SpliceGraph<'a> {
    /// Valid edges whose transcript set equals the set of transcripts whose
    /// (extended) span covers them. Sorted by genomic start.
    pub fn constitutive_regions(&self) -> Vec<ConstitutiveRegion> {
        let spans: Vec<Option<(i64, i64)>> = self
            .transcripts
            .iter()
            .map(|tx| self.extensions.signed_span(tx))
            .collect();

        let mut out = Vec::new();
        for id in self.edge_ids() {
            let edge = self.edge(id);
            let (tail, head) = (self.site(edge.tail), self.site(edge.head));
            if !edge.valid || tail.is_sentinel() || head.is_sentinel() {
                continue;
            }

            let mut spanning = self.empty_set();
            for (t, span) in spans.iter().enumerate() {
                if span.is_some_and(|(lo, hi)| lo <= tail.pos && head.pos <= hi) {
                    spanning.insert(t);
                }
            }
            if spanning.is_empty() || spanning != edge.transcripts {
                continue;
            }

            // Intronic stretches lie strictly between their flanks.
            let (lo, hi) = if edge.exonic {
                (tail.pos, head.pos)
            } else {
                (tail.pos + 1, head.pos - 1)
            };
            if lo > hi {
                continue;
            }
            let (a, b) = (lo.unsigned_abs() as u32, hi.unsigned_abs() as u32);
            out.push(ConstitutiveRegion {
                start: a.min(b),
                end: a.max(b),
                exonic: edge.exonic,
                transcript_ids: self
                    .transcript_ids(&edge.transcripts)
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }
        out.sort_by_key(|r| (r.start, r.end));
        out
    }

    /// Every live two-exon COMPOSED super-edge as a donor/acceptor pair.
    pub fn junctions(&self) -> Vec<Junction> {
        let mut out: Vec<Junction> = self
            .super_edge_ids()
            .filter_map(|id| {
                let sup = self.super_edge(id);
                if sup.kind != SuperEdgeKind::Composed {
                    return None;
                }
                let (&first, &last) = (sup.members.first()?, sup.members.last()?);
                let donor = *self.site(self.member_head(first));
                let acceptor = *self.site(self.member_tail(last));
                Some(Junction {
                    id,
                    donor,
                    acceptor,
                    transcripts: sup.transcripts.clone(),
                })
            })
            .collect();
        out.sort_by_key(|j| (j.donor.key(), j.acceptor.key()));
        out
    }

    /// Sequence over a signed, inclusive range, read 5' -> 3'.
    pub(crate) fn signed_sequence(
        &self,
        genome: &dyn GenomeSequence,
        lo: i64,
        hi: i64,
    ) -> Option<Vec<u8>> {
        if lo > hi {
            return None;
        }
        let (a, b) = (lo.unsigned_abs(), hi.unsigned_abs());
        let (first, last) = (a.min(b), a.max(b));
        let start0 = u32::try_from(first.checked_sub(1)?).ok()?;
        let end0 = u32::try_from(last).ok()?;
        let raw = genome.fetch(self.chr_id, start0, end0)?;
        Some(if self.strand == Strand::Minus {
            reverse_complement(&raw)
        } else {
            raw
        })
    }

    /// Up to `flank` exonic bases on each side of a junction, joined.
    ///
    /// The flanks are clipped to the member exons. `None` if `id` is not a
    /// COMPOSED super-edge or the sequence is unavailable.
    pub fn junction_sequence(
        &self,
        genome: &dyn GenomeSequence,
        id: SuperEdgeId,
        flank: u32,
    ) -> Option<Vec<u8>> {
        let sup = self.try_super_edge(id)?;
        if sup.kind != SuperEdgeKind::Composed || flank == 0 {
            return None;
        }
        let (first, last) = (*sup.members.first()?, *sup.members.last()?);
        let exon_start = self.site(self.member_tail(first)).pos;
        let donor = self.site(self.member_head(first)).pos;
        let acceptor = self.site(self.member_tail(last)).pos;
        let exon_end = self.site(self.member_head(last)).pos;
        let f = i64::from(flank);

        let mut seq = self.signed_sequence(genome, (donor - f + 1).max(exon_start), donor)?;
        seq.extend(self.signed_sequence(genome, acceptor, (acceptor + f - 1).min(exon_end))?);
        Some(seq)
    }

    /// Members of a super-edge flattened to their atomic edges, in order.
    pub fn flatten_members(&self, member: EdgeRef) -> Vec<EdgeId> {
        let mut out = Vec::new();
        let mut stack = vec![member];
        while let Some(m) = stack.pop() {
            match m {
                EdgeRef::Simple(e) => out.push(e),
                EdgeRef::Super(s) => stack.extend(self.super_edge(s).members.iter().rev()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{GraphConfig, SpliceGraph};
    use crate::model::transcript::Transcript;
    use crate::sequence::InMemoryGenome;
    use crate::types::{RefBlock, Strand};

    fn tx(id: &str, strand: Strand, exons: &[(u32, u32)]) -> Transcript {
        let blocks: Vec<RefBlock> = exons
            .iter()
            .map(|&(a, b)| RefBlock::from_one_based(a, b))
            .collect();
        Transcript::from_exons(id, strand, 0, &blocks)
    }

    #[test]
    fn shared_intron_is_constitutive_where_all_spanning_transcripts_splice() {
        let a = tx("A", Strand::Plus, &[(100, 200), (300, 400)]);
        let b = tx("B", Strand::Plus, &[(150, 200), (300, 350)]);
        let g = SpliceGraph::build(&[&a, &b], GraphConfig::default(), None).unwrap();
        let regions = g.constitutive_regions();
        let intron = regions.iter().find(|r| !r.exonic).unwrap();
        assert_eq!((intron.start, intron.end), (201, 299));
        assert_eq!(intron.transcript_ids, vec!["A", "B"]);
        assert_eq!(intron.to_string(), "201-299\tintron\tA,B");
    }

    #[test]
    fn junction_sequence_joins_clipped_flanks() {
        // exon 1..4, intron 5..8, exon 9..12
        let mut genome = InMemoryGenome::new();
        genome.insert(0, b"ACGTTTTTGGCA");
        let plus = tx("P", Strand::Plus, &[(1, 4), (9, 12)]);
        let mut g = SpliceGraph::build(&[&plus], GraphConfig::default(), None).unwrap();
        let ids = g.build_junction_edges();
        assert_eq!(ids.len(), 1);
        assert_eq!(g.junction_sequence(&genome, ids[0], 2).unwrap(), b"GTGG");
        assert_eq!(g.junction_sequence(&genome, ids[0], 10).unwrap(), b"ACGTGGCA");
        let j = &g.junctions()[0];
        assert_eq!((j.donor.pos, j.acceptor.pos), (4, 9));

        let minus = tx("M", Strand::Minus, &[(1, 4), (9, 12)]);
        let mut g = SpliceGraph::build(&[&minus], GraphConfig::default(), None).unwrap();
        let ids = g.build_junction_edges();
        // On the minus strand the donor flank is 10..9 (CC) and the acceptor flank 4..3 (AC).
        assert_eq!(g.junction_sequence(&genome, ids[0], 2).unwrap(), b"CCAC");
    }
}
