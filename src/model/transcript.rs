use crate::model::frame::Frame;
use crate::model::site::{SiteKind, SpliceSite};
use crate::model::types::{GeneId, SourceType, TranscriptId};
use crate::sequence::{reverse_complement, GenomeSequence};
use crate::types::{RefBlock, Strand};
use serde::{Serialize, Deserialize};


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: TranscriptId,
    pub gene_id: GeneId,
    /// Stable identifier from the annotation (e.g. the `transcript_id` value).
    /// Graphs order their transcripts by it.
    pub stable_id: String,
    pub names: Vec<String>,
    pub chr_id: usize,
    pub strand: Strand,
    /// Source confidence; lower is more trustworthy.
    pub source: SourceType,
    exons: Vec<RefBlock>,
    /// Genomic span of the translated region, stop codon included.
    cds: Option<RefBlock>,
    finalized: bool,
}

impl Transcript {
    pub fn new(
        id: TranscriptId,
        gene_id: GeneId,
        stable_id: impl Into<String>,
        chr_id: usize,
        strand: Strand,
    ) -> Self {
        let stable_id = stable_id.into();
        Self {
            id,
            gene_id,
            names: vec![stable_id.clone()],
            stable_id,
            chr_id,
            strand,
            source: 0,
            exons: Vec::new(),
            cds: None,
            finalized: false,
        }
    }

    /// Convenience constructor for a finalized model from exon blocks.
    pub fn from_exons(
        stable_id: impl Into<String>,
        strand: Strand,
        source: SourceType,
        exons: &[RefBlock],
    ) -> Self {
        let mut tx = Self::new(0, 0, stable_id, 0, strand);
        tx.source = source;
        for &e in exons {
            tx.add_exon(e);
        }
        tx.finalize();
        tx
    }

    pub fn add_name(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(|s| s.as_str())
    }

    pub fn add_exon(&mut self, block: RefBlock) {
        self.exons.push(block);
        self.finalized = false;
    }

    /// Grow the translated span by a CDS / start / stop codon block.
    pub fn add_cds_block(&mut self, block: RefBlock) {
        self.cds = Some(match self.cds {
            Some(c) => RefBlock::new(c.start.min(block.start), c.end.max(block.end)),
            None => block,
        });
    }

    pub fn set_cds(&mut self, cds: Option<RefBlock>) {
        self.cds = cds;
    }

    pub fn exons(&self) -> &[RefBlock] {
        &self.exons
    }

    pub fn cds(&self) -> Option<RefBlock> {
        self.cds
    }

    pub fn is_coding(&self) -> bool {
        self.cds.is_some()
    }

    pub fn is_spliced(&self) -> bool {
        self.exons.len() > 1
    }

    /// sorts the transcripts exons and returns (total start: u32, total end: u32)
    pub fn finalize(&mut self) -> (u32, u32) {
        if self.exons.is_empty() {
            self.finalized = true;
            return (0, 0);
        }
        self.exons = RefBlock::merge_sorted(std::mem::take(&mut self.exons));
        self.finalized = true;

        let start = self.exons[0].start;
        let end = self.exons[self.exons.len() - 1].end;
        (start, end)
    }

    pub fn span(&self) -> Option<(u32, u32)> {
        let first = self.exons.first()?;
        let last = self.exons.last()?;
        Some((first.start, last.end))
    }

    pub fn exonic_length(&self) -> u64 {
        self.exons.iter().map(|e| u64::from(e.len())).sum()
    }

    /// Exons in transcript direction (5' first).
    pub fn exons_5to3(&self) -> Vec<RefBlock> {
        let mut out = self.exons.clone();
        if self.strand == Strand::Minus {
            out.reverse();
        }
        out
    }

    /// Signed 5' and 3' boundary of a block, in transcript direction.
    fn signed_bounds(&self, block: RefBlock) -> (i64, i64) {
        let sign = self.strand.sign();
        if sign > 0 {
            (i64::from(block.first_base()), i64::from(block.last_base()))
        } else {
            (-i64::from(block.last_base()), -i64::from(block.first_base()))
        }
    }

    /// Ordered site chain: TSS, then acceptor/donor pairs, then TES.
    ///
    /// Every site carries the transcript's source type; canonicity is left at
    /// its default and decided by whoever has access to sequence.
    pub fn splice_sites(&self) -> Vec<SpliceSite> {
        assert!(self.finalized, "Transcript::splice_sites called before finalize()");

        let exons = self.exons_5to3();
        let n = exons.len();
        let mut out = Vec::with_capacity(2 * n);
        for (k, &exon) in exons.iter().enumerate() {
            let (five, three) = self.signed_bounds(exon);
            let left = if k == 0 { SiteKind::Tss } else { SiteKind::Acceptor };
            let right = if k + 1 == n { SiteKind::Tes } else { SiteKind::Donor };
            out.push(SpliceSite::new(five, left, self.source));
            out.push(SpliceSite::new(three, right, self.source));
        }
        out
    }

    /// Number of exonic bases upstream of a signed position, `None` if the
    /// position is not exonic in this transcript.
    pub fn exonic_offset(&self, pos: i64) -> Option<u64> {
        let g = u32::try_from(pos.unsigned_abs()).ok()?;
        let mut off = 0u64;
        for exon in self.exons_5to3() {
            if exon.contains_base(g) {
                let inner = if self.strand == Strand::Minus {
                    exon.last_base() - g
                } else {
                    g - exon.first_base()
                };
                return Some(off + u64::from(inner));
            }
            off += u64::from(exon.len());
        }
        None
    }

    /// Exonic offsets of the first and last translated base.
    fn cds_offsets(&self) -> Option<(u64, u64)> {
        let cds = self.cds?;
        let (five, three) = self.signed_bounds(cds);
        Some((self.exonic_offset(five)?, self.exonic_offset(three)?))
    }

    /// Reading frame of the base at a signed position.
    ///
    /// `None` for transcripts without translation or positions outside the
    /// exons.
    pub fn frame_at(&self, pos: i64) -> Option<Frame> {
        let (cds_first, cds_last) = self.cds_offsets()?;
        let off = self.exonic_offset(pos)?;
        let frame = if off < cds_first {
            Frame::Utr5
        } else if off > cds_last {
            Frame::Utr3
        } else {
            Frame::from_phase(off - cds_first)
        };
        Some(frame)
    }

    /// Spliced sequence from `from` to `to` (signed, inclusive, 5' -> 3').
    pub fn spliced_sequence(
        &self,
        genome: &dyn GenomeSequence,
        from: i64,
        to: i64,
    ) -> Option<Vec<u8>> {
        if from > to {
            return None;
        }
        let mut out = Vec::new();
        for exon in self.exons_5to3() {
            let (five, three) = self.signed_bounds(exon);
            let lo = five.max(from);
            let hi = three.min(to);
            if lo > hi {
                continue;
            }
            // Back to genomic 1-based coordinates, then to 0-based half-open.
            let (g_first, g_last) = if self.strand == Strand::Minus {
                (hi.unsigned_abs(), lo.unsigned_abs())
            } else {
                (lo.unsigned_abs(), hi.unsigned_abs())
            };
            let start0 = u32::try_from(g_first - 1).ok()?;
            let end0 = u32::try_from(g_last).ok()?;
            let chunk = genome.fetch(self.chr_id, start0, end0)?;
            if self.strand == Strand::Minus {
                out.extend(reverse_complement(&chunk));
            } else {
                out.extend(chunk);
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::InMemoryGenome;

    fn tx_three_exons(strand: Strand) -> Transcript {
        Transcript::from_exons(
            "T",
            strand,
            0,
            &[
                RefBlock::from_one_based(100, 200),
                RefBlock::from_one_based(300, 400),
                RefBlock::from_one_based(500, 600),
            ],
        )
    }

    #[test]
    fn transcript_names_dedup() {
        let mut t = Transcript::new(0, 0, "T1", 0, Strand::Plus);
        t.add_name("T1");
        t.add_name("ENST0000");
        t.add_name("ENST0000");
        assert_eq!(t.names, vec!["T1".to_string(), "ENST0000".to_string()]);
        assert_eq!(t.primary_name(), Some("T1"));
    }

    #[test]
    fn finalize_sorts_and_merges_exons() {
        let mut t = Transcript::new(0, 0, "T", 0, Strand::Plus);
        t.add_exon(RefBlock::new(300, 400));
        t.add_exon(RefBlock::new(100, 200));
        t.add_exon(RefBlock::new(150, 250));
        assert_eq!(t.finalize(), (100, 400));
        assert_eq!(t.exons(), &[RefBlock::new(100, 250), RefBlock::new(300, 400)]);
    }

    #[test]
    fn plus_strand_site_chain() {
        let sites = tx_three_exons(Strand::Plus).splice_sites();
        let got: Vec<(i64, SiteKind)> = sites.iter().map(|s| (s.pos, s.kind)).collect();
        assert_eq!(
            got,
            vec![
                (100, SiteKind::Tss),
                (200, SiteKind::Donor),
                (300, SiteKind::Acceptor),
                (400, SiteKind::Donor),
                (500, SiteKind::Acceptor),
                (600, SiteKind::Tes),
            ]
        );
    }

    #[test]
    fn minus_strand_site_chain_is_ascending_and_signed() {
        let sites = tx_three_exons(Strand::Minus).splice_sites();
        let got: Vec<(i64, SiteKind)> = sites.iter().map(|s| (s.pos, s.kind)).collect();
        assert_eq!(
            got,
            vec![
                (-600, SiteKind::Tss),
                (-500, SiteKind::Donor),
                (-400, SiteKind::Acceptor),
                (-300, SiteKind::Donor),
                (-200, SiteKind::Acceptor),
                (-100, SiteKind::Tes),
            ]
        );
        assert!(sites.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn exonic_offsets_skip_introns() {
        let t = tx_three_exons(Strand::Plus);
        assert_eq!(t.exonic_offset(100), Some(0));
        assert_eq!(t.exonic_offset(200), Some(100));
        assert_eq!(t.exonic_offset(300), Some(101));
        assert_eq!(t.exonic_offset(250), None);

        let m = tx_three_exons(Strand::Minus);
        assert_eq!(m.exonic_offset(-600), Some(0));
        assert_eq!(m.exonic_offset(-500), Some(100));
        assert_eq!(m.exonic_offset(-400), Some(101));
    }

    #[test]
    fn frames_follow_the_cds() {
        let mut t = tx_three_exons(Strand::Plus);
        // Translation starts at 150 and ends at 550 (last base of the stop).
        t.set_cds(Some(RefBlock::from_one_based(150, 550)));
        assert_eq!(t.frame_at(100), Some(Frame::Utr5));
        assert_eq!(t.frame_at(150), Some(Frame::Zero));
        assert_eq!(t.frame_at(200), Some(Frame::from_phase(50)));
        // 51 coding bases in exon 1 -> first base of exon 2 is at offset 51.
        assert_eq!(t.frame_at(300), Some(Frame::Zero));
        assert_eq!(t.frame_at(600), Some(Frame::Utr3));
        assert_eq!(t.frame_at(250), None);

        let plain = tx_three_exons(Strand::Plus);
        assert_eq!(plain.frame_at(150), None);
    }

    #[test]
    fn spliced_sequence_joins_exons() {
        let mut genome = InMemoryGenome::new();
        // 1-based: exon A = 1..4, intron 5..8, exon B = 9..12
        genome.insert(0, b"ACGTTTTTGGCA");
        let plus = Transcript::from_exons(
            "P",
            Strand::Plus,
            0,
            &[RefBlock::from_one_based(1, 4), RefBlock::from_one_based(9, 12)],
        );
        assert_eq!(plus.spliced_sequence(&genome, 2, 10).unwrap(), b"CGTGG");

        let minus = Transcript::from_exons(
            "M",
            Strand::Minus,
            0,
            &[RefBlock::from_one_based(1, 4), RefBlock::from_one_based(9, 12)],
        );
        // Minus strand reads 12..9 then 4..1 reverse-complemented.
        assert_eq!(minus.spliced_sequence(&genome, -12, -1).unwrap(), b"TGCCACGT");
    }
}
