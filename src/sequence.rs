//! Genomic sequence access.
//!
//! The graph itself never needs sequence; it is consulted for canonical
//! splice-motif flags, acceptable-intron checks, junction sequences and the
//! frame prediction of transcripts without an annotated CDS.

use std::collections::HashMap;
use std::io::BufRead;

use anyhow::{Context, Result};

use crate::model::site::{SiteKind, SpliceSite};
use crate::types::Strand;

/// Source of forward-strand genomic sequence.
pub trait GenomeSequence {
    /// Uppercase bases of the 0-based half-open interval `[start0, end0)`,
    /// `None` if the chromosome is unknown or the interval runs off its end.
    fn fetch(&self, chr_id: usize, start0: u32, end0: u32) -> Option<Vec<u8>>;
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        _ => b'N',
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// The two intronic bases next to a splice site, read in transcript direction.
///
/// Donors report the first two intron bases, acceptors the last two.
pub fn splice_motif(
    genome: &dyn GenomeSequence,
    chr_id: usize,
    strand: Strand,
    site: &SpliceSite,
) -> Option<[u8; 2]> {
    let g = site.genomic()?;
    // Intronic bases lie downstream of a donor and upstream of an acceptor,
    // which flips to the other genomic side on the minus strand.
    let downstream = match (site.kind, strand) {
        (SiteKind::Donor, Strand::Minus) => false,
        (SiteKind::Donor, _) => true,
        (SiteKind::Acceptor, Strand::Minus) => true,
        (SiteKind::Acceptor, _) => false,
        _ => return None,
    };
    let raw = if downstream {
        genome.fetch(chr_id, g, g + 2)?
    } else {
        let start0 = g.checked_sub(3)?;
        genome.fetch(chr_id, start0, g - 1)?
    };
    let seq = if strand == Strand::Minus {
        reverse_complement(&raw)
    } else {
        raw
    };
    match seq.as_slice() {
        [a, b] => Some([*a, *b]),
        _ => None,
    }
}

/// GT/GC donors and AG acceptors count as canonical.
pub fn is_canonical_motif(kind: SiteKind, motif: [u8; 2]) -> bool {
    match kind {
        SiteKind::Donor => motif == *b"GT" || motif == *b"GC",
        SiteKind::Acceptor => motif == *b"AG",
        _ => true,
    }
}

/// Chromosome sequences held in memory, indexed by chromosome id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGenome {
    contigs: Vec<Option<Vec<u8>>>,
}

impl InMemoryGenome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chr_id: usize, seq: &[u8]) {
        if self.contigs.len() <= chr_id {
            self.contigs.resize(chr_id + 1, None);
        }
        self.contigs[chr_id] = Some(seq.iter().map(|b| b.to_ascii_uppercase()).collect());
    }

    pub fn len(&self) -> usize {
        self.contigs.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the FASTA records whose id appears in `chr_ids`; others are skipped.
    pub fn from_fasta<R: BufRead>(mut reader: R, chr_ids: &HashMap<String, usize>) -> Result<Self> {
        let mut genome = Self::new();
        let mut line = String::new();
        let mut current: Option<usize> = None;
        let mut seq: Vec<u8> = Vec::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .with_context(|| format!("read FASTA line {}", line_no + 1))?;
            if n == 0 {
                break;
            }
            line_no += 1;

            if let Some(header) = line.strip_prefix('>') {
                if let Some(chr_id) = current.take() {
                    genome.insert(chr_id, &seq);
                }
                seq.clear();
                let id = header.split_whitespace().next().unwrap_or("");
                current = chr_ids.get(id).copied();
                continue;
            }
            if current.is_some() {
                seq.extend(
                    line.bytes()
                        .filter(|b| !b.is_ascii_whitespace())
                        .map(|b| b.to_ascii_uppercase()),
                );
            }
        }
        if let Some(chr_id) = current {
            genome.insert(chr_id, &seq);
        }
        Ok(genome)
    }
}

impl GenomeSequence for InMemoryGenome {
    fn fetch(&self, chr_id: usize, start0: u32, end0: u32) -> Option<Vec<u8>> {
        let contig = self.contigs.get(chr_id)?.as_ref()?;
        let (s, e) = (start0 as usize, end0 as usize);
        if s > e || e > contig.len() {
            return None;
        }
        Some(contig[s..e].to_vec())
    }
}
