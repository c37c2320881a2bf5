use std::collections::BTreeMap;

use crate::model::transcript::Transcript;
use crate::types::{RefBlock, Strand};

/// Transcript boundaries moved by soft-end resolution or flank collapsing.
///
/// Keyed by stable transcript id; values are 1-based genomic coordinates of
/// the new TSS (`starts`) or TES (`ends`). The graph never touches the
/// transcripts it was built from; callers that need the extended model apply
/// this table themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionTable {
    starts: BTreeMap<String, u32>,
    ends: BTreeMap<String, u32>,
}

impl ExtensionTable {
    pub(crate) fn extend_start(&mut self, id: &str, genomic: u32) {
        self.starts.insert(id.to_string(), genomic);
    }

    pub(crate) fn extend_end(&mut self, id: &str, genomic: u32) {
        self.ends.insert(id.to_string(), genomic);
    }

    pub fn start_of(&self, id: &str) -> Option<u32> {
        self.starts.get(id).copied()
    }

    pub fn end_of(&self, id: &str) -> Option<u32> {
        self.ends.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.starts.len() + self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty() && self.ends.is_empty()
    }

    /// 5' and 3' transcript boundary (strand-signed), extensions applied.
    pub fn signed_span(&self, tx: &Transcript) -> Option<(i64, i64)> {
        let exons = self.extended_exons(tx);
        let first = exons.first()?;
        let last = exons.last()?;
        let sign = tx.strand.sign();
        let (lo, hi) = (i64::from(first.first_base()), i64::from(last.last_base()));
        if sign > 0 {
            Some((lo, hi))
        } else {
            Some((-hi, -lo))
        }
    }

    /// Exons of `tx` with its recorded extensions applied.
    pub fn extended_exons(&self, tx: &Transcript) -> Vec<RefBlock> {
        let mut exons = tx.exons().to_vec();
        if exons.is_empty() {
            return exons;
        }
        let last = exons.len() - 1;
        let (low_end, high_end) = match tx.strand {
            Strand::Minus => (self.end_of(&tx.stable_id), self.start_of(&tx.stable_id)),
            _ => (self.start_of(&tx.stable_id), self.end_of(&tx.stable_id)),
        };
        if let Some(g) = low_end {
            let start = g.saturating_sub(1);
            if start < exons[0].end {
                exons[0].start = start;
            }
        }
        if let Some(g) = high_end {
            if g > exons[last].start {
                exons[last].end = g;
            }
        }
        exons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_and_minus_extensions_hit_the_right_exon() {
        let exons = [RefBlock::from_one_based(100, 200), RefBlock::from_one_based(300, 400)];
        let plus = Transcript::from_exons("P", Strand::Plus, 2, &exons);
        let minus = Transcript::from_exons("M", Strand::Minus, 2, &exons);

        let mut table = ExtensionTable::default();
        table.extend_start("P", 80);
        table.extend_start("M", 450);
        table.extend_end("M", 60);

        assert_eq!(
            table.extended_exons(&plus),
            vec![RefBlock::from_one_based(80, 200), RefBlock::from_one_based(300, 400)]
        );
        assert_eq!(
            table.extended_exons(&minus),
            vec![RefBlock::from_one_based(60, 200), RefBlock::from_one_based(300, 450)]
        );
        assert_eq!(table.signed_span(&minus), Some((-450, -60)));
        assert_eq!(table.len(), 3);
        // The input model is untouched.
        assert_eq!(plus.exons()[0], RefBlock::from_one_based(100, 200));
    }
}
