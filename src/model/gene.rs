use crate::model::types::{GeneId, TranscriptId};
use serde::{Deserialize, Serialize};

/// A gene of the annotation: the unit whose transcripts share one splice
/// graph per (chromosome, strand).
///
/// `stable_id` is the annotation's gene id; `names` holds display names and
/// aliases, first one preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub id: GeneId,
    pub stable_id: String,
    pub names: Vec<String>,
    transcript_ids: Vec<TranscriptId>,
}

impl Gene {
    pub fn new(id: GeneId, stable_id: impl Into<String>) -> Self {
        Self {
            id,
            stable_id: stable_id.into(),
            names: Vec::new(),
            transcript_ids: Vec::new(),
        }
    }

    /// Add a display name or alias; blanks, duplicates and the stable id itself are ignored.
    pub fn add_name(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || name == self.stable_id {
            return;
        }
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(|s| s.as_str())
    }

    /// Name used in reports: the primary name, else the stable id.
    pub fn display_name(&self) -> &str {
        self.primary_name().unwrap_or(&self.stable_id)
    }

    pub fn add_transcript(&mut self, tx_id: TranscriptId) {
        self.transcript_ids.push(tx_id);
    }

    pub fn transcript_ids(&self) -> &[TranscriptId] {
        &self.transcript_ids
    }

    /// Sort transcript ids and remove duplicates; loci follow this order.
    pub fn finalize(&mut self) {
        self.transcript_ids.sort_unstable();
        self.transcript_ids.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_the_stable_id() {
        let mut g = Gene::new(0, "ENSG01");
        assert_eq!(g.display_name(), "ENSG01");
        g.add_name("ENSG01");
        g.add_name(" ");
        assert!(g.names.is_empty());
        g.add_name("TP53");
        g.add_name("TP53");
        g.add_name("p53");
        assert_eq!(g.names, vec!["TP53".to_string(), "p53".to_string()]);
        assert_eq!(g.display_name(), "TP53");
    }

    #[test]
    fn finalize_sorts_and_dedups_transcripts() {
        let mut g = Gene::new(0, "G1");
        g.add_transcript(10);
        g.add_transcript(3);
        g.add_transcript(10);
        assert_eq!(g.transcript_ids(), &[10, 3, 10]);
        g.finalize();
        assert_eq!(g.transcript_ids(), &[3, 10]);
    }
}
