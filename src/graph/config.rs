use crate::error::{Result, SpliceGraphError};
use crate::model::types::{SourceType, SOURCE_LEAST_CONFIDENT};

/// Knobs shared by graph construction and event enumeration.
///
/// Built once (usually from CLI flags) and handed to every graph by value;
/// nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Drop transcripts with a non-canonical donor/acceptor.
    pub canonical_sites_only: bool,

    /// Transcript ends from sources above this level are "soft" and get
    /// extended to the most upstream/downstream boundary sharing their
    /// adjacent splice site. `None` keeps every end as annotated.
    pub edge_confidence: Option<SourceType>,

    /// Introns from sources above this level are subject to the acceptable
    /// intron check.
    pub intron_confidence: SourceType,

    /// Enable the canonical-motif and maximum-length intron check.
    pub acceptable_intron_check: bool,

    /// Introns shorter than this are invalid, whatever their source.
    pub min_intron_length: u32,

    /// Upper bound for acceptable introns (only with `acceptable_intron_check`).
    pub max_intron_length: Option<u32>,

    /// Number of variants per event (2 = pairwise).
    pub event_arity: usize,

    /// Annotate events with reading frames.
    pub predict_cds: bool,

    /// Skip events anchored in the root or leaf sentinel.
    pub internal_events_only: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            canonical_sites_only: false,
            edge_confidence: None,
            intron_confidence: SOURCE_LEAST_CONFIDENT,
            acceptable_intron_check: false,
            min_intron_length: 0,
            max_intron_length: None,
            event_arity: 2,
            predict_cds: false,
            internal_events_only: false,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_arity < 2 {
            return Err(SpliceGraphError::InvalidArity(self.event_arity));
        }
        Ok(())
    }
}
