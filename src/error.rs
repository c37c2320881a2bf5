use thiserror::Error;

/// Recoverable failures of graph construction, event enumeration and output.
///
/// Broken internal invariants (transcript-set widths, arena ids) are not
/// represented here; those panic.
#[derive(Debug, Error)]
pub enum SpliceGraphError {
    #[error("locus has no transcripts")]
    EmptyLocus,

    #[error("transcript '{0}' appears more than once in the locus")]
    DuplicateTranscript(String),

    #[error("transcript '{0}' has no exons")]
    NoExons(String),

    #[error("transcript '{id}' is on strand {found}, locus is on strand {expected}")]
    MixedStrand {
        id: String,
        expected: char,
        found: char,
    },

    #[error("transcript '{id}' is on chromosome {found}, locus is on chromosome {expected}")]
    MixedChromosome {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("event arity must be at least 2, got {0}")]
    InvalidArity(usize),

    #[error("event sink is closed")]
    SinkClosed,

    #[error("event writer failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SpliceGraphError> = std::result::Result<T, E>;
