//! gtf_splice_graph
//!
//! Pure-Rust splicing graphs built from GTF/GFF3 transcript models.
//! For every gene locus the crate builds a directed graph of splice sites,
//! contracts it, enumerates alternative-splicing events with their transcript
//! partitions, projects coding frames onto them and answers exonic-distance
//! queries between two genomic blocks.
//!
//! Genomic input blocks are 0-based, half-open; graph positions are 1-based
//! and strand-signed so that ascending order always runs 5' -> 3'.

pub mod annotation;
pub mod error;
pub mod events;
pub mod graph;
pub mod model;
pub mod path;
pub mod sequence;
pub mod transcript_set;
pub mod types;

pub use annotation::{AnnotationBuilder, AnnotationCatalog, IdNameKeys, Locus};

pub use error::{Result, SpliceGraphError};

pub use events::{
    CdsProjector, EventEngine, EventSink, FrameImpact, SinkConfig, SplicingEvent, TsvWriter,
};
pub use graph::{GraphConfig, SpliceGraph};
pub use path::{PathOutcome, PathReport, PathWalker};
pub use sequence::{GenomeSequence, InMemoryGenome};
pub use transcript_set::TranscriptSet;

pub use types::{RefBlock, Strand};

pub use model::gene::Gene;
pub use model::transcript::Transcript;
pub use model::types::{GeneId, TranscriptId};
pub use model::{Frame, FrameCode, SiteKind, SpliceSite};
