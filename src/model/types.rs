/// Internal numeric IDs (indexes into Vecs).
pub type GeneId = usize;
pub type TranscriptId = usize;

/// Source confidence of an annotation record.
///
/// Lower values are more trustworthy (curated reference models use 0,
/// mRNA-like evidence 1, EST-like evidence 2 and above).
pub type SourceType = u8;

/// Most confident source type.
pub const SOURCE_MOST_CONFIDENT: SourceType = 0;

/// Least confident source type.
pub const SOURCE_LEAST_CONFIDENT: SourceType = SourceType::MAX;
