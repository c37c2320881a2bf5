use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::annotation::catalog::{AnnotationCatalog, IdNameKeys};
use crate::annotation::io::{AnnotationReader, ParseError};

/// High-level builder for creating an `AnnotationCatalog` from a GTF/GFF3 file.
///
/// - parses whole file (optionally gzipped)
/// - configurable mapping of ID/NAME keys for gene + transcript
/// - builds genes + transcripts (with translated spans) + chromosome dictionary
#[derive(Debug, Clone, Default)]
pub struct AnnotationBuilder {
    pub keys: IdNameKeys,
}

impl AnnotationBuilder {
    /// Start with defaults that work reasonably for many GTF/GFF3 files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: set a single key (or first-preference key) for gene id.
    pub fn gene_id_key(mut self, key: &str) -> Self {
        self.keys.gene_id_keys = vec![key.to_string()];
        self
    }

    /// Convenience: set preferred keys for gene display names/aliases.
    pub fn gene_name_keys(mut self, keys: &[&str]) -> Self {
        self.keys.gene_name_keys = to_strings(keys);
        self
    }

    /// Convenience: set transcript id key(s).
    pub fn transcript_id_keys(mut self, keys: &[&str]) -> Self {
        self.keys.transcript_id_keys = to_strings(keys);
        self
    }

    /// Convenience: set transcript name key(s).
    pub fn transcript_name_keys(mut self, keys: &[&str]) -> Self {
        self.keys.transcript_name_keys = to_strings(keys);
        self
    }

    /// Convenience: set parent keys for GFF3 exon->transcript linking (usually ["Parent"]).
    pub fn parent_keys(mut self, keys: &[&str]) -> Self {
        self.keys.parent_keys = to_strings(keys);
        self
    }

    /// Convenience: define what feature types count as exon blocks.
    pub fn exon_feature_types(mut self, types: &[&str]) -> Self {
        self.keys.exon_feature_types = to_strings(types);
        self
    }

    /// Feature types whose union is the translated span.
    /// An empty list treats every transcript as non-coding.
    pub fn cds_feature_types(mut self, types: &[&str]) -> Self {
        self.keys.cds_feature_types = to_strings(types);
        self
    }

    /// Attribute(s) holding the numeric source confidence.
    pub fn confidence_keys(mut self, keys: &[&str]) -> Self {
        self.keys.confidence_keys = to_strings(keys);
        self
    }

    /// Build the catalog from anything implementing `BufRead`.
    pub fn build_from_reader<R: BufRead>(&self, reader: R) -> Result<AnnotationCatalog, ParseError> {
        AnnotationCatalog::new().from_reader(reader, self.keys.clone())
    }

    /// Build the catalog from a file path.
    ///
    /// - If path ends with `.gz`, uses a gzip decoder.
    /// - Otherwise reads as plain text.
    pub fn build_from_path<P: AsRef<Path>>(&self, path: P) -> Result<AnnotationCatalog, ParseError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| ParseError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        // Decide gz vs plain by extension.
        let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);

        let reader: Box<dyn BufRead> = if is_gz {
            Box::new(BufReader::new(flate2::read::GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        let records = AnnotationReader::new(reader).with_path(path.display().to_string());
        let catalog = AnnotationCatalog::new().from_records(records, self.keys.clone())?;
        info!(
            genes = catalog.genes.len(),
            transcripts = catalog.transcripts.len(),
            chromosomes = catalog.chr_names.len(),
            "loaded annotation {}",
            path.display()
        );
        Ok(catalog)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// -------------------- tests --------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn builder_gtf_default_keys_builds_catalog() {
        // Two exons of one transcript T1 belonging to gene G1.
        let gtf = "\
chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; gene_name \"Alpha\"; transcript_id \"T1\"; transcript_name \"TxA\";
chr1\tsrc\texon\t201\t250\t.\t+\t.\tgene_id \"G1\"; gene_name \"Alpha\"; transcript_id \"T1\"; transcript_name \"TxA\";
";

        let idx = AnnotationBuilder::new()
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap();

        assert_eq!(idx.chr_names, vec!["chr1".to_string()]);
        assert_eq!(idx.genes.len(), 1);
        assert_eq!(idx.transcripts.len(), 1);

        // We store multiple names/aliases; at minimum expect these to be present.
        assert!(idx.genes[0].names.iter().any(|n| n == "Alpha" || n == "G1"));
        assert!(idx.transcripts[0].names.iter().any(|n| n == "TxA" || n == "T1"));

        // Exons should be converted to 0-based half-open: 101..150 => [100,150)
        assert_eq!(idx.transcripts[0].exons()[0].start, 100);
        assert_eq!(idx.transcripts[0].exons()[0].end, 150);

        // Non-coding without CDS features.
        assert!(!idx.transcripts[0].is_coding());
    }

    #[test]
    fn builder_gff3_parent_linking_builds_catalog() {
        // Minimal GFF3-like exon lines using Parent for transcript ID.
        // Here we intentionally do NOT include "transcript_id" etc.
        let gff = "\
chr2\tsrc\texon\t5\t20\t.\t-\t.\tParent=tx1;gene_id=G9;Name=GeneNice
chr2\tsrc\texon\t30\t40\t.\t-\t.\tParent=tx1;gene_id=G9;Name=GeneNice
";

        // Force transcript ID to come from Parent.
        let builder = AnnotationBuilder::new()
            .transcript_id_keys(&[]) // empty => will fall back to parent_keys
            .parent_keys(&["Parent"])
            .gene_id_key("gene_id")
            .gene_name_keys(&["Name"])
            .exon_feature_types(&["exon"]);

        let idx = builder
            .build_from_reader(Cursor::new(gff.as_bytes()))
            .unwrap();

        assert_eq!(idx.chr_names, vec!["chr2".to_string()]);
        assert_eq!(idx.genes.len(), 1);
        assert_eq!(idx.transcripts.len(), 1);

        assert_eq!(idx.transcripts[0].strand, crate::types::Strand::Minus);

        // GFF3 coordinates 5..20 => [4,20)
        assert_eq!(idx.transcripts[0].exons()[0].start, 4);
        assert_eq!(idx.transcripts[0].exons()[0].end, 20);

        // Gene/transcript names should include configured values
        assert!(idx.genes[0].names.iter().any(|n| n == "GeneNice" || n == "G9"));
        assert!(idx.transcripts[0].names.iter().any(|n| n == "tx1"));
    }

    #[test]
    fn builder_respects_exon_feature_types_filter() {
        // One exon and one CDS; only the exon is a block, the CDS is the translated span.
        let gtf = "\
chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\tCDS\t201\t250\t.\t+\t0\tgene_id \"G1\"; transcript_id \"T1\";
";

        let builder = AnnotationBuilder::new().exon_feature_types(&["exon"]);

        let idx = builder
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap();

        assert_eq!(idx.transcripts.len(), 1);
        // Only the exon should be used => one block after finalize.
        assert_eq!(idx.transcripts[0].exons().len(), 1);
        assert_eq!(idx.transcripts[0].exons()[0].start, 100);
        assert_eq!(idx.transcripts[0].exons()[0].end, 150);
        assert_eq!(idx.transcripts[0].cds(), Some(crate::types::RefBlock::new(200, 250)));
    }

    #[test]
    fn builder_can_ignore_translated_features() {
        let gtf = "\
chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\tCDS\t121\t150\t.\t+\t0\tgene_id \"G1\"; transcript_id \"T1\";
";
        let idx = AnnotationBuilder::new()
            .cds_feature_types(&[])
            .build_from_reader(Cursor::new(gtf.as_bytes()))
            .unwrap();
        assert!(!idx.transcripts[0].is_coding());
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = AnnotationBuilder::new()
            .build_from_path("/nonexistent/genes.gtf")
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/genes.gtf"));
    }
}