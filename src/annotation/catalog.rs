use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::io::{AnnotationReader, AnnotationRecord, ParseError};
use crate::model::gene::Gene;
use crate::model::transcript::Transcript;
use crate::model::types::{GeneId, SourceType, TranscriptId, SOURCE_MOST_CONFIDENT};
use crate::types::{RefBlock, Strand};

const MAGIC: &[u8; 4] = b"SPG1";
const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

/// Configure which attribute keys are used to extract:
/// - gene stable identifier (used to intern -> GeneId)
/// - gene display names/aliases (stored in Gene.names)
/// - transcript stable identifier (used to intern -> TranscriptId)
/// - transcript display names/aliases (stored in Transcript.names)
/// - (GFF3) exon -> transcript linking keys (usually Parent)
/// - the source confidence of a transcript (lower is better)
///
/// Notes:
/// - We allow multiple keys per category; first present wins.
/// - For GFF3 Parent values, we split by ',' and treat each parent as a transcript ID.
#[derive(Debug, Clone)]
pub struct IdNameKeys {
    pub gene_id_keys: Vec<String>,
    pub gene_name_keys: Vec<String>,

    pub transcript_id_keys: Vec<String>,
    pub transcript_name_keys: Vec<String>,

    /// GFF3 exon->transcript linkage (most commonly: Parent)
    pub parent_keys: Vec<String>,

    /// Feature types that count as exon blocks (default: ["exon"])
    pub exon_feature_types: Vec<String>,

    /// Feature types spanning the translated region, stop codon included.
    pub cds_feature_types: Vec<String>,

    /// Numeric attribute used as source confidence (GENCODE `level`).
    /// Missing or unparsable values count as most confident.
    pub confidence_keys: Vec<String>,
}

impl Default for IdNameKeys {
    fn default() -> Self {
        Self {
            // Common GTF + some common variants
            gene_id_keys: vec!["gene_id".into(), "gene".into(), "GeneID".into()],
            gene_name_keys: vec!["gene_name".into(), "Name".into(), "gene".into()],

            transcript_id_keys: vec!["transcript_id".into(), "transcript".into(), "ID".into()],
            transcript_name_keys: vec!["transcript_name".into(), "Name".into()],

            parent_keys: vec!["Parent".into()],
            exon_feature_types: vec!["exon".into()],
            cds_feature_types: vec!["CDS".into(), "start_codon".into(), "stop_codon".into()],
            confidence_keys: vec!["level".into()],
        }
    }
}

/// Transcripts of one gene sharing chromosome and strand; the unit a
/// splice graph is built for.
#[derive(Debug, Clone)]
pub struct Locus<'a> {
    pub gene: &'a Gene,
    pub chr_id: usize,
    pub strand: Strand,
    pub transcripts: Vec<&'a Transcript>,
}

/// Genes and transcripts of an annotation, plus the chromosome dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationCatalog {
    pub chr_names: Vec<String>,
    chr_to_id: HashMap<String, usize>,

    pub genes: Vec<Gene>,
    pub transcripts: Vec<Transcript>,
}

/// Human-readable summary: totals, then one line per chromosome.
impl fmt::Display for AnnotationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coding = self.transcripts.iter().filter(|t| t.is_coding()).count();
        let spliced = self.transcripts.iter().filter(|t| t.is_spliced()).count();
        writeln!(
            f,
            "AnnotationCatalog: {} genes, {} transcripts ({} coding, {} spliced), {} chromosomes",
            self.genes.len(),
            self.transcripts.len(),
            coding,
            spliced,
            self.chr_names.len()
        )?;

        let mut per_chr: Vec<(HashSet<GeneId>, usize)> =
            vec![(HashSet::new(), 0); self.chr_names.len()];
        for tx in &self.transcripts {
            if let Some((genes, n)) = per_chr.get_mut(tx.chr_id) {
                genes.insert(tx.gene_id);
                *n += 1;
            }
        }
        for (name, (genes, n)) in self.chr_names.iter().zip(&per_chr) {
            writeln!(f, "  - {}: genes={}, transcripts={}", name, genes.len(), n)?;
        }
        Ok(())
    }
}

impl AnnotationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chromosome name -> id, e.g. for loading a matching genome.
    pub fn chr_ids(&self) -> &HashMap<String, usize> {
        &self.chr_to_id
    }

    pub fn chr_name(&self, chr_id: usize) -> Option<&str> {
        self.chr_names.get(chr_id).map(String::as_str)
    }

    /// Build the catalog directly from a GTF/GFF3 reader.
    ///
    /// Workflow:
    /// 1) parse records
    /// 2) exon features: intern gene and transcript(s), add the exon block
    /// 3) CDS / start / stop codon features: collect the translated span
    /// 4) finalize transcripts (sort/merge exons), attach translated spans
    /// 5) link transcripts into genes
    ///
    /// Chromosome ids follow first appearance in the file.
    ///
    /// # Example (minimal GTF via `BufRead`)
    /// ```
    /// use std::io::Cursor;
    /// use gtf_splice_graph::annotation::{AnnotationCatalog, IdNameKeys};
    ///
    /// let gtf = "\
    /// chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n\
    /// chr1\tsrc\texon\t201\t250\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";\n";
    ///
    /// let catalog = AnnotationCatalog::new()
    ///     .from_reader(Cursor::new(gtf.as_bytes()), IdNameKeys::default())
    ///     .unwrap();
    ///
    /// assert_eq!(catalog.genes.len(), 1);
    /// assert_eq!(catalog.transcripts.len(), 1);
    /// assert_eq!(catalog.chr_names, vec!["chr1".to_string()]);
    /// ```
    pub fn from_reader<R: BufRead>(self, reader: R, keys: IdNameKeys) -> Result<Self, ParseError> {
        self.from_records(AnnotationReader::new(reader), keys)
    }

    /// Same as [`AnnotationCatalog::from_reader`] for an already configured record reader.
    pub fn from_records<R: BufRead>(
        mut self,
        records: AnnotationReader<R>,
        keys: IdNameKeys,
    ) -> Result<Self, ParseError> {
        // stable key string -> internal id
        let mut gene_key_to_id: HashMap<String, GeneId> = HashMap::new();
        let mut tx_key_to_id: HashMap<String, TranscriptId> = HashMap::new();

        // transcript internal id -> gene internal id (best-effort)
        let mut tx_to_gene: HashMap<TranscriptId, GeneId> = HashMap::new();

        // translated blocks seen before (or without) the transcript's exons
        let mut cds_blocks: HashMap<String, Vec<RefBlock>> = HashMap::new();

        for rec in records.records() {
            let rec = rec?;

            let is_exon = rec.is_feature(&keys.exon_feature_types);
            let is_cds = rec.is_feature(&keys.cds_feature_types);
            if !is_exon && !is_cds {
                continue;
            }

            let tx_keys = transcript_keys(&rec, &keys)?;
            let block = RefBlock::new(rec.start0, rec.end0);
            if is_cds {
                for tx_key in tx_keys {
                    cds_blocks.entry(tx_key).or_default().push(block);
                }
                continue;
            }

            let chr_id = self.intern_chr(&rec.seqname);
            let gene_key = rec
                .pick_first_attr(&keys.gene_id_keys)
                .ok_or_else(|| ParseError::MissingAttribute {
                    line_no: rec.line_no,
                    expected: "gene id",
                    tried: keys.gene_id_keys.clone(),
                })?;
            let gene_id = self.intern_gene(&rec, &keys, &gene_key, &mut gene_key_to_id);

            for tx_key in tx_keys {
                let tx_id = self.intern_tx(&rec, &keys, chr_id, gene_id, &tx_key, &mut tx_key_to_id);
                tx_to_gene.entry(tx_id).or_insert(gene_id);
                self.transcripts[tx_id].add_exon(block);
            }
        }

        for tx in &mut self.transcripts {
            tx.finalize();
        }

        let mut orphan_cds = 0usize;
        for (tx_key, blocks) in cds_blocks {
            match tx_key_to_id.get(&tx_key) {
                Some(&tid) => {
                    for b in blocks {
                        self.transcripts[tid].add_cds_block(b);
                    }
                }
                None => orphan_cds += 1,
            }
        }
        if orphan_cds > 0 {
            debug!(orphan_cds, "translated features without exons were ignored");
        }

        // Link transcripts into genes
        for (tx_id, gene_id) in tx_to_gene {
            self.genes[gene_id].add_transcript(tx_id);
        }
        for g in &mut self.genes {
            g.finalize();
        }

        Ok(self)
    }

    /// One locus per gene and (chromosome, strand), genes in catalog order.
    pub fn loci(&self) -> Vec<Locus<'_>> {
        let mut out = Vec::new();
        for gene in &self.genes {
            let mut groups: BTreeMap<(usize, char), Vec<&Transcript>> = BTreeMap::new();
            for &tid in gene.transcript_ids() {
                let tx = &self.transcripts[tid];
                if tx.exons().is_empty() {
                    continue;
                }
                groups
                    .entry((tx.chr_id, tx.strand.symbol()))
                    .or_default()
                    .push(tx);
            }
            for (_, transcripts) in groups {
                let (chr_id, strand) = (transcripts[0].chr_id, transcripts[0].strand);
                out.push(Locus {
                    gene,
                    chr_id,
                    strand,
                    transcripts,
                });
            }
        }
        out
    }

    fn intern_chr(&mut self, name: &str) -> usize {
        if let Some(&id) = self.chr_to_id.get(name) {
            return id;
        }
        let id = self.chr_names.len();
        self.chr_names.push(name.to_string());
        self.chr_to_id.insert(name.to_string(), id);
        id
    }

    fn intern_gene(
        &mut self,
        rec: &AnnotationRecord,
        keys: &IdNameKeys,
        gene_key: &str,
        gene_key_to_id: &mut HashMap<String, GeneId>,
    ) -> GeneId {
        if let Some(&gid) = gene_key_to_id.get(gene_key) {
            // Add any found name aliases
            for k in &keys.gene_name_keys {
                if let Some(v) = rec.attr(k) {
                    self.genes[gid].add_name(v);
                }
            }
            return gid;
        }

        let gid = self.genes.len();
        self.genes.push(Gene::new(gid, gene_key));
        gene_key_to_id.insert(gene_key.to_string(), gid);

        for k in &keys.gene_name_keys {
            if let Some(v) = rec.attr(k) {
                self.genes[gid].add_name(v);
            }
        }
        gid
    }

    fn intern_tx(
        &mut self,
        rec: &AnnotationRecord,
        keys: &IdNameKeys,
        chr_id: usize,
        gene_id: GeneId,
        tx_key: &str,
        tx_key_to_id: &mut HashMap<String, TranscriptId>,
    ) -> TranscriptId {
        if let Some(&tid) = tx_key_to_id.get(tx_key) {
            for k in &keys.transcript_name_keys {
                if let Some(v) = rec.attr(k) {
                    self.transcripts[tid].add_name(v);
                }
            }
            return tid;
        }

        let tid = self.transcripts.len();
        let mut tx = Transcript::new(tid, gene_id, tx_key, chr_id, rec.strand);
        tx.source = confidence(rec, keys);
        for k in &keys.transcript_name_keys {
            if let Some(v) = rec.attr(k) {
                tx.add_name(v);
            }
        }
        self.transcripts.push(tx);
        tx_key_to_id.insert(tx_key.to_string(), tid);
        tid
    }

    /// Serialize this catalog with a small header (magic + crate version) and a bincode payload.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut f = File::create(path)
            .with_context(|| format!("create catalog file {}", path.display()))?;

        f.write_all(MAGIC)?;

        // version string from Cargo.toml
        let v = VERSION_STR.as_bytes();
        let len = v.len() as u16;
        f.write_all(&len.to_le_bytes())?;
        f.write_all(v)?;

        let payload = bincode::serialize(self)?;
        f.write_all(&payload)?;
        Ok(())
    }

    /// Load a catalog written by `save()`. Rejects wrong file types and version mismatches.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut f = File::open(path)
            .with_context(|| format!("open catalog file {}", path.display()))?;

        let mut magic = [0u8; 4];
        f.read_exact(&mut magic)?;
        if &magic != MAGIC {
            bail!("Not an AnnotationCatalog file (bad magic)");
        }

        let mut len_buf = [0u8; 2];
        f.read_exact(&mut len_buf)?;
        let len = u16::from_le_bytes(len_buf) as usize;

        let mut ver_buf = vec![0u8; len];
        f.read_exact(&mut ver_buf)?;
        let file_version = std::str::from_utf8(&ver_buf)?;

        if file_version != VERSION_STR {
            bail!(
                "Catalog version mismatch: file={}, binary={}",
                file_version,
                VERSION_STR
            );
        }

        let mut payload = Vec::new();
        f.read_to_end(&mut payload)?;
        let catalog: Self = bincode::deserialize(&payload)?;
        Ok(catalog)
    }

    /// Whether `path` starts with the catalog magic.
    pub fn is_catalog_file(path: impl AsRef<Path>) -> bool {
        let mut magic = [0u8; 4];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut magic))
            .is_ok()
            && &magic == MAGIC
    }
}

fn confidence(rec: &AnnotationRecord, keys: &IdNameKeys) -> SourceType {
    rec.pick_first_attr(&keys.confidence_keys)
        .and_then(|v| v.parse::<SourceType>().ok())
        .unwrap_or(SOURCE_MOST_CONFIDENT)
}

/// Transcript id(s) of a record: the transcript id attribute, else the
/// GFF3 parent list.
fn transcript_keys(rec: &AnnotationRecord, keys: &IdNameKeys) -> Result<Vec<String>, ParseError> {
    let raw = rec
        .pick_first_attr(&keys.transcript_id_keys)
        .or_else(|| rec.pick_first_attr(&keys.parent_keys))
        .ok_or_else(|| {
            let mut tried = keys.transcript_id_keys.clone();
            tried.extend(keys.parent_keys.iter().cloned());
            ParseError::MissingAttribute {
                line_no: rec.line_no,
                expected: "transcript id",
                tried,
            }
        })?;
    Ok(split_gff3_parent_list(&raw))
}

/// Split Parent= list (GFF3) by commas; also trim whitespace.
fn split_gff3_parent_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
