use std::collections::BTreeMap;
use std::fmt;

use crate::model::frame::FrameCode;
use crate::model::site::{SiteKey, SpliceSite};
use crate::types::Strand;

/// One alternative path between the two anchors of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventVariant {
    /// Stable ids, sorted.
    pub transcript_ids: Vec<String>,
    /// Sites strictly between the anchors, 5' -> 3'.
    pub sites: Vec<SpliceSite>,
    /// Reading-frame codes of the variant's transcripts (CDS mode only).
    pub frames: Vec<FrameCode>,
}

/// A set of variants that leave the source anchor on different edges and
/// meet again at the sink anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplicingEvent {
    pub chr_id: usize,
    pub strand: Strand,
    pub src: SpliceSite,
    pub snk: SpliceSite,
    pub dimension: usize,
    pub variants: Vec<EventVariant>,
    /// `"<IMPACT>:<codes>"` frame summary (CDS mode only).
    pub cds_summary: Option<String>,
}

impl SplicingEvent {
    /// Put variants in canonical order: by site chain, then transcripts.
    pub fn normalize(&mut self) {
        for v in &mut self.variants {
            v.transcript_ids.sort();
        }
        self.variants.sort_by(|a, b| {
            let ka: Vec<SiteKey> = a.sites.iter().map(|s| s.key()).collect();
            let kb: Vec<SiteKey> = b.sites.iter().map(|s| s.key()).collect();
            ka.cmp(&kb).then_with(|| a.transcript_ids.cmp(&b.transcript_ids))
        });
    }

    /// Structure code: sites are numbered by rank over all variants, each
    /// variant lists its ranks with the site symbol, an empty variant is `0`.
    ///
    /// An exon skip reads `0,1-2^`, alternative donors `1^,2^`.
    pub fn structure_code(&self) -> String {
        let mut ranks: BTreeMap<SiteKey, usize> = BTreeMap::new();
        for v in &self.variants {
            for s in &v.sites {
                ranks.insert(s.key(), 0);
            }
        }
        for (i, r) in ranks.values_mut().enumerate() {
            *r = i + 1;
        }

        let mut parts = Vec::with_capacity(self.variants.len());
        for v in &self.variants {
            if v.sites.is_empty() {
                parts.push("0".to_string());
                continue;
            }
            let mut code = String::new();
            for s in &v.sites {
                code.push_str(&ranks[&s.key()].to_string());
                code.push(s.kind.symbol());
            }
            parts.push(code);
        }
        parts.join(",")
    }

    pub fn transcript_count(&self) -> usize {
        self.variants.iter().map(|v| v.transcript_ids.len()).sum()
    }

    /// Whether one variant holds exactly these transcripts.
    pub fn has_variant(&self, ids: &[&str]) -> bool {
        self.variants
            .iter()
            .any(|v| v.transcript_ids.len() == ids.len() && ids.iter().all(|id| v.transcript_ids.iter().any(|t| t == id)))
    }
}

/// Tab-separated: strand, source, sink, dimension, structure, transcripts
/// per variant (`/`-separated), sites per variant, frame summary.
impl fmt::Display for SplicingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transcripts: Vec<String> = self
            .variants
            .iter()
            .map(|v| v.transcript_ids.join(","))
            .collect();
        let sites: Vec<String> = self
            .variants
            .iter()
            .map(|v| {
                if v.sites.is_empty() {
                    "-".to_string()
                } else {
                    v.sites.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",")
                }
            })
            .collect();
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.strand.symbol(),
            self.src,
            self.snk,
            self.dimension,
            self.structure_code(),
            transcripts.join("/"),
            sites.join("/"),
            self.cds_summary.as_deref().unwrap_or(".")
        )
    }
}
