//! Reading-frame projection onto event variants.
//!
//! Annotated transcripts report the frames of the two anchor bases straight
//! from their CDS. Transcripts without a translation get a predicted code:
//! every coding frame seen in an annotated transcript of the same event is
//! tried as a hypothesis and the one giving the longest open region wins.

use std::collections::HashMap;
use std::fmt;

use crate::graph::SpliceGraph;
use crate::model::frame::{Frame, FrameCode};
use crate::model::site::SpliceSite;
use crate::model::transcript::Transcript;
use crate::sequence::GenomeSequence;
use crate::transcript_set::TranscriptSet;

const STOPS: [&[u8; 3]; 3] = [b"TAA", b"TAG", b"TGA"];
const START: &[u8; 3] = b"ATG";

fn is_stop(codon: &[u8]) -> bool {
    STOPS.iter().any(|s| codon == &s[..])
}

/// Frame hypothesis with the length of the open region it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    code: FrameCode,
    open: usize,
}

/// Continue a known 5' frame downstream until the first in-frame stop.
fn scan_forward(seq: &[u8], five: Frame) -> Option<Candidate> {
    let phase = usize::from(five.phase()?);
    let len = seq.len();
    if len == 0 {
        return None;
    }
    let mut x = (3 - phase) % 3;
    while x + 3 <= len {
        if is_stop(&seq[x..x + 3]) {
            // The stop codon belongs to the coding region.
            let three = if x + 2 >= len - 1 {
                Frame::from_phase((phase + len - 1) as u64)
            } else {
                Frame::Utr3
            };
            return Some(Candidate {
                code: FrameCode::new(five, three),
                open: x + 3,
            });
        }
        x += 3;
    }
    Some(Candidate {
        code: FrameCode::new(five, Frame::from_phase((phase + len - 1) as u64)),
        open: len,
    })
}

/// Walk a known 3' frame upstream to the nearest in-frame stop, then take
/// the first start codon after it.
fn scan_backward(seq: &[u8], three: Frame) -> Option<Candidate> {
    let t = i64::from(three.phase()?);
    let len = seq.len();
    if len == 0 {
        return None;
    }
    let last = len as i64 - 1;
    let phase_at = |x: usize| (t - (last - x as i64)).rem_euclid(3);

    // Highest codon start in frame.
    let mut x = len as i64 - 3;
    while x >= 0 && phase_at(x as usize) != 0 {
        x -= 1;
    }
    let mut stop = None;
    while x >= 0 {
        let xs = x as usize;
        if is_stop(&seq[xs..xs + 3]) {
            stop = Some(xs);
            break;
        }
        x -= 3;
    }

    let Some(stop) = stop else {
        return Some(Candidate {
            code: FrameCode::new(Frame::from_phase(phase_at(0) as u64), three),
            open: len,
        });
    };
    let mut a = stop + 3;
    while a + 3 <= len {
        if &seq[a..a + 3] == START {
            let five = if a == 0 { Frame::Zero } else { Frame::Utr5 };
            return Some(Candidate {
                code: FrameCode::new(five, three),
                open: len - a,
            });
        }
        a += 3;
    }
    None
}

/// Best frame code for a spliced sequence given the reference codes.
///
/// Longest open region wins; ties go to a code equal to a reference, then
/// to a coding code over the non-coding fallback, then to the earliest
/// candidate (forward hypotheses in reference order, then backward ones).
pub fn predict_from_sequence(seq: &[u8], refs: &[FrameCode]) -> FrameCode {
    let mut candidates: Vec<Candidate> = Vec::new();
    candidates.extend(refs.iter().filter_map(|r| scan_forward(seq, r.five())));
    candidates.extend(refs.iter().filter_map(|r| scan_backward(seq, r.three())));
    candidates.push(Candidate {
        code: FrameCode::NON_CODING,
        open: 0,
    });

    let rank = |c: &Candidate| (c.open, refs.contains(&c.code), !c.code.is_non_coding());
    let mut best = candidates[0];
    for c in &candidates[1..] {
        if rank(c) > rank(&best) {
            best = *c;
        }
    }
    best.code
}

/// Frame state of a group of transcripts inside one event variant.
#[derive(Debug, Clone)]
pub struct PartitionCds {
    pub transcripts: TranscriptSet,
    pub frame: FrameCode,
    /// Both anchor frames are known.
    pub valid: bool,
    /// Index of the variant the group belongs to.
    pub branch: usize,
    /// Frame-compatible groups of other variants, by index.
    pub companions: HashMap<usize, FrameCode>,
}

/// Same frames at both anchors, reached through different variants.
pub fn cds_valid53(a: &PartitionCds, b: &PartitionCds) -> bool {
    a.valid && b.valid && a.frame == b.frame && a.branch != b.branch
}

/// Coarse effect of an event on the reading frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameImpact {
    InFrame,
    Frameshift,
    Truncation,
    StartChange,
    Utr5,
    Utr3,
    NonCoding,
    Mixed,
}

impl FrameImpact {
    /// Classify the dominant code of every variant.
    pub fn classify(codes: &[FrameCode]) -> Self {
        let Some(first) = codes.first() else {
            return FrameImpact::Mixed;
        };
        if codes.iter().any(|c| !c.is_valid()) {
            return FrameImpact::Mixed;
        }
        if codes.iter().all(|c| c.is_non_coding()) {
            return FrameImpact::NonCoding;
        }
        if codes.iter().all(|c| c.five() == Frame::Utr5 && c.three() == Frame::Utr5) {
            return FrameImpact::Utr5;
        }
        if codes.iter().all(|c| c.five() == Frame::Utr3 && c.three() == Frame::Utr3) {
            return FrameImpact::Utr3;
        }
        let same_five = codes.iter().all(|c| c.five() == first.five());
        let same_three = codes.iter().all(|c| c.three() == first.three());
        match (same_five, same_three) {
            (true, true) => FrameImpact::InFrame,
            (true, false) if codes.iter().any(|c| c.three() == Frame::Utr3) => FrameImpact::Truncation,
            (true, false) => FrameImpact::Frameshift,
            (false, true) => FrameImpact::StartChange,
            (false, false) => FrameImpact::Mixed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FrameImpact::InFrame => "IN_FRAME",
            FrameImpact::Frameshift => "FRAMESHIFT",
            FrameImpact::Truncation => "TRUNCATION",
            FrameImpact::StartChange => "START_CHANGE",
            FrameImpact::Utr5 => "5UTR",
            FrameImpact::Utr3 => "3UTR",
            FrameImpact::NonCoding => "NON_CODING",
            FrameImpact::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for FrameImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Frame codes of the variants of one event.
#[derive(Debug, Clone)]
pub struct CdsAnnotation {
    pub groups: Vec<PartitionCds>,
    /// Per variant, the codes of its groups, largest group first.
    pub variant_codes: Vec<Vec<FrameCode>>,
    pub impact: FrameImpact,
}

impl CdsAnnotation {
    /// `"<IMPACT>:<code>,<code>..."` over the dominant code of each variant.
    pub fn summary(&self) -> String {
        let codes: Vec<String> = self
            .variant_codes
            .iter()
            .map(|c| c.first().map_or_else(|| FrameCode::UNINIT.to_string(), |c| c.to_string()))
            .collect();
        format!("{}:{}", self.impact, codes.join(","))
    }
}

pub struct CdsProjector<'g> {
    genome: Option<&'g dyn GenomeSequence>,
}

impl<'g> CdsProjector<'g> {
    pub fn new(genome: Option<&'g dyn GenomeSequence>) -> Self {
        Self { genome }
    }

    /// Frames of the anchor bases read from an annotated CDS.
    pub fn annotated_code(tx: &Transcript, src: &SpliceSite, snk: &SpliceSite) -> FrameCode {
        let frame = |s: &SpliceSite| {
            if s.is_sentinel() {
                return Frame::Uninit;
            }
            tx.frame_at(s.pos).unwrap_or(Frame::Uninit)
        };
        FrameCode::new(frame(src), frame(snk))
    }

    /// Predicted code of a transcript without translation.
    pub fn predict(
        &self,
        tx: &Transcript,
        src: &SpliceSite,
        snk: &SpliceSite,
        refs: &[FrameCode],
    ) -> FrameCode {
        if refs.is_empty() {
            return FrameCode::NON_CODING;
        }
        let Some(genome) = self.genome else {
            return FrameCode::NON_CODING;
        };
        if src.is_sentinel() || snk.is_sentinel() {
            return FrameCode::UNINIT;
        }
        match tx.spliced_sequence(genome, src.pos, snk.pos) {
            Some(seq) => predict_from_sequence(&seq, refs),
            None => FrameCode::UNINIT,
        }
    }

    /// Group each variant's transcripts by frame code and link compatible
    /// groups across variants.
    pub fn annotate(
        &self,
        graph: &SpliceGraph<'_>,
        src: &SpliceSite,
        snk: &SpliceSite,
        variants: &[TranscriptSet],
    ) -> CdsAnnotation {
        let mut refs: Vec<FrameCode> = Vec::new();
        for set in variants {
            for t in set.iter() {
                let tx = graph.transcript(t);
                if tx.is_coding() {
                    let code = Self::annotated_code(tx, src, snk);
                    if code.is_valid() && !refs.contains(&code) {
                        refs.push(code);
                    }
                }
            }
        }

        let mut groups: Vec<PartitionCds> = Vec::new();
        let mut variant_codes = Vec::with_capacity(variants.len());
        for (branch, set) in variants.iter().enumerate() {
            let mut by_code: Vec<(FrameCode, TranscriptSet)> = Vec::new();
            for t in set.iter() {
                let tx = graph.transcript(t);
                let code = if tx.is_coding() {
                    Self::annotated_code(tx, src, snk)
                } else {
                    self.predict(tx, src, snk, &refs)
                };
                match by_code.iter_mut().find(|(c, _)| *c == code) {
                    Some((_, s)) => s.insert(t),
                    None => by_code.push((code, TranscriptSet::encode(set.capacity(), t))),
                }
            }
            // Stable: ties keep first-seen order.
            by_code.sort_by(|a, b| b.1.popcount().cmp(&a.1.popcount()));
            variant_codes.push(by_code.iter().map(|(c, _)| *c).collect());
            groups.extend(by_code.into_iter().map(|(frame, transcripts)| PartitionCds {
                transcripts,
                frame,
                valid: frame.is_valid(),
                branch,
                companions: HashMap::new(),
            }));
        }

        for i in 0..groups.len() {
            for j in i + 1..groups.len() {
                if cds_valid53(&groups[i], &groups[j]) {
                    let frame = groups[i].frame;
                    groups[i].companions.insert(j, frame);
                    groups[j].companions.insert(i, frame);
                }
            }
        }

        let dominant: Vec<FrameCode> = variant_codes
            .iter()
            .map(|c: &Vec<FrameCode>| c.first().copied().unwrap_or(FrameCode::UNINIT))
            .collect();
        CdsAnnotation {
            groups,
            variant_codes,
            impact: FrameImpact::classify(&dominant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(five: Frame, three: Frame) -> FrameCode {
        FrameCode::new(five, three)
    }

    #[test]
    fn forward_scan_stops_at_first_in_frame_stop() {
        let refs = [code(Frame::Zero, Frame::Utr3)];
        assert_eq!(
            predict_from_sequence(b"ATGAAATAGCC", &refs),
            code(Frame::Zero, Frame::Utr3)
        );
        // Phase 1 at the anchor: the first full codon starts at offset 2.
        let refs = [code(Frame::One, Frame::Utr3)];
        assert_eq!(
            predict_from_sequence(b"CCAAATAAGG", &refs),
            code(Frame::One, Frame::Utr3)
        );
    }

    #[test]
    fn backward_scan_finds_the_start_after_the_stop() {
        // Codons from the 3' end: GGG AAA ATG TAA, with one leading base.
        let refs = [code(Frame::Utr5, Frame::Two)];
        assert_eq!(
            predict_from_sequence(b"GTAAATGAAAGGG", &refs),
            code(Frame::Utr5, Frame::Two)
        );
    }

    #[test]
    fn equal_lengths_prefer_a_reference_code() {
        let refs = [code(Frame::Zero, Frame::Utr3), code(Frame::One, Frame::Zero)];
        // No stop in any frame: every hypothesis spans all nine bases.
        assert_eq!(
            predict_from_sequence(b"CCCCCCCCC", &refs),
            code(Frame::One, Frame::Zero)
        );
    }

    #[test]
    fn no_reference_means_non_coding() {
        assert_eq!(predict_from_sequence(b"ATGCCC", &[]), FrameCode::NON_CODING);
    }

    #[test]
    fn impact_classes() {
        let a = code(Frame::Two, Frame::Two);
        let b = code(Frame::Two, Frame::Zero);
        let c = code(Frame::Two, Frame::Utr3);
        let d = code(Frame::Utr5, Frame::Two);
        assert_eq!(FrameImpact::classify(&[a, a]), FrameImpact::InFrame);
        assert_eq!(FrameImpact::classify(&[a, b]), FrameImpact::Frameshift);
        assert_eq!(FrameImpact::classify(&[a, c]), FrameImpact::Truncation);
        assert_eq!(FrameImpact::classify(&[a, d]), FrameImpact::StartChange);
        assert_eq!(FrameImpact::classify(&[b, d]), FrameImpact::Mixed);
        assert_eq!(
            FrameImpact::classify(&[FrameCode::NON_CODING, FrameCode::NON_CODING]),
            FrameImpact::NonCoding
        );
        assert_eq!(
            FrameImpact::classify(&[code(Frame::Utr5, Frame::Utr5); 2]),
            FrameImpact::Utr5
        );
        assert_eq!(FrameImpact::classify(&[a, FrameCode::UNINIT]), FrameImpact::Mixed);
    }

    #[test]
    fn compatible_groups_need_different_branches() {
        let mk = |branch, frame| PartitionCds {
            transcripts: TranscriptSet::encode(2, branch),
            frame,
            valid: frame.is_valid(),
            branch,
            companions: HashMap::new(),
        };
        let a = mk(0, code(Frame::Zero, Frame::Zero));
        let b = mk(1, code(Frame::Zero, Frame::Zero));
        let c = mk(1, code(Frame::Zero, Frame::One));
        assert!(cds_valid53(&a, &b));
        assert!(!cds_valid53(&a, &c));
        assert!(!cds_valid53(&a, &a.clone()));
    }
}
