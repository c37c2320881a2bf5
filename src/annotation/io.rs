use std::collections::HashMap;
use std::io::BufRead;

use thiserror::Error;

use crate::types::Strand;

/// File dialect detected from attribute syntax.
///
/// - GFF3 typically uses: key=value;key2=value2
/// - GTF typically uses: key "value"; key2 "value2";
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Gff3,
    Gtf,
    Unknown,
}

/// A single parsed record line from GTF/GFF3.
///
/// Coordinates:
/// - `start0` is 0-based start
/// - `end0` is 0-based end (half-open)
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub seqname: String,      // chromosome / contig
    pub source: String,       // column 2
    pub feature_type: String, // column 3
    pub start0: u32,          // 0-based start
    pub end0: u32,            // 0-based end (half-open)
    pub score: Option<f32>,   // '.' => None
    pub strand: Strand,       // + / - / . / ?
    pub phase: Option<u8>,    // '.' => None, else 0/1/2
    pub attrs: HashMap<String, String>,
    pub dialect: Dialect,
    /// 1-based line number in the input.
    pub line_no: usize,
}

impl AnnotationRecord {
    /// Convenience: get an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(|s| s.as_str())
    }

    pub fn is_feature(&self, types: &[String]) -> bool {
        types.iter().any(|t| t == &self.feature_type)
    }

    pub fn pick_first_attr(&self, keys: &[String]) -> Option<String> {
        for k in keys {
            if let Some(v) = self.attr(k) {
                let v = v.trim();
                if !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
        None
    }
}

/// Parsing errors for GTF/GFF3.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error while reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line_no}: malformed GTF/GFF line ({problem}): {preview}")]
    MalformedLine {
        line_no: usize,
        problem: &'static str,
        preview: String,
    },

    #[error("line {line_no}: bad coordinates: {preview}")]
    BadCoordinates { line_no: usize, preview: String },

    #[error("line {line_no}: missing {expected} attribute (tried keys: {tried:?})")]
    MissingAttribute {
        line_no: usize,
        expected: &'static str,
        tried: Vec<String>,
    },
}

const PREVIEW_LEN: usize = 120;

fn preview(line: &str) -> String {
    match line.char_indices().nth(PREVIEW_LEN) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

/// Low-level streaming parser for GTF/GFF3 files.
///
/// Most users should **not** use this directly.
/// Instead, use [`crate::annotation::AnnotationBuilder`] to build a full
/// `AnnotationCatalog` from a file in one step.
///
/// # Example (high-level usage)
/// ```no_run
/// use gtf_splice_graph::AnnotationBuilder;
///
/// let catalog = AnnotationBuilder::new()
///     .build_from_path("genes.gtf")
///     .unwrap();
/// ```
///
/// # Example (streaming low-level usage)
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use gtf_splice_graph::annotation::io::AnnotationReader;
///
/// let file = File::open("genes.gtf").unwrap();
/// let reader = BufReader::new(file);
///
/// let rdr = AnnotationReader::new(reader);
/// for rec in rdr.records() {
///     let rec = rec.unwrap();
///     println!("{} {}-{}", rec.seqname, rec.start0, rec.end0);
/// }
/// ```
pub struct AnnotationReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
    path: String,
}

impl<R: BufRead> AnnotationReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
            path: "<reader>".to_string(),
        }
    }

    /// Name reported in I/O errors.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns an iterator over parsed records.
    ///
    /// - Skips blank lines
    /// - Skips comment lines starting with '#'
    pub fn records(mut self) -> impl Iterator<Item = Result<AnnotationRecord, ParseError>> {
        std::iter::from_fn(move || loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    return Some(Err(ParseError::Io {
                        path: self.path.clone(),
                        source: e,
                    }))
                }
            }

            let line = self.buf.trim_end_matches(&['\n', '\r'][..]);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            return Some(parse_record_line(line, self.line_no));
        })
    }
}

/// Parse a single non-comment line into an `AnnotationRecord`.
pub fn parse_record_line(line: &str, line_no: usize) -> Result<AnnotationRecord, ParseError> {
    let malformed = |problem: &'static str| ParseError::MalformedLine {
        line_no,
        problem,
        preview: preview(line),
    };
    let bad_coordinates = || ParseError::BadCoordinates {
        line_no,
        preview: preview(line),
    };

    // GTF/GFF have 9 tab-separated columns:
    // seqname source feature start end score strand phase attributes
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() != 9 {
        return Err(malformed("expected 9 tab-separated columns"));
    }
    let [seqname, source, feature_type, start_s, end_s, score_s, strand_s, phase_s, attrs_s] =
        [cols[0], cols[1], cols[2], cols[3], cols[4], cols[5], cols[6], cols[7], cols[8]];

    // Coordinates: input is 1-based inclusive; convert to 0-based half-open [start-1, end)
    let start_1: u32 = start_s.parse().map_err(|_| bad_coordinates())?;
    let end_1: u32 = end_s.parse().map_err(|_| bad_coordinates())?;
    if start_1 == 0 || end_1 < start_1 {
        return Err(bad_coordinates());
    }

    let score = if score_s == "." {
        None
    } else {
        Some(score_s.parse::<f32>().map_err(|_| malformed("score is not a number"))?)
    };

    let strand = match strand_s {
        "+" => Strand::Plus,
        "-" => Strand::Minus,
        "." | "?" => Strand::Unknown,
        _ => return Err(malformed("strand must be one of + - . ?")),
    };

    let phase = match phase_s {
        "." => None,
        "0" => Some(0),
        "1" => Some(1),
        "2" => Some(2),
        _ => return Err(malformed("phase must be . or 0-2")),
    };

    let (dialect, attrs) = parse_attributes(attrs_s);

    Ok(AnnotationRecord {
        seqname: seqname.to_string(),
        source: source.to_string(),
        feature_type: feature_type.to_string(),
        start0: start_1 - 1,
        end0: end_1,
        score,
        strand,
        phase,
        attrs,
        dialect,
        line_no,
    })
}

/// Parse the attributes field for either GFF3 or GTF.
///
/// Returns (Dialect, map).
///
/// Heuristics:
/// - If it contains '=' => treat as GFF3
/// - Else if it contains quotes => treat as GTF
/// - Else Unknown, but parse best-effort
pub fn parse_attributes(s: &str) -> (Dialect, HashMap<String, String>) {
    let s = s.trim();

    let dialect = if s.contains('=') {
        Dialect::Gff3
    } else if s.contains('"') {
        Dialect::Gtf
    } else {
        Dialect::Unknown
    };

    let mut map = HashMap::new();

    match dialect {
        Dialect::Gff3 => {
            for part in s.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let mut kv = part.splitn(2, '=');
                let k = kv.next().unwrap_or("").trim();
                let v = kv.next().unwrap_or("").trim();
                if !k.is_empty() {
                    map.insert(k.to_string(), unquote(v));
                }
            }
        }
        Dialect::Gtf => {
            // Split by ';' then parse key + rest (quoted or not)
            for part in s.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let mut it = part.splitn(2, char::is_whitespace);
                let key = it.next().unwrap_or("").trim();
                let rest = it.next().unwrap_or("").trim();

                if key.is_empty() {
                    continue;
                }
                let value = unquote(rest);
                if !value.is_empty() {
                    map.insert(key.to_string(), value);
                }
            }
        }
        Dialect::Unknown => {
            for part in s.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                if part.contains('=') {
                    let mut kv = part.splitn(2, '=');
                    let k = kv.next().unwrap_or("").trim();
                    let v = kv.next().unwrap_or("").trim();
                    if !k.is_empty() {
                        map.insert(k.to_string(), unquote(v));
                    }
                } else {
                    let mut it = part.splitn(2, char::is_whitespace);
                    let key = it.next().unwrap_or("").trim();
                    let rest = it.next().unwrap_or("").trim();
                    if !key.is_empty() && !rest.is_empty() {
                        map.insert(key.to_string(), unquote(rest));
                    }
                }
            }
        }
    }

    (dialect, map)
}

fn unquote(v: &str) -> String {
    let v = v.trim();
    let v = v.strip_prefix('"').unwrap_or(v);
    let v = v.strip_suffix('"').unwrap_or(v);
    v.to_string()
}
