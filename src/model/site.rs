use std::cmp::Ordering;
use std::fmt;

use crate::model::types::SourceType;

/// Kind of boundary a site marks.
///
/// The declaration order is the tie-break between sites at the same position:
/// an exon that is a single base long starts before it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SiteKind {
    Root,
    Tss,
    Acceptor,
    Donor,
    Tes,
    Leaf,
}

impl SiteKind {
    /// Left flank of an exonic segment (segment starts here).
    #[inline]
    pub fn is_left_flank(self) -> bool {
        matches!(self, SiteKind::Tss | SiteKind::Acceptor | SiteKind::Leaf)
    }

    /// Right flank of an exonic segment (segment ends here).
    #[inline]
    pub fn is_right_flank(self) -> bool {
        !self.is_left_flank()
    }

    #[inline]
    pub fn is_splice(self) -> bool {
        matches!(self, SiteKind::Acceptor | SiteKind::Donor)
    }

    #[inline]
    pub fn is_sentinel(self) -> bool {
        matches!(self, SiteKind::Root | SiteKind::Leaf)
    }

    /// Symbol used in event structure codes.
    pub fn symbol(self) -> char {
        match self {
            SiteKind::Tss => '[',
            SiteKind::Acceptor => '-',
            SiteKind::Donor => '^',
            SiteKind::Tes => ']',
            SiteKind::Root | SiteKind::Leaf => '*',
        }
    }
}

/// Identity of a site inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteKey {
    pub pos: i64,
    pub kind: SiteKind,
}

/// A transcript boundary or splice site.
///
/// `pos` is the 1-based genomic coordinate multiplied by the strand sign, so
/// ascending `pos` runs 5' -> 3' on either strand. Acceptors and TSSs point at
/// the first base of their exon, donors and TESs at the last one.
///
/// Equality, hashing and ordering only look at `(pos, kind)`.
#[derive(Debug, Clone, Copy)]
pub struct SpliceSite {
    pub pos: i64,
    pub kind: SiteKind,
    pub source: SourceType,
    pub canonical: bool,
}

impl SpliceSite {
    pub fn new(pos: i64, kind: SiteKind, source: SourceType) -> Self {
        Self {
            pos,
            kind,
            source,
            canonical: true,
        }
    }

    pub fn root() -> Self {
        Self::new(i64::MIN, SiteKind::Root, 0)
    }

    pub fn leaf() -> Self {
        Self::new(i64::MAX, SiteKind::Leaf, 0)
    }

    #[inline]
    pub fn key(&self) -> SiteKey {
        SiteKey {
            pos: self.pos,
            kind: self.kind,
        }
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.kind.is_sentinel()
    }

    /// Unsigned 1-based genomic coordinate; `None` for the sentinels.
    pub fn genomic(&self) -> Option<u32> {
        if self.is_sentinel() {
            return None;
        }
        u32::try_from(self.pos.unsigned_abs()).ok()
    }
}

impl PartialEq for SpliceSite {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SpliceSite {}

impl std::hash::Hash for SpliceSite {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Ord for SpliceSite {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for SpliceSite {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SpliceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SiteKind::Root => write!(f, "ROOT"),
            SiteKind::Leaf => write!(f, "LEAF"),
            kind => write!(f, "{}{}", self.pos.unsigned_abs(), kind.symbol()),
        }
    }
}
