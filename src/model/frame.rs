use std::fmt;

/// Reading-frame classification of a single exonic base.
///
/// `Zero`/`One`/`Two` give the codon position of the base inside a coding
/// sequence; the other values classify bases outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Frame {
    Zero = 0,
    One = 1,
    Two = 2,
    Utr5 = 3,
    Utr3 = 4,
    NonCoding = 5,
    Uninit = 6,
}

impl Frame {
    /// Codon position for an offset into a coding sequence.
    pub fn from_phase(phase: u64) -> Self {
        match phase % 3 {
            0 => Frame::Zero,
            1 => Frame::One,
            _ => Frame::Two,
        }
    }

    fn from_nibble(v: u8) -> Self {
        match v {
            0 => Frame::Zero,
            1 => Frame::One,
            2 => Frame::Two,
            3 => Frame::Utr5,
            4 => Frame::Utr3,
            5 => Frame::NonCoding,
            _ => Frame::Uninit,
        }
    }

    #[inline]
    pub fn is_coding(self) -> bool {
        matches!(self, Frame::Zero | Frame::One | Frame::Two)
    }

    /// Codon position of a coding base.
    pub fn phase(self) -> Option<u8> {
        self.is_coding().then_some(self as u8)
    }

    pub fn label(self) -> &'static str {
        match self {
            Frame::Zero => "0",
            Frame::One => "1",
            Frame::Two => "2",
            Frame::Utr5 => "5UTR",
            Frame::Utr3 => "3UTR",
            Frame::NonCoding => "NC",
            Frame::Uninit => "?",
        }
    }
}

/// Packed pair of frames at the 5' and 3' anchor of an event.
///
/// The 5' frame occupies the high nibble, the 3' frame the low one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameCode(u8);

impl FrameCode {
    pub const UNINIT: FrameCode = FrameCode(((Frame::Uninit as u8) << 4) | Frame::Uninit as u8);
    pub const NON_CODING: FrameCode =
        FrameCode(((Frame::NonCoding as u8) << 4) | Frame::NonCoding as u8);

    pub fn new(five: Frame, three: Frame) -> Self {
        FrameCode(((five as u8) << 4) | three as u8)
    }

    #[inline]
    pub fn five(self) -> Frame {
        Frame::from_nibble(self.0 >> 4)
    }

    #[inline]
    pub fn three(self) -> Frame {
        Frame::from_nibble(self.0 & 0x0f)
    }

    #[inline]
    pub fn packed(self) -> u8 {
        self.0
    }

    /// Both frames are known.
    pub fn is_valid(self) -> bool {
        self.five() != Frame::Uninit && self.three() != Frame::Uninit
    }

    pub fn is_non_coding(self) -> bool {
        self.five() == Frame::NonCoding && self.three() == Frame::NonCoding
    }
}

impl fmt::Display for FrameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.five().label(), self.three().label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_packs_and_unpacks() {
        let c = FrameCode::new(Frame::Two, Frame::Utr3);
        assert_eq!(c.five(), Frame::Two);
        assert_eq!(c.three(), Frame::Utr3);
        assert_eq!(c.packed(), 0x24);
        assert_eq!(c.to_string(), "2-3UTR");
        assert!(c.is_valid());
        assert!(!FrameCode::UNINIT.is_valid());
        assert!(FrameCode::NON_CODING.is_non_coding());
    }

    #[test]
    fn phases_wrap() {
        assert_eq!(Frame::from_phase(0), Frame::Zero);
        assert_eq!(Frame::from_phase(4), Frame::One);
        assert_eq!(Frame::from_phase(8), Frame::Two);
        assert_eq!(Frame::Utr5.phase(), None);
        assert_eq!(Frame::Two.phase(), Some(2));
    }
}
