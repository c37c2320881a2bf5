pub mod frame;
pub mod gene;
pub mod site;
pub mod transcript;
pub mod types;

pub use frame::{Frame, FrameCode};
pub use site::{SiteKind, SpliceSite};
pub use types::{GeneId, SourceType, TranscriptId};
