//! Alternative-splicing events: partition walk, frame projection and output.

pub mod cds;
pub mod engine;
pub mod event;
pub mod partition;
pub mod sink;

pub use cds::{CdsAnnotation, CdsProjector, FrameImpact, PartitionCds};
pub use engine::{EventEngine, WalkStats};
pub use event::{EventVariant, SplicingEvent};
pub use partition::{Partition, PartitionArena, PartitionId, PartitionSet, SetId};
pub use sink::{EventProducer, EventSink, EventWriter, SinkConfig, TsvWriter};
