pub mod builder;
pub mod catalog;
pub mod io;

pub use builder::AnnotationBuilder;
pub use catalog::{AnnotationCatalog, IdNameKeys, Locus};
pub use io::{AnnotationReader, AnnotationRecord, Dialect, ParseError};
