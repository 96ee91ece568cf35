mod error;
mod store;

pub use error::{Result, SourceError};
pub use store::{SampleFiles, SampleStore, SourceKind};
