//! Compact binary encodings for per-point label sequences and object
//! instance lists, plus the point-to-instance lookup built from the latter.
//!
//! Both payloads share one envelope, see [`encode`] and [`decode`].

mod codec;
mod error;
mod instance;
mod labels;
mod objects;

pub use codec::{Annotation, BodyReader, MAX_ELEMENTS, PayloadKind, decode, decode_with_limit, encode, encode_to};
pub use error::{AnnotationError, Result};
pub use instance::InstanceIndex;
pub use labels::LabelSequence;
pub use objects::ObjectRecord;
