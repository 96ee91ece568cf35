//! Decoder for PCD point-cloud files.
//!
//! Handles the `ascii`, `binary` and `binary_compressed` payload encodings
//! and any field layout, pulling out positions, the reflectance column and,
//! when present, a per-point label column.

mod cloud;
mod error;
mod field;
mod header;
mod lzf;
mod payload;

pub use cloud::PointCloud;
pub use error::{PcdError, Result};
pub use field::{FieldDef, FieldKind};
pub use header::{DataEncoding, PcdHeader, Viewpoint};
