//! Modelo de valores del wizard: árbol `DraftValue`, rutas, recorrido y
//! normalización.

mod normalize;
mod path;
mod types;
mod visit;

pub use normalize::{NormalizedSnapshot, NormalizedValue};
pub use path::{FieldPath, PathSegment};
pub use types::{BinaryValue, BlobMeta, DraftValue};
pub use visit::{traverse, LeafVisitor};
