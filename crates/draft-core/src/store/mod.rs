//! Stores de borradores: escalar (síncrona, texto) y binaria (asíncrona,
//! transaccional). Ambas se direccionan exclusivamente por `DraftKey` y se
//! inyectan en la sesión, nunca como singletons globales.

mod blob;
mod scalar;

pub use blob::{BlobRecord, BlobStore, InMemoryBlobStore};
pub use scalar::{InMemoryScalarBackend, PersistedDraft, ScalarBackend, ScalarDraftStore};
