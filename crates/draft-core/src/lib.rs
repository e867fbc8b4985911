//! draft-core: persistencia y recuperación de borradores del wizard de
//! diagnóstico.
//!
//! Piezas (de la hoja hacia arriba):
//! - `store`: store binaria (async) y store escalar (sync), inyectables.
//! - `debounce`: detector de cambios como máquina de estados con reloj
//!   inyectado.
//! - `assembler`: recolección de blobs por ruta y restauración del snapshot.
//! - `session` / `autosave`: integración para el wizard.
pub mod assembler;
pub mod autosave;
pub mod constants;
pub mod debounce;
pub mod errors;
pub mod hashing;
pub mod key;
pub mod session;
pub mod store;
pub mod value;

pub use assembler::{collect_blobs, restore, strip_blobs, BlobMap};
pub use autosave::{spawn_autosave, AutosaveHandle};
pub use debounce::{Clock, DebounceState, Debouncer, ManualClock, TokioClock};
pub use errors::DraftError;
pub use key::DraftKey;
pub use session::{DraftSession, PersistOutcome, RecoveredDraft};
pub use store::{BlobStore, InMemoryBlobStore, InMemoryScalarBackend, PersistedDraft, ScalarBackend, ScalarDraftStore};
pub use value::{BinaryValue, BlobMeta, DraftValue, FieldPath, NormalizedSnapshot, PathSegment};
