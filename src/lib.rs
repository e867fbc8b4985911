//! SaBio drafts
//!
//! Librería de aplicación sobre `draft-core` y `draft-persistence`:
//! - `config`: `AppConfig` (base de datos + parámetros de autosave).
//! - `errors`: errores de núcleo y dominio.
//! - `wiring`: armado de stores y sesiones de borrador.

pub mod config;
pub mod errors;
pub mod wiring;

pub use config::AppConfig;
pub use errors::{CoreError, DomainError};
pub use wiring::DraftStores;
