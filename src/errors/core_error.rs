use draft_core::DraftError;
use draft_persistence::PersistenceError;
use thiserror::Error;

/// Errores de infraestructura de la aplicación.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Error interno: {0}")]
    Internal(String),
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Error de borrador: {0}")]
    Draft(#[from] DraftError),
}
