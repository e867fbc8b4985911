use draft_core::DraftError;
use thiserror::Error;

/// Errores del dominio de borradores visibles para el llamador del wizard.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validación fallida: {0}")]
    Validation(String),
    #[error("Error genérico de dominio: {0}")]
    Generic(String),
}

impl From<DraftError> for DomainError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::InvalidKey(_) | DraftError::InvalidPath { .. } => Self::Validation(err.to_string()),
            other => Self::Generic(other.to_string()),
        }
    }
}
