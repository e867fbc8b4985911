//! Errores del core de borradores.
//!
//! Ninguno llega al usuario final: la sesión los registra y sigue. Los
//! backends los devuelven para que el llamador decida.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DraftError {
    #[error("invalid draft key: {0}")]
    InvalidKey(String),
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("blob store: {0}")]
    BlobStore(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DraftError {
    fn from(err: serde_json::Error) -> Self {
        DraftError::Serialization(err.to_string())
    }
}
