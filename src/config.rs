//! Configuración central de la aplicación.
//! Agrega la configuración de base de datos (opcional: sin `DATABASE_URL`
//! se trabaja en memoria) y la del autosave de borradores.
use draft_persistence::{init_dotenv, DbConfig, DraftConfig, PersistenceError};

use crate::errors::CoreError;

/// Configuración global de la aplicación.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` si `DATABASE_URL` no está definido.
    pub database: Option<DbConfig>,
    pub drafts: DraftConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        init_dotenv();
        let database = match DbConfig::from_env() {
            Ok(cfg) => Some(cfg),
            Err(PersistenceError::Config(_)) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self { database,
                  drafts: DraftConfig::from_env() })
    }

    /// Variante sin base de datos (tests, demo en memoria).
    pub fn in_memory(drafts: DraftConfig) -> Self {
        Self { database: None,
               drafts }
    }

    /// Exige configuración de base de datos.
    pub fn require_database(&self) -> Result<&DbConfig, CoreError> {
        self.database
            .as_ref()
            .ok_or_else(|| CoreError::Config("DATABASE_URL no definido".into()))
    }
}
