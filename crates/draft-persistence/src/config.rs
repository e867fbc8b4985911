//! Carga de configuración desde variables de entorno.
//! - `DbConfig`: convención `DATABASE_URL` y parámetros opcionales de pool.
//! - `DraftConfig`: parámetros del autosave (debounce, vencimiento,
//!   namespace).

use std::env;

use chrono::Duration;
use dotenvy::dotenv;
use draft_core::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_AGE_HOURS, DEFAULT_NAMESPACE};
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Config("DATABASE_URL no definido".into()))?;
        let min_connections = parse_var("DATABASE_MIN_CONNECTIONS").unwrap_or(2);
        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(16);
        Ok(Self { url,
                  min_connections,
                  max_connections })
    }
}

/// Parámetros del autosave de borradores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftConfig {
    pub debounce_ms: u64,
    /// `0` desactiva el vencimiento.
    pub max_age_hours: i64,
    pub namespace: String,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self { debounce_ms: DEFAULT_DEBOUNCE_MS,
               max_age_hours: DEFAULT_MAX_AGE_HOURS,
               namespace: DEFAULT_NAMESPACE.to_string() }
    }
}

impl DraftConfig {
    /// Valores inválidos o ausentes caen al default.
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        let namespace = env::var("SABIO_DRAFT_NAMESPACE").ok()
                                                         .map(|v| v.trim().to_string())
                                                         .filter(|v| !v.is_empty())
                                                         .unwrap_or(defaults.namespace);
        Self { debounce_ms: parse_var("SABIO_DRAFT_DEBOUNCE_MS").unwrap_or(defaults.debounce_ms),
               max_age_hours: parse_var::<i64>("SABIO_DRAFT_MAX_AGE_HOURS").filter(|h| *h >= 0)
                                                                           .unwrap_or(defaults.max_age_hours),
               namespace }
    }

    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_hours > 0).then(|| Duration::hours(self.max_age_hours))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
