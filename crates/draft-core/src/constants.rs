//! Constantes del subsistema de borradores.
//!
//! `DRAFT_FORMAT_VERSION` forma parte del sobre persistido: un borrador
//! escrito con otra versión se considera ausente al cargar.

/// Versión del formato del sobre escalar.
pub const DRAFT_FORMAT_VERSION: u32 = 1;

/// Retardo de debounce por defecto (ms).
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Antigüedad máxima por defecto de un borrador (30 días).
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24 * 30;

/// Namespace por defecto de ambas stores.
pub const DEFAULT_NAMESPACE: &str = "sabio";

/// Prefijo del identificador de borrador del wizard de diagnóstico.
pub const DRAFT_ID_PREFIX: &str = "diagnostico-draft";
