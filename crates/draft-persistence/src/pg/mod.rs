//! Implementaciones Postgres (Diesel) de las stores de borradores.
//!
//! - `PgScalarBackend`: tabla `draft_scalars`, clave de texto → JSON.
//! - `PgBlobStore`: tabla `draft_images`, una fila por ruta de imagen; el
//!   registro de un borrador se reemplaza completo en una transacción.
//!
//! Los errores transitorios (pool, conexión cerrada, conflicto de
//! serialización) se reintentan aquí con backoff corto; lo que sobrevive se
//! convierte en `DraftError` y la sesión lo registra sin propagarlo.

mod blob;
mod scalar;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::warn;

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

pub use blob::PgBlobStore;
pub use scalar::PgScalarBackend;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real o un doble en tests sin acoplar a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl PoolProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Determina si un error es transitorio (reintentar con backoff).
pub(crate) fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // best-effort por texto, sin acoplar a SQLSTATE
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry con backoff muy pequeño: hasta 3 reintentos de 15, 30 y 45 ms.
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Construye el pool y corre las migraciones pendientes una vez.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_max = max_size.max(1);
    let validated_min = min_size.max(1);
    if validated_min > validated_max {
        warn!("pool min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee `DATABASE_URL` y tamaños, y
/// construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn transient_errors_are_retried_until_success() {
        let calls = Cell::new(0);
        let r = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(PersistenceError::TransientIo("pool timeout".into()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(r.unwrap(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let r: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::CheckViolation("size >= 0".into()))
        });
        assert!(r.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_gives_up_after_three_retries() {
        let calls = Cell::new(0);
        let r: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(PersistenceError::SerializationConflict)
        });
        assert!(matches!(r, Err(PersistenceError::SerializationConflict)));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn unknown_errors_are_classified_by_message() {
        assert!(is_retryable(&PersistenceError::Unknown("ERROR: deadlock detected".into())));
        assert!(!is_retryable(&PersistenceError::Unknown("syntax error".into())));
        assert!(!is_retryable(&PersistenceError::NotFound));
    }
}
