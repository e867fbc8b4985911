//! draft-persistence
//!
//! Backends Postgres (Diesel + r2d2) de las dos stores de borradores:
//! - `PgScalarBackend`: sustrato clave-valor síncrono para `ScalarDraftStore`.
//! - `PgBlobStore`: store binaria asíncrona; cada guardado reemplaza el
//!   registro completo dentro de una transacción.
//!
//! Módulos:
//! - `pg`: pool, proveedor de conexiones, retry y ambos backends.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig, DraftConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgBlobStore, PgPool, PgScalarBackend, PoolProvider};
