use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use draft_core::{DraftError, ScalarBackend};
use log::debug;

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::draft_scalars;

#[derive(Insertable, Debug)]
#[diesel(table_name = draft_scalars)]
struct NewScalarRow<'a> {
    storage_key: &'a str,
    payload: &'a str,
    updated_at: chrono::DateTime<Utc>,
}

/// Sustrato escalar durable: una fila por clave de almacenamiento.
pub struct PgScalarBackend<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgScalarBackend<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

/// Escapa los comodines de LIKE (`\` es el escape por defecto en Postgres).
fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

impl<P: ConnectionProvider> ScalarBackend for PgScalarBackend<P> {
    const BLOCKING_IO: bool = true;

    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            draft_scalars::table.filter(draft_scalars::storage_key.eq(key))
                                .select(draft_scalars::payload)
                                .first::<String>(&mut conn)
                                .optional()
                                .map_err(PersistenceError::from)
        }).map_err(PersistenceError::into_scalar)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let row = NewScalarRow { storage_key: key,
                                     payload: value,
                                     updated_at: Utc::now() };
            diesel::insert_into(draft_scalars::table).values(&row)
                                                     .on_conflict(draft_scalars::storage_key)
                                                     .do_update()
                                                     .set((draft_scalars::payload.eq(excluded(draft_scalars::payload)),
                                                           draft_scalars::updated_at.eq(excluded(draft_scalars::updated_at))))
                                                     .execute(&mut conn)?;
            Ok(())
        }).map_err(PersistenceError::into_scalar)?;
        debug!("pg scalar set key={key} bytes={}", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(draft_scalars::table.filter(draft_scalars::storage_key.eq(key))).execute(&mut conn)?;
            Ok(())
        }).map_err(PersistenceError::into_scalar)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, DraftError> {
        let pattern = like_prefix(prefix);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            draft_scalars::table.filter(draft_scalars::storage_key.like(pattern.as_str()))
                                .select(draft_scalars::storage_key)
                                .order(draft_scalars::storage_key.asc())
                                .load::<String>(&mut conn)
                                .map_err(PersistenceError::from)
        }).map_err(PersistenceError::into_scalar)
    }
}
