use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use draft_core::hashing::sha256_hex;
use draft_core::{BinaryValue, BlobMap, BlobStore, DraftError};
use log::{debug, warn};
use tokio::sync::OnceCell;

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::draft_images;

/// Fila de `draft_images` para inserción.
///
/// `sha256` se calcula al escribir y se verifica al leer; una imagen cuyo
/// contenido no coincide se descarta en la carga.
#[derive(Insertable, Debug)]
#[diesel(table_name = draft_images)]
struct NewImageRow {
    namespace: String,
    draft_id: String,
    path: String,
    name: String,
    size: i64,
    last_modified: i64,
    mime_type: Option<String>,
    content: Vec<u8>,
    sha256: String,
    saved_at: DateTime<Utc>,
}

/// Fila mapeada de `draft_images` (orden de columnas del schema).
#[derive(Queryable, Debug)]
#[allow(dead_code)]
struct ImageRow {
    namespace: String,
    draft_id: String,
    path: String,
    name: String,
    size: i64,
    last_modified: i64,
    mime_type: Option<String>,
    content: Vec<u8>,
    sha256: String,
    saved_at: DateTime<Utc>,
}

/// Store binaria durable sobre Postgres.
///
/// Las operaciones Diesel son bloqueantes, así que cada una corre en
/// `spawn_blocking`. `init` corre las migraciones una sola vez por instancia.
pub struct PgBlobStore<P: ConnectionProvider> {
    provider: Arc<P>,
    namespace: String,
    migrated: OnceCell<()>,
}

impl<P: ConnectionProvider> PgBlobStore<P> {
    pub fn new(provider: P, namespace: impl Into<String>) -> Self {
        Self { provider: Arc::new(provider),
               namespace: namespace.into(),
               migrated: OnceCell::new() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, DraftError>
        where F: FnOnce(&P) -> Result<T, PersistenceError> + Send + 'static,
              T: Send + 'static
    {
        self.init().await?;
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || f(provider.as_ref())).await
                                                         .map_err(|e| PersistenceError::Unknown(format!("join: {e}")))
                                                         .and_then(|r| r)
                                                         .map_err(PersistenceError::into_blob)
    }
}

fn to_rows(namespace: &str, draft_id: &str, images: &BlobMap) -> Vec<NewImageRow> {
    let saved_at = Utc::now();
    images.iter()
          .map(|(path, blob)| NewImageRow { namespace: namespace.to_string(),
                                            draft_id: draft_id.to_string(),
                                            path: path.clone(),
                                            name: blob.name.clone(),
                                            size: blob.size as i64,
                                            last_modified: blob.last_modified,
                                            mime_type: blob.mime_type.clone(),
                                            content: blob.bytes.as_ref().clone(),
                                            sha256: sha256_hex(&blob.bytes),
                                            saved_at })
          .collect()
}

fn from_rows(rows: Vec<ImageRow>) -> BlobMap {
    let mut images = BlobMap::new();
    for row in rows {
        if sha256_hex(&row.content) != row.sha256 || row.content.len() as i64 != row.size {
            warn!("pg blob load: digest mismatch draft_id={} path={} -> skipped", row.draft_id, row.path);
            continue;
        }
        let blob = BinaryValue { name: row.name,
                                 size: row.size as u64,
                                 last_modified: row.last_modified,
                                 mime_type: row.mime_type,
                                 bytes: Arc::new(row.content) };
        images.insert(row.path, blob);
    }
    images
}

#[async_trait]
impl<P: ConnectionProvider> BlobStore for PgBlobStore<P> {
    async fn init(&self) -> Result<(), DraftError> {
        let provider = self.provider.clone();
        self.migrated
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || {
                    let mut conn = provider.connection()?;
                    run_pending_migrations(&mut conn)
                }).await
                  .map_err(|e| PersistenceError::Unknown(format!("join: {e}")))
                  .and_then(|r| r)
                  .map_err(PersistenceError::into_blob)
            })
            .await?;
        Ok(())
    }

    async fn save_images(&self, draft_id: &str, images: &BlobMap) -> Result<(), DraftError> {
        let rows = to_rows(&self.namespace, draft_id, images);
        let namespace = self.namespace.clone();
        let id = draft_id.to_string();
        let count = rows.len();
        self.blocking(move |provider| {
                with_retry(|| {
                    let mut conn = provider.connection()?;
                    conn.build_transaction()
                        .read_write()
                        .run(|tx| {
                            // reemplazo completo: el último commit gana
                            diesel::delete(draft_images::table.filter(draft_images::namespace.eq(namespace.as_str()))
                                                              .filter(draft_images::draft_id.eq(id.as_str()))).execute(tx)?;
                            if !rows.is_empty() {
                                diesel::insert_into(draft_images::table).values(&rows).execute(tx)?;
                            }
                            Ok::<_, diesel::result::Error>(())
                        })
                        .map_err(PersistenceError::from)
                })
            })
            .await?;
        debug!("pg blob save draft_id={draft_id} count={count}");
        Ok(())
    }

    async fn load_images(&self, draft_id: &str) -> Result<Option<BlobMap>, DraftError> {
        let namespace = self.namespace.clone();
        let id = draft_id.to_string();
        let rows = self.blocking(move |provider| {
                           with_retry(|| {
                               let mut conn = provider.connection()?;
                               draft_images::table.filter(draft_images::namespace.eq(namespace.as_str()))
                                                  .filter(draft_images::draft_id.eq(id.as_str()))
                                                  .order(draft_images::path.asc())
                                                  .load::<ImageRow>(&mut conn)
                                                  .map_err(PersistenceError::from)
                           })
                       })
                       .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(from_rows(rows)))
    }

    async fn delete_images(&self, draft_id: &str) -> Result<(), DraftError> {
        let namespace = self.namespace.clone();
        let id = draft_id.to_string();
        let deleted = self.blocking(move |provider| {
                              with_retry(|| {
                                  let mut conn = provider.connection()?;
                                  diesel::delete(draft_images::table.filter(draft_images::namespace.eq(namespace.as_str()))
                                                                    .filter(draft_images::draft_id.eq(id.as_str())))
                                      .execute(&mut conn)
                                      .map_err(PersistenceError::from)
                              })
                          })
                          .await?;
        debug!("pg blob delete draft_id={draft_id} rows={deleted}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_for(path: &str, content: Vec<u8>, sha: String) -> ImageRow {
        ImageRow { namespace: "t".into(),
                   draft_id: "d".into(),
                   path: path.into(),
                   name: "f.jpg".into(),
                   size: content.len() as i64,
                   last_modified: 7,
                   mime_type: Some("image/jpeg".into()),
                   content,
                   sha256: sha,
                   saved_at: Utc::now() }
    }

    #[test]
    fn rows_carry_metadata_and_digest() {
        let mut images = BlobMap::new();
        images.insert("fotos[0].frente".into(), BinaryValue::new("f.jpg", 7, None, vec![1, 2, 3]));
        let rows = to_rows("sabio", "diagnostico-draft/a/b", &images);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "fotos[0].frente");
        assert_eq!(rows[0].size, 3);
        assert_eq!(rows[0].sha256, sha256_hex(&[1, 2, 3]));
    }

    #[test]
    fn corrupted_rows_are_skipped_on_load() {
        let good = row_for("a", vec![9, 9], sha256_hex(&[9, 9]));
        let bad = row_for("b", vec![1], sha256_hex(&[2]));
        let images = from_rows(vec![good, bad]);
        assert_eq!(images.len(), 1);
        assert_eq!(images["a"].last_modified, 7);
        assert_eq!(images["a"].bytes.as_slice(), &[9, 9]);
    }
}
