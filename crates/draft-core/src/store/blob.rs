use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::{OnceCell, RwLock};

use crate::assembler::BlobMap;
use crate::errors::DraftError;

/// Store binaria asíncrona y transaccional (equivalente a un object store de
/// IndexedDB). Cada registro es `{id, images, saved_at}`; el último commit
/// gana.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Abre/crea el sustrato. Idempotente; las demás operaciones lo invocan
    /// perezosamente.
    async fn init(&self) -> Result<(), DraftError>;

    /// Upsert atómico del registro de `draft_id`. Un mapa vacío no deja
    /// registro: `load_images` devuelve después `None`.
    async fn save_images(&self, draft_id: &str, images: &BlobMap) -> Result<(), DraftError>;

    async fn load_images(&self, draft_id: &str) -> Result<Option<BlobMap>, DraftError>;

    /// Resuelve aunque el registro no exista.
    async fn delete_images(&self, draft_id: &str) -> Result<(), DraftError>;
}

#[derive(Debug, Clone)]
pub struct BlobRecord {
    pub id: String,
    pub images: BlobMap,
    pub saved_at: DateTime<Utc>,
}

/// Backend en memoria con la misma semántica que el durable.
#[derive(Default)]
pub struct InMemoryBlobStore {
    namespace: String,
    opened: OnceCell<()>,
    records: RwLock<HashMap<String, BlobRecord>>,
}

impl InMemoryBlobStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(),
               ..Self::default() }
    }

    fn record_key(&self, draft_id: &str) -> String {
        format!("{}:{draft_id}", self.namespace)
    }

    pub fn is_open(&self) -> bool {
        self.opened.initialized()
    }

    pub async fn record(&self, draft_id: &str) -> Option<BlobRecord> {
        self.records.read().await.get(&self.record_key(draft_id)).cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn init(&self) -> Result<(), DraftError> {
        self.opened
            .get_or_init(|| async {
                debug!("blob store open namespace={}", self.namespace);
            })
            .await;
        Ok(())
    }

    async fn save_images(&self, draft_id: &str, images: &BlobMap) -> Result<(), DraftError> {
        self.init().await?;
        if images.is_empty() {
            self.records.write().await.remove(&self.record_key(draft_id));
            debug!("blob save draft_id={draft_id} count=0 (record removed)");
            return Ok(());
        }
        let record = BlobRecord { id: draft_id.to_string(),
                                  images: images.clone(),
                                  saved_at: Utc::now() };
        self.records.write().await.insert(self.record_key(draft_id), record);
        debug!("blob save draft_id={draft_id} count={}", images.len());
        Ok(())
    }

    async fn load_images(&self, draft_id: &str) -> Result<Option<BlobMap>, DraftError> {
        self.init().await?;
        Ok(self.records.read().await.get(&self.record_key(draft_id)).map(|r| r.images.clone()))
    }

    async fn delete_images(&self, draft_id: &str) -> Result<(), DraftError> {
        self.init().await?;
        self.records.write().await.remove(&self.record_key(draft_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BinaryValue;

    fn images() -> BlobMap {
        let mut m = BlobMap::new();
        m.insert("fotos[0].frente".into(), BinaryValue::new("a.jpg", 1, None, vec![1, 2, 3]));
        m
    }

    #[tokio::test]
    async fn opens_lazily_and_init_is_idempotent() {
        let store = InMemoryBlobStore::new("t");
        assert!(!store.is_open());
        assert!(store.load_images("x").await.unwrap().is_none());
        assert!(store.is_open());
        store.init().await.unwrap();
        store.init().await.unwrap();
    }

    #[tokio::test]
    async fn save_overwrites_whole_record() {
        let store = InMemoryBlobStore::new("t");
        store.save_images("d1", &images()).await.unwrap();
        let mut other = BlobMap::new();
        other.insert("notas.adjunto".into(), BinaryValue::new("n.pdf", 2, None, vec![9]));
        store.save_images("d1", &other).await.unwrap();
        let loaded = store.load_images("d1").await.unwrap().unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["notas.adjunto"]);
        assert_eq!(store.record("d1").await.unwrap().id, "d1");
    }

    #[tokio::test]
    async fn saving_empty_map_leaves_no_record() {
        let store = InMemoryBlobStore::new("t");
        store.save_images("d1", &images()).await.unwrap();
        store.save_images("d1", &BlobMap::new()).await.unwrap();
        assert!(store.load_images("d1").await.unwrap().is_none());
        assert!(store.record("d1").await.is_none());
        store.save_images("d2", &BlobMap::new()).await.unwrap();
        assert!(store.load_images("d2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_resolves_even_when_absent() {
        let store = InMemoryBlobStore::new("t");
        store.delete_images("nada").await.unwrap();
        store.save_images("d1", &images()).await.unwrap();
        store.delete_images("d1").await.unwrap();
        assert!(store.load_images("d1").await.unwrap().is_none());
    }
}
