use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::DRAFT_FORMAT_VERSION;
use crate::errors::DraftError;
use crate::hashing::hash_value;
use crate::key::DraftKey;

/// Sustrato clave-valor síncrono de texto (equivalente a un `localStorage`).
pub trait ScalarBackend: Send + Sync {
    /// `true` si las operaciones hacen I/O bloqueante (red, disco). La
    /// sesión las ejecuta entonces fuera del executor async.
    const BLOCKING_IO: bool = false;

    fn get(&self, key: &str) -> Result<Option<String>, DraftError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DraftError>;
    /// Idempotente.
    fn remove(&self, key: &str) -> Result<(), DraftError>;
    /// Claves que empiezan por `prefix`.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, DraftError>;
}

/// Backend en memoria. Opcionalmente limita el total de bytes almacenados
/// para simular la cuota del navegador.
#[derive(Default)]
pub struct InMemoryScalarBackend {
    inner: DashMap<String, String>,
    quota_bytes: Option<usize>,
    used: AtomicUsize,
}

impl InMemoryScalarBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { quota_bytes: Some(quota_bytes),
               ..Self::default() }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Bytes contabilizados contra la cuota.
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }
}

impl ScalarBackend for InMemoryScalarBackend {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        Ok(self.inner.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        // el lock de la entrada fija `previous` mientras se ajusta el total
        let entry = self.inner.entry(key.to_string());
        let previous = match &entry {
            Entry::Occupied(e) => e.get().len(),
            Entry::Vacant(_) => 0,
        };
        let quota = self.quota_bytes;
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let projected = used.saturating_sub(previous) + value.len();
                match quota {
                    Some(q) if projected > q => None,
                    _ => Some(projected),
                }
            })
            .map_err(|used| {
                let projected = used.saturating_sub(previous) + value.len();
                DraftError::StorageUnavailable(format!("quota exceeded ({projected} > {} bytes)",
                                                       quota.unwrap_or_default()))
            })?;
        entry.insert(value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        if let Some((_, old)) = self.inner.remove(key) {
            let _ = self.used
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| Some(used.saturating_sub(old.len())));
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, DraftError> {
        let mut keys: Vec<String> = self.inner
                                        .iter()
                                        .filter(|e| e.key().starts_with(prefix))
                                        .map(|e| e.key().clone())
                                        .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Sobre persistido del borrador escalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDraft {
    pub format_version: u32,
    pub key: DraftKey,
    /// Snapshot sin hojas binarias (`null` en su lugar).
    pub payload: Value,
    pub fingerprint: String,
    pub session_id: Option<Uuid>,
    pub saved_at: DateTime<Utc>,
}

/// Store escalar de borradores sobre un `ScalarBackend`.
///
/// `save` y `clear` son best-effort: registran el error y siguen. `load`
/// devuelve `None` ante ausencia, JSON ilegible, versión de formato distinta
/// o borrador vencido.
pub struct ScalarDraftStore<B: ScalarBackend> {
    backend: B,
    namespace: String,
    max_age: Option<Duration>,
}

impl<B: ScalarBackend> ScalarDraftStore<B> {
    pub fn new(backend: B, namespace: impl Into<String>) -> Self {
        Self { backend,
               namespace: namespace.into(),
               max_age: None }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn storage_key(&self, key: &DraftKey) -> String {
        format!("{}:{}", self.namespace, key.draft_id())
    }

    /// Variante que propaga el error (CLI, tests).
    pub fn try_save(&self, key: &DraftKey, payload: &Value, session_id: Option<Uuid>) -> Result<PersistedDraft, DraftError> {
        let draft = PersistedDraft { format_version: DRAFT_FORMAT_VERSION,
                                     key: key.clone(),
                                     payload: payload.clone(),
                                     fingerprint: hash_value(payload),
                                     session_id,
                                     saved_at: Utc::now() };
        let text = serde_json::to_string(&draft)?;
        self.backend.set(&self.storage_key(key), &text)?;
        Ok(draft)
    }

    /// Sobrescribe o crea el borrador de `key`. Devuelve `false` si no se
    /// pudo guardar (el error queda en el log).
    pub fn save(&self, key: &DraftKey, payload: &Value, session_id: Option<Uuid>) -> bool {
        match self.try_save(key, payload, session_id) {
            Ok(draft) => {
                debug!("scalar save ok key=[{key}] fingerprint={}", draft.fingerprint);
                true
            }
            Err(e) => {
                warn!("scalar save skipped key=[{key}] err={e}");
                false
            }
        }
    }

    /// Lectura que distingue ausencia de fallo.
    ///
    /// `Ok(None)` sólo si no hay borrador o si venció (y se borró). Un error
    /// del backend, JSON ilegible, otra versión de formato o una clave
    /// distinta devuelven `Err`: hay algo guardado que no se pudo leer.
    pub fn try_load(&self, key: &DraftKey) -> Result<Option<PersistedDraft>, DraftError> {
        let Some(text) = self.backend.get(&self.storage_key(key))? else {
            return Ok(None);
        };
        let draft: PersistedDraft = serde_json::from_str(&text)?;
        if draft.format_version != DRAFT_FORMAT_VERSION {
            return Err(DraftError::Serialization(format!("format_version={} no soportada", draft.format_version)));
        }
        if &draft.key != key {
            return Err(DraftError::Serialization(format!("clave almacenada [{}] distinta", draft.key)));
        }
        if let Some(max_age) = self.max_age {
            if Utc::now() - draft.saved_at > max_age {
                debug!("scalar load expired key=[{key}] saved_at={}", draft.saved_at);
                self.clear(key);
                return Ok(None);
            }
        }
        Ok(Some(draft))
    }

    /// Como `try_load`, pero cualquier fallo cuenta como ausencia (queda en
    /// el log).
    pub fn load(&self, key: &DraftKey) -> Option<PersistedDraft> {
        match self.try_load(key) {
            Ok(draft) => draft,
            Err(e) => {
                warn!("scalar load skipped key=[{key}] err={e}");
                None
            }
        }
    }

    /// Elimina el borrador; no falla si no existe.
    pub fn clear(&self, key: &DraftKey) {
        if let Err(e) = self.backend.remove(&self.storage_key(key)) {
            warn!("scalar clear failed key=[{key}] err={e}");
        }
    }

    /// Claves de borradores presentes en este namespace.
    pub fn list(&self) -> Result<Vec<DraftKey>, DraftError> {
        let prefix = format!("{}:", self.namespace);
        let keys = self.backend.keys(&prefix)?;
        Ok(keys.iter()
               .filter_map(|k| k.strip_prefix(&prefix))
               .filter_map(DraftKey::from_draft_id)
               .collect())
    }
}
