//! Sesión de borrador del wizard de diagnóstico.
//!
//! Une una `DraftKey` con las stores inyectadas y el `Debouncer`:
//! - `recover` reconstruye el snapshot al (re)entrar al wizard.
//! - `on_change` + `tick` implementan el autosave con debounce.
//! - `discard` / `complete` borran ambas stores.
//!
//! Todo es best-effort: ningún error de persistencia sale de aquí; se
//! registran y el wizard sigue. No hay transacción entre stores: si la
//! escritura binaria falla tras la escalar, la recuperación deja `null` en
//! las rutas sin imagen.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::{collect_blobs, restore, strip_blobs, BlobMap};
use crate::debounce::{Clock, Debouncer};
use crate::errors::DraftError;
use crate::key::DraftKey;
use crate::store::{BlobStore, PersistedDraft, ScalarBackend, ScalarDraftStore};
use crate::value::{DraftValue, NormalizedSnapshot};

/// Resultado de una escritura.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub scalar_saved: bool,
    pub blobs_saved: bool,
    pub blob_count: usize,
}

/// Borrador reconstruido al montar el wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredDraft {
    pub snapshot: DraftValue,
    pub saved_at: DateTime<Utc>,
    pub blob_count: usize,
}

pub struct DraftSession<B: ScalarBackend, C: Clock> {
    key: DraftKey,
    session_id: Uuid,
    scalars: Arc<ScalarDraftStore<B>>,
    blobs: Arc<dyn BlobStore>,
    debouncer: Debouncer<C>,
}

impl<B: ScalarBackend + 'static, C: Clock> DraftSession<B, C> {
    pub fn new(key: DraftKey,
               scalars: Arc<ScalarDraftStore<B>>,
               blobs: Arc<dyn BlobStore>,
               clock: C,
               debounce_ms: u64)
               -> Self {
        Self { key,
               session_id: Uuid::new_v4(),
               scalars,
               blobs,
               debouncer: Debouncer::new(clock, debounce_ms) }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn debouncer(&self) -> &Debouncer<C> {
        &self.debouncer
    }

    /// Deadline del timer pendiente (ms del reloj), si lo hay.
    pub fn deadline(&self) -> Option<u64> {
        self.debouncer.deadline()
    }

    /// Cambia de finca/usuario. Cancela lo pendiente; `false` si la clave no
    /// cambió.
    pub fn rekey(&mut self, key: DraftKey) -> bool {
        if key == self.key {
            return false;
        }
        debug!("session rekey from=[{}] to=[{key}]", self.key);
        self.debouncer.reset();
        self.key = key;
        true
    }

    /// Ejecuta `f` sobre la store escalar. Con un backend de I/O bloqueante
    /// corre en `spawn_blocking` para no frenar el executor (ni el timer).
    async fn with_scalars<F, T>(&self, f: F) -> Result<T, DraftError>
        where F: FnOnce(&ScalarDraftStore<B>) -> T + Send + 'static,
              T: Send + 'static
    {
        if !B::BLOCKING_IO {
            return Ok(f(self.scalars.as_ref()));
        }
        let scalars = self.scalars.clone();
        tokio::task::spawn_blocking(move || f(scalars.as_ref())).await
                                                                .map_err(|e| DraftError::Internal(format!("scalar join: {e}")))
    }

    async fn load_scalar(&self) -> Result<Option<PersistedDraft>, DraftError> {
        let key = self.key.clone();
        self.with_scalars(move |s| s.try_load(&key)).await?
    }

    /// Lee ambas stores y reconstruye el snapshot completo. Si la store
    /// binaria falla se recupera sólo la parte escalar.
    pub async fn recover(&mut self) -> Option<RecoveredDraft> {
        let draft_id = self.key.draft_id();
        let draft = match self.load_scalar().await {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                // ausencia confirmada: un registro binario suelto no sirve
                if let Err(e) = self.blobs.delete_images(&draft_id).await {
                    debug!("recover: orphan blob cleanup failed key=[{}] err={e}", self.key);
                }
                return None;
            }
            Err(e) => {
                // algo guardado no se pudo leer; las imágenes se conservan
                warn!("recover: scalar draft unreadable key=[{}] err={e}", self.key);
                return None;
            }
        };
        let images = match self.blobs.load_images(&draft_id).await {
            Ok(Some(images)) => images,
            Ok(None) => BlobMap::new(),
            Err(e) => {
                warn!("recover: blob load failed key=[{}] err={e}; scalar-only recovery", self.key);
                BlobMap::new()
            }
        };
        let snapshot = restore(&DraftValue::from(draft.payload), &images);
        self.debouncer.prime(&snapshot);
        info!("recover: key=[{}] saved_at={} blobs={}", self.key, draft.saved_at, images.len());
        Some(RecoveredDraft { snapshot,
                              saved_at: draft.saved_at,
                              blob_count: images.len() })
    }

    /// Registra una edición. `true` si fue un cambio semántico.
    pub fn on_change(&mut self, snapshot: &DraftValue) -> bool {
        self.debouncer.observe(snapshot)
    }

    /// Persiste si venció el debounce. Devuelve el resultado de la escritura.
    pub async fn tick(&mut self) -> Option<PersistOutcome> {
        let snapshot = self.debouncer.poll()?;
        Some(self.persist(&snapshot).await)
    }

    /// Persiste inmediatamente lo pendiente (antes de navegar fuera).
    pub async fn flush(&mut self) -> Option<PersistOutcome> {
        let snapshot = self.debouncer.take_pending()?;
        Some(self.persist(&snapshot).await)
    }

    /// Escribe el payload escalar y luego los binarios. Un mapa de binarios
    /// vacío borra el registro previo para no restaurar imágenes quitadas.
    pub async fn persist(&self, snapshot: &DraftValue) -> PersistOutcome {
        let payload = strip_blobs(snapshot);
        let (key, session_id) = (self.key.clone(), self.session_id);
        let scalar_saved = self.with_scalars(move |s| s.save(&key, &payload, Some(session_id)))
                               .await
                               .unwrap_or_else(|e| {
                                   warn!("persist: scalar write dropped key=[{}] err={e}", self.key);
                                   false
                               });
        let images = if snapshot.contains_binary() {
            collect_blobs(snapshot)
        } else {
            BlobMap::new()
        };
        let draft_id = self.key.draft_id();
        let blob_result = if images.is_empty() {
            self.blobs.delete_images(&draft_id).await
        } else {
            self.blobs.save_images(&draft_id, &images).await
        };
        let blobs_saved = match blob_result {
            Ok(()) => true,
            Err(e) => {
                warn!("persist: blob write dropped key=[{}] count={} err={e}", self.key, images.len());
                false
            }
        };
        debug!("persist: key=[{}] fingerprint={} scalar={} blobs={} count={}",
               self.key,
               NormalizedSnapshot::of(snapshot).fingerprint(),
               scalar_saved,
               blobs_saved,
               images.len());
        PersistOutcome { scalar_saved,
                         blobs_saved,
                         blob_count: images.len() }
    }

    /// Descarte explícito del usuario.
    pub async fn discard(&mut self) {
        self.debouncer.reset();
        self.clear_stores().await;
        info!("discard: key=[{}]", self.key);
    }

    /// Envío final exitoso del diagnóstico.
    pub async fn complete(&mut self) {
        self.debouncer.reset();
        self.clear_stores().await;
        info!("complete: key=[{}]", self.key);
    }

    /// Desmontaje: cancela el timer sin escribir.
    pub fn teardown(&mut self) {
        self.debouncer.cancel();
    }

    async fn clear_stores(&self) {
        let key = self.key.clone();
        if let Err(e) = self.with_scalars(move |s| s.clear(&key)).await {
            warn!("clear: scalar clear failed key=[{}] err={e}", self.key);
        }
        if let Err(e) = self.blobs.delete_images(&self.key.draft_id()).await {
            warn!("clear: blob delete failed key=[{}] err={e}", self.key);
        }
    }
}

impl<B: ScalarBackend + 'static, C: Clock + Clone> DraftSession<B, C> {
    pub fn clock(&self) -> C {
        self.debouncer.clock().clone()
    }
}
