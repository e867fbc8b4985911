//! Armado de stores y sesiones de borrador.
//!
//! Las stores son handles compartidos por proceso (`Arc`) y se inyectan en
//! cada `DraftSession`; nada aquí es un singleton global.
use std::sync::Arc;

use draft_core::{BlobStore, Clock, DraftKey, DraftSession, InMemoryBlobStore, InMemoryScalarBackend, ScalarBackend,
                 ScalarDraftStore, TokioClock};
use draft_persistence::{build_pool, DraftConfig, PgBlobStore, PgScalarBackend, PoolProvider};
use log::info;

use crate::config::AppConfig;
use crate::errors::{CoreError, DomainError};

/// Par de stores de borradores más la configuración con la que se abren
/// sesiones.
pub struct DraftStores<B: ScalarBackend> {
    pub scalars: Arc<ScalarDraftStore<B>>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: DraftConfig,
}

impl<B: ScalarBackend> Clone for DraftStores<B> {
    fn clone(&self) -> Self {
        Self { scalars: self.scalars.clone(),
               blobs: self.blobs.clone(),
               config: self.config.clone() }
    }
}

impl<B: ScalarBackend + 'static> DraftStores<B> {
    pub fn new(backend: B, blobs: Arc<dyn BlobStore>, config: DraftConfig) -> Self {
        let mut scalars = ScalarDraftStore::new(backend, config.namespace.clone());
        if let Some(max_age) = config.max_age() {
            scalars = scalars.with_max_age(max_age);
        }
        Self { scalars: Arc::new(scalars),
               blobs,
               config }
    }

    /// Sesión con reloj explícito (tests con `ManualClock`).
    pub fn session_with_clock<C: Clock>(&self, entity_id: &str, owner_id: &str, clock: C)
                                        -> Result<DraftSession<B, C>, DomainError> {
        let key = DraftKey::new(entity_id, owner_id)?;
        Ok(DraftSession::new(key, self.scalars.clone(), self.blobs.clone(), clock, self.config.debounce_ms))
    }

    /// Sesión lista para `spawn_autosave`.
    pub fn session(&self, entity_id: &str, owner_id: &str) -> Result<DraftSession<B, TokioClock>, DomainError> {
        self.session_with_clock(entity_id, owner_id, TokioClock::new())
    }
}

impl DraftStores<InMemoryScalarBackend> {
    pub fn in_memory(config: DraftConfig) -> Self {
        let blobs = Arc::new(InMemoryBlobStore::new(config.namespace.clone()));
        Self::new(InMemoryScalarBackend::new(), blobs, config)
    }
}

impl DraftStores<PgScalarBackend<PoolProvider>> {
    /// Construye el pool (con migraciones) y ambos backends Postgres.
    pub fn postgres(app: &AppConfig) -> Result<Self, CoreError> {
        let db = app.require_database()?;
        let pool = build_pool(&db.url, db.min_connections, db.max_connections)?;
        info!("draft stores: postgres namespace={} max_conn={}", app.drafts.namespace, db.max_connections);
        let blobs = Arc::new(PgBlobStore::new(PoolProvider::new(pool.clone()), app.drafts.namespace.clone()));
        Ok(Self::new(PgScalarBackend::new(PoolProvider::new(pool)), blobs, app.drafts.clone()))
    }
}
