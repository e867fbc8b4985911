use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use draft_core::{BinaryValue, BlobMap, BlobStore, DraftError, DraftKey, DraftSession, DraftValue, InMemoryBlobStore,
                 InMemoryScalarBackend, ManualClock, ScalarBackend, ScalarDraftStore};
use serde_json::json;

type Scalars = Arc<ScalarDraftStore<InMemoryScalarBackend>>;

fn scalars() -> Scalars {
    Arc::new(ScalarDraftStore::new(InMemoryScalarBackend::new(), "sabio-test"))
}

fn key(f: &str, u: &str) -> DraftKey {
    DraftKey::new(f, u).expect("key")
}

fn photo(name: &str, ts: i64) -> BinaryValue {
    BinaryValue::new(name, ts, Some("image/jpeg".into()), vec![0xFF, 0xD8, ts as u8])
}

fn diagnostico() -> DraftValue {
    DraftValue::object().with("paso", 3i64)
                        .with("lote", "Lote 7")
                        .with("fotos",
                              vec![DraftValue::object().with("frente", photo("f0.jpg", 10)),
                                   DraftValue::object().with("frente", photo("f1.jpg", 11))
                                                       .with("comentario", "clorosis"),])
                        .with("notas", DraftValue::object().with("adjunto", photo("informe.pdf", 12)))
}

/// Store binaria que siempre falla (sustrato no disponible).
struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn init(&self) -> Result<(), DraftError> {
        Err(DraftError::BlobStore("open failed".into()))
    }
    async fn save_images(&self, _draft_id: &str, _images: &BlobMap) -> Result<(), DraftError> {
        Err(DraftError::BlobStore("transaction aborted".into()))
    }
    async fn load_images(&self, _draft_id: &str) -> Result<Option<BlobMap>, DraftError> {
        Err(DraftError::BlobStore("transaction aborted".into()))
    }
    async fn delete_images(&self, _draft_id: &str) -> Result<(), DraftError> {
        Err(DraftError::BlobStore("transaction aborted".into()))
    }
}

#[tokio::test]
async fn debounced_save_then_recover_restores_full_snapshot() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let blobs = Arc::new(InMemoryBlobStore::new("sabio-test"));
    let mut session = DraftSession::new(key("finca-1", "u-1"), scalars.clone(), blobs.clone(), clock.clone(), 300);

    assert!(session.on_change(&diagnostico()));
    assert!(session.tick().await.is_none());
    clock.advance(300);
    let outcome = session.tick().await.expect("save due");
    assert!(outcome.scalar_saved && outcome.blobs_saved);
    assert_eq!(outcome.blob_count, 3);

    let mut reopened = DraftSession::new(key("finca-1", "u-1"), scalars, blobs, clock.clone(), 300);
    let recovered = reopened.recover().await.expect("draft recovered");
    assert_eq!(recovered.snapshot, diagnostico());
    assert_eq!(recovered.blob_count, 3);
    // el snapshot recuperado es la línea base: no se vuelve a guardar
    assert!(!reopened.on_change(&diagnostico()));
}

#[tokio::test]
async fn recover_without_blob_record_leaves_placeholders_null() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let blobs = Arc::new(InMemoryBlobStore::new("sabio-test"));
    let session = DraftSession::new(key("f", "u"), scalars.clone(), blobs.clone(), clock.clone(), 300);
    session.persist(&diagnostico()).await;

    // se pierde una imagen (escritura parcial)
    let draft_id = key("f", "u").draft_id();
    let mut images = blobs.load_images(&draft_id).await.unwrap().unwrap();
    images.remove("fotos[1].frente");
    blobs.save_images(&draft_id, &images).await.unwrap();

    let mut s = DraftSession::new(key("f", "u"), scalars, blobs, clock, 300);
    let recovered = s.recover().await.unwrap().snapshot;
    let f1 = recovered.get("fotos").and_then(|f| f.at(1)).unwrap();
    assert!(f1.get("frente").unwrap().is_null());
    assert_eq!(f1.get("comentario").and_then(DraftValue::as_str), Some("clorosis"));
    assert!(recovered.get("notas").and_then(|n| n.get("adjunto")).and_then(DraftValue::as_binary).is_some());
}

#[tokio::test]
async fn failing_blob_store_never_breaks_the_wizard() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let mut session = DraftSession::new(key("f", "u"), scalars.clone(), Arc::new(FailingBlobStore), clock.clone(), 300);
    session.on_change(&diagnostico());
    clock.advance(300);
    let outcome = session.tick().await.unwrap();
    assert!(outcome.scalar_saved);
    assert!(!outcome.blobs_saved);

    let mut reopened = DraftSession::new(key("f", "u"), scalars, Arc::new(FailingBlobStore), clock, 300);
    let recovered = reopened.recover().await.expect("scalar-only recovery");
    assert_eq!(recovered.blob_count, 0);
    assert_eq!(recovered.snapshot.get("lote").and_then(DraftValue::as_str), Some("Lote 7"));
    assert!(recovered.snapshot.get("notas").and_then(|n| n.get("adjunto")).unwrap().is_null());
    // descartar tampoco falla
    reopened.discard().await;
}

#[tokio::test]
async fn drafts_are_isolated_by_farm_and_user() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let blobs = Arc::new(InMemoryBlobStore::new("sabio-test"));
    let writer = DraftSession::new(key("farmA", "userX"), scalars.clone(), blobs.clone(), clock.clone(), 300);
    writer.persist(&diagnostico()).await;

    for (f, u) in [("farmA", "userY"), ("farmB", "userX")] {
        let mut other = DraftSession::new(key(f, u), scalars.clone(), blobs.clone(), clock.clone(), 300);
        assert!(other.recover().await.is_none(), "{f}/{u} no debe ver el borrador de farmA/userX");
    }
    assert!(scalars.load(&key("farmA", "userX")).is_some());
}

#[tokio::test]
async fn discard_and_complete_clear_both_stores() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let blobs = Arc::new(InMemoryBlobStore::new("sabio-test"));
    let mut session = DraftSession::new(key("f", "u"), scalars.clone(), blobs.clone(), clock.clone(), 300);

    session.persist(&diagnostico()).await;
    session.discard().await;
    session.discard().await;
    assert!(scalars.load(&key("f", "u")).is_none());
    assert!(blobs.load_images(&key("f", "u").draft_id()).await.unwrap().is_none());

    session.on_change(&diagnostico());
    clock.advance(300);
    session.tick().await.unwrap();
    session.complete().await;
    assert!(session.recover().await.is_none());
}

#[tokio::test]
async fn removing_every_image_deletes_blob_record() {
    let clock = ManualClock::new();
    let blobs = Arc::new(InMemoryBlobStore::new("sabio-test"));
    let session = DraftSession::new(key("f", "u"), scalars(), blobs.clone(), clock, 300);
    session.persist(&diagnostico()).await;
    session.persist(&DraftValue::from(json!({"paso": 4, "fotos": []}))).await;
    assert!(blobs.load_images(&key("f", "u").draft_id()).await.unwrap().is_none());
}

#[tokio::test]
async fn teardown_cancels_pending_write() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let mut session = DraftSession::new(key("f", "u"), scalars.clone(), Arc::new(InMemoryBlobStore::new("t")), clock.clone(), 300);
    session.on_change(&diagnostico());
    session.teardown();
    clock.advance(1_000);
    assert!(session.tick().await.is_none());
    assert!(scalars.load(&key("f", "u")).is_none());
}

#[tokio::test]
async fn rekey_switches_namespace_and_drops_pending_work() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let mut session = DraftSession::new(key("f1", "u"), scalars.clone(), Arc::new(InMemoryBlobStore::new("t")), clock.clone(), 300);
    session.on_change(&diagnostico());
    assert!(!session.rekey(key("f1", "u")));
    assert!(session.rekey(key("f2", "u")));
    clock.advance(300);
    assert!(session.tick().await.is_none());
    // la línea base se reinicia: el mismo snapshot cuenta como cambio
    assert!(session.on_change(&diagnostico()));
    clock.advance(300);
    session.tick().await.unwrap();
    assert!(scalars.load(&key("f1", "u")).is_none());
    assert!(scalars.load(&key("f2", "u")).is_some());
}

#[tokio::test]
async fn orphan_blob_record_is_removed_on_recover() {
    let blobs = Arc::new(InMemoryBlobStore::new("t"));
    let mut images = BlobMap::new();
    images.insert("fotos[0].frente".into(), photo("x.jpg", 1));
    blobs.save_images(&key("f", "u").draft_id(), &images).await.unwrap();

    let mut session = DraftSession::new(key("f", "u"), scalars(), blobs.clone(), ManualClock::new(), 300);
    assert!(session.recover().await.is_none());
    assert!(blobs.load_images(&key("f", "u").draft_id()).await.unwrap().is_none());
}

/// Backend escalar cuyas lecturas pueden fallar a demanda (pool agotado).
#[derive(Default)]
struct FlakyScalarBackend {
    inner: InMemoryScalarBackend,
    fail_reads: AtomicBool,
}

impl ScalarBackend for FlakyScalarBackend {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DraftError::StorageUnavailable("pool timeout".into()));
        }
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        self.inner.set(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), DraftError> {
        self.inner.remove(key)
    }
    fn keys(&self, prefix: &str) -> Result<Vec<String>, DraftError> {
        self.inner.keys(prefix)
    }
}

#[tokio::test]
async fn scalar_read_failure_on_recover_keeps_images() {
    let clock = ManualClock::new();
    let scalars = Arc::new(ScalarDraftStore::new(FlakyScalarBackend::default(), "t"));
    let blobs = Arc::new(InMemoryBlobStore::new("t"));
    let session = DraftSession::new(key("f", "u"), scalars.clone(), blobs.clone(), clock.clone(), 300);
    session.persist(&diagnostico()).await;

    scalars.backend().fail_reads.store(true, Ordering::SeqCst);
    let mut mounted = DraftSession::new(key("f", "u"), scalars.clone(), blobs.clone(), clock.clone(), 300);
    assert!(mounted.recover().await.is_none());
    assert_eq!(blobs.load_images(&key("f", "u").draft_id()).await.unwrap().map(|m| m.len()), Some(3));

    scalars.backend().fail_reads.store(false, Ordering::SeqCst);
    let mut remounted = DraftSession::new(key("f", "u"), scalars, blobs, clock, 300);
    let recovered = remounted.recover().await.expect("draft");
    assert_eq!(recovered.snapshot, diagnostico());
    assert_eq!(recovered.blob_count, 3);
}

#[tokio::test]
async fn unreadable_scalar_draft_does_not_delete_images() {
    let clock = ManualClock::new();
    let scalars = scalars();
    let blobs = Arc::new(InMemoryBlobStore::new("sabio-test"));
    let session = DraftSession::new(key("f", "u"), scalars.clone(), blobs.clone(), clock.clone(), 300);
    session.persist(&diagnostico()).await;
    let storage_key = format!("sabio-test:{}", key("f", "u").draft_id());
    scalars.backend().set(&storage_key, "{truncado").unwrap();

    let mut mounted = DraftSession::new(key("f", "u"), scalars, blobs.clone(), clock, 300);
    assert!(mounted.recover().await.is_none());
    assert!(blobs.load_images(&key("f", "u").draft_id()).await.unwrap().is_some());
}

/// Backend que declara I/O bloqueante y anota en qué hilo corre cada
/// operación.
#[derive(Default)]
struct ThreadRecordingBackend {
    inner: InMemoryScalarBackend,
    threads: Mutex<Vec<ThreadId>>,
}

impl ThreadRecordingBackend {
    fn record(&self) {
        self.threads.lock().unwrap().push(thread::current().id());
    }
}

impl ScalarBackend for ThreadRecordingBackend {
    const BLOCKING_IO: bool = true;

    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        self.record();
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        self.record();
        self.inner.set(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), DraftError> {
        self.record();
        self.inner.remove(key)
    }
    fn keys(&self, prefix: &str) -> Result<Vec<String>, DraftError> {
        self.inner.keys(prefix)
    }
}

#[tokio::test]
async fn blocking_scalar_backend_runs_off_the_runtime_thread() {
    let runtime_thread = thread::current().id();
    let clock = ManualClock::new();
    let scalars = Arc::new(ScalarDraftStore::new(ThreadRecordingBackend::default(), "t"));
    let mut session =
        DraftSession::new(key("f", "u"), scalars.clone(), Arc::new(InMemoryBlobStore::new("t")), clock.clone(), 300);

    session.on_change(&diagnostico());
    clock.advance(300);
    assert!(session.tick().await.unwrap().scalar_saved);
    assert!(session.recover().await.is_some());
    session.discard().await;
    assert!(scalars.load(&key("f", "u")).is_none());

    let threads = scalars.backend().threads.lock().unwrap().clone();
    // set, get y remove de la sesión (el último get es el `load` del test)
    assert!(threads.len() >= 3);
    assert!(threads[..3].iter().all(|id| *id != runtime_thread));
}
