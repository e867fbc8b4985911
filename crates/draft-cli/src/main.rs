//! `sabio-drafts`: inspección y descarte de borradores persistidos en
//! Postgres.
//!
//! Uso:
//!   sabio-drafts show    --entity <ID> --owner <ID>
//!   sabio-drafts paths   --entity <ID> --owner <ID>
//!   sabio-drafts discard --entity <ID> --owner <ID>
//!   sabio-drafts list
//!
//! Códigos de salida: 0 ok, 2 uso, 4 no encontrado, 5 error de backend.
use draft_core::hashing::sha256_hex;
use draft_core::{BlobMap, BlobStore, DraftKey, PersistedDraft, ScalarDraftStore};
use draft_persistence::{build_dev_pool_from_env, DraftConfig, PgBlobStore, PgScalarBackend, PoolProvider};
use log::{error, warn};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_NOT_FOUND: i32 = 4;
const EXIT_BACKEND: i32 = 5;

const USAGE: &str = "Uso: sabio-drafts <show|paths|discard> --entity <ID> --owner <ID> | sabio-drafts list";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Show(DraftKey),
    Paths(DraftKey),
    Discard(DraftKey),
    List,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(sub) = args.first() else {
        return Err(USAGE.to_string());
    };
    if sub == "list" {
        return Ok(Command::List);
    }
    let mut entity: Option<String> = None;
    let mut owner: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--entity" => {
                i += 1;
                entity = args.get(i).cloned();
            }
            "--owner" => {
                i += 1;
                owner = args.get(i).cloned();
            }
            other => return Err(format!("argumento desconocido: {other}")),
        }
        i += 1;
    }
    let (Some(entity), Some(owner)) = (entity, owner) else {
        return Err(USAGE.to_string());
    };
    let key = DraftKey::new(entity, owner).map_err(|e| e.to_string())?;
    match sub.as_str() {
        "show" => Ok(Command::Show(key)),
        "paths" => Ok(Command::Paths(key)),
        "discard" => Ok(Command::Discard(key)),
        other => Err(format!("subcomando desconocido: {other}\n{USAGE}")),
    }
}

struct Stores {
    scalars: ScalarDraftStore<PgScalarBackend<PoolProvider>>,
    blobs: PgBlobStore<PoolProvider>,
}

fn image_summary(images: &BlobMap) -> Vec<Value> {
    images.iter()
          .map(|(path, blob)| {
              json!({
                  "path": path,
                  "name": blob.name,
                  "size": blob.size,
                  "last_modified": blob.last_modified,
                  "mime_type": blob.mime_type,
                  "sha256": sha256_hex(&blob.bytes),
              })
          })
          .collect()
}

fn render_show(draft: &PersistedDraft, images: &BlobMap) -> Value {
    json!({
        "entity": draft.key.entity_id(),
        "owner": draft.key.owner_id(),
        "saved_at": draft.saved_at.to_rfc3339(),
        "fingerprint": draft.fingerprint,
        "session_id": draft.session_id,
        "payload": draft.payload,
        "images": image_summary(images),
    })
}

async fn run(cmd: Command, stores: &Stores) -> i32 {
    match cmd {
        Command::Show(key) => {
            let draft = match stores.scalars.try_load(&key) {
                Ok(Some(draft)) => draft,
                Ok(None) => {
                    warn!("[sabio-drafts show] sin borrador para {key}");
                    return EXIT_NOT_FOUND;
                }
                Err(e) => {
                    error!("[sabio-drafts show] borrador ilegible para {key}: {e}");
                    return EXIT_BACKEND;
                }
            };
            let images = match stores.blobs.load_images(&key.draft_id()).await {
                Ok(images) => images.unwrap_or_default(),
                Err(e) => {
                    error!("[sabio-drafts show] error de store binaria: {e}");
                    return EXIT_BACKEND;
                }
            };
            match serde_json::to_string_pretty(&render_show(&draft, &images)) {
                Ok(text) => {
                    println!("{text}");
                    EXIT_OK
                }
                Err(e) => {
                    error!("[sabio-drafts show] error: {e}");
                    EXIT_BACKEND
                }
            }
        }
        Command::Paths(key) => match stores.blobs.load_images(&key.draft_id()).await {
            Ok(Some(images)) => {
                for (path, blob) in &images {
                    println!("{path}\t{}\t{}", blob.name, blob.size);
                }
                EXIT_OK
            }
            Ok(None) if stores.scalars.load(&key).is_some() => EXIT_OK,
            Ok(None) => {
                warn!("[sabio-drafts paths] sin borrador para {key}");
                EXIT_NOT_FOUND
            }
            Err(e) => {
                error!("[sabio-drafts paths] error de store binaria: {e}");
                EXIT_BACKEND
            }
        },
        Command::Discard(key) => {
            let draft_id = key.draft_id();
            let existed = stores.scalars.load(&key).is_some()
                          || matches!(stores.blobs.load_images(&draft_id).await, Ok(Some(_)));
            stores.scalars.clear(&key);
            if let Err(e) = stores.blobs.delete_images(&draft_id).await {
                error!("[sabio-drafts discard] error de store binaria: {e}");
                return EXIT_BACKEND;
            }
            if existed {
                println!("descartado: {key}");
                EXIT_OK
            } else {
                warn!("[sabio-drafts discard] sin borrador para {key}");
                EXIT_NOT_FOUND
            }
        }
        Command::List => match stores.scalars.list() {
            Ok(keys) => {
                for key in keys {
                    println!("{}\t{}", key.entity_id(), key.owner_id());
                }
                EXIT_OK
            }
            Err(e) => {
                error!("[sabio-drafts list] error: {e}");
                EXIT_BACKEND
            }
        },
    }
}

fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter)
                                     .with_writer(std::io::stderr)
                                     .try_init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = match parse_args(&args) {
        Ok(cmd) => cmd,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(EXIT_USAGE);
        }
    };
    let pool = match build_dev_pool_from_env() {
        Ok(p) => p,
        Err(e) => {
            error!("[sabio-drafts] pool error: {e}");
            std::process::exit(EXIT_BACKEND);
        }
    };
    let cfg = DraftConfig::from_env();
    let stores = Stores { scalars: ScalarDraftStore::new(PgScalarBackend::new(PoolProvider::new(pool.clone())),
                                                         cfg.namespace.clone()),
                          blobs: PgBlobStore::new(PoolProvider::new(pool), cfg.namespace) };
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("[sabio-drafts] runtime error: {e}");
            std::process::exit(EXIT_BACKEND);
        }
    };
    let code = runtime.block_on(run(cmd, &stores));
    std::process::exit(code);
}
