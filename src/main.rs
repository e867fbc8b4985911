//! `sabio-demo`: recorre el ciclo de vida de un borrador del wizard de
//! diagnóstico (ediciones con debounce, re-entrada, envío final).
//!
//! Por defecto usa stores en memoria; con el feature `pg_demo` y
//! `DATABASE_URL` definido usa Postgres.
use std::time::Duration;

use draft_core::{spawn_autosave, BinaryValue, DraftValue, ScalarBackend};
use log::{error, info};
use sabio_drafts::{AppConfig, CoreError, DraftStores};
use tracing_subscriber::EnvFilter;

fn form(lote: &str, foto_ts: i64) -> DraftValue {
    DraftValue::object().with("paso", 2i64)
                        .with("lote", lote)
                        .with("fotos",
                              vec![DraftValue::object().with("frente",
                                                             BinaryValue::new("frente.jpg",
                                                                              foto_ts,
                                                                              Some("image/jpeg".into()),
                                                                              vec![0xFF, 0xD8, 0xFF, 0xE0]))])
}

async fn run_demo<B: ScalarBackend + 'static>(stores: DraftStores<B>) -> Result<(), CoreError> {
    let (finca, usuario) = ("finca-demo", "usuario-demo");
    let session = stores.session(finca, usuario).map_err(|e| CoreError::Internal(e.to_string()))?;
    let handle = spawn_autosave(session, 16);

    // tres ediciones rápidas: un solo guardado tras el período de silencio
    for (i, lote) in ["L", "Lo", "Lote 7"].iter().enumerate() {
        handle.update(form(lote, 1_700_000_000_000 + i as i64)).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(stores.config.debounce_ms + 100)).await;
    handle.shutdown().await?;

    // re-entrada al wizard
    let mut reopened = stores.session(finca, usuario).map_err(|e| CoreError::Internal(e.to_string()))?;
    match reopened.recover().await {
        Some(draft) => {
            let lote = draft.snapshot.get("lote").and_then(DraftValue::as_str).unwrap_or_default();
            println!("borrador recuperado: lote={lote} imágenes={} guardado={}",
                     draft.blob_count, draft.saved_at);
        }
        None => println!("no se encontró borrador"),
    }

    // envío final exitoso
    reopened.complete().await;
    println!("tras completar, borrador presente: {}", reopened.recover().await.is_some());
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
    let app = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("config: {e}");
            std::process::exit(2);
        }
    };

    #[cfg(feature = "pg_demo")]
    let result = if app.database.is_some() {
        info!("sabio-demo: backend postgres");
        match tokio::task::spawn_blocking(move || DraftStores::postgres(&app)).await {
            Ok(Ok(stores)) => run_demo(stores).await,
            Ok(Err(e)) => Err(e),
            Err(e) => Err(CoreError::Internal(format!("join: {e}"))),
        }
    } else {
        info!("sabio-demo: backend en memoria (sin DATABASE_URL)");
        run_demo(DraftStores::in_memory(app.drafts)).await
    };

    #[cfg(not(feature = "pg_demo"))]
    let result = {
        info!("sabio-demo: backend en memoria");
        run_demo(DraftStores::in_memory(app.drafts)).await
    };

    if let Err(e) = result {
        error!("sabio-demo: {e}");
        std::process::exit(5);
    }
}
