//! Driver de autosave sobre tokio.
//!
//! La sesión vive dentro de una tarea; las ediciones llegan por un canal y el
//! único timer es `sleep_until(deadline)`, recalculado en cada vuelta del
//! loop. Cerrar el canal (drop del handle) o `shutdown` cancelan el timer
//! pendiente sin escribir.
use log::debug;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::debounce::TokioClock;
use crate::errors::DraftError;
use crate::session::{DraftSession, PersistOutcome};
use crate::store::ScalarBackend;
use crate::value::DraftValue;

enum Command {
    Update(DraftValue),
    Flush(oneshot::Sender<Option<PersistOutcome>>),
    Shutdown,
}

pub struct AutosaveHandle<B: ScalarBackend + 'static> {
    tx: mpsc::Sender<Command>,
    join: JoinHandle<DraftSession<B, TokioClock>>,
}

fn stopped() -> DraftError {
    DraftError::Internal("autosave task stopped".into())
}

impl<B: ScalarBackend + 'static> AutosaveHandle<B> {
    /// Envía el snapshot actual del formulario.
    pub async fn update(&self, snapshot: DraftValue) -> Result<(), DraftError> {
        self.tx.send(Command::Update(snapshot)).await.map_err(|_| stopped())
    }

    /// Persiste ya lo pendiente; `None` si no había nada.
    pub async fn flush(&self) -> Result<Option<PersistOutcome>, DraftError> {
        let (ack, rx) = oneshot::channel();
        self.tx.send(Command::Flush(ack)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    /// Detiene la tarea (cancelando el timer) y devuelve la sesión.
    pub async fn shutdown(self) -> Result<DraftSession<B, TokioClock>, DraftError> {
        // si la tarea ya terminó el envío falla; el join igual devuelve la sesión
        let _ = self.tx.send(Command::Shutdown).await;
        self.join.await.map_err(|e| DraftError::Internal(format!("autosave join: {e}")))
    }
}

pub fn spawn_autosave<B: ScalarBackend + 'static>(session: DraftSession<B, TokioClock>, capacity: usize) -> AutosaveHandle<B> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let join = tokio::spawn(run(session, rx));
    AutosaveHandle { tx, join }
}

async fn run<B: ScalarBackend + 'static>(mut session: DraftSession<B, TokioClock>,
                                         mut rx: mpsc::Receiver<Command>)
                                         -> DraftSession<B, TokioClock> {
    let clock = session.clock();
    loop {
        let deadline = session.deadline().map(|ms| clock.instant_at(ms));
        // el future del sleep se construye aunque la rama esté deshabilitada
        let wake_at = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Update(snapshot)) => {
                    session.on_change(&snapshot);
                }
                Some(Command::Flush(ack)) => {
                    let outcome = session.flush().await;
                    let _ = ack.send(outcome);
                }
                Some(Command::Shutdown) | None => {
                    session.teardown();
                    debug!("autosave stop key=[{}]", session.key());
                    break;
                }
            },
            _ = sleep_until(wake_at), if deadline.is_some() => {
                session.tick().await;
            }
        }
    }
    session
}
