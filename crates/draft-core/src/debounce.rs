//! Detector de cambios con debounce como máquina de estados explícita.
//!
//! Transiciones:
//! - `Idle | Fired` --observe(cambio)--> `Armed { deadline }`
//! - `Armed` --observe(cambio)--> `Armed { deadline' }` (re-armado)
//! - `Armed` --poll(now >= deadline)--> `Fired` (entrega el snapshot crudo)
//! - `Armed` --cancel--> `Idle`
//!
//! Un `observe` sin cambio semántico no toca el timer. El callback de
//! persistencia no vive aquí: el llamador consume el resultado de `poll`, así
//! que reemplazar el callback nunca provoca un guardado espurio.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::value::{DraftValue, NormalizedSnapshot};

/// Reloj monotónico en milisegundos.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Reloj manual para tests deterministas. Los clones comparten el tiempo.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Reloj sobre `tokio::time`; respeta `tokio::time::pause` en tests.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self { origin: tokio::time::Instant::now() }
    }

    /// Instante tokio correspondiente a `ms` desde el origen del reloj.
    pub fn instant_at(&self, ms: u64) -> tokio::time::Instant {
        self.origin + std::time::Duration::from_millis(ms)
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Sin escritura pendiente.
    Idle,
    /// Escritura pendiente para `deadline` (ms del reloj).
    Armed { deadline: u64 },
    /// El último periodo de quietud ya entregó su snapshot.
    Fired,
}

pub struct Debouncer<C: Clock> {
    clock: C,
    delay_ms: u64,
    state: DebounceState,
    last: Option<NormalizedSnapshot>,
    pending: Option<DraftValue>,
}

impl<C: Clock> Debouncer<C> {
    pub fn new(clock: C, delay_ms: u64) -> Self {
        Self { clock,
               delay_ms,
               state: DebounceState::Idle,
               last: None,
               pending: None }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn deadline(&self) -> Option<u64> {
        match self.state {
            DebounceState::Armed { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Registra un snapshot. Devuelve `true` si hubo cambio y el timer quedó
    /// (re)armado.
    pub fn observe(&mut self, snapshot: &DraftValue) -> bool {
        let normalized = NormalizedSnapshot::of(snapshot);
        if self.last.as_ref() == Some(&normalized) {
            return false;
        }
        self.last = Some(normalized);
        self.pending = Some(snapshot.clone());
        self.state = DebounceState::Armed { deadline: self.clock.now_ms() + self.delay_ms };
        true
    }

    /// Fija la línea base sin armar el timer y descarta lo pendiente.
    pub fn prime(&mut self, snapshot: &DraftValue) {
        self.last = Some(NormalizedSnapshot::of(snapshot));
        self.pending = None;
        self.state = DebounceState::Idle;
    }

    /// Si venció el plazo, entrega (una sola vez) el snapshot capturado al
    /// armar.
    pub fn poll(&mut self) -> Option<DraftValue> {
        match self.state {
            DebounceState::Armed { deadline } if self.clock.now_ms() >= deadline => {
                self.state = DebounceState::Fired;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Entrega lo pendiente sin esperar el plazo.
    pub fn take_pending(&mut self) -> Option<DraftValue> {
        if let DebounceState::Armed { .. } = self.state {
            self.state = DebounceState::Fired;
            return self.pending.take();
        }
        None
    }

    /// Cancela el timer pendiente (teardown). La línea base se conserva.
    pub fn cancel(&mut self) {
        if let DebounceState::Armed { .. } = self.state {
            self.state = DebounceState::Idle;
        }
        self.pending = None;
    }

    /// Cancela y olvida la línea base.
    pub fn reset(&mut self) {
        self.cancel();
        self.state = DebounceState::Idle;
        self.last = None;
    }
}
