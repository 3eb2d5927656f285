use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shortest period a periodic task runs at. Zero is raised to this.
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Open/closed flag shared between a periodic task and its owner.
///
/// The task does each unit of work inside [`Gate::with_open`], and
/// [`Gate::close`] waits for any unit in progress. Once `close` returns,
/// no further work runs.
#[derive(Clone)]
pub(crate) struct Gate(Arc<Mutex<bool>>);

impl Gate {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(true)))
    }

    /// Runs `f` if the gate is open. `f` may set the flag to `false` to close
    /// the gate from inside. Must not call [`Gate::close`] on the same gate.
    pub(crate) fn with_open<R>(&self, f: impl FnOnce(&mut bool) -> R) -> Option<R> {
        let mut open = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *open { Some(f(&mut open)) } else { None }
    }

    pub(crate) fn close(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub(crate) fn is_open(&self) -> bool {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owned handle to a spawned periodic task. Stops it on drop.
pub(crate) struct Ticker {
    gate: Gate,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub(crate) fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Gate) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let gate = Gate::new();
        let task = tokio::spawn(body(gate.clone()));
        Self {
            gate,
            task: Some(task),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.gate.is_open() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Closes the gate and cancels the task. Idempotent.
    pub(crate) fn stop(&mut self) {
        self.gate.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
