use anyhow::{anyhow, bail, Result};
use std::fmt;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Instant;

/// Observable readiness of a heavy model handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

enum State<T> {
    Unloaded,
    Loading,
    Ready(Arc<T>),
    Failed(String),
}

type Loader<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// A model that is described up front and loaded on first use.
///
/// `Unloaded → Loading → Ready | Failed`. A failed load is sticky: later
/// calls report the same error without retrying.
pub struct LazyModel<T> {
    name: String,
    state: Mutex<State<T>>,
    loader: Loader<T>,
}

impl<T> LazyModel<T> {
    pub fn new(name: impl Into<String>, loader: impl Fn() -> Result<T> + Send + Sync + 'static) -> Self {
        Self { name: name.into(), state: Mutex::new(State::Unloaded), loader: Box::new(loader) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ModelStatus {
        match self.state.try_lock() {
            Ok(state) => match &*state {
                State::Unloaded => ModelStatus::Unloaded,
                State::Loading => ModelStatus::Loading,
                State::Ready(_) => ModelStatus::Ready,
                State::Failed(msg) => ModelStatus::Failed(msg.clone()),
            },
            // The loader runs with the lock held.
            Err(TryLockError::WouldBlock) => ModelStatus::Loading,
            Err(TryLockError::Poisoned(_)) => ModelStatus::Failed("model state lock poisoned".to_string()),
        }
    }

    /// Load now if needed.
    ///
    /// # Errors
    /// The loader's error, or the recorded one if loading failed before.
    pub fn ensure_ready(&self) -> Result<()> {
        self.get().map(|_| ())
    }

    /// The loaded model, loading it first if needed.
    ///
    /// # Errors
    /// See [`LazyModel::ensure_ready`].
    pub fn get(&self) -> Result<Arc<T>> {
        let mut state = self.state.lock().map_err(|_| anyhow!("{}: model state lock poisoned", self.name))?;
        match &*state {
            State::Ready(model) => return Ok(Arc::clone(model)),
            State::Failed(msg) => bail!("{} failed to load earlier: {}", self.name, msg),
            State::Loading => bail!("{} is already loading", self.name),
            State::Unloaded => {}
        }

        *state = State::Loading;
        let started = Instant::now();
        tracing::info!(model = %self.name, "loading model");
        match (self.loader)() {
            Ok(model) => {
                let model = Arc::new(model);
                *state = State::Ready(Arc::clone(&model));
                tracing::info!(model = %self.name, elapsed_ms = started.elapsed().as_millis(), "model ready");
                Ok(model)
            }
            Err(err) => {
                let msg = format!("{err:#}");
                tracing::warn!(model = %self.name, error = %msg, "model failed to load");
                *state = State::Failed(msg);
                Err(err.context(format!("loading {}", self.name)))
            }
        }
    }
}

impl<T> fmt::Debug for LazyModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModel").field("name", &self.name).field("status", &self.status()).finish()
    }
}
