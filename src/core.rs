use std::{collections::HashMap, path::PathBuf, sync::Arc};

use dirs::data_dir;
use once_cell::sync::Lazy;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::compute::{build_executor, EventSink, Executor};
use crate::config::RunnerConfig;
use crate::events::SessionEvent;
use crate::outputs::CommandOutputs;
use crate::store::FileStore;

// ----------------------------------------------------------------------------
// Constants and paths
// ----------------------------------------------------------------------------

pub static APP_NAME: &str = "occ-playground";

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var("OCC_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let base = data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_NAME)
});

// ----------------------------------------------------------------------------
// Session state
// ----------------------------------------------------------------------------

/// Everything one session owns. Created explicitly and shared behind an `Arc`;
/// nothing here is a process-wide singleton.
pub struct SessionState {
    pub store: FileStore,
    pub outputs: CommandOutputs,
    pub config: RunnerConfig,
    pub executor: Arc<dyn Executor>,
    pub compute_ongoing: RwLock<HashMap<String, JoinHandle<()>>>,
    pub compute_cancel: RwLock<HashMap<String, watch::Sender<bool>>>,
    pub compute_sem: Arc<Semaphore>,
}

impl SessionState {
    pub fn new(config: RunnerConfig, executor: Arc<dyn Executor>) -> Arc<Self> {
        Self::with_store(config, executor, FileStore::new())
    }

    pub fn with_store(
        config: RunnerConfig,
        executor: Arc<dyn Executor>,
        store: FileStore,
    ) -> Arc<Self> {
        let permits = config.max_concurrent.max(1);
        Arc::new(Self {
            store,
            outputs: CommandOutputs::new(),
            config,
            executor,
            compute_ongoing: RwLock::new(HashMap::new()),
            compute_cancel: RwLock::new(HashMap::new()),
            compute_sem: Arc::new(Semaphore::new(permits)),
        })
    }

    /// Build a session from environment configuration.
    pub fn from_env() -> anyhow::Result<Arc<Self>> {
        let config = RunnerConfig::from_env();
        let executor = build_executor(&config)?;
        tracing::info!(
            target: "occ",
            executor = executor.name(),
            max_concurrent = config.max_concurrent,
            "session created"
        );
        Ok(Self::new(config, executor))
    }

    pub async fn running_jobs(&self) -> Vec<String> {
        self.compute_ongoing.read().await.keys().cloned().collect()
    }
}

// ----------------------------------------------------------------------------
// Shared helpers
// ----------------------------------------------------------------------------

/// Initialise the global tracing subscriber. `RUST_LOG` wins; the default
/// filter keeps this crate at `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("occ=info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
    tracing::info!(target: "occ", "tracing initialized");
}

/// Publish `event`; a sink that can no longer deliver is logged, not fatal.
pub fn emit_or_log(sink: &dyn EventSink, event: SessionEvent) {
    tracing::trace!(target: "occ", event = event.name(), job_id = %event.job_id(), "emit");
    if let Err(err) = sink.emit(event) {
        tracing::warn!(target: "occ", error = %err, "failed to emit session event");
    }
}

/// Remove a job from the bookkeeping maps. Used by the job task on completion.
pub async fn remove_compute_job(state: &SessionState, job_id: &str) {
    state.compute_cancel.write().await.remove(job_id);
    state.compute_ongoing.write().await.remove(job_id);
}
