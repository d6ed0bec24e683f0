//! Orchestrator Module
//!
//! Lifecycle management for dashboard instances: one per (line, analysis)
//! key, each serving on its own port inside its own tokio task. The
//! orchestrator is the single source of truth for "is this dashboard
//! running"; its state lives behind one lock that every launch/stop entry
//! point goes through, so duplicate launches can never race past each other.

pub mod instance;
pub mod registry;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::data::{AnalysisType, TableStore};
pub use instance::DashboardInstance;
pub use registry::{InstanceKey, PortRegistry};

/// Caller-supplied progress sink: `(progress 0..=100 or indeterminate, message)`.
pub type ProgressFn = Arc<dyn Fn(Option<u8>, Option<&str>) + Send + Sync>;

/// Result of a launch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Started { port: u16 },
    /// The key was already starting or running; nothing was done.
    AlreadyRunning { port: u16 },
}

impl LaunchOutcome {
    pub fn port(&self) -> u16 {
        match self {
            LaunchOutcome::Started { port } | LaunchOutcome::AlreadyRunning { port } => *port,
        }
    }
}

enum InstanceState {
    Starting,
    Running { handle: JoinHandle<()>, instance: Arc<DashboardInstance> },
    Stopped,
}

impl InstanceState {
    fn label(&self) -> &'static str {
        match self {
            InstanceState::Starting => "starting",
            InstanceState::Running { .. } => "running",
            InstanceState::Stopped => "stopped",
        }
    }
}

struct InstanceRecord {
    port: u16,
    state: InstanceState,
}

struct OrchestratorState {
    ports: PortRegistry,
    instances: HashMap<InstanceKey, InstanceRecord>,
}

/// Owns every dashboard instance of the process. Clone-cheap handle.
#[derive(Clone)]
pub struct DashboardOrchestrator {
    output_dir: PathBuf,
    state: Arc<Mutex<OrchestratorState>>,
}

impl DashboardOrchestrator {
    pub fn new(output_dir: impl Into<PathBuf>, base_port: u16) -> Self {
        Self {
            output_dir: output_dir.into(),
            state: Arc::new(Mutex::new(OrchestratorState {
                ports: PortRegistry::new(base_port),
                instances: HashMap::new(),
            })),
        }
    }

    /// Launch the dashboard for `(line, analysis)`, or report it already
    /// active. Loads data off the runtime, analyzes once, then binds the
    /// server task. A load failure reverts the key to absent and surfaces
    /// the error.
    pub async fn launch(
        &self,
        line: &str,
        analysis: AnalysisType,
        progress: Option<ProgressFn>,
    ) -> Result<LaunchOutcome> {
        let key = InstanceKey::new(line, analysis);
        let report = |pct: Option<u8>, msg: &str| {
            if let Some(cb) = &progress {
                cb(pct, Some(msg));
            }
        };

        // Reservation happens in one lock window: port allocation plus the
        // Starting marker, so a concurrent launch for the same key observes
        // the reservation and backs off.
        let port = {
            let mut state = self.state.lock().await;
            if let Some(record) = state.instances.get(&key) {
                match record.state {
                    InstanceState::Starting | InstanceState::Running { .. } => {
                        info!(%key, port = record.port, "dashboard already active");
                        report(Some(100), "El dashboard ya está en ejecución.");
                        return Ok(LaunchOutcome::AlreadyRunning { port: record.port });
                    }
                    InstanceState::Stopped => {}
                }
            }
            let port = state.ports.port_for(&key);
            state
                .instances
                .insert(key.clone(), InstanceRecord { port, state: InstanceState::Starting });
            port
        };

        report(Some(10), "Cargando datos...");
        let folder = self.output_dir.clone();
        let owned_line = line.to_string();
        let loaded = tokio::task::spawn_blocking(move || {
            TableStore::load(&owned_line, analysis, &folder)
        })
        .await;

        let store = match loaded {
            Ok(Ok(store)) => store,
            Ok(Err(err)) => {
                self.revert_to_absent(&key).await;
                report(None, "No se pudieron cargar los datos.");
                return Err(err).with_context(|| format!("loading datasets for {key}"));
            }
            Err(join_err) => {
                self.revert_to_absent(&key).await;
                return Err(join_err).context("dataset loader task failed");
            }
        };

        report(Some(55), "Generando visualizaciones y análisis...");
        let instance = Arc::new(DashboardInstance::new(key.clone(), port, store));

        report(Some(85), "Iniciando servidor web...");
        let handle = match crate::server::spawn(instance.clone()).await {
            Ok(handle) => handle,
            Err(err) => {
                // Port collisions cannot happen under the allocation
                // invariant; anything landing here is an environment problem.
                error!(%key, port, %err, "failed to bind dashboard server");
                self.revert_to_absent(&key).await;
                return Err(err);
            }
        };

        {
            let mut state = self.state.lock().await;
            if let Some(record) = state.instances.get_mut(&key) {
                record.state = InstanceState::Running { handle, instance };
            }
        }

        info!(%key, port, "dashboard running at http://localhost:{port}");
        report(Some(100), &format!("Dashboard disponible en http://localhost:{port}"));
        Ok(LaunchOutcome::Started { port })
    }

    /// Stop every running instance. Ports stay reserved so relaunches reuse
    /// them. Returns the number of instances stopped.
    pub async fn stop_all(&self) -> usize {
        let handles: Vec<(InstanceKey, JoinHandle<()>)> = {
            let mut state = self.state.lock().await;
            let mut collected = Vec::new();
            for (key, record) in state.instances.iter_mut() {
                if matches!(record.state, InstanceState::Running { .. }) {
                    let previous = std::mem::replace(&mut record.state, InstanceState::Stopped);
                    if let InstanceState::Running { handle, .. } = previous {
                        collected.push((key.clone(), handle));
                    }
                }
            }
            collected
        };

        if handles.is_empty() {
            warn!("stop requested with no running dashboards");
            return 0;
        }

        let stopped = handles.len();
        for (key, handle) in handles {
            handle.abort();
            // Join so the listener socket is released before any relaunch
            // tries to rebind the same port.
            let _ = handle.await;
            info!(%key, "dashboard stopped");
        }
        stopped
    }

    pub async fn is_running(&self, line: &str, analysis: AnalysisType) -> bool {
        let key = InstanceKey::new(line, analysis);
        let state = self.state.lock().await;
        matches!(
            state.instances.get(&key).map(|r| &r.state),
            Some(InstanceState::Starting) | Some(InstanceState::Running { .. })
        )
    }

    /// Snapshot of (key, port, state label) for status displays.
    pub async fn status(&self) -> Vec<(String, u16, &'static str)> {
        let state = self.state.lock().await;
        let mut rows: Vec<(String, u16, &'static str)> = state
            .instances
            .iter()
            .map(|(key, record)| (key.to_string(), record.port, record.state.label()))
            .collect();
        rows.sort();
        rows
    }

    /// Number of ports ever assigned; test hook for the allocation invariant.
    pub async fn assigned_ports(&self) -> usize {
        self.state.lock().await.ports.assigned_count()
    }

    async fn revert_to_absent(&self, key: &InstanceKey) {
        let mut state = self.state.lock().await;
        state.instances.remove(key);
        warn!(%key, "launch aborted, key reverted to absent");
    }
}
