use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::domain::{RunSpec, Structure};
use crate::engine::evaluator::Potential;
use crate::engine::registry::PotentialRegistry;
use crate::error::SimError;
use crate::solvers::{RunController, RunEvent, RunState};

/// A live run: the event stream plus the worker handle.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub events: Receiver<RunEvent>,
    join: JoinHandle<Result<RunState, SimError>>,
}

impl RunHandle {
    /// Blocks until the run reaches a terminal state.
    pub fn join(self) -> Result<RunState, SimError> {
        self.join.join().map_err(|_| SimError::WorkerPanicked)?
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Host-facing entry point: launches runs on worker threads and exposes
/// cancellation keyed by run id.
///
/// Runs are independent tasks; the only state they share is the read-only
/// potential behind an `Arc`.
pub struct SessionManager {
    registry: PotentialRegistry,
    tokens: Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            registry: PotentialRegistry::with_builtins(),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &PotentialRegistry {
        &self.registry
    }

    /// Resolves `model` through the registry, then launches. Unknown model
    /// identifiers fail here, before any evaluation.
    pub fn launch(
        &self,
        spec: RunSpec,
        structure: Structure,
        model: &str,
    ) -> Result<RunHandle, SimError> {
        let potential = self.registry.resolve(model)?;
        self.launch_with(spec, structure, potential)
    }

    /// Launches a run with an explicit potential. All configuration-class
    /// errors surface synchronously; the returned handle's worker can only
    /// end in a terminal [`RunState`].
    pub fn launch_with(
        &self,
        spec: RunSpec,
        structure: Structure,
        potential: Arc<dyn Potential>,
    ) -> Result<RunHandle, SimError> {
        let controller = RunController::new(spec, potential)?;
        controller.preflight(&structure)?;

        let run_id = controller.run_id();
        let cancel = controller.cancel_token();
        let (tx, rx) = unbounded();

        self.tokens.lock().insert(run_id, cancel);
        let tokens = self.tokens.clone();

        let join = thread::Builder::new()
            .name(format!("run-{}", &run_id.to_string()[..8]))
            .spawn(move || {
                let out = controller.run(structure, &tx);
                tokens.lock().remove(&run_id);
                out
            })?;

        Ok(RunHandle {
            run_id,
            events: rx,
            join,
        })
    }

    /// Requests cancellation of a run. Returns false when the id is unknown
    /// or the run already finished. The run stops within one step's latency.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        match self.tokens.lock().get(&run_id) {
            Some(token) => {
                token.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn active_runs(&self) -> Vec<Uuid> {
        self.tokens.lock().keys().copied().collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
