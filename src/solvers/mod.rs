use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::domain::{RunMode, RunSpec, Structure};
use crate::engine::evaluator::PotentialResult;
use crate::error::SimError;

pub mod controller;
pub mod md;
pub mod opt;

pub use controller::{RunController, RunState, TerminationReason};

/// One intermediate structure pushed to the host for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub run_id: Uuid,
    pub step: usize,
    pub structure: Structure,
    /// Potential energy at the step's evaluation, if one happened.
    pub energy: Option<f64>,
}

/// Final notification sent once per run, after the terminal frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub reason: TerminationReason,
    pub steps_completed: usize,
    pub final_energy: Option<f64>,
}

/// Events emitted by a run to the host.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Diagnostic log message.
    Log(String),

    /// An intermediate (or terminal) structure snapshot.
    Frame(Frame),

    /// The run reached a terminal state.
    Finished(RunSummary),
}

/// Result of advancing the propagator by one step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Optimizer convergence test passed on the incoming forces; no
    /// displacement was applied.
    Converged,

    /// The structure advanced. `needs_evaluation` tells the controller
    /// whether fresh forces are required before the next step.
    Advanced {
        structure: Structure,
        needs_evaluation: bool,
    },
}

/// The closed set of step algorithms, selected once per run from the spec.
/// New algorithms are added as new variants with their own step function.
pub enum Propagator {
    Optimizer(opt::Optimizer),
    Dynamics(md::VelocityVerlet),
}

impl Propagator {
    pub fn from_spec(spec: &RunSpec) -> Self {
        match &spec.mode {
            RunMode::Optimization { algorithm, fmax } => {
                Propagator::Optimizer(opt::Optimizer::new(*algorithm, *fmax))
            }
            RunMode::Dynamics {
                timestep_fs,
                thermostat,
                ..
            } => Propagator::Dynamics(md::VelocityVerlet::new(*timestep_fs, *thermostat, spec.seed)),
        }
    }

    /// Advances one step given the current structure and the forces
    /// evaluated at its positions.
    pub fn step(
        &mut self,
        structure: &Structure,
        result: &PotentialResult,
    ) -> Result<StepOutcome, SimError> {
        match self {
            Propagator::Optimizer(o) => o.step(structure, result),
            Propagator::Dynamics(d) => d.step(structure, result),
        }
    }
}

/// Per-atom displacement clamp shared by the optimizers (Å).
pub(crate) fn clamp_displacements(delta: &mut [Vector3<f64>], max_disp: f64) {
    for d in delta.iter_mut() {
        let norm = d.norm();
        if norm > max_disp {
            *d *= max_disp / norm;
        }
    }
}
