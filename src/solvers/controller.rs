use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::domain::{RunMode, RunSpec, Structure};
use crate::engine::evaluator::{check_species, Potential, PotentialResult};
use crate::error::SimError;
use crate::interface::stream::FrameStreamer;
use crate::solvers::{md, Propagator, RunEvent, RunSummary, StepOutcome};

/// Why a run stopped. Every finished run carries exactly one of these; the
/// host is never left with an ambiguous "still running" state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    Converged,
    MaxStepsReached,
    Cancelled,
    Failed(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Converged => write!(f, "Converged"),
            TerminationReason::MaxStepsReached => write!(f, "MaxStepsReached"),
            TerminationReason::Cancelled => write!(f, "Cancelled"),
            TerminationReason::Failed(cause) => write!(f, "Failed:{}", cause),
        }
    }
}

/// Mutable record of one run, owned exclusively by its controller and
/// returned by value when the run terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub steps_completed: usize,
    pub structure: Structure,
    pub energy: Option<f64>,
    pub forces: Option<Vec<Vector3<f64>>>,
    pub reason: Option<TerminationReason>,
    pub last_error: Option<String>,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        self.reason.is_some()
    }
}

/// Owns the step loop for a single run: evaluation, propagation, frame
/// emission, cancellation and error containment.
///
/// Configuration-class failures (bad spec, bad structure, unsupported
/// species) are returned as errors before the loop starts. In-loop failures
/// terminate the loop and are recorded in the returned [`RunState`]; frames
/// already streamed stay valid.
pub struct RunController {
    spec: RunSpec,
    potential: Arc<dyn Potential>,
    run_id: Uuid,
    cancel: Arc<AtomicBool>,
}

impl RunController {
    pub fn new(spec: RunSpec, potential: Arc<dyn Potential>) -> Result<Self, SimError> {
        spec.validate()?;
        Ok(Self {
            spec,
            potential,
            run_id: Uuid::new_v4(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run-scoped cancellation token, observed once per step boundary.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Checks everything that must hold before the first evaluation.
    pub fn preflight(&self, structure: &Structure) -> Result<(), SimError> {
        structure.validate()?;
        check_species(self.potential.as_ref(), structure)?;
        Ok(())
    }

    /// Executes the run to a terminal state, streaming events into `tx`.
    pub fn run(self, initial: Structure, tx: &Sender<RunEvent>) -> Result<RunState, SimError> {
        self.preflight(&initial)?;

        let mut structure = initial;
        if let RunMode::Dynamics {
            init_temperature_k: Some(t),
            ..
        } = self.spec.mode
        {
            let mut rng = match self.spec.seed {
                Some(s) => ChaCha8Rng::seed_from_u64(s),
                None => ChaCha8Rng::from_entropy(),
            };
            structure = md::seed_velocities(&structure, t, &mut rng)?;
        }

        let mut propagator = Propagator::from_spec(&self.spec);
        let mut streamer =
            FrameStreamer::new(self.run_id, self.spec.frame_emit_interval, tx.clone());
        let mut state = RunState {
            run_id: self.run_id,
            steps_completed: 0,
            structure,
            energy: None,
            forces: None,
            reason: None,
            last_error: None,
        };

        log::info!(
            "run {} started: {} atoms, {} via {}",
            self.run_id,
            state.structure.len(),
            match self.spec.mode {
                RunMode::Optimization { .. } => "optimization",
                RunMode::Dynamics { .. } => "dynamics",
            },
            self.potential.name()
        );

        let reason = self.drive(&mut state, &mut propagator, &mut streamer);
        state.reason = Some(reason.clone());

        streamer.emit_terminal(state.steps_completed, &state.structure, state.energy);
        let _ = tx.send(RunEvent::Finished(RunSummary {
            run_id: self.run_id,
            reason: reason.clone(),
            steps_completed: state.steps_completed,
            final_energy: state.energy,
        }));

        log::info!(
            "run {} finished after {} steps: {}",
            self.run_id,
            state.steps_completed,
            reason
        );
        Ok(state)
    }

    fn drive(
        &self,
        state: &mut RunState,
        propagator: &mut Propagator,
        streamer: &mut FrameStreamer,
    ) -> TerminationReason {
        let mut cached: Option<PotentialResult> = None;

        for step in 0..self.spec.max_steps {
            // Cooperative cancellation: once observed, no further evaluations
            if self.cancel.load(Ordering::Relaxed) {
                return TerminationReason::Cancelled;
            }

            let result = match cached.take() {
                Some(r) => r,
                None => match self.potential.evaluate(&state.structure) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("run {}: evaluation failed at step {}: {}", self.run_id, step, e);
                        state.last_error = Some(e.to_string());
                        return TerminationReason::Failed("EvaluationError".into());
                    }
                },
            };

            if result.forces.len() != state.structure.len() {
                state.last_error = Some(format!(
                    "potential returned {} forces for {} atoms at step {}",
                    result.forces.len(),
                    state.structure.len(),
                    step
                ));
                return TerminationReason::Failed("EvaluationError".into());
            }
            if !result.all_finite() {
                log::warn!("run {}: non-finite evaluation at step {}", self.run_id, step);
                state.last_error =
                    Some(SimError::NumericalDivergence { step }.to_string());
                return TerminationReason::Failed("NumericalDivergence".into());
            }

            state.energy = Some(result.energy);
            state.forces = Some(result.forces.clone());

            match propagator.step(&state.structure, &result) {
                Ok(StepOutcome::Converged) => return TerminationReason::Converged,
                Ok(StepOutcome::Advanced {
                    structure,
                    needs_evaluation,
                }) => {
                    if !structure.all_finite() {
                        state.last_error =
                            Some(SimError::NumericalDivergence { step }.to_string());
                        return TerminationReason::Failed("NumericalDivergence".into());
                    }
                    state.structure = structure;
                    state.steps_completed = step + 1;
                    log::debug!(
                        "run {}: step {} done, energy {:?}",
                        self.run_id,
                        step,
                        state.energy
                    );
                    if !needs_evaluation {
                        // The propagator left the positions untouched, so the
                        // last result is still valid for the next step
                        cached = Some(result);
                    }
                    streamer.maybe_emit(step, &state.structure, state.energy);
                }
                Err(e) => {
                    state.last_error = Some(e.to_string());
                    let cause = match e {
                        SimError::NumericalDivergence { .. } => "NumericalDivergence",
                        SimError::ShapeMismatch { .. } => "ShapeMismatch",
                        _ => "EvaluationError",
                    };
                    return TerminationReason::Failed(cause.into());
                }
            }
        }

        TerminationReason::MaxStepsReached
    }
}
