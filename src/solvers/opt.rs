use nalgebra::Vector3;

use crate::core::domain::{OptimizerKind, Structure};
use crate::engine::evaluator::PotentialResult;
use crate::error::SimError;
use crate::solvers::{clamp_displacements, StepOutcome};

/// Largest per-atom displacement an optimizer step may apply (Å).
const MAX_DISP: f64 = 0.2;

/// Geometry optimizers. Convergence is tested on the incoming forces before
/// any displacement, so a structure already below the threshold converges
/// with zero steps executed.
pub enum Optimizer {
    SteepestDescent(SteepestDescent),
    Fire(Fire),
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, fmax: f64) -> Self {
        match kind {
            OptimizerKind::SteepestDescent => Optimizer::SteepestDescent(SteepestDescent::new(fmax)),
            OptimizerKind::Fire => Optimizer::Fire(Fire::new(fmax)),
        }
    }

    pub fn step(
        &mut self,
        structure: &Structure,
        result: &PotentialResult,
    ) -> Result<StepOutcome, SimError> {
        match self {
            Optimizer::SteepestDescent(sd) => sd.step(structure, result),
            Optimizer::Fire(fire) => fire.step(structure, result),
        }
    }
}

/// Gradient descent along the forces with a multiplicative step-size
/// adaptation: grow while the energy keeps dropping, halve on an uphill step.
pub struct SteepestDescent {
    fmax: f64,
    step_size: f64, // Å² / eV
    last_energy: Option<f64>,
}

impl SteepestDescent {
    const INITIAL_STEP: f64 = 0.05;
    const MAX_STEP: f64 = 0.2;

    pub fn new(fmax: f64) -> Self {
        Self {
            fmax,
            step_size: Self::INITIAL_STEP,
            last_energy: None,
        }
    }

    fn step(
        &mut self,
        structure: &Structure,
        result: &PotentialResult,
    ) -> Result<StepOutcome, SimError> {
        if result.max_force() <= self.fmax {
            return Ok(StepOutcome::Converged);
        }

        if let Some(e_prev) = self.last_energy {
            if result.energy > e_prev {
                self.step_size *= 0.5;
            } else {
                self.step_size = (self.step_size * 1.1).min(Self::MAX_STEP);
            }
        }
        self.last_energy = Some(result.energy);

        let mut delta: Vec<Vector3<f64>> =
            result.forces.iter().map(|f| f * self.step_size).collect();
        clamp_displacements(&mut delta, MAX_DISP);

        Ok(StepOutcome::Advanced {
            structure: structure.apply_displacement(&delta)?,
            needs_evaluation: true,
        })
    }
}

/// FIRE (Fast Inertial Relaxation Engine).
///
/// Fictitious unit-mass velocities are integrated alongside the geometry and
/// steered towards the force direction; uphill motion zeroes them and resets
/// the time step.
pub struct Fire {
    fmax: f64,
    dt: f64,
    alpha: f64,
    steps_downhill: usize,
    velocities: Vec<Vector3<f64>>,
}

impl Fire {
    const DT_INITIAL: f64 = 0.1;
    const DT_MAX: f64 = 1.0;
    const N_MIN: usize = 5;
    const F_INC: f64 = 1.1;
    const F_DEC: f64 = 0.5;
    const ALPHA_START: f64 = 0.1;
    const F_ALPHA: f64 = 0.99;

    pub fn new(fmax: f64) -> Self {
        Self {
            fmax,
            dt: Self::DT_INITIAL,
            alpha: Self::ALPHA_START,
            steps_downhill: 0,
            velocities: Vec::new(),
        }
    }

    fn step(
        &mut self,
        structure: &Structure,
        result: &PotentialResult,
    ) -> Result<StepOutcome, SimError> {
        if result.max_force() <= self.fmax {
            return Ok(StepOutcome::Converged);
        }

        let n = structure.len();
        if self.velocities.len() != n {
            self.velocities = vec![Vector3::zeros(); n];
        }

        let power: f64 = self
            .velocities
            .iter()
            .zip(result.forces.iter())
            .map(|(v, f)| v.dot(f))
            .sum();

        if power > 0.0 {
            // Downhill: mix velocities towards the force direction
            let v_norm: f64 = self
                .velocities
                .iter()
                .map(|v| v.norm_squared())
                .sum::<f64>()
                .sqrt();
            let f_norm: f64 = result
                .forces
                .iter()
                .map(|f| f.norm_squared())
                .sum::<f64>()
                .sqrt();
            if f_norm > 0.0 {
                let scale = self.alpha * v_norm / f_norm;
                for (v, f) in self.velocities.iter_mut().zip(result.forces.iter()) {
                    *v = *v * (1.0 - self.alpha) + f * scale;
                }
            }

            self.steps_downhill += 1;
            if self.steps_downhill > Self::N_MIN {
                self.dt = (self.dt * Self::F_INC).min(Self::DT_MAX);
                self.alpha *= Self::F_ALPHA;
            }
        } else {
            // Uphill: freeze and restart the inertia build-up
            for v in self.velocities.iter_mut() {
                *v = Vector3::zeros();
            }
            self.dt *= Self::F_DEC;
            self.alpha = Self::ALPHA_START;
            self.steps_downhill = 0;
        }

        // Semi-implicit Euler with unit mass
        for (v, f) in self.velocities.iter_mut().zip(result.forces.iter()) {
            *v += f * self.dt;
        }
        let mut delta: Vec<Vector3<f64>> = self.velocities.iter().map(|v| v * self.dt).collect();
        clamp_displacements(&mut delta, MAX_DISP);

        Ok(StepOutcome::Advanced {
            structure: structure.apply_displacement(&delta)?,
            needs_evaluation: true,
        })
    }
}
