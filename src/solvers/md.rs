use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::core::domain::{Structure, Thermostat};
use crate::core::spatial;
use crate::core::units;
use crate::engine::evaluator::PotentialResult;
use crate::error::SimError;
use crate::solvers::StepOutcome;

/// Velocity-Verlet integrator with an optional Langevin thermostat.
///
/// Each call closes the previous step's velocity update with the fresh
/// forces, applies the thermostat, opens the next half-kick and drifts the
/// positions, so exactly one force evaluation is spent per step. Velocities
/// in the final snapshot are therefore half a step behind the positions
/// (leapfrog-equivalent).
pub struct VelocityVerlet {
    dt: f64,
    thermostat: Option<Thermostat>,
    rng: ChaCha8Rng,
    half_stepped: bool,
}

impl VelocityVerlet {
    pub fn new(timestep_fs: f64, thermostat: Option<Thermostat>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            dt: timestep_fs,
            thermostat,
            rng,
            half_stepped: false,
        }
    }

    pub fn step(
        &mut self,
        structure: &Structure,
        result: &PotentialResult,
    ) -> Result<StepOutcome, SimError> {
        let n = structure.len();
        if result.forces.len() != n {
            return Err(SimError::ShapeMismatch {
                expected: n,
                actual: result.forces.len(),
            });
        }

        let half_dt = 0.5 * self.dt;
        let mut velocities: Vec<Vector3<f64>> =
            structure.atoms.iter().map(|a| a.velocity).collect();

        // Accelerations in Å/fs²
        let accel: Vec<Vector3<f64>> = result
            .forces
            .iter()
            .enumerate()
            .map(|(i, f)| f * (units::ACC_EV_PER_A_AMU / structure.mass(i)))
            .collect();

        // Closing half-kick of the previous step, now that the forces at the
        // drifted positions are known
        if self.half_stepped {
            for (v, a) in velocities.iter_mut().zip(accel.iter()) {
                *v += a * half_dt;
            }
        }

        if let Some(th) = self.thermostat {
            self.apply_langevin(structure, &th, &mut velocities);
        }

        // Opening half-kick and drift
        for (v, a) in velocities.iter_mut().zip(accel.iter()) {
            *v += a * half_dt;
        }
        let delta: Vec<Vector3<f64>> = velocities.iter().map(|v| v * self.dt).collect();

        let mut next = structure
            .with_velocities(&velocities)?
            .apply_displacement(&delta)?;
        spatial::wrap_into_cell(&mut next);

        self.half_stepped = true;
        Ok(StepOutcome::Advanced {
            structure: next,
            needs_evaluation: true,
        })
    }

    /// Ornstein-Uhlenbeck velocity update:
    /// v ← c1·v + sqrt((1 − c1²)·kB·T/m)·ξ with c1 = exp(−γ·dt).
    fn apply_langevin(
        &mut self,
        structure: &Structure,
        th: &Thermostat,
        velocities: &mut [Vector3<f64>],
    ) {
        if th.friction_inv_fs == 0.0 {
            return;
        }
        let c1 = (-th.friction_inv_fs * self.dt).exp();
        let c2 = ((1.0 - c1 * c1) * units::KB_EV * th.temperature_k * units::ACC_EV_PER_A_AMU)
            .sqrt();

        for (i, v) in velocities.iter_mut().enumerate() {
            let sigma = c2 / structure.mass(i).sqrt();
            let noise = Vector3::new(
                self.rng.sample::<f64, _>(StandardNormal),
                self.rng.sample::<f64, _>(StandardNormal),
                self.rng.sample::<f64, _>(StandardNormal),
            );
            *v = *v * c1 + noise * sigma;
        }
    }
}

/// Draws velocities from a Maxwell-Boltzmann distribution at `temperature_k`
/// and removes the centre-of-mass drift.
pub fn seed_velocities(
    structure: &Structure,
    temperature_k: f64,
    rng: &mut impl Rng,
) -> Result<Structure, SimError> {
    let n = structure.len();
    if temperature_k == 0.0 {
        return structure.with_velocities(&vec![Vector3::zeros(); n]);
    }

    let mut velocities = Vec::with_capacity(n);
    for i in 0..n {
        let sigma =
            (units::KB_EV * temperature_k * units::ACC_EV_PER_A_AMU / structure.mass(i)).sqrt();
        velocities.push(Vector3::new(
            sigma * rng.sample::<f64, _>(StandardNormal),
            sigma * rng.sample::<f64, _>(StandardNormal),
            sigma * rng.sample::<f64, _>(StandardNormal),
        ));
    }

    // Zero total momentum
    let total_mass: f64 = (0..n).map(|i| structure.mass(i)).sum();
    let momentum: Vector3<f64> = velocities
        .iter()
        .enumerate()
        .map(|(i, v)| v * structure.mass(i))
        .sum();
    let drift = momentum / total_mass;
    for v in velocities.iter_mut() {
        *v -= drift;
    }

    structure.with_velocities(&velocities)
}
