#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use nalgebra::{Point3, Vector3};

use atomflow::core::domain::{Atom, Species, Structure};
use atomflow::engine::evaluator::{Potential, PotentialResult};
use atomflow::error::PotentialError;

/// Argon atoms spaced `spacing` apart along x, zero velocities.
pub fn argon_line(n: usize, spacing: f64) -> Structure {
    let species = vec![Species::new("Ar", 18, 39.948)];
    let atoms = (0..n)
        .map(|i| Atom {
            element_id: 0,
            position: Point3::new(i as f64 * spacing, 0.0, 0.0),
            velocity: Vector3::zeros(),
        })
        .collect();
    Structure::new(species, atoms, None)
}

/// Unit-mass atoms displaced from the origin, for harmonic-potential tests.
pub fn displaced_cluster(n: usize, offset: f64) -> Structure {
    let species = vec![Species::new("X", 1, 1.0)];
    let atoms = (0..n)
        .map(|i| Atom {
            element_id: 0,
            // Spread directions so atoms do not sit on top of each other
            position: Point3::new(
                offset * ((i % 3) as f64 + 1.0),
                offset * ((i % 5) as f64 - 2.0),
                offset * (i as f64 + 1.0),
            ),
            velocity: Vector3::zeros(),
        })
        .collect();
    Structure::new(species, atoms, None)
}

fn zero_result(n: usize) -> PotentialResult {
    PotentialResult {
        energy: 0.0,
        forces: vec![Vector3::zeros(); n],
        stress: None,
    }
}

/// Flat landscape: zero energy, zero forces everywhere.
pub struct ZeroForce;

impl Potential for ZeroForce {
    fn name(&self) -> &str {
        "zero-force"
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        Ok(zero_result(structure.len()))
    }
}

/// Constant non-zero force on every atom; never converges.
pub struct ConstantForce {
    pub magnitude: f64,
}

impl Potential for ConstantForce {
    fn name(&self) -> &str {
        "constant-force"
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        Ok(PotentialResult {
            energy: 0.0,
            forces: vec![Vector3::new(self.magnitude, 0.0, 0.0); structure.len()],
            stress: None,
        })
    }
}

/// Isotropic harmonic well centred on the origin: F = -k·x.
pub struct Harmonic {
    pub k: f64,
}

impl Potential for Harmonic {
    fn name(&self) -> &str {
        "harmonic"
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        let forces: Vec<Vector3<f64>> = structure
            .atoms
            .iter()
            .map(|a| -a.position.coords * self.k)
            .collect();
        let energy = 0.5
            * self.k
            * structure
                .atoms
                .iter()
                .map(|a| a.position.coords.norm_squared())
                .sum::<f64>();
        Ok(PotentialResult {
            energy,
            forces,
            stress: None,
        })
    }
}

/// Harmonic well that returns a NaN force on the `fail_at`-th evaluation.
pub struct NanAfter {
    pub fail_at: usize,
    calls: AtomicUsize,
}

impl NanAfter {
    pub fn new(fail_at: usize) -> Self {
        Self {
            fail_at,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Potential for NanAfter {
    fn name(&self) -> &str {
        "nan-after"
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut result = Harmonic { k: 1.0 }.evaluate(structure)?;
        if idx >= self.fail_at {
            result.forces[0].x = f64::NAN;
        }
        Ok(result)
    }
}

/// Fails the `fail_at`-th evaluation with an internal model error.
pub struct ErrorAfter {
    pub fail_at: usize,
    calls: AtomicUsize,
}

impl ErrorAfter {
    pub fn new(fail_at: usize) -> Self {
        Self {
            fail_at,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Potential for ErrorAfter {
    fn name(&self) -> &str {
        "error-after"
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        if idx >= self.fail_at {
            return Err(PotentialError::Evaluation(anyhow!("inference diverged")));
        }
        Harmonic { k: 1.0 }.evaluate(structure)
    }
}

/// Harmonic well with an artificial per-evaluation delay, for cancellation
/// timing tests.
pub struct Slow {
    pub delay: Duration,
}

impl Potential for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        std::thread::sleep(self.delay);
        Harmonic { k: 1.0 }.evaluate(structure)
    }
}

/// Potential parameterized for hydrogen only.
pub struct HydrogenOnly;

impl Potential for HydrogenOnly {
    fn name(&self) -> &str {
        "hydrogen-only"
    }

    fn supported_elements(&self) -> Option<&[u8]> {
        Some(&[1])
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        Ok(zero_result(structure.len()))
    }
}
