use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::units;
use crate::error::SimError;

// --- Constants ---

/// Hard cap on structure size accepted for a run.
pub const MAX_ATOMS: usize = 1000;
/// Hard cap on the number of steps a single run may request.
pub const MAX_RUN_STEPS: usize = 1000;

// --- Physics Types ---

/// A single chemical element/species and its properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Species {
    pub symbol: String,
    pub atomic_number: u8,
    pub mass: f64, // amu
}

impl Species {
    pub fn new(symbol: &str, atomic_number: u8, mass: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            atomic_number,
            mass,
        }
    }
}

/// A single atom instance in a structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    pub element_id: usize, // Index into the Structure.species list
    pub position: Point3<f64>,
    pub velocity: Vector3<f64>,
}

/// Periodic boundary conditions (if any).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    pub vectors: Matrix3<f64>, // Columns are a, b, c
    pub inverse: Matrix3<f64>, // Precomputed for fractional conversion
}

impl Lattice {
    pub fn new(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Option<Self> {
        let vectors = Matrix3::from_columns(&[a, b, c]);
        let inverse = vectors.try_inverse()?;
        Some(Self { vectors, inverse })
    }

    pub fn to_fractional(&self, p: &Point3<f64>) -> Point3<f64> {
        let v = self.inverse * p.coords;
        Point3::from(v)
    }

    pub fn to_cartesian(&self, p: &Point3<f64>) -> Point3<f64> {
        let v = self.vectors * p.coords;
        Point3::from(v)
    }

    pub fn volume(&self) -> f64 {
        self.vectors.determinant().abs()
    }
}

// --- The Core Entity ---

/// A snapshot of an atomic configuration.
///
/// Atom count and species assignments are fixed for the duration of a run;
/// every integrator step produces a new snapshot via
/// [`apply_displacement`](Structure::apply_displacement) and
/// [`with_velocities`](Structure::with_velocities) rather than mutating
/// shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub species: Vec<Species>,
    pub atoms: Vec<Atom>,
    pub lattice: Option<Lattice>,
}

impl Structure {
    pub fn new(species: Vec<Species>, atoms: Vec<Atom>, lattice: Option<Lattice>) -> Self {
        Self {
            species,
            atoms,
            lattice,
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Mass of atom `i` in amu. `element_id` must be in range;
    /// [`validate`](Structure::validate) checks this up front.
    pub fn mass(&self, i: usize) -> f64 {
        self.species[self.atoms[i].element_id].mass
    }

    /// Returns a snapshot with positions displaced by `delta`.
    pub fn apply_displacement(&self, delta: &[Vector3<f64>]) -> Result<Structure, SimError> {
        if delta.len() != self.atoms.len() {
            return Err(SimError::ShapeMismatch {
                expected: self.atoms.len(),
                actual: delta.len(),
            });
        }
        let mut next = self.clone();
        for (atom, d) in next.atoms.iter_mut().zip(delta.iter()) {
            atom.position += d;
        }
        Ok(next)
    }

    /// Returns a snapshot with velocities replaced by `velocities`.
    pub fn with_velocities(&self, velocities: &[Vector3<f64>]) -> Result<Structure, SimError> {
        if velocities.len() != self.atoms.len() {
            return Err(SimError::ShapeMismatch {
                expected: self.atoms.len(),
                actual: velocities.len(),
            });
        }
        let mut next = self.clone();
        for (atom, v) in next.atoms.iter_mut().zip(velocities.iter()) {
            atom.velocity = *v;
        }
        Ok(next)
    }

    /// Total kinetic energy (eV).
    pub fn kinetic_energy(&self) -> f64 {
        let mut ke = 0.0;
        for (i, atom) in self.atoms.iter().enumerate() {
            ke += 0.5 * self.mass(i) * atom.velocity.norm_squared();
        }
        ke * units::EV_PER_AMU_A2_FS2
    }

    /// Instantaneous kinetic temperature (K), assuming 3N degrees of freedom.
    pub fn temperature(&self) -> f64 {
        let n = self.atoms.len();
        if n == 0 {
            return 0.0;
        }
        2.0 * self.kinetic_energy() / (3.0 * n as f64 * units::KB_EV)
    }

    /// True when every position and velocity component is finite.
    pub fn all_finite(&self) -> bool {
        self.atoms.iter().all(|a| {
            a.position.coords.iter().all(|c| c.is_finite())
                && a.velocity.iter().all(|c| c.is_finite())
        })
    }

    /// Structural invariants checked once before a run starts.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.atoms.is_empty() {
            return Err(SimError::InvalidSpec("structure contains no atoms".into()));
        }
        if self.atoms.len() > MAX_ATOMS {
            return Err(SimError::InvalidSpec(format!(
                "structure has {} atoms, limit is {}",
                self.atoms.len(),
                MAX_ATOMS
            )));
        }
        for atom in &self.atoms {
            if atom.element_id >= self.species.len() {
                return Err(SimError::InvalidSpec(format!(
                    "atom references unknown species index {}",
                    atom.element_id
                )));
            }
        }
        for spec in &self.species {
            if !(spec.mass.is_finite() && spec.mass > 0.0) {
                return Err(SimError::InvalidSpec(format!(
                    "species '{}' has non-positive mass",
                    spec.symbol
                )));
            }
        }
        if !self.all_finite() {
            return Err(SimError::InvalidSpec(
                "structure has non-finite coordinates".into(),
            ));
        }
        Ok(())
    }
}

// --- Configuration Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    SteepestDescent,
    Fire,
}

/// Langevin coupling parameters for NVT dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thermostat {
    pub temperature_k: f64,
    pub friction_inv_fs: f64,
}

impl Default for Thermostat {
    fn default() -> Self {
        Self {
            temperature_k: 300.0,
            friction_inv_fs: 0.002,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunMode {
    Optimization {
        algorithm: OptimizerKind,
        /// Convergence threshold on the max per-atom force magnitude (eV/Å).
        fmax: f64,
    },
    Dynamics {
        timestep_fs: f64,
        thermostat: Option<Thermostat>,
        /// Draw initial velocities from a Maxwell-Boltzmann distribution at
        /// this temperature before the first step. Existing velocities are
        /// kept when unset.
        init_temperature_k: Option<f64>,
    },
}

/// Immutable description of one requested run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub mode: RunMode,
    pub max_steps: usize,
    /// Emit a frame every this many steps (the terminal frame is always
    /// emitted regardless).
    pub frame_emit_interval: usize,
    pub seed: Option<u64>,
}

impl RunSpec {
    pub fn optimization(algorithm: OptimizerKind) -> Self {
        Self {
            mode: RunMode::Optimization {
                algorithm,
                fmax: 0.05,
            },
            max_steps: 100,
            frame_emit_interval: 1,
            seed: None,
        }
    }

    pub fn dynamics() -> Self {
        Self {
            mode: RunMode::Dynamics {
                timestep_fs: 0.5,
                thermostat: Some(Thermostat::default()),
                init_temperature_k: None,
            },
            max_steps: 100,
            frame_emit_interval: 1,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.max_steps > MAX_RUN_STEPS {
            return Err(SimError::InvalidSpec(format!(
                "max_steps {} exceeds limit {}",
                self.max_steps, MAX_RUN_STEPS
            )));
        }
        if self.frame_emit_interval == 0 {
            return Err(SimError::InvalidSpec(
                "frame_emit_interval must be at least 1".into(),
            ));
        }
        match &self.mode {
            RunMode::Optimization { fmax, .. } => {
                if !(fmax.is_finite() && *fmax > 0.0) {
                    return Err(SimError::InvalidSpec(
                        "fmax must be finite and positive".into(),
                    ));
                }
            }
            RunMode::Dynamics {
                timestep_fs,
                thermostat,
                init_temperature_k,
            } => {
                if !(timestep_fs.is_finite() && *timestep_fs > 0.0) {
                    return Err(SimError::InvalidSpec(
                        "timestep must be finite and positive".into(),
                    ));
                }
                if let Some(th) = thermostat {
                    if !(th.temperature_k.is_finite() && th.temperature_k >= 0.0) {
                        return Err(SimError::InvalidSpec(
                            "thermostat temperature must be finite and non-negative".into(),
                        ));
                    }
                    if !(th.friction_inv_fs.is_finite() && th.friction_inv_fs >= 0.0) {
                        return Err(SimError::InvalidSpec(
                            "thermostat friction must be finite and non-negative".into(),
                        ));
                    }
                }
                if let Some(t) = init_temperature_k {
                    if !(t.is_finite() && *t >= 0.0) {
                        return Err(SimError::InvalidSpec(
                            "initial temperature must be finite and non-negative".into(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
