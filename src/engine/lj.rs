use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::core::domain::Structure;
use crate::core::spatial;
use crate::engine::evaluator::{Potential, PotentialResult};
use crate::error::PotentialError;

/// Classical 12-6 Lennard-Jones potential, truncated and shifted at the
/// cutoff. Serves as the lightweight fallback evaluator when no ML model is
/// selected; parameters apply uniformly to all species.
pub struct LennardJones {
    /// Well depth (eV).
    pub epsilon: f64,
    /// Zero-crossing distance (Å).
    pub sigma: f64,
    /// Interaction cutoff (Å).
    pub cutoff: f64,
}

impl Default for LennardJones {
    fn default() -> Self {
        Self {
            epsilon: 1.0,
            sigma: 1.0,
            cutoff: 3.0,
        }
    }
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64, cutoff: f64) -> Self {
        Self {
            epsilon,
            sigma,
            cutoff,
        }
    }

    /// Unshifted pair energy at squared distance `r_sq`.
    #[inline]
    fn pair_energy(&self, r_sq: f64) -> f64 {
        let s2 = self.sigma * self.sigma / r_sq;
        let s6 = s2 * s2 * s2;
        4.0 * self.epsilon * (s6 * s6 - s6)
    }

    /// Scalar force factor: F_i = factor * (r_i - r_j).
    #[inline]
    fn pair_force_factor(&self, r_sq: f64) -> f64 {
        let s2 = self.sigma * self.sigma / r_sq;
        let s6 = s2 * s2 * s2;
        24.0 * self.epsilon * (2.0 * s6 * s6 - s6) / r_sq
    }
}

impl Potential for LennardJones {
    fn name(&self) -> &str {
        "lennard-jones"
    }

    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError> {
        let n = structure.len();
        if n == 0 {
            return Err(PotentialError::EmptyStructure);
        }

        let cutoff_sq = self.cutoff * self.cutoff;
        let shift = self.pair_energy(cutoff_sq);
        let lattice = structure.lattice.as_ref();
        let atoms = &structure.atoms;

        // Per-atom accumulation: full force on i, half of each pair energy
        // and virial (every pair is visited from both ends).
        let per_atom: Vec<(Vector3<f64>, f64, Matrix3<f64>)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut force = Vector3::zeros();
                let mut energy = 0.0;
                let mut virial = Matrix3::zeros();

                for j in 0..n {
                    if j == i {
                        continue;
                    }
                    // d points from j to i under MIC
                    let d = spatial::displacement(&atoms[j].position, &atoms[i].position, lattice);
                    let r_sq = d.norm_squared();
                    if r_sq >= cutoff_sq {
                        continue;
                    }

                    let f = d * self.pair_force_factor(r_sq);
                    force += f;
                    energy += 0.5 * (self.pair_energy(r_sq) - shift);
                    virial += 0.5 * d * f.transpose();
                }

                (force, energy, virial)
            })
            .collect();

        let forces: Vec<Vector3<f64>> = per_atom.iter().map(|(f, _, _)| *f).collect();
        let energy: f64 = per_atom.iter().map(|(_, e, _)| e).sum();

        let stress = lattice.map(|lat| {
            let virial = per_atom
                .iter()
                .fold(Matrix3::zeros(), |acc, (_, _, w)| acc + w);
            -virial / lat.volume()
        });

        Ok(PotentialResult {
            energy,
            forces,
            stress,
        })
    }
}
