use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::domain::Structure;
use crate::error::PotentialError;

/// The result of a single energy/force evaluation.
///
/// Produced fresh on every call; results are never cached across steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialResult {
    /// Potential energy (eV).
    pub energy: f64,
    /// Per-atom forces (eV/Å), same ordering and count as the input structure.
    pub forces: Vec<Vector3<f64>>,
    /// Virial stress tensor (eV/Å³), periodic structures only.
    pub stress: Option<Matrix3<f64>>,
}

impl PotentialResult {
    /// Max per-atom force magnitude, the optimizer convergence measure.
    pub fn max_force(&self) -> f64 {
        self.forces.iter().map(|f| f.norm()).fold(0.0, f64::max)
    }

    pub fn all_finite(&self) -> bool {
        self.energy.is_finite()
            && self.forces.iter().all(|f| f.iter().all(|c| c.is_finite()))
            && self
                .stress
                .as_ref()
                .map_or(true, |s| s.iter().all(|c| c.is_finite()))
    }
}

/// A uniform interface over interatomic potentials (machine-learned or
/// classical). Implementations must be thread-safe: model weights may be
/// shared read-only across concurrent runs.
pub trait Potential: Send + Sync {
    /// Evaluates energy and forces for `structure`.
    ///
    /// Guarantees on success: `forces.len() == structure.len()`, same atom
    /// ordering. Evaluation is the dominant per-step cost.
    fn evaluate(&self, structure: &Structure) -> Result<PotentialResult, PotentialError>;

    /// Name of the backing model (e.g. "lennard-jones").
    fn name(&self) -> &str;

    /// Atomic numbers this potential was trained on / parameterized for.
    /// `None` means unrestricted.
    fn supported_elements(&self) -> Option<&[u8]> {
        None
    }
}

impl std::fmt::Debug for dyn Potential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Potential").field("name", &self.name()).finish()
    }
}

/// Pre-flight check that every species in `structure` is a member of the
/// potential's supported element set.
pub fn check_species(
    potential: &dyn Potential,
    structure: &Structure,
) -> Result<(), PotentialError> {
    if structure.is_empty() {
        return Err(PotentialError::EmptyStructure);
    }
    let Some(supported) = potential.supported_elements() else {
        return Ok(());
    };
    for spec in &structure.species {
        if !supported.contains(&spec.atomic_number) {
            return Err(PotentialError::UnsupportedSpecies {
                symbol: spec.symbol.clone(),
            });
        }
    }
    Ok(())
}
