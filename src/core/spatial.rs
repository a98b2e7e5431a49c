use nalgebra::{Point3, Vector3};

use crate::core::domain::{Lattice, Structure};

/// Displacement vector from `p1` to `p2`.
/// If `lattice` is provided, applies Minimum Image Convention (MIC).
#[inline]
pub fn displacement(p1: &Point3<f64>, p2: &Point3<f64>, lattice: Option<&Lattice>) -> Vector3<f64> {
    match lattice {
        Some(lat) => {
            // Periodic: wrap the fractional delta to [-0.5, 0.5]
            let d_cart = p2 - p1;
            let mut d_frac = lat.inverse * d_cart;

            d_frac.x -= d_frac.x.round();
            d_frac.y -= d_frac.y.round();
            d_frac.z -= d_frac.z.round();

            lat.vectors * d_frac
        }
        None => p2 - p1,
    }
}

/// Squared distance between two points under MIC (if periodic).
#[inline]
pub fn distance_sq(p1: &Point3<f64>, p2: &Point3<f64>, lattice: Option<&Lattice>) -> f64 {
    displacement(p1, p2, lattice).norm_squared()
}

/// Wraps atom positions into the [0, 1) fractional box.
///
/// No-op for non-periodic structures. Velocities are untouched and the
/// trajectory is physically unchanged; positions only jump by whole lattice
/// vectors.
///
/// **Invariant**: Modifies positions in-place. Does NOT reorder atoms.
pub fn wrap_into_cell(structure: &mut Structure) {
    if let Some(lat) = &structure.lattice {
        for atom in &mut structure.atoms {
            let mut frac = lat.to_fractional(&atom.position);
            frac.coords.x = frac.coords.x.rem_euclid(1.0);
            frac.coords.y = frac.coords.y.rem_euclid(1.0);
            frac.coords.z = frac.coords.z.rem_euclid(1.0);
            atom.position = lat.to_cartesian(&frac);
        }
    }
}
