//! Physical constants and unit conversions.
//!
//! Internal unit system: lengths in Angstrom, energies in eV, masses in amu,
//! time in femtoseconds, temperatures in Kelvin.

/// Boltzmann constant (eV/K).
pub const KB_EV: f64 = 8.617333262e-5;

/// Conversion from amu·Å²/fs² to eV.
///
/// Kinetic energy computed as 0.5·m·v² in internal units must be multiplied
/// by this factor to land in eV.
pub const EV_PER_AMU_A2_FS2: f64 = 103.642_696_6;

/// Acceleration conversion: (eV/Å)/amu → Å/fs².
pub const ACC_EV_PER_A_AMU: f64 = 1.0 / EV_PER_AMU_A2_FS2;
