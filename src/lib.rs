//! Simulation driver for interactive 3D structure viewers.
//!
//! A host viewer hands over an atomic [`Structure`] and a [`RunSpec`]; this
//! crate runs the physics loop (geometry optimization or molecular dynamics
//! against a pluggable [`Potential`]) and streams intermediate frames back
//! over a channel for live rendering, with cooperative mid-run cancellation.

pub mod core;
pub mod engine;
pub mod error;
pub mod interface;
pub mod solvers;

pub use crate::core::domain::{
    Atom, Lattice, OptimizerKind, RunMode, RunSpec, Species, Structure, Thermostat,
};
pub use crate::engine::evaluator::{Potential, PotentialResult};
pub use crate::engine::lj::LennardJones;
pub use crate::engine::registry::PotentialRegistry;
pub use crate::error::{PotentialError, SimError};
pub use crate::interface::session::{RunHandle, SessionManager};
pub use crate::solvers::{
    Frame, RunController, RunEvent, RunState, RunSummary, TerminationReason,
};
