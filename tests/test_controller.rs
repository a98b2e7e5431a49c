use std::sync::Arc;

use crossbeam_channel::unbounded;

use atomflow::core::domain::{OptimizerKind, RunMode, RunSpec};
use atomflow::error::{PotentialError, SimError};
use atomflow::solvers::{RunController, RunEvent, TerminationReason};

use crate::common::{
    argon_line, displaced_cluster, ConstantForce, ErrorAfter, HydrogenOnly, NanAfter, ZeroForce,
};

mod common;

fn md_spec(max_steps: usize) -> RunSpec {
    RunSpec {
        mode: RunMode::Dynamics {
            timestep_fs: 0.5,
            thermostat: None,
            init_temperature_k: None,
        },
        max_steps,
        frame_emit_interval: 1,
        seed: Some(42),
    }
}

fn frame_steps(rx: &crossbeam_channel::Receiver<RunEvent>) -> Vec<usize> {
    rx.try_iter()
        .filter_map(|evt| match evt {
            RunEvent::Frame(f) => Some(f.step),
            _ => None,
        })
        .collect()
}

#[test]
fn zero_force_landscape_converges_without_stepping() {
    let mut spec = RunSpec::optimization(OptimizerKind::SteepestDescent);
    spec.max_steps = 10;
    let controller = RunController::new(spec, Arc::new(ZeroForce)).unwrap();
    let (tx, rx) = unbounded();

    let state = controller.run(argon_line(4, 3.0), &tx).unwrap();

    assert_eq!(state.reason, Some(TerminationReason::Converged));
    assert_eq!(state.steps_completed, 0);
    // Terminal frame for step 0 still goes out
    assert_eq!(frame_steps(&rx), vec![0]);
}

#[test]
fn non_convergent_run_executes_exactly_max_steps() {
    let mut spec = RunSpec::optimization(OptimizerKind::SteepestDescent);
    spec.max_steps = 7;
    let controller = RunController::new(spec, Arc::new(ConstantForce { magnitude: 1.0 })).unwrap();
    let (tx, rx) = unbounded();

    let state = controller.run(argon_line(3, 3.0), &tx).unwrap();

    assert_eq!(state.reason, Some(TerminationReason::MaxStepsReached));
    assert_eq!(state.steps_completed, 7);

    let finished = rx.try_iter().any(|evt| {
        matches!(evt, RunEvent::Finished(s) if s.reason == TerminationReason::MaxStepsReached)
    });
    assert!(finished, "host never got the completion notification");
}

#[test]
fn cancellation_before_first_step_completes_no_steps() {
    let controller = RunController::new(md_spec(50), Arc::new(ZeroForce)).unwrap();
    controller
        .cancel_token()
        .store(true, std::sync::atomic::Ordering::Relaxed);
    let (tx, rx) = unbounded();

    let state = controller.run(argon_line(4, 3.0), &tx).unwrap();

    assert_eq!(state.reason, Some(TerminationReason::Cancelled));
    assert_eq!(state.steps_completed, 0);
    assert!(state.energy.is_none(), "no evaluation may happen after cancel");
    assert_eq!(frame_steps(&rx), vec![0]);
}

#[test]
fn nan_force_mid_dynamics_fails_with_divergence() {
    let controller =
        RunController::new(md_spec(10), Arc::new(NanAfter::new(3))).unwrap();
    let (tx, rx) = unbounded();

    let state = controller.run(displaced_cluster(4, 0.5), &tx).unwrap();

    let reason = state.reason.clone().unwrap();
    assert_eq!(reason, TerminationReason::Failed("NumericalDivergence".into()));
    assert_eq!(reason.to_string(), "Failed:NumericalDivergence");
    assert_eq!(state.steps_completed, 3);
    assert!(state.last_error.is_some());

    // Frames for the completed steps were already out before the failure
    assert_eq!(frame_steps(&rx), vec![0, 1, 2, 3]);
    assert!(state.structure.all_finite(), "committed structure stays finite");
}

#[test]
fn evaluation_error_is_run_fatal_and_recorded() {
    let controller = RunController::new(md_spec(10), Arc::new(ErrorAfter::new(2))).unwrap();
    let (tx, _rx) = unbounded();

    let state = controller.run(displaced_cluster(4, 0.5), &tx).unwrap();

    assert_eq!(
        state.reason,
        Some(TerminationReason::Failed("EvaluationError".into()))
    );
    assert_eq!(state.steps_completed, 2);
    let err = state.last_error.unwrap();
    assert!(err.contains("inference diverged"), "got: {err}");
}

#[test]
fn unsupported_species_rejected_before_any_step() {
    let controller = RunController::new(md_spec(10), Arc::new(HydrogenOnly)).unwrap();
    let (tx, rx) = unbounded();

    let err = controller.run(argon_line(4, 3.0), &tx).unwrap_err();

    match err {
        SimError::Potential(PotentialError::UnsupportedSpecies { symbol }) => {
            assert_eq!(symbol, "Ar");
        }
        other => panic!("expected UnsupportedSpecies, got {other:?}"),
    }
    assert!(rx.try_iter().next().is_none(), "no events for a rejected run");
}

#[test]
fn empty_structure_rejected_before_any_step() {
    let controller = RunController::new(md_spec(10), Arc::new(ZeroForce)).unwrap();
    let (tx, _rx) = unbounded();

    let err = controller.run(argon_line(0, 3.0), &tx).unwrap_err();
    assert!(matches!(err, SimError::InvalidSpec(_)));
}

#[test]
fn invalid_specs_rejected_at_construction() {
    let mut spec = md_spec(10);
    spec.mode = RunMode::Dynamics {
        timestep_fs: 0.0,
        thermostat: None,
        init_temperature_k: None,
    };
    assert!(matches!(
        RunController::new(spec, Arc::new(ZeroForce)),
        Err(SimError::InvalidSpec(_))
    ));

    let mut spec = md_spec(10);
    spec.frame_emit_interval = 0;
    assert!(matches!(
        RunController::new(spec, Arc::new(ZeroForce)),
        Err(SimError::InvalidSpec(_))
    ));

    let spec = md_spec(1001);
    assert!(matches!(
        RunController::new(spec, Arc::new(ZeroForce)),
        Err(SimError::InvalidSpec(_))
    ));

    let mut spec = RunSpec::optimization(OptimizerKind::Fire);
    spec.mode = RunMode::Optimization {
        algorithm: OptimizerKind::Fire,
        fmax: -0.1,
    };
    assert!(matches!(
        RunController::new(spec, Arc::new(ZeroForce)),
        Err(SimError::InvalidSpec(_))
    ));
}

#[test]
fn atom_count_and_species_survive_every_step() {
    let initial = displaced_cluster(6, 0.4);
    let initial_ids: Vec<usize> = initial.atoms.iter().map(|a| a.element_id).collect();

    let controller = RunController::new(md_spec(5), Arc::new(NanAfter::new(100))).unwrap();
    let (tx, _rx) = unbounded();
    let state = controller.run(initial.clone(), &tx).unwrap();

    assert_eq!(state.reason, Some(TerminationReason::MaxStepsReached));
    assert_eq!(state.structure.len(), initial.len());
    let final_ids: Vec<usize> = state.structure.atoms.iter().map(|a| a.element_id).collect();
    assert_eq!(final_ids, initial_ids);
    assert_eq!(state.structure.species.len(), initial.species.len());
}

#[test]
fn zero_max_steps_terminates_immediately() {
    let controller = RunController::new(md_spec(0), Arc::new(ZeroForce)).unwrap();
    let (tx, rx) = unbounded();

    let state = controller.run(argon_line(2, 3.0), &tx).unwrap();

    assert_eq!(state.reason, Some(TerminationReason::MaxStepsReached));
    assert_eq!(state.steps_completed, 0);
    assert_eq!(frame_steps(&rx), vec![0]);
}
