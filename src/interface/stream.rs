use crossbeam_channel::Sender;
use uuid::Uuid;

use crate::core::domain::Structure;
use crate::solvers::{Frame, RunEvent};

/// Rate-limited publisher of intermediate structures.
///
/// Emission is decoupled from the numerical trajectory: a slow or vanished
/// host can drop frames on the floor but never stalls or aborts the step
/// loop. Frames go out in non-decreasing step order and the terminal frame
/// is never skipped.
pub struct FrameStreamer {
    run_id: Uuid,
    interval: usize,
    tx: Sender<RunEvent>,
    last_emitted: Option<usize>,
}

impl FrameStreamer {
    /// `interval` must be at least 1; validated by `RunSpec::validate`.
    pub fn new(run_id: Uuid, interval: usize, tx: Sender<RunEvent>) -> Self {
        debug_assert!(interval >= 1);
        Self {
            run_id,
            interval,
            tx,
            last_emitted: None,
        }
    }

    /// Emits when `step` lands on the configured interval.
    pub fn maybe_emit(&mut self, step: usize, structure: &Structure, energy: Option<f64>) {
        if step % self.interval == 0 {
            self.push(step, structure, energy);
        }
    }

    /// Emits unconditionally, unless this exact step just went out (a
    /// terminal step that is also an interval multiple is not duplicated).
    pub fn emit_terminal(&mut self, step: usize, structure: &Structure, energy: Option<f64>) {
        if self.last_emitted == Some(step) {
            return;
        }
        self.push(step, structure, energy);
    }

    fn push(&mut self, step: usize, structure: &Structure, energy: Option<f64>) {
        self.last_emitted = Some(step);
        let frame = Frame {
            run_id: self.run_id,
            step,
            structure: structure.clone(),
            energy,
        };
        if self.tx.send(RunEvent::Frame(frame)).is_err() {
            // Host ingestion is gone; the run itself carries on
            log::warn!("run {}: frame {} dropped, host unreachable", self.run_id, step);
        }
    }
}
