//! Per-frame progress bookkeeping and linear ETA extrapolation.

use std::time::Duration;

use serde::Serialize;

use crate::error::ColorizeError;
use crate::pipeline::Stage;
use crate::time_format::format_time;

/// Extrapolates the remaining time assuming every unit of work costs the same.
///
/// Returns `None` when nothing has completed yet, since there is no throughput
/// to extrapolate from.
pub fn estimate_remaining(completed: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(completed);
    let secs = elapsed.as_secs_f64() * remaining as f64 / completed as f64;
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

/// Progress of one run: how many units are done, out of how many, and how long
/// it has taken so far. `frames_completed <= frames_total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub frames_completed: u64,
    pub frames_total: u64,
    pub elapsed: Duration,
}

impl ProgressState {
    pub fn new(frames_total: u64) -> Self {
        Self {
            frames_completed: 0,
            frames_total,
            elapsed: Duration::ZERO,
        }
    }

    /// Marks one more unit as done.
    pub fn record_frame(&mut self, elapsed: Duration) -> Result<(), ColorizeError> {
        let completed = self.frames_completed + 1;
        if completed > self.frames_total {
            return Err(ColorizeError::ProgressOverflow {
                completed,
                total: self.frames_total,
            });
        }
        self.frames_completed = completed;
        self.elapsed = elapsed.max(self.elapsed);
        Ok(())
    }

    /// Grows the expected total, for sources that could not tell up front.
    pub fn extend_total(&mut self, at_least: u64) {
        self.frames_total = self.frames_total.max(at_least);
    }

    /// Shrinks the expected total to what was actually produced.
    pub fn rebase_total(&mut self) {
        self.frames_total = self.frames_completed;
    }

    pub fn remaining_frames(&self) -> u64 {
        self.frames_total.saturating_sub(self.frames_completed)
    }

    pub fn is_complete(&self) -> bool {
        self.frames_completed == self.frames_total
    }

    /// Position of a progress bar, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.frames_total == 0 {
            return 0.0;
        }
        self.frames_completed as f64 / self.frames_total as f64
    }

    pub fn eta(&self) -> Option<Duration> {
        estimate_remaining(self.frames_completed, self.frames_total, self.elapsed)
    }

    /// Text shown under the progress bar, or `None` once the last unit is done.
    pub fn remaining_text(&self) -> Option<String> {
        if self.is_complete() {
            return None;
        }
        self.eta()
            .map(|eta| format!("Time Remaining: {}", format_time(eta.as_secs_f64())))
    }
}

/// Receives progress updates from the drivers.
///
/// Every method has a no-op default so sinks only implement what they show.
pub trait ProgressSink {
    fn on_stage(&mut self, _stage: Stage) {}
    fn on_start(&mut self, _total: u64) {}
    fn on_frame(&mut self, _state: &ProgressState) {}
    fn on_finish(&mut self) {}
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

impl<P: ProgressSink + ?Sized> ProgressSink for &mut P {
    fn on_stage(&mut self, stage: Stage) {
        (**self).on_stage(stage)
    }
    fn on_start(&mut self, total: u64) {
        (**self).on_start(total)
    }
    fn on_frame(&mut self, state: &ProgressState) {
        (**self).on_frame(state)
    }
    fn on_finish(&mut self) {
        (**self).on_finish()
    }
}

impl<P: ProgressSink + ?Sized> ProgressSink for Box<P> {
    fn on_stage(&mut self, stage: Stage) {
        (**self).on_stage(stage)
    }
    fn on_start(&mut self, total: u64) {
        (**self).on_start(total)
    }
    fn on_frame(&mut self, state: &ProgressState) {
        (**self).on_frame(state)
    }
    fn on_finish(&mut self) {
        (**self).on_finish()
    }
}
