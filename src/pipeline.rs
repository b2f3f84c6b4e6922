//! Staged drivers for a whole compression or decompression run.
//!
//! A pipeline owns all of its state for the duration of one run and reports
//! to the host through an [`Observer`]. It never touches the sink until the
//! complete output exists in memory, so a failed run writes nothing.

mod compress;
mod decompress;

use tracing::debug;

pub use self::compress::CompressionPipeline;
pub use self::decompress::DecompressionPipeline;
use crate::{
    observer::{Observer, Summary},
    Error,
};

/// Wraps the host's observer, enforcing the progress contract: each stage
/// starts at 0.0, fractions are clamped to [0, 1] and never go backwards, and
/// increases smaller than `step` are skipped (except the final 1.0).
struct Reporter<O> {
    observer: O,
    step: f64,
    last: f64,
}

impl<O: Observer> Reporter<O> {
    fn new(observer: O, step: f64) -> Self {
        Self {
            observer,
            step,
            last: 0.0,
        }
    }

    fn begin_stage(&mut self, message: &str) {
        debug!(message, "entering stage");
        self.observer.on_status(message);
        self.last = 0.0;
        self.observer.on_progress(0.0);
    }

    fn progress(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let due = fraction >= self.last + self.step || fraction == 1.0;

        if due && fraction > self.last {
            self.last = fraction;
            self.observer.on_progress(fraction);
        }
    }

    /// Terminal status plus `on_finish`. Called once per run.
    fn finish(&mut self, outcome: Result<&Summary, &Error>, success_message: &str) {
        match outcome {
            Ok(_) => self.observer.on_status(success_message),
            Err(e) => self.observer.on_status(&format!("Error: {e}")),
        }
        self.observer.on_finish(outcome);
    }
}
