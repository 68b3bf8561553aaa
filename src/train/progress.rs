use std::time::Duration;

use tracing::{debug, info};

/// Summary of one pass over the training data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// Epoch number, starting at 1
    pub epoch: usize,
    /// Streaming accuracy of the hypotheses made during the epoch
    pub accuracy: f64,
    /// Wall-clock time spent in the epoch
    pub elapsed: Duration,
}

/// Receives training progress from a [`Trainer`](super::Trainer)
pub trait Progress {
    fn on_train_begin(&mut self, _epochs: usize, _instances: usize) {}

    fn on_epoch_begin(&mut self, _epoch: usize) {}

    fn on_epoch_end(&mut self, report: &EpochReport);

    fn on_train_end(&mut self, _time: u64) {}
}

/// Reports progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn on_train_begin(&mut self, epochs: usize, instances: usize) {
        info!(epochs, instances, "Starting {} epoch(s) of training.", epochs);
    }

    fn on_epoch_begin(&mut self, epoch: usize) {
        info!("Starting epoch {:>2}.", epoch);
    }

    fn on_epoch_end(&mut self, report: &EpochReport) {
        debug!("Epoch {:>2} accuracy: {:.04}", report.epoch, report.accuracy);
        debug!(
            "Epoch {:>2} time elapsed: {}s.",
            report.epoch,
            report.elapsed.as_secs()
        );
    }

    fn on_train_end(&mut self, time: u64) {
        info!(time, "Training completed.");
    }
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_epoch_end(&mut self, _report: &EpochReport) {}
}

/// Collects every epoch report
impl Progress for Vec<EpochReport> {
    fn on_epoch_end(&mut self, report: &EpochReport) {
        self.push(*report);
    }
}
