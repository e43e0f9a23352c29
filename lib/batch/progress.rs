use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};
use yansi::Paint;

use crate::request::ApiAction;

/// What one fired slot means for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    /// Slots fired so far, including this one.
    pub sent: usize,
    pub total: usize,
    /// First slot of the batch.
    pub started: bool,
    /// Decile (1..=10) whose threshold this slot reached, if any.
    pub decile: Option<usize>,
}

impl Milestone {
    pub fn is_complete(&self) -> bool {
        self.sent == self.total
    }

    pub fn log(&self, action: ApiAction) {
        if self.started {
            info!("{}", format!("Batch Start ({action})").underline());
            info!(
                "{} ({} of {})",
                format!("{action} - batch started").green(),
                1usize.green(),
                self.total.green()
            );
        }
        if self.decile.is_some() && !self.is_complete() {
            info!(
                "{} ({} of {})",
                format!("{action} - batch progress").green(),
                self.sent.green(),
                self.total.green()
            );
        }
    }
}

/// Counts fired slots of one batch and maps them onto decile thresholds.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    steps: Vec<usize>,
    sent: AtomicUsize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            steps: decile_steps(total),
            sent: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.sent.store(0, Ordering::SeqCst);
    }

    /// Marks one more slot as fired.
    pub fn advance(&self) -> Milestone {
        let sent = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let decile = self
            .steps
            .iter()
            .position(|step| *step == sent)
            .map(|idx| idx + 1);
        Milestone {
            sent,
            total: self.total,
            started: sent == 1,
            decile,
        }
    }
}

/// Ten thresholds `floor(total * k / 10)` for k in 1..=10.
pub fn decile_steps(total: usize) -> Vec<usize> {
    (1..=10).map(|k| total * k / 10).collect()
}
