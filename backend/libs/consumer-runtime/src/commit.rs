use std::time::Duration;
use tokio::time::Instant;

/// Decides when stored offsets are due for a commit
///
/// A commit is due once `threshold` handled messages are pending or once
/// `interval` has passed since the last commit with anything pending,
/// whichever comes first.
#[derive(Debug)]
pub(crate) struct CommitTracker {
    threshold: usize,
    interval: Duration,
    pending: usize,
    last_commit: Instant,
}

impl CommitTracker {
    pub(crate) fn new(threshold: usize, interval: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            interval,
            pending: 0,
            last_commit: Instant::now(),
        }
    }

    pub(crate) fn record(&mut self) {
        self.pending += 1;
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending
    }

    pub(crate) fn is_due(&self) -> bool {
        self.pending >= self.threshold
            || (self.pending > 0 && self.last_commit.elapsed() >= self.interval)
    }

    pub(crate) fn committed(&mut self) {
        self.pending = 0;
        self.last_commit = Instant::now();
    }
}
