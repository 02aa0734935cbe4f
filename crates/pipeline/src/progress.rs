//! Non-blocking delivery of progress updates to a job observer.

use std::sync::Arc;

use ledgerlift_core::progress::{Phase, ProgressUpdate};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Observer invoked with every progress update of a run.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Queues updates onto a dedicated task so a slow observer never stalls
/// the pipeline. Reported percentages never decrease.
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ProgressUpdate>>,
    task: Option<JoinHandle<()>>,
    last_percentage: f64,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        let Some(callback) = callback else {
            return Self {
                tx: None,
                task: None,
                last_percentage: 0.0,
            };
        };
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
        let task = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                callback(update);
            }
        });
        Self {
            tx: Some(tx),
            task: Some(task),
            last_percentage: 0.0,
        }
    }

    pub fn report(&mut self, phase: Phase, completed: usize, total: usize, message: impl Into<String>) {
        let mut update = ProgressUpdate::new(phase, completed, total, message);
        update.percentage = update.percentage.max(self.last_percentage);
        self.last_percentage = update.percentage;
        tracing::debug!(
            phase = %phase,
            completed,
            total,
            percentage = update.percentage,
            "Progress"
        );
        if let Some(tx) = &self.tx {
            // The receiver only goes away if the observer panicked.
            let _ = tx.send(update);
        }
    }

    /// Flush queued updates and wait for the observer to see them.
    pub async fn finish(mut self) {
        self.tx.take();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Progress observer failed");
            }
        }
    }
}
