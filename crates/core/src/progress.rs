//! Import phases and their share of overall job progress.

use serde::{Deserialize, Serialize};

/// Ordered phases of an import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Extraction,
    Transformation,
    DuplicateDetection,
    Import,
    Ledger,
}

impl Phase {
    pub const ORDERED: [Phase; 5] = [
        Self::Extraction,
        Self::Transformation,
        Self::DuplicateDetection,
        Self::Import,
        Self::Ledger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Transformation => "transformation",
            Self::DuplicateDetection => "duplicate_detection",
            Self::Import => "import",
            Self::Ledger => "ledger",
        }
    }

    /// Percentage band `(start, end)` this phase covers.
    pub fn band(&self) -> (f64, f64) {
        match self {
            Self::Extraction => (0.0, 10.0),
            Self::Transformation => (10.0, 45.0),
            Self::DuplicateDetection => (45.0, 60.0),
            Self::Import => (60.0, 95.0),
            Self::Ledger => (95.0, 100.0),
        }
    }

    /// Overall percentage after `completed` of `total` units of this phase.
    ///
    /// An empty phase counts as finished.
    pub fn percentage(&self, completed: usize, total: usize) -> f64 {
        let (start, end) = self.band();
        let fraction = if total == 0 {
            1.0
        } else {
            (completed.min(total) as f64) / total as f64
        };
        ((start + (end - start) * fraction) * 100.0).round() / 100.0
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A progress notification delivered to the job's observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(phase: Phase, completed: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            completed,
            total,
            percentage: phase.percentage(completed, total),
            message: message.into(),
        }
    }
}
