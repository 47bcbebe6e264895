//! Queue configuration, statistics and wait-sequence positions.

use serde::{Deserialize, Serialize};

/// Configuration for queue behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of jobs processing at once (admission limit).
    pub concurrency: u32,
    /// How often an idle worker asks for new work (milliseconds).
    pub poll_interval_ms: u64,
    /// Maximum number of jobs that may wait for admission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_queue_size: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll_interval_ms: 100,
            max_queue_size: None,
        }
    }
}

impl QueueConfig {
    /// Set the admission limit.
    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the idle poll interval.
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Cap the wait sequence.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = Some(max_queue_size);
        self
    }
}

/// Statistics for the tracker's current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Number of queued jobs.
    pub pending: u64,
    /// Number of processing jobs.
    pub running: u64,
    /// Number of completed jobs.
    pub completed: u64,
    /// Number of failed jobs.
    pub failed: u64,
    /// Mean wall time of finished jobs in milliseconds.
    pub avg_duration_ms: Option<f64>,
}

impl QueueStats {
    /// Total jobs in flight (pending + running).
    pub fn active(&self) -> u64 {
        self.pending + self.running
    }

    /// Total finished jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }

    /// Fold one more finished job's duration into the running mean.
    ///
    /// Must be called after the completed/failed counter was bumped.
    pub fn record_duration(&mut self, duration_ms: u64) {
        let n = self.processed().max(1) as f64;
        let previous = self.avg_duration_ms.unwrap_or(0.0);
        self.avg_duration_ms = Some(previous + (duration_ms as f64 - previous) / n);
    }
}

/// Where a job sits in the wait sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePosition {
    /// 1-based position while queued; 0 once admitted or finished.
    pub position: usize,
    /// Rough wait in milliseconds, `None` when there is no basis for a guess.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_ms: Option<u64>,
}

impl QueuePosition {
    /// Position reported for admitted or terminal jobs.
    pub fn not_waiting() -> Self {
        Self {
            position: 0,
            estimated_wait_ms: None,
        }
    }

    /// Position of a queued job, estimating the wait from past durations.
    ///
    /// Jobs ahead are admitted `concurrency` at a time, so the estimate is
    /// the number of admission rounds times the mean job duration.
    pub fn queued(position: usize, concurrency: u32, avg_duration_ms: Option<f64>) -> Self {
        let rounds = position.div_ceil(concurrency.max(1) as usize) as f64;
        Self {
            position,
            estimated_wait_ms: avg_duration_ms.map(|avg| (rounds * avg).round() as u64),
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.position > 0
    }
}

impl std::fmt::Display for QueuePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.position == 0 {
            return f.write_str("n/a");
        }
        match self.estimated_wait_ms {
            Some(ms) => write!(f, "#{} (~{}s)", self.position, ms.div_ceil(1000)),
            None => write!(f, "#{} (wait n/a)", self.position),
        }
    }
}
