use serde::{Deserialize, Serialize};

use crate::domain::JobStatus;

/// Number of stored jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: usize,
    pub done: usize,
}

impl JobCounts {
    pub fn record(&mut self, status: JobStatus) {
        self.add(status, 1);
    }

    pub fn add(&mut self, status: JobStatus, n: usize) {
        match status {
            JobStatus::Pending => self.pending += n,
            JobStatus::Done => self.done += n,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.done
    }
}
