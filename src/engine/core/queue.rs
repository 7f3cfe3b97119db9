use serde::{Deserialize, Serialize};

use super::types::{Job, JobStatus};
use crate::engine::error::QueueError;

/// Ordered list of queued videos
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQueue {
    jobs: Vec<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job; the same source path can only be queued once
    pub fn add(&mut self, job: Job) -> Result<usize, QueueError> {
        if self.jobs.iter().any(|j| j.path == job.path) {
            return Err(QueueError::Duplicate(job.path));
        }
        self.jobs.push(job);
        Ok(self.jobs.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Result<Job, QueueError> {
        if index >= self.jobs.len() {
            return Err(QueueError::OutOfRange(index));
        }
        Ok(self.jobs.remove(index))
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub(crate) fn jobs_mut(&mut self) -> &mut [Job] {
        &mut self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn finished_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_finished()).count()
    }

    pub fn status_of(&self, index: usize) -> Option<JobStatus> {
        self.jobs.get(index).map(Job::status)
    }
}

impl FromIterator<Job> for JobQueue {
    fn from_iter<I: IntoIterator<Item = Job>>(iter: I) -> Self {
        let mut queue = JobQueue::new();
        for job in iter {
            // Duplicates are dropped, first occurrence wins
            let _ = queue.add(job);
        }
        queue
    }
}
