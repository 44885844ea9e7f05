use std::collections::VecDeque;
use std::time::Instant;

use graphscribe_core::{EnrichError, JobKind, Priority, UrlJob};

/// Three FIFO buffers keyed by priority, sharing one admission bound.
/// Selection never reorders within a priority: ineligible jobs rotate to
/// the tail and come around again once their deadline lapses.
#[derive(Debug)]
pub struct JobQueues {
    high: VecDeque<UrlJob>,
    normal: VecDeque<UrlJob>,
    low: VecDeque<UrlJob>,
    max_size: usize,
}

impl JobQueues {
    pub fn new(max_size: usize) -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
            max_size,
        }
    }

    fn queue_mut(&mut self, priority: Priority) -> &mut VecDeque<UrlJob> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Admission is bounded; overflow is a scheduler invariant violation
    /// and aborts the run.
    pub fn admit(&mut self, job: UrlJob) -> Result<(), EnrichError> {
        if self.len() >= self.max_size {
            return Err(EnrichError::QueueFull { len: self.len() + 1, max: self.max_size });
        }
        let priority = job.priority;
        self.queue_mut(priority).push_back(job);
        Ok(())
    }

    /// Re-queue a job the worker could not finish (retry window, transient
    /// backoff). Not subject to the admission bound: the job was already
    /// admitted once.
    pub fn requeue(&mut self, job: UrlJob) {
        let priority = job.priority;
        self.queue_mut(priority).push_back(job);
    }

    /// Selection policy: scan High, then Normal, then Low for the first job
    /// whose own deadline has lapsed and whose resource gate is open.
    pub fn pop_eligible(
        &mut self,
        now: Instant,
        gate_open: impl Fn(JobKind) -> bool,
    ) -> Option<UrlJob> {
        for priority in Priority::ALL {
            let queue = self.queue_mut(priority);
            for _ in 0..queue.len() {
                let Some(job) = queue.pop_front() else { break };
                if job.is_eligible(now) && gate_open(job.kind) {
                    return Some(job);
                }
                queue.push_back(job);
            }
        }
        None
    }
}
