use super::job::{Job, OwnerId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Queue state of a single owner
#[derive(Debug, Default)]
pub struct OwnerQueueState {
    pub pending: VecDeque<Job>,
    pub is_processing: bool,
}

/// Owner-keyed FIFO of pending jobs.
///
/// Every owner has its own lock; operations on different owners only touch
/// the map long enough to fetch the entry. Entries are kept once created and
/// are empty and idle between bursts.
#[derive(Debug, Default)]
pub struct OwnerJobQueue {
    owners: DashMap<OwnerId, Arc<Mutex<OwnerQueueState>>>,
}

impl OwnerJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, owner: OwnerId) -> Arc<Mutex<OwnerQueueState>> {
        self.owners.entry(owner).or_default().value().clone()
    }

    fn existing(&self, owner: OwnerId) -> Option<Arc<Mutex<OwnerQueueState>>> {
        self.owners.get(&owner).map(|e| e.value().clone())
    }

    /// Append a job; returns how many jobs were already waiting
    pub fn enqueue(&self, owner: OwnerId, job: Job) -> usize {
        let state = self.entry(owner);
        let mut state = state.lock();
        let position = state.pending.len();
        state.pending.push_back(job);
        position
    }

    /// Number of jobs waiting (the in-flight job is not counted)
    pub fn position(&self, owner: OwnerId) -> usize {
        self.existing(owner)
            .map(|s| {
                let state = s.lock();
                state.pending.len()
            })
            .unwrap_or(0)
    }

    pub fn is_processing(&self, owner: OwnerId) -> bool {
        self.existing(owner)
            .map(|s| {
                let state = s.lock();
                state.is_processing
            })
            .unwrap_or(false)
    }

    pub fn mark_processing(&self, owner: OwnerId, value: bool) {
        self.entry(owner).lock().is_processing = value;
    }

    /// Set the processing flag unless it is already set.
    /// Returns true when the caller became the owner's worker.
    pub fn try_begin_processing(&self, owner: OwnerId) -> bool {
        let state = self.entry(owner);
        let mut state = state.lock();
        if state.is_processing {
            false
        } else {
            state.is_processing = true;
            true
        }
    }

    /// Pop the oldest pending job, if any
    pub fn dequeue(&self, owner: OwnerId) -> Option<Job> {
        let state = self.existing(owner)?;
        let job = state.lock().pending.pop_front();
        job
    }

    /// Pop the oldest job, or clear the processing flag when none is left.
    ///
    /// Both happen under the owner's lock, so a job enqueued concurrently
    /// either is returned here or sees the owner idle and starts a new worker.
    pub fn dequeue_or_release(&self, owner: OwnerId) -> Option<Job> {
        let state = self.entry(owner);
        let mut state = state.lock();
        let job = state.pending.pop_front();
        if job.is_none() {
            state.is_processing = false;
        }
        job
    }

    /// Drop every pending job; returns how many were removed.
    /// An in-flight job is not affected.
    pub fn clear_all(&self, owner: OwnerId) -> usize {
        match self.existing(owner) {
            Some(state) => {
                let mut state = state.lock();
                let removed = state.pending.len();
                state.pending.clear();
                removed
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn job(owner: OwnerId, name: &str) -> Job {
        Job::new(owner, PathBuf::from(name), PathBuf::from("out.mp4"), "360p")
    }

    #[test]
    fn test_positions_and_fifo_order() {
        let queue = OwnerJobQueue::new();
        assert_eq!(queue.enqueue(1, job(1, "a.mp4")), 0);
        assert_eq!(queue.enqueue(1, job(1, "b.mp4")), 1);
        assert_eq!(queue.enqueue(1, job(1, "c.mp4")), 2);
        assert_eq!(queue.position(1), 3);

        let order: Vec<String> = std::iter::from_fn(|| queue.dequeue(1))
            .map(|j| j.filename())
            .collect();
        assert_eq!(order, vec!["a.mp4", "b.mp4", "c.mp4"]);
        assert!(queue.dequeue(1).is_none());
    }

    #[test]
    fn test_owners_are_independent() {
        let queue = OwnerJobQueue::new();
        queue.enqueue(1, job(1, "a.mp4"));
        queue.enqueue(2, job(2, "x.mp4"));
        queue.mark_processing(1, true);

        assert!(queue.is_processing(1));
        assert!(!queue.is_processing(2));
        assert_eq!(queue.clear_all(1), 1);
        assert_eq!(queue.position(1), 0);
        assert_eq!(queue.position(2), 1);
        assert!(queue.is_processing(1));
    }

    #[test]
    fn test_unknown_owner() {
        let queue = OwnerJobQueue::new();
        assert!(!queue.is_processing(9));
        assert_eq!(queue.position(9), 0);
        assert!(queue.dequeue(9).is_none());
        assert_eq!(queue.clear_all(9), 0);
    }

    #[test]
    fn test_single_worker_claim() {
        let queue = OwnerJobQueue::new();
        assert!(queue.try_begin_processing(3));
        assert!(!queue.try_begin_processing(3));

        queue.enqueue(3, job(3, "a.mp4"));
        assert!(queue.dequeue_or_release(3).is_some());
        assert!(queue.is_processing(3));
        assert!(queue.dequeue_or_release(3).is_none());
        assert!(!queue.is_processing(3));
        assert!(queue.try_begin_processing(3));
    }

    #[test]
    fn test_concurrent_claims_elect_one_worker() {
        let queue = Arc::new(OwnerJobQueue::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || queue.try_begin_processing(5))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
