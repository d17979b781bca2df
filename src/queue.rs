use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, Notify, oneshot};

use crate::sandbox::{ExecutionRequest, JudgeError, JudgeReport};

/// A request waiting for a worker, with the channel its caller is listening on
pub struct JudgeJob {
    pub id: u64,
    pub problem_title: String,
    pub request: ExecutionRequest,
    pub responder: oneshot::Sender<Result<JudgeReport, JudgeError>>,
}

pub struct JobQueue {
    queue: Mutex<VecDeque<JudgeJob>>,
    notify: Notify,
    next_id: AtomicU64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn push(&self, job: JudgeJob) {
        self.queue.lock().await.push_back(job);
        self.notify.notify_one();
    }

    pub async fn pop(&self) -> JudgeJob {
        loop {
            if let Some(job) = self.queue.lock().await.pop_front() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
