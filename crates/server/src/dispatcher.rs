use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genie_relay_core::config::DispatchConfig;
use genie_relay_slack::QuestionRequest;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

/// One accepted slash command waiting for an answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub correlation_id: String,
    pub request: QuestionRequest,
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job);
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },
    #[error("dispatch queue is closed")]
    Closed,
}

/// Bounded job queue drained by at most `max_concurrent_tasks` running tasks.
///
/// A job leaves the queue only once a permit is free, so at most `queue_capacity` jobs
/// wait behind the running ones.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    sender: mpsc::Sender<Job>,
    running: Arc<AtomicUsize>,
    queue_capacity: usize,
    max_concurrent_tasks: usize,
}

impl Dispatcher {
    pub fn spawn(config: &DispatchConfig, handler: Arc<dyn JobHandler>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        let running = Arc::new(AtomicUsize::new(0));

        tokio::spawn(drain(receiver, permits, running.clone(), handler));
        info!(
            event_name = "relay.dispatcher.started",
            correlation_id = "bootstrap",
            queue_capacity = config.queue_capacity,
            max_concurrent_tasks = config.max_concurrent_tasks,
            "dispatcher started"
        );

        Self {
            sender,
            running,
            queue_capacity: config.queue_capacity,
            max_concurrent_tasks: config.max_concurrent_tasks,
        }
    }

    /// Never waits: a full queue is reported immediately so the webhook can still answer
    /// inside Slack's deadline.
    pub fn try_submit(&self, job: Job) -> Result<(), DispatchError> {
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    event_name = "relay.dispatcher.queue_full",
                    correlation_id = %job.correlation_id,
                    queue_capacity = self.queue_capacity,
                    "dispatch queue is full, rejecting job"
                );
                Err(DispatchError::QueueFull { capacity: self.queue_capacity })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    pub fn is_accepting(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn queued(&self) -> usize {
        self.queue_capacity.saturating_sub(self.sender.capacity())
    }

    pub fn in_flight(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns false when jobs are still queued or running once `timeout` elapses.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.in_flight() > 0 || self.queued() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }
}

async fn drain(
    mut receiver: mpsc::Receiver<Job>,
    permits: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
    handler: Arc<dyn JobHandler>,
) {
    loop {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let Some(job) = receiver.recv().await else {
            break;
        };
        let handler = handler.clone();
        let running = running.clone();
        running.fetch_add(1, Ordering::SeqCst);

        debug!(
            event_name = "relay.dispatcher.job_started",
            correlation_id = %job.correlation_id,
            available_permits = permits.available_permits(),
            "job started"
        );
        tokio::spawn(async move {
            handler.handle(job).await;
            running.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        });
    }

    info!(
        event_name = "relay.dispatcher.stopped",
        correlation_id = "shutdown",
        "dispatcher queue closed"
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use genie_relay_core::config::DispatchConfig;
    use genie_relay_slack::QuestionRequest;
    use tokio::sync::Notify;

    use super::{DispatchError, Dispatcher, Job, JobHandler};

    pub(crate) fn job(id: &str) -> Job {
        Job {
            correlation_id: id.to_owned(),
            request: QuestionRequest {
                user_name: "ana".to_owned(),
                question: "top customers".to_owned(),
                response_url: "https://hooks.slack.test/commands/1".to_owned(),
                user_id: Some("U1".to_owned()),
                channel_id: Some("C1".to_owned()),
                command: Some("/genie".to_owned()),
            },
        }
    }

    /// Holds every job until released and tracks peak concurrency.
    #[derive(Default)]
    struct GatedHandler {
        release: Notify,
        running: AtomicUsize,
        peak: AtomicUsize,
        handled: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobHandler for GatedHandler {
        async fn handle(&self, job: Job) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.release.notified().await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.handled.lock().expect("lock").push(job.correlation_id);
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn concurrency_is_capped_and_queue_is_bounded() {
        let handler = Arc::new(GatedHandler::default());
        let dispatcher = Dispatcher::spawn(
            &DispatchConfig { max_concurrent_tasks: 2, queue_capacity: 2 },
            handler.clone(),
        );

        for index in 0..2 {
            dispatcher.try_submit(job(&format!("job-{index}"))).expect("accepted");
            settle().await;
        }
        assert_eq!(handler.running.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.in_flight(), 2);
        assert!(!dispatcher.wait_idle(Duration::from_millis(150)).await);

        // Nothing leaves the queue while both permits are taken.
        dispatcher.try_submit(job("job-2")).expect("queued");
        dispatcher.try_submit(job("job-3")).expect("queued");
        settle().await;
        assert_eq!(dispatcher.queued(), 2);
        assert_eq!(
            dispatcher.try_submit(job("job-4")),
            Err(DispatchError::QueueFull { capacity: 2 })
        );

        for _ in 0..4 {
            handler.release.notify_waiters();
            settle().await;
        }

        assert_eq!(handler.peak.load(Ordering::SeqCst), 2);
        assert_eq!(handler.handled.lock().expect("lock").len(), 4);
        assert!(dispatcher.is_accepting());
        assert!(dispatcher.wait_idle(Duration::from_secs(1)).await);
    }
}
