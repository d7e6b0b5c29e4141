//! Background recompute queue.
//!
//! Collection handlers submit a job and return immediately. A dispatcher
//! routes jobs to one worker task per user, so recomputes for the same user
//! run strictly in submission order while different users proceed in
//! parallel, bounded by a semaphore. Jobs for a user that pile up while a
//! recompute is running are coalesced into a single run, since every run
//! reads the collection as it is at that moment.

use crate::config::WorkerConfig;
use crate::error::{RecError, Result};
use crate::models::ComputeSummary;
use crate::services::recommendation::RecommendationEngine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub type JobOutcome = std::result::Result<ComputeSummary, String>;

#[derive(Debug)]
pub struct RecomputeJob {
    pub id: Uuid,
    pub email: String,
    pub enqueued_at: DateTime<Utc>,
    ack: Option<oneshot::Sender<JobOutcome>>,
}

impl RecomputeJob {
    fn new(email: &str, ack: Option<oneshot::Sender<JobOutcome>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            enqueued_at: Utc::now(),
            ack,
        }
    }
}

#[derive(Clone)]
pub struct RecomputeQueue {
    sender: mpsc::Sender<RecomputeJob>,
}

impl RecomputeQueue {
    /// Spawn the dispatcher. It stops once every queue handle is dropped and
    /// the per-user workers have drained.
    pub fn start(engine: Arc<RecommendationEngine>, config: &WorkerConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let dispatcher = Dispatcher {
            engine,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            users: Arc::new(DashMap::new()),
            timeout: match config.job_timeout_seconds {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        };

        let handle = tokio::spawn(dispatcher.run(receiver));
        info!(
            "Started recompute queue (capacity {}, {} concurrent jobs)",
            config.queue_capacity, config.max_concurrent_jobs
        );
        (Self { sender }, handle)
    }

    /// Fire-and-forget submission. Never waits: a full queue is an error.
    pub fn submit(&self, email: &str) -> Result<Uuid> {
        self.enqueue(RecomputeJob::new(email, None))
    }

    /// Submit and get a receiver resolved when the job (or the run it was
    /// coalesced into) finishes.
    pub fn submit_with_ack(&self, email: &str) -> Result<(Uuid, oneshot::Receiver<JobOutcome>)> {
        let (tx, rx) = oneshot::channel();
        let id = self.enqueue(RecomputeJob::new(email, Some(tx)))?;
        Ok((id, rx))
    }

    fn enqueue(&self, job: RecomputeJob) -> Result<Uuid> {
        let id = job.id;
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!("Queued recompute job {}", id);
                Ok(id)
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!("Recompute queue full, dropping job {} for {}", job.id, job.email);
                Err(RecError::QueueFull(job.email))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RecError::QueueClosed),
        }
    }
}

struct Dispatcher {
    engine: Arc<RecommendationEngine>,
    permits: Arc<Semaphore>,
    users: Arc<DashMap<String, mpsc::UnboundedSender<RecomputeJob>>>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    async fn run(self, mut receiver: mpsc::Receiver<RecomputeJob>) {
        let mut workers = Vec::new();
        while let Some(job) = receiver.recv().await {
            if let Some(handle) = self.route(job) {
                workers.push(handle);
            }
            workers.retain(|h: &JoinHandle<()>| !h.is_finished());
        }

        for handle in workers {
            if let Err(e) = handle.await {
                error!("Recompute worker panicked: {}", e);
            }
        }
        info!("Recompute queue stopped");
    }

    /// Hand the job to the user's running worker, or start one.
    fn route(&self, job: RecomputeJob) -> Option<JoinHandle<()>> {
        // The shard guard from `get` is held across `send`, which keeps the
        // worker's `remove_if` from retiring the channel in between.
        let job = match self.users.get(&job.email) {
            Some(sender) => match sender.send(job) {
                Ok(()) => return None,
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let email = job.email.clone();
        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(job).is_err() {
            return None;
        }
        self.users.insert(email.clone(), sender);

        let worker = UserWorker {
            email,
            engine: self.engine.clone(),
            permits: self.permits.clone(),
            users: self.users.clone(),
            timeout: self.timeout,
        };
        Some(tokio::spawn(worker.run(receiver)))
    }
}

struct UserWorker {
    email: String,
    engine: Arc<RecommendationEngine>,
    permits: Arc<Semaphore>,
    users: Arc<DashMap<String, mpsc::UnboundedSender<RecomputeJob>>>,
    timeout: Option<Duration>,
}

impl UserWorker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<RecomputeJob>) {
        loop {
            let mut batch = match receiver.try_recv() {
                Ok(job) => vec![job],
                Err(_) => {
                    let retired = self
                        .users
                        .remove_if(&self.email, |_, _| receiver.is_empty())
                        .is_some();
                    if retired {
                        break;
                    }
                    continue;
                }
            };
            while let Ok(job) = receiver.try_recv() {
                batch.push(job);
            }

            if batch.len() > 1 {
                debug!("Coalesced {} recompute jobs for {}", batch.len(), self.email);
            }

            let outcome = self.execute(&batch).await;
            for job in batch {
                if let Some(ack) = job.ack {
                    let _ = ack.send(outcome.clone());
                }
            }
        }
    }

    async fn execute(&self, batch: &[RecomputeJob]) -> JobOutcome {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Err(RecError::QueueClosed.to_string()),
        };

        let job_id = batch.last().map(|j| j.id).unwrap_or_else(Uuid::nil);
        let started = Utc::now();
        let run = self.engine.recompute_for_email(&self.email);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(RecError::Timeout(self.email.clone(), limit.as_secs())),
            },
            None => run.await,
        };

        match result {
            Ok(summary) => {
                let elapsed = Utc::now().signed_duration_since(started);
                debug!(
                    "Recompute job {} for {} finished in {}ms",
                    job_id,
                    self.email,
                    elapsed.num_milliseconds()
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Failed to update user recommendations in background: {}", e);
                Err(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecommendationConfig;
    use crate::models::{CollectionEntry, MovieSummary};
    use crate::services::store::{InMemoryStore, SnapshotStore, Stores};

    fn engine_with_user() -> (Arc<InMemoryStore>, Arc<RecommendationEngine>) {
        let store = Arc::new(InMemoryStore::new(2));
        store.add_movie(MovieSummary::new(1, "Heat", 1995).with_score(8.3), vec![28]);
        store.add_movie(MovieSummary::new(2, "Ronin", 1998).with_score(7.2), vec![28]);
        store.add_user(10, "fan@example.com");
        store.add_to_collection(10, CollectionEntry::favorite(1));

        let engine = RecommendationEngine::new(
            Stores::from_shared(store.clone()),
            RecommendationConfig::default(),
        );
        (store, Arc::new(engine))
    }

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            queue_capacity: 16,
            max_concurrent_jobs: 2,
            job_timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn test_submitted_job_recomputes_snapshot() {
        let (store, engine) = engine_with_user();
        let (queue, _handle) = RecomputeQueue::start(engine, &worker_config());

        let (_, ack) = queue.submit_with_ack("fan@example.com").unwrap();
        let summary = ack.await.unwrap().unwrap();

        assert_eq!(summary.persisted, 1);
        assert!(store.has_snapshot(10).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_reports_failure() {
        let (_store, engine) = engine_with_user();
        let (queue, _handle) = RecomputeQueue::start(engine, &worker_config());

        let (_, ack) = queue.submit_with_ack("ghost@example.com").unwrap();
        let outcome = ack.await.unwrap();
        assert!(outcome.unwrap_err().contains("User not found"));
    }

    #[tokio::test]
    async fn test_dispatcher_stops_when_handles_dropped() {
        let (_store, engine) = engine_with_user();
        let (queue, handle) = RecomputeQueue::start(engine, &worker_config());
        queue.submit("fan@example.com").unwrap();
        drop(queue);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatcher did not stop")
            .unwrap();
    }
}
