//! Task queue: worker pool, LISTEN/NOTIFY or polling, retry, and submission.
//!
//! Shutdown: [`TaskQueue::shutdown`] signals the pool to stop claiming; it does
//! not wait for in-flight tasks. Tasks left running are picked up again by the
//! stale task reaper of the next process.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use folio_core::models::{Priority, Task, TaskType};
use folio_core::{Config, TaskError};
use folio_db::{NewTask, RenderBatchRepository, TaskRepository, TASK_NOTIFY_CHANNEL};

use crate::context::TaskHandlerContext;

/// Maximum delay in seconds before retrying a failed task.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Timeout applied when a task row carries none.
const FALLBACK_TASK_TIMEOUT_SECS: u64 = 3600;

/// Backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: i32) -> u64 {
    2_u64
        .checked_pow(retry_count.max(0) as u32)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

/// Claim tasks until the queue is empty or every worker is busy, handing
/// each one to `start` with the permit it must hold while running.
///
/// Returns how many tasks were started.
pub(crate) async fn drain_claims<T, C, Fut, S>(
    semaphore: &Arc<Semaphore>,
    mut claim: C,
    mut start: S,
) -> usize
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
    S: FnMut(T, OwnedSemaphorePermit),
{
    let mut started = 0;
    loop {
        let Ok(permit) = semaphore.clone().try_acquire_owned() else {
            tracing::debug!(started, "All workers busy, leaving remaining tasks queued");
            break;
        };

        match claim().await {
            Ok(Some(task)) => {
                start(task, permit);
                started += 1;
            }
            Ok(None) => {
                tracing::trace!(started, "No tasks available in queue");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim task from queue");
                break;
            }
        }
    }
    started
}

/// Whether an error returned by a handler must not be retried.
pub(crate) fn is_unrecoverable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<TaskError>()
        .map(|te| !te.is_recoverable())
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub default_timeout_seconds: i32,
    pub max_retries: i32,
    /// Interval in seconds between runs of the stale task reaper. 0 disables it.
    pub stale_task_reap_interval_secs: u64,
    /// Grace period in seconds added to task timeout before reaping stale running tasks.
    pub stale_task_grace_period_secs: i64,
    /// Largest batch the queue accepts in one submission.
    pub max_batch_jobs: usize,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            default_timeout_seconds: 300,
            max_retries: 3,
            stale_task_reap_interval_secs: 60,
            stale_task_grace_period_secs: 300,
            max_batch_jobs: 2000,
        }
    }
}

impl TaskQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.task_queue_max_workers(),
            poll_interval_ms: config.task_queue_poll_interval_ms(),
            default_timeout_seconds: config.task_queue_default_timeout_seconds(),
            max_retries: config.task_queue_max_retries(),
            stale_task_reap_interval_secs: config.task_queue_stale_task_reap_interval_secs(),
            stale_task_grace_period_secs: config.task_queue_stale_task_grace_period_secs(),
            max_batch_jobs: config.render_batch_max_jobs(),
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    pub(crate) repository: TaskRepository,
    pub(crate) batches: RenderBatchRepository,
    pub(crate) config: TaskQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    /// Create a TaskQueue and spawn its worker pool.
    ///
    /// If `pool` is `Some`, the worker uses PostgreSQL LISTEN/NOTIFY to wake
    /// immediately when tasks are created, in addition to polling at
    /// `poll_interval_ms`. If `pool` is `None`, only polling is used.
    pub fn new(
        repository: TaskRepository,
        batches: RenderBatchRepository,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let repo_clone = repository.clone();
        let config_clone = config.clone();

        tokio::spawn(async move {
            Self::worker_pool(repo_clone, config_clone, context, shutdown_rx, pool).await;
        });

        Self {
            repository,
            batches,
            config,
            shutdown_tx,
        }
    }

    /// Submit a new task to the queue.
    #[tracing::instrument(skip(self, payload))]
    pub async fn submit_task(
        &self,
        tenant_id: Uuid,
        task_type: TaskType,
        payload: serde_json::Value,
        priority: Priority,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        let task = self
            .repository
            .create_task(NewTask {
                tenant_id,
                task_type,
                payload,
                priority: priority.as_i32(),
                scheduled_at,
                max_retries: self.config.max_retries,
                timeout_seconds: Some(self.config.default_timeout_seconds),
                batch_id: None,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    tenant_id = %tenant_id,
                    task_type = %task_type,
                    priority = priority.as_i32(),
                    "Failed to create task in repository"
                );
                anyhow::anyhow!("Failed to create task in repository: {}", e)
            })?;

        tracing::info!(
            task_id = %task.id,
            task_type = %task_type,
            priority = priority.as_i32(),
            "Task submitted to queue"
        );

        Ok(task.id)
    }

    async fn worker_pool(
        repository: TaskRepository,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        let use_listen = pool.is_some();
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = use_listen,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        // LISTEN runs on its own task and wakes the main loop through this channel
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            let tx = notify_tx.clone();
            tokio::spawn(async move {
                loop {
                    match sqlx::postgres::PgListener::connect_with(&pool).await {
                        Ok(mut listener) => {
                            if let Err(e) = listener.listen(TASK_NOTIFY_CHANNEL).await {
                                tracing::warn!(error = %e, "LISTEN failed, will retry");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                                continue;
                            }
                            while listener.recv().await.is_ok() {
                                let _ = tx.send(()).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "PgListener connect failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }

        let (reaper_shutdown_tx, mut reaper_shutdown_rx) = mpsc::channel::<()>(1);
        if config.stale_task_reap_interval_secs > 0 {
            let repo_for_reaper = repository.clone();
            let reap_interval = Duration::from_secs(config.stale_task_reap_interval_secs);
            let grace_period = config.stale_task_grace_period_secs;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(reap_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = repo_for_reaper.reap_stale_running_tasks(grace_period).await {
                                tracing::error!(error = %e, "Stale task reaper failed");
                            }
                        }
                        _ = reaper_shutdown_rx.recv() => break,
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Task queue worker pool shutting down");
                    let _ = reaper_shutdown_tx.send(()).await;
                    break;
                }
                _ = notify_rx.recv() => {
                    Self::claim_and_dispatch_available(&repository, &semaphore, &context).await;
                }
                _ = sleep(poll_interval) => {
                    Self::claim_and_dispatch_available(&repository, &semaphore, &context).await;
                }
            }
        }

        tracing::info!("Task queue worker pool stopped");
    }

    async fn claim_and_dispatch_available(
        repository: &TaskRepository,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn TaskHandlerContext>,
    ) {
        // One wakeup may stand for many queued tasks (a batch insert notifies once)
        drain_claims(
            semaphore,
            move || repository.claim_next_task(),
            |task, permit| {
                let repo = repository.clone();
                let ctx = context.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = Self::process_task_with_retry(task, repo, ctx).await {
                        tracing::error!(error = %e, "Task processing failed");
                    }
                });
            },
        )
        .await;
    }

    #[tracing::instrument(skip(repository, context), fields(task.id = %task.id, task.type = %task.task_type))]
    async fn process_task_with_retry(
        task: Task,
        repository: TaskRepository,
        context: Weak<dyn TaskHandlerContext>,
    ) -> Result<()> {
        let ctx = context.upgrade().ok_or_else(|| {
            anyhow::anyhow!("TaskHandlerContext was dropped, cannot process task")
        })?;

        let timeout_duration = task
            .timeout_seconds
            .and_then(|s| u64::try_from(s).ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(FALLBACK_TASK_TIMEOUT_SECS));

        let result = tokio::time::timeout(timeout_duration, ctx.dispatch_task(&task)).await;

        match result {
            Ok(Ok(task_result)) => {
                repository
                    .mark_completed(task.id, task_result)
                    .await
                    .context("Failed to mark task as completed")?;
                Ok(())
            }
            Ok(Err(e)) => {
                let unrecoverable = is_unrecoverable(&e);

                tracing::error!(
                    task_id = %task.id,
                    error = %e,
                    retry_count = task.retry_count,
                    max_retries = task.max_retries,
                    unrecoverable,
                    "Task execution failed"
                );

                if unrecoverable {
                    let error_result = json!({
                        "error": e.to_string(),
                        "retry_count": task.retry_count,
                        "unrecoverable": true,
                        "reason": "Task failed with an unrecoverable error"
                    });
                    repository
                        .mark_failed(task.id, error_result)
                        .await
                        .context("Failed to mark task as failed")?;
                    return Err(e);
                }

                if task.can_retry() {
                    let backoff_seconds = compute_retry_backoff_seconds(task.retry_count);
                    repository.schedule_retry(task.id, backoff_seconds).await?;
                    Ok(())
                } else {
                    let error_result = json!({
                        "error": e.to_string(),
                        "retry_count": task.retry_count,
                        "reason": "Task failed after maximum retries"
                    });
                    repository
                        .mark_failed(task.id, error_result)
                        .await
                        .context("Failed to mark task as failed")?;
                    Err(e)
                }
            }
            Err(_) => {
                tracing::error!(
                    task_id = %task.id,
                    timeout_seconds = ?task.timeout_seconds,
                    "Task execution timed out"
                );
                if task.can_retry() {
                    let backoff_seconds = compute_retry_backoff_seconds(task.retry_count);
                    repository.schedule_retry(task.id, backoff_seconds).await?;
                    Ok(())
                } else {
                    let error_result = json!({
                        "error": "Task execution timed out",
                        "timeout_seconds": task.timeout_seconds,
                    });
                    repository.mark_failed(task.id, error_result).await?;
                    Err(anyhow::anyhow!("Task execution timed out"))
                }
            }
        }
    }

    /// Signals the worker pool to stop claiming new tasks and exit the main loop.
    ///
    /// Returns immediately; already-spawned handlers keep running until they
    /// complete or time out.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(70), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(-1), 1);
    }

    #[test]
    fn unrecoverable_task_error_detected() {
        let err: anyhow::Error = TaskError::unrecoverable(anyhow::anyhow!("not a pdf")).into();
        assert!(is_unrecoverable(&err));
    }

    #[test]
    fn recoverable_task_error_detected() {
        let err: anyhow::Error = TaskError::recoverable(anyhow::anyhow!("storage timeout")).into();
        assert!(!is_unrecoverable(&err));
    }

    #[test]
    fn non_task_error_treated_as_recoverable() {
        let err: anyhow::Error = anyhow::anyhow!("generic error");
        assert!(!is_unrecoverable(&err));
    }

    #[test]
    fn default_config_matches_documented_limits() {
        let config = TaskQueueConfig::default();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.max_batch_jobs, 2000);
        assert_eq!(config.max_retries, 3);
    }

    /// Hands out queued items in order, like `claim_next_task` on a table.
    fn queued(items: &[u32]) -> std::sync::Mutex<std::collections::VecDeque<u32>> {
        std::sync::Mutex::new(items.iter().copied().collect())
    }

    #[tokio::test]
    async fn drain_claims_until_workers_are_busy() {
        let semaphore = Arc::new(Semaphore::new(3));
        let queue = queued(&[1, 2, 3, 4, 5]);
        let mut running = Vec::new();

        let started = drain_claims(
            &semaphore,
            || {
                let next = queue.lock().unwrap().pop_front();
                async move { Ok(next) }
            },
            |task, permit| running.push((task, permit)),
        )
        .await;

        assert_eq!(started, 3);
        assert_eq!(
            running.iter().map(|(task, _)| *task).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(semaphore.available_permits(), 0);
        assert_eq!(queue.lock().unwrap().len(), 2);

        // Finishing work frees permits for the next wakeup
        running.clear();
        let mut second = Vec::new();
        let started = drain_claims(
            &semaphore,
            || {
                let next = queue.lock().unwrap().pop_front();
                async move { Ok(next) }
            },
            |task, permit| second.push((task, permit)),
        )
        .await;
        assert_eq!(started, 2);
        assert!(queue.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_claims_stops_when_queue_is_empty() {
        let semaphore = Arc::new(Semaphore::new(4));
        let queue = queued(&[7, 8]);
        let mut running = Vec::new();

        let started = drain_claims(
            &semaphore,
            || {
                let next = queue.lock().unwrap().pop_front();
                async move { Ok(next) }
            },
            |task, permit| running.push((task, permit)),
        )
        .await;

        assert_eq!(started, 2);
        // The permit taken for the empty claim is returned
        assert_eq!(semaphore.available_permits(), 2);
    }

    #[tokio::test]
    async fn drain_claims_stops_on_claim_error() {
        let semaphore = Arc::new(Semaphore::new(2));
        let mut calls = 0;

        let started = drain_claims(
            &semaphore,
            || {
                calls += 1;
                async { Err::<Option<u32>, _>(anyhow::anyhow!("connection reset")) }
            },
            |_task, _permit| {},
        )
        .await;

        assert_eq!(started, 0);
        assert_eq!(calls, 1);
        assert_eq!(semaphore.available_permits(), 2);
    }
}
