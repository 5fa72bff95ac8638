//! Waiting on deferred tasks.
//!
//! A mutation the service cannot finish inline answers with a task id. The task
//! is looked up with `GET task?where=consul_id EQ <id>` until its status reads
//! `complete` or the wait budget runs out.

use crate::session::Session;
use crate::sleep::Sleeper;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use vmmanager_core::client::{PollPolicy, TASK_STATUS_COMPLETE};
use vmmanager_core::query::{Predicate, QueryParams};
use vmmanager_core::{Error, TaskId};

/// Current state of a task as seen by one status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// No matching task record yet.
    Pending,
    /// The task finished successfully.
    Complete,
    /// The task reported some other status label.
    Other(String),
}

#[derive(Debug, Deserialize)]
struct TaskListing {
    #[serde(default)]
    list: Option<Vec<TaskRecord>>,
}

#[derive(Debug, Deserialize)]
struct TaskRecord {
    status: String,
}

impl TaskStatus {
    /// Interpret a `task` listing response.
    pub fn from_listing(body: Value) -> Result<Self> {
        let listing: TaskListing = serde_json::from_value(body)
            .map_err(|err| Error::DecodeError(format!("Unexpected task listing: {err}")))?;

        let status = listing
            .list
            .and_then(|records| records.into_iter().next())
            .map_or(Self::Pending, |record| {
                if record.status == TASK_STATUS_COMPLETE {
                    Self::Complete
                } else {
                    Self::Other(record.status)
                }
            });
        Ok(status)
    }
}

/// Something that can block until a task completes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskWaiter: Send + Sync {
    /// Wait until `task` completes or `timeout` has been spent.
    async fn wait(&self, task: TaskId, timeout: Duration) -> Result<()>;
}

/// Fixed-interval task poller.
///
/// The wait budget covers both the pauses between polls and the time spent in
/// each status query; a query still running when the budget runs out is
/// abandoned. A wait on a task that never completes returns no later than one
/// interval past the deadline. Dropping the returned future abandons the wait.
#[derive(Clone)]
pub struct TaskPoller {
    session: Arc<dyn Session>,
    sleeper: Arc<dyn Sleeper>,
    policy: PollPolicy,
}

impl TaskPoller {
    /// Create a poller over the given session.
    #[must_use]
    pub fn new(session: Arc<dyn Session>, sleeper: Arc<dyn Sleeper>, policy: PollPolicy) -> Self {
        Self {
            session,
            sleeper,
            policy,
        }
    }

    /// Query the status of `task` once.
    pub async fn status(&self, task: TaskId) -> Result<TaskStatus> {
        let query = QueryParams::filter(&Predicate::equals("consul_id", task));
        let body = self.session.get_json("task", &query).await?;
        TaskStatus::from_listing(body)
    }

    /// Wait using the policy's own timeout.
    pub async fn wait_default(&self, task: TaskId) -> Result<()> {
        self.wait_for(task, self.policy.timeout).await
    }

    async fn wait_for(&self, task: TaskId, timeout: Duration) -> Result<()> {
        let interval = self.policy.interval;
        if interval.is_zero() {
            return Err(Error::ConfigError(
                "task poll interval must be positive".to_string(),
            ));
        }

        let mut waited = Duration::ZERO;
        while waited < timeout {
            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout - waited, self.status(task)).await;
            waited += started.elapsed();

            match outcome {
                Ok(Ok(TaskStatus::Complete)) => {
                    debug!(%task, ?waited, "Task complete");
                    return Ok(());
                }
                Ok(Ok(TaskStatus::Other(status))) if self.policy.fail_on_terminal_status => {
                    warn!(%task, status = %status, "Task finished unsuccessfully");
                    return Err(Error::TaskFailed { task, status });
                }
                Ok(Ok(TaskStatus::Other(status))) => {
                    debug!(%task, status = %status, "Task not complete yet");
                }
                Ok(Ok(TaskStatus::Pending)) => {
                    debug!(%task, "Task not visible yet");
                }
                Ok(Err(err)) => {
                    debug!(%task, error = %err, "Task status unavailable");
                }
                Err(_) => {
                    debug!(%task, ?waited, "Task status query outlived the wait budget");
                }
            }

            if waited >= timeout {
                break;
            }
            self.sleeper.sleep(interval).await;
            waited += interval;
        }

        warn!(%task, ?waited, "Gave up waiting for task");
        Err(Error::TaskTimeout { task, waited })
    }
}

#[async_trait]
impl TaskWaiter for TaskPoller {
    async fn wait(&self, task: TaskId, timeout: Duration) -> Result<()> {
        self.wait_for(task, timeout).await
    }
}
