//! Mutating calls and their acknowledgements.
//!
//! Every create/update/delete follows the same flow: send the request, decode the
//! acknowledgement, then either fail on an embedded error, wait for the deferred
//! task, or accept the synchronous result. Operations differ only in the
//! [`Mutation`] descriptor they submit and the type they extract.

use crate::session::Session;
use crate::task::TaskWaiter;
use crate::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use vmmanager_core::{Error, TaskId, VmId};

/// Decoded response to a mutating call.
#[derive(Debug, Clone, PartialEq)]
pub enum Acknowledgement {
    /// The service already failed the operation; carries the `error` payload.
    RemoteError(Value),
    /// The operation continues in the background as `task`.
    DeferredTask {
        /// Task to wait for.
        task: TaskId,
        /// The full acknowledgement (may also carry e.g. an assigned `id`).
        body: Map<String, Value>,
    },
    /// The operation finished inline.
    SyncResult(Map<String, Value>),
    /// None of the above shapes.
    Malformed(Value),
}

impl Acknowledgement {
    /// Classify a decoded response body.
    #[must_use]
    pub fn decode(body: Value) -> Self {
        let Value::Object(map) = body else {
            return Self::Malformed(body);
        };

        if let Some(error) = map.get("error").filter(|e| !e.is_null()) {
            return Self::RemoteError(error.clone());
        }

        match map.get("task").filter(|t| !t.is_null()).map(TaskId::from_json) {
            Some(Some(task)) => Self::DeferredTask { task, body: map },
            Some(None) => Self::Malformed(Value::Object(map)),
            None if has_payload(&map) => Self::SyncResult(map),
            None => Self::Malformed(Value::Object(map)),
        }
    }
}

fn has_payload(map: &Map<String, Value>) -> bool {
    map.iter()
        .any(|(key, value)| key != "error" && key != "task" && !value.is_null())
}

/// Extract the caller-visible result from an acknowledgement body.
pub trait FromAcknowledgement: Sized {
    /// Build the result from the acknowledgement's fields.
    fn from_acknowledgement(body: &Map<String, Value>) -> Result<Self>;
}

impl FromAcknowledgement for () {
    fn from_acknowledgement(_body: &Map<String, Value>) -> Result<Self> {
        Ok(())
    }
}

impl FromAcknowledgement for VmId {
    fn from_acknowledgement(body: &Map<String, Value>) -> Result<Self> {
        body.get("id")
            .and_then(VmId::from_json)
            .ok_or_else(|| Error::FieldMissing("id".to_string()))
    }
}

impl FromAcknowledgement for Value {
    fn from_acknowledgement(body: &Map<String, Value>) -> Result<Self> {
        Ok(Value::Object(body.clone()))
    }
}

/// HTTP verbs used for mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMethod {
    /// `POST` with a JSON body
    Post,
    /// `DELETE`, optionally with a JSON body
    Delete,
}

impl fmt::Display for MutationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => f.write_str("POST"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}

/// Description of one mutating call.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    method: MutationMethod,
    path: String,
    payload: Option<Value>,
    description: String,
    waits_for_task: bool,
}

impl Mutation {
    /// `POST` `payload` to `path`.
    pub fn post<B>(path: impl Into<String>, payload: &B) -> Result<Self>
    where
        B: Serialize + ?Sized,
    {
        let path = path.into();
        let payload = serde_json::to_value(payload).map_err(|err| {
            Error::ValidationError(format!("Failed to encode payload for `{path}`: {err}"))
        })?;
        Ok(Self {
            method: MutationMethod::Post,
            description: format!("POST {path}"),
            path,
            payload: Some(payload),
            waits_for_task: true,
        })
    }

    /// `DELETE` `path` without a body.
    pub fn delete(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method: MutationMethod::Delete,
            description: format!("DELETE {path}"),
            path,
            payload: None,
            waits_for_task: true,
        }
    }

    /// Human-readable description used in errors and logs.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Accept any non-empty acknowledgement without inspecting or awaiting it.
    #[must_use]
    pub fn without_task_wait(mut self) -> Self {
        self.waits_for_task = false;
        self
    }

    /// Whether a deferred acknowledgement is awaited.
    #[must_use]
    pub const fn waits_for_task(&self) -> bool {
        self.waits_for_task
    }

    /// Method, path, description and payload field names. Values are left out so
    /// passwords never reach an error message.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!("{} {} ({})", self.method, self.path, self.description);
        if let Some(Value::Object(fields)) = &self.payload {
            let names: Vec<&str> = fields.keys().map(String::as_str).collect();
            summary.push_str(&format!(" with fields [{}]", names.join(", ")));
        }
        summary
    }
}

/// Runs [`Mutation`]s and resolves their acknowledgements.
#[derive(Clone)]
pub struct MutationOrchestrator {
    session: Arc<dyn Session>,
    waiter: Arc<dyn TaskWaiter>,
    task_timeout: Duration,
}

impl MutationOrchestrator {
    /// Create an orchestrator that waits up to `task_timeout` for deferred tasks.
    #[must_use]
    pub fn new(
        session: Arc<dyn Session>,
        waiter: Arc<dyn TaskWaiter>,
        task_timeout: Duration,
    ) -> Self {
        Self {
            session,
            waiter,
            task_timeout,
        }
    }

    /// Submit `mutation` and extract `R` from its outcome.
    pub async fn submit<R>(&self, mutation: &Mutation) -> Result<R>
    where
        R: FromAcknowledgement,
    {
        info!(method = %mutation.method, path = %mutation.path, "{}", mutation.description);

        let body = match mutation.method {
            MutationMethod::Post => {
                let payload = mutation.payload.clone().unwrap_or(Value::Null);
                self.session.post_json(&mutation.path, &payload).await?
            }
            MutationMethod::Delete => {
                self.session
                    .delete_json(&mutation.path, mutation.payload.as_ref())
                    .await?
            }
        };
        let body = body.ok_or_else(|| Error::EmptyResponse(mutation.summary()))?;

        if !mutation.waits_for_task {
            return match body {
                Value::Object(map) => R::from_acknowledgement(&map),
                other => Err(Error::DecodeError(format!(
                    "Unexpected response for {}: {other}",
                    mutation.summary()
                ))),
            };
        }

        match Acknowledgement::decode(body) {
            Acknowledgement::RemoteError(error) => {
                let rendered =
                    serde_json::to_string_pretty(&error).unwrap_or_else(|_| error.to_string());
                Err(Error::RemoteTaskError(rendered))
            }
            Acknowledgement::DeferredTask { task, body } => {
                debug!(%task, path = %mutation.path, "Waiting for deferred task");
                self.waiter.wait(task, self.task_timeout).await?;
                R::from_acknowledgement(&body)
            }
            Acknowledgement::SyncResult(body) => R::from_acknowledgement(&body),
            Acknowledgement::Malformed(body) => Err(Error::DecodeError(format!(
                "Unrecognised acknowledgement for {}: {body}",
                mutation.summary()
            ))),
        }
    }
}
