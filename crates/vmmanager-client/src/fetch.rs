//! Retrying reads.

use crate::session::Session;
use crate::sleep::Sleeper;
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use vmmanager_core::client::BackoffPolicy;
use vmmanager_core::Error;

/// Wraps an idempotent `GET` with bounded retries and linear backoff.
///
/// Every failure is retried, whatever its kind, until the attempt budget is
/// spent; the error of the final attempt is returned.
#[derive(Clone)]
pub struct RetryingFetcher {
    session: Arc<dyn Session>,
    sleeper: Arc<dyn Sleeper>,
    policy: BackoffPolicy,
}

impl RetryingFetcher {
    /// Create a fetcher over the given session.
    #[must_use]
    pub fn new(session: Arc<dyn Session>, sleeper: Arc<dyn Sleeper>, policy: BackoffPolicy) -> Self {
        Self {
            session,
            sleeper,
            policy,
        }
    }

    /// Fetch `path` as raw JSON.
    pub async fn fetch(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.session.get_json(path, query).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(
                        path,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        code = err.error_code(),
                        transient = err.is_transient(),
                        "Retrying VMmanager read after {:?}",
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        path,
                        attempts = attempt,
                        transient = err.is_transient(),
                        error = %err,
                        "VMmanager read failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Fetch `path` and decode it into `T`.
    pub async fn fetch_as<T>(&self, path: &str, query: &[(&'static str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.fetch(path, query).await?;
        serde_json::from_value(value).map_err(|err| {
            Error::DecodeError(format!("Failed to parse response for `{path}`: {err}"))
        })
    }
}
