//! Test doubles shared by the unit tests of this crate.

use crate::session::Session;
use crate::sleep::Sleeper;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use vmmanager_core::Error;

/// One request observed by [`ScriptedSession`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

/// Session that replays queued responses in order and records every call.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSession {
    gets: Mutex<VecDeque<Result<Value>>>,
    writes: Mutex<VecDeque<Result<Option<Value>>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_get(self, response: Result<Value>) -> Self {
        self.gets.lock().unwrap().push_back(response);
        self
    }

    pub fn push_write(self, response: Result<Option<Value>>) -> Self {
        self.writes.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn record(
        &self,
        method: &'static str,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            query: query.to_vec(),
            body: body.cloned(),
        });
    }

    fn next_write(&self) -> Result<Option<Value>> {
        self.writes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::HttpError("no scripted write response".into())))
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn get_json(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value> {
        self.record("GET", path, query, None);
        self.gets
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::HttpError("no scripted GET response".into())))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Option<Value>> {
        self.record("POST", path, &[], Some(body));
        self.next_write()
    }

    async fn delete_json(&self, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        self.record("DELETE", path, &[], body);
        self.next_write()
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.record("DELETE", path, &[], None);
        self.next_write().map(|_| ())
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<()> {
        Ok(())
    }

    fn set_api_token(&self, _token: &str) {}
}

/// Sleeper that returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub(crate) struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
