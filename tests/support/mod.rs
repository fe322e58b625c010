//! Scripted job agent shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chat_dispatch::line::ApiError;
use chat_dispatch::queue::{Job, JobError};
use chat_dispatch::worker::JobAgent;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

/// Agent that sleeps, records start/end per job and fails on demand.
///
/// Jobs are identified by their `"id"` payload field, then by the text of
/// their first message, then by their path.
pub struct ScriptedAgent {
    default_delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, u16>,
    events: Mutex<Vec<Event>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            delays: HashMap::new(),
            failures: HashMap::new(),
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn failing(mut self, id: &str, status: u16) -> Self {
        self.failures.insert(id.to_string(), status);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn starts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start(id) => Some(id),
                Event::End(_) => None,
            })
            .collect()
    }

    pub fn position(&self, event: &Event) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("{:?} never happened", event))
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn job_id(job: &Job) -> String {
    let payload = job.payload();
    payload
        .and_then(|p| p.get("id"))
        .or_else(|| payload.and_then(|p| p.pointer("/messages/0/text")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| job.path().to_string())
}

#[async_trait]
impl JobAgent for ScriptedAgent {
    async fn execute(&self, job: &Job) -> Result<Value, JobError> {
        let id = job_id(job);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.record(Event::Start(id.clone()));

        let delay = self.delays.get(&id).copied().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.record(Event::End(id.clone()));

        match self.failures.get(&id) {
            Some(status) => Err(ApiError::from_response(
                *status,
                r#"{"message":"The request body has 1 error(s)","details":[{"message":"May not be empty","property":"messages[0].text"}]}"#,
            )
            .into()),
            None => Ok(json!({ "id": id })),
        }
    }
}

pub fn keyed(id: &str, key: &str) -> Job {
    Job::post("v2/bot/message/push", json!({ "id": id })).with_execution_key(key)
}

pub fn unkeyed(id: &str) -> Job {
    Job::post("v2/bot/message/push", json!({ "id": id }))
}
