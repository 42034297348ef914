//! Scripted device session and recording sink shared by the unit tests

use crate::error::RelayError;
use crate::sink::TelemetrySink;
use obd_protocol::{DeviceSession, ObdError, Pid};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

pub(crate) type Answer = Result<Option<f64>, &'static str>;

/// Lifecycle calls observed across a session and a sink
#[derive(Debug, Clone, Default)]
pub(crate) struct Events(Arc<Mutex<Vec<&'static str>>>);

impl Events {
    fn push(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }

    pub(crate) fn recorded(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

/// Scripted session: each cycle's answers are popped from a queue at
/// the first query of the cycle. Once the queue is drained the session
/// reports itself disconnected.
#[derive(Default)]
pub(crate) struct ScriptedSession {
    cycles: VecDeque<HashMap<Pid, Answer>>,
    current: HashMap<Pid, Answer>,
    pub(crate) queries: Vec<Pid>,
    pub(crate) events: Events,
}

impl ScriptedSession {
    pub(crate) fn new(cycles: Vec<Vec<(Pid, Answer)>>) -> Self {
        Self {
            cycles: cycles.into_iter().map(|c| c.into_iter().collect()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn with_events(mut self, events: &Events) -> Self {
        self.events = events.clone();
        self
    }
}

impl DeviceSession for ScriptedSession {
    fn is_connected(&self) -> bool {
        !self.cycles.is_empty()
    }

    async fn query(&mut self, pid: Pid) -> Result<Option<f64>, ObdError> {
        if self.queries.len() % Pid::ALL.len() == 0 {
            self.current = self.cycles.pop_front().unwrap_or_default();
        }
        self.queries.push(pid);
        match self.current.remove(&pid) {
            Some(Ok(value)) => Ok(value),
            Some(Err(msg)) => Err(ObdError::Query(msg.to_string())),
            None => Ok(None),
        }
    }

    async fn disconnect(&mut self) {
        self.cycles.clear();
        self.events.push("session disconnected");
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) sent: Vec<(Instant, String)>,
    pub(crate) fail: bool,
    pub(crate) attempts: usize,
    pub(crate) events: Events,
}

impl RecordingSink {
    pub(crate) fn with_events(mut self, events: &Events) -> Self {
        self.events = events.clone();
        self
    }
}

impl TelemetrySink for RecordingSink {
    async fn send(&mut self, message: String) -> Result<(), RelayError> {
        self.attempts += 1;
        if self.fail {
            return Err(RelayError::Send("connection reset".to_string()));
        }
        self.events.push("sent");
        self.sent.push((Instant::now(), message));
        Ok(())
    }

    async fn close(&mut self) {
        self.events.push("sink closed");
    }
}
