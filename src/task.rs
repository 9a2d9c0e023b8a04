//! Completion of legacy-API writes.
//!
//! A legacy write answers with a comm-task id; the change is only applied
//! once `commTasks` reports the task as succeeded.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::protocol::{self, TASK_SUCCEEDED};
use crate::transport::Transport;
use crate::{Error, Result};

/// How to wait for a comm task: a fixed interval, an optional attempt cap and
/// an optional cancellation signal. With no cap the wait is unbounded.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    interval: Duration,
    max_attempts: Option<u32>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
            cancel: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Stops waiting once `true` is sent on the channel.
    pub fn cancel_on(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Some(rx);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval
    }
}

/// Pulls the task id out of a write response, which is either `{"id": ..}`
/// or a list whose first element is.
pub(crate) fn task_id(resp: &Value) -> Result<String> {
    let entry = match resp {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    match entry.and_then(|e| e.get("id")) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Error::validation("comm task reply", "id", "missing task id")),
    }
}

fn is_cancelled(rx: &Option<watch::Receiver<bool>>) -> bool {
    rx.as_ref().is_some_and(|rx| *rx.borrow())
}

pub(crate) async fn wait_for_task<T: Transport>(
    transport: &T,
    task_id: &str,
    policy: &RetryPolicy,
) -> Result<()> {
    let path = protocol::legacy_comm_task(task_id);
    let mut cancel = policy.cancel.clone();
    let mut attempts = 0u32;

    loop {
        if is_cancelled(&cancel) {
            return Err(Error::Cancelled);
        }
        attempts += 1;
        let status = transport.get(&path).await?;
        let Some(state) = status.get("state").and_then(Value::as_str) else {
            return Err(Error::validation("comm task status", "state", "missing"));
        };
        if state == TASK_SUCCEEDED {
            debug!(task_id, attempts, "comm task succeeded");
            return Ok(());
        }
        trace!(task_id, attempts, state, "comm task pending");

        if let Some(max) = policy.max_attempts
            && attempts >= max
        {
            return Err(Error::Timeout {
                task_id: task_id.to_string(),
                attempts,
            });
        }

        match cancel.as_mut() {
            Some(rx) => {
                tokio::select! {
                    _ = tokio::time::sleep(policy.interval) => {}
                    Ok(_) = rx.wait_for(|c| *c) => return Err(Error::Cancelled),
                }
            }
            None => tokio::time::sleep(policy.interval).await,
        }
    }
}
