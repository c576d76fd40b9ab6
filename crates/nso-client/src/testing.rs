//! Scripted transport for state-machine tests.
//!
//! Replies are queued up front and handed out in order. Every request that
//! reaches the transport is recorded, so a test can prove that a call was
//! rejected locally without touching the network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nso_core::{NsoError, Result, SystemResolver};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::endpoint::Endpoint;
use crate::session::{Credentials, Session, SessionOptions};
use crate::transport::Transport;

/// One request as seen by the transport.
#[derive(Clone, Debug)]
pub(crate) struct RecordedCall {
    pub id: u64,
    pub method: String,
    pub params: Value,
    pub timeout: Duration,
}

enum Reply {
    Result(Value),
    RpcError(i64, String),
    Timeout,
    Unavailable,
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, result: Value) {
        self.replies.lock().push_back(Reply::Result(result));
    }

    pub fn reply_error(&self, code: i64, message: &str) {
        self.replies
            .lock()
            .push_back(Reply::RpcError(code, message.to_owned()));
    }

    pub fn time_out(&self) {
        self.replies.lock().push_back(Reply::Timeout);
    }

    pub fn unavailable(&self) {
        self.replies.lock().push_back(Reply::Unavailable);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.method.clone()).collect()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls.lock().last().cloned().expect("no call recorded")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>> {
        let request: Value = serde_json::from_slice(&body).expect("request is JSON");
        let id = request["id"].as_u64().expect("request has an id");
        self.calls.lock().push(RecordedCall {
            id,
            method: request["method"].as_str().unwrap_or_default().to_owned(),
            params: request.get("params").cloned().unwrap_or(Value::Null),
            timeout,
        });

        let reply = self.replies.lock().pop_front();
        let envelope = match reply {
            Some(Reply::Result(result)) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Some(Reply::RpcError(code, message)) => {
                json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
            }
            Some(Reply::Timeout) => {
                return Err(NsoError::Timeout {
                    message: "scripted timeout".into(),
                });
            }
            Some(Reply::Unavailable) | None => {
                return Err(NsoError::Transport {
                    message: "scripted transport has no reply".into(),
                    status: Some(503),
                });
            }
        };
        Ok(serde_json::to_vec(&envelope).expect("serializable"))
    }
}

/// Session on a fixed endpoint backed by `transport`.
pub(crate) fn scripted_session(transport: &Arc<ScriptedTransport>) -> Arc<Session> {
    let endpoint = Endpoint::new("http", "10.0.0.146", 8080, &SystemResolver).expect("endpoint");
    Arc::new(Session::with_transport(
        endpoint,
        Credentials::new("admin", "admin"),
        SessionOptions::default(),
        transport.clone(),
    ))
}
