//! Scripted transport shared by the dispatcher tests.

#![allow(dead_code)]

use async_trait::async_trait;
use concord_http::{HttpError, HttpResponse, Request, Transport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::time::Instant;

pub struct Recorded {
    pub at: Instant,
    pub path: String,
    pub query: Vec<(String, String)>,
}

/// Replays canned responses in order and records when each call happened.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    pub calls: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<HttpResponse, HttpError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|c| c.at).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<HttpResponse, HttpError> {
        self.calls.lock().push(Recorded {
            at: Instant::now(),
            path: request.route.path().to_string(),
            query: request.query.clone(),
        });
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Network("script exhausted".into())))
    }
}

pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse {
        status,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: body.to_string(),
    })
}

pub fn ok(body: &str) -> Result<HttpResponse, HttpError> {
    response(
        200,
        &[
            ("x-ratelimit-bucket", "b1"),
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "4"),
            ("x-ratelimit-reset-after", "1.0"),
        ],
        body,
    )
}

pub fn too_many(retry_after: &str) -> Result<HttpResponse, HttpError> {
    let body = format!(r#"{{"message":"You are being rate limited.","retry_after":{retry_after},"global":false}}"#);
    response(
        429,
        &[
            ("x-ratelimit-bucket", "b1"),
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset-after", retry_after),
            ("x-ratelimit-scope", "user"),
            ("retry-after", "1"),
        ],
        &body,
    )
}
