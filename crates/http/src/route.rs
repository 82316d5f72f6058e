use concord_core::Id;
use concord_ratelimit::RouteKey;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::{HttpError, Result};

/// Path parameters that scope rate limits: two requests to the same
/// template with different values never share a bucket.
const MAJOR_PARAMS: &[&str] = &["channel_id", "guild_id", "webhook_id"];

/// An API endpoint: method, path template and resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    template: &'static str,
    path: String,
    major: String,
}

impl Route {
    /// `template` uses `{name}` placeholders, filled with [`Route::param`].
    pub fn new(method: Method, template: &'static str) -> Self {
        Self {
            method,
            template,
            path: template.to_string(),
            major: String::new(),
        }
    }

    /// Substitute a `{name}` placeholder
    pub fn param(mut self, name: &str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        self.path = self.path.replace(&format!("{{{name}}}"), &value);
        if MAJOR_PARAMS.contains(&name) && self.major.is_empty() {
            self.major = value;
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &'static str {
        self.template
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn major(&self) -> &str {
        &self.major
    }

    /// Key the rate limiter buckets this route under
    pub fn key(&self) -> RouteKey {
        RouteKey::new(format!("{} {}", self.method, self.template), self.major.clone())
    }

    // ---------------------------------------------------------------------
    // Endpoints used by the runtime itself
    // ---------------------------------------------------------------------

    pub fn gateway_bot() -> Self {
        Self::new(Method::GET, "/gateway/bot")
    }

    pub fn current_user() -> Self {
        Self::new(Method::GET, "/users/@me")
    }

    pub fn channel_messages(channel_id: Id) -> Self {
        Self::new(Method::GET, "/channels/{channel_id}/messages").param("channel_id", channel_id)
    }

    pub fn create_message(channel_id: Id) -> Self {
        Self::new(Method::POST, "/channels/{channel_id}/messages").param("channel_id", channel_id)
    }

    pub fn guild_members(guild_id: Id) -> Self {
        Self::new(Method::GET, "/guilds/{guild_id}/members").param("guild_id", guild_id)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A route plus everything sent with it.
#[derive(Debug, Clone)]
pub struct Request {
    pub route: Route,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// `X-Audit-Log-Reason`
    pub reason: Option<String>,
}

impl Request {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            query: Vec::new(),
            body: None,
            reason: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl From<Route> for Request {
    fn from(route: Route) -> Self {
        Request::new(route)
    }
}
