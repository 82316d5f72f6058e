use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderValue, USER_AGENT};
use std::time::Duration;
use url::Url;

use crate::error::{HttpError, Result};
use crate::route::Request;

/// A response reduced to what the dispatcher needs.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends one request; no retries, no rate limiting.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<HttpResponse>;
}

/// `reqwest` transport against the versioned API base URL
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    authorization: HeaderValue,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        // Joining relative paths needs a trailing slash on the base.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let mut authorization = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        authorization.set_sensitive(true);

        let client = Client::builder().timeout(timeout).build()?;
        Ok(ReqwestTransport {
            client,
            base_url,
            authorization,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<HttpResponse> {
        let url = self.url(request.route.path())?;
        let mut builder = self
            .client
            .request(request.route.method().clone(), url)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(
                USER_AGENT,
                concat!("DiscordBot (concord, ", env!("CARGO_PKG_VERSION"), ")"),
            );
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(reason) = &request.reason {
            builder = builder.header("X-Audit-Log-Reason", reason.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_under_versioned_base() {
        let transport =
            ReqwestTransport::new("https://example.test/api/v10", "t", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            transport.url("/users/@me").unwrap().as_str(),
            "https://example.test/api/v10/users/@me"
        );
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(ReqwestTransport::new("not a url", "t", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let resp = HttpResponse {
            status: 200,
            headers: vec![("x-ratelimit-bucket".into(), "b".into())],
            body: String::new(),
        };
        assert_eq!(resp.header("X-RateLimit-Bucket"), Some("b"));
    }
}
