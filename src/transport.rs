//! HTTP access to the vendor APIs.
//!
//! The client types only ever talk to a [`Transport`]. [`HttpTransport`] is
//! the reqwest-backed implementation for both API generations; tests swap in
//! an in-memory one.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::protocol::{
    self, LEGACY_BASE_URL, REST_APP_CREDENTIAL, REST_AUTH_SCOPE, REST_AUTH_URL, REST_BASE_URL,
};
use crate::{Error, Result};

/// Requests against one vendor API. Paths are relative to the API base.
///
/// Every method fails with a transport error on a non-success status.
pub trait Transport: Send + Sync {
    /// Logs in and returns the session token.
    fn authenticate(&self) -> impl Future<Output = Result<String>> + Send;

    fn get(&self, path: &str) -> impl Future<Output = Result<Value>> + Send;

    fn put(&self, path: &str, body: &Value) -> impl Future<Output = Result<Value>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// OAuth password grant, `Authorization: bearer` on each request.
    OAuth,
    /// Legacy `Session` login, `sessionId` header on each request.
    Session,
}

// Tokens are renewed this long before the server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

struct Token {
    value: String,
    expires: Option<Instant>,
}

impl Token {
    fn is_fresh(&self) -> bool {
        self.expires.is_none_or(|at| Instant::now() + EXPIRY_MARGIN < at)
    }
}

#[derive(Deserialize)]
struct OAuthResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
}

pub struct HttpTransportBuilder {
    scheme: AuthScheme,
    base_url: Option<String>,
    auth_url: Option<String>,
    username: String,
    password: String,
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    pub fn new(scheme: AuthScheme) -> Self {
        Self {
            scheme,
            base_url: None,
            auth_url: None,
            username: String::new(),
            password: String::new(),
            timeout: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// OAuth token endpoint. Ignored for [`AuthScheme::Session`].
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        if self.username.is_empty() {
            return Err(Error::Config("transport needs credentials".into()));
        }
        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let default_base = match self.scheme {
            AuthScheme::OAuth => REST_BASE_URL,
            AuthScheme::Session => LEGACY_BASE_URL,
        };
        Ok(HttpTransport {
            http: http.build()?,
            scheme: self.scheme,
            base_url: self
                .base_url
                .unwrap_or_else(|| default_base.to_string())
                .trim_end_matches('/')
                .to_string(),
            auth_url: self.auth_url.unwrap_or_else(|| REST_AUTH_URL.to_string()),
            username: self.username,
            password: self.password,
            token: Mutex::new(None),
        })
    }
}

pub struct HttpTransport {
    http: reqwest::Client,
    scheme: AuthScheme,
    base_url: String,
    auth_url: String,
    username: String,
    password: String,
    token: Mutex<Option<Token>>,
}

impl HttpTransport {
    pub fn builder(scheme: AuthScheme) -> HttpTransportBuilder {
        HttpTransportBuilder::new(scheme)
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|t| t.is_fresh())
            .map(|t| t.value.clone())
    }

    fn store_token(&self, token: Token) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    async fn token(&self) -> Result<String> {
        match self.cached_token() {
            Some(token) => Ok(token),
            None => self.authenticate().await,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_auth(&self, req: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        let req = req.header(ACCEPT, "application/json");
        match self.scheme {
            AuthScheme::OAuth => req.header(AUTHORIZATION, format!("bearer {token}")),
            AuthScheme::Session => req.header("sessionId", token),
        }
    }

    async fn login_oauth(&self) -> Result<Token> {
        debug!(url = %self.auth_url, "requesting oauth token");
        let form = [
            ("grant_type", "password"),
            ("scope", REST_AUTH_SCOPE),
            ("Username", self.username.as_str()),
            ("Password", self.password.as_str()),
        ];
        let resp: OAuthResponse = self
            .http
            .post(&self.auth_url)
            .header(AUTHORIZATION, REST_APP_CREDENTIAL)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Token {
            value: resp.access_token,
            expires: resp
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        })
    }

    async fn login_session(&self) -> Result<Token> {
        let url = self.url(protocol::legacy_session());
        debug!(url = %url, "opening legacy session");
        let resp: SessionResponse = self
            .http
            .post(&url)
            .json(&protocol::legacy_session_body(&self.username, &self.password))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Token {
            value: resp.session_id,
            expires: None,
        })
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let body = resp.error_for_status()?.text().await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

impl Transport for HttpTransport {
    async fn authenticate(&self) -> Result<String> {
        let token = match self.scheme {
            AuthScheme::OAuth => self.login_oauth().await?,
            AuthScheme::Session => self.login_session().await?,
        };
        let value = token.value.clone();
        self.store_token(token);
        Ok(value)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let token = self.token().await?;
        let url = self.url(path);
        trace!(url = %url, "GET");
        let resp = self.with_auth(self.http.get(&url), &token).send().await?;
        read_json(resp).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let token = self.token().await?;
        let url = self.url(path);
        trace!(url = %url, "PUT");
        let resp = self
            .with_auth(self.http.put(&url), &token)
            .json(body)
            .send()
            .await?;
        read_json(resp).await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use serde_json::Value;

    use super::Transport;
    use crate::{Error, Result};

    /// Scripted in-memory transport. GET responses are queued per path; the
    /// last queued response repeats. PUTs are recorded and answered in order.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        gets: Mutex<HashMap<String, VecDeque<Value>>>,
        put_replies: Mutex<VecDeque<Value>>,
        pub(crate) puts: Mutex<Vec<(String, Value)>>,
        pub(crate) get_log: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        pub(crate) fn on_get(&self, path: &str, body: Value) -> &Self {
            self.gets
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default()
                .push_back(body);
            self
        }

        pub(crate) fn on_put(&self, body: Value) -> &Self {
            self.put_replies.lock().unwrap().push_back(body);
            self
        }

        pub(crate) fn puts(&self) -> Vec<(String, Value)> {
            self.puts.lock().unwrap().clone()
        }

        pub(crate) fn gets_of(&self, path: &str) -> usize {
            self.get_log
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_str() == path)
                .count()
        }
    }

    impl Transport for FakeTransport {
        async fn authenticate(&self) -> Result<String> {
            Ok("token".into())
        }

        async fn get(&self, path: &str) -> Result<Value> {
            self.get_log.lock().unwrap().push(path.to_string());
            let mut gets = self.gets.lock().unwrap();
            let queue = gets
                .get_mut(path)
                .ok_or_else(|| Error::Lookup(format!("no fake response for {path}")))?;
            let body = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            body.ok_or_else(|| Error::Lookup(format!("no fake response for {path}")))
        }

        async fn put(&self, path: &str, body: &Value) -> Result<Value> {
            self.puts
                .lock()
                .unwrap()
                .push((path.to_string(), body.clone()));
            Ok(self
                .put_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Value::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_credentials() {
        let err = HttpTransport::builder(AuthScheme::OAuth).build().err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn default_base_follows_scheme() {
        let rest = HttpTransport::builder(AuthScheme::OAuth)
            .credentials("user@example.com", "secret")
            .build()
            .unwrap();
        assert_eq!(rest.url("userAccount"), format!("{REST_BASE_URL}/userAccount"));

        let legacy = HttpTransport::builder(AuthScheme::Session)
            .credentials("user@example.com", "secret")
            .base_url("http://localhost:9/WebAPI/api/")
            .build()
            .unwrap();
        assert_eq!(legacy.url("/Session"), "http://localhost:9/WebAPI/api/Session");
    }

    #[test]
    fn expired_tokens_are_not_reused() {
        let t = Token {
            value: "abc".into(),
            expires: Some(Instant::now() + Duration::from_secs(5)),
        };
        assert!(!t.is_fresh());
        let forever = Token {
            value: "abc".into(),
            expires: None,
        };
        assert!(forever.is_fresh());
    }
}
