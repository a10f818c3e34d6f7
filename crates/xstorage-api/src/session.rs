// Session-holding HTTP client
//
// Owns the bearer session, renews it before it lapses, retries once on
// 401, and folds every ordinary failure into a `FetchError` value.
// Endpoint wrappers are inherent methods in `device.rs`; the sign-in
// exchanges live in `auth.rs`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::Credentials;
use crate::error::{Error, FetchError, FetchErrorKind};
use crate::token_store::TokenStore;
use crate::transport::TransportConfig;

/// Bearer token material for one device session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Authenticated client for a single xStorage Home device.
///
/// The session is held behind an async mutex that doubles as the refresh
/// critical section: whoever finds the token expired renews it while
/// holding the lock, and everyone queued behind reuses the result.
pub struct SessionClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    session: Mutex<Option<Session>>,
    store: Arc<dyn TokenStore>,
}

impl SessionClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// The last persisted session, if any, is restored from `store`
    /// immediately.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials, store))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Credentials,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let restored = store.load();
        if restored.is_some() {
            debug!("restored persisted session");
        }
        Self {
            http,
            base_url,
            credentials,
            session: Mutex::new(restored),
            store,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// A copy of the current session, if one has been established.
    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Sign in with the stored credentials, replacing any current session.
    pub async fn connect(&self) -> Result<Session, Error> {
        let mut guard = self.session.lock().await;
        let fresh = self.sign_in().await?;
        self.commit(&mut guard, fresh.clone());
        Ok(fresh)
    }

    /// Renew the session: refresh token first, full sign-in as fallback.
    pub async fn refresh(&self) -> Result<Session, Error> {
        let mut guard = self.session.lock().await;
        let fresh = self.renew(guard.as_ref()).await?;
        self.commit(&mut guard, fresh.clone());
        Ok(fresh)
    }

    /// Return a usable access token, renewing first if the current one
    /// is missing or expired.
    pub async fn ensure_valid(&self) -> Result<String, Error> {
        let mut guard = self.session.lock().await;
        if let Some(current) = guard.as_ref().filter(|s| !s.is_expired()) {
            return Ok(current.access_token.clone());
        }

        debug!("token missing or expired; renewing");
        let fresh = self.renew(guard.as_ref()).await?;
        let token = fresh.access_token.clone();
        self.commit(&mut guard, fresh);
        Ok(token)
    }

    /// Renew after the device rejected `rejected`, unless a concurrent
    /// caller already replaced it.
    async fn renew_rejected(&self, rejected: &str) -> Result<String, Error> {
        let mut guard = self.session.lock().await;
        if let Some(current) = guard.as_ref() {
            if current.access_token != rejected && !current.is_expired() {
                trace!("token already replaced by a concurrent refresh");
                return Ok(current.access_token.clone());
            }
        }

        let fresh = self.renew(guard.as_ref()).await?;
        let token = fresh.access_token.clone();
        self.commit(&mut guard, fresh);
        Ok(token)
    }

    async fn renew(&self, current: Option<&Session>) -> Result<Session, Error> {
        if let Some(refresh_token) = current.and_then(|s| s.refresh_token.as_deref()) {
            match self.exchange_refresh_token(refresh_token).await {
                Ok(fresh) => return Ok(fresh),
                Err(e) => warn!(error = %e, "refresh token rejected; falling back to sign-in"),
            }
        }
        self.sign_in().await
    }

    /// Install `fresh` and persist it before the caller sees success.
    fn commit(&self, slot: &mut Option<Session>, fresh: Session) {
        if let Err(e) = self.store.save(&fresh) {
            warn!(error = %e, "failed to persist session (non-fatal)");
        }
        *slot = Some(fresh);
    }

    // ── Request execution ────────────────────────────────────────────

    /// Issue an authenticated request and return the parsed JSON body.
    ///
    /// Network errors, non-2xx statuses and non-JSON bodies come back as
    /// [`FetchError`]. A 401 triggers exactly one renewal and retry. An
    /// empty 2xx body yields `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, FetchError> {
        self.request_with_query(method, path, &[], body).await
    }

    /// Like [`request`](Self::request), with query parameters.
    pub async fn request_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, FetchError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::new(FetchErrorKind::Network, format!("invalid URL: {e}")))?;

        let token = self.ensure_valid().await?;
        let resp = self.send(&method, &url, &token, query, body).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(path, "access token rejected; renewing and retrying once");
            let token = self.renew_rejected(&token).await?;
            let retry = self.send(&method, &url, &token, query, body).await?;
            return normalize(path, retry).await;
        }

        normalize(path, resp).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        token: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, FetchError> {
        debug!("{} {}", method, url);

        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            warn!(error = %e, "network error during request to {}", url.path());
            FetchError::new(FetchErrorKind::Network, e.to_string())
        })
    }
}

/// Convert a response into a JSON payload or a [`FetchError`].
async fn normalize(path: &str, resp: reqwest::Response) -> Result<Value, FetchError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| FetchError::new(FetchErrorKind::Network, e.to_string()).with_status(status.as_u16()))?;

    if !status.is_success() {
        warn!(%status, "request to {path} failed");
        return Err(FetchError::new(FetchErrorKind::Status, preview(&text)).with_status(status.as_u16()));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|_| {
        warn!(%status, "non-JSON response from {path}");
        FetchError::new(FetchErrorKind::NonJson, preview(&text)).with_status(status.as_u16())
    })
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
