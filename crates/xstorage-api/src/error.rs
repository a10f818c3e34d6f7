use std::fmt;

use serde_json::{Value, json};
use thiserror::Error;

/// Why the device refused a sign-in or refresh.
///
/// Variants are listed in classification priority order: when a rejection
/// matches several patterns, the earliest variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuthErrorKind {
    /// Too many failed attempts; the account is locked on the device.
    AccountLocked,
    /// Username or password rejected.
    WrongCredentials,
    /// Technician sign-in with a serial the inverter does not recognise.
    InvalidInverterSerial,
    /// The device answered with something other than JSON.
    NonJsonResponse,
    /// JSON came back but it was neither a token nor an error.
    UnexpectedResponse,
    /// Any other rejection the device reported.
    Rejected,
}

/// Top-level error type for the `xstorage-api` crate.
///
/// Only raised by the authentication paths and client construction.
/// Ordinary endpoint calls report [`FetchError`] instead.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Sign-in or refresh rejected by the device.
    #[error("Authentication failed ({kind}): {message}")]
    Authentication { kind: AuthErrorKind, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// DNS failure, refused connection, timeout while authenticating.
    #[error("Cannot connect to device at {url}: {source}")]
    Connectivity {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP transport error outside the authentication handshake.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Persistence ─────────────────────────────────────────────────
    /// Token material could not be written.
    #[error("Token store error: {message}")]
    TokenStore { message: String },
}

impl Error {
    pub(crate) fn auth(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self::Authentication {
            kind,
            message: message.into(),
        }
    }

    /// The classified reason, if this is an authentication rejection.
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Self::Authentication { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` if the device could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Connectivity { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

// ── Soft failures ───────────────────────────────────────────────────

/// Coarse category of a failed endpoint call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FetchErrorKind {
    /// The request never produced a response.
    Network,
    /// The device answered with a non-2xx status.
    Status,
    /// A 2xx response whose body is not JSON.
    NonJson,
    /// The session could not be (re-)established before sending.
    Auth,
    /// The device answered `{"successful": false, ...}`.
    Rejected,
}

/// Failure of a single endpoint call.
///
/// Returned as a value from [`SessionClient::request`](crate::SessionClient::request)
/// so that callers treat every endpoint uniformly as "payload or failure".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl FetchError {
    pub(crate) fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The device-style failure object `{successful: false, error, status}`.
    pub fn to_failure_body(&self) -> Value {
        json!({
            "successful": false,
            "error": self.message,
            "status": self.status,
        })
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failure (HTTP {status}): {}", self.kind, self.message),
            None => write!(f, "{} failure: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<Error> for FetchError {
    fn from(err: Error) -> Self {
        let kind = if err.is_connectivity() {
            FetchErrorKind::Network
        } else {
            FetchErrorKind::Auth
        };
        Self::new(kind, err.to_string())
    }
}
