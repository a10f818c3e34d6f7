// ── Core error types ──
//
// User-facing errors from xstorage-core. HTTP statuses and body parse
// failures never surface here: endpoint failures are absorbed into the
// snapshot, and only whole-cycle or authentication outcomes become a
// `CoreError`.

use thiserror::Error;
use xstorage_api::AuthErrorKind;

/// Unified error type for the core crate.
///
/// `Clone` so that a coalesced refresh can hand the same outcome to every
/// waiter.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed ({kind}): {message}")]
    Authentication { kind: AuthErrorKind, message: String },

    // ── Cycle errors ─────────────────────────────────────────────────
    /// One or more required endpoints produced no data this cycle.
    #[error("Update failed: no data from {}", .endpoints.join(", "))]
    UpdateFailed { endpoints: Vec<String> },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api { message: String },
}

impl CoreError {
    /// Returns `true` if the next polling cycle may succeed on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpdateFailed { .. } | Self::ConnectionFailed { .. })
    }

    /// The classified reason, if this is an authentication rejection.
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Self::Authentication { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<xstorage_api::Error> for CoreError {
    fn from(err: xstorage_api::Error) -> Self {
        match err {
            xstorage_api::Error::Authentication { kind, message } => {
                CoreError::Authentication { kind, message }
            }
            xstorage_api::Error::Connectivity { url, source } => CoreError::ConnectionFailed {
                url,
                reason: source.to_string(),
            },
            xstorage_api::Error::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                CoreError::ConnectionFailed {
                    url: e
                        .url()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "<unknown>".into()),
                    reason: e.to_string(),
                }
            }
            xstorage_api::Error::Transport(e) => CoreError::Api {
                message: e.to_string(),
            },
            xstorage_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            xstorage_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            xstorage_api::Error::TokenStore { message } => CoreError::Api { message },
        }
    }
}
