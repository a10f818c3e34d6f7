//! CLI error types with miette diagnostics.
//!
//! Maps core, config and endpoint errors into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use xstorage_api::{AuthErrorKind, FetchError, FetchErrorKind};
use xstorage_config::ConfigError;
use xstorage_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const UPDATE_FAILED: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(xstorage::connection_failed),
        help(
            "Check that the device is powered and reachable on the local network.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(code(xstorage::auth_failed), help("{hint}"))]
    AuthFailed { message: String, hint: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(xstorage::no_credentials),
        help(
            "Set username/password in the profile, or export XSTORAGE_USERNAME and XSTORAGE_PASSWORD.\n\
             Store a password in the keyring with: xstorage login --password-stdin --save-password"
        )
    )]
    NoCredentials { profile: String },

    // ── Polling ──────────────────────────────────────────────────────
    #[error("No data from required endpoints: {endpoints}")]
    #[diagnostic(
        code(xstorage::update_failed),
        help("The device answered but returned nothing usable. Try again in a moment, or run with -vv.")
    )]
    UpdateFailed { endpoints: String },

    // ── Device ───────────────────────────────────────────────────────
    #[error("Device rejected the request: {message}")]
    #[diagnostic(code(xstorage::rejected))]
    Rejected { message: String },

    #[error("Request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(xstorage::request_failed))]
    RequestFailed { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(xstorage::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(xstorage::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(xstorage::no_config),
        help(
            "Pass --host, or add a profile to the configuration file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{message}")]
    #[diagnostic(code(xstorage::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(xstorage::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Could not render output: {0}")]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::UpdateFailed { .. } => exit_code::UPDATE_FAILED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

fn auth_hint(kind: AuthErrorKind) -> &'static str {
    match kind {
        AuthErrorKind::AccountLocked => {
            "The account is locked after too many failed attempts. Wait before retrying."
        }
        AuthErrorKind::WrongCredentials => {
            "Check the username and password for this profile."
        }
        AuthErrorKind::InvalidInverterSerial => {
            "Check inverter_serial; it must match the serial printed on the inverter."
        }
        AuthErrorKind::NonJsonResponse | AuthErrorKind::UnexpectedResponse => {
            "The host answered but does not look like an xStorage Home device. Check --host."
        }
        AuthErrorKind::Rejected => "The device refused the sign-in. Run with -vv for details.",
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::Authentication { kind, message } => CliError::AuthFailed {
                message,
                hint: auth_hint(kind).into(),
            },
            CoreError::UpdateFailed { endpoints } => CliError::UpdateFailed {
                endpoints: endpoints.join(", "),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "device".into(),
                reason: message,
            },
            CoreError::Api { message } => CliError::RequestFailed {
                message,
                status: None,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── FetchError → CliError mapping ────────────────────────────────────

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FetchErrorKind::Network => CliError::ConnectionFailed {
                url: "device".into(),
                source: err.message.into(),
            },
            FetchErrorKind::Auth => CliError::AuthFailed {
                message: err.message,
                hint: "The session could not be renewed. Run: xstorage login".into(),
            },
            FetchErrorKind::Rejected => CliError::Rejected {
                message: err.message,
            },
            FetchErrorKind::Status | FetchErrorKind::NonJson => CliError::RequestFailed {
                message: err.message,
                status: err.status,
            },
        }
    }
}
