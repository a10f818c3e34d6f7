// ── Runtime device configuration ──
//
// Describes *how* to reach one xStorage Home device. Carries credentials
// and polling cadence but never reads config files: the CLI builds a
// `DeviceConfig` and hands it in.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;
use xstorage_api::{Credentials, FileTokenStore, MemoryTokenStore, TlsMode, TokenStore, TransportConfig};

use crate::error::CoreError;

/// `host[:port]` of `url`.
pub(crate) fn host_identity(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

/// Polling interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a single device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Hostname or IP, optionally with an explicit scheme and port.
    pub host: String,
    pub credentials: Credentials,
    /// TLS verification strategy. Defaults to accepting the device's
    /// self-signed certificate.
    pub tls: TlsMode,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Time between polling cycles. Zero disables the periodic task.
    pub poll_interval: Duration,
    /// Directory for persisted sessions. `None` keeps tokens in memory.
    pub token_dir: Option<PathBuf>,
}

impl DeviceConfig {
    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        let transport = TransportConfig::default();
        Self {
            host: host.into(),
            credentials,
            tls: transport.tls,
            timeout: transport.timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            token_dir: None,
        }
    }

    /// Base URL of the device API. A bare host gets `https://`.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(CoreError::Config {
                message: "device host is empty".into(),
            });
        }
        let raw = if host.contains("://") {
            host.to_owned()
        } else {
            format!("https://{host}")
        };
        Url::parse(&raw).map_err(|e| CoreError::Config {
            message: format!("invalid device host '{}': {e}", self.host),
        })
    }

    /// Stable name for this configuration's persisted session:
    /// `{account}-{username}@{host[:port]}`, without scheme. Two accounts on
    /// one device never share a session.
    pub fn identity(&self) -> String {
        let host = self
            .base_url()
            .ok()
            .and_then(|url| host_identity(&url))
            .unwrap_or_else(|| self.host.clone());
        format!(
            "{}-{}@{host}",
            self.credentials.account_type.wire_name(),
            self.credentials.username
        )
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }

    /// File-backed store under `token_dir`, or an in-memory one.
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        match &self.token_dir {
            Some(dir) => Arc::new(FileTokenStore::for_identity(dir, &self.identity())),
            None => Arc::new(MemoryTokenStore::new()),
        }
    }

    /// Reject combinations the device would refuse anyway.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.base_url()?;
        if self.credentials.username.is_empty() {
            return Err(CoreError::Config {
                message: "username is empty".into(),
            });
        }
        let serial_missing = self
            .credentials
            .inverter_serial
            .as_deref()
            .is_none_or(str::is_empty);
        if self.credentials.account_type.is_technician() && serial_missing {
            return Err(CoreError::Config {
                message: "technician accounts need an inverter serial number".into(),
            });
        }
        Ok(())
    }
}
