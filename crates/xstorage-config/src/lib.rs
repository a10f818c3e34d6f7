//! Shared configuration for xstorage tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), token
//! file locations, and translation to `xstorage_core::DeviceConfig`. The
//! CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use xstorage_api::{AccountType, Credentials, TlsMode};
use xstorage_core::{DEFAULT_POLL_INTERVAL, DeviceConfig};

/// Keyring service name; entries are keyed `{profile}/password`.
pub const KEYRING_SERVICE: &str = "xstorage";

/// Prefix for environment overrides, e.g. `XSTORAGE_DEFAULTS__TIMEOUT`.
pub const ENV_PREFIX: &str = "XSTORAGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Profile `name`, or [`ConfigError::UnknownProfile`].
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| ConfigError::UnknownProfile {
            profile: name.into(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between polling cycles for `watch`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

/// A named device profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Device host or IP, optionally with scheme and port.
    pub host: String,

    pub username: Option<String>,

    /// Plaintext password (prefer keyring or `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// `customer` or `tech`. Profiles written before the field existed
    /// are technician profiles.
    #[serde(default)]
    pub account_type: AccountType,

    /// Inverter serial number, required for technician accounts.
    pub inverter_serial: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept the device's self-signed certificate. Defaults to `true`
    /// unless `ca_cert` is set.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Override poll interval (seconds).
    pub poll_interval: Option<u64>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "xstorage", "xstorage")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("xstorage");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding persisted device sessions.
pub fn token_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("tokens"),
        |dirs| dirs.data_dir().join("tokens"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_key(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

/// Username from the profile, else `XSTORAGE_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| std::env::var("XSTORAGE_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password from the credential chain.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Global env var
    if let Ok(pw) = std::env::var("XSTORAGE_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    // 2. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name)) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_key(profile_name))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Full sign-in credentials for a profile.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;

    match profile.account_type {
        AccountType::Customer => Ok(Credentials::customer(username, password)),
        AccountType::Technician => {
            let serial = profile
                .inverter_serial
                .clone()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| ConfigError::Validation {
                    field: "inverter_serial".into(),
                    reason: format!("profile '{profile_name}' uses a technician account but has no inverter serial"),
                })?;
            Ok(Credentials::technician(username, password, serial))
        }
    }
}

/// TLS mode for a profile: a CA file wins unless `insecure` is forced;
/// otherwise the self-signed device certificate is accepted.
pub fn resolve_tls(profile: &Profile) -> TlsMode {
    match (&profile.ca_cert, profile.insecure) {
        (_, Some(true)) | (None, _) => TlsMode::DangerAcceptInvalid,
        (Some(path), _) => TlsMode::CustomCa(path.clone()),
    }
}

/// Build a `DeviceConfig` from a profile, no CLI flag overrides.
pub fn profile_to_device_config(profile: &Profile, profile_name: &str) -> Result<DeviceConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }

    let credentials = resolve_credentials(profile, profile_name)?;
    let mut config = DeviceConfig::new(profile.host.clone(), credentials);
    config.tls = resolve_tls(profile);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout));
    config.poll_interval = Duration::from_secs(profile.poll_interval.unwrap_or_else(default_poll_interval));
    config.token_dir = Some(token_dir());

    config.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}
