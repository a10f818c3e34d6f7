//! Profile resolution: the config file's profile with CLI flags layered
//! on top, translated into a `xstorage_core::DeviceConfig`.
//!
//! This is the single place where CLI flags cross into core types.

use std::time::Duration;

use clap::ValueEnum;
use secrecy::SecretString;

use xstorage_config::{Config, Profile};
use xstorage_core::DeviceConfig;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Fill `--output` and `--color` from `[defaults]` when the flags are absent.
pub fn apply_display_defaults(global: &mut GlobalOpts, config: &Config) {
    if global.output.is_none() {
        global.output = parse_setting("defaults.output", &config.defaults.output);
    }
    if global.color.is_none() {
        global.color = parse_setting::<ColorMode>("defaults.color", &config.defaults.color);
    }
}

fn parse_setting<T: ValueEnum>(key: &str, raw: &str) -> Option<T> {
    match T::from_str(raw, true) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = raw, "ignoring config value: {e}");
            None
        }
    }
}

/// Copy connection flags (`--host`, `--username`, `--account-type`,
/// `--inverter-serial`, `--insecure`) onto `profile`.
pub fn overlay_flags(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(kind) = global.account_type {
        profile.account_type = kind.into();
    }
    if let Some(ref serial) = global.inverter_serial {
        profile.inverter_serial = Some(serial.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
}

/// The profile to use, with flag overrides applied.
///
/// Falls back to an ad-hoc profile when the named one does not exist but
/// `--host` was given.
pub fn effective_profile(global: &GlobalOpts, config: &Config, profile_name: &str) -> Result<Profile, CliError> {
    let mut profile = match config.profiles.get(profile_name) {
        Some(profile) => profile.clone(),
        None if global.host.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name.into(),
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: xstorage_config::config_path().display().to_string(),
            });
        }
    };

    overlay_flags(&mut profile, global);
    if profile.insecure.is_none() && config.defaults.insecure {
        profile.insecure = Some(true);
    }
    profile.timeout = global.timeout.or(profile.timeout).or(Some(config.defaults.timeout));
    profile.poll_interval = profile.poll_interval.or(Some(config.defaults.poll_interval));

    Ok(profile)
}

/// Options that only some commands set.
#[derive(Debug, Default)]
pub struct Overrides {
    /// Password read interactively; wins over the credential chain.
    pub password: Option<SecretString>,
    /// Poll interval for `watch`.
    pub poll_interval: Option<Duration>,
}

/// Build a `DeviceConfig` from the loaded config, profile, and CLI
/// overrides. Returns the resolved profile name alongside.
pub fn build_device_config(
    global: &GlobalOpts,
    cfg: &Config,
    overrides: Overrides,
) -> Result<(DeviceConfig, String), CliError> {
    let profile_name = active_profile_name(global, cfg);
    let mut profile = effective_profile(global, cfg, &profile_name)?;

    // The credential chain needs some password to resolve; the real one
    // is swapped in below.
    if overrides.password.is_some() {
        profile.password = Some(String::new());
        profile.password_env = None;
    }

    let mut device = xstorage_config::profile_to_device_config(&profile, &profile_name)?;
    if let Some(password) = overrides.password {
        device.credentials.password = password;
    }
    if let Some(interval) = overrides.poll_interval {
        device.poll_interval = interval;
    }

    tracing::debug!(profile = %profile_name, host = %device.host, "device config resolved");
    Ok((device, profile_name))
}
