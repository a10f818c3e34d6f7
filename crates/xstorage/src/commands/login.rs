//! `xstorage login`: sign in from scratch and persist the session.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;

use xstorage_core::{Coordinator, CoreError};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct LoginSummary {
    profile: String,
    url: String,
    username: String,
    account_type: String,
    expires: DateTime<Utc>,
    refreshable: bool,
    password_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<String>,
}

fn detail(s: &LoginSummary) -> String {
    let mut lines = vec![
        format!("Signed in to {} as {} ({})", s.url, s.username, s.account_type),
        format!("Session valid until {}", s.expires.to_rfc3339()),
    ];
    if !s.refreshable {
        lines.push("No refresh token issued; the next expiry signs in again".into());
    }
    if s.password_saved {
        lines.push(format!("Password stored in keyring for profile '{}'", s.profile));
    }
    if let Some(ref path) = s.saved_to {
        lines.push(format!("Profile '{}' written to {path}", s.profile));
    }
    lines.join("\n")
}

pub async fn handle(
    coordinator: &Coordinator,
    args: &LoginArgs,
    global: &GlobalOpts,
    profile_name: &str,
) -> Result<(), CliError> {
    let client = coordinator.client();
    let session = client.connect().await.map_err(CoreError::from)?;

    // Only a password the device just accepted goes into the keyring.
    if args.save_password {
        xstorage_config::store_password(profile_name, client.credentials().password.expose_secret())?;
    }

    let saved_to = if args.save_profile {
        Some(save_profile(global, profile_name)?)
    } else {
        None
    };

    let credentials = client.credentials();
    let summary = LoginSummary {
        profile: profile_name.to_owned(),
        url: client.base_url().to_string(),
        username: credentials.username.clone(),
        account_type: credentials.account_type.to_string(),
        expires: session.expiry,
        refreshable: session.refresh_token.is_some(),
        password_saved: args.save_password,
        saved_to,
    };

    let out = output::render_single(global.output_format(), &summary, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Record the connection flags under `profile_name` in config.toml and
/// return the file written. Passwords never go into the file.
fn save_profile(global: &GlobalOpts, profile_name: &str) -> Result<String, CliError> {
    let mut cfg = xstorage_config::load_config_or_default();

    let mut profile = cfg.profiles.remove(profile_name).unwrap_or_default();
    config::overlay_flags(&mut profile, global);
    cfg.profiles.insert(profile_name.to_owned(), profile);

    let default_missing = cfg
        .default_profile
        .as_ref()
        .is_none_or(|name| !cfg.profiles.contains_key(name));
    if default_missing {
        cfg.default_profile = Some(profile_name.to_owned());
    }

    xstorage_config::save_config(&cfg)?;
    let path = xstorage_config::config_path();
    tracing::info!(profile = profile_name, path = %path.display(), "profile saved");
    Ok(path.display().to_string())
}
