// Authentication handshake
//
// Credential types, the sign-in / refresh-token exchanges, and the
// classification of rejected sign-ins into actionable error kinds.
// State handling (who may refresh, when) lives in `session.rs`.

use chrono::{TimeDelta, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{AuthErrorKind, Error};
use crate::session::{Session, SessionClient};

/// Email the sign-in endpoint insists on for technician accounts.
/// The device never checks it.
pub const EMAIL_PLACEHOLDER: &str = "anything@anything.com";

/// Vendor error code reported once an account is locked out.
const ACCOUNT_LOCKED_CODE: &str = "10";

/// Token lifetime assumed when the device omits `expiresIn`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 55 * 60;

/// Renew this long before the device-reported expiry.
const EXPIRY_SKEW_SECS: i64 = 30;

const SIGNIN_PATH: &str = "/api/auth/signin";
const REFRESH_PATH: &str = "/api/auth/refresh";

/// Which kind of account signs in.
///
/// Technician accounts see the diagnostic endpoints and must name the
/// inverter serial at sign-in. Profiles that predate the setting are
/// technician accounts.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountType {
    Customer,
    #[default]
    #[serde(rename = "tech", alias = "technician")]
    #[strum(to_string = "tech", serialize = "technician")]
    Technician,
}

impl AccountType {
    /// Value of the `userType` field in the sign-in body.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Technician => "tech",
        }
    }

    pub fn is_technician(self) -> bool {
        matches!(self, Self::Technician)
    }
}

/// Everything needed to sign in from scratch.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    pub account_type: AccountType,
    /// Required for technician accounts, ignored otherwise.
    pub inverter_serial: Option<String>,
}

impl Credentials {
    pub fn customer(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            account_type: AccountType::Customer,
            inverter_serial: None,
        }
    }

    pub fn technician(
        username: impl Into<String>,
        password: SecretString,
        inverter_serial: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            account_type: AccountType::Technician,
            inverter_serial: Some(inverter_serial.into()),
        }
    }

    /// JSON body for `POST /api/auth/signin`.
    pub(crate) fn signin_body(&self) -> Value {
        let mut body = json!({
            "username": self.username,
            "pwd": self.password.expose_secret(),
            "userType": self.account_type.wire_name(),
        });
        if self.account_type.is_technician() {
            body["inverterSn"] = json!(self.inverter_serial.as_deref().unwrap_or_default());
            body["email"] = json!(EMAIL_PLACEHOLDER);
        }
        body
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthEnvelope {
    #[serde(default)]
    successful: bool,
    result: Option<Value>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenGrant {
    token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenGrant {
    fn into_session(self, previous_refresh: Option<&str>) -> Session {
        let lifetime = self
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let usable = (lifetime - EXPIRY_SKEW_SECS).max(0);
        let expiry = Utc::now()
            + TimeDelta::try_seconds(usable)
                .unwrap_or_else(|| TimeDelta::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        Session {
            access_token: self.token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_owned)),
            expiry,
        }
    }
}

// ── Handshake ───────────────────────────────────────────────────────

impl SessionClient {
    /// Perform the credential sign-in without touching session state.
    pub(crate) async fn sign_in(&self) -> Result<Session, Error> {
        let url = self.base_url().join(SIGNIN_PATH)?;
        debug!(user_type = self.credentials().account_type.wire_name(), "signing in at {}", url);

        let body = self.credentials().signin_body();
        let resp = self
            .http()
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|source| Error::Connectivity {
                url: url.to_string(),
                source,
            })?;

        let session = parse_grant(resp, None).await?;
        info!("signed in; bearer token acquired");
        Ok(session)
    }

    /// Trade a refresh token for a new session.
    pub(crate) async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<Session, Error> {
        let url = self.base_url().join(REFRESH_PATH)?;
        debug!("refreshing token at {}", url);

        let resp = self
            .http()
            .post(url.clone())
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(|source| Error::Connectivity {
                url: url.to_string(),
                source,
            })?;

        let session = parse_grant(resp, Some(refresh_token)).await?;
        info!("access token refreshed");
        Ok(session)
    }
}

/// Turn a sign-in / refresh response into a session or a classified error.
async fn parse_grant(resp: reqwest::Response, previous_refresh: Option<&str>) -> Result<Session, Error> {
    let status = resp.status();
    let text = resp.text().await.map_err(Error::Transport)?;

    let Ok(value) = serde_json::from_str::<Value>(&text) else {
        warn!(%status, "non-JSON auth response");
        return Err(Error::auth(
            AuthErrorKind::NonJsonResponse,
            format!("non-JSON response (HTTP {status}): {}", preview(&text)),
        ));
    };
    let Ok(envelope) = serde_json::from_value::<AuthEnvelope>(value) else {
        return Err(Error::auth(
            AuthErrorKind::UnexpectedResponse,
            format!("unexpected response (HTTP {status}): {}", preview(&text)),
        ));
    };

    if status == StatusCode::OK && envelope.successful {
        if let Some(grant) = envelope
            .result
            .and_then(|r| serde_json::from_value::<TokenGrant>(r).ok())
        {
            return Ok(grant.into_session(previous_refresh));
        }
        return Err(Error::auth(
            AuthErrorKind::UnexpectedResponse,
            "successful response without a token",
        ));
    }

    match envelope.error {
        Some(error) => Err(classify_rejection(&error)),
        None => Err(Error::auth(
            AuthErrorKind::UnexpectedResponse,
            format!("unexpected response (HTTP {status}): {}", preview(&text)),
        )),
    }
}

/// Map the device's `error` field (string or `{errCode, description}`)
/// onto an [`AuthErrorKind`], most specific first.
pub(crate) fn classify_rejection(error: &Value) -> Error {
    let (code, description) = match error {
        Value::Object(map) => (
            map.get("errCode").map(scalar_text),
            map.get("description").map(scalar_text),
        ),
        other => (None, Some(scalar_text(other))),
    };

    let message = description
        .clone()
        .filter(|d| !d.is_empty())
        .or_else(|| code.clone())
        .unwrap_or_else(|| "authentication failed".to_owned());
    let lowered = message.to_lowercase();

    let kind = if code.as_deref() == Some(ACCOUNT_LOCKED_CODE)
        || lowered.contains("error during authentication: 10")
    {
        AuthErrorKind::AccountLocked
    } else if lowered.contains("wrong credentials") {
        AuthErrorKind::WrongCredentials
    } else if lowered.contains("invalid inverter") {
        AuthErrorKind::InvalidInverterSerial
    } else {
        AuthErrorKind::Rejected
    };

    warn!(%kind, "sign-in rejected: {message}");
    Error::auth(kind, message)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_body_omits_technician_fields() {
        let creds = Credentials::customer("owner", SecretString::from("pw".to_owned()));
        let body = creds.signin_body();
        assert_eq!(body["userType"], "customer");
        assert_eq!(body["pwd"], "pw");
        assert!(body.get("inverterSn").is_none());
        assert!(body.get("email").is_none());
    }

    #[test]
    fn technician_body_carries_serial_and_placeholder_email() {
        let creds =
            Credentials::technician("installer", SecretString::from("pw".to_owned()), "SN123");
        let body = creds.signin_body();
        assert_eq!(body["userType"], "tech");
        assert_eq!(body["inverterSn"], "SN123");
        assert_eq!(body["email"], EMAIL_PLACEHOLDER);
    }

    #[test]
    fn account_type_parses_both_spellings() {
        assert_eq!("tech".parse::<AccountType>().ok(), Some(AccountType::Technician));
        assert_eq!(
            "technician".parse::<AccountType>().ok(),
            Some(AccountType::Technician)
        );
        assert_eq!("customer".parse::<AccountType>().ok(), Some(AccountType::Customer));
        assert_eq!(AccountType::default(), AccountType::Technician);
    }

    #[test]
    fn classification_follows_priority_order() {
        let locked = classify_rejection(&json!({"errCode": 10, "description": "wrong credentials"}));
        assert_eq!(locked.auth_kind(), Some(AuthErrorKind::AccountLocked));

        let wrong = classify_rejection(&json!("wrong credentials"));
        assert_eq!(wrong.auth_kind(), Some(AuthErrorKind::WrongCredentials));

        let serial = classify_rejection(&json!({"errCode": "E42", "description": "Invalid inverter SN"}));
        assert_eq!(serial.auth_kind(), Some(AuthErrorKind::InvalidInverterSerial));

        let other = classify_rejection(&json!({"errCode": "E99"}));
        assert_eq!(other.auth_kind(), Some(AuthErrorKind::Rejected));
    }

    #[test]
    fn grant_without_refresh_token_keeps_previous_one() {
        let grant = TokenGrant {
            token: "new".into(),
            refresh_token: None,
            expires_in: Some(3600),
        };
        let session = grant.into_session(Some("old-refresh"));
        assert_eq!(session.refresh_token.as_deref(), Some("old-refresh"));
        assert!(!session.is_expired());
    }
}
