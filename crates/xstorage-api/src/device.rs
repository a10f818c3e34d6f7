// Endpoint wrappers
//
// Thin mappings onto `SessionClient::request`. Reads go through the
// `Endpoint` table; writes keep their paths here.

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::FetchError;
use crate::session::SessionClient;

const SETTINGS_PATH: &str = "/api/settings";
const DEVICE_COMMAND_PATH: &str = "/api/device/command";
const DEVICE_POWER_PATH: &str = "/api/device/power";
const MARK_READ_PATH: &str = "/api/notifications/mark-read";

/// Body of `POST /api/device/command`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCommand {
    /// Device command name, e.g. `SET_CHARGE` or `SET_BASIC_MODE`.
    pub command: String,
    /// How long the command stays active, in minutes.
    pub duration: u32,
    pub parameters: Map<String, Value>,
}

impl DeviceCommand {
    pub fn new(command: impl Into<String>, duration: u32) -> Self {
        Self {
            command: command.into(),
            duration,
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Optional filters for `GET /api/notifications`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationQuery {
    pub status: Option<String>,
    pub size: Option<u32>,
    pub offset: Option<u32>,
}

impl NotificationQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref status) = self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(size) = self.size {
            pairs.push(("size", size.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

impl SessionClient {
    /// GET one of the polled read endpoints.
    pub async fn fetch(&self, endpoint: Endpoint) -> Result<Value, FetchError> {
        self.request(endpoint.method(), endpoint.path(), None).await
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn get_status(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::Status).await
    }

    pub async fn get_device(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::Device).await
    }

    pub async fn get_config_state(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::ConfigState).await
    }

    pub async fn get_settings(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::Settings).await
    }

    pub async fn get_metrics(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::Metrics).await
    }

    pub async fn get_metrics_daily(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::MetricsDaily).await
    }

    pub async fn get_schedule(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::Schedule).await
    }

    /// Technician accounts only.
    pub async fn get_technical_status(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::TechnicalStatus).await
    }

    /// Technician accounts only.
    pub async fn get_maintenance_diagnostics(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::MaintenanceDiagnostics).await
    }

    pub async fn get_notifications(&self, query: &NotificationQuery) -> Result<Value, FetchError> {
        let endpoint = Endpoint::Notifications;
        self.request_with_query(endpoint.method(), endpoint.path(), &query.to_pairs(), None)
            .await
    }

    pub async fn get_unread_notifications_count(&self) -> Result<Value, FetchError> {
        self.fetch(Endpoint::UnreadNotificationsCount).await
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// `PUT /api/settings`. The body must already be flattened, see
    /// [`flatten_settings_for_put`](crate::flatten_settings_for_put).
    pub async fn update_settings(&self, settings: &Value) -> Result<Value, FetchError> {
        debug!("sending settings update: {settings}");
        self.request(Method::PUT, SETTINGS_PATH, Some(settings)).await
    }

    pub async fn send_device_command(&self, command: &DeviceCommand) -> Result<Value, FetchError> {
        let body = json!(command);
        debug!("sending device command: {body}");
        self.request(Method::POST, DEVICE_COMMAND_PATH, Some(&body)).await
    }

    /// Switch the inverter on or off.
    pub async fn set_device_power(&self, on: bool) -> Result<Value, FetchError> {
        let body = json!({ "parameters": { "state": on } });
        self.request(Method::POST, DEVICE_POWER_PATH, Some(&body)).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Value, FetchError> {
        self.request(Method::POST, MARK_READ_PATH, None).await
    }
}
