// Polled read endpoints.
//
// One variant per GET endpoint whose body ends up in a snapshot. Write
// endpoints (settings PUT, commands, mark-read) are not polled and keep
// their paths next to the wrappers in `device.rs`.

use reqwest::Method;
use serde::Serialize;

/// A read endpoint on the device, named the way snapshot fields are keyed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    Status,
    Device,
    ConfigState,
    Settings,
    Metrics,
    MetricsDaily,
    Schedule,
    TechnicalStatus,
    MaintenanceDiagnostics,
    Notifications,
    UnreadNotificationsCount,
}

impl Endpoint {
    /// Snapshot field name, e.g. `"metrics_daily"`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Status => "/api/device/status",
            Self::Device => "/api/device",
            Self::ConfigState => "/api/config/state",
            Self::Settings => "/api/settings",
            Self::Metrics => "/api/metrics",
            Self::MetricsDaily => "/api/metrics/daily",
            Self::Schedule => "/api/schedule",
            Self::TechnicalStatus => "/api/technicalstatus",
            Self::MaintenanceDiagnostics => "/api/maintenance/diagnostics",
            Self::Notifications => "/api/notifications",
            Self::UnreadNotificationsCount => "/api/notifications/unread",
        }
    }

    pub fn method(self) -> Method {
        Method::GET
    }

    /// Only technician accounts may call this endpoint; customers get 403.
    pub fn requires_technician(self) -> bool {
        matches!(self, Self::TechnicalStatus | Self::MaintenanceDiagnostics)
    }
}
