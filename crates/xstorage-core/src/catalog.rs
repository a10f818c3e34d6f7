// Endpoint catalog
//
// The fixed list of endpoints polled each cycle, resolved once from the
// account type. Order here is the field order of every snapshot.

use xstorage_api::{AccountType, Endpoint, Method};

/// One polled endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: Endpoint,
    pub path: &'static str,
    pub method: Method,
    /// A cycle fails when a required endpoint yields no data.
    pub required: bool,
}

impl CatalogEntry {
    fn new(name: Endpoint, required: bool) -> Self {
        Self {
            name,
            path: name.path(),
            method: name.method(),
            required,
        }
    }
}

const REQUIRED: [Endpoint; 2] = [Endpoint::Status, Endpoint::Device];

const OPTIONAL: [Endpoint; 7] = [
    Endpoint::ConfigState,
    Endpoint::Settings,
    Endpoint::Metrics,
    Endpoint::MetricsDaily,
    Endpoint::Schedule,
    Endpoint::Notifications,
    Endpoint::UnreadNotificationsCount,
];

const TECHNICIAN_ONLY: [Endpoint; 2] = [Endpoint::TechnicalStatus, Endpoint::MaintenanceDiagnostics];

/// Immutable set of endpoints for one account type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCatalog {
    account_type: AccountType,
    entries: Vec<CatalogEntry>,
}

impl EndpointCatalog {
    pub fn for_account(account_type: AccountType) -> Self {
        let mut entries: Vec<CatalogEntry> = REQUIRED
            .into_iter()
            .map(|e| CatalogEntry::new(e, true))
            .chain(OPTIONAL.into_iter().map(|e| CatalogEntry::new(e, false)))
            .collect();

        if account_type.is_technician() {
            entries.extend(TECHNICIAN_ONLY.into_iter().map(|e| CatalogEntry::new(e, false)));
        }

        Self {
            account_type,
            entries,
        }
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn contains(&self, endpoint: Endpoint) -> bool {
        self.entries.iter().any(|e| e.name == endpoint)
    }

    pub fn is_required(&self, endpoint: Endpoint) -> bool {
        self.entries.iter().any(|e| e.name == endpoint && e.required)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
