//! Polling and aggregation layer between `xstorage-api` and its consumers.
//!
//! - **[`Coordinator`]**: authenticates once, then on every tick queries
//!   all [`EndpointCatalog`] entries concurrently and publishes a merged
//!   [`Snapshot`]. A cycle fails when a required endpoint (`status`,
//!   `device`) yields nothing; the previous snapshot then stays published.
//!
//! - **[`EndpointCatalog`]**: the fixed endpoint list for an account type.
//!   Customer accounts never poll technician-only diagnostics.
//!
//! - **[`reduce`]**: the rule turning each raw response into a snapshot
//!   field.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod cycle;
pub mod error;
pub mod snapshot;

pub use catalog::{CatalogEntry, EndpointCatalog};
pub use config::{DEFAULT_POLL_INTERVAL, DeviceConfig};
pub use coordinator::Coordinator;
pub use cycle::{CycleResult, CycleState, reduce};
pub use error::CoreError;
pub use snapshot::{BATTERY_LEVEL_PATH, DeviceInfo, Snapshot};
