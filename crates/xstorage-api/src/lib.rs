// xstorage-api: Async Rust client for the Eaton xStorage Home local REST API

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod session;
pub mod settings;
pub mod token_store;
pub mod transport;

mod device;

pub use reqwest::Method;

pub use auth::{AccountType, Credentials, EMAIL_PLACEHOLDER};
pub use device::{DeviceCommand, NotificationQuery};
pub use endpoint::Endpoint;
pub use error::{AuthErrorKind, Error, FetchError, FetchErrorKind};
pub use session::{Session, SessionClient};
pub use settings::flatten_settings_for_put;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{TlsMode, TransportConfig};
