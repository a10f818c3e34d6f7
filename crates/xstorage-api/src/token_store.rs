// Session persistence
//
// Read once when a `SessionClient` is built, written on every successful
// sign-in or refresh. Loading fails soft: anything unreadable is treated
// as "no session" and the client simply signs in again.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::session::Session;

const RECORD_VERSION: u32 = 1;

/// Where a [`SessionClient`](crate::SessionClient) keeps its tokens.
pub trait TokenStore: Send + Sync {
    /// The last saved session, or `None` if nothing usable is stored.
    fn load(&self) -> Option<Session>;

    /// Persist `session`, replacing whatever was stored before.
    fn save(&self, session: &Session) -> Result<(), Error>;
}

// ── File-backed store ───────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct TokenRecord {
    version: u32,
    #[serde(flatten)]
    session: Session,
}

/// JSON file per configuration identity.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `identity` (typically the device host or profile name)
    /// under `dir`.
    pub fn for_identity(dir: &Path, identity: &str) -> Self {
        let stem: String = identity
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        Self::new(dir.join(format!("{stem}_token.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<Session> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no stored session");
                return None;
            }
        };

        match serde_json::from_str::<TokenRecord>(&raw) {
            Ok(record) if record.version == RECORD_VERSION => Some(record.session),
            Ok(record) => {
                debug!(version = record.version, "ignoring token record with unknown version");
                None
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring unreadable token record");
                None
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        let record = TokenRecord {
            version: RECORD_VERSION,
            session: session.clone(),
        };
        let json = serde_json::to_vec_pretty(&record).map_err(|e| Error::TokenStore {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::TokenStore {
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        let staging = self.path.with_extension("json.tmp");
        write_private(&staging, &json)
            .and_then(|()| std::fs::rename(&staging, &self.path))
            .map_err(|e| Error::TokenStore {
                message: format!("cannot write {}: {e}", self.path.display()),
            })?;

        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }
}

/// Write `bytes` to a fresh file readable only by the owner (unix).
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    // A leftover staging file would keep its old mode.
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            return Err(e);
        }
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ── In-memory store ─────────────────────────────────────────────────

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<Session>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `session`.
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<Session> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Session {
        Session {
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
            expiry: Utc::now() + TimeDelta::minutes(55),
        }
    }

    #[test]
    fn file_store_round_trips_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::for_identity(dir.path(), "192.168.1.50");

        let session = sample();
        store.save(&session).unwrap();

        assert_eq!(store.load(), Some(session));
    }

    #[test]
    fn later_save_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/device_token.json"));

        store.save(&sample()).unwrap();
        let newer = Session {
            access_token: "access-2".into(),
            refresh_token: None,
            ..sample()
        };
        store.save(&newer).unwrap();

        // A fresh handle on the same file stands in for a process restart.
        let reopened = FileTokenStore::new(store.path());
        assert_eq!(reopened.load(), Some(newer));
    }

    #[test]
    fn missing_or_corrupt_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load(), None);

        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn unknown_record_version_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("v9.json"));
        std::fs::write(
            store.path(),
            r#"{"version":9,"access_token":"a","refresh_token":null,"expiry":"2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn identity_is_sanitised_into_file_name() {
        let store = FileTokenStore::for_identity(Path::new("/tmp"), "https://10.0.0.2:443");
        assert_eq!(
            store.path(),
            Path::new("/tmp/https___10.0.0.2_443_token.json")
        );
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::for_identity(dir.path(), "192.168.1.50");
        std::fs::write(store.path().with_extension("json.tmp"), "stale").unwrap();

        let session = sample();
        store.save(&session).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!store.path().with_extension("json.tmp").exists());
        assert_eq!(store.load(), Some(session));
    }

    #[test]
    fn memory_store_round_trips_session() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load(), None);
        let session = sample();
        store.save(&session).unwrap();
        assert_eq!(store.load(), Some(session));
    }
}
