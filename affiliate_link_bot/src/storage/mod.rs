mod types;
pub use types::UserRecord;

use std::{
    collections::BTreeMap,
    fmt::Display,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::Mutex,
};

use async_trait::async_trait;
use teloxide::types::UserId;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "user store i/o error: {e}"),
            Error::Json(e) => write!(f, "user store serialization error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}

/// The narrow interface the handlers talk to. One record per user id;
/// `put` overwrites the whole record, last writer wins.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>, Error>;
    async fn put(&self, user_id: UserId, record: UserRecord) -> Result<(), Error>;
}

/// The real store: one JSON object in one file, keys are stringified user
/// ids. The whole map lives in memory and the whole file is rewritten on
/// every mutation, with writes serialized through the mutex so two
/// handlers can't interleave partial files.
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, UserRecord>>,
}

impl JsonFileStore {
    /// Open the store, reading any existing records from `path`.
    ///
    /// A missing file means a fresh install and an unreadable one means a
    /// lost one; both start with empty state. Only an i/o error other
    /// than "not found" is reported.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();

        let records = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(records) => records,
                Err(error) => {
                    log::warn!(
                        "User file {} is corrupt, starting with empty state: {error}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(error) if error.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };

        log::info!("Loaded {} user record(s).", records.len());

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn write_out(&self, records: &BTreeMap<String, UserRecord>) -> Result<(), Error> {
        let serialized = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>, Error> {
        let records = self
            .records
            .lock()
            .expect("User store mutex should not be poisoned");
        Ok(records.get(&user_id.to_string()).cloned())
    }

    async fn put(&self, user_id: UserId, record: UserRecord) -> Result<(), Error> {
        let mut records = self
            .records
            .lock()
            .expect("User store mutex should not be poisoned");
        records.insert(user_id.to_string(), record);
        self.write_out(&records)
    }
}

/// In-memory store for tests. Same semantics as [`JsonFileStore`], no file.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, UserRecord>>,
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>, Error> {
        let records = self
            .records
            .lock()
            .expect("User store mutex should not be poisoned");
        Ok(records.get(&user_id.to_string()).cloned())
    }

    async fn put(&self, user_id: UserId, record: UserRecord) -> Result<(), Error> {
        let mut records = self
            .records
            .lock()
            .expect("User store mutex should not be poisoned");
        records.insert(user_id.to_string(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::default();
        let user = UserId(42);

        assert_eq!(store.get(user).await.unwrap(), None);

        let record = UserRecord::new("amogus".to_string(), "T12345".to_string());
        store.put(user, record.clone()).await.unwrap();
        assert_eq!(store.get(user).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn file_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        {
            let store = JsonFileStore::load(&path).unwrap();
            let mut record = UserRecord::new("amogus".to_string(), "T12345".to_string());
            record.channel_id = Some("-1001234567890".to_string());
            store.put(UserId(42), record).await.unwrap();
        }

        let store = JsonFileStore::load(&path).unwrap();
        let record = store.get(UserId(42)).await.unwrap().unwrap();
        assert_eq!(record.username, "amogus");
        assert_eq!(record.token, "T12345");
        assert_eq!(record.channel_id.as_deref(), Some("-1001234567890"));
    }

    #[tokio::test]
    async fn file_format_is_one_json_object_keyed_by_user_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let store = JsonFileStore::load(&path).unwrap();
        store
            .put(
                UserId(42),
                UserRecord::new("amogus".to_string(), "T12345".to_string()),
            )
            .await
            .unwrap();

        let on_disk: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["42"]["username"], "amogus");
        assert_eq!(on_disk["42"]["token"], "T12345");
        // No channel linked, so the key shouldn't exist at all.
        assert!(on_disk["42"].get("channel_id").is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "not json at all {{{").unwrap();

        let store = JsonFileStore::load(&path).unwrap();
        assert_eq!(store.get(UserId(42)).await.unwrap(), None);

        // And it heals on the next write.
        store
            .put(
                UserId(42),
                UserRecord::new("amogus".to_string(), "T12345".to_string()),
            )
            .await
            .unwrap();
        let reloaded = JsonFileStore::load(&path).unwrap();
        assert!(reloaded.get(UserId(42)).await.unwrap().is_some());
    }

    #[test]
    fn missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::load(dir.path().join("nope.json"));
        assert!(store.is_ok());
    }
}
