use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Keys for the four persisted values.
pub const KEY_TOKEN: &str = "token";
pub const KEY_CURRENT_USER: &str = "current_user";
pub const KEY_USERS: &str = "users";
pub const KEY_MESSAGES: &str = "messages";

/// Key/value persistence for JSON-encoded app state. Injected into the
/// stores so a real backend could replace the local files later.
pub trait Storage {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// File-backed store: one JSON file per key under the data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Default data directory, e.g. ~/.local/share/chatterm on Linux.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
            .unwrap_or_else(|| PathBuf::from(".data"))
            .join("chatterm")
    }

    /// Remove every persisted value (used by --fresh).
    pub fn clear(&mut self) -> Result<()> {
        for key in [KEY_TOKEN, KEY_CURRENT_USER, KEY_USERS, KEY_MESSAGES] {
            self.remove(key)?;
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStore {
    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Decode a stored value. Absent or malformed JSON yields None; stale data
/// never aborts the app.
pub fn load<T: DeserializeOwned>(storage: &impl Storage, key: &str) -> Option<T> {
    storage
        .read(key)
        .and_then(|raw| serde_json::from_str(&raw).ok())
}

pub fn load_or_default<T: DeserializeOwned + Default>(storage: &impl Storage, key: &str) -> T {
    load(storage, key).unwrap_or_default()
}

pub fn save<T: Serialize>(storage: &mut impl Storage, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    storage.write(key, &raw)
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl Storage for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_values() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(tmp.path().join("state")).unwrap();

        save(&mut store, KEY_TOKEN, &"abc".to_string()).unwrap();
        let token: Option<String> = load(&store, KEY_TOKEN);
        assert_eq!(token.as_deref(), Some("abc"));

        store.remove(KEY_TOKEN).unwrap();
        assert!(store.read(KEY_TOKEN).is_none());
    }

    #[test]
    fn malformed_json_reads_as_absent() {
        let mut store = MemoryStore::default();
        store.write(KEY_USERS, "{not json").unwrap();

        let users: Option<Vec<String>> = load(&store, KEY_USERS);
        assert!(users.is_none());
        let defaulted: Vec<String> = load_or_default(&store, KEY_USERS);
        assert!(defaulted.is_empty());
    }

    #[test]
    fn clear_removes_every_key() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(tmp.path().to_path_buf()).unwrap();
        for key in [KEY_TOKEN, KEY_CURRENT_USER, KEY_USERS, KEY_MESSAGES] {
            store.write(key, "1").unwrap();
        }

        store.clear().unwrap();
        for key in [KEY_TOKEN, KEY_CURRENT_USER, KEY_USERS, KEY_MESSAGES] {
            assert!(store.read(key).is_none());
        }
    }
}
