use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::warn;

/// Slot key holding the role label.
pub const ROLE_KEY: &str = "role";
/// Role reported when nothing is stored.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("slot store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// String key-value slots with no expiry, the shape of browser local storage.
pub trait SlotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SlotError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SlotError>;
    fn remove(&self, key: &str) -> Result<(), SlotError>;
}

#[derive(Debug, Default)]
pub struct MemorySlots {
    slots: RwLock<HashMap<String, String>>,
}

impl MemorySlots {
    pub fn new() -> Self { Self::default() }
}

impl SlotStore for MemorySlots {
    fn get(&self, key: &str) -> Result<Option<String>, SlotError> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SlotError> {
        self.slots.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        self.slots.write().remove(key);
        Ok(())
    }
}

/// Slots persisted as one JSON object file; survives restarts like a browser profile.
#[derive(Debug)]
pub struct FileSlots {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSlots {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SlotError> {
        if !self.path.exists() { return Ok(BTreeMap::new()); }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() { return Ok(BTreeMap::new()); }
        Ok(serde_json::from_str(&text)?)
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> Result<(), SlotError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(map)?)?;
        Ok(())
    }
}

impl SlotStore for FileSlots {
    fn get(&self, key: &str) -> Result<Option<String>, SlotError> {
        let _g = self.lock.lock();
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SlotError> {
        let _g = self.lock.lock();
        let mut map = self.read_all()?;
        map.insert(key.to_string(), value.to_string());
        self.write_all(&map)
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        let _g = self.lock.lock();
        let mut map = self.read_all()?;
        if map.remove(key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }
}

/// Role label for one session. Any string is accepted; storage failures degrade to the
/// default role instead of surfacing.
#[derive(Clone)]
pub struct RoleStore {
    slots: Arc<dyn SlotStore>,
}

impl RoleStore {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self { Self { slots } }

    pub fn in_memory() -> Self { Self::new(Arc::new(MemorySlots::new())) }

    pub fn set_role(&self, role: &str) {
        if let Err(e) = self.slots.set(ROLE_KEY, role) {
            warn!(target: "session", "failed to store role: {e}");
        }
    }

    pub fn get_role(&self) -> String {
        match self.slots.get(ROLE_KEY) {
            Ok(Some(role)) => role,
            Ok(None) => DEFAULT_ROLE.to_string(),
            Err(e) => {
                warn!(target: "session", "failed to read role, using default: {e}");
                DEFAULT_ROLE.to_string()
            }
        }
    }

    pub fn clear_role(&self) {
        if let Err(e) = self.slots.remove(ROLE_KEY) {
            warn!(target: "session", "failed to clear role: {e}");
        }
    }
}

impl std::fmt::Debug for RoleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleStore").field("role", &self.get_role()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear_cycle() {
        let roles = RoleStore::in_memory();
        assert_eq!(roles.get_role(), "user");
        roles.set_role("admin");
        assert_eq!(roles.get_role(), "admin");
        roles.clear_role();
        assert_eq!(roles.get_role(), "user");
    }

    #[test]
    fn arbitrary_labels_are_accepted() {
        let roles = RoleStore::in_memory();
        roles.set_role("counsellor");
        assert_eq!(roles.get_role(), "counsellor");
    }

    #[test]
    fn file_slots_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile").join("local_storage.json");

        RoleStore::new(Arc::new(FileSlots::new(&path))).set_role("admin");
        let reopened = RoleStore::new(Arc::new(FileSlots::new(&path)));
        assert_eq!(reopened.get_role(), "admin");

        reopened.clear_role();
        assert_eq!(RoleStore::new(Arc::new(FileSlots::new(&path))).get_role(), "user");
    }

    #[test]
    fn file_slots_keep_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let slots = FileSlots::new(dir.path().join("ls.json"));
        slots.set("theme", "dark").unwrap();
        slots.set(ROLE_KEY, "admin").unwrap();
        slots.remove(ROLE_KEY).unwrap();
        assert_eq!(slots.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(slots.get(ROLE_KEY).unwrap(), None);
    }

    #[test]
    fn corrupt_file_falls_back_to_default_role() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ls.json");
        std::fs::write(&path, "{not json").unwrap();
        let roles = RoleStore::new(Arc::new(FileSlots::new(&path)));
        assert_eq!(roles.get_role(), "user");
    }
}
