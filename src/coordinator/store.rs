use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::trace;

use crate::context::messages::TabId;
use crate::error::StoreError;
use crate::hints::pool::HintPoolSnapshot;

/// Where per-tab hint stacks survive between frame loads.
pub trait HintStackStore: Send + Sync {
    fn load(&self, tab: TabId) -> Result<Option<HintPoolSnapshot>, StoreError>;
    fn save(&self, tab: TabId, snapshot: &HintPoolSnapshot) -> Result<(), StoreError>;
    fn remove(&self, tab: TabId) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStackStore {
    stacks: Mutex<HashMap<TabId, HintPoolSnapshot>>,
}

impl MemoryStackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HintStackStore for MemoryStackStore {
    fn load(&self, tab: TabId) -> Result<Option<HintPoolSnapshot>, StoreError> {
        let stacks = self.stacks.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(stacks.get(&tab).cloned())
    }

    fn save(&self, tab: TabId, snapshot: &HintPoolSnapshot) -> Result<(), StoreError> {
        let mut stacks = self.stacks.lock().map_err(|_| StoreError::LockPoisoned)?;
        stacks.insert(tab, snapshot.clone());
        Ok(())
    }

    fn remove(&self, tab: TabId) -> Result<(), StoreError> {
        let mut stacks = self.stacks.lock().map_err(|_| StoreError::LockPoisoned)?;
        stacks.remove(&tab);
        Ok(())
    }
}

/// One pretty-printed JSON file per tab, `tab-<id>.json`, under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStackStore {
    dir: PathBuf,
}

impl JsonFileStackStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(JsonFileStackStore {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn path_for(&self, tab: TabId) -> PathBuf {
        self.dir.join(format!("tab-{tab}.json"))
    }
}

impl HintStackStore for JsonFileStackStore {
    fn load(&self, tab: TabId) -> Result<Option<HintPoolSnapshot>, StoreError> {
        let path = self.path_for(tab);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, tab: TabId, snapshot: &HintPoolSnapshot) -> Result<(), StoreError> {
        let path = self.path_for(tab);
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&path, json)?;
        trace!(tab, path = %path.display(), "hint stack saved");
        Ok(())
    }

    fn remove(&self, tab: TabId) -> Result<(), StoreError> {
        let path = self.path_for(tab);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
