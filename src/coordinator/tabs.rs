use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::messages::TabId;
use crate::error::TabError;

pub type WindowId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub window: WindowId,
    pub url: String,
    pub title: String,
    pub active: bool,
    /// Larger is more recent
    pub last_accessed: u64,
}

/// Which tabs of the current window a close command removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseScope {
    Other,
    Left,
    Right,
    /// The `n` leftmost tabs
    LeftEnd(usize),
    /// The `n` rightmost tabs
    RightEnd(usize),
    /// The `n` tabs immediately left of the current one
    Previous(usize),
    /// The `n` tabs immediately right of the current one
    Next(usize),
}

/// Ids to close, given the window's tabs in strip order. The current tab is
/// never included.
pub fn tabs_to_close(window_tabs: &[TabInfo], current: TabId, scope: CloseScope) -> Vec<TabId> {
    let Some(index) = window_tabs.iter().position(|t| t.id == current) else {
        return Vec::new();
    };
    let ids: Vec<TabId> = window_tabs.iter().map(|t| t.id).collect();

    let selected: Vec<TabId> = match scope {
        CloseScope::Other => ids.iter().copied().filter(|id| *id != current).collect(),
        CloseScope::Left => ids[..index].to_vec(),
        CloseScope::Right => ids[index + 1..].to_vec(),
        CloseScope::LeftEnd(n) => ids.iter().copied().take(n).collect(),
        CloseScope::RightEnd(n) => ids.iter().rev().copied().take(n).collect(),
        CloseScope::Previous(n) => ids[index.saturating_sub(n)..index].to_vec(),
        CloseScope::Next(n) => ids[index + 1..].iter().copied().take(n).collect(),
    };

    selected.into_iter().filter(|id| *id != current).collect()
}

/// The browser's tab and window surface, as far as the coordinator needs it.
pub trait TabApi: Send + Sync {
    fn current_tab(&self) -> Result<TabInfo, TabError>;
    /// Tabs of `window` in strip order
    fn tabs_in_window(&self, window: WindowId) -> Result<Vec<TabInfo>, TabError>;
    fn close(&self, ids: &[TabId]) -> Result<(), TabError>;
    fn create(&self, url: &str, active: bool) -> Result<TabId, TabError>;
    fn duplicate(&self, id: TabId) -> Result<TabId, TabError>;
    fn move_to_new_window(&self, id: TabId) -> Result<WindowId, TabError>;
}

#[derive(Debug, Default)]
struct TabTable {
    tabs: Vec<TabInfo>,
    next_id: TabId,
    next_window: WindowId,
    clock: u64,
}

impl TabTable {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn activate(&mut self, id: TabId) -> Result<(), TabError> {
        let window = self
            .tabs
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.window)
            .ok_or(TabError::UnknownTab(id))?;
        let now = self.tick();
        for tab in self.tabs.iter_mut().filter(|t| t.window == window) {
            tab.active = tab.id == id;
            if tab.active {
                tab.last_accessed = now;
            }
        }
        Ok(())
    }

    fn insert(&mut self, window: WindowId, url: &str, title: &str, after: Option<usize>) -> TabId {
        self.next_id += 1;
        let tab = TabInfo {
            id: self.next_id,
            window,
            url: url.to_string(),
            title: title.to_string(),
            active: false,
            last_accessed: 0,
        };
        match after {
            Some(index) if index < self.tabs.len() => self.tabs.insert(index + 1, tab),
            _ => self.tabs.push(tab),
        }
        self.next_id
    }
}

/// In-process tab strip used by the scenario runner and tests.
#[derive(Debug, Default)]
pub struct MemoryTabs {
    table: Mutex<TabTable>,
}

impl MemoryTabs {
    pub fn new() -> Self {
        MemoryTabs {
            table: Mutex::new(TabTable {
                next_window: 1,
                ..TabTable::default()
            }),
        }
    }

    fn table(&self) -> Result<std::sync::MutexGuard<'_, TabTable>, TabError> {
        self.table.lock().map_err(|_| TabError::LockPoisoned)
    }

    /// Open a tab in the first window and make it active.
    pub fn open(&self, url: &str, title: &str) -> Result<TabId, TabError> {
        let mut table = self.table()?;
        let window = table.next_window;
        let id = table.insert(window, url, title, None);
        table.activate(id)?;
        Ok(id)
    }

    pub fn activate(&self, id: TabId) -> Result<(), TabError> {
        self.table()?.activate(id)
    }

    pub fn tabs(&self) -> Result<Vec<TabInfo>, TabError> {
        Ok(self.table()?.tabs.clone())
    }

    pub fn get(&self, id: TabId) -> Result<TabInfo, TabError> {
        self.table()?
            .tabs
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(TabError::UnknownTab(id))
    }
}

impl TabApi for MemoryTabs {
    fn current_tab(&self) -> Result<TabInfo, TabError> {
        self.table()?
            .tabs
            .iter()
            .filter(|t| t.active)
            .max_by_key(|t| t.last_accessed)
            .cloned()
            .ok_or(TabError::NoActiveTab)
    }

    fn tabs_in_window(&self, window: WindowId) -> Result<Vec<TabInfo>, TabError> {
        Ok(self.table()?.tabs.iter().filter(|t| t.window == window).cloned().collect())
    }

    fn close(&self, ids: &[TabId]) -> Result<(), TabError> {
        let mut table = self.table()?;
        table.tabs.retain(|t| !ids.contains(&t.id));
        debug!(closed = ids.len(), "tabs closed");
        Ok(())
    }

    fn create(&self, url: &str, active: bool) -> Result<TabId, TabError> {
        let mut table = self.table()?;
        let (window, index) = match table.tabs.iter().enumerate().filter(|(_, t)| t.active).max_by_key(|(_, t)| t.last_accessed) {
            Some((index, tab)) => (tab.window, Some(index)),
            None => (table.next_window, None),
        };
        let id = table.insert(window, url, "", index);
        if active {
            table.activate(id)?;
        }
        Ok(id)
    }

    fn duplicate(&self, id: TabId) -> Result<TabId, TabError> {
        let mut table = self.table()?;
        let (index, source) = table
            .tabs
            .iter()
            .enumerate()
            .find(|(_, t)| t.id == id)
            .map(|(i, t)| (i, t.clone()))
            .ok_or(TabError::UnknownTab(id))?;
        let copy = table.insert(source.window, &source.url, &source.title, Some(index));
        table.activate(copy)?;
        Ok(copy)
    }

    fn move_to_new_window(&self, id: TabId) -> Result<WindowId, TabError> {
        let mut table = self.table()?;
        let window = table.tabs.iter().map(|t| t.window).max().unwrap_or(0) + 1;
        table.next_window = table.next_window.max(window);
        let tab = table
            .tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TabError::UnknownTab(id))?;
        tab.window = window;
        table.activate(id)?;
        Ok(window)
    }
}
