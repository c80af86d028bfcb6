//! Persisted, role-derived hints (region and program track) that other screens read to
//! avoid re-fetching the identity. They are written on a successful resolution and wiped
//! on logout. Nothing here is ever consulted for an authorization decision.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::tprintln;

use super::principal::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HintKey {
    UserRegionId,
    RegionName,
    UserComponent,
}

impl HintKey {
    pub const ALL: [HintKey; 3] = [HintKey::UserRegionId, HintKey::RegionName, HintKey::UserComponent];

    /// Storage key, shared with any other client reading the same medium.
    pub const fn as_str(self) -> &'static str {
        match self {
            HintKey::UserRegionId => "userRegionId",
            HintKey::RegionName => "regionName",
            HintKey::UserComponent => "userComponent",
        }
    }
}

/// Key/value medium for the hints. Swap the implementation to change where they live.
pub trait HintStore: Send + Sync {
    fn get(&self, key: HintKey) -> Option<String>;
    fn set(&self, key: HintKey, value: &str) -> AppResult<()>;
    fn clear(&self, key: HintKey) -> AppResult<()>;

    /// Remove every hint. Implementations that can do this in one step should override.
    fn clear_all(&self) -> AppResult<()> {
        for key in HintKey::ALL {
            self.clear(key)?;
        }
        Ok(())
    }
}

/// Process-wide in-memory medium.
#[derive(Debug, Default)]
pub struct MemoryHintStore {
    map: RwLock<HashMap<HintKey, String>>,
}

impl MemoryHintStore {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
}

impl HintStore for MemoryHintStore {
    fn get(&self, key: HintKey) -> Option<String> {
        self.map.read().get(&key).cloned()
    }

    fn set(&self, key: HintKey, value: &str) -> AppResult<()> {
        self.map.write().insert(key, value.to_string());
        Ok(())
    }

    fn clear(&self, key: HintKey) -> AppResult<()> {
        self.map.write().remove(&key);
        Ok(())
    }

    fn clear_all(&self) -> AppResult<()> {
        self.map.write().clear();
        Ok(())
    }
}

/// JSON file medium: one flat object keyed by [`HintKey::as_str`].
/// Survives restarts the way browser-local storage survives reloads.
#[derive(Debug)]
pub struct FileHintStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileHintStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn read_map(&self) -> AppResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(map)?;
        // write-then-rename so readers never observe a half-written file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl HintStore for FileHintStore {
    fn get(&self, key: HintKey) -> Option<String> {
        let _g = self.lock.lock();
        match self.read_map() {
            Ok(map) => map.get(key.as_str()).cloned(),
            Err(e) => {
                tracing::warn!(target: "creathon::hints", "unreadable hints file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: HintKey, value: &str) -> AppResult<()> {
        let _g = self.lock.lock();
        // a corrupt file is replaced rather than blocking the write
        let mut map = self.read_map().unwrap_or_default();
        map.insert(key.as_str().to_string(), value.to_string());
        self.write_map(&map)
    }

    fn clear(&self, key: HintKey) -> AppResult<()> {
        let _g = self.lock.lock();
        let mut map = self.read_map().unwrap_or_default();
        if map.remove(key.as_str()).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }

    fn clear_all(&self) -> AppResult<()> {
        let _g = self.lock.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tprintln!("hints.clear_all removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::io("hints_clear_failed".to_string(), e.to_string())),
        }
    }
}

/// Typed snapshot of the hints for screens that only need to read them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_region_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_component: Option<String>,
}

impl SessionHints {
    pub fn read(store: &dyn HintStore) -> Self {
        Self {
            user_region_id: store.get(HintKey::UserRegionId),
            region_name: store.get(HintKey::RegionName),
            user_component: store.get(HintKey::UserComponent),
        }
    }

    /// Program track, when the stored value is one we know.
    pub fn track(&self) -> Option<Track> {
        self.user_component.as_deref().and_then(Track::parse)
    }

    pub fn is_empty(&self) -> bool {
        self.user_region_id.is_none() && self.region_name.is_none() && self.user_component.is_none()
    }
}
