use crate::epic::Epic;
use crate::error::{AgentPmError, Result};
use crate::io;
use crate::xml;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// EpicStore
// ---------------------------------------------------------------------------

/// Load/save boundary for epic documents. One command invocation owns one
/// store; implementations are not expected to coordinate concurrent writers
/// on the same path.
pub trait EpicStore {
    fn load_epic(&self, path: &Path) -> Result<Epic>;
    fn save_epic(&self, epic: &Epic, path: &Path) -> Result<()>;
    fn epic_exists(&self, path: &Path) -> bool;
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// Disk-backed store with copy-on-save atomic replace.
#[derive(Debug, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }
}

impl EpicStore for FileStore {
    fn load_epic(&self, path: &Path) -> Result<Epic> {
        if !path.exists() {
            return Err(AgentPmError::EpicNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        xml::parse_epic(&data).map_err(|e| match e {
            AgentPmError::MissingEpicRoot | AgentPmError::XmlStructure(_) => e,
            other => AgentPmError::MalformedXml {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })
    }

    fn save_epic(&self, epic: &Epic, path: &Path) -> Result<()> {
        let data = xml::serialize_epic(epic);
        io::atomic_write(path, data.as_bytes())
    }

    fn epic_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store keyed by logical path. Round-trips through the codec on
/// every load/save so tests exercise the same serialization path as disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    epics: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an epic under a logical path without going through a save flow.
    pub fn store_epic(&self, path: impl Into<PathBuf>, epic: &Epic) {
        self.epics
            .lock()
            .expect("memory store poisoned")
            .insert(path.into(), xml::serialize_epic(epic));
    }

    /// Raw document bytes for byte-level assertions in tests.
    pub fn raw(&self, path: &Path) -> Option<String> {
        self.epics
            .lock()
            .expect("memory store poisoned")
            .get(path)
            .cloned()
    }
}

impl EpicStore for MemoryStore {
    fn load_epic(&self, path: &Path) -> Result<Epic> {
        let guard = self.epics.lock().expect("memory store poisoned");
        let data = guard
            .get(path)
            .ok_or_else(|| AgentPmError::EpicNotFound(path.to_path_buf()))?;
        xml::parse_epic(data)
    }

    fn save_epic(&self, epic: &Epic, path: &Path) -> Result<()> {
        self.epics
            .lock()
            .expect("memory store poisoned")
            .insert(path.to_path_buf(), xml::serialize_epic(epic));
        Ok(())
    }

    fn epic_exists(&self, path: &Path) -> bool {
        self.epics
            .lock()
            .expect("memory store poisoned")
            .contains_key(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
