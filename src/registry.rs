//! Persisted record of the processes this tool has started
//!
//! The registry is the single source of truth for what is running. Every
//! mutation is written to disk before it returns so a crash between two
//! operations leaves a consistent snapshot behind.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One started process and the directory it was launched in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProcessRecord {
    pub pid: u32,
    #[serde(rename = "workingDir")]
    pub working_dir: PathBuf,
}

impl ServerProcessRecord {
    pub fn new(pid: u32, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            working_dir: working_dir.into(),
        }
    }
}

/// Ordered list of process records backed by a JSON file.
///
/// Several records may share a working directory (a project started twice
/// without a stop in between); callers that stop a directory must handle
/// every match.
#[derive(Debug)]
pub struct ProcessRegistry {
    path: PathBuf,
    records: Vec<ServerProcessRecord>,
}

impl ProcessRegistry {
    /// Create an empty registry that will persist to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Load the registry from `path`. A missing, empty or `null` file is an empty registry.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No process registry yet");
                return Ok(Self::new(path));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        let records = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Option<Vec<ServerProcessRecord>>>(&content)
                .map_err(|source| Error::Registry {
                    path: path.clone(),
                    source,
                })?
                .unwrap_or_default()
        };

        debug!(path = %path.display(), records = records.len(), "Loaded process registry");
        Ok(Self { path, records })
    }

    /// Write the registry to disk
    pub fn save(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.records).map_err(|source| Error::Registry {
                path: self.path.clone(),
                source,
            })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        // Write atomically
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &content).map_err(|e| Error::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }

    /// Append a record and persist
    pub fn add(&mut self, record: ServerProcessRecord) -> Result<()> {
        self.records.push(record);
        self.save()
    }

    /// Remove every record with `pid` and persist. Returns how many were removed.
    pub fn remove(&mut self, pid: u32) -> Result<usize> {
        let before = self.records.len();
        self.records.retain(|r| r.pid != pid);
        let removed = before - self.records.len();
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// All records launched in `working_dir`, in registry order
    pub fn find_by_working_dir(&self, working_dir: &Path) -> Vec<ServerProcessRecord> {
        self.records
            .iter()
            .filter(|r| r.working_dir == working_dir)
            .cloned()
            .collect()
    }

    pub fn records(&self) -> &[ServerProcessRecord] {
        &self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
