//! Disk-backed set of user ids that have already received a welcome message
//!
//! File format: one decimal user id per line, newline-terminated. The file is
//! only ever appended to; concurrent processes sharing one file are not
//! supported.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::provider::UserId;

#[derive(Debug)]
pub struct MessagedStore {
    path: PathBuf,
    ids: HashSet<UserId>,
}

impl MessagedStore {
    /// Load the store from `path`
    ///
    /// A missing file is treated as an empty store. Blank lines are ignored and
    /// lines that are not integers are skipped with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Messaged-user store {} not found, starting empty", path.display());
                String::new()
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let mut ids = HashSet::new();
        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.parse::<UserId>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => warn!(
                    "Skipping malformed entry on line {} of {}: {:?}",
                    line_no + 1,
                    path.display(),
                    trimmed
                ),
            }
        }

        debug!("Loaded {} messaged user(s) from {}", ids.len(), path.display());
        Ok(Self { path, ids })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add `id` to the set and append it to the file
    ///
    /// The in-memory set is updated even when the append fails, so the
    /// current process still never messages the same user twice.
    /// Returns `Ok(false)` when the id was already present.
    pub fn record(&mut self, id: UserId) -> Result<bool, StoreError> {
        if !self.ids.insert(id) {
            return Ok(false);
        }
        self.append(id)?;
        Ok(true)
    }

    fn append(&self, id: UserId) -> Result<(), StoreError> {
        let to_error = |source| StoreError::Append {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(to_error)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(to_error)?;
        writeln!(file, "{}", id).map_err(to_error)
    }
}
