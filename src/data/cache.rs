use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use log::{debug, info};

use super::loader::load_file;
use super::model::Dataset;
use super::schema::RuleTable;
use crate::error::{DataError, Result};

struct CacheEntry {
    modified: Option<SystemTime>,
    dataset: Arc<Dataset>,
}

/// Loaded datasets keyed by path and modification time.
///
/// Built once at startup and handed to consumers by reference. A file is
/// parsed again only when its modification time changes.
pub struct DatasetCache {
    rules: RuleTable,
    entries: HashMap<PathBuf, CacheEntry>,
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new(RuleTable::default())
    }
}

impl DatasetCache {
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules,
            entries: HashMap::new(),
        }
    }

    /// Return the cached dataset for `path`, loading it on first use or
    /// when the file changed since it was cached.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        let modified = match std::fs::metadata(path) {
            Ok(meta) => meta.modified().ok(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.entries.remove(path);
                return Err(DataError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(DataError::Io(e)),
        };

        if let Some(entry) = self.entries.get(path) {
            if entry.modified.is_some() && entry.modified == modified {
                debug!("cache hit for {}", path.display());
                return Ok(Arc::clone(&entry.dataset));
            }
            info!("{} changed on disk, reloading", path.display());
        }

        let dataset = Arc::new(load_file(path, &self.rules)?);
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                modified,
                dataset: Arc::clone(&dataset),
            },
        );
        Ok(dataset)
    }

    /// Drop the cached copy of `path`, if any.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
