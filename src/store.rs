use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Durable set of disclosure URLs that have already been processed.
///
/// Persisted as a JSON array of strings. The driver saves it once per cycle,
/// after discovery and before extraction, so a crash during extraction never
/// replays a document (at most once, not exactly once).
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    seen: BTreeSet<String>,
}

impl SeenStore {
    /// Empty store backed by `path`. Nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: BTreeSet::new(),
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        match read_ids(&store.path) {
            Ok(Some(ids)) => {
                store.seen = ids.into_iter().collect();
                info!(
                    "Loaded {} seen document(s) from {}",
                    store.seen.len(),
                    store.path.display()
                );
            }
            Ok(None) => {
                info!("No seen file at {}, starting empty", store.path.display());
            }
            Err(e) => {
                warn!("Ignoring unreadable seen file: {e:#}");
            }
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Mark `id` as seen. Returns `true` if it was not seen before.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Rewrite the whole file.
    ///
    /// Writes a sibling temp file and renames it over the target, so the
    /// previous state survives an interrupted write.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let ids: Vec<&String> = self.seen.iter().collect();
        let contents = serde_json::to_string_pretty(&ids).context("failed to serialize seen set")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// `Ok(None)` when the file does not exist.
fn read_ids(path: &Path) -> Result<Option<Vec<String>>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    let ids: Vec<String> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(ids))
}
