//! On-disk storage of page ink rasters.
//!
//! Each page of a notebook is one PNG named `{notebook}_{page:05}.png`
//! inside the store directory. Writes go to a temporary file first and are
//! renamed into place, so a concurrent reader never sees a partial file and
//! the last completed save of a page wins.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RenderError, RenderResult};

/// Identifier of a notebook (the set of pages saved together).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotebookId(Uuid);

impl NotebookId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NotebookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NotebookId {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| RenderError::Resource(format!("Invalid notebook id {s:?}: {e}")))
    }
}

/// Address of one persisted page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageKey {
    /// Notebook the page belongs to.
    pub notebook: NotebookId,
    /// Zero-based page index.
    pub page: usize,
}

impl PageKey {
    /// Create a key.
    #[must_use]
    pub const fn new(notebook: NotebookId, page: usize) -> Self {
        Self { notebook, page }
    }

    /// File name of the ink raster.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_{:05}.png", self.notebook, self.page)
    }

    /// File name of the exported page with its background flattened in.
    #[must_use]
    pub fn annotated_file_name(&self) -> String {
        format!("annotated_{}", self.file_name())
    }
}

/// Directory of page rasters.
///
/// Clones share the record of the newest revision written per page.
#[derive(Debug, Clone)]
pub struct PageStore {
    root: PathBuf,
    revisions: Arc<Mutex<HashMap<PageKey, u64>>>,
}

impl PageStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_data_dir(root: impl Into<PathBuf>) -> RenderResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            revisions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a page's ink raster.
    #[must_use]
    pub fn path_for(&self, key: PageKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Write a page raster.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, key: PageKey, png: &[u8]) -> RenderResult<PathBuf> {
        let path = self.path_for(key);
        write_atomic(&path, png)?;
        tracing::info!(page = key.page, path = %path.display(), "Page saved");
        Ok(path)
    }

    /// Write a page raster unless a newer revision of the page is already on
    /// disk. Returns `None` when the write was skipped.
    ///
    /// Writes through one store are serialized, so saves finishing out of
    /// order never replace newer content with older content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_revision(
        &self,
        key: PageKey,
        revision: u64,
        png: &[u8],
    ) -> RenderResult<Option<PathBuf>> {
        let mut revisions = self
            .revisions
            .lock()
            .map_err(|_| RenderError::Task("Page store lock poisoned".to_string()))?;
        if let Some(&newest) = revisions.get(&key) {
            if newest > revision {
                tracing::debug!(page = key.page, revision, newest, "Skipping superseded save");
                return Ok(None);
            }
        }
        let path = self.save(key, png)?;
        revisions.insert(key, revision);
        Ok(Some(path))
    }

    /// Read a page raster, `None` if the page was never saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self, key: PageKey) -> RenderResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a page raster. Returns whether a file was removed.
    pub fn delete(&self, key: PageKey) -> bool {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("Failed to delete page file {}: {e}", path.display());
                false
            }
        }
    }

    /// Pages of a notebook that have been saved, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn saved_pages(&self, notebook: NotebookId) -> RenderResult<Vec<usize>> {
        let prefix = format!("{notebook}_");
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(page) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".png"))
                .and_then(|digits| digits.parse::<usize>().ok())
            {
                pages.push(page);
            }
        }
        pages.sort_unstable();
        Ok(pages)
    }

    /// Write an exported page (background and ink) next to the rasters.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_annotated(&self, key: PageKey, png: &[u8]) -> RenderResult<PathBuf> {
        let path = self.root.join(key.annotated_file_name());
        write_atomic(&path, png)?;
        tracing::info!(page = key.page, path = %path.display(), "Annotated page exported");
        Ok(path)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> RenderResult<()> {
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
