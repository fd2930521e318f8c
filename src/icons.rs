//! The managed icon directory.
//!
//! Icons chosen by the user are *copied* into one application-owned folder
//! and buttons refer to the copies.  Several buttons may point at the same
//! file, so a file is only removed once a scan of every button shows that
//! nothing references it any more.

use crate::config::ButtonConfig;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Handle to the managed icon directory.
#[derive(Debug, Clone)]
pub struct IconLibrary {
    dir: PathBuf,
}

/// Errors from copying or deleting managed icons.
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),
    #[error("failed to create icon directory {}: {source}", .dir.display())]
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to delete {}: {source}", .path.display())]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl IconLibrary {
    /// Use `dir` as the managed directory.  It is created lazily on the
    /// first import.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `path` is a direct child of the managed directory.
    pub fn contains(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        match (fs::canonicalize(parent), fs::canonicalize(&self.dir)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Copy `source` into the managed directory and return the managed path.
    ///
    /// The copy keeps the original file name.  If a different file already
    /// has that name, `_1`, `_2`, … is appended before the extension until
    /// an unused name is found.  Importing a file that already lives at its
    /// destination returns that path without copying.
    pub fn import(&self, source: &Path) -> Result<PathBuf, IconError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| IconError::NoFileName(source.to_path_buf()))?;
        fs::create_dir_all(&self.dir).map_err(|e| IconError::CreateDir {
            dir: self.dir.clone(),
            source: e,
        })?;

        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = Path::new(file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut dest = self.dir.join(file_name);
        let mut counter = 1;
        while dest.exists() && !same_file(source, &dest) {
            dest = self.dir.join(format!("{}_{}{}", stem, counter, ext));
            counter += 1;
        }

        if same_file(source, &dest) {
            debug!("{} is already managed", dest.display());
            return Ok(dest);
        }

        fs::copy(source, &dest).map_err(|e| IconError::Copy {
            from: source.to_path_buf(),
            to: dest.clone(),
            source: e,
        })?;
        info!("imported icon {} as {}", source.display(), dest.display());
        Ok(dest)
    }

    /// Delete `old` if a button is dropping it and nobody else uses it.
    ///
    /// `old` is the image the button `excluding` used to reference and `new`
    /// the one it references now.  The file is removed only when the two
    /// differ, no *other* button in `buttons` still references `old`, and
    /// `old` lies inside the managed directory.  Returns whether a file was
    /// deleted.
    pub fn reclaim_unused(
        &self,
        old: Option<&Path>,
        new: Option<&Path>,
        buttons: &BTreeMap<u32, ButtonConfig>,
        excluding: u32,
    ) -> Result<bool, IconError> {
        let Some(old) = old else {
            return Ok(false);
        };
        if Some(old) == new || !old.exists() || !self.contains(old) {
            return Ok(false);
        }
        let still_used = buttons
            .iter()
            .filter(|(index, _)| **index != excluding)
            .any(|(_, config)| config.image_path.as_deref() == Some(old));
        if still_used {
            debug!("keeping {}, still referenced", old.display());
            return Ok(false);
        }
        fs::remove_file(old).map_err(|e| IconError::Delete {
            path: old.to_path_buf(),
            source: e,
        })?;
        info!("deleted unused icon {}", old.display());
        Ok(true)
    }

    /// Delete every file in the managed directory.
    ///
    /// Failures are logged and skipped.  Returns the number of files
    /// removed.
    pub fn clear(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to list {}: {}", self.dir.display(), e);
                }
                return 0;
            }
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("failed to delete {}: {}", path.display(), e),
            }
        }
        info!("removed {} icon(s) from {}", removed, self.dir.display());
        removed
    }
}

/// Whether `a` and `b` name the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
