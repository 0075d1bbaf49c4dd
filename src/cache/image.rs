use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Extension appended to every cached artifact.
pub const CACHE_EXTENSION: &str = "webp";

/// Mode given to cache entries, readable by other users like a plain create.
#[cfg(unix)]
pub const ENTRY_MODE: u32 = 0o644;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Error creating cache directory {path}: {source}")]
    DirError { path: PathBuf, source: io::Error },

    #[error("Error creating cache file {path}: {source}")]
    CreateError { path: PathBuf, source: io::Error },

    #[error("Error clearing cache {path}: {source}")]
    DeleteError { path: PathBuf, source: io::Error },
}

// On-disk cache of transcoded images, one file per resource path
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a resource path to its cache entry: `<root>/<resource>.webp`.
    ///
    /// The caller is expected to pass a path made only of normal components;
    /// see [`is_plain_relative`].
    pub fn key_for(&self, resource: &Path) -> PathBuf {
        let mut file_name = resource.as_os_str().to_os_string();
        file_name.push(".");
        file_name.push(CACHE_EXTENSION);
        self.root.join(file_name)
    }

    // Plain existence check, entries never go stale
    pub async fn contains(&self, key: &Path) -> bool {
        tokio::fs::metadata(key)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Writes a cache entry through `write`, then renames it onto `key`.
    ///
    /// The entry is produced in a temporary file beside `key` so concurrent
    /// readers only ever see a missing or a complete entry. If `write` fails
    /// the temporary file is removed and nothing is left at `key`.
    pub fn store_with<F, E>(&self, key: &Path, write: F) -> Result<(), E>
    where
        F: FnOnce(&mut dyn Write) -> Result<(), E>,
        E: From<CacheError>,
    {
        let parent = key.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent).map_err(|source| CacheError::DirError {
            path: parent.to_path_buf(),
            source,
        })?;

        let create_error = |source: io::Error| CacheError::CreateError {
            path: key.to_path_buf(),
            source,
        };

        let mut temp_file = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(parent)
            .map_err(create_error)?;

        {
            let mut writer = BufWriter::new(&mut temp_file);
            write(&mut writer)?;
            writer.flush().map_err(create_error)?;
        }

        // Temp files are created 0600
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp_file
                .as_file()
                .set_permissions(std::fs::Permissions::from_mode(ENTRY_MODE))
                .map_err(create_error)?;
        }

        persist(temp_file, key).map_err(create_error)?;
        Ok(())
    }

    /// Removes the whole cache root. A missing root counts as cleared.
    pub async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::DeleteError {
                path: self.root.clone(),
                source,
            }),
        }
    }
}

fn persist(temp_file: NamedTempFile, key: &Path) -> io::Result<()> {
    temp_file.persist(key).map(|_| ()).map_err(|e| e.error)
}

/// True when `path` is non-empty and every component is a plain name.
pub fn is_plain_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}
