// src/store.rs
//! File helpers shared by the baseline and counter stores.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a state file; `Ok(None)` when it does not exist yet.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
/// Readers see either the old content or the new one, never a partial write.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await.map_err(io_err(dir))?;
    }

    let tmp = tmp_path(path);
    let res = write_then_rename(&tmp, path, bytes).await;
    if res.is_err() {
        let _ = fs::remove_file(&tmp).await; // best effort
    }
    res
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut f = fs::File::create(tmp).await.map_err(io_err(tmp))?;
    f.write_all(bytes).await.map_err(io_err(tmp))?;
    f.sync_all().await.map_err(io_err(tmp))?;
    drop(f);

    fs::rename(tmp, path).await.map_err(io_err(path))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
