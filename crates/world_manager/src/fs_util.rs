//! Small filesystem helpers shared by the stores

use crate::error::{WorldError, WorldResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::{fs as tokio_fs, io::AsyncWriteExt};

/// Sibling path used to stage a write before it is renamed into place.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Writes `contents` next to `path`, syncs it, then renames it over `path`.
///
/// Readers either see the old file or the new one, never a truncated one.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> WorldResult<()> {
    let temp_path = staging_path(path);

    let mut file = tokio_fs::File::create(&temp_path)
        .await
        .map_err(|e| WorldError::io(&temp_path, e))?;

    file.write_all(contents)
        .await
        .map_err(|e| WorldError::io(&temp_path, e))?;

    file.sync_all()
        .await
        .map_err(|e| WorldError::io(&temp_path, e))?;

    drop(file);

    if let Err(e) = tokio_fs::rename(&temp_path, path).await {
        let _ = tokio_fs::remove_file(&temp_path).await;
        return Err(WorldError::io(path, e));
    }

    Ok(())
}

/// Reads a UTF-8 file, mapping "no such file" to `Ok(None)`.
pub(crate) async fn read_optional(path: &Path) -> WorldResult<Option<String>> {
    match tokio_fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WorldError::io(path, e)),
    }
}

/// `true` if `path` is a real directory (symbolic links are not followed).
pub(crate) async fn is_real_dir(path: &Path) -> bool {
    tokio_fs::symlink_metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
