//! The `worlds/active` symbolic link
//!
//! The link target is the bare directory name of the live world, relative to
//! the worlds root. Repointing stages a new link under a hidden name and
//! renames it over `active`, so a reader always sees either the old or the new
//! target and never a missing pointer.

use crate::error::{WorldError, WorldResult};
use crate::fs_util;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tracing::{debug, info};

/// Name of the pointer entry inside the worlds root.
pub const POINTER_NAME: &str = "active";

const STAGING_NAME: &str = ".active.tmp";

#[derive(Debug, Clone)]
pub struct ActiveWorldPointer {
    worlds_root: PathBuf,
}

impl ActiveWorldPointer {
    pub fn new(worlds_root: impl AsRef<Path>) -> Self {
        Self {
            worlds_root: worlds_root.as_ref().to_path_buf(),
        }
    }

    pub fn link_path(&self) -> PathBuf {
        self.worlds_root.join(POINTER_NAME)
    }

    /// Resolves the pointer to the id of the active world.
    ///
    /// # Errors
    ///
    /// * [`WorldError::PointerMissing`] if there is no `active` entry
    /// * [`WorldError::PointerInvalid`] if `active` is not a symbolic link
    /// * [`WorldError::PointerDangling`] if the target is not an existing
    ///   world directory
    pub async fn get_active(&self) -> WorldResult<String> {
        let link = self.link_path();

        let file_type = match tokio_fs::symlink_metadata(&link).await {
            Ok(meta) => meta.file_type(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WorldError::PointerMissing(link))
            }
            Err(e) => return Err(WorldError::io(link, e)),
        };

        if !file_type.is_symlink() {
            return Err(WorldError::PointerInvalid(link));
        }

        let target = tokio_fs::read_link(&link)
            .await
            .map_err(|e| WorldError::io(&link, e))?;

        let Some(world_id) = target.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Err(WorldError::PointerDangling {
                link,
                target: target.display().to_string(),
            });
        };

        if !fs_util::is_real_dir(&self.worlds_root.join(&world_id)).await {
            return Err(WorldError::PointerDangling {
                link,
                target: world_id,
            });
        }

        Ok(world_id)
    }

    /// Like [`get_active`](Self::get_active), but a missing or broken pointer
    /// reads as "no active world".
    pub async fn try_active(&self) -> Option<String> {
        match self.get_active().await {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("No resolvable active world: {}", e);
                None
            }
        }
    }

    /// Points `active` at `world_id`.
    ///
    /// Does not check that the world exists; that is the caller's job. Calling
    /// it again with the same id leaves the pointer unchanged.
    pub async fn set_active(&self, world_id: &str) -> WorldResult<()> {
        let link = self.link_path();
        let staging = self.worlds_root.join(STAGING_NAME);
        let failed = |source: io::Error| WorldError::PointerUpdateFailed {
            target: world_id.to_string(),
            source,
        };

        match tokio_fs::remove_file(&staging).await {
            Ok(()) => debug!("Removed stale pointer staging link {}", staging.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(failed(e)),
        }

        create_link(world_id, &staging).await.map_err(failed)?;

        if let Err(e) = tokio_fs::rename(&staging, &link).await {
            let _ = tokio_fs::remove_file(&staging).await;
            return Err(failed(e));
        }

        info!("Active world pointer now targets '{}'", world_id);
        Ok(())
    }
}

#[cfg(unix)]
async fn create_link(target: &str, link: &Path) -> io::Result<()> {
    tokio_fs::symlink(target, link).await
}

#[cfg(windows)]
async fn create_link(target: &str, link: &Path) -> io::Result<()> {
    tokio_fs::symlink_dir(target, link).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn root_with_worlds(ids: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for id in ids {
            tokio_fs::create_dir(dir.path().join(id)).await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_missing_pointer() {
        let dir = root_with_worlds(&["main"]).await;
        let pointer = ActiveWorldPointer::new(dir.path());

        assert!(matches!(
            pointer.get_active().await,
            Err(WorldError::PointerMissing(_))
        ));
        assert!(pointer.try_active().await.is_none());
    }

    #[tokio::test]
    async fn test_set_active_is_idempotent() {
        let dir = root_with_worlds(&["main", "lobby"]).await;
        let pointer = ActiveWorldPointer::new(dir.path());

        pointer.set_active("lobby").await.unwrap();
        pointer.set_active("lobby").await.unwrap();
        assert_eq!(pointer.get_active().await.unwrap(), "lobby");

        pointer.set_active("main").await.unwrap();
        assert_eq!(pointer.get_active().await.unwrap(), "main");

        let raw = tokio_fs::read_link(pointer.link_path()).await.unwrap();
        assert_eq!(raw, PathBuf::from("main"));
        assert!(!dir.path().join(STAGING_NAME).exists());
    }

    #[tokio::test]
    async fn test_dangling_pointer_detected() {
        let dir = root_with_worlds(&["main"]).await;
        let pointer = ActiveWorldPointer::new(dir.path());

        tokio_fs::symlink("ghost", pointer.link_path()).await.unwrap();

        match pointer.get_active().await {
            Err(WorldError::PointerDangling { target, .. }) => assert_eq!(target, "ghost"),
            other => panic!("expected dangling pointer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_absolute_target_resolves_by_basename() {
        let dir = root_with_worlds(&["main"]).await;
        let pointer = ActiveWorldPointer::new(dir.path());

        tokio_fs::symlink(dir.path().join("main"), pointer.link_path())
            .await
            .unwrap();
        assert_eq!(pointer.get_active().await.unwrap(), "main");
    }

    #[tokio::test]
    async fn test_real_directory_is_not_a_pointer() {
        let dir = root_with_worlds(&["main", POINTER_NAME]).await;
        let pointer = ActiveWorldPointer::new(dir.path());

        assert!(matches!(
            pointer.get_active().await,
            Err(WorldError::PointerInvalid(_))
        ));
        assert!(matches!(
            pointer.set_active("main").await,
            Err(WorldError::PointerUpdateFailed { .. })
        ));
        assert!(dir.path().join(POINTER_NAME).is_dir());
    }
}
