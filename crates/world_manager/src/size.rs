//! Directory size measurement
//!
//! Sizes only feed the `size_mb` field of world records, so every caller
//! treats a failure here as "0 MB" rather than an error.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use walkdir::WalkDir;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Measures the on-disk size of a directory tree.
#[async_trait]
pub trait DirectorySizer: Send + Sync + std::fmt::Debug {
    async fn size_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// Sums file sizes with an in-process walk. Symbolic links are not followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkDirSizer;

#[async_trait]
impl DirectorySizer for WalkDirSizer {
    async fn size_bytes(&self, path: &Path) -> io::Result<u64> {
        let root: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut total = 0u64;
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_file() {
                    total += entry.metadata().map_err(io::Error::from)?.len();
                }
            }
            Ok::<u64, io::Error>(total)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

/// Asks `du -sb` for the apparent size.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuSizer;

#[async_trait]
impl DirectorySizer for DuSizer {
    async fn size_bytes(&self, path: &Path) -> io::Result<u64> {
        let output = Command::new("du").arg("-sb").arg(path).output().await?;

        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "du exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unexpected du output"))
    }
}

/// Converts bytes to whole megabytes, rounding to nearest.
pub fn bytes_to_mb(bytes: u64) -> u64 {
    (bytes + BYTES_PER_MB / 2) / BYTES_PER_MB
}
