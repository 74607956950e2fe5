//! Error types for world lifecycle operations

use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// Errors raised by the stores, the active-world pointer, the registry and the
/// switch coordinator.
///
/// Every variant can tell whether the failure happened before anything on disk
/// was touched (see [`WorldError::leaves_state_untouched`]). An operator acting
/// on a live server needs that distinction more than anything else: a broken
/// `active` pointer keeps the server from starting.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("Invalid world name '{0}': only letters, digits, '-' and '_' are allowed")]
    InvalidName(String),

    #[error("World '{0}' already exists")]
    AlreadyExists(String),

    #[error("World '{0}' not found")]
    WorldNotFound(String),

    #[error("Active world pointer {0} does not exist")]
    PointerMissing(PathBuf),

    #[error("Active world pointer {link} points at missing world '{target}'")]
    PointerDangling { link: PathBuf, target: String },

    #[error("Active world pointer {0} is not a symbolic link")]
    PointerInvalid(PathBuf),

    #[error("The server must be stopped first")]
    ServerMustBeStopped,

    #[error("World '{0}' is already the active world")]
    AlreadyActive(String),

    #[error("World '{0}' is the active world; switch to another world first")]
    WorldIsActive(String),

    /// The pointer swap failed part-way. The previous pointer may or may not
    /// still be in place; inspect `worlds/active` before starting the server.
    #[error("Failed to repoint active world to '{target}' (state may need inspection): {source}")]
    PointerUpdateFailed {
        target: String,
        #[source]
        source: IoError,
    },

    #[error("Properties file {0} does not exist")]
    PropertiesMissing(PathBuf),

    #[error("Invalid property '{key}': {reason}")]
    InvalidProperty { key: String, reason: &'static str },

    #[error("Failed to parse metadata {0}: {1}")]
    CorruptMetadata(PathBuf, #[source] serde_json::Error),

    #[error("Failed to serialize metadata for world '{0}': {1}")]
    Serialization(String, #[source] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
}

impl WorldError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: IoError) -> Self {
        WorldError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` when the failure was detected before any mutation, so
    /// nothing on disk changed.
    ///
    /// Raw I/O failures are reported as `false`: they can surface half-way
    /// through a write and the caller cannot assume the tree is intact.
    pub fn leaves_state_untouched(&self) -> bool {
        !matches!(
            self,
            WorldError::PointerUpdateFailed { .. } | WorldError::Io { .. }
        )
    }

    /// Stable, machine-readable name of the error condition.
    pub fn kind(&self) -> &'static str {
        match self {
            WorldError::InvalidName(_) => "invalid_name",
            WorldError::AlreadyExists(_) => "already_exists",
            WorldError::WorldNotFound(_) => "world_not_found",
            WorldError::PointerMissing(_) => "pointer_missing",
            WorldError::PointerDangling { .. } => "pointer_dangling",
            WorldError::PointerInvalid(_) => "pointer_invalid",
            WorldError::ServerMustBeStopped => "server_must_be_stopped",
            WorldError::AlreadyActive(_) => "already_active",
            WorldError::WorldIsActive(_) => "world_is_active",
            WorldError::PointerUpdateFailed { .. } => "pointer_update_failed",
            WorldError::PropertiesMissing(_) => "properties_missing",
            WorldError::InvalidProperty { .. } => "invalid_property",
            WorldError::CorruptMetadata(..) => "corrupt_metadata",
            WorldError::Serialization(..) => "serialization",
            WorldError::Io { .. } => "io_failure",
        }
    }
}

pub type WorldResult<T> = Result<T, WorldError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_validation_errors_leave_state_untouched() {
        assert!(WorldError::InvalidName("a b".into()).leaves_state_untouched());
        assert!(WorldError::AlreadyExists("w".into()).leaves_state_untouched());
        assert!(WorldError::ServerMustBeStopped.leaves_state_untouched());
        assert!(WorldError::WorldIsActive("main".into()).leaves_state_untouched());
    }

    #[test]
    fn test_mid_operation_errors_flag_possible_inconsistency() {
        let err = WorldError::PointerUpdateFailed {
            target: "w1".into(),
            source: IoError::new(ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.leaves_state_untouched());
        assert!(err.to_string().contains("state may need inspection"));

        let err = WorldError::io("/tmp/x", IoError::new(ErrorKind::Other, "boom"));
        assert!(!err.leaves_state_untouched());
        assert_eq!(err.kind(), "io_failure");
    }
}
