//! Active-world switching and guarded deletion
//!
//! A switch runs these steps, stopping at the first failure:
//!
//! 1. the server must be stopped ([`WorldError::ServerMustBeStopped`]),
//!    whatever the target
//! 2. the target must be a valid id ([`WorldError::InvalidName`]), exist ([`WorldError::WorldNotFound`]) and not already be
//!    active ([`WorldError::AlreadyActive`])
//! 3. the pointer is repointed ([`WorldError::PointerUpdateFailed`])
//! 4. the target's `last_played` is stamped
//!
//! Failures in steps 1-2 leave everything untouched. Step 4 is best-effort:
//! once the pointer has moved the switch has succeeded, and a failed stamp is
//! only logged and reflected in [`SwitchOutcome::last_played`].

use crate::error::{WorldError, WorldResult};
use crate::registry::{validate_world_id, WorldRegistry};
use crate::server_state::ServerStateProvider;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Result of a successful switch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchOutcome {
    pub active_world_id: String,
    /// The world that was active before, if the pointer resolved.
    pub previous_world_id: Option<String>,
    /// The new `last_played` stamp, or `None` if stamping failed.
    pub last_played: Option<String>,
}

/// Orchestrates operations that depend on server state and on which world is
/// active.
#[derive(Debug, Clone)]
pub struct SwitchCoordinator {
    registry: Arc<WorldRegistry>,
    server_state: Arc<dyn ServerStateProvider>,
}

impl SwitchCoordinator {
    pub fn new(registry: Arc<WorldRegistry>, server_state: Arc<dyn ServerStateProvider>) -> Self {
        Self {
            registry,
            server_state,
        }
    }

    pub fn registry(&self) -> &WorldRegistry {
        &self.registry
    }

    async fn ensure_stopped(&self) -> WorldResult<()> {
        if self.server_state.is_running().await {
            return Err(WorldError::ServerMustBeStopped);
        }
        Ok(())
    }

    async fn ensure_exists(&self, world_id: &str) -> WorldResult<()> {
        if !self.registry.exists(world_id).await {
            return Err(WorldError::WorldNotFound(world_id.to_string()));
        }
        Ok(())
    }

    /// Makes `target` the active world.
    #[instrument(skip(self))]
    pub async fn switch(&self, target: &str) -> WorldResult<SwitchOutcome> {
        let _pointer_guard = self.registry.locks().pointer().await;

        self.ensure_stopped().await?;
        validate_world_id(target)?;
        self.ensure_exists(target).await?;

        let previous = self.registry.pointer().try_active().await;
        if previous.as_deref() == Some(target) {
            return Err(WorldError::AlreadyActive(target.to_string()));
        }

        if let Err(e) = self.registry.pointer().set_active(target).await {
            error!("Switch to '{}' failed while repointing: {}", target, e);
            return Err(e);
        }

        let last_played = match self.registry.stamp_last_played(target).await {
            Ok(metadata) => metadata.last_played,
            Err(e) => {
                warn!(
                    "Switched to '{}' but could not record last_played: {}",
                    target, e
                );
                None
            }
        };

        info!(
            "Switched active world: {} -> {}",
            previous.as_deref().unwrap_or("<none>"),
            target
        );

        Ok(SwitchOutcome {
            active_world_id: target.to_string(),
            previous_world_id: previous,
            last_played,
        })
    }

    /// Deletes a world, refusing while the server runs or if it is the
    /// active world.
    #[instrument(skip(self))]
    pub async fn delete_world(&self, world_id: &str) -> WorldResult<()> {
        let _pointer_guard = self.registry.locks().pointer().await;

        self.ensure_stopped().await?;
        validate_world_id(world_id)?;
        self.ensure_exists(world_id).await?;

        if self.registry.pointer().try_active().await.as_deref() == Some(world_id) {
            return Err(WorldError::WorldIsActive(world_id.to_string()));
        }

        self.registry.delete(world_id).await
    }
}
