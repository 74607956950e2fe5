//! Moves server settings out of `metadata.json`
//!
//! Older releases stored a `settings` object in each world's metadata and
//! never wrote it to `server.properties`, so the server ignored it. This pass
//! copies those entries into the properties file (through the registry's key
//! routing table) and drops them from the metadata.

use crate::error::WorldResult;
use crate::metadata;
use crate::properties;
use crate::registry::{property_key, property_value, WorldRegistry, METADATA_FILE, PROPERTIES_FILE};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Outcome of [`WorldRegistry::migrate_legacy_settings`].
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    /// Worlds whose settings were moved.
    pub migrated: Vec<String>,
    /// Worlds with nothing to move (or no metadata at all).
    pub skipped: Vec<String>,
    pub failed: Vec<MigrationFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationFailure {
    pub world_id: String,
    pub error: String,
}

impl WorldRegistry {
    /// Migrates every world. One world failing does not stop the others.
    #[instrument(skip(self))]
    pub async fn migrate_legacy_settings(&self) -> WorldResult<MigrationReport> {
        let mut report = MigrationReport::default();

        for world_id in self.world_ids().await? {
            match self.migrate_world(&world_id).await {
                Ok(true) => report.migrated.push(world_id),
                Ok(false) => report.skipped.push(world_id),
                Err(e) => {
                    warn!("Settings migration failed for world '{}': {}", world_id, e);
                    report.failed.push(MigrationFailure {
                        world_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Settings migration: {} migrated, {} skipped, {} failed",
            report.migrated.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Returns whether anything was moved.
    async fn migrate_world(&self, world_id: &str) -> WorldResult<bool> {
        let _guard = self.locks().world(world_id).await;
        let world_path = self.world_path(world_id);
        let metadata_path = world_path.join(METADATA_FILE);
        let properties_path = world_path.join(PROPERTIES_FILE);

        let Some(mut meta) = self.read_metadata(world_id).await? else {
            return Ok(false);
        };
        if meta.settings.is_empty() {
            return Ok(false);
        }

        let mut props = properties::read_optional(&properties_path)
            .await?
            .unwrap_or_default();

        for (key, value) in &meta.settings {
            match property_key(key) {
                Some(prop) => {
                    props.insert(prop.to_string(), property_value(value));
                }
                None => warn!(
                    "World '{}': dropping legacy setting '{}', it is a metadata field",
                    world_id, key
                ),
            }
        }
        properties::pin_level_name(&mut props);
        properties::write(&properties_path, &props).await?;

        meta.settings.clear();
        meta.updated_at = self.clock().now();
        metadata::write(&metadata_path, &meta).await?;

        info!("Moved legacy settings of world '{}' into {}", world_id, PROPERTIES_FILE);
        Ok(true)
    }
}
