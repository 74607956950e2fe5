//! Per-world `metadata.json` documents

use crate::error::{WorldError, WorldResult};
use crate::fs_util;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Icon used when a world has no recognised type.
pub const DEFAULT_ICON: &str = "🌍";

/// Kind of world, as chosen at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldType {
    #[default]
    Survival,
    Creative,
    Rpg,
    Minigames,
    Adventure,
    /// Also absorbs any type string this version does not know about.
    #[serde(other)]
    Custom,
}

impl WorldType {
    pub const ALL: [WorldType; 6] = [
        WorldType::Survival,
        WorldType::Creative,
        WorldType::Rpg,
        WorldType::Minigames,
        WorldType::Adventure,
        WorldType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorldType::Survival => "survival",
            WorldType::Creative => "creative",
            WorldType::Rpg => "rpg",
            WorldType::Minigames => "minigames",
            WorldType::Adventure => "adventure",
            WorldType::Custom => "custom",
        }
    }

    /// Display glyph assigned to new worlds of this type.
    pub fn icon(&self) -> &'static str {
        match self {
            WorldType::Survival => "🌍",
            WorldType::Creative => "🎨",
            WorldType::Rpg => "⚔️",
            WorldType::Minigames => "🎮",
            WorldType::Adventure => "🗺️",
            WorldType::Custom => "🔧",
        }
    }
}

impl fmt::Display for WorldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorldType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Unknown world type '{s}'. Must be one of: survival, creative, rpg, minigames, adventure, custom"
                )
            })
    }
}

/// Descriptive attributes of a world, stored as `metadata.json` in its
/// directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMetadata {
    /// Matches the directory name. Never changes after creation.
    #[serde(default)]
    pub id: String,
    /// Display name; empty in a hand-written file means "use the id".
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub world_type: WorldType,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    /// Set only when the world is switched to.
    #[serde(default)]
    pub last_played: Option<String>,
    /// Recomputed on every read; the stored value is informational only.
    #[serde(default)]
    pub size_mb: u64,
    #[serde(default)]
    pub custom_tags: Vec<String>,
    /// Server settings kept in metadata by older releases. Migrated into
    /// `server.properties` by [`crate::WorldRegistry::migrate_legacy_settings`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, serde_json::Value>,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

impl WorldMetadata {
    /// Makes a document read from `<world_id>/metadata.json` agree with its
    /// directory: the id is the directory name and a missing name falls back
    /// to it.
    pub fn bind_to_directory(&mut self, world_id: &str) {
        if self.id != world_id {
            if !self.id.is_empty() {
                warn!("metadata.json of '{}' claims id '{}'", world_id, self.id);
            }
            self.id = world_id.to_string();
        }
        if self.name.is_empty() {
            self.name = world_id.to_string();
        }
    }

    /// Metadata for a world directory that has none.
    pub fn synthesized(id: &str, now: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            world_type: WorldType::Survival,
            icon: DEFAULT_ICON.to_string(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
            last_played: None,
            size_mb: 0,
            custom_tags: Vec::new(),
            settings: BTreeMap::new(),
        }
    }
}

/// Partial update of the mutable metadata fields.
///
/// `id` and `last_played` are deliberately absent; unknown fields are refused
/// when a patch is deserialized, so `{"id": "other"}` is an error rather than
/// a silent no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub world_type: Option<WorldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_tags: Option<Vec<String>>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self == &MetadataPatch::default()
    }

    /// Shallow-merges the patch into `metadata`.
    pub fn apply_to(self, metadata: &mut WorldMetadata) {
        if let Some(name) = self.name {
            metadata.name = name;
        }
        if let Some(description) = self.description {
            metadata.description = description;
        }
        if let Some(world_type) = self.world_type {
            metadata.world_type = world_type;
        }
        if let Some(icon) = self.icon {
            metadata.icon = icon;
        }
        if let Some(tags) = self.custom_tags {
            metadata.custom_tags = tags;
        }
    }
}

/// Reads `metadata.json`. `Ok(None)` means the file does not exist; a file
/// that exists but does not parse is an error.
pub async fn read(path: &Path) -> WorldResult<Option<WorldMetadata>> {
    let Some(contents) = fs_util::read_optional(path).await? else {
        return Ok(None);
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| WorldError::CorruptMetadata(path.to_path_buf(), e))
}

/// Writes the whole document, pretty-printed, replacing the file atomically.
pub async fn write(path: &Path, metadata: &WorldMetadata) -> WorldResult<()> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| WorldError::Serialization(metadata.id.clone(), e))?;

    fs_util::write_atomic(path, json.as_bytes()).await?;

    debug!("Wrote metadata for world '{}'", metadata.id);
    Ok(())
}
