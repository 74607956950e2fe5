//! World registry: enumerate, inspect, create, update and remove worlds
//!
//! Each world lives in `<worlds root>/<id>/` with this layout:
//!
//! ```text
//! <id>/
//! ├── metadata.json
//! ├── server.properties
//! ├── world/
//! ├── world_nether/
//! └── world_the_end/
//! ```
//!
//! The registry never looks at whether the server is running or which world
//! is active before mutating; those guards live in
//! [`SwitchCoordinator`](crate::SwitchCoordinator).

use crate::clock::{Clock, SystemClock};
use crate::error::{WorldError, WorldResult};
use crate::fs_util;
use crate::lock::WorldLocks;
use crate::metadata::{self, MetadataPatch, WorldMetadata, WorldType};
use crate::pointer::{ActiveWorldPointer, POINTER_NAME};
use crate::properties::{self, Properties};
use crate::size::{bytes_to_mb, DirectorySizer, WalkDirSizer};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as tokio_fs;
use tracing::{debug, error, info, instrument, warn};

pub const METADATA_FILE: &str = "metadata.json";
pub const PROPERTIES_FILE: &str = "server.properties";

/// Overworld, nether and end folders. Fixed names, matching `level-name=world`.
pub const DIMENSION_DIRS: [&str; 3] = ["world", "world_nether", "world_the_end"];

static WORLD_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("world id pattern is valid"));

/// Properties for a new world when there is no readable active world to copy.
pub const DEFAULT_PROPERTIES: &[(&str, &str)] = &[
    ("level-name", "world"),
    ("gamemode", "survival"),
    ("difficulty", "easy"),
    ("pvp", "true"),
    ("max-players", "20"),
    ("allow-nether", "true"),
    ("allow-flight", "false"),
    ("spawn-protection", "16"),
    ("view-distance", "10"),
    ("motd", "A Minecraft Server"),
    ("online-mode", "true"),
    ("enable-command-block", "false"),
    ("spawn-monsters", "true"),
    ("spawn-animals", "true"),
    ("spawn-npcs", "true"),
];

/// Settings keys that describe the world rather than configure the server.
/// They belong in `metadata.json` and are never written to `server.properties`.
pub const METADATA_KEYS: &[&str] = &[
    "id",
    "name",
    "description",
    "type",
    "icon",
    "custom_tags",
    "created_at",
    "updated_at",
    "last_played",
    "size_mb",
];

/// Alternate spellings accepted for server settings, mapped to their
/// `server.properties` key. Anything not listed here passes through as-is.
pub const PROPERTY_ALIASES: &[(&str, &str)] = &[
    ("maxPlayers", "max-players"),
    ("allowFlight", "allow-flight"),
    ("allowNether", "allow-nether"),
    ("seed", "level-seed"),
    ("spawnProtection", "spawn-protection"),
    ("viewDistance", "view-distance"),
    ("onlineMode", "online-mode"),
];

/// Checks a world id against `^[A-Za-z0-9_-]+$`. The pointer name is reserved.
pub fn validate_world_id(world_id: &str) -> WorldResult<()> {
    if world_id == POINTER_NAME || !WORLD_ID_PATTERN.is_match(world_id) {
        return Err(WorldError::InvalidName(world_id.to_string()));
    }
    Ok(())
}

/// The `server.properties` key a settings key routes to, or `None` for
/// descriptive metadata keys.
pub fn property_key(key: &str) -> Option<&str> {
    if METADATA_KEYS.contains(&key) {
        return None;
    }
    PROPERTY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
        .or(Some(key))
}

/// Renders a JSON settings value the way `server.properties` spells it.
pub fn property_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn default_properties() -> Properties {
    DEFAULT_PROPERTIES
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Metadata as loaded for display, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedMetadata {
    /// Read from the world's `metadata.json`.
    Found(WorldMetadata),
    /// Made up because `metadata.json` is missing or unreadable. The world
    /// needs attention; see [`WorldRegistry::repair_metadata`].
    Synthesized(WorldMetadata),
}

impl LoadedMetadata {
    pub fn source(&self) -> MetadataSource {
        match self {
            LoadedMetadata::Found(_) => MetadataSource::Found,
            LoadedMetadata::Synthesized(_) => MetadataSource::Synthesized,
        }
    }

    pub fn into_inner(self) -> WorldMetadata {
        match self {
            LoadedMetadata::Found(m) | LoadedMetadata::Synthesized(m) => m,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    Found,
    Synthesized,
}

/// A world as presented to callers: metadata plus freshly computed size and
/// whether it is the active one. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldRecord {
    #[serde(flatten)]
    pub metadata: WorldMetadata,
    pub active: bool,
    pub metadata_source: MetadataSource,
}

impl WorldRecord {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// Input for [`WorldRegistry::create`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateWorldSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub world_type: Option<WorldType>,
    #[serde(default)]
    pub custom_tags: Vec<String>,
    /// Server settings overlaid on the seeded `server.properties`.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl CreateWorldSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, world_type: WorldType) -> Self {
        self.world_type = Some(world_type);
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Settings routed to their `server.properties` keys.
    fn property_overlay(&self) -> Properties {
        let mut overlay = Properties::new();
        for (key, value) in &self.settings {
            match property_key(key) {
                Some(prop) => {
                    overlay.insert(prop.to_string(), value.clone());
                }
                None => warn!(
                    "Ignoring setting '{}' for world '{}': it is a metadata field",
                    key, self.id
                ),
            }
        }
        overlay
    }
}

/// Enumerates and manages world directories under a worlds root.
#[derive(Debug)]
pub struct WorldRegistry {
    worlds_root: PathBuf,
    pointer: ActiveWorldPointer,
    sizer: Arc<dyn DirectorySizer>,
    clock: Arc<dyn Clock>,
    locks: Arc<WorldLocks>,
}

impl WorldRegistry {
    /// Creates a registry over `worlds_root` measuring sizes with
    /// [`WalkDirSizer`] and stamping times with [`SystemClock`].
    pub fn new(worlds_root: impl AsRef<Path>) -> Self {
        let worlds_root = worlds_root.as_ref().to_path_buf();
        Self {
            pointer: ActiveWorldPointer::new(&worlds_root),
            worlds_root,
            sizer: Arc::new(WalkDirSizer),
            clock: Arc::new(SystemClock),
            locks: Arc::new(WorldLocks::new()),
        }
    }

    pub fn with_sizer(mut self, sizer: Arc<dyn DirectorySizer>) -> Self {
        self.sizer = sizer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn worlds_root(&self) -> &Path {
        &self.worlds_root
    }

    pub fn pointer(&self) -> &ActiveWorldPointer {
        &self.pointer
    }

    pub fn locks(&self) -> &WorldLocks {
        &self.locks
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn world_path(&self, world_id: &str) -> PathBuf {
        self.worlds_root.join(world_id)
    }

    fn metadata_path(&self, world_id: &str) -> PathBuf {
        self.world_path(world_id).join(METADATA_FILE)
    }

    fn properties_path(&self, world_id: &str) -> PathBuf {
        self.world_path(world_id).join(PROPERTIES_FILE)
    }

    /// `true` if `world_id` names an existing world directory.
    pub async fn exists(&self, world_id: &str) -> bool {
        validate_world_id(world_id).is_ok() && fs_util::is_real_dir(&self.world_path(world_id)).await
    }

    /// Names of all world directories, sorted. The pointer, the pointer's
    /// staging link and plain files are skipped.
    pub(crate) async fn world_ids(&self) -> WorldResult<Vec<String>> {
        let mut entries = match tokio_fs::read_dir(&self.worlds_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorldError::io(&self.worlds_root, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WorldError::io(&self.worlds_root, e))?
        {
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !file_type.is_dir() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) if name != POINTER_NAME => ids.push(name),
                Ok(_) => {}
                Err(name) => warn!("Skipping world directory with non UTF-8 name {:?}", name),
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Reads a world's `metadata.json`, with the id forced to the directory
    /// name and an empty name filled in from it.
    pub(crate) async fn read_metadata(&self, world_id: &str) -> WorldResult<Option<WorldMetadata>> {
        let mut found = metadata::read(&self.metadata_path(world_id)).await?;
        if let Some(metadata) = &mut found {
            metadata.bind_to_directory(world_id);
        }
        Ok(found)
    }

    /// Loads metadata for display, synthesizing defaults when it is missing
    /// or unreadable.
    async fn load_metadata(&self, world_id: &str) -> LoadedMetadata {
        match self.read_metadata(world_id).await {
            Ok(Some(found)) => LoadedMetadata::Found(found),
            Ok(None) => {
                debug!("World '{}' has no metadata, using defaults", world_id);
                LoadedMetadata::Synthesized(WorldMetadata::synthesized(world_id, &self.clock.now()))
            }
            Err(e) => {
                warn!("Unreadable metadata for world '{}', using defaults: {}", world_id, e);
                LoadedMetadata::Synthesized(WorldMetadata::synthesized(world_id, &self.clock.now()))
            }
        }
    }

    async fn size_mb(&self, world_id: &str) -> u64 {
        match self.sizer.size_bytes(&self.world_path(world_id)).await {
            Ok(bytes) => bytes_to_mb(bytes),
            Err(e) => {
                debug!("Could not size world '{}': {}", world_id, e);
                0
            }
        }
    }

    async fn enrich(&self, loaded: LoadedMetadata, active: Option<&str>) -> WorldRecord {
        let metadata_source = loaded.source();
        let mut metadata = loaded.into_inner();
        metadata.size_mb = self.size_mb(&metadata.id).await;

        WorldRecord {
            active: active == Some(metadata.id.as_str()),
            metadata,
            metadata_source,
        }
    }

    /// All worlds, sorted by id.
    ///
    /// A broken world never fails the listing: unreadable metadata is replaced
    /// with defaults, an unmeasurable size reads as 0, and an unresolvable
    /// active pointer means no world is flagged active.
    pub async fn list(&self) -> WorldResult<Vec<WorldRecord>> {
        let active = self.pointer.try_active().await;

        let mut records = Vec::new();
        for world_id in self.world_ids().await? {
            let loaded = self.load_metadata(&world_id).await;
            records.push(self.enrich(loaded, active.as_deref()).await);
        }

        Ok(records)
    }

    /// A single world. Fails with [`WorldError::WorldNotFound`] when it has no
    /// metadata.
    pub async fn get(&self, world_id: &str) -> WorldResult<WorldRecord> {
        validate_world_id(world_id)?;

        let Some(found) = self.read_metadata(world_id).await? else {
            return Err(WorldError::WorldNotFound(world_id.to_string()));
        };

        let active = self.pointer.try_active().await;
        Ok(self
            .enrich(LoadedMetadata::Found(found), active.as_deref())
            .await)
    }

    /// The world the pointer resolves to, or `None` if it does not resolve.
    pub async fn active_world(&self) -> WorldResult<Option<WorldRecord>> {
        let Some(active) = self.pointer.try_active().await else {
            return Ok(None);
        };

        let loaded = self.load_metadata(&active).await;
        Ok(Some(self.enrich(loaded, Some(active.as_str())).await))
    }

    /// Creates a world directory with its dimension folders, metadata and
    /// properties.
    ///
    /// Properties start from the active world's `server.properties` (comments
    /// included) when it can be read, otherwise from [`DEFAULT_PROPERTIES`].
    /// `spec.settings` is overlaid on top, then `level-name` is forced to
    /// `world`. If any step after the directory was made fails, the directory
    /// is removed again.
    #[instrument(skip(self, spec), fields(world_id = %spec.id))]
    pub async fn create(&self, spec: CreateWorldSpec) -> WorldResult<WorldMetadata> {
        validate_world_id(&spec.id)?;
        let overlay = spec.property_overlay();
        properties::validate(&overlay)?;

        let _guard = self.locks.world(&spec.id).await;
        let world_path = self.world_path(&spec.id);

        match tokio_fs::symlink_metadata(&world_path).await {
            Ok(_) => return Err(WorldError::AlreadyExists(spec.id)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(WorldError::io(world_path, e)),
        }

        tokio_fs::create_dir_all(&self.worlds_root)
            .await
            .map_err(|e| WorldError::io(&self.worlds_root, e))?;

        match tokio_fs::create_dir(&world_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(WorldError::AlreadyExists(spec.id))
            }
            Err(e) => return Err(WorldError::io(world_path, e)),
        }

        let result = self.populate(&world_path, spec, overlay).await;

        if let Err(e) = &result {
            warn!("Creating world at {} failed, removing it: {}", world_path.display(), e);
            if let Err(cleanup) = tokio_fs::remove_dir_all(&world_path).await {
                error!(
                    "Could not remove partially created world {}: {}",
                    world_path.display(),
                    cleanup
                );
            }
        }

        result
    }

    async fn populate(
        &self,
        world_path: &Path,
        spec: CreateWorldSpec,
        overlay: Properties,
    ) -> WorldResult<WorldMetadata> {
        for dimension in DIMENSION_DIRS {
            let dir = world_path.join(dimension);
            tokio_fs::create_dir(&dir)
                .await
                .map_err(|e| WorldError::io(dir, e))?;
        }

        let world_type = spec.world_type.unwrap_or_default();
        let now = self.clock.now();
        let metadata = WorldMetadata {
            name: spec.name.unwrap_or_else(|| spec.id.clone()),
            id: spec.id,
            description: spec.description.unwrap_or_default(),
            world_type,
            icon: world_type.icon().to_string(),
            created_at: now.clone(),
            updated_at: now,
            last_played: None,
            size_mb: 0,
            custom_tags: spec.custom_tags,
            settings: BTreeMap::new(),
        };
        metadata::write(&world_path.join(METADATA_FILE), &metadata).await?;

        let props_path = world_path.join(PROPERTIES_FILE);
        let (template, mut props) = self.seed_properties().await;
        if let Some(template) = template {
            fs_util::write_atomic(&props_path, template.as_bytes()).await?;
        }
        props.extend(overlay);
        properties::pin_level_name(&mut props);
        properties::write(&props_path, &props).await?;

        info!("Created world '{}' ({})", metadata.id, metadata.world_type);
        Ok(metadata)
    }

    /// Raw text and parsed entries of the active world's properties, or the
    /// built-in defaults.
    async fn seed_properties(&self) -> (Option<String>, Properties) {
        if let Some(active) = self.pointer.try_active().await {
            let path = self.properties_path(&active);
            match fs_util::read_optional(&path).await {
                Ok(Some(text)) => {
                    debug!("Seeding properties from active world '{}'", active);
                    let parsed = properties::parse(&text);
                    return (Some(text), parsed);
                }
                Ok(None) => debug!("Active world '{}' has no properties file", active),
                Err(e) => debug!("Cannot read properties of active world '{}': {}", active, e),
            }
        }
        (None, default_properties())
    }

    /// Removes a world directory recursively. Missing worlds are not an error.
    ///
    /// This is the unguarded primitive: it does not check the server state or
    /// whether the world is active. Use
    /// [`SwitchCoordinator::delete_world`](crate::SwitchCoordinator::delete_world)
    /// for the guarded operation.
    #[instrument(skip(self))]
    pub async fn delete(&self, world_id: &str) -> WorldResult<()> {
        validate_world_id(world_id)?;
        let _guard = self.locks.world(world_id).await;
        let world_path = self.world_path(world_id);

        match tokio_fs::remove_dir_all(&world_path).await {
            Ok(()) => {
                info!("Deleted world '{}'", world_id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("World '{}' was already gone", world_id);
                Ok(())
            }
            Err(e) => Err(WorldError::io(world_path, e)),
        }
    }

    async fn modify_metadata(
        &self,
        world_id: &str,
        change: impl FnOnce(&mut WorldMetadata, &str),
    ) -> WorldResult<WorldMetadata> {
        validate_world_id(world_id)?;
        let _guard = self.locks.world(world_id).await;
        let path = self.metadata_path(world_id);

        let Some(mut metadata) = self.read_metadata(world_id).await? else {
            return Err(WorldError::WorldNotFound(world_id.to_string()));
        };

        let now = self.clock.now();
        change(&mut metadata, &now);
        metadata.bind_to_directory(world_id);
        metadata.updated_at = now;

        metadata::write(&path, &metadata).await?;
        Ok(metadata)
    }

    /// Shallow-merges `patch` into the world's metadata and refreshes
    /// `updated_at`. The id is never touched.
    #[instrument(skip(self, patch))]
    pub async fn update_metadata(
        &self,
        world_id: &str,
        patch: MetadataPatch,
    ) -> WorldResult<WorldMetadata> {
        let metadata = self
            .modify_metadata(world_id, |metadata, _| patch.apply_to(metadata))
            .await?;
        info!("Updated metadata of world '{}'", world_id);
        Ok(metadata)
    }

    /// Sets `last_played` to now. Only the switch coordinator calls this.
    pub(crate) async fn stamp_last_played(&self, world_id: &str) -> WorldResult<WorldMetadata> {
        self.modify_metadata(world_id, |metadata, now| {
            metadata.last_played = Some(now.to_string());
        })
        .await
    }

    /// The world's `server.properties`.
    pub async fn get_properties(&self, world_id: &str) -> WorldResult<Properties> {
        validate_world_id(world_id)?;
        if !fs_util::is_real_dir(&self.world_path(world_id)).await {
            return Err(WorldError::WorldNotFound(world_id.to_string()));
        }
        properties::read(&self.properties_path(world_id)).await
    }

    /// Merges `patch` into the world's properties, forces `level-name=world`,
    /// writes the result and returns it.
    ///
    /// A world without a properties file yet starts from an empty mapping.
    #[instrument(skip(self, patch))]
    pub async fn update_properties(
        &self,
        world_id: &str,
        patch: Properties,
    ) -> WorldResult<Properties> {
        validate_world_id(world_id)?;
        let _guard = self.locks.world(world_id).await;
        if !fs_util::is_real_dir(&self.world_path(world_id)).await {
            return Err(WorldError::WorldNotFound(world_id.to_string()));
        }

        let path = self.properties_path(world_id);
        let mut merged = properties::read_optional(&path).await?.unwrap_or_default();
        merged.extend(patch);
        properties::pin_level_name(&mut merged);

        properties::write(&path, &merged).await?;
        info!("Updated properties of world '{}'", world_id);
        Ok(merged)
    }

    /// Writes default metadata for a world directory that has none.
    ///
    /// Existing metadata is returned unchanged. A corrupt file is reported,
    /// never overwritten.
    #[instrument(skip(self))]
    pub async fn repair_metadata(&self, world_id: &str) -> WorldResult<WorldMetadata> {
        validate_world_id(world_id)?;
        let _guard = self.locks.world(world_id).await;
        if !fs_util::is_real_dir(&self.world_path(world_id)).await {
            return Err(WorldError::WorldNotFound(world_id.to_string()));
        }

        let path = self.metadata_path(world_id);
        if let Some(existing) = self.read_metadata(world_id).await? {
            return Ok(existing);
        }

        let metadata = WorldMetadata::synthesized(world_id, &self.clock.now());
        metadata::write(&path, &metadata).await?;
        info!("Wrote default metadata for world '{}'", world_id);
        Ok(metadata)
    }
}
