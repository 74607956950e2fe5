//! Subcommand execution and JSON reporting

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use world_manager::{
    CreateWorldSpec, DirectorySizer, DuSizer, MetadataPatch, MigrationReport, PidFileServerState,
    Properties, SwitchCoordinator, SwitchOutcome, WalkDirSizer, WorldError, WorldMetadata,
    WorldRecord, WorldRegistry, WorldResult,
};

use crate::cli::Command;
use crate::config::{AppConfig, SizeMethod};

/// Exit status when the command failed before changing anything.
pub const EXIT_UNTOUCHED: u8 = 1;
/// Exit status when on-disk state may need inspection.
pub const EXIT_INSPECT: u8 = 2;

/// Everything a subcommand can print on success.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Worlds(Vec<WorldRecord>),
    World(WorldRecord),
    Active(Option<WorldRecord>),
    Metadata(WorldMetadata),
    Switched(SwitchOutcome),
    Deleted { deleted: String },
    Properties(Properties),
    Migration(MigrationReport),
}

/// Machine-readable failure written to stderr.
#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    pub state_untouched: bool,
}

impl ErrorReport {
    pub fn exit_code(&self) -> u8 {
        if self.state_untouched {
            EXIT_UNTOUCHED
        } else {
            EXIT_INSPECT
        }
    }

    /// Failure outside the world core (configuration, output encoding).
    pub fn other(kind: &str, message: impl ToString) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
            state_untouched: true,
        }
    }
}

impl From<&WorldError> for ErrorReport {
    fn from(err: &WorldError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            state_untouched: err.leaves_state_untouched(),
        }
    }
}

/// The wired-up registry and coordinator for one invocation.
pub struct App {
    coordinator: SwitchCoordinator,
}

impl App {
    pub fn from_config(config: &AppConfig) -> Self {
        let sizer: Arc<dyn DirectorySizer> = match config.worlds.size_method {
            SizeMethod::Walk => Arc::new(WalkDirSizer),
            SizeMethod::Du => Arc::new(DuSizer),
        };
        let registry = Arc::new(WorldRegistry::new(config.worlds_root()).with_sizer(sizer));

        let process_name = Some(config.server.process_name.clone());
        let server_state = Arc::new(PidFileServerState::new(
            config.pid_file_path(),
            process_name,
        ));

        Self {
            coordinator: SwitchCoordinator::new(registry, server_state),
        }
    }

    pub async fn execute(&self, command: Command) -> WorldResult<Output> {
        let registry = self.coordinator.registry();
        debug!("Executing {:?}", command);

        let output = match command {
            Command::List => Output::Worlds(registry.list().await?),
            Command::Get { id } => Output::World(registry.get(&id).await?),
            Command::Active => Output::Active(registry.active_world().await?),
            Command::Create {
                id,
                name,
                description,
                world_type,
                tags,
                settings,
            } => {
                let spec = CreateWorldSpec {
                    id,
                    name,
                    description,
                    world_type,
                    custom_tags: tags,
                    settings: settings.into_iter().collect(),
                };
                Output::Metadata(registry.create(spec).await?)
            }
            Command::Switch { id } => Output::Switched(self.coordinator.switch(&id).await?),
            Command::Delete { id } => {
                self.coordinator.delete_world(&id).await?;
                Output::Deleted { deleted: id }
            }
            Command::Meta {
                id,
                name,
                description,
                icon,
                world_type,
                tags,
                clear_tags,
            } => {
                let custom_tags = if clear_tags || !tags.is_empty() {
                    Some(tags)
                } else {
                    None
                };
                let patch = MetadataPatch {
                    name,
                    description,
                    world_type,
                    icon,
                    custom_tags,
                };
                if patch.is_empty() {
                    Output::Metadata(registry.get(&id).await?.metadata)
                } else {
                    Output::Metadata(registry.update_metadata(&id, patch).await?)
                }
            }
            Command::Props { id, set } => {
                if set.is_empty() {
                    Output::Properties(registry.get_properties(&id).await?)
                } else {
                    let patch: Properties = set.into_iter().collect();
                    Output::Properties(registry.update_properties(&id, patch).await?)
                }
            }
            Command::Repair { id } => Output::Metadata(registry.repair_metadata(&id).await?),
            Command::MigrateSettings => Output::Migration(registry.migrate_legacy_settings().await?),
        };

        Ok(output)
    }
}
