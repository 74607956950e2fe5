//! # World Manager
//!
//! Multi-world support for a self-hosted Paper server. Every world is a
//! directory under a common worlds root, and the server always runs whichever
//! one the `worlds/active` symbolic link points at.
//!
//! ## Components
//!
//! * [`properties`] - non-destructive `server.properties` reader/writer
//! * [`metadata`] - per-world `metadata.json` documents
//! * [`ActiveWorldPointer`] - the `active` link, swapped atomically
//! * [`WorldRegistry`] - list, get, create, update and delete worlds
//! * [`SwitchCoordinator`] - switching and deletion gated on server state
//!
//! Mutations are serialised through [`WorldLocks`]; sizes, time and server
//! state come from pluggable [`DirectorySizer`], [`Clock`] and
//! [`ServerStateProvider`] implementations.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use world_manager::{
//!     CreateWorldSpec, PidFileServerState, SwitchCoordinator, WorldRegistry, WorldType,
//! };
//!
//! # async fn run() -> Result<(), world_manager::WorldError> {
//! let registry = Arc::new(WorldRegistry::new("/opt/paper/worlds"));
//! let server = Arc::new(PidFileServerState::new("/opt/paper/server.pid", Some("java".into())));
//! let coordinator = SwitchCoordinator::new(registry.clone(), server);
//!
//! registry
//!     .create(CreateWorldSpec::new("creative_hub").with_type(WorldType::Creative))
//!     .await?;
//! coordinator.switch("creative_hub").await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod error;
mod fs_util;
pub mod lock;
pub mod metadata;
pub mod migrate;
pub mod pointer;
pub mod properties;
pub mod registry;
pub mod server_state;
pub mod size;
pub mod switch;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{WorldError, WorldResult};
pub use lock::{WorldGuard, WorldLocks};
pub use metadata::{MetadataPatch, WorldMetadata, WorldType, DEFAULT_ICON};
pub use migrate::{MigrationFailure, MigrationReport};
pub use pointer::{ActiveWorldPointer, POINTER_NAME};
pub use properties::Properties;
pub use registry::{
    validate_world_id, CreateWorldSpec, LoadedMetadata, MetadataSource, WorldRecord,
    WorldRegistry, DIMENSION_DIRS, METADATA_FILE, PROPERTIES_FILE,
};
pub use server_state::{ManualServerState, PidFileServerState, ServerStateProvider};
pub use size::{DirectorySizer, DuSizer, WalkDirSizer};
pub use switch::{SwitchCoordinator, SwitchOutcome};
