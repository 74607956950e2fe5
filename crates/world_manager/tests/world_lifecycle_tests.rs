//! End-to-end tests of the world lifecycle against a real worlds root
//!
//! These cover the invariants operators rely on: one resolvable active world,
//! `level-name` pinned to `world`, and switches/deletes that either fully
//! happen or leave the tree exactly as it was.

#![cfg(unix)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;
use world_manager::{
    CreateWorldSpec, DirectorySizer, FixedClock, ManualServerState, MetadataPatch,
    MetadataSource, Properties, SwitchCoordinator, WorldError, WorldRegistry, WorldType,
};

const NOW: &str = "2024-05-01T12:00:00.000Z";

/// Helper bundling a temporary worlds root with a coordinator over it
struct Fixture {
    _dir: TempDir,
    registry: Arc<WorldRegistry>,
    server: Arc<ManualServerState>,
    coordinator: SwitchCoordinator,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let registry = Arc::new(
            WorldRegistry::new(dir.path().join("worlds"))
                .with_clock(Arc::new(FixedClock(NOW.to_string()))),
        );
        let server = Arc::new(ManualServerState::new(false));
        let coordinator = SwitchCoordinator::new(registry.clone(), server.clone());
        Self {
            _dir: dir,
            registry,
            server,
            coordinator,
        }
    }

    fn root(&self) -> &Path {
        self.registry.worlds_root()
    }
}

/// Every path under `root` with file contents or link targets, for
/// before/after comparisons.
fn snapshot(root: &Path) -> BTreeMap<String, String> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .map(|e| e.expect("walk failed"))
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .display()
                .to_string();
            let file_type = entry.file_type();
            let content = if file_type.is_symlink() {
                format!("-> {}", std::fs::read_link(entry.path()).unwrap().display())
            } else if file_type.is_file() {
                std::fs::read_to_string(entry.path()).unwrap()
            } else {
                "<dir>".to_string()
            };
            (rel, content)
        })
        .collect()
}

#[derive(Debug)]
struct FailingSizer;

#[async_trait]
impl DirectorySizer for FailingSizer {
    async fn size_bytes(&self, _path: &Path) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Other, "du not installed"))
    }
}

#[tokio::test]
async fn test_set_active_twice_matches_once() {
    let fx = Fixture::new();
    fx.registry.create(CreateWorldSpec::new("x")).await.unwrap();

    let pointer = fx.registry.pointer();
    pointer.set_active("x").await.unwrap();
    let once = pointer.get_active().await.unwrap();
    pointer.set_active("x").await.unwrap();
    let twice = pointer.get_active().await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice, "x");
}

#[tokio::test]
async fn test_switch_while_running_mutates_nothing() {
    let fx = Fixture::new();
    fx.registry.create(CreateWorldSpec::new("main")).await.unwrap();
    fx.registry.create(CreateWorldSpec::new("event")).await.unwrap();
    fx.coordinator.switch("main").await.unwrap();

    fx.server.set_running(true);
    let before = snapshot(fx.root());

    for target in ["event", "main", "missing", "bad name", "../x", "active", ""] {
        let err = fx.coordinator.switch(target).await.unwrap_err();
        assert!(
            matches!(err, WorldError::ServerMustBeStopped),
            "switch to {target:?} should be refused, got {err:?}"
        );
        assert!(err.leaves_state_untouched());

        let err = fx.coordinator.delete_world(target).await.unwrap_err();
        assert!(
            matches!(err, WorldError::ServerMustBeStopped),
            "delete of {target:?} should be refused, got {err:?}"
        );
    }

    assert_eq!(before, snapshot(fx.root()));
    assert_eq!(fx.registry.pointer().get_active().await.unwrap(), "main");
}

#[tokio::test]
async fn test_level_name_always_world() {
    let fx = Fixture::new();
    fx.registry
        .create(CreateWorldSpec::new("w1").with_setting("level-name", "custom"))
        .await
        .unwrap();
    assert_eq!(fx.registry.get_properties("w1").await.unwrap()["level-name"], "world");

    let patches: Vec<Properties> = vec![
        Properties::new(),
        [("level-name", "nether_only")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        [("level-name", ""), ("gamemode", "creative")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    ];

    for patch in patches {
        let merged = fx.registry.update_properties("w1", patch).await.unwrap();
        assert_eq!(merged["level-name"], "world");
        assert_eq!(
            fx.registry.get_properties("w1").await.unwrap()["level-name"],
            "world"
        );
    }
    assert_eq!(
        fx.registry.get_properties("w1").await.unwrap()["gamemode"],
        "creative"
    );
}

#[tokio::test]
async fn test_metadata_id_cannot_change() {
    let fx = Fixture::new();
    fx.registry.create(CreateWorldSpec::new("w1")).await.unwrap();

    let patch = serde_json::from_value::<MetadataPatch>(serde_json::json!({ "id": "other" }));
    assert!(patch.is_err(), "patches carrying an id must be rejected");

    let updated = fx
        .registry
        .update_metadata(
            "w1",
            serde_json::from_value(serde_json::json!({ "name": "Renamed", "type": "rpg" })).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, "w1");
    assert_eq!(updated.world_type, WorldType::Rpg);
    assert_eq!(fx.registry.get("w1").await.unwrap().metadata.id, "w1");
}

#[tokio::test]
async fn test_single_active_flag_after_switch() {
    let fx = Fixture::new();
    fx.registry.create(CreateWorldSpec::new("main")).await.unwrap();
    fx.registry.create(CreateWorldSpec::new("w1")).await.unwrap();
    fx.coordinator.switch("main").await.unwrap();

    let outcome = fx.coordinator.switch("w1").await.unwrap();
    assert_eq!(outcome.active_world_id, "w1");
    assert_eq!(outcome.last_played.as_deref(), Some(NOW));

    let records = fx.registry.list().await.unwrap();
    let active: Vec<_> = records.iter().filter(|r| r.active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id(), "w1");
    assert_eq!(active[0].metadata.last_played.as_deref(), Some(NOW));
}

#[tokio::test]
async fn test_create_get_delete_non_active_world() {
    let fx = Fixture::new();
    fx.registry
        .create(CreateWorldSpec::new("test1").with_type(WorldType::Creative))
        .await
        .unwrap();

    let record = fx.registry.get("test1").await.unwrap();
    assert_eq!(record.metadata.world_type, WorldType::Creative);
    assert_eq!(record.metadata.icon, WorldType::Creative.icon());
    assert_eq!(record.metadata.size_mb, 0);
    assert_eq!(record.metadata_source, MetadataSource::Found);
    assert!(!record.active);

    fx.coordinator.delete_world("test1").await.unwrap();
    assert!(matches!(
        fx.registry.get("test1").await,
        Err(WorldError::WorldNotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_active_world_rejected() {
    let fx = Fixture::new();
    fx.registry.create(CreateWorldSpec::new("main")).await.unwrap();
    fx.coordinator.switch("main").await.unwrap();
    let before = snapshot(fx.root());

    let err = fx.coordinator.delete_world("main").await.unwrap_err();
    assert!(matches!(err, WorldError::WorldIsActive(_)));
    assert!(err.leaves_state_untouched());
    assert_eq!(before, snapshot(fx.root()));
}

#[tokio::test]
async fn test_dangling_pointer_degrades_gracefully() {
    let fx = Fixture::new();
    fx.registry.create(CreateWorldSpec::new("main")).await.unwrap();
    fx.registry.create(CreateWorldSpec::new("lobby")).await.unwrap();
    tokio::fs::symlink("vanished", fx.root().join("active"))
        .await
        .unwrap();

    let records = fx.registry.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.active));

    assert!(matches!(
        fx.registry.pointer().get_active().await,
        Err(WorldError::PointerDangling { .. })
    ));
    assert!(fx.registry.active_world().await.unwrap().is_none());

    // A switch repairs the pointer.
    fx.coordinator.switch("lobby").await.unwrap();
    assert_eq!(fx.registry.pointer().get_active().await.unwrap(), "lobby");
}

#[tokio::test]
async fn test_size_failure_reads_as_zero() {
    let dir = TempDir::new().unwrap();
    let registry = WorldRegistry::new(dir.path().join("worlds")).with_sizer(Arc::new(FailingSizer));
    registry.create(CreateWorldSpec::new("main")).await.unwrap();

    let records = registry.list().await.unwrap();
    assert_eq!(records[0].metadata.size_mb, 0);
    assert_eq!(registry.get("main").await.unwrap().metadata.size_mb, 0);
}

#[tokio::test]
async fn test_concurrent_creates_of_same_id() {
    let fx = Fixture::new();

    let attempts = (0..8).map(|_| {
        let registry = fx.registry.clone();
        tokio::spawn(async move { registry.create(CreateWorldSpec::new("race")).await })
    });

    let mut created = 0;
    let mut collided = 0;
    for handle in attempts.collect::<Vec<_>>() {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(WorldError::AlreadyExists(_)) => collided += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(collided, 7);
    assert_eq!(
        fx.registry.get("race").await.unwrap().metadata_source,
        MetadataSource::Found
    );
}

#[tokio::test]
async fn test_concurrent_switches_leave_one_resolvable_pointer() {
    let fx = Fixture::new();
    let ids = ["a", "b", "c", "d"];
    for id in ids {
        fx.registry.create(CreateWorldSpec::new(id)).await.unwrap();
    }

    let coordinator = Arc::new(fx.coordinator.clone());
    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let coordinator = coordinator.clone();
            let id = id.to_string();
            tokio::spawn(async move { coordinator.switch(&id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let active = fx.registry.pointer().get_active().await.unwrap();
    assert!(ids.contains(&active.as_str()));
    let flagged: Vec<_> = fx
        .registry
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.active)
        .collect();
    assert_eq!(flagged.len(), 1);
    assert!(!fx.root().join(".active.tmp").exists());
}
