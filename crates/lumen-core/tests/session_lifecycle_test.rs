//! Integration tests for the session lifecycle
//!
//! Drives the registry, facade and state managers through the public API.

use async_trait::async_trait;
use lumen_core::memory::MemoryBounds;
use lumen_core::session::{RegistryConfig, SessionConfig, SessionRegistry};
use lumen_core::state::{
    AppState, Category, FieldValue, IsolatedStateManager, NodeValues, StateStore, ThemeUpdate,
};
use lumen_core::{MemoryTracker, SessionFacade, SessionResult};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Route library logs to the test harness; filter with RUST_LOG
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn facade() -> SessionFacade {
    SessionFacade::new(Arc::new(SessionRegistry::default()))
}

fn persistent_registry(root: &std::path::Path) -> Arc<SessionRegistry> {
    Arc::new(SessionRegistry::new(RegistryConfig {
        persistence_root: Some(root.to_path_buf()),
        ..Default::default()
    }))
}

#[tokio::test]
async fn test_fresh_session_has_default_state() {
    let facade = facade();
    let id = facade.create_session(None, None).await;
    let state = facade.get_state(&id).await.unwrap();

    assert_eq!(state, AppState::default());
    assert!(state.current_category.is_none());
    assert!(state.current_subnode.is_none());
    assert!(state.field_values.is_empty());
    assert!(state.confirmed_nodes.is_empty());
}

#[tokio::test]
async fn test_update_field_is_idempotent() {
    let facade = facade();
    let id = facade.create_session(None, None).await;

    let first = facade
        .update_field(&id, "input", "input_sensitivity", FieldValue::Number(40.0))
        .await;
    let after_first = facade.get_state(&id).await.unwrap();
    let second = facade
        .update_field(&id, "input", "input_sensitivity", FieldValue::Number(40.0))
        .await;
    let after_second = facade.get_state(&id).await.unwrap();

    assert!(first);
    assert_eq!(first, second);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let facade = facade();
    let a = facade.create_session(None, None).await;
    let b = facade.create_session(None, None).await;

    assert!(facade.update_field(&a, "input", "vad", FieldValue::Bool(false)).await);
    assert!(facade.set_category(&a, Some(Category::Agent)).await);
    assert!(facade.update_theme(&a, &ThemeUpdate::default().glow("#123456")).await);

    assert_eq!(facade.get_state(&b).await.unwrap(), AppState::default());
}

#[tokio::test]
async fn test_confirm_overwrites_same_id() {
    let facade = facade();
    let id = facade.create_session(None, None).await;

    let mut v1 = NodeValues::new();
    v1.insert("gain".into(), json!(1));
    let mut v2 = NodeValues::new();
    v2.insert("gain".into(), json!(2));

    facade.confirm_subnode(&id, Category::Voice, "input", v1).await;
    facade.confirm_subnode(&id, Category::Voice, "input", v2.clone()).await;

    let nodes = facade.get_state(&id).await.unwrap().confirmed_nodes;
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, "input");
    assert_eq!(nodes[0].values, v2);
}

#[tokio::test]
async fn test_orbit_angle_sequence() {
    let facade = facade();
    let id = facade.create_session(None, None).await;

    let mut angles = Vec::new();
    for subnode in ["input", "output", "processing"] {
        angles.push(
            facade
                .confirm_subnode(&id, Category::Voice, subnode, NodeValues::new())
                .await
                .unwrap(),
        );
    }
    assert_eq!(angles, vec![-90.0, -45.0, 0.0]);

    let fourth = facade
        .confirm_subnode(&id, Category::Voice, "model", NodeValues::new())
        .await;
    assert_eq!(fourth, Some(45.0));
}

#[tokio::test]
async fn test_unknown_subnode_confirm_returns_angle_without_node() {
    let facade = facade();
    let id = facade.create_session(None, None).await;

    let angle = facade
        .confirm_subnode(&id, Category::Voice, "not-a-subnode", NodeValues::new())
        .await;
    assert_eq!(angle, Some(-90.0));
    assert!(facade.get_state(&id).await.unwrap().confirmed_nodes.is_empty());
}

#[tokio::test]
async fn test_persistence_round_trip_across_registries() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();

    let saved = {
        let registry = persistent_registry(temp_dir.path());
        let facade = SessionFacade::new(Arc::clone(&registry));
        facade.create_session(Some("desk".into()), None).await;
        facade.set_category("desk", Some(Category::Customize)).await;
        facade
            .update_field("desk", "theme", "glow_color", "#abcdef".into())
            .await;
        facade
            .confirm_subnode("desk", Category::Customize, "theme", NodeValues::new())
            .await;
        let state = facade.get_state("desk").await.unwrap();
        registry.shutdown().await;
        state
    };

    let registry = persistent_registry(temp_dir.path());
    registry.create_session(Some("desk".into()), None).await;
    let restored = registry
        .get_session("desk")
        .unwrap()
        .state_manager()
        .get_state_copy()
        .await;
    assert_eq!(restored, saved);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_corrupt_document_starts_empty() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("broken");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("session_state.json"), "{ not json").unwrap();

    let registry = persistent_registry(temp_dir.path());
    registry.create_session(Some("broken".into()), None).await;
    let state = registry
        .get_session("broken")
        .unwrap()
        .state_manager()
        .get_state_copy()
        .await;
    assert_eq!(state, AppState::default());
    registry.shutdown().await;
}

#[tokio::test]
async fn test_expiry_eligibility_through_sweep() {
    let registry = SessionRegistry::default();
    let idle = registry
        .create_session(None, Some(SessionConfig::default().with_idle_timeout(0)))
        .await;
    let persistent = registry
        .create_session(
            None,
            Some(SessionConfig::default().with_idle_timeout(0).with_persistent(true)),
        )
        .await;

    assert!(registry.get_session(&idle).unwrap().is_expired());
    assert!(!registry.get_session(&persistent).unwrap().is_expired());

    registry.sweep_once().await;
    assert!(registry.get_session(&idle).is_none());
    assert!(registry.get_session(&persistent).is_some());
}

#[test]
fn test_bounds_report_over_ceiling() {
    for ceiling in [1u64, 10, 100, 4096] {
        let bounds = MemoryBounds::new(ceiling, ceiling);
        let over = ceiling as f64 * 1.01 + 0.5;
        let check = bounds.check_bounds(over, 0.0);
        assert!(!check.memory_ok, "ceiling {ceiling}");
        assert!(!check.within_bounds);
        assert!(check.memory_usage_percent > 100.0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sessions_progress_independently() {
    let facade = facade();
    let a = facade.create_session(None, None).await;
    let b = facade.create_session(None, None).await;

    let run = |id: String, facade: SessionFacade| async move {
        for i in 0..50 {
            assert!(
                facade
                    .update_field(&id, "input", "input_sensitivity", FieldValue::Number(i as f64))
                    .await
            );
        }
    };
    let (ra, rb) = tokio::join!(
        tokio::spawn(run(a.clone(), facade.clone())),
        tokio::spawn(run(b.clone(), facade.clone()))
    );
    ra.unwrap();
    rb.unwrap();

    for id in [&a, &b] {
        assert_eq!(
            facade.get_field_value(id, "input", "input_sensitivity").await,
            Some(FieldValue::Number(49.0))
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_on_one_session_all_land() {
    let facade = facade();
    let id = facade.create_session(None, None).await;

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let facade = facade.clone();
            let id = id.clone();
            tokio::spawn(async move {
                facade
                    .update_field(&id, "custom", &format!("field_{i}"), FieldValue::Number(i as f64))
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let values = facade.get_subnode_field_values(&id, "custom").await.unwrap();
    assert_eq!(values.len(), 20);
}

/// Store whose saves take a long time
struct SlowStore;

#[async_trait]
impl StateStore for SlowStore {
    async fn load(&self) -> SessionResult<Option<AppState>> {
        Ok(None)
    }

    async fn save(&self, _state: &AppState) -> SessionResult<()> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn save_projection(&self, _state: &AppState) -> SessionResult<()> {
        Ok(())
    }

    fn location(&self) -> String {
        "slow://".to_string()
    }
}

#[tokio::test]
async fn test_stalled_save_blocks_only_its_session() {
    let slow = Arc::new(IsolatedStateManager::with_store(
        "slow",
        MemoryTracker::shared("slow"),
        Arc::new(SlowStore),
    ));
    let fast = IsolatedStateManager::new("fast", MemoryTracker::shared("fast"));

    let stalled = {
        let slow = Arc::clone(&slow);
        tokio::spawn(async move { slow.set_category(Some(Category::Voice)).await })
    };
    tokio::task::yield_now().await;

    let done = tokio::time::timeout(
        Duration::from_millis(500),
        fast.set_category(Some(Category::Monitor)),
    )
    .await;
    assert_eq!(done, Ok(true));
    assert!(!stalled.is_finished());

    stalled.abort();
}
