//! Integration tests for settings-driven reconciliation.

mod helpers;

use std::sync::{Arc, Mutex};

use serde_json::json;

use shellext_core::events::ExtensionEvent;
use shellext_core::traits::SettingsStore;
use shellext_core::types::{ExtensionState, SessionMode};
use shellext_lifecycle::{ClosureHandler, ExtensionManager};

use helpers::{TestHost, assert_order_consistent, ids, state, wait_for_state};

type StateLog = Arc<Mutex<Vec<(String, ExtensionState, bool)>>>;

/// Records `(uuid, state, enabled)` for every state notification.
async fn record_state_changes(manager: &ExtensionManager) -> StateLog {
    let seen: StateLog = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .events()
        .subscribe(ClosureHandler::wrap("states", move |event| {
            if let ExtensionEvent::StateChanged { extension } = &event.payload {
                sink.lock().unwrap().push((
                    extension.uuid.clone(),
                    extension.state,
                    extension.enabled,
                ));
            }
        }))
        .await;
    seen
}

#[tokio::test]
async fn test_enabling_in_settings_activates_once() {
    let host = TestHost::new();
    host.install("foo@test").await;
    let manager = host.start().await;
    assert!(host.calls().is_empty());

    host.enable_in_settings(&["foo@test"]).await;
    manager.reconcile_desired_set().await;
    manager.reconcile_desired_set().await;

    assert_eq!(host.calls(), vec!["foo@test.enable"]);
    assert_eq!(state(&manager, "foo@test").await, ExtensionState::Active);
    assert_eq!(manager.enable_order().await, ids(&["foo@test"]));
    assert!(manager.lookup("foo@test").await.unwrap().enabled);
}

#[tokio::test]
async fn test_removing_from_settings_deactivates() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.install("b@test").await;
    host.enable_in_settings(&["a@test", "b@test"]).await;
    let manager = host.start().await;
    host.clear_calls();

    host.enable_in_settings(&["b@test"]).await;
    manager.reconcile_desired_set().await;

    assert_eq!(
        host.calls(),
        vec!["b@test.disable", "a@test.disable", "b@test.enable"]
    );
    assert_eq!(manager.enable_order().await, ids(&["b@test"]));
    assert!(!manager.lookup("a@test").await.unwrap().enabled);
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_disabled_list_overrides_enabled_list() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.enable_in_settings(&["a@test"]).await;
    host.settings
        .set_disabled_extensions(ids(&["a@test"]))
        .await
        .unwrap();

    let manager = host.start().await;

    assert_eq!(state(&manager, "a@test").await, ExtensionState::Inactive);
    assert_eq!(host.import_count("a@test"), 0);
}

#[tokio::test]
async fn test_user_extensions_switch_keeps_mode_extensions() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.install("m@test").await;
    host.enable_in_settings(&["a@test"]).await;
    let session = SessionMode::user().with_enabled_extensions(ids(&["m@test"]));
    let manager = host.builder().session_mode(session).build().await.unwrap();
    manager.load_extensions().await.unwrap();

    // mode-mandated extensions load first
    assert_eq!(manager.enable_order().await, ids(&["m@test", "a@test"]));

    host.settings.set_user_extensions_disabled(true).await;
    manager.reconcile_desired_set().await;

    assert_eq!(manager.enable_order().await, ids(&["m@test"]));
    assert!(!manager.lookup("a@test").await.unwrap().can_change);

    host.settings.set_user_extensions_disabled(false).await;
    manager.reconcile_desired_set().await;
    assert_eq!(manager.enable_order().await, ids(&["m@test", "a@test"]));
}

#[tokio::test]
async fn test_watcher_follows_settings_changes() {
    let host = TestHost::new();
    host.install("a@test").await;
    let manager = Arc::new(host.start().await);
    let watcher = manager.clone().spawn_settings_watcher();

    host.enable_in_settings(&["a@test"]).await;
    wait_for_state(&manager, "a@test", ExtensionState::Active).await;

    host.settings.set_disabled_extensions(ids(&["a@test"])).await.unwrap();
    wait_for_state(&manager, "a@test", ExtensionState::Inactive).await;

    watcher.abort();
    assert_eq!(host.calls(), vec!["a@test.enable", "a@test.disable"]);
}

#[tokio::test]
async fn test_version_validation_flip_reloads_extensions() {
    let host = TestHost::new();
    host.install_manifest(
        &host.user_dir,
        "old@test",
        TestHost::manifest("old@test", &["45"]),
    )
    .await;
    host.install("new@test").await;
    host.enable_in_settings(&["new@test", "old@test"]).await;
    let manager = host.start().await;
    assert_eq!(state(&manager, "old@test").await, ExtensionState::OutOfDate);
    host.clear_calls();

    host.settings.set_version_validation_disabled(true).await;
    manager.on_version_validation_changed().await;

    assert_eq!(state(&manager, "old@test").await, ExtensionState::Active);
    assert_eq!(state(&manager, "new@test").await, ExtensionState::Active);
    // the previously active extension comes back first
    assert_eq!(
        manager.enable_order().await,
        ids(&["new@test", "old@test"])
    );
    assert_eq!(
        host.calls(),
        vec!["new@test.disable", "new@test.enable", "old@test.enable"]
    );

    // same value again does nothing
    host.clear_calls();
    manager.on_version_validation_changed().await;
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_read_only_enabled_list_is_rejected() {
    use shellext_core::traits::SettingsKey;

    let host = TestHost::new();
    host.install("a@test").await;
    let manager = host.start().await;
    host.settings
        .set_writable(SettingsKey::EnabledExtensions, false)
        .await;

    assert!(manager.enable_extension("a@test").await.is_err());
    assert!(host.settings.enabled_extensions().await.is_empty());
}

#[tokio::test]
async fn test_unrelated_settings_change_keeps_manual_deactivation() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.install("b@test").await;
    host.enable_in_settings(&["a@test", "b@test"]).await;
    let manager = host.start().await;

    assert!(manager.deactivate("b@test").await);
    host.clear_calls();

    host.settings
        .set_disabled_extensions(ids(&["zzz@test"]))
        .await
        .unwrap();
    manager.reconcile_desired_set().await;

    assert!(host.calls().is_empty());
    assert_eq!(state(&manager, "b@test").await, ExtensionState::Inactive);
    assert_eq!(manager.enable_order().await, ids(&["a@test"]));
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_enabling_out_of_date_extension_only_flips_flag() {
    let host = TestHost::new();
    host.install_manifest(
        &host.user_dir,
        "old@test",
        TestHost::manifest("old@test", &["40"]),
    )
    .await;
    let manager = host.start().await;
    assert_eq!(state(&manager, "old@test").await, ExtensionState::OutOfDate);
    let seen = record_state_changes(&manager).await;

    host.enable_in_settings(&["old@test"]).await;
    manager.reconcile_desired_set().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("old@test".to_string(), ExtensionState::OutOfDate, true)]
    );
    assert_eq!(host.import_count("old@test"), 0);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_enabling_extension_unsupported_by_session_only_flips_flag() {
    let host = TestHost::new();
    let mut manifest = TestHost::manifest("lock@test", &["46"]);
    manifest["session-modes"] = json!(["unlock-dialog"]);
    host.install_manifest(&host.user_dir, "lock@test", manifest)
        .await;
    let manager = host.start().await;
    let seen = record_state_changes(&manager).await;

    host.enable_in_settings(&["lock@test"]).await;
    manager.reconcile_desired_set().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("lock@test".to_string(), ExtensionState::Inactive, true)]
    );
    assert!(host.calls().is_empty());
    assert!(manager.enable_order().await.is_empty());
}
