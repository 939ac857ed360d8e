//! Integration tests for loading, activation, and record bookkeeping.

mod helpers;

use std::sync::{Arc, Mutex};

use serde_json::json;

use shellext_core::error::ExtensionError;
use shellext_core::events::ExtensionEvent;
use shellext_core::traits::{SettingsKey, SettingsStore};
use shellext_core::types::{ExtensionOrigin, ExtensionState, SessionMode};
use shellext_lifecycle::ClosureHandler;

use helpers::{TestHost, assert_order_consistent, ids, state, write_manifest};

#[tokio::test]
async fn test_enabled_extension_becomes_active() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.enable_in_settings(&["a@test"]).await;

    let manager = host.start().await;

    assert_eq!(state(&manager, "a@test").await, ExtensionState::Active);
    assert_eq!(manager.enable_order().await, ids(&["a@test"]));
    assert_eq!(host.calls(), vec!["a@test.enable"]);

    let info = manager.lookup("a@test").await.unwrap();
    assert!(info.enabled);
    assert!(info.can_change);
    assert_eq!(info.origin, ExtensionOrigin::PerUser);
}

#[tokio::test]
async fn test_unwanted_extension_is_parked_without_import() {
    let host = TestHost::new();
    host.install("a@test").await;

    let manager = host.start().await;

    assert_eq!(state(&manager, "a@test").await, ExtensionState::Inactive);
    assert_eq!(host.import_count("a@test"), 0);
    assert!(manager.enable_order().await.is_empty());

    // activating a parked extension imports it first
    assert!(manager.activate("a@test").await);
    assert_eq!(host.import_count("a@test"), 1);
    assert_eq!(state(&manager, "a@test").await, ExtensionState::Active);
}

#[tokio::test]
async fn test_incompatible_shell_version_is_out_of_date() {
    let host = TestHost::new();
    let dir = host
        .install_manifest(
            &host.user_dir,
            "foo@test",
            TestHost::manifest("foo@test", &["45"]),
        )
        .await;
    host.enable_in_settings(&["foo@test"]).await;

    let manager = host.builder().build().await.unwrap();
    manager
        .create_record("foo@test", &dir, ExtensionOrigin::PerUser)
        .await
        .unwrap();

    assert!(!manager.load_record("foo@test").await);
    assert_eq!(state(&manager, "foo@test").await, ExtensionState::OutOfDate);
    assert_eq!(host.import_count("foo@test"), 0);
    assert!(!manager.lookup("foo@test").await.unwrap().can_change);
}

#[tokio::test]
async fn test_disabled_version_validation_loads_old_extension() {
    let host = TestHost::new();
    host.install_manifest(
        &host.user_dir,
        "foo@test",
        TestHost::manifest("foo@test", &["45"]),
    )
    .await;
    host.enable_in_settings(&["foo@test"]).await;
    host.settings.set_version_validation_disabled(true).await;

    let manager = host.start().await;

    assert_eq!(state(&manager, "foo@test").await, ExtensionState::Active);
}

#[tokio::test]
async fn test_activate_twice_is_a_no_op() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.enable_in_settings(&["a@test"]).await;
    let manager = host.start().await;

    assert!(manager.activate("a@test").await);

    assert_eq!(host.calls(), vec!["a@test.enable"]);
    assert_eq!(manager.enable_order().await, ids(&["a@test"]));
}

#[tokio::test]
async fn test_unknown_extension_is_ignored() {
    let host = TestHost::new();
    host.install("a@test").await;
    let manager = host.start().await;

    assert!(!manager.activate("nope@test").await);
    assert!(!manager.deactivate("nope@test").await);
    assert!(manager.lookup("nope@test").await.is_none());
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_enable_failure_leaves_error_state() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.install("b@test").await;
    host.enable_in_settings(&["a@test", "b@test"]).await;
    host.fail_enable("a@test");

    let manager = host.start().await;

    let info = manager.lookup("a@test").await.unwrap();
    assert_eq!(info.state, ExtensionState::Error);
    assert!(info.error.unwrap().contains("refused to enable"));
    assert!(!info.can_change);
    // the failure stays isolated
    assert_eq!(state(&manager, "b@test").await, ExtensionState::Active);
    assert_eq!(manager.enable_order().await, ids(&["b@test"]));
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_missing_entrypoint_is_an_error() {
    let host = TestHost::new();
    write_manifest(
        &host.user_dir.join("nocode@test"),
        &TestHost::manifest("nocode@test", &["46"]),
    )
    .await;
    host.enable_in_settings(&["nocode@test"]).await;

    let manager = host.start().await;

    let info = manager.lookup("nocode@test").await.unwrap();
    assert_eq!(info.state, ExtensionState::Error);
    assert_eq!(info.errors.len(), 1);
}

#[tokio::test]
async fn test_failed_initialization_notifies_once() {
    let host = TestHost::new();
    write_manifest(
        &host.user_dir.join("nocode@test"),
        &TestHost::manifest("nocode@test", &["46"]),
    )
    .await;
    host.enable_in_settings(&["nocode@test"]).await;
    let manager = host.builder().build().await.unwrap();

    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    manager
        .events()
        .subscribe(ClosureHandler::wrap("test", move |event| {
            if let ExtensionEvent::StateChanged { extension } = &event.payload {
                sink.lock().unwrap().push(extension.state);
            }
        }))
        .await;

    manager.load_extensions().await.unwrap();

    assert_eq!(*states.lock().unwrap(), vec![ExtensionState::Error]);
}

#[tokio::test]
async fn test_construction_failure_is_not_retried() {
    let host = TestHost::new();
    write_manifest(
        &host.user_dir.join("a@test"),
        &TestHost::manifest("a@test", &["46"]),
    )
    .await;
    let attempts = Arc::new(Mutex::new(0));
    let counter = attempts.clone();
    host.loader
        .register("a@test", move |_| {
            *counter.lock().unwrap() += 1;
            Err("constructor threw".to_string())
        })
        .await;
    host.enable_in_settings(&["a@test"]).await;

    let manager = host.start().await;
    assert_eq!(state(&manager, "a@test").await, ExtensionState::Error);

    assert!(!manager.activate("a@test").await);
    assert_eq!(*attempts.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_metadata_is_skipped() {
    let host = TestHost::new();
    host.install("good@test").await;
    let bad = host.user_dir.join("bad@test");
    tokio::fs::create_dir_all(&bad).await.unwrap();
    tokio::fs::write(bad.join("metadata.json"), "{ nope")
        .await
        .unwrap();
    write_manifest(
        &host.user_dir.join("mismatch@test"),
        &TestHost::manifest("other@test", &["46"]),
    )
    .await;

    let manager = host.start().await;

    assert_eq!(manager.uuids().await, ids(&["good@test"]));
    assert!(manager.lookup("bad@test").await.is_none());
}

#[tokio::test]
async fn test_create_record_rejects_duplicates() {
    let host = TestHost::new();
    let dir = host.install("a@test").await;
    let manager = host.builder().build().await.unwrap();

    manager
        .create_record("a@test", &dir, ExtensionOrigin::PerUser)
        .await
        .unwrap();
    let err = manager
        .create_record("a@test", &dir, ExtensionOrigin::System)
        .await
        .unwrap_err();

    assert!(matches!(err, ExtensionError::DuplicateId { .. }));
    assert_eq!(
        manager.lookup("a@test").await.unwrap().origin,
        ExtensionOrigin::PerUser
    );
}

#[tokio::test]
async fn test_user_directory_shadows_system_copy() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.install_manifest(
        &host.system_dir,
        "a@test",
        TestHost::manifest("a@test", &["46"]),
    )
    .await;
    host.install_manifest(
        &host.system_dir,
        "s@test",
        TestHost::manifest("s@test", &["46"]),
    )
    .await;

    let manager = host.start().await;

    assert_eq!(manager.uuids().await, ids(&["a@test", "s@test"]));
    assert_eq!(
        manager.lookup("a@test").await.unwrap().path,
        host.user_dir.join("a@test")
    );
    assert_eq!(
        manager.lookup("s@test").await.unwrap().origin,
        ExtensionOrigin::System
    );
}

#[tokio::test]
async fn test_session_mode_gates_extensions() {
    let host = TestHost::new();
    host.install("a@test").await;
    let mut lock = TestHost::manifest("lock@test", &["46"]);
    lock["session-modes"] = json!(["user", "unlock-dialog"]);
    host.install_manifest(&host.user_dir, "lock@test", lock).await;
    host.enable_in_settings(&["a@test", "lock@test"]).await;

    let manager = host.start().await;
    assert_eq!(manager.enable_order().await, ids(&["a@test", "lock@test"]));

    manager
        .update_session_mode(SessionMode::new("unlock-dialog"))
        .await;
    assert_eq!(state(&manager, "a@test").await, ExtensionState::Inactive);
    assert_eq!(manager.enable_order().await, ids(&["lock@test"]));

    // not supported in this mode, so activation is refused
    assert!(!manager.activate("a@test").await);

    manager.update_session_mode(SessionMode::user()).await;
    assert_eq!(manager.enable_order().await, ids(&["lock@test", "a@test"]));
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_session_without_extensions_disables_everything() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.install("b@test").await;
    host.enable_in_settings(&["a@test", "b@test"]).await;
    let manager = host.start().await;
    host.clear_calls();

    manager
        .update_session_mode(SessionMode::new("gdm").with_allow_extensions(false))
        .await;

    assert!(manager.enable_order().await.is_empty());
    assert_eq!(host.calls(), vec!["b@test.disable", "a@test.disable"]);
}

#[tokio::test]
async fn test_reload_with_different_version_conflicts() {
    let host = TestHost::new();
    let dir = host.install("a@test").await;
    host.enable_in_settings(&["a@test"]).await;
    let manager = host.start().await;

    let mut manifest = TestHost::manifest("a@test", &["46"]);
    manifest["version"] = json!(2);
    write_manifest(&dir, &manifest).await;

    assert!(!manager.reload("a@test").await.unwrap());
    let info = manager.lookup("a@test").await.unwrap();
    assert_eq!(info.state, ExtensionState::Error);
    assert!(info.error.unwrap().contains("different version"));

    // the resident version loads again fine
    write_manifest(&dir, &TestHost::manifest("a@test", &["46"])).await;
    assert!(manager.reload("a@test").await.unwrap());
    assert_eq!(state(&manager, "a@test").await, ExtensionState::Active);
}

#[tokio::test]
async fn test_reload_with_broken_metadata_forgets_record() {
    let host = TestHost::new();
    let dir = host.install("a@test").await;
    let manager = host.start().await;

    tokio::fs::write(dir.join("metadata.json"), "garbage")
        .await
        .unwrap();

    let err = manager.reload("a@test").await.unwrap_err();
    assert!(matches!(err, ExtensionError::Metadata { .. }));
    assert!(manager.lookup("a@test").await.is_none());
}

#[tokio::test]
async fn test_events_follow_transitions() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.enable_in_settings(&["a@test"]).await;
    let manager = host.builder().build().await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .events()
        .subscribe(ClosureHandler::wrap("test", move |event| {
            let entry = match &event.payload {
                ExtensionEvent::Loaded { uuid } => format!("loaded:{uuid}"),
                ExtensionEvent::StateChanged { extension } => {
                    format!("{}:{}", extension.uuid, extension.state)
                }
            };
            sink.lock().unwrap().push(entry);
        }))
        .await;

    manager.load_extensions().await.unwrap();

    let seen = seen.lock().unwrap().clone();
    let activating = seen
        .iter()
        .position(|e| e == "a@test:activating")
        .expect("activating emitted");
    let active = seen
        .iter()
        .position(|e| e == "a@test:active")
        .expect("active emitted");
    assert_eq!(seen[0], "loaded:a@test");
    assert!(activating < active);
}

#[tokio::test]
async fn test_uninstall_only_removes_user_extensions() {
    let host = TestHost::new();
    let dir = host.install("a@test").await;
    host.install_manifest(
        &host.system_dir,
        "s@test",
        TestHost::manifest("s@test", &["46"]),
    )
    .await;
    host.enable_in_settings(&["a@test"]).await;
    let manager = host.start().await;

    assert!(!manager.uninstall_extension("s@test").await.unwrap());
    assert!(!manager.uninstall_extension("nope@test").await.unwrap());

    assert!(manager.uninstall_extension("a@test").await.unwrap());
    assert!(manager.lookup("a@test").await.is_none());
    assert!(!dir.exists());
    assert!(manager.enable_order().await.is_empty());
    assert_eq!(host.calls(), vec!["a@test.enable", "a@test.disable"]);
}

#[tokio::test]
async fn test_enable_and_disable_extension_edit_settings() {
    let host = TestHost::new();
    host.install("a@test").await;
    let manager = host.start().await;

    host.settings
        .set_disabled_extensions(ids(&["a@test"]))
        .await
        .unwrap();
    assert!(manager.enable_extension("a@test").await.unwrap());
    assert_eq!(host.settings.enabled_extensions().await, ids(&["a@test"]));
    assert!(host.settings.disabled_extensions().await.is_empty());

    assert!(manager.disable_extension("a@test").await.unwrap());
    assert!(host.settings.enabled_extensions().await.is_empty());
    assert_eq!(host.settings.disabled_extensions().await, ids(&["a@test"]));

    assert!(!manager.enable_extension("unknown@test").await.unwrap());
}

#[tokio::test]
async fn test_notify_extension_update() {
    let host = TestHost::new();
    host.install("a@test").await;
    let manager = host.start().await;

    assert!(manager.notify_extension_update("a@test").await);
    assert!(manager.lookup("a@test").await.unwrap().has_update);
    assert!(!manager.notify_extension_update("nope@test").await);
}

#[tokio::test]
async fn test_writability_controls_can_change() {
    let host = TestHost::new();
    host.install("a@test").await;
    host.install("m@test").await;
    let session = SessionMode::user().with_enabled_extensions(ids(&["m@test"]));
    let manager = host.builder().session_mode(session).build().await.unwrap();
    manager.load_extensions().await.unwrap();

    host.settings
        .set_writable(SettingsKey::EnabledExtensions, false)
        .await;
    manager.on_settings_writability_changed().await;

    assert!(!manager.lookup("a@test").await.unwrap().can_change);
    // mode-mandated extensions depend on the user-extensions switch
    assert!(manager.lookup("m@test").await.unwrap().can_change);
    assert_eq!(state(&manager, "m@test").await, ExtensionState::Active);
}

#[tokio::test]
async fn test_stylesheet_loaded_while_active() {
    let host = TestHost::new();
    let dir = host.install("a@test").await;
    tokio::fs::write(dir.join("stylesheet.css"), ".panel {}")
        .await
        .unwrap();
    host.enable_in_settings(&["a@test"]).await;
    let manager = host.start().await;

    assert!(host.stylesheets.loaded("a@test").await.is_some());

    manager.deactivate("a@test").await;
    assert!(host.stylesheets.loaded("a@test").await.is_none());
}
