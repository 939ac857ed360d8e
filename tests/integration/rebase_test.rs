//! Integration tests for the LIFO enable order and rebasing.

mod helpers;

use shellext_core::types::ExtensionState;

use helpers::{TestHost, assert_order_consistent, ids, state};

const ALL: [&str; 3] = ["a@test", "b@test", "c@test"];

async fn three_active(host: &TestHost) -> shellext_lifecycle::ExtensionManager {
    for uuid in ALL {
        host.install(uuid).await;
    }
    host.enable_in_settings(&ALL).await;
    let manager = host.start().await;
    assert_eq!(manager.enable_order().await, ids(&ALL));
    host.clear_calls();
    manager
}

#[tokio::test]
async fn test_deactivate_rebases_newer_extensions() {
    let host = TestHost::new();
    let manager = three_active(&host).await;

    assert!(manager.deactivate("a@test").await);

    assert_eq!(
        host.calls(),
        vec![
            "c@test.disable",
            "b@test.disable",
            "a@test.disable",
            "b@test.enable",
            "c@test.enable",
        ]
    );
    assert_eq!(manager.enable_order().await, ids(&["b@test", "c@test"]));
    assert_eq!(state(&manager, "a@test").await, ExtensionState::Inactive);
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_deactivate_newest_touches_nothing_else() {
    let host = TestHost::new();
    let manager = three_active(&host).await;

    assert!(manager.deactivate("c@test").await);

    assert_eq!(host.calls(), vec!["c@test.disable"]);
    assert_eq!(manager.enable_order().await, ids(&["a@test", "b@test"]));
}

#[tokio::test]
async fn test_reactivated_extension_goes_last() {
    let host = TestHost::new();
    let manager = three_active(&host).await;

    manager.deactivate("b@test").await;
    manager.activate("b@test").await;

    assert_eq!(
        manager.enable_order().await,
        ids(&["a@test", "c@test", "b@test"])
    );
    // the module was constructed once and reused
    assert_eq!(host.import_count("b@test"), 1);
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_deactivate_inactive_is_a_no_op() {
    let host = TestHost::new();
    let manager = three_active(&host).await;
    manager.deactivate("a@test").await;
    host.clear_calls();

    assert!(!manager.deactivate("a@test").await);
    assert!(host.calls().is_empty());
    assert!(!manager.deactivate("nope@test").await);
}

#[tokio::test]
async fn test_failed_downstream_disable_is_isolated() {
    let host = TestHost::new();
    let manager = three_active(&host).await;
    host.fail_disable("b@test");

    assert!(manager.deactivate("a@test").await);

    assert_eq!(state(&manager, "a@test").await, ExtensionState::Inactive);
    assert_eq!(state(&manager, "b@test").await, ExtensionState::Error);
    assert_eq!(state(&manager, "c@test").await, ExtensionState::Active);
    assert_eq!(manager.enable_order().await, ids(&["c@test"]));
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_failed_target_disable_still_leaves_order() {
    let host = TestHost::new();
    let manager = three_active(&host).await;
    host.fail_disable("a@test");

    assert!(manager.deactivate("a@test").await);

    let info = manager.lookup("a@test").await.unwrap();
    assert_eq!(info.state, ExtensionState::Error);
    assert!(info.error.unwrap().contains("refused to disable"));
    assert_eq!(manager.enable_order().await, ids(&["b@test", "c@test"]));
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_failed_reenable_drops_from_order() {
    let host = TestHost::new();
    let manager = three_active(&host).await;
    host.fail_enable("b@test");

    assert!(manager.deactivate("a@test").await);

    assert_eq!(state(&manager, "b@test").await, ExtensionState::Error);
    assert_eq!(manager.enable_order().await, ids(&["c@test"]));
    assert_eq!(
        host.calls(),
        vec![
            "c@test.disable",
            "b@test.disable",
            "a@test.disable",
            "b@test.enable",
            "c@test.enable",
        ]
    );
    assert_order_consistent(&manager).await;
}

#[tokio::test]
async fn test_disable_all_runs_newest_first() {
    let host = TestHost::new();
    let manager = three_active(&host).await;

    manager.disable_all().await;

    assert_eq!(
        host.calls(),
        vec!["c@test.disable", "b@test.disable", "a@test.disable"]
    );
    assert!(manager.enable_order().await.is_empty());
    for uuid in ALL {
        assert_eq!(state(&manager, uuid).await, ExtensionState::Inactive);
    }
}

#[tokio::test]
async fn test_unload_middle_extension_rebases() {
    let host = TestHost::new();
    let manager = three_active(&host).await;

    manager.unload("b@test").await.unwrap();

    assert_eq!(
        host.calls(),
        vec!["c@test.disable", "b@test.disable", "c@test.enable"]
    );
    assert!(manager.lookup("b@test").await.is_none());
    assert_eq!(manager.enable_order().await, ids(&["a@test", "c@test"]));
    assert_order_consistent(&manager).await;
}
