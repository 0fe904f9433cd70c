//! Reconciler integration tests.
//!
//! Concurrency scenarios against the scripted in-memory platform.

use std::sync::Arc;
use std::time::Duration;

use osrouter::{
    ApplyError, Error, ErrorKind, NetworkConfig, Reconciler, ReconcilerOptions, ReconcilerState,
};

use crate::common::{ScriptedApplier, tunnel};

/// Spin until `n` desired states have been submitted.
async fn wait_for_generation(reconciler: &Reconciler, n: u64) {
    while reconciler.generation() < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_newest_request_wins() {
    let applier = ScriptedApplier::gated();
    let reconciler = Arc::new(Reconciler::new(applier.clone()));

    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.1.0.0/16")).await }
    });
    applier.wait_for_calls(1).await;
    assert_eq!(reconciler.state(), ReconcilerState::Reconciling);

    let second = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.2.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 2).await;
    let third = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.3.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 3).await;

    applier.open_gate(16);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    third.await.unwrap().unwrap();

    // The first batch stopped after its address; the second never ran.
    assert_eq!(
        applier.calls(),
        [
            "+ address 100.64.0.1/32 dev wg0",
            "+ route 10.3.0.0/16 dev wg0",
        ]
    );
    assert_eq!(reconciler.current(), tunnel("10.3.0.0/16"));
    assert_eq!(reconciler.state(), ReconcilerState::Idle);
}

#[tokio::test]
async fn test_without_preemption_batch_runs_to_completion() {
    let applier = ScriptedApplier::gated();
    let options = ReconcilerOptions::new().preempt_superseded(false);
    let reconciler = Arc::new(Reconciler::with_options(applier.clone(), options));

    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.1.0.0/16")).await }
    });
    applier.wait_for_calls(1).await;

    let second = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.2.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 2).await;
    let third = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.3.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 3).await;

    applier.open_gate(16);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    third.await.unwrap().unwrap();

    assert_eq!(
        applier.calls(),
        [
            "+ address 100.64.0.1/32 dev wg0",
            "+ route 10.1.0.0/16 dev wg0",
            "- route 10.1.0.0/16 dev wg0",
            "+ route 10.3.0.0/16 dev wg0",
        ]
    );
    assert_eq!(reconciler.current(), tunnel("10.3.0.0/16"));
}

#[tokio::test]
async fn test_coalesced_callers_share_failure() {
    let applier = ScriptedApplier::gated();
    applier.fail(
        "+ route 10.3.0.0/16 dev wg0",
        ApplyError::conflict("route conflicts with an existing one"),
    );
    let reconciler = Arc::new(Reconciler::new(applier.clone()));

    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.1.0.0/16")).await }
    });
    applier.wait_for_calls(1).await;

    let second = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.2.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 2).await;
    let third = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.3.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 3).await;

    applier.open_gate(16);
    for handle in [first, second, third] {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
        assert!(matches!(err, Error::Apply { position: 1, total: 1, .. }));
    }

    // Only the address made it
    let current = reconciler.current();
    assert_eq!(current.addresses().len(), 1);
    assert!(current.routes().is_empty());
}

#[tokio::test]
async fn test_partial_failure_keeps_confirmed_prefix() {
    let applier = ScriptedApplier::new();
    let reconciler = Reconciler::new(applier.clone());

    let desired = tunnel("10.1.0.0/16")
        .rule(5270, |r| r.table(52))
        .unwrap()
        .dns("100.100.100.100".parse().unwrap());
    applier.fail(
        "+ rule pref 5270 from all lookup 52",
        ApplyError::permission_denied("operation not permitted"),
    );

    let err = reconciler.set_desired(desired.clone()).await.unwrap_err();
    assert!(err.is_permission_denied());
    assert!(matches!(err, Error::Apply { position: 3, total: 4, .. }));

    let current = reconciler.current();
    assert_eq!(current.addresses().len(), 1);
    assert_eq!(current.routes().len(), 1);
    assert!(current.rules().is_empty());
    assert!(current.dns_servers().is_empty());

    // Retrying only replays what is missing
    reconciler.set_desired(desired.clone()).await.unwrap();
    assert_eq!(reconciler.current(), desired);
    assert_eq!(
        &applier.calls()[3..],
        [
            "+ rule pref 5270 from all lookup 52",
            "~ dns 100.100.100.100",
        ]
    );
}

#[tokio::test]
async fn test_removal_of_missing_object_succeeds() {
    let applier = ScriptedApplier::new();
    let reconciler = Reconciler::new(applier.clone());
    reconciler.set_desired(tunnel("10.1.0.0/16")).await.unwrap();

    // Someone else deleted the interface and everything on it
    applier.fail(
        "- route 10.1.0.0/16 dev wg0",
        ApplyError::not_found("no such process"),
    );
    applier.fail(
        "- address 100.64.0.1/32 dev wg0",
        ApplyError::not_found("cannot assign requested address"),
    );

    reconciler.clear().await.unwrap();
    assert!(reconciler.current().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_queued_request_times_out() {
    let applier = ScriptedApplier::gated();
    let reconciler = Arc::new(Reconciler::new(applier.clone()));

    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.1.0.0/16")).await }
    });
    applier.wait_for_calls(1).await;

    let second = tokio::spawn({
        let reconciler = reconciler.clone();
        async move {
            reconciler
                .set_desired_with_timeout(tunnel("10.2.0.0/16"), Duration::from_millis(50))
                .await
        }
    });
    wait_for_generation(&reconciler, 2).await;

    // The first batch is stuck, so the clock runs out for the second
    let err = second.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Canceled { applied: 0, .. }));

    applier.open_gate(16);
    first.await.unwrap().unwrap();

    assert_eq!(reconciler.current(), tunnel("10.1.0.0/16"));
    assert!(!applier.calls().iter().any(|c| c.contains("10.2.0.0")));
}

#[tokio::test]
async fn test_plan_does_not_touch_the_platform() {
    let applier = ScriptedApplier::new();
    let reconciler = Reconciler::new(applier.clone());

    let plan = reconciler.plan(&tunnel("10.1.0.0/16").mtu("wg0", 1280));
    assert_eq!(plan.len(), 3);
    assert!(applier.calls().is_empty());
    assert!(reconciler.current().is_empty());

    reconciler.set_desired(NetworkConfig::new()).await.unwrap();
    assert!(applier.calls().is_empty());
    assert_eq!(reconciler.generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_withdrawn_request_hands_back_to_the_one_it_replaced() {
    let applier = ScriptedApplier::gated();
    let reconciler = Arc::new(Reconciler::new(applier.clone()));

    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.1.0.0/16")).await }
    });
    applier.wait_for_calls(1).await;

    let second = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.2.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 2).await;
    let third = tokio::spawn({
        let reconciler = reconciler.clone();
        async move {
            reconciler
                .set_desired_with_timeout(tunnel("10.3.0.0/16"), Duration::from_millis(50))
                .await
        }
    });
    wait_for_generation(&reconciler, 3).await;

    let err = third.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Canceled { applied: 0, total: 2 }));

    applier.open_gate(16);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(
        applier.calls(),
        [
            "+ address 100.64.0.1/32 dev wg0",
            "+ route 10.2.0.0/16 dev wg0",
        ]
    );
    assert_eq!(reconciler.current(), tunnel("10.2.0.0/16"));
}

#[tokio::test(start_paused = true)]
async fn test_preempted_caller_keeps_its_deadline() {
    let applier = ScriptedApplier::gated();
    let reconciler = Arc::new(Reconciler::new(applier.clone()));

    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move {
            reconciler
                .set_desired_with_timeout(tunnel("10.1.0.0/16"), Duration::from_millis(50))
                .await
        }
    });
    applier.wait_for_calls(1).await;

    let second = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.set_desired(tunnel("10.2.0.0/16")).await }
    });
    wait_for_generation(&reconciler, 2).await;

    // The address lands, then the newer request takes over and stalls
    applier.open_gate(1);
    applier.wait_for_calls(2).await;

    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Canceled { applied: 1, total: 2 }));
    assert!(!second.is_finished());

    applier.open_gate(16);
    second.await.unwrap().unwrap();

    assert_eq!(
        applier.calls(),
        [
            "+ address 100.64.0.1/32 dev wg0",
            "+ route 10.2.0.0/16 dev wg0",
        ]
    );
    assert_eq!(reconciler.current(), tunnel("10.2.0.0/16"));
    assert_eq!(reconciler.state(), ReconcilerState::Idle);
}
