//! Sending notifications from inside tokio runtimes
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::sync::Arc;

use httpmock::{Method::POST, MockServer};
use salesagent_webhooks::{NotificationService, ReceiverConfig};
use support::{Harness, report};
use tokio::runtime::{Builder, Runtime};

#[test]
fn test_send_from_spawned_task_on_multi_thread_runtime() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200);
    });

    // Built and dropped outside the runtime, the way a host owns it
    let harness = Arc::new(Harness::with_receivers([ReceiverConfig::new(
        server.url("/hook"),
    )]));

    let runtime = Runtime::new().unwrap();
    let task_harness = Arc::clone(&harness);
    let delivered = runtime
        .block_on(async move {
            tokio::spawn(async move {
                task_harness
                    .notifier
                    .send_delivery_notification(&report("mb_rt"))
            })
            .await
        })
        .expect("delivery task must not panic");
    drop(runtime);

    assert!(delivered);
    hook.assert_calls(1);
    assert_eq!(harness.notifier.sequence_store().sequence_number("mb_rt"), 1);
    assert_eq!(harness.notifier.failure_count("mb_rt"), 0);
}

#[test]
fn test_send_from_block_on_on_multi_thread_runtime() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200);
    });

    let harness = Harness::with_receivers([ReceiverConfig::new(server.url("/hook"))]);
    let runtime = Runtime::new().unwrap();

    let delivered = runtime.block_on(async {
        harness
            .notifier
            .send_delivery_notification(&report("mb_block_on"))
    });
    drop(runtime);

    assert!(delivered);
    hook.assert_calls(1);
}

#[test]
fn test_send_from_current_thread_runtime() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200);
    });

    let harness = Harness::with_receivers([ReceiverConfig::new(server.url("/hook"))]);
    let runtime = Builder::new_current_thread().enable_all().build().unwrap();

    let delivered = runtime.block_on(async {
        harness
            .notifier
            .send_delivery_notification(&report("mb_current"))
    });
    drop(runtime);

    assert!(delivered);
    hook.assert_calls(1);
    assert_eq!(
        harness.notifier.sequence_store().sequence_number("mb_current"),
        1
    );
}

#[test]
fn test_send_from_spawn_blocking_on_current_thread_runtime() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(503);
    });

    let harness = Arc::new(Harness::with_receivers([ReceiverConfig::new(
        server.url("/hook"),
    )]));

    let runtime = Builder::new_current_thread().enable_all().build().unwrap();
    let task_harness = Arc::clone(&harness);
    let task = runtime.spawn_blocking(move || {
        task_harness
            .notifier
            .send_delivery_notification(&report("mb_blocking"))
    });
    let delivered = runtime
        .block_on(task)
        .expect("blocking task must not panic");
    drop(runtime);

    assert!(!delivered);
    // Default of three attempts, all refused
    hook.assert_calls(3);
    assert_eq!(harness.notifier.failure_count("mb_blocking"), 1);
}
