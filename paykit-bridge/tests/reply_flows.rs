
use fixtures::{connected_pair, harness, TestPayload};
use paykit_bridge::{
    BridgeConfig, BridgeError, BridgeErrorKind, ConcurrentRequestPolicy, KnownChannel, ReplyState,
};
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_fetch_client_secret_round_trip() {
    let pair = connected_pair(BridgeConfig::relaxed());

    // The content side answers with a fixed secret.
    pair.content
        .host
        .install_with_reply(KnownChannel::FetchClientSecret, |_: Value| async {
            Ok("key_123".to_string())
        })
        .unwrap();

    let secret: String = pair
        .native
        .host
        .send_and_await_reply(KnownChannel::FetchClientSecret, &json!({}))
        .await
        .unwrap();

    assert_eq!(secret, "key_123");
    assert_eq!(
        pair.native.host.reply_state("fetchClientSecret"),
        ReplyState::Idle
    );
    assert!(pair.native.host.is_installed("fetchClientSecret_reply"));

    let metrics = pair.native.host.metrics();
    assert_eq!(metrics.replies_awaited, 1);
    assert_eq!(metrics.replies_resolved, 1);
    assert!(pair.native.analytics.events().is_empty());
    assert!(pair.content.analytics.events().is_empty());
}

#[tokio::test]
async fn test_content_awaits_native_reply() {
    let pair = connected_pair(BridgeConfig::relaxed());

    pair.native
        .host
        .install_with_reply(
            KnownChannel::FetchInitComponentProps,
            |request: TestPayload| async move {
                Ok(json!({"echo": request.param, "count": request.other_param + 1}))
            },
        )
        .unwrap();

    let reply: Value = pair
        .content
        .host
        .send_and_await_reply(
            "fetchInitComponentProps",
            &TestPayload {
                param: "payouts".into(),
                other_param: 41,
            },
        )
        .await
        .unwrap();

    assert_eq!(reply, json!({"echo": "payouts", "count": 42}));

    let replies = pair.native.view.posted_to("fetchInitComponentProps_reply");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].json(), json!({"result": {"echo": "payouts", "count": 42}}));
}

#[tokio::test]
async fn test_null_result_is_a_reply() {
    let pair = connected_pair(BridgeConfig::relaxed());
    pair.content
        .host
        .install_with_reply(KnownChannel::Logout, |_: Value| async {
            Ok(Option::<String>::None)
        })
        .unwrap();

    let reply: Option<String> = pair
        .native
        .host
        .send_and_await_reply(KnownChannel::Logout, &json!({}))
        .await
        .unwrap();
    assert_eq!(reply, None);
}

#[tokio::test]
async fn test_failing_handler_sends_error_envelope() {
    let pair = connected_pair(BridgeConfig::relaxed());
    pair.content
        .host
        .install_with_reply(KnownChannel::FetchInitParams, |_: Value| async {
            Err::<Value, _>(BridgeError::handler("no session"))
        })
        .unwrap();

    let err = pair
        .native
        .host
        .send_and_await_reply::<_, Value>(KnownChannel::FetchInitParams, &json!({}))
        .await
        .unwrap_err();

    match err {
        BridgeError::RemoteError { channel, message } => {
            assert_eq!(channel, "fetchInitParams");
            assert_eq!(message, "no session");
        }
        other => panic!("expected RemoteError, got {other:?}"),
    }
    assert!(pair
        .content
        .analytics
        .contains("fetchInitParams", BridgeErrorKind::ReplyHandlerFailed));
    assert_eq!(
        pair.native.host.reply_state("fetchInitParams"),
        ReplyState::Idle
    );
}

fn crash(_: Value) -> paykit_bridge::Result<Value> {
    panic!("handler crashed")
}

#[tokio::test]
async fn test_panicking_handler_sends_error_envelope() {
    let h = harness(BridgeConfig::relaxed());
    h.host
        .install_with_reply(KnownChannel::FetchInitParams, |request: Value| async move {
            crash(request)
        })
        .unwrap();

    h.host.receive("fetchInitParams", Some("{}"));
    h.view.wait_for_scripts(1).await;

    let replies = h.view.posted_to("fetchInitParams_reply");
    assert_eq!(replies.len(), 1);
    let message = replies[0].json()["error"]["message"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("panicked"), "{message}");
    assert!(h
        .analytics
        .contains("fetchInitParams", BridgeErrorKind::ReplyHandlerFailed));

    // The channel keeps answering.
    h.host.receive("fetchInitParams", Some("{}"));
    h.view.wait_for_scripts(2).await;
    assert_eq!(h.view.posted_to("fetchInitParams_reply").len(), 2);
}

#[tokio::test]
async fn test_undecodable_request_gets_error_envelope() {
    let h = harness(BridgeConfig::relaxed());
    h.host
        .install_with_reply("fetchInitComponentProps", |_: TestPayload| async {
            Ok(true)
        })
        .unwrap();

    h.host
        .receive("fetchInitComponentProps", Some(r#"{"param":1}"#));

    // Decode failures are answered synchronously.
    let replies = h.view.posted_to("fetchInitComponentProps_reply");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].json()["error"]["message"].is_string());
    assert!(h
        .analytics
        .contains("fetchInitComponentProps", BridgeErrorKind::DecodeFailed));
}

#[test]
fn test_reply_handler_without_runtime_answers_with_error() {
    let h = harness(BridgeConfig::relaxed());
    h.host
        .install_with_reply(KnownChannel::FetchClientSecret, |_: Value| async {
            Ok("unreachable".to_string())
        })
        .unwrap();

    h.host.receive("fetchClientSecret", Some("{}"));

    let replies = h.view.posted_to("fetchClientSecret_reply");
    assert_eq!(replies.len(), 1);
    let message = replies[0].json()["error"]["message"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("no async runtime"));
    assert!(h
        .analytics
        .contains("fetchClientSecret", BridgeErrorKind::ReplyHandlerFailed));
}

#[tokio::test]
async fn test_second_concurrent_request_is_rejected() {
    let h = harness(BridgeConfig::relaxed());
    let sender = h.host.sender();

    let first = tokio::spawn(async move {
        sender
            .send_and_await_reply::<_, String>("logout", &json!({}))
            .await
    });
    h.view.wait_for_scripts(1).await;
    assert_eq!(h.host.reply_state("logout"), ReplyState::Awaiting);

    let err = h
        .host
        .send_and_await_reply::<_, String>("logout", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::RequestInFlight(ref c) if c == "logout"));
    assert_eq!(h.view.posted_to("logout").len(), 1);

    assert!(h.host.receive("logout_reply", Some(r#"{"result":"bye"}"#)));
    assert_eq!(first.await.unwrap().unwrap(), "bye");
    assert_eq!(h.host.reply_state("logout"), ReplyState::Idle);
}

#[tokio::test]
async fn test_queue_policy_serialises_requests() {
    let h = harness(
        BridgeConfig::relaxed().with_concurrent_requests(ConcurrentRequestPolicy::Queue),
    );

    let spawn_request = |n: u32| {
        let sender = h.host.sender();
        tokio::spawn(async move {
            sender
                .send_and_await_reply::<_, u32>("fetchInitParams", &json!({ "n": n }))
                .await
        })
    };
    let first = spawn_request(1);
    h.view.wait_for_scripts(1).await;
    let second = spawn_request(2);

    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    // The second request waits behind the first without posting.
    assert_eq!(h.view.posted_to("fetchInitParams").len(), 1);

    h.host
        .receive("fetchInitParams_reply", Some(r#"{"result":10}"#));
    assert_eq!(first.await.unwrap().unwrap(), 10);

    h.view.wait_for_scripts(2).await;
    let posted = h.view.posted_to("fetchInitParams");
    assert_eq!(posted[1].json(), json!({"n": 2}));

    h.host
        .receive("fetchInitParams_reply", Some(r#"{"result":20}"#));
    assert_eq!(second.await.unwrap().unwrap(), 20);
}

#[tokio::test]
async fn test_queue_survives_unregister() {
    let h = harness(
        BridgeConfig::relaxed()
            .with_reply_timeout(None)
            .with_concurrent_requests(ConcurrentRequestPolicy::Queue),
    );

    let spawn_request = |n: u32| {
        let sender = h.host.sender();
        tokio::spawn(async move {
            sender
                .send_and_await_reply::<_, u32>("fetchInitParams", &json!({ "n": n }))
                .await
        })
    };
    let first = spawn_request(1);
    h.view.wait_for_scripts(1).await;
    let second = spawn_request(2);
    tokio::task::yield_now().await;

    h.host.unregister("fetchInitParams").unwrap();
    assert!(matches!(first.await.unwrap(), Err(BridgeError::Cancelled(_))));

    // The queued request goes out and reinstalls its reply receiver.
    h.view.wait_for_scripts(2).await;
    assert!(h.host.is_installed("fetchInitParams_reply"));

    // A new caller still queues behind it instead of being rejected.
    let third = spawn_request(3);
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(!third.is_finished());
    assert_eq!(h.view.posted_to("fetchInitParams").len(), 2);

    h.host
        .receive("fetchInitParams_reply", Some(r#"{"result":20}"#));
    assert_eq!(second.await.unwrap().unwrap(), 20);

    h.view.wait_for_scripts(3).await;
    assert_eq!(
        h.view.posted_to("fetchInitParams")[2].json(),
        json!({"n": 3})
    );
    h.host
        .receive("fetchInitParams_reply", Some(r#"{"result":30}"#));
    assert_eq!(third.await.unwrap().unwrap(), 30);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_frees_the_slot() {
    let h = harness(BridgeConfig::relaxed().with_reply_timeout(Some(Duration::from_millis(50))));

    let err = h
        .host
        .send_and_await_reply::<_, String>(KnownChannel::Logout, &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::ReplyTimeout { timeout_ms: 50, .. }));
    assert!(err.is_retryable());
    assert_eq!(h.host.reply_state("logout"), ReplyState::Idle);
    assert!(h
        .analytics
        .contains("logout", BridgeErrorKind::ReplyTimeout));

    // A reply that arrives after the timeout has nobody to go to.
    h.host.receive("logout_reply", Some(r#"{"result":"late"}"#));
    assert!(h
        .analytics
        .contains("logout", BridgeErrorKind::UnsolicitedReply));

    // The channel accepts a new request.
    let sender = h.host.sender();
    let retry = tokio::spawn(async move {
        sender
            .send_and_await_reply::<_, String>(KnownChannel::Logout, &json!({}))
            .await
    });
    h.view.wait_for_scripts(2).await;
    h.host.receive("logout_reply", Some(r#"{"result":"ok"}"#));
    assert_eq!(retry.await.unwrap().unwrap(), "ok");

    let metrics = h.host.metrics();
    assert_eq!(metrics.reply_timeouts, 1);
    assert_eq!(metrics.unsolicited_replies, 1);
}

#[tokio::test]
async fn test_teardown_cancels_pending_reply() {
    let h = harness(BridgeConfig::relaxed().with_reply_timeout(None));
    let sender = h.host.sender();

    let pending = tokio::spawn(async move {
        sender
            .send_and_await_reply::<_, String>(KnownChannel::FetchClientSecret, &json!({}))
            .await
    });
    h.view.wait_for_scripts(1).await;

    h.host.teardown();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, BridgeError::Cancelled(ref c) if c == "fetchClientSecret"));
    assert!(h
        .analytics
        .contains("fetchClientSecret", BridgeErrorKind::ReplyCancelled));
    assert!(h.view.installed_handlers().is_empty());
}

#[tokio::test]
async fn test_dropping_host_cancels_pending_reply() {
    let h = harness(BridgeConfig::relaxed().with_reply_timeout(None));
    let sender = h.host.sender();

    let pending = tokio::spawn(async move {
        sender
            .send_and_await_reply::<_, String>("fetchInitParams", &json!({}))
            .await
    });
    h.view.wait_for_scripts(1).await;

    drop(h.host);

    assert!(matches!(
        pending.await.unwrap(),
        Err(BridgeError::Cancelled(_))
    ));
}

#[tokio::test]
async fn test_unregister_cancels_and_allows_reuse() {
    let h = harness(BridgeConfig::relaxed().with_reply_timeout(None));
    let sender = h.host.sender();

    let pending = tokio::spawn(async move {
        sender
            .send_and_await_reply::<_, String>("logout", &json!({}))
            .await
    });
    h.view.wait_for_scripts(1).await;
    assert!(h.host.is_installed("logout_reply"));

    // Only the reply receiver was installed, so no feature handler is removed.
    assert!(!h.host.unregister("logout").unwrap());
    assert!(matches!(
        pending.await.unwrap(),
        Err(BridgeError::Cancelled(_))
    ));
    assert!(!h.host.is_installed("logout_reply"));

    let sender = h.host.sender();
    let again = tokio::spawn(async move {
        sender
            .send_and_await_reply::<_, String>("logout", &json!({}))
            .await
    });
    h.view.wait_for_scripts(2).await;
    h.host
        .receive("logout_reply", Some(r#"{"result":"again"}"#));
    assert_eq!(again.await.unwrap().unwrap(), "again");
}

#[tokio::test]
async fn test_dropped_waiter_frees_the_slot() {
    let h = harness(BridgeConfig::relaxed().with_reply_timeout(None));

    let request = json!({});
    let wait = h.host.send_and_await_reply::<_, String>("logout", &request);
    let outcome = tokio::time::timeout(Duration::from_millis(10), wait).await;
    assert!(outcome.is_err());

    assert_eq!(h.host.reply_state("logout"), ReplyState::Idle);
    assert!(h
        .analytics
        .contains("logout", BridgeErrorKind::ReplyCancelled));
    assert_eq!(h.host.metrics().reply_cancellations, 1);
}

#[tokio::test]
async fn test_malformed_and_remote_error_replies() {
    let h = harness(BridgeConfig::relaxed());

    for (reply, expect_remote) in [
        (r#""key_123""#, false),
        (r#"{"error":{"message":"nope"}}"#, true),
    ] {
        let sender = h.host.sender();
        let pending = tokio::spawn(async move {
            sender
                .send_and_await_reply::<_, String>("fetchClientSecret", &json!({}))
                .await
        });
        let seen = h.view.scripts().len();
        h.view.wait_for_scripts(seen + 1).await;
        h.host.receive("fetchClientSecret_reply", Some(reply));

        let err = pending.await.unwrap().unwrap_err();
        if expect_remote {
            assert!(
                matches!(err, BridgeError::RemoteError { ref message, .. } if message == "nope")
            );
        } else {
            assert!(matches!(err, BridgeError::ReplyDecode(_)));
        }
    }
    assert_eq!(h.analytics.count(BridgeErrorKind::ReplyDecodeFailed), 1);
}
