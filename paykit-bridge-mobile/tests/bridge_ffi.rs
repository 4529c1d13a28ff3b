//! Integration tests for the bridge FFI layer.
//!
//! A Rust `FakeWebView` stands in for the Swift/Kotlin web view. It records
//! evaluated scripts and can answer requests by calling back into the host,
//! the way page JavaScript would.

use paykit_bridge::testing::PostedMessage;
use paykit_bridge_mobile::*;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Fake web view
// ============================================================================

#[derive(Default)]
struct FakeWebView {
    scripts: Mutex<Vec<(String, String)>>,
    handlers: Mutex<BTreeSet<String>>,
    removed: Mutex<Vec<String>>,
    /// Envelopes the page posts back when native sends on a channel.
    auto_replies: Mutex<HashMap<String, Value>>,
    fail_evaluation: Mutex<bool>,
    host: OnceLock<Weak<BridgeHostFFI>>,
}

impl FakeWebView {
    fn attach(&self, host: &Arc<BridgeHostFFI>) {
        let _ = self.host.set(Arc::downgrade(host));
    }

    fn reply_with(&self, channel: &str, envelope: Value) {
        self.auto_replies
            .lock()
            .unwrap()
            .insert(channel.to_string(), envelope);
    }

    fn posted(&self) -> Vec<PostedMessage> {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(script, _)| PostedMessage::parse(script))
            .collect()
    }

    fn posted_to(&self, channel: &str) -> Vec<PostedMessage> {
        self.posted()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }

    fn wait_for_post(&self, channel: &str) -> PostedMessage {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(message) = self.posted_to(channel).pop() {
                return message;
            }
            assert!(Instant::now() < deadline, "nothing posted to {channel}");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// What the host holds; the test keeps its own `Arc` to inspect.
struct WebViewHandle(Arc<FakeWebView>);

impl ContentViewCallback for WebViewHandle {
    fn evaluate_script(&self, script: String, content_world: String) -> ContentViewResult {
        let view = &self.0;
        if *view.fail_evaluation.lock().unwrap() {
            return ContentViewResult::err("web view is gone".to_string());
        }
        view.scripts
            .lock()
            .unwrap()
            .push((script.clone(), content_world));

        let Some(message) = PostedMessage::parse(&script) else {
            return ContentViewResult::ok();
        };
        let envelope = view
            .auto_replies
            .lock()
            .unwrap()
            .get(&message.channel)
            .cloned();
        let host = view.host.get().and_then(Weak::upgrade);
        if let (Some(envelope), Some(host)) = (envelope, host) {
            host.receive(
                format!("{}_reply", message.channel),
                Some(envelope.to_string()),
            );
        }
        ContentViewResult::ok()
    }

    fn add_message_handler(&self, channel: String, _content_world: String) -> ContentViewResult {
        self.0.handlers.lock().unwrap().insert(channel);
        ContentViewResult::ok()
    }

    fn remove_message_handler(&self, channel: String, _content_world: String) {
        self.0.handlers.lock().unwrap().remove(&channel);
        self.0.removed.lock().unwrap().push(channel);
    }
}

fn bridge_with(config: BridgeConfigFFI) -> (Arc<BridgeHostFFI>, Arc<FakeWebView>) {
    let view = Arc::new(FakeWebView::default());
    let host = BridgeHostFFI::new(Box::new(WebViewHandle(Arc::clone(&view))), config).unwrap();
    view.attach(&host);
    (host, view)
}

fn bridge() -> (Arc<BridgeHostFFI>, Arc<FakeWebView>) {
    bridge_with(default_bridge_config())
}

// ============================================================================
// Callbacks
// ============================================================================

#[derive(Clone, Default)]
struct RecordingMessages(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl JsonMessageCallback for RecordingMessages {
    fn on_message(&self, channel: String, body: Option<String>) {
        self.0.lock().unwrap().push((channel, body));
    }
}

struct FixedReply(JsonReplyResult);

impl JsonReplyCallback for FixedReply {
    fn on_request(&self, _channel: String, _request_json: String) -> JsonReplyResult {
        self.0.clone()
    }
}

#[derive(Clone, Default)]
struct RecordingSetters(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl SetterCallback for RecordingSetters {
    fn on_setter(&self, setter: String, values_json: Option<String>) {
        self.0.lock().unwrap().push((setter, values_json));
    }
}

struct ChannelResult(Mutex<mpsc::Sender<std::result::Result<String, (i32, String)>>>);

impl ReplyResultCallback for ChannelResult {
    fn on_success(&self, result_json: String) {
        let _ = self.0.lock().unwrap().send(Ok(result_json));
    }

    fn on_error(&self, code: i32, message: String) {
        let _ = self.0.lock().unwrap().send(Err((code, message)));
    }
}

// ============================================================================
// Outbound
// ============================================================================

#[test]
fn test_send_json_posts_to_channel() {
    let (host, view) = bridge();

    host.send_json("debug".into(), r#"{"message":"hi"}"#.into())
        .unwrap();

    let posted = view.posted_to("debug");
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].json(), json!({"message": "hi"}));

    let scripts = view.scripts.lock().unwrap();
    assert_eq!(scripts[0].1, default_bridge_config().content_world);
    drop(scripts);

    assert_eq!(host.metrics().messages_sent, 1);
}

#[test]
fn test_send_json_rejects_invalid_input() {
    let (host, view) = bridge();

    let result = host.send_json("debug".into(), "{not json".into());
    assert!(matches!(result, Err(BridgeMobileError::Validation { .. })));

    let result = host.send_json("bad name!".into(), "{}".into());
    assert!(matches!(result, Err(BridgeMobileError::Channel { .. })));

    assert!(view.posted().is_empty());
}

#[test]
fn test_content_view_failure_is_reported() {
    let (host, view) = bridge();
    *view.fail_evaluation.lock().unwrap() = true;

    let result = host.send_json("debug".into(), "{}".into());
    assert!(matches!(
        result,
        Err(BridgeMobileError::ContentView { ref msg }) if msg.contains("web view is gone")
    ));
}

// ============================================================================
// Inbound
// ============================================================================

#[test]
fn test_receive_delivers_raw_body() {
    let (host, view) = bridge();
    let messages = RecordingMessages::default();

    host.install_channel("pageDidLoad".into(), Box::new(messages.clone()))
        .unwrap();
    assert!(view.handlers.lock().unwrap().contains("pageDidLoad"));
    assert!(host.is_installed("pageDidLoad".into()));

    assert!(host.receive("pageDidLoad".into(), Some(r#"{"pageViewId":"abc"}"#.into())));
    assert!(host.receive("pageDidLoad".into(), None));
    assert!(!host.receive("neverInstalled".into(), Some("{}".into())));

    assert_eq!(
        *messages.0.lock().unwrap(),
        vec![
            (
                "pageDidLoad".to_string(),
                Some(r#"{"pageViewId":"abc"}"#.to_string())
            ),
            ("pageDidLoad".to_string(), None),
        ]
    );
    assert_eq!(host.metrics().unknown_channels, 1);
}

#[test]
fn test_duplicate_and_reserved_channels_are_errors() {
    let (host, _view) = bridge();

    host.install_channel("debug".into(), Box::new(RecordingMessages::default()))
        .unwrap();
    let duplicate = host.install_channel("debug".into(), Box::new(RecordingMessages::default()));
    assert!(matches!(duplicate, Err(BridgeMobileError::Channel { .. })));

    let reserved =
        host.install_channel("logout_reply".into(), Box::new(RecordingMessages::default()));
    assert!(matches!(reserved, Err(BridgeMobileError::Channel { .. })));

    assert_eq!(host.installed_channels(), vec!["debug".to_string()]);
}

#[test]
fn test_reply_channel_answers_content() {
    let (host, view) = bridge();

    host.install_reply_channel(
        "fetchClientSecret".into(),
        Box::new(FixedReply(JsonReplyResult::ok(r#""key_123""#.into()))),
    )
    .unwrap();

    assert!(host.receive("fetchClientSecret".into(), Some("{}".into())));

    let reply = view.wait_for_post("fetchClientSecret_reply");
    assert_eq!(reply.json(), json!({"result": "key_123"}));
}

#[test]
fn test_reply_channel_forwards_errors() {
    let (host, view) = bridge();

    host.install_reply_channel(
        "fetchInitParams".into(),
        Box::new(FixedReply(JsonReplyResult::err("not signed in".into()))),
    )
    .unwrap();
    host.install_reply_channel(
        "fetchInitComponentProps".into(),
        Box::new(FixedReply(JsonReplyResult::ok("{broken".into()))),
    )
    .unwrap();

    host.receive("fetchInitParams".into(), None);
    host.receive("fetchInitComponentProps".into(), None);

    let reply = view.wait_for_post("fetchInitParams_reply");
    assert_eq!(reply.json(), json!({"error": {"message": "not signed in"}}));

    let reply = view.wait_for_post("fetchInitComponentProps_reply");
    let message = reply.json()["error"]["message"].as_str().unwrap().to_string();
    assert!(message.contains("not valid JSON"), "{message}");
}

#[test]
fn test_setter_channel_dispatches_listed_setters() {
    let (host, _view) = bridge();
    let setters = RecordingSetters::default();

    host.install_setter_channel(
        "onSetterFunctionCalled".into(),
        vec!["setOnLoadError".into(), "setOnExit".into()],
        Box::new(setters.clone()),
    )
    .unwrap();

    let post = |body: Value| host.receive("onSetterFunctionCalled".into(), Some(body.to_string()));
    post(json!({"setter": "setOnExit"}));
    post(json!({"setter": "setOnLoadError", "values": {"error": "auth"}}));
    post(json!({"setter": "setOnPayoutsChange", "values": 1}));

    let calls = setters.0.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], ("setOnExit".to_string(), None));
    assert_eq!(calls[1].0, "setOnLoadError");
    let values: Value = serde_json::from_str(calls[1].1.as_deref().unwrap()).unwrap();
    assert_eq!(values, json!({"error": "auth"}));
    assert_eq!(host.metrics().unknown_setters, 1);
}

#[test]
fn test_setter_channel_rejects_duplicate_setters() {
    let (host, _view) = bridge();

    let result = host.install_setter_channel(
        "onSetterFunctionCalled".into(),
        vec!["setOnExit".into(), "setOnExit".into()],
        Box::new(RecordingSetters::default()),
    );
    assert!(matches!(result, Err(BridgeMobileError::Validation { .. })));
    assert!(!host.is_installed("onSetterFunctionCalled".into()));
}

// ============================================================================
// Native awaits content
// ============================================================================

#[test]
fn test_send_and_await_reply_json() {
    let (host, view) = bridge();
    view.reply_with("logout", json!({"result": {"loggedOut": true}}));

    let reply = host
        .send_and_await_reply_json("logout".into(), "{}".into())
        .unwrap();

    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply, json!({"loggedOut": true}));
    assert!(view.handlers.lock().unwrap().contains("logout_reply"));
    assert_eq!(host.reply_state("logout".into()), ReplyStateFFI::Idle);

    let metrics = host.metrics();
    assert_eq!(metrics.replies_awaited, 1);
    assert_eq!(metrics.replies_resolved, 1);
}

#[test]
fn test_send_and_await_reply_remote_error() {
    let (host, view) = bridge();
    view.reply_with("logout", json!({"error": {"message": "no session"}}));

    let result = host.send_and_await_reply_json("logout".into(), "{}".into());
    assert!(matches!(
        result,
        Err(BridgeMobileError::Remote { ref msg }) if msg == "no session"
    ));
}

#[test]
fn test_send_and_await_reply_times_out() {
    let (host, _view) = bridge_with(BridgeConfigFFI {
        reply_timeout_ms: Some(50),
        ..default_bridge_config()
    });

    let result = host.send_and_await_reply_json("logout".into(), "{}".into());
    assert!(matches!(result, Err(BridgeMobileError::ReplyTimeout { .. })));
    assert_eq!(host.metrics().reply_timeouts, 1);
    assert_eq!(host.reply_state("logout".into()), ReplyStateFFI::Idle);
}

#[test]
fn test_send_and_await_reply_async_reports_through_callback() {
    let (host, view) = bridge();
    view.reply_with("fetchInitComponentProps", json!({"result": [1, 2]}));

    let (tx, rx) = mpsc::channel();
    host.send_and_await_reply_async(
        "fetchInitComponentProps".into(),
        "{}".into(),
        Box::new(ChannelResult(Mutex::new(tx.clone()))),
    );
    let reply = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(serde_json::from_str::<Value>(&reply).unwrap(), json!([1, 2]));

    host.send_and_await_reply_async(
        "fetchInitComponentProps".into(),
        "{oops".into(),
        Box::new(ChannelResult(Mutex::new(tx))),
    );
    let (code, _) = rx
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap_err();
    assert_eq!(code, 1001);
}

#[test]
fn test_teardown_cancels_pending_request() {
    let (host, view) = bridge();

    let (tx, rx) = mpsc::channel();
    host.send_and_await_reply_async(
        "logout".into(),
        "{}".into(),
        Box::new(ChannelResult(Mutex::new(tx))),
    );
    view.wait_for_post("logout");
    assert_eq!(host.reply_state("logout".into()), ReplyStateFFI::Awaiting);

    host.teardown();

    let (code, _) = rx
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap_err();
    assert_eq!(code, 3004);
    assert!(!host.is_open());
    assert!(host.installed_channels().is_empty());
    assert!(view
        .removed
        .lock()
        .unwrap()
        .contains(&"logout_reply".to_string()));

    let result = host.send_json("debug".into(), "{}".into());
    assert!(matches!(result, Err(BridgeMobileError::Closed { .. })));
}

#[test]
fn test_unregister() {
    let (host, view) = bridge();

    host.install_channel("debug".into(), Box::new(RecordingMessages::default()))
        .unwrap();
    assert!(host.unregister("debug".into()).unwrap());
    assert!(!host.unregister("debug".into()).unwrap());
    assert!(!view.handlers.lock().unwrap().contains("debug"));
    assert!(!host.receive("debug".into(), None));
}
