//! Content View FFI
//!
//! The platform side of the bridge. Swift implements [`ContentViewCallback`]
//! on top of `WKWebView`, Kotlin on top of `android.webkit.WebView`:
//!
//! ```swift
//! class ConnectWebView: ContentViewCallback {
//!     let webView: WKWebView
//!
//!     func evaluateScript(script: String, contentWorld: String) -> ContentViewResult {
//!         DispatchQueue.main.async {
//!             self.webView.evaluateJavaScript(script, in: nil, in: .world(name: contentWorld))
//!         }
//!         return ContentViewResult.ok()
//!     }
//!     // ... add/remove message handlers via WKUserContentController
//! }
//! ```

use paykit_bridge::{BridgeError, ContentView, ContentWorld};

/// Outcome of a content view operation.
#[derive(Clone, Debug, uniffi::Record)]
pub struct ContentViewResult {
    pub success: bool,
    pub error: Option<String>,
}

impl ContentViewResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn err(message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
        }
    }

    fn into_result(self, operation: &str) -> paykit_bridge::Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(BridgeError::content_view(
                self.error.unwrap_or_else(|| format!("{operation} failed")),
            ))
        }
    }
}

/// Web view primitives implemented by the platform.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync). `evaluate_script` is
/// called from runtime threads when a reply handler finishes and must hop to
/// the main thread itself.
#[uniffi::export(callback_interface)]
pub trait ContentViewCallback: Send + Sync {
    /// Evaluate `script` in the named content world. Fire and forget.
    fn evaluate_script(&self, script: String, content_world: String) -> ContentViewResult;

    /// Start delivering messages posted to `channel` from the content world.
    fn add_message_handler(&self, channel: String, content_world: String) -> ContentViewResult;

    /// Stop delivering messages posted to `channel`.
    fn remove_message_handler(&self, channel: String, content_world: String);
}

/// Adapts a platform callback to the bridge's [`ContentView`].
pub(crate) struct CallbackContentView {
    callback: Box<dyn ContentViewCallback>,
}

impl CallbackContentView {
    pub(crate) fn new(callback: Box<dyn ContentViewCallback>) -> Self {
        Self { callback }
    }
}

impl ContentView for CallbackContentView {
    fn evaluate_script(&self, script: &str, world: &ContentWorld) -> paykit_bridge::Result<()> {
        self.callback
            .evaluate_script(script.to_string(), world.name().to_string())
            .into_result("evaluate_script")
    }

    fn add_message_handler(
        &self,
        channel: &str,
        world: &ContentWorld,
    ) -> paykit_bridge::Result<()> {
        self.callback
            .add_message_handler(channel.to_string(), world.name().to_string())
            .into_result("add_message_handler")
    }

    fn remove_message_handler(&self, channel: &str, world: &ContentWorld) {
        self.callback
            .remove_message_handler(channel.to_string(), world.name().to_string());
    }
}
