//! The platform web view, as seen by the bridge.
//!
//! Swift and Kotlin hosts implement [`ContentView`] on top of `WKWebView`
//! or `android.webkit.WebView`. Both primitives are main-thread bound on
//! every platform; implementations must hop to the main thread themselves
//! when called from elsewhere (reply handlers finish on runtime threads).

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An isolated script execution context inside the web view.
///
/// Page script runs in the default context; bridge shims and every script
/// the bridge evaluates run in a dedicated one so page script can neither
/// forge replies nor observe reply channels.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentWorld {
    name: String,
}

impl ContentWorld {
    /// A named content world.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The world's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for ContentWorld {
    fn default() -> Self {
        Self::new("paykitBridge")
    }
}

impl fmt::Display for ContentWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Message delivery and script evaluation primitives of the web view.
pub trait ContentView: Send + Sync {
    /// Evaluate `script` in `world`. Fire and forget.
    fn evaluate_script(&self, script: &str, world: &ContentWorld) -> Result<()>;

    /// Start delivering messages posted to `channel` from `world`.
    fn add_message_handler(&self, channel: &str, world: &ContentWorld) -> Result<()>;

    /// Stop delivering messages posted to `channel` from `world`.
    fn remove_message_handler(&self, channel: &str, world: &ContentWorld);
}
