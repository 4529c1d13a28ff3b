//! Setter multiplexing.
//!
//! The content reports many different callbacks (`setOnExit`,
//! `setOnLoadError`, ...) over one channel, each as
//! `{"setter": <name>, "values": <json>}`. A [`SetterChannel`] routes every
//! event to the sub-handler registered for its setter name and silently
//! ignores setters it does not know, so newer web content keeps working
//! against older SDKs.

use crate::channel::{ChannelName, IntoChannelName};
use crate::codec;
use crate::handler::{HandlerContext, MessageHandler};
use crate::{DecodingError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// One setter invocation posted by the content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetterEvent {
    /// Name of the setter being invoked.
    pub setter: String,
    /// Setter arguments, absent for payload-less setters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

/// Setters the native SDK ships handlers for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KnownSetter {
    SetOnLoadError,
    SetOnLoaderStart,
    SetOnExit,
    SetOnNotificationsChange,
    SetOnPayoutsChange,
    /// Anything else, typically from newer web content.
    Unrecognized(String),
}

impl KnownSetter {
    /// The wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SetOnLoadError => "setOnLoadError",
            Self::SetOnLoaderStart => "setOnLoaderStart",
            Self::SetOnExit => "setOnExit",
            Self::SetOnNotificationsChange => "setOnNotificationsChange",
            Self::SetOnPayoutsChange => "setOnPayoutsChange",
            Self::Unrecognized(name) => name,
        }
    }
}

impl From<&str> for KnownSetter {
    fn from(name: &str) -> Self {
        match name {
            "setOnLoadError" => Self::SetOnLoadError,
            "setOnLoaderStart" => Self::SetOnLoaderStart,
            "setOnExit" => Self::SetOnExit,
            "setOnNotificationsChange" => Self::SetOnNotificationsChange,
            "setOnPayoutsChange" => Self::SetOnPayoutsChange,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl From<KnownSetter> for String {
    fn from(setter: KnownSetter) -> Self {
        match setter {
            KnownSetter::Unrecognized(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for KnownSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of dispatching one setter event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetterOutcome {
    /// A sub-handler ran.
    Dispatched,
    /// No sub-handler is registered for this setter.
    Ignored(KnownSetter),
}

type SetterFn = Box<dyn Fn(&str, Value) -> std::result::Result<(), DecodingError> + Send + Sync>;

/// A channel carrying many setters, each with its own payload type.
///
/// ```rust
/// use paykit_bridge::setter::{KnownSetter, SetterChannel};
/// use paykit_bridge::KnownChannel;
///
/// let channel = SetterChannel::new(KnownChannel::OnSetterFunctionCalled)
///     .unwrap()
///     .on_empty(KnownSetter::SetOnLoaderStart, || {})
///     .on(KnownSetter::SetOnLoadError, |error: serde_json::Value| {
///         let _ = error;
///     });
/// assert_eq!(channel.setters(), vec!["setOnLoadError", "setOnLoaderStart"]);
/// ```
pub struct SetterChannel {
    channel: ChannelName,
    setters: HashMap<String, SetterFn>,
}

impl SetterChannel {
    /// Create an empty setter channel.
    pub fn new(channel: impl IntoChannelName) -> Result<Self> {
        Ok(Self {
            channel: channel.into_channel_name()?,
            setters: HashMap::new(),
        })
    }

    /// Register a setter whose `values` decode into `T`.
    ///
    /// Absent `values` decode as `null`, so use `Option<T>` for setters
    /// that may omit them.
    ///
    /// # Panics
    ///
    /// Panics if `setter` is already registered.
    pub fn on<T, F>(self, setter: impl Into<String>, callback: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.insert(
            setter.into(),
            Box::new(move |channel, values| {
                callback(codec::decode_value::<T>(channel, values)?);
                Ok(())
            }),
        )
    }

    /// Register a setter that carries no values.
    ///
    /// # Panics
    ///
    /// Panics if `setter` is already registered.
    pub fn on_empty<F>(self, setter: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.insert(
            setter.into(),
            Box::new(move |_, _| {
                callback();
                Ok(())
            }),
        )
    }

    fn insert(mut self, setter: String, f: SetterFn) -> Self {
        assert!(
            !self.setters.contains_key(&setter),
            "setter `{setter}` registered twice on `{}`",
            self.channel
        );
        self.setters.insert(setter, f);
        self
    }

    /// The channel this multiplexer is installed on.
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Registered setter names, sorted.
    pub fn setters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.setters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Route one event to its sub-handler.
    pub fn dispatch(
        &self,
        event: SetterEvent,
    ) -> std::result::Result<SetterOutcome, DecodingError> {
        let Some(handler) = self.setters.get(&event.setter) else {
            return Ok(SetterOutcome::Ignored(KnownSetter::from(event.setter.as_str())));
        };

        handler(self.channel.as_str(), event.values.unwrap_or(Value::Null)).map_err(|err| {
            DecodingError::new(
                err.channel,
                err.raw,
                format!("setter {}: {}", event.setter, err.reason),
            )
        })?;
        Ok(SetterOutcome::Dispatched)
    }
}

impl MessageHandler for SetterChannel {
    fn channel(&self) -> &ChannelName {
        &self.channel
    }

    fn handle(&self, ctx: &HandlerContext<'_>, body: Option<&str>) {
        let event: SetterEvent = match codec::decode(self.channel.as_str(), body.unwrap_or("null"))
        {
            Ok(event) => event,
            Err(err) => {
                ctx.report_decode_error(&err);
                return;
            }
        };

        match self.dispatch(event) {
            Ok(SetterOutcome::Dispatched) => {}
            Ok(SetterOutcome::Ignored(setter)) => {
                tracing::debug!(
                    channel = %self.channel,
                    setter = %setter,
                    "ignoring unrecognized setter"
                );
                ctx.metrics().record_unknown_setter();
            }
            Err(err) => ctx.report_decode_error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn event(setter: &str, values: Option<Value>) -> SetterEvent {
        SetterEvent {
            setter: setter.to_string(),
            values,
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let parsed: SetterEvent = serde_json::from_str(r#"{"setter":"setOnExit"}"#).unwrap();
        assert_eq!(parsed, event("setOnExit", None));

        let encoded = serde_json::to_string(&event("setOnExit", None)).unwrap();
        assert_eq!(encoded, r#"{"setter":"setOnExit"}"#);
    }

    #[test]
    fn test_routes_to_registered_setter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let exits = Arc::new(Mutex::new(0));

        let channel = SetterChannel::new("onSetterFunctionCalled")
            .unwrap()
            .on(KnownSetter::SetOnLoadError, {
                let seen = seen.clone();
                move |error: Value| seen.lock().unwrap().push(error)
            })
            .on_empty(KnownSetter::SetOnExit, {
                let exits = exits.clone();
                move || *exits.lock().unwrap() += 1
            });

        let outcome = channel
            .dispatch(event("setOnLoadError", Some(json!({"type": "auth"}))))
            .unwrap();
        assert_eq!(outcome, SetterOutcome::Dispatched);
        channel.dispatch(event("setOnExit", None)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!({"type": "auth"})]);
        assert_eq!(*exits.lock().unwrap(), 1);
    }

    #[test]
    fn test_unknown_setter_is_ignored() {
        let channel = SetterChannel::new("onSetterFunctionCalled")
            .unwrap()
            .on_empty(KnownSetter::SetOnExit, || {});

        let outcome = channel.dispatch(event("setOnSomethingNew", None)).unwrap();
        assert_eq!(
            outcome,
            SetterOutcome::Ignored(KnownSetter::Unrecognized("setOnSomethingNew".into()))
        );

        let outcome = channel.dispatch(event("setOnPayoutsChange", None)).unwrap();
        assert_eq!(outcome, SetterOutcome::Ignored(KnownSetter::SetOnPayoutsChange));
    }

    #[test]
    fn test_absent_values_decode_as_none() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let channel = SetterChannel::new("onSetterFunctionCalled")
            .unwrap()
            .on("setOnNotificationsChange", {
                let seen = seen.clone();
                move |count: Option<u32>| seen.lock().unwrap().push(count)
            });

        channel
            .dispatch(event("setOnNotificationsChange", None))
            .unwrap();
        channel
            .dispatch(event("setOnNotificationsChange", Some(json!(3))))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![None, Some(3)]);
    }

    #[test]
    fn test_bad_values_name_the_setter() {
        let channel = SetterChannel::new("onSetterFunctionCalled")
            .unwrap()
            .on("setOnNotificationsChange", |_: u32| {});

        let err = channel
            .dispatch(event("setOnNotificationsChange", Some(json!("many"))))
            .unwrap_err();
        assert_eq!(err.channel, "onSetterFunctionCalled");
        assert!(err.reason.starts_with("setter setOnNotificationsChange:"));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_setter_panics() {
        let _ = SetterChannel::new("onSetterFunctionCalled")
            .unwrap()
            .on_empty("setOnExit", || {})
            .on_empty("setOnExit", || {});
    }

    #[test]
    fn test_known_setter_round_trip() {
        for name in [
            "setOnLoadError",
            "setOnLoaderStart",
            "setOnExit",
            "setOnNotificationsChange",
            "setOnPayoutsChange",
        ] {
            let setter = KnownSetter::from(name);
            assert!(!matches!(setter, KnownSetter::Unrecognized(_)));
            assert_eq!(String::from(setter), name);
        }
    }
}
