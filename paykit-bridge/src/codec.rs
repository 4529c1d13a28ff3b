//! Payload codec.
//!
//! Inbound messages arrive as JSON strings and are decoded into the shape a
//! channel expects. Outbound messages can only travel as a script statement,
//! so the JSON is encoded a second time into a JavaScript string literal
//! that the content side re-parses.

use crate::{BridgeError, DecodingError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a payload to a JSON string.
pub fn encode_json<T: Serialize + ?Sized>(channel: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| BridgeError::Encoding {
        channel: channel.to_string(),
        reason: e.to_string(),
    })
}

/// Wrap a JSON string as a JavaScript string literal.
///
/// U+2028 and U+2029 are valid inside JSON strings but terminate a line in
/// pre-ES2019 JavaScript, so they are escaped explicitly.
pub fn encode_js_literal(json: &str) -> String {
    Value::String(json.to_owned())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Serialize a payload and wrap it as a JavaScript string literal.
pub fn encode<T: Serialize + ?Sized>(channel: &str, value: &T) -> Result<String> {
    encode_json(channel, value).map(|json| encode_js_literal(&json))
}

/// Decode an inbound JSON string into the type a channel expects.
///
/// Unknown fields are ignored; missing required fields fail.
pub fn decode<T: DeserializeOwned>(
    channel: &str,
    raw: &str,
) -> std::result::Result<T, DecodingError> {
    serde_json::from_str(raw).map_err(|e| DecodingError::new(channel, raw, e.to_string()))
}

/// Decode an already parsed JSON value.
pub fn decode_value<T: DeserializeOwned>(
    channel: &str,
    value: Value,
) -> std::result::Result<T, DecodingError> {
    let raw = value.to_string();
    serde_json::from_value(value).map_err(|e| DecodingError::new(channel, raw, e.to_string()))
}

#[derive(Serialize)]
struct ReplyEnvelope<'a, T: ?Sized> {
    result: &'a T,
}

/// Build the `{"result": value}` reply envelope.
pub fn reply_envelope<T: Serialize + ?Sized>(channel: &str, value: &T) -> Result<String> {
    encode_json(channel, &ReplyEnvelope { result: value })
}

/// Build the `{"error": {"message": ...}}` envelope sent when a reply
/// handler cannot produce a result.
pub fn error_envelope(message: &str) -> String {
    serde_json::json!({ "error": { "message": message } }).to_string()
}

/// Decode a reply envelope.
///
/// A `result` key (even `null`) resolves the request; an `error` key becomes
/// [`BridgeError::RemoteError`]; anything else is a
/// [`BridgeError::ReplyDecode`].
pub fn decode_reply<R: DeserializeOwned>(channel: &str, raw: &str) -> Result<R> {
    let mut envelope: Map<String, Value> = serde_json::from_str(raw)
        .map_err(|e| BridgeError::ReplyDecode(DecodingError::new(channel, raw, e.to_string())))?;

    if let Some(result) = envelope.remove("result") {
        return serde_json::from_value(result).map_err(|e| {
            BridgeError::ReplyDecode(DecodingError::new(channel, raw, e.to_string()))
        });
    }

    if let Some(error) = envelope.remove("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(BridgeError::RemoteError {
            channel: channel.to_string(),
            message,
        });
    }

    Err(BridgeError::ReplyDecode(DecodingError::new(
        channel,
        raw,
        "reply envelope has neither `result` nor `error`",
    )))
}

/// Build the statement that delivers `payload_literal` to the content
/// side's receiver for `channel`.
pub fn post_message_script(receiver: &str, channel: &str, payload_literal: &str) -> String {
    format!(
        "{}.channels[{}].postMessage({});",
        receiver,
        encode_js_literal(channel),
        payload_literal
    )
}
