//! Message envelope protocol exchanged between browsing contexts.
//!
//! Every envelope is serialized to JSON text for transport and carries a
//! `message` discriminant plus the `adId` correlating it to one render
//! transaction. Transports are shared with unrelated senders, so receivers
//! must filter by kind and `adId`; anything that does not parse is noise and
//! is dropped without comment.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known name of the child frame that marks a trusted intermediary.
///
/// This is a structural heuristic, not a proof of trust; it is kept
/// wire-compatible with existing counterparties.
pub const LOCATOR_FRAME_NAME: &str = "__pb_locator__";

/// Wire values of the `message` discriminant.
pub const MESSAGE_REQUEST: &str = "request";
pub const MESSAGE_RESPONSE: &str = "response";
pub const MESSAGE_EVENT: &str = "event";

/// Event name reported when the injected renderer resolves.
pub const EVENT_AD_RENDER_SUCCEEDED: &str = "ad-render-succeeded";
/// Event name reported when the renderer throws, rejects, or fails to load.
pub const EVENT_AD_RENDER_FAILED: &str = "ad-render-failed";

/// Generic reason code for faults that carry no explicit reason.
pub const ERROR_EXCEPTION: &str = "exception";

/// Request options supplied by the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub click_url: String,
}

/// Failure detail attached to an `ad-render-failed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The unit exchanged across contexts, tagged by the `message` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message")]
pub enum Envelope {
    /// Opens a transaction; expects exactly one correlated `response` on the
    /// reply channel attached to the posting.
    #[serde(rename = "request", rename_all = "camelCase")]
    Request {
        ad_id: String,
        options: RequestOptions,
    },
    /// Carries the renderer source plus arbitrary render data, opaque to this
    /// core and passed through to the sandbox.
    #[serde(rename = "response", rename_all = "camelCase")]
    Response {
        ad_id: String,
        renderer: String,
        #[serde(flatten)]
        data: Map<String, Value>,
    },
    /// Fire-and-forget notification flowing from the render side outward.
    #[serde(rename = "event", rename_all = "camelCase")]
    Event {
        ad_id: String,
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<EventInfo>,
    },
}

impl Envelope {
    pub fn ad_id(&self) -> &str {
        match self {
            Envelope::Request { ad_id, .. }
            | Envelope::Response { ad_id, .. }
            | Envelope::Event { ad_id, .. } => ad_id,
        }
    }

    /// Serialize for transport.
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse an inbound payload. Malformed or unrecognized input is not an
    /// error condition, it is "not for me".
    pub fn from_wire(raw: &str) -> Option<Envelope> {
        match serde_json::from_str(raw) {
            Ok(envelope) => Some(envelope),
            Err(_) => {
                tracing::trace!(len = raw.len(), "dropping unparseable message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips() {
        let env = Envelope::Request {
            ad_id: "ad1".to_string(),
            options: RequestOptions {
                click_url: "https://pub.example/click".to_string(),
            },
        };
        let wire = env.to_wire().unwrap();
        let parsed: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed["message"], "request");
        assert_eq!(parsed["adId"], "ad1");
        assert_eq!(parsed["options"]["clickUrl"], "https://pub.example/click");
        assert_eq!(Envelope::from_wire(&wire), Some(env));
    }

    #[test]
    fn response_keeps_opaque_render_data() {
        let wire = json!({
            "message": "response",
            "adId": "ad2",
            "renderer": "globalThis.render = () => {};",
            "ad": "<div></div>",
            "width": 300,
            "height": 250,
        })
        .to_string();

        let env = Envelope::from_wire(&wire).expect("valid response");
        match &env {
            Envelope::Response {
                ad_id,
                renderer,
                data,
            } => {
                assert_eq!(ad_id, "ad2");
                assert!(renderer.contains("render"));
                assert_eq!(data["ad"], "<div></div>");
                assert_eq!(data["width"], 300);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }

        // Round-trip preserves the flattened fields.
        let reparsed = Envelope::from_wire(&env.to_wire().unwrap()).unwrap();
        assert_eq!(reparsed, env);
    }

    #[test]
    fn event_round_trips_with_and_without_info() {
        let ok = Envelope::Event {
            ad_id: "ad3".to_string(),
            event: EVENT_AD_RENDER_SUCCEEDED.to_string(),
            info: None,
        };
        let wire = ok.to_wire().unwrap();
        assert!(!wire.contains("info"));
        assert_eq!(Envelope::from_wire(&wire), Some(ok));

        let failed = Envelope::Event {
            ad_id: "ad3".to_string(),
            event: EVENT_AD_RENDER_FAILED.to_string(),
            info: Some(EventInfo {
                reason: ERROR_EXCEPTION.to_string(),
                message: Some("TypeError: x is not a function".to_string()),
            }),
        };
        let reparsed = Envelope::from_wire(&failed.to_wire().unwrap()).unwrap();
        assert_eq!(reparsed, failed);
    }

    #[test]
    fn noise_is_dropped_silently() {
        assert_eq!(Envelope::from_wire("not json"), None);
        assert_eq!(Envelope::from_wire(""), None);
        // Parseable JSON with an unknown discriminant is someone else's traffic.
        assert_eq!(
            Envelope::from_wire(r#"{"message":"telemetry","adId":"x"}"#),
            None
        );
        // Missing correlation id.
        assert_eq!(Envelope::from_wire(r#"{"message":"request"}"#), None);
    }
}
