//! Wire envelope types and the frame codec.
//!
//! One JSON object per message, three shapes: an outbound call, an inbound
//! response correlated by `id`, and an inbound event carrying no `id`.
//! Absence of `id` is the only thing separating a response from an event
//! on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Request ID - monotonically increasing, connection-scoped
pub type RequestId = i64;

/// Target ID assigned by the debuggee
pub type TargetId = String;

/// Session ID assigned by the debuggee on attach
pub type SessionId = String;

/// Frame failed to decode. The read loop logs and skips these; a corrupt
/// frame never terminates the connection.
#[derive(Debug, Error)]
#[error("malformed frame: {0}")]
pub struct ParseError(#[from] serde_json::Error);

/// Outbound call frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFrame {
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Inbound response frame, correlated to a call by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Error object carried by a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Inbound event frame - an unsolicited notification, no `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl EventFrame {
    /// Domain component of the event method ("Page" in "Page.loadEventFired")
    pub fn domain(&self) -> &str {
        domain_of(&self.method)
    }

    /// Decode the event payload into its typed shape.
    pub fn params_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }
}

/// Classified inbound frame.
///
/// `ResponseFrame` is tried first: any frame carrying `id` is a response,
/// everything else must name an event method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Response(ResponseFrame),
    Event(EventFrame),
}

/// Serializes an outbound call frame. Pure, no I/O.
pub fn encode_call(frame: &CallFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

/// Classifies and decodes one inbound message.
pub fn decode(raw: &str) -> Result<Message, ParseError> {
    Ok(serde_json::from_str(raw)?)
}

/// Namespace prefix of a `Domain.method` name.
pub fn domain_of(method: &str) -> &str {
    method.split('.').next().unwrap_or(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_frame_wire_shape() {
        let frame = CallFrame {
            id: 1,
            method: "Page.navigate".to_string(),
            params: Some(json!({"url": "https://example.com"})),
            session_id: None,
        };

        let encoded = encode_call(&frame).unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["id"], 1);
        assert_eq!(value["method"], "Page.navigate");
        assert_eq!(value["params"]["url"], "https://example.com");
        // absent fields are omitted, not null
        assert!(value.get("sessionId").is_none());
    }

    #[test]
    fn call_frame_carries_session_tag() {
        let frame = CallFrame {
            id: 7,
            method: "Runtime.evaluate".to_string(),
            params: None,
            session_id: Some("ABC123".to_string()),
        };

        let value: Value = serde_json::from_str(&encode_call(&frame).unwrap()).unwrap();
        assert_eq!(value["sessionId"], "ABC123");
        assert!(value.get("params").is_none());
    }

    #[test]
    fn call_frame_round_trips() {
        let frame = CallFrame {
            id: 42,
            method: "Target.attachToTarget".to_string(),
            params: Some(json!({"targetId": "T1", "flatten": true})),
            session_id: Some("S1".to_string()),
        };

        let decoded: CallFrame =
            serde_json::from_str(&encode_call(&frame).unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn id_presence_discriminates_response_from_event() {
        match decode(r#"{"id": 3, "result": {"ok": true}}"#).unwrap() {
            Message::Response(r) => {
                assert_eq!(r.id, 3);
                assert_eq!(r.result.unwrap()["ok"], true);
            }
            other => panic!("expected response, got {:?}", other),
        }

        match decode(r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}}"#)
            .unwrap()
        {
            Message::Event(e) => {
                assert_eq!(e.method, "Page.loadEventFired");
                assert_eq!(e.params["timestamp"], 1.5);
            }
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn response_ids_keep_full_i64_precision() {
        // beyond 2^53: would corrupt if routed through an f64
        let raw = format!(r#"{{"id": {}, "result": {{}}}}"#, 9_007_199_254_740_993_i64);
        match decode(&raw).unwrap() {
            Message::Response(r) => assert_eq!(r.id, 9_007_199_254_740_993),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn error_response_round_trips() {
        let raw = r#"{"id": 9, "error": {"code": -32000, "message": "no such frame"}}"#;
        let message = decode(raw).unwrap();

        match &message {
            Message::Response(r) => {
                let error = r.error.as_ref().unwrap();
                assert_eq!(error.code, -32000);
                assert_eq!(error.message, "no such frame");
                assert!(r.result.is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }

        let reencoded = serde_json::to_string(&message).unwrap();
        assert_eq!(decode(&reencoded).unwrap(), message);
    }

    #[test]
    fn event_round_trips_with_session_tag() {
        let event = Message::Event(EventFrame {
            method: "Page.frameStoppedLoading".to_string(),
            params: json!({"frameId": "F1"}),
            session_id: Some("S1".to_string()),
        });

        let raw = serde_json::to_string(&event).unwrap();
        assert_eq!(decode(&raw).unwrap(), event);
    }

    #[test]
    fn garbage_frames_are_parse_errors() {
        assert!(decode("not json").is_err());
        // neither an id nor an event method
        assert!(decode(r#"{"params": {}}"#).is_err());
        assert!(decode("[1, 2, 3]").is_err());
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("Page.navigate"), "Page");
        assert_eq!(domain_of("Network.requestWillBeSent"), "Network");
        assert_eq!(domain_of("nodot"), "nodot");
    }

    #[test]
    fn typed_event_params() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct FrameStopped {
            frame_id: String,
        }

        let event = EventFrame {
            method: "Page.frameStoppedLoading".to_string(),
            params: json!({"frameId": "F1"}),
            session_id: None,
        };

        let typed: FrameStopped = event.params_as().unwrap();
        assert_eq!(typed.frame_id, "F1");
    }
}
