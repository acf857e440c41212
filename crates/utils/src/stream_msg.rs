//! Messages pushed to live-subscription WebSocket clients.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

pub const EV_SNAPSHOT: &str = "snapshot";
pub const EV_REFRESH_REQUIRED: &str = "refresh_required";
pub const EV_CLOSED: &str = "closed";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMsg {
    /// Full result set for the subscribed topic.
    Snapshot { data: serde_json::Value },
    /// The server could not produce a snapshot; the client should refetch over REST.
    RefreshRequired { reason: String },
    /// The subscription ended server-side (board deleted, access revoked).
    Closed { reason: String },
}

impl StreamMsg {
    pub fn snapshot<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(StreamMsg::Snapshot {
            data: serde_json::to_value(value)?,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamMsg::Snapshot { .. } => EV_SNAPSHOT,
            StreamMsg::RefreshRequired { .. } => EV_REFRESH_REQUIRED,
            StreamMsg::Closed { .. } => EV_CLOSED,
        }
    }

    pub fn to_ws_message(&self) -> Result<Message, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Message::Text(json.into()))
    }

    /// Like [`StreamMsg::to_ws_message`] but degrades to a refresh request
    /// instead of failing.
    pub fn to_ws_message_unchecked(&self) -> Message {
        let json = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"refresh_required","reason":"serialization_failed"}"#.to_string()
        });
        Message::Text(json.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_tagged() {
        let msg = StreamMsg::snapshot(&serde_json::json!({ "columns": [] })).unwrap();
        assert_eq!(msg.name(), EV_SNAPSHOT);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["data"]["columns"], serde_json::json!([]));
    }

    #[test]
    fn test_closed_message_text() {
        let msg = StreamMsg::Closed {
            reason: "board deleted".to_string(),
        };
        match msg.to_ws_message_unchecked() {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(value["type"], "closed");
                assert_eq!(value["reason"], "board deleted");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
