use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, is_blank};
use crate::models::NewMessage;

/// Body of both the inbound `send_message` and the outbound
/// `receive_message` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub sender: String,
    pub receiver: String,
    pub message: String,
}

impl ChatPayload {
    pub fn validate(&self) -> Result<NewMessage, ValidationError> {
        if is_blank(&self.sender) {
            return Err(ValidationError::MissingSender);
        }
        if is_blank(&self.receiver) {
            return Err(ValidationError::MissingReceiver);
        }
        if is_blank(&self.message) {
            return Err(ValidationError::EmptyBody);
        }

        Ok(NewMessage {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            body: self.message.clone(),
        })
    }
}

/// Events sent FROM server TO clients over the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A message was stored and is being fanned out
    ReceiveMessage(ChatPayload),
}

/// Commands sent FROM clients TO server over the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Store a direct message and relay it to other connections
    SendMessage(ChatPayload),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(sender: &str, receiver: &str, message: &str) -> ChatPayload {
        ChatPayload {
            sender: sender.into(),
            receiver: receiver.into(),
            message: message.into(),
        }
    }

    #[test]
    fn send_message_wire_format() {
        let raw = r#"{"type":"send_message","data":{"sender":"alice","receiver":"bob","message":"hi"}}"#;
        let cmd: GatewayCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(cmd, GatewayCommand::SendMessage(payload("alice", "bob", "hi")));
    }

    #[test]
    fn receive_message_wire_format() {
        let event = GatewayEvent::ReceiveMessage(payload("alice", "bob", "hi"));
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "receive_message");
        assert_eq!(json["data"]["sender"], "alice");
        assert_eq!(json["data"]["receiver"], "bob");
        assert_eq!(json["data"]["message"], "hi");
    }

    #[test]
    fn missing_field_is_rejected_by_decoder() {
        let raw = r#"{"type":"send_message","data":{"sender":"alice","message":"hi"}}"#;
        assert!(serde_json::from_str::<GatewayCommand>(raw).is_err());
    }

    #[test]
    fn validate_rejects_blank_fields() {
        assert_eq!(payload("", "bob", "hi").validate(), Err(ValidationError::MissingSender));
        assert_eq!(payload("alice", "  ", "hi").validate(), Err(ValidationError::MissingReceiver));
        assert_eq!(payload("alice", "bob", "\n").validate(), Err(ValidationError::EmptyBody));
    }

    #[test]
    fn validate_keeps_body_verbatim() {
        let msg = payload("alice", "bob", "  hi there ").validate().unwrap();
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.receiver, "bob");
        assert_eq!(msg.body, "  hi there ");
    }
}
