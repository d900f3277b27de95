use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::messages::{ClientMessage, EmptyMsg, MessageType, ServerMessage};

/// Maximum accepted frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    /// Not a JSON object with a string `type` field.
    Malformed(String),
    UnknownMessageType(String),
    InvalidPayload {
        msg_type: MessageType,
        error: String,
    },
    SerializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed message: {e}"),
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t}"),
            Self::InvalidPayload { msg_type, error } => {
                write!(f, "invalid payload for {}: {error}", msg_type.as_str())
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// A parsed but not yet interpreted inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub msg_type: String,
    pub payload: Value,
}

/// Parse a text frame into its type and payload object.
///
/// The payload is the `data` object when present. Otherwise the remaining
/// top-level fields are used, since clients also send payload fields inline.
pub fn decode_envelope(text: &str) -> Result<Envelope, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(ProtocolError::Malformed("not a JSON object".to_string()));
    };
    let msg_type = match fields.remove("type") {
        Some(Value::String(t)) => t,
        _ => return Err(ProtocolError::Malformed("missing string `type`".to_string())),
    };
    let payload = match fields.remove("data") {
        Some(Value::Object(data)) => Value::Object(data),
        Some(Value::Null) | None => Value::Object(fields),
        Some(_) => {
            return Err(ProtocolError::Malformed(
                "`data` must be an object".to_string(),
            ));
        },
    };
    Ok(Envelope { msg_type, payload })
}

fn decode_payload<T: DeserializeOwned>(
    msg_type: MessageType,
    payload: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        msg_type,
        error: e.to_string(),
    })
}

/// Interpret an envelope as one of the closed set of client messages.
pub fn decode_client_message(envelope: Envelope) -> Result<ClientMessage, ProtocolError> {
    let Some(msg_type) = MessageType::from_name(&envelope.msg_type) else {
        return Err(ProtocolError::UnknownMessageType(envelope.msg_type));
    };
    let payload = envelope.payload;
    let msg = match msg_type {
        MessageType::PlayerData => ClientMessage::PlayerData,
        MessageType::LifeUpdate => ClientMessage::LifeUpdate(decode_payload(msg_type, payload)?),
        MessageType::EnergyUpdate => {
            ClientMessage::EnergyUpdate(Box::new(decode_payload(msg_type, payload)?))
        },
        MessageType::DeathUpdate => ClientMessage::DeathUpdate,
        MessageType::TilemapCreate => {
            ClientMessage::TilemapCreate(decode_payload(msg_type, payload)?)
        },
        MessageType::SaveTilemap => ClientMessage::SaveTilemap(decode_payload(msg_type, payload)?),
        MessageType::MinedRock => ClientMessage::MinedRock(decode_payload(msg_type, payload)?),
        MessageType::SellOres => ClientMessage::SellOres,
        MessageType::HellyHeal => ClientMessage::HellyHeal(decode_payload(msg_type, payload)?),
        MessageType::HellyRestoreEnergy => {
            ClientMessage::HellyRestoreEnergy(decode_payload(msg_type, payload)?)
        },
        MessageType::DeleteOre => ClientMessage::DeleteOre(decode_payload(msg_type, payload)?),
        MessageType::BuyItem => ClientMessage::BuyItem(decode_payload(msg_type, payload)?),
        MessageType::UseTeleport => ClientMessage::UseTeleport(decode_payload(msg_type, payload)?),
        MessageType::UseHeal => ClientMessage::UseHeal(decode_payload(msg_type, payload)?),
        MessageType::UseEnergy => ClientMessage::UseEnergy(decode_payload(msg_type, payload)?),
        MessageType::UseAntiFire => ClientMessage::UseAntiFire,
        MessageType::UseBomb => ClientMessage::UseBomb,
        MessageType::ExplosiveTile => ClientMessage::ExplosiveTile,
        MessageType::ConvertAmazonite => {
            ClientMessage::ConvertAmazonite(decode_payload(msg_type, payload)?)
        },
        MessageType::Ping => ClientMessage::Ping,
        MessageType::Pong => ClientMessage::Pong,
    };
    Ok(msg)
}

fn envelope<T: Serialize>(msg_type: MessageType, payload: &T) -> Result<String, ProtocolError> {
    let data =
        serde_json::to_value(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let mut fields = Map::new();
    fields.insert("type".to_string(), Value::String(msg_type.as_str().to_string()));
    fields.insert("data".to_string(), data);
    Ok(Value::Object(fields).to_string())
}

/// Encode a `ClientMessage` as a `{type, data}` text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    let t = msg.message_type();
    match msg {
        ClientMessage::LifeUpdate(m) => envelope(t, m),
        ClientMessage::EnergyUpdate(m) => envelope(t, m),
        ClientMessage::TilemapCreate(m) => envelope(t, m),
        ClientMessage::SaveTilemap(m) => envelope(t, m),
        ClientMessage::MinedRock(m) => envelope(t, m),
        ClientMessage::HellyHeal(m) => envelope(t, m),
        ClientMessage::HellyRestoreEnergy(m) => envelope(t, m),
        ClientMessage::DeleteOre(m) => envelope(t, m),
        ClientMessage::BuyItem(m) => envelope(t, m),
        ClientMessage::UseTeleport(m) => envelope(t, m),
        ClientMessage::UseHeal(m) => envelope(t, m),
        ClientMessage::UseEnergy(m) => envelope(t, m),
        ClientMessage::ConvertAmazonite(m) => envelope(t, m),
        ClientMessage::PlayerData
        | ClientMessage::DeathUpdate
        | ClientMessage::SellOres
        | ClientMessage::UseAntiFire
        | ClientMessage::UseBomb
        | ClientMessage::ExplosiveTile
        | ClientMessage::Ping
        | ClientMessage::Pong => envelope(t, &EmptyMsg {}),
    }
}

/// Encode a `ServerMessage` as a `{type, data}` text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::net::messages::{ConvertAmazoniteMsg, LifeUpdateMsg, TimestampMsg};

    fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
        decode_client_message(decode_envelope(text)?)
    }

    #[test]
    fn decode_with_data_object() {
        let msg = decode(r#"{"type":"life_update","data":{"life":3.9}}"#).unwrap();
        assert_eq!(msg, ClientMessage::LifeUpdate(LifeUpdateMsg { life: 3.9 }));
    }

    #[test]
    fn decode_with_inline_fields() {
        let msg =
            decode(r#"{"type":"convert_amazonite","buttonIndex":2,"isVip":true,"requestId":"r1"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::ConvertAmazonite(ConvertAmazoniteMsg {
                button_index: 2.0,
                is_vip: true,
                request_id: json!("r1"),
            })
        );
    }

    #[test]
    fn decode_fieldless_messages() {
        assert_eq!(decode(r#"{"type":"ping"}"#).unwrap(), ClientMessage::Ping);
        assert_eq!(
            decode(r#"{"type":"sell_ores","data":{}}"#).unwrap(),
            ClientMessage::SellOres
        );
        assert_eq!(
            decode(r#"{"type":"death_update","death":true}"#).unwrap(),
            ClientMessage::DeathUpdate
        );
    }

    #[test]
    fn malformed_frames() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode("[1,2]"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode(r#"{"data":{}}"#), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode(r#"{"type":5}"#), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"type":"ping","data":7}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_type_carries_name() {
        match decode(r#"{"type":"fly","data":{}}"#) {
            Err(ProtocolError::UnknownMessageType(t)) => assert_eq!(t, "fly"),
            other => panic!("expected unknown type, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_field_is_invalid_payload() {
        match decode(r#"{"type":"buy_item","data":{"item":"bomb"}}"#) {
            Err(ProtocolError::InvalidPayload { msg_type, .. }) => {
                assert_eq!(msg_type, MessageType::BuyItem)
            },
            other => panic!("expected invalid payload, got {other:?}"),
        }
    }

    #[test]
    fn client_encoding_is_decodable() {
        let original = ClientMessage::LifeUpdate(LifeUpdateMsg { life: 2.0 });
        let text = encode_client_message(&original).unwrap();
        assert_eq!(decode(&text).unwrap(), original);

        let text = encode_client_message(&ClientMessage::UseBomb).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "use_bomb", "data": {}}));
    }

    #[test]
    fn server_encoding() {
        let text =
            encode_server_message(&ServerMessage::Pong(TimestampMsg { timestamp: 12 })).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "pong", "data": {"timestamp": 12}}));
    }
}
