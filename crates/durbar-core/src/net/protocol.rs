use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, GameOverMsg, GuessMsg, JoinMsg, JoinResponseMsg, MessageType, RosterUpdatedMsg,
    RoundResultMsg, RoundStartedMsg, ServerMessage, SessionCancelledMsg, YourRoleMsg, YourTurnMsg,
};

/// Current protocol version. Clients may send 0 (unversioned) or the exact
/// version; anything else is rejected at the join handshake.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes. Game payloads are tiny; anything
/// near this limit is garbage or abuse.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Join(m) => encode_message(MessageType::Join, m),
        ClientMessage::Guess(m) => encode_message(MessageType::Guess, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::JoinResponse(m) => encode_message(MessageType::JoinResponse, m),
        ServerMessage::RosterUpdated(m) => encode_message(MessageType::RosterUpdated, m),
        ServerMessage::RoundStarted(m) => encode_message(MessageType::RoundStarted, m),
        ServerMessage::YourRole(m) => encode_message(MessageType::YourRole, m),
        ServerMessage::YourTurn(m) => encode_message(MessageType::YourTurn, m),
        ServerMessage::RoundResult(m) => encode_message(MessageType::RoundResult, m),
        ServerMessage::GameOver(m) => encode_message(MessageType::GameOver, m),
        ServerMessage::SessionCancelled(m) => encode_message(MessageType::SessionCancelled, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Join => Ok(ClientMessage::Join(decode_payload::<JoinMsg>(data)?)),
        MessageType::Guess => Ok(ClientMessage::Guess(decode_payload::<GuessMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::JoinResponse => Ok(ServerMessage::JoinResponse(decode_payload::<
            JoinResponseMsg,
        >(data)?)),
        MessageType::RosterUpdated => Ok(ServerMessage::RosterUpdated(decode_payload::<
            RosterUpdatedMsg,
        >(data)?)),
        MessageType::RoundStarted => Ok(ServerMessage::RoundStarted(decode_payload::<
            RoundStartedMsg,
        >(data)?)),
        MessageType::YourRole => Ok(ServerMessage::YourRole(decode_payload::<YourRoleMsg>(
            data,
        )?)),
        MessageType::YourTurn => Ok(ServerMessage::YourTurn(decode_payload::<YourTurnMsg>(
            data,
        )?)),
        MessageType::RoundResult => Ok(ServerMessage::RoundResult(decode_payload::<
            RoundResultMsg,
        >(data)?)),
        MessageType::GameOver => Ok(ServerMessage::GameOver(decode_payload::<GameOverMsg>(
            data,
        )?)),
        MessageType::SessionCancelled => Ok(ServerMessage::SessionCancelled(decode_payload::<
            SessionCancelledMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
