use serde::{Deserialize, Serialize};

use crate::player::{PlayerId, SeatListing, SeatSnapshot};
use crate::role::Role;

/// Network message type discriminator. One byte on the wire, ahead of the
/// MessagePack payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Join = 0x01,
    Guess = 0x02,

    // Server -> Client
    JoinResponse = 0x10,
    RosterUpdated = 0x11,
    RoundStarted = 0x12,
    YourRole = 0x13,
    YourTurn = 0x14,
    RoundResult = 0x15,
    GameOver = 0x16,
    SessionCancelled = 0x17,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Guess),
            0x10 => Some(Self::JoinResponse),
            0x11 => Some(Self::RosterUpdated),
            0x12 => Some(Self::RoundStarted),
            0x13 => Some(Self::YourRole),
            0x14 => Some(Self::YourTurn),
            0x15 => Some(Self::RoundResult),
            0x16 => Some(Self::GameOver),
            0x17 => Some(Self::SessionCancelled),
            _ => None,
        }
    }

    /// Whether only the server may originate this type. Such messages
    /// arriving from a client are dropped by the transport.
    pub fn is_server_only(self) -> bool {
        !matches!(self, Self::Join | Self::Guess)
    }
}

/// Request a seat. An empty `session_code` creates a fresh session; a
/// non-empty code joins an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub session_code: String,
    pub display_name: String,
    pub protocol_version: u8,
}

/// The Soldier's accusation: which seat hides the Thief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessMsg {
    pub target_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join(JoinMsg),
    Guess(GuessMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join(_) => MessageType::Join,
            Self::Guess(_) => MessageType::Guess,
        }
    }
}

/// Synchronous acknowledgement of a join attempt, sent to the requesting
/// connection only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponseMsg {
    pub success: bool,
    pub player_id: Option<PlayerId>,
    pub session_code: Option<String>,
    pub message: Option<String>,
}

/// Lobby roster, broadcast on every join/leave outside a running game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterUpdatedMsg {
    pub players: Vec<SeatListing>,
}

/// Roles are dealt. The snapshot is masked: Minister and Thief appear as
/// `Hidden` to everyone, including themselves; each seat learns its own
/// role from its private [`YourRoleMsg`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStartedMsg {
    pub players: Vec<SeatSnapshot>,
    pub round: u32,
    pub total_rounds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YourRoleMsg {
    pub role: Role,
}

/// Sent privately to the Soldier seat once roles are out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YourTurnMsg {}

/// Full reveal at the end of a round: all roles and points unmasked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResultMsg {
    pub correct: bool,
    pub players: Vec<SeatSnapshot>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScoreEntry {
    pub name: String,
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverMsg {
    pub winner: SeatListing,
    pub final_scores: Vec<FinalScoreEntry>,
}

/// A mid-game disconnect dropped the session below capacity; the game is
/// abandoned, not completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCancelledMsg {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    JoinResponse(JoinResponseMsg),
    RosterUpdated(RosterUpdatedMsg),
    RoundStarted(RoundStartedMsg),
    YourRole(YourRoleMsg),
    YourTurn(YourTurnMsg),
    RoundResult(RoundResultMsg),
    GameOver(GameOverMsg),
    SessionCancelled(SessionCancelledMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinResponse(_) => MessageType::JoinResponse,
            Self::RosterUpdated(_) => MessageType::RosterUpdated,
            Self::RoundStarted(_) => MessageType::RoundStarted,
            Self::YourRole(_) => MessageType::YourRole,
            Self::YourTurn(_) => MessageType::YourTurn,
            Self::RoundResult(_) => MessageType::RoundResult,
            Self::GameOver(_) => MessageType::GameOver,
            Self::SessionCancelled(_) => MessageType::SessionCancelled,
        }
    }
}
