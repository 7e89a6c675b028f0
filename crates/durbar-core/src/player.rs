use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Unique identifier for a connected player. Allocated by the host when the
/// connection is accepted and stable for the connection's lifetime.
pub type PlayerId = u64;

/// A seated player. Owned exclusively by the roster; the round scheduler
/// and scoring mutate role and points only through roster methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// `None` until roles are dealt for a round.
    pub role: Option<Role>,
    /// Points earned in the current round. Reset when a round starts.
    pub round_points: i64,
    /// Accumulated points across rounds of one game.
    pub total_points: i64,
}

impl Player {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: None,
            round_points: 0,
            total_points: 0,
        }
    }
}

/// What a snapshot shows for a seat's role. Masking happens here, at view
/// construction; the stored `Player::role` is never rewritten to hide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleView {
    Unassigned,
    Hidden,
    Revealed(Role),
}

/// One seat in a roster snapshot sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub role: RoleView,
    pub round_points: i64,
    pub total_points: i64,
}

/// Minimal seat listing for lobby roster broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatListing {
    pub id: PlayerId,
    pub name: String,
}

/// How much a snapshot may disclose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Non-public roles are replaced with [`RoleView::Hidden`].
    Masked,
    /// Every assigned role is revealed. Used for round results.
    Full,
}
