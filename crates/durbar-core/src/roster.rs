use std::collections::HashMap;

use crate::player::{Player, PlayerId, RoleView, SeatListing, SeatSnapshot, Visibility};
use crate::role::Role;

/// Exact number of seats in a session. The game is defined for four players
/// and no other size.
pub const SEAT_COUNT: usize = 4;

/// Why a join attempt was turned away. Reported synchronously to the
/// requesting connection only; rejected joins never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    /// All four seats are taken.
    Full,
    /// A game is in progress; mid-game sessions admit no new seats.
    InProgress,
}

impl JoinRejection {
    pub fn message(self) -> &'static str {
        match self {
            JoinRejection::Full => "session is full",
            JoinRejection::InProgress => "game in progress",
        }
    }
}

/// The seated players of one session, in join order.
///
/// Invariants: `len() <= SEAT_COUNT`, no two seats share a player id.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat a new player. Fails with [`JoinRejection::Full`] at capacity.
    /// The phase check (no joins mid-game) belongs to the session
    /// coordinator, not the roster.
    pub fn try_join(
        &mut self,
        id: PlayerId,
        display_name: &str,
    ) -> Result<usize, JoinRejection> {
        if self.players.len() >= SEAT_COUNT {
            return Err(JoinRejection::Full);
        }
        // Ids are allocated uniquely by the host; a duplicate is a defect.
        debug_assert!(!self.contains(id), "duplicate player id {id} in roster");
        self.players.push(Player::new(id, display_name));
        Ok(self.players.len() - 1)
    }

    /// Remove a seat. Idempotent: unknown ids are a no-op.
    pub fn remove(&mut self, id: PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Seats in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Id/name pairs for lobby roster broadcasts.
    pub fn listing(&self) -> Vec<SeatListing> {
        self.players
            .iter()
            .map(|p| SeatListing {
                id: p.id,
                name: p.display_name.clone(),
            })
            .collect()
    }

    /// Immutable view of every seat, masking non-public roles unless the
    /// snapshot is [`Visibility::Full`].
    pub fn snapshot(&self, visibility: Visibility) -> Vec<SeatSnapshot> {
        self.players
            .iter()
            .map(|p| SeatSnapshot {
                id: p.id,
                name: p.display_name.clone(),
                role: match (p.role, visibility) {
                    (None, _) => RoleView::Unassigned,
                    (Some(role), Visibility::Full) => RoleView::Revealed(role),
                    (Some(role), Visibility::Masked) => {
                        if role.is_public() {
                            RoleView::Revealed(role)
                        } else {
                            RoleView::Hidden
                        }
                    },
                },
                round_points: p.round_points,
                total_points: p.total_points,
            })
            .collect()
    }

    /// Install a fresh round's role assignment and zero round points.
    pub fn begin_round(&mut self, assignment: &HashMap<PlayerId, Role>) {
        for p in &mut self.players {
            p.role = assignment.get(&p.id).copied();
            p.round_points = 0;
        }
    }

    /// The current seat→role mapping, for scoring.
    pub fn assignment(&self) -> HashMap<PlayerId, Role> {
        self.players
            .iter()
            .filter_map(|p| p.role.map(|role| (p.id, role)))
            .collect()
    }

    /// The seat currently holding `role`, if roles are assigned.
    pub fn find_role(&self, role: Role) -> Option<PlayerId> {
        self.players.iter().find(|p| p.role == Some(role)).map(|p| p.id)
    }

    /// Record round scores and fold them into totals. Called exactly once
    /// per completed round.
    pub fn apply_round_points(&mut self, scores: &HashMap<PlayerId, i64>) {
        for p in &mut self.players {
            if let Some(&points) = scores.get(&p.id) {
                p.round_points = points;
                p.total_points += points;
            }
        }
    }

    /// Wipe all per-game state: roles, round points, totals. Run when a
    /// game finishes or is cancelled, before the session is lobby-eligible
    /// again.
    pub fn clear_game_state(&mut self) {
        for p in &mut self.players {
            p.role = None;
            p.round_points = 0;
            p.total_points = 0;
        }
    }
}
