use serde::{Deserialize, Serialize};

/// The four court roles dealt each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    King,
    Minister,
    Thief,
    Soldier,
}

impl Role {
    /// All four roles, one per seat.
    pub const ALL: [Role; 4] = [Role::King, Role::Minister, Role::Thief, Role::Soldier];

    /// The seat that must identify the hidden target each round.
    pub const GUESSER: Role = Role::Soldier;

    /// The seat the guesser is hunting for.
    pub const HIDDEN_TARGET: Role = Role::Thief;

    /// Whether this role is common knowledge once dealt. King and Soldier
    /// are announced to the whole table; Minister and Thief stay masked in
    /// broadcast snapshots and are revealed only to their own seat.
    pub fn is_public(self) -> bool {
        matches!(self, Role::King | Role::Soldier)
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::King => "King",
            Role::Minister => "Minister",
            Role::Thief => "Thief",
            Role::Soldier => "Soldier",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Base point value of each role. Treated as configuration rather than a
/// fixed law: deployments disagree on the exact numbers, so the table is
/// loaded from the server config and threaded through scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePoints {
    pub king: i64,
    pub minister: i64,
    pub thief: i64,
    pub soldier: i64,
}

impl Default for RolePoints {
    fn default() -> Self {
        Self {
            king: 2000,
            minister: 900,
            thief: 0,
            soldier: 700,
        }
    }
}

impl RolePoints {
    /// Base value a role earns when the round's verdict does not touch it.
    pub fn base(&self, role: Role) -> i64 {
        match role {
            Role::King => self.king,
            Role::Minister => self.minister,
            Role::Thief => self.thief,
            Role::Soldier => self.soldier,
        }
    }
}
