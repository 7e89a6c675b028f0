use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::events::{AdvanceToken, Effect};
use crate::net::messages::{RosterUpdatedMsg, ServerMessage, SessionCancelledMsg};
use crate::player::PlayerId;
use crate::role::RolePoints;
use crate::roster::{JoinRejection, Roster, SEAT_COUNT};
use crate::round::{Advance, RoundScheduler, RoundState};

/// Session phase as seen by joiners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Lobby,
    InProgress,
    /// A game just ended or was cancelled. Behaves like the lobby for
    /// joins; flips back to `Lobby` the moment a seat changes hands.
    Finished,
}

/// Per-session policy knobs. Point values are configuration, not law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub total_rounds: u32,
    pub advance_delay: Duration,
    pub points: RolePoints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            advance_delay: Duration::from_secs(5),
            points: RolePoints::default(),
        }
    }
}

/// One four-seat game session: the top-level state machine external
/// callers drive. Commands come in one at a time; every handler runs to
/// completion and returns the full effect sequence before the next command
/// is processed, so partial mutation is never observable.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    phase: Phase,
    roster: Roster,
    round: RoundScheduler,
    rng: StdRng,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic construction for tests.
    pub fn with_rng(config: SessionConfig, rng: StdRng) -> Self {
        Self {
            config,
            phase: Phase::Lobby,
            roster: Roster::new(),
            round: RoundScheduler::new(config.total_rounds),
            rng,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn round_state(&self) -> RoundState {
        self.round.state()
    }

    pub fn current_round(&self) -> u32 {
        self.round.current_round()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Seat a player. Rejections are synchronous and produce no effects.
    /// The join that fills the fourth seat starts the game: phase flips to
    /// `InProgress` and the first round is dealt in the same handler.
    pub fn handle_join(
        &mut self,
        id: PlayerId,
        display_name: &str,
    ) -> (Result<(), JoinRejection>, Vec<Effect>) {
        let mut effects = Vec::new();
        if self.phase == Phase::InProgress {
            return (Err(JoinRejection::InProgress), effects);
        }
        if let Err(rejection) = self.roster.try_join(id, display_name) {
            return (Err(rejection), effects);
        }

        // Finished -> Lobby happens implicitly once seats change hands.
        if self.phase == Phase::Finished {
            self.phase = Phase::Lobby;
        }

        effects.push(Effect::broadcast(ServerMessage::RosterUpdated(
            RosterUpdatedMsg {
                players: self.roster.listing(),
            },
        )));

        if self.roster.len() == SEAT_COUNT {
            self.phase = Phase::InProgress;
            self.round.begin_session();
            self.round
                .start_round(&mut self.rng, &mut self.roster, &mut effects);
        }

        (Ok(()), effects)
    }

    /// Route a guess into the round. Ignored outside a running game; the
    /// scheduler drops out-of-turn guesses silently.
    pub fn handle_guess(&mut self, from: PlayerId, target: PlayerId) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase != Phase::InProgress {
            tracing::debug!(from, "guess outside a running game dropped");
            return effects;
        }
        self.round.submit_guess(
            &self.config.points,
            self.config.advance_delay,
            &mut self.roster,
            from,
            target,
            &mut effects,
        );
        effects
    }

    /// A connection went away. Mid-game this abandons the session: one
    /// cancellation broadcast, pending advance invalidated, all per-game
    /// state cleared. In the lobby it is just a roster update.
    pub fn handle_disconnect(&mut self, id: PlayerId) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.roster.remove(id) {
            return effects;
        }

        if self.phase == Phase::InProgress && self.roster.len() < SEAT_COUNT {
            self.round.cancel(&mut self.roster);
            self.phase = Phase::Finished;
            effects.push(Effect::CancelAdvance);
            effects.push(Effect::broadcast(ServerMessage::SessionCancelled(
                SessionCancelledMsg {
                    reason: "player disconnected mid-game".to_string(),
                },
            )));
        }
        effects.push(Effect::broadcast(ServerMessage::RosterUpdated(
            RosterUpdatedMsg {
                players: self.roster.listing(),
            },
        )));
        effects
    }

    /// Deferred round advancement, driven by the host's timer. Stale
    /// tokens, whether from a cancelled game or an already-fired timer, are
    /// dropped; a cancelled session is never resurrected.
    pub fn advance(&mut self, token: AdvanceToken) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase != Phase::InProgress {
            return effects;
        }
        match self
            .round
            .advance(&mut self.rng, token, &mut self.roster, &mut effects)
        {
            Advance::Finished => self.phase = Phase::Finished,
            Advance::NextRound | Advance::Stale => {},
        }
        effects
    }
}

/// Generate a session code in the `ABCD-1234` format.
pub fn generate_session_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(9);
    for _ in 0..4 {
        code.push((b'A' + rng.random_range(0u8..26)) as char);
    }
    code.push('-');
    for _ in 0..4 {
        code.push((b'0' + rng.random_range(0u8..10)) as char);
    }
    code
}

/// Validate the `ABCD-1234` session code format before lookup.
pub fn is_valid_session_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 9
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'-'
        && bytes[5..].iter().all(u8::is_ascii_digit)
}
