use std::time::Duration;

use crate::net::messages::ServerMessage;
use crate::player::PlayerId;

/// Delivery scope for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connection in the session.
    All,
    /// One seat's connection only. Used for role reveals and turn notices.
    Player(PlayerId),
}

/// Generation counter for the deferred round-advance task. Every
/// session-ending transition bumps the counter, so a timer that fires after
/// cancellation presents a stale token and is dropped; a cancelled session
/// must never be resurrected by a leftover timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvanceToken(u64);

impl AdvanceToken {
    pub const fn initial() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// What the session asks its host to do. The core performs no I/O and owns
/// no timers; handlers return a sequence of effects and the transport
/// adapter interprets them.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send {
        to: Recipient,
        message: ServerMessage,
    },
    /// Run `Session::advance` with this token after the delay, unless a
    /// `CancelAdvance` (or a newer schedule) supersedes it.
    ScheduleAdvance {
        token: AdvanceToken,
        delay: Duration,
    },
    /// Abort any pending scheduled advance.
    CancelAdvance,
}

impl Effect {
    pub fn broadcast(message: ServerMessage) -> Self {
        Effect::Send {
            to: Recipient::All,
            message,
        }
    }

    pub fn to_player(id: PlayerId, message: ServerMessage) -> Self {
        Effect::Send {
            to: Recipient::Player(id),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_advance_and_never_repeat_adjacent() {
        let t0 = AdvanceToken::initial();
        let t1 = t0.next();
        assert_ne!(t0, t1);
        assert_eq!(t0.next(), t1);
    }
}
