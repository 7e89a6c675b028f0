pub mod assign;
pub mod events;
pub mod net;
pub mod player;
pub mod role;
pub mod roster;
pub mod round;
pub mod scoring;
pub mod session;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::time::Duration;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::events::{AdvanceToken, Effect, Recipient};
    use crate::net::messages::MessageType;
    use crate::player::PlayerId;
    use crate::session::{Session, SessionConfig};

    /// Deterministic session with a near-zero advance delay.
    pub fn make_session(total_rounds: u32, seed: u64) -> Session {
        Session::with_rng(
            SessionConfig {
                total_rounds,
                advance_delay: Duration::ZERO,
                ..SessionConfig::default()
            },
            StdRng::seed_from_u64(seed),
        )
    }

    /// Seat `n` players with sequential ids starting at 1. Returns the
    /// effects of the last join.
    pub fn seat_players(session: &mut Session, n: usize) -> Vec<Effect> {
        let mut last = Vec::new();
        for i in 0..n {
            let id = i as PlayerId + 1;
            let (result, effects) = session.handle_join(id, &format!("Player{id}"));
            result.expect("join should succeed");
            last = effects;
        }
        last
    }

    /// Count broadcast effects of one message type.
    pub fn broadcasts_of(effects: &[Effect], msg_type: MessageType) -> usize {
        effects
            .iter()
            .filter(|e| {
                matches!(e, Effect::Send { to: Recipient::All, message }
                    if message.message_type() == msg_type)
            })
            .count()
    }

    /// The token of the first scheduled advance among `effects`, if any.
    pub fn scheduled_advance(effects: &[Effect]) -> Option<AdvanceToken> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleAdvance { token, .. } => Some(*token),
            _ => None,
        })
    }
}
