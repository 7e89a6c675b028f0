use std::time::Duration;

use rand::Rng;

use crate::assign::assign_roles;
use crate::events::{AdvanceToken, Effect};
use crate::net::messages::{
    FinalScoreEntry, GameOverMsg, RoundResultMsg, RoundStartedMsg, ServerMessage, YourRoleMsg,
    YourTurnMsg,
};
use crate::player::{PlayerId, SeatListing, Visibility};
use crate::role::{Role, RolePoints};
use crate::roster::Roster;
use crate::scoring::{score_round, winner};

/// Where a round currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// No round is active; roles have not been dealt.
    AwaitingRoles,
    /// Roles are out, waiting on the Soldier's accusation.
    AwaitingGuess,
    /// Scored and revealed; a deferred advance will start the next round
    /// or finish the session.
    RoundComplete,
    /// The game ended (completed or cancelled); seats may start fresh.
    SessionComplete,
}

/// What a call to [`RoundScheduler::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Another round was dealt.
    NextRound,
    /// Final round done: winner declared, per-game state cleared.
    Finished,
    /// Stale token or wrong state; nothing happened.
    Stale,
}

/// Drives rounds within one session: deal, guess, score, advance, finish.
/// Owns the round counter and the pending-advance token; never owns player
/// data, which it mutates only through the roster.
#[derive(Debug)]
pub struct RoundScheduler {
    state: RoundState,
    current_round: u32,
    total_rounds: u32,
    guesser: Option<PlayerId>,
    target: Option<PlayerId>,
    advance_token: AdvanceToken,
}

impl RoundScheduler {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            state: RoundState::AwaitingRoles,
            current_round: 0,
            total_rounds,
            guesser: None,
            target: None,
            advance_token: AdvanceToken::initial(),
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// Token a scheduled advance must present to be honored.
    pub fn advance_token(&self) -> AdvanceToken {
        self.advance_token
    }

    /// Begin a fresh game: round counter back to zero, idle state.
    pub fn begin_session(&mut self) {
        self.current_round = 0;
        self.state = RoundState::AwaitingRoles;
        self.guesser = None;
        self.target = None;
    }

    /// Deal roles and open the guessing window. Requires a full roster and
    /// an idle scheduler; emits the masked round-start broadcast, one
    /// private role reveal per seat, and the turn notice to the Soldier.
    pub fn start_round<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        roster: &mut Roster,
        effects: &mut Vec<Effect>,
    ) {
        if !matches!(
            self.state,
            RoundState::AwaitingRoles | RoundState::SessionComplete
        ) {
            tracing::warn!(state = ?self.state, "start_round in non-idle state ignored");
            return;
        }

        let ids = roster.ids();
        let assignment = match assign_roles(rng, &ids) {
            Ok(assignment) => assignment,
            Err(err) => {
                // Callers guarantee a full roster; reaching this is a defect.
                debug_assert!(false, "{err}");
                tracing::error!(%err, "role assignment invariant violated, round not started");
                return;
            },
        };

        self.current_round += 1;
        roster.begin_round(&assignment);
        self.guesser = roster.find_role(Role::GUESSER);
        self.target = roster.find_role(Role::HIDDEN_TARGET);
        self.state = RoundState::AwaitingGuess;

        effects.push(Effect::broadcast(ServerMessage::RoundStarted(
            RoundStartedMsg {
                players: roster.snapshot(Visibility::Masked),
                round: self.current_round,
                total_rounds: self.total_rounds,
            },
        )));
        for player in roster.players() {
            if let Some(role) = player.role {
                effects.push(Effect::to_player(
                    player.id,
                    ServerMessage::YourRole(YourRoleMsg { role }),
                ));
            }
        }
        if let Some(guesser) = self.guesser {
            effects.push(Effect::to_player(
                guesser,
                ServerMessage::YourTurn(YourTurnMsg {}),
            ));
        }
    }

    /// Handle the Soldier's accusation. Anything out of turn (wrong seat,
    /// wrong state) is dropped without events so probing clients learn
    /// nothing. A valid guess scores the round, reveals everything, and
    /// schedules the deferred advance.
    pub fn submit_guess(
        &mut self,
        points: &RolePoints,
        advance_delay: Duration,
        roster: &mut Roster,
        from: PlayerId,
        target: PlayerId,
        effects: &mut Vec<Effect>,
    ) {
        if self.state != RoundState::AwaitingGuess {
            tracing::debug!(from, "guess outside guessing window dropped");
            return;
        }
        if Some(from) != self.guesser {
            tracing::debug!(from, "guess from non-guesser seat dropped");
            return;
        }
        let Some(actual_target) = self.target else {
            tracing::error!("guessing window open without a dealt target");
            return;
        };

        let correct = target == actual_target;
        let scores = score_round(points, &roster.assignment(), correct);
        roster.apply_round_points(&scores);
        self.state = RoundState::RoundComplete;

        let message = if correct {
            "Soldier caught the Thief!".to_string()
        } else {
            "Soldier accused the wrong seat. Points swapped.".to_string()
        };
        effects.push(Effect::broadcast(ServerMessage::RoundResult(
            RoundResultMsg {
                correct,
                players: roster.snapshot(Visibility::Full),
                message,
            },
        )));
        effects.push(Effect::ScheduleAdvance {
            token: self.advance_token,
            delay: advance_delay,
        });
    }

    /// Move past a completed round: deal the next one, or after the final
    /// round declare the winner and clear per-game state. Tokens from
    /// before a cancellation or an earlier firing are stale and ignored.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        token: AdvanceToken,
        roster: &mut Roster,
        effects: &mut Vec<Effect>,
    ) -> Advance {
        if token != self.advance_token || self.state != RoundState::RoundComplete {
            return Advance::Stale;
        }
        // Consume the token: a timer must not fire twice.
        self.advance_token = self.advance_token.next();

        if self.current_round < self.total_rounds {
            self.state = RoundState::AwaitingRoles;
            self.start_round(rng, roster, effects);
            return Advance::NextRound;
        }

        let winner_listing = winner(roster.players()).map(|p| SeatListing {
            id: p.id,
            name: p.display_name.clone(),
        });
        let final_scores = roster
            .players()
            .iter()
            .map(|p| FinalScoreEntry {
                name: p.display_name.clone(),
                total_points: p.total_points,
            })
            .collect();
        if let Some(winner) = winner_listing {
            effects.push(Effect::broadcast(ServerMessage::GameOver(GameOverMsg {
                winner,
                final_scores,
            })));
        }

        roster.clear_game_state();
        self.current_round = 0;
        self.guesser = None;
        self.target = None;
        self.state = RoundState::SessionComplete;
        Advance::Finished
    }

    /// Abandon the game: invalidate any pending advance, wipe per-game
    /// state. The session emits the cancellation event; this only settles
    /// the machine.
    pub fn cancel(&mut self, roster: &mut Roster) {
        self.advance_token = self.advance_token.next();
        roster.clear_game_state();
        self.current_round = 0;
        self.guesser = None;
        self.target = None;
        self.state = RoundState::SessionComplete;
    }

    /// The seat currently allowed to guess, if a round is open.
    pub fn guesser(&self) -> Option<PlayerId> {
        self.guesser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn full_roster() -> Roster {
        let mut roster = Roster::new();
        for (i, name) in ["Asha", "Bodhi", "Charu", "Dev"].iter().enumerate() {
            roster.try_join(i as PlayerId + 1, name).unwrap();
        }
        roster
    }

    fn count_broadcasts(effects: &[Effect], msg_type: crate::net::messages::MessageType) -> usize {
        effects
            .iter()
            .filter(|e| {
                matches!(e, Effect::Send { to: crate::events::Recipient::All, message }
                    if message.message_type() == msg_type)
            })
            .count()
    }

    #[test]
    fn start_round_emits_start_roles_and_turn() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut roster = full_roster();
        let mut scheduler = RoundScheduler::new(5);
        let mut effects = Vec::new();
        scheduler.start_round(&mut rng, &mut roster, &mut effects);

        assert_eq!(scheduler.state(), RoundState::AwaitingGuess);
        assert_eq!(scheduler.current_round(), 1);
        assert_eq!(
            count_broadcasts(&effects, crate::net::messages::MessageType::RoundStarted),
            1
        );

        let role_reveals = effects
            .iter()
            .filter(|e| {
                matches!(e, Effect::Send { to: crate::events::Recipient::Player(_), message }
                    if matches!(message, ServerMessage::YourRole(_)))
            })
            .count();
        assert_eq!(role_reveals, 4, "one private reveal per seat");

        let turn_notices: Vec<PlayerId> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send {
                    to: crate::events::Recipient::Player(id),
                    message: ServerMessage::YourTurn(_),
                } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(turn_notices, vec![scheduler.guesser().unwrap()]);
        assert_eq!(roster.find_role(Role::GUESSER), scheduler.guesser());
    }

    #[test]
    fn guess_from_wrong_seat_is_dropped() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut roster = full_roster();
        let mut scheduler = RoundScheduler::new(5);
        let mut effects = Vec::new();
        scheduler.start_round(&mut rng, &mut roster, &mut effects);

        let guesser = scheduler.guesser().unwrap();
        let non_guesser = roster.ids().into_iter().find(|&id| id != guesser).unwrap();

        let mut effects = Vec::new();
        scheduler.submit_guess(
            &RolePoints::default(),
            Duration::ZERO,
            &mut roster,
            non_guesser,
            guesser,
            &mut effects,
        );
        assert!(effects.is_empty(), "no events for an out-of-turn guess");
        assert_eq!(scheduler.state(), RoundState::AwaitingGuess);
        assert!(roster.players().iter().all(|p| p.total_points == 0));
    }

    #[test]
    fn correct_guess_scores_and_schedules_advance() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut roster = full_roster();
        let mut scheduler = RoundScheduler::new(5);
        let mut effects = Vec::new();
        scheduler.start_round(&mut rng, &mut roster, &mut effects);

        let guesser = scheduler.guesser().unwrap();
        let thief = roster.find_role(Role::Thief).unwrap();

        let mut effects = Vec::new();
        scheduler.submit_guess(
            &RolePoints::default(),
            Duration::from_secs(5),
            &mut roster,
            guesser,
            thief,
            &mut effects,
        );

        assert_eq!(scheduler.state(), RoundState::RoundComplete);
        match &effects[0] {
            Effect::Send {
                message: ServerMessage::RoundResult(result),
                ..
            } => {
                assert!(result.correct);
                // Full reveal: no Hidden roles in the result snapshot.
                assert!(result.players.iter().all(|s| matches!(
                    s.role,
                    crate::player::RoleView::Revealed(_)
                )));
            },
            other => panic!("expected RoundResult, got {other:?}"),
        }
        assert!(matches!(effects[1], Effect::ScheduleAdvance { .. }));

        let soldier_points = roster.get(guesser).unwrap().round_points;
        let thief_points = roster.get(thief).unwrap().round_points;
        assert_eq!(soldier_points, 700);
        assert_eq!(thief_points, 0);
    }

    #[test]
    fn wrong_guess_swaps_soldier_and_thief_points() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut roster = full_roster();
        let mut scheduler = RoundScheduler::new(5);
        let mut effects = Vec::new();
        scheduler.start_round(&mut rng, &mut roster, &mut effects);

        let guesser = scheduler.guesser().unwrap();
        let king = roster.find_role(Role::King).unwrap();
        let thief = roster.find_role(Role::Thief).unwrap();

        let mut effects = Vec::new();
        scheduler.submit_guess(
            &RolePoints::default(),
            Duration::ZERO,
            &mut roster,
            guesser,
            king,
            &mut effects,
        );

        assert_eq!(roster.get(guesser).unwrap().round_points, 0);
        assert_eq!(roster.get(thief).unwrap().round_points, 700);
        // Round-sum invariant between the two seats.
        let points = RolePoints::default();
        assert_eq!(
            roster.get(guesser).unwrap().round_points + roster.get(thief).unwrap().round_points,
            points.soldier + points.thief
        );
    }

    #[test]
    fn advance_with_stale_token_is_ignored() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut roster = full_roster();
        let mut scheduler = RoundScheduler::new(5);
        let mut effects = Vec::new();
        scheduler.start_round(&mut rng, &mut roster, &mut effects);

        let guesser = scheduler.guesser().unwrap();
        let thief = roster.find_role(Role::Thief).unwrap();
        let mut effects = Vec::new();
        scheduler.submit_guess(
            &RolePoints::default(),
            Duration::ZERO,
            &mut roster,
            guesser,
            thief,
            &mut effects,
        );
        let token = scheduler.advance_token();

        // Cancellation invalidates the pending token.
        scheduler.cancel(&mut roster);
        let mut effects = Vec::new();
        let outcome = scheduler.advance(&mut rng, token, &mut roster, &mut effects);
        assert_eq!(outcome, Advance::Stale);
        assert!(effects.is_empty());
        assert_eq!(scheduler.state(), RoundState::SessionComplete);
    }

    #[test]
    fn advance_deals_next_round_until_final() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut roster = full_roster();
        let mut scheduler = RoundScheduler::new(2);
        let points = RolePoints::default();

        let mut effects = Vec::new();
        scheduler.start_round(&mut rng, &mut roster, &mut effects);

        // Round 1 completes, advance deals round 2.
        let guesser = scheduler.guesser().unwrap();
        let thief = roster.find_role(Role::Thief).unwrap();
        let mut effects = Vec::new();
        scheduler.submit_guess(&points, Duration::ZERO, &mut roster, guesser, thief, &mut effects);
        let token = scheduler.advance_token();
        let mut effects = Vec::new();
        let outcome = scheduler.advance(&mut rng, token, &mut roster, &mut effects);
        assert_eq!(outcome, Advance::NextRound);
        assert_eq!(scheduler.current_round(), 2);
        assert_eq!(
            count_broadcasts(&effects, crate::net::messages::MessageType::RoundStarted),
            1
        );

        // Round 2 is the last: advance finishes the session.
        let guesser = scheduler.guesser().unwrap();
        let thief = roster.find_role(Role::Thief).unwrap();
        let mut effects = Vec::new();
        scheduler.submit_guess(&points, Duration::ZERO, &mut roster, guesser, thief, &mut effects);
        let token = scheduler.advance_token();
        let mut effects = Vec::new();
        let outcome = scheduler.advance(&mut rng, token, &mut roster, &mut effects);
        assert_eq!(outcome, Advance::Finished);
        assert_eq!(
            count_broadcasts(&effects, crate::net::messages::MessageType::GameOver),
            1
        );
        assert_eq!(scheduler.current_round(), 0);
        assert!(roster.players().iter().all(|p| {
            p.role.is_none() && p.round_points == 0 && p.total_points == 0
        }));
    }

    #[test]
    fn advance_token_cannot_fire_twice() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut roster = full_roster();
        let mut scheduler = RoundScheduler::new(3);
        let points = RolePoints::default();

        let mut effects = Vec::new();
        scheduler.start_round(&mut rng, &mut roster, &mut effects);
        let guesser = scheduler.guesser().unwrap();
        let thief = roster.find_role(Role::Thief).unwrap();
        let mut effects = Vec::new();
        scheduler.submit_guess(&points, Duration::ZERO, &mut roster, guesser, thief, &mut effects);

        let token = scheduler.advance_token();
        let mut effects = Vec::new();
        assert_eq!(
            scheduler.advance(&mut rng, token, &mut roster, &mut effects),
            Advance::NextRound
        );
        let mut effects = Vec::new();
        assert_eq!(
            scheduler.advance(&mut rng, token, &mut roster, &mut effects),
            Advance::Stale
        );
    }
}
