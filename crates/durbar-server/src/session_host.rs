use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use durbar_core::events::{AdvanceToken, Effect, Recipient};
use durbar_core::net::messages::{JoinResponseMsg, ServerMessage};
use durbar_core::net::protocol::{ProtocolError, encode_server_message};
use durbar_core::player::PlayerId;
use durbar_core::session::{Phase, Session, SessionConfig, generate_session_code};

use crate::state::SharedSessionHost;

/// Per-player sender for outbound WebSocket binary messages. Bounded so a
/// slow client cannot exhaust memory; `Bytes` makes broadcast clones cheap.
pub type PlayerSender = mpsc::Sender<Bytes>;

struct ConnectedPlayer {
    sender: PlayerSender,
}

struct SessionEntry {
    session: Session,
    connections: HashMap<PlayerId, ConnectedPlayer>,
    last_activity: Instant,
    /// Pending deferred-advance timer. Aborted when a cancellation or a
    /// newer schedule supersedes it; a timer that fires anyway must still
    /// present a current token to the core.
    advance_task: Option<JoinHandle<()>>,
}

/// Owns every active session, keyed by session code. Each session's state
/// is mutated only under the host's write lock: commands are handled one at
/// a time and run to completion, and no partially applied command is ever
/// observable.
pub struct SessionHost {
    sessions: HashMap<String, SessionEntry>,
    next_player_id: PlayerId,
    session_config: SessionConfig,
}

impl SessionHost {
    pub fn new(session_config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            next_player_id: 1,
            session_config,
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Create a new session seated with its first player. Returns the
    /// generated session code and the player's id.
    pub fn create_session(
        &mut self,
        display_name: &str,
        sender: PlayerSender,
        shared: &SharedSessionHost,
    ) -> (String, PlayerId) {
        let code = generate_unique_session_code(&self.sessions);
        let player_id = self.alloc_player_id();

        let mut entry = SessionEntry {
            session: Session::new(self.session_config),
            connections: HashMap::new(),
            last_activity: Instant::now(),
            advance_task: None,
        };
        entry
            .connections
            .insert(player_id, ConnectedPlayer { sender });
        let (result, effects) = entry.session.handle_join(player_id, display_name);
        debug_assert!(result.is_ok(), "first join of a fresh session cannot fail");
        self.sessions.insert(code.clone(), entry);

        self.apply_effects(&code, effects, shared);
        tracing::info!(player_id, session = %code, "session created");
        (code, player_id)
    }

    /// Join an existing session. Returns Err(reason) for unknown codes and
    /// for the session's own capacity/phase rejections.
    pub fn join_session(
        &mut self,
        code: &str,
        display_name: &str,
        sender: PlayerSender,
        shared: &SharedSessionHost,
    ) -> Result<PlayerId, String> {
        if !self.sessions.contains_key(code) {
            return Err("session not found".to_string());
        }
        let player_id = self.alloc_player_id();

        let entry = self
            .sessions
            .get_mut(code)
            .ok_or_else(|| "session not found".to_string())?;
        entry.last_activity = Instant::now();
        let (result, effects) = entry.session.handle_join(player_id, display_name);
        match result {
            Ok(()) => {
                entry
                    .connections
                    .insert(player_id, ConnectedPlayer { sender });
                self.apply_effects(code, effects, shared);
                tracing::info!(player_id, session = %code, "player joined");
                Ok(player_id)
            },
            Err(rejection) => Err(rejection.message().to_string()),
        }
    }

    /// Remove a player on disconnect. Destroys the session if it is now
    /// empty; returns the destroyed code in that case.
    pub fn leave_session(
        &mut self,
        code: &str,
        player_id: PlayerId,
        shared: &SharedSessionHost,
    ) -> Option<String> {
        let entry = self.sessions.get_mut(code)?;
        entry.connections.remove(&player_id);
        entry.last_activity = Instant::now();
        let effects = entry.session.handle_disconnect(player_id);
        let now_empty = entry.session.is_empty();
        self.apply_effects(code, effects, shared);

        if now_empty {
            if let Some(mut entry) = self.sessions.remove(code) {
                if let Some(task) = entry.advance_task.take() {
                    task.abort();
                }
            }
            tracing::info!(session = %code, "empty session destroyed");
            return Some(code.to_string());
        }
        None
    }

    /// Route a guess from a connection into its session.
    pub fn route_guess(
        &mut self,
        code: &str,
        from: PlayerId,
        target: PlayerId,
        shared: &SharedSessionHost,
    ) {
        let Some(entry) = self.sessions.get_mut(code) else {
            return;
        };
        entry.last_activity = Instant::now();
        let effects = entry.session.handle_guess(from, target);
        self.apply_effects(code, effects, shared);
    }

    /// Fire a deferred advance. Stale tokens are dropped inside the core.
    pub fn advance(&mut self, code: &str, token: AdvanceToken, shared: &SharedSessionHost) {
        let Some(entry) = self.sessions.get_mut(code) else {
            return;
        };
        let effects = entry.session.advance(token);
        self.apply_effects(code, effects, shared);
    }

    fn apply_effects(&mut self, code: &str, effects: Vec<Effect>, shared: &SharedSessionHost) {
        for effect in effects {
            match effect {
                Effect::Send { to, message } => self.deliver(code, to, &message),
                Effect::ScheduleAdvance { token, delay } => {
                    let Some(entry) = self.sessions.get_mut(code) else {
                        continue;
                    };
                    // A newer schedule supersedes any pending one.
                    if let Some(task) = entry.advance_task.take() {
                        task.abort();
                    }
                    let shared = Arc::clone(shared);
                    let code = code.to_string();
                    entry.advance_task = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let mut host = shared.write().await;
                        host.advance(&code, token, &shared);
                    }));
                },
                Effect::CancelAdvance => {
                    if let Some(entry) = self.sessions.get_mut(code)
                        && let Some(task) = entry.advance_task.take()
                    {
                        task.abort();
                    }
                },
            }
        }
    }

    fn deliver(&self, code: &str, to: Recipient, message: &ServerMessage) {
        let data = match encode_server_message(message) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                tracing::error!(session = %code, error = %e, "failed to encode server message");
                return;
            },
        };
        let Some(entry) = self.sessions.get(code) else {
            return;
        };
        match to {
            Recipient::All => {
                for (&player_id, conn) in &entry.connections {
                    if let Err(e) = conn.sender.try_send(data.clone()) {
                        tracing::debug!(
                            player_id, session = %code, error = %e,
                            "skipping broadcast to slow client"
                        );
                    }
                }
            },
            Recipient::Player(player_id) => {
                if let Some(conn) = entry.connections.get(&player_id)
                    && let Err(e) = conn.sender.try_send(data)
                {
                    tracing::debug!(
                        player_id, session = %code, error = %e,
                        "failed to send to player (slow or disconnected)"
                    );
                }
            },
        }
    }

    /// (active sessions, seated players) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        let players = self
            .sessions
            .values()
            .map(|e| e.session.roster().len())
            .sum();
        (self.sessions.len(), players)
    }

    /// Remove sessions idle for longer than `max_idle`, aborting their
    /// pending timers. Returns the number removed.
    pub fn cleanup_idle_sessions(&mut self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_activity) >= max_idle)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &stale {
            if let Some(mut entry) = self.sessions.remove(code) {
                if let Some(task) = entry.advance_task.take() {
                    task.abort();
                }
                tracing::info!(session = %code, "idle session removed");
            }
        }
        stale.len()
    }

    pub fn session_phase(&self, code: &str) -> Option<Phase> {
        self.sessions.get(code).map(|e| e.session.phase())
    }

    pub fn session_exists(&self, code: &str) -> bool {
        self.sessions.contains_key(code)
    }

    /// Build a successful join acknowledgement.
    pub fn make_join_response(
        player_id: PlayerId,
        session_code: &str,
    ) -> Result<Vec<u8>, ProtocolError> {
        encode_server_message(&ServerMessage::JoinResponse(JoinResponseMsg {
            success: true,
            player_id: Some(player_id),
            session_code: Some(session_code.to_string()),
            message: None,
        }))
    }

    /// Build a join rejection acknowledgement.
    pub fn make_join_error(message: &str) -> Result<Vec<u8>, ProtocolError> {
        encode_server_message(&ServerMessage::JoinResponse(JoinResponseMsg {
            success: false,
            player_id: None,
            session_code: None,
            message: Some(message.to_string()),
        }))
    }
}

/// Generate a session code not already in use, retrying on collision.
fn generate_unique_session_code(existing: &HashMap<String, SessionEntry>) -> String {
    loop {
        let code = generate_session_code();
        if !existing.contains_key(&code) {
            return code;
        }
    }
}
