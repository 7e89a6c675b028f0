use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use durbar_core::net::messages::{
    ClientMessage, GuessMsg, JoinMsg, JoinResponseMsg, MessageType, ServerMessage,
};
use durbar_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};
use durbar_core::player::PlayerId;

use durbar_server::build_app;
use durbar_server::config::{GameConfig, ServerConfig};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default config except a near-zero advance
    /// delay, so rounds progress without real waiting.
    pub async fn new() -> Self {
        Self::with_game(GameConfig {
            advance_delay_secs: 0,
            ..GameConfig::default()
        })
        .await
    }

    /// Start a test server with a specific game policy.
    pub async fn with_game(game: GameConfig) -> Self {
        let config = ServerConfig {
            game,
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsClient {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Read the next binary frame, panicking after a generous timeout.
pub async fn ws_read_raw(stream: &mut WsClient) -> Vec<u8> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream closed")
            .expect("websocket error");
        if let Message::Binary(data) = msg {
            return data.to_vec();
        }
    }
}

/// Read and decode the next server message.
pub async fn ws_read_server_msg(stream: &mut WsClient) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Try to read a server message, returning None if nothing arrives in time.
pub async fn ws_try_read(stream: &mut WsClient, wait: Duration) -> Option<ServerMessage> {
    match tokio::time::timeout(wait, stream.next()).await {
        Ok(Some(Ok(Message::Binary(data)))) => Some(decode_server_message(&data).unwrap()),
        _ => None,
    }
}

/// Read server messages until one matches the wanted type, returning it.
/// Panics if the type does not show up within the timeout.
pub async fn ws_read_until(stream: &mut WsClient, wanted: MessageType) -> ServerMessage {
    for _ in 0..50 {
        let msg = ws_read_server_msg(stream).await;
        if msg.message_type() == wanted {
            return msg;
        }
    }
    panic!("did not receive {wanted:?}");
}

async fn ws_send_join(stream: &mut WsClient, session_code: &str, name: &str) {
    let msg = ClientMessage::Join(JoinMsg {
        session_code: session_code.to_string(),
        display_name: name.to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    let encoded = encode_client_message(&msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Join with an empty session code (create a new session).
/// Returns (JoinResponse, session_code).
pub async fn ws_create_session(stream: &mut WsClient, name: &str) -> (JoinResponseMsg, String) {
    ws_send_join(stream, "", name).await;
    match ws_read_server_msg(stream).await {
        ServerMessage::JoinResponse(resp) => {
            assert!(resp.success, "expected successful join: {resp:?}");
            let code = resp.session_code.clone().unwrap();
            (resp, code)
        },
        other => panic!("expected JoinResponse, got: {other:?}"),
    }
}

/// Join an existing session. Returns the JoinResponse, success or not.
pub async fn ws_join_session(
    stream: &mut WsClient,
    session_code: &str,
    name: &str,
) -> JoinResponseMsg {
    ws_send_join(stream, session_code, name).await;
    match ws_read_server_msg(stream).await {
        ServerMessage::JoinResponse(resp) => resp,
        other => panic!("expected JoinResponse, got: {other:?}"),
    }
}

/// Send a guess naming `target_id`.
pub async fn ws_send_guess(stream: &mut WsClient, target_id: PlayerId) {
    let msg = ClientMessage::Guess(GuessMsg { target_id });
    let encoded = encode_client_message(&msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// A connected seat in a running test game.
pub struct Seat {
    pub stream: WsClient,
    pub player_id: PlayerId,
    pub name: &'static str,
}

/// Connect four players into one fresh session. Returns the seats (in join
/// order) and the session code. The fourth join starts the game.
pub async fn seat_four(server: &TestServer) -> (Vec<Seat>, String) {
    let names: [&'static str; 4] = ["Asha", "Bodhi", "Charu", "Dev"];

    let mut first = ws_connect(&server.ws_url()).await;
    let (resp, code) = ws_create_session(&mut first, names[0]).await;
    let mut seats = vec![Seat {
        stream: first,
        player_id: resp.player_id.unwrap(),
        name: names[0],
    }];

    for &name in &names[1..] {
        let mut stream = ws_connect(&server.ws_url()).await;
        let resp = ws_join_session(&mut stream, &code, name).await;
        assert!(resp.success, "join failed for {name}: {resp:?}");
        seats.push(Seat {
            stream,
            player_id: resp.player_id.unwrap(),
            name,
        });
    }

    (seats, code)
}
