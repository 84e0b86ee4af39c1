//! Integration tests for the server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use skirmish::prelude::*;
use skirmish::{ERR_BAD_REQUEST, ERR_UNAUTHORIZED};
use skirmish_protocol::{ClientMessage, Envelope, GameOverReason, PROTOCOL_VERSION, ServerMessage};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its address and sink.
async fn start_server_with(match_config: MatchConfig) -> (String, MemorySink) {
    let sink = MemorySink::new();
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        match_config,
        ..ServerConfig::default()
    };
    let server = SkirmishServerBuilder::new()
        .config(config)
        .build(TokenAuthenticator, sink.clone())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, sink)
}

async fn start_server() -> String {
    start_server_with(MatchConfig::default()).await.0
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).expect("encode");
    ws.send(Message::text(text)).await.expect("send");
}

async fn send_raw(ws: &mut ClientWs, text: &str) {
    ws.send(Message::text(text.to_string())).await.expect("send");
}

async fn recv(ws: &mut ClientWs) -> Envelope<ServerMessage> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("decode"),
            Message::Binary(data) => return serde_json::from_slice(&data).expect("decode"),
            _ => continue,
        }
    }
}

async fn recv_until(
    ws: &mut ClientWs,
    pred: impl Fn(&ServerMessage) -> bool,
) -> Envelope<ServerMessage> {
    loop {
        let env = recv(ws).await;
        if pred(&env.payload) {
            return env;
        }
    }
}

async fn expect_closed(ws: &mut ClientWs) {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("connection should close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

fn hello(token: &str) -> ClientMessage {
    ClientMessage::Hello {
        version: PROTOCOL_VERSION,
        token: token.to_string(),
    }
}

/// Connects and completes the handshake as `player`.
async fn login(addr: &str, player: u64) -> ClientWs {
    let mut ws = connect(addr).await;
    send(&mut ws, &hello(&player.to_string())).await;
    let welcome = recv(&mut ws).await;
    assert!(matches!(welcome.payload, ServerMessage::Welcome { .. }));
    ws
}

fn join(room: &str) -> ClientMessage {
    ClientMessage::Join {
        room_id: RoomId::new(room),
        name: None,
        team: None,
    }
}

fn is_setup_start(m: &ServerMessage) -> bool {
    matches!(m, ServerMessage::SetupStart { .. })
}

fn is_game_over(m: &ServerMessage) -> bool {
    matches!(m, ServerMessage::GameOver { .. })
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_success() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, &hello("42")).await;
    let welcome = recv(&mut ws).await;
    assert_eq!(welcome.seq, 0);
    match welcome.payload {
        ServerMessage::Welcome { player_id, server_time } => {
            assert_eq!(player_id, PlayerId(42));
            assert!(server_time > 0);
        }
        other => panic!("expected Welcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_version_mismatch() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        &ClientMessage::Hello {
            version: 999,
            token: "1".into(),
        },
    )
    .await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, ERR_BAD_REQUEST);
            assert!(message.contains("version"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_handshake_auth_failure() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, &hello("not-a-number")).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, ERR_UNAUTHORIZED),
        other => panic!("expected Error 401, got {other:?}"),
    }
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_first_frame_must_be_hello() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, &ClientMessage::Heartbeat { client_time: 1 }).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, ERR_BAD_REQUEST),
        other => panic!("expected Error, got {other:?}"),
    }
    expect_closed(&mut ws).await;
}

// =========================================================================
// Connection frames
// =========================================================================

#[tokio::test]
async fn test_heartbeat_response() {
    let addr = start_server().await;
    let mut ws = login(&addr, 1).await;

    send(&mut ws, &ClientMessage::Heartbeat { client_time: 12345 }).await;
    let ack = recv(&mut ws).await;
    assert_eq!(ack.seq, 1);
    match ack.payload {
        ServerMessage::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 12345),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frames_are_dropped_silently() {
    let addr = start_server().await;
    let mut ws = login(&addr, 1).await;

    send_raw(&mut ws, "not json at all").await;
    send_raw(&mut ws, r#"{"type":"remove","row":-1,"col":0}"#).await;
    send_raw(&mut ws, r#"{"type":"tie_choice","choice":"lizard"}"#).await;
    send_raw(&mut ws, r#"{"type":"teleport"}"#).await;
    send(&mut ws, &ClientMessage::Heartbeat { client_time: 7 }).await;

    // Nothing answered the junk; the connection is still alive.
    let next = recv(&mut ws).await;
    assert!(matches!(
        next.payload,
        ServerMessage::HeartbeatAck { client_time: 7, .. }
    ));
}

#[tokio::test]
async fn test_action_outside_room_is_ignored() {
    let addr = start_server().await;
    let mut ws = login(&addr, 1).await;

    send(&mut ws, &ClientMessage::Ready).await;
    send(&mut ws, &ClientMessage::Heartbeat { client_time: 9 }).await;
    let next = recv(&mut ws).await;
    assert!(matches!(next.payload, ServerMessage::HeartbeatAck { .. }));
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_two_players_enter_setup() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;

    send(&mut alice, &join("r1")).await;
    let joined = recv_until(&mut alice, |m| matches!(m, ServerMessage::Joined { .. })).await;
    match joined.payload {
        ServerMessage::Joined { room_id, player_id, .. } => {
            assert_eq!(room_id, RoomId::new("r1"));
            assert_eq!(player_id, PlayerId(1));
        }
        other => panic!("unexpected {other:?}"),
    }

    send(&mut bob, &join("r1")).await;
    for ws in [&mut alice, &mut bob] {
        let start = recv_until(ws, is_setup_start).await;
        let ServerMessage::SetupStart { players, grid, .. } = start.payload else {
            unreachable!()
        };
        assert_eq!(players.len(), 2);
        assert_eq!(grid.occupied(), 0);
    }
}

#[tokio::test]
async fn test_sequence_numbers_increase_per_connection() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;

    let mut last = 0; // welcome was seq 0
    loop {
        let env = recv(&mut alice).await;
        assert_eq!(env.seq, last + 1);
        last = env.seq;
        if is_setup_start(&env.payload) {
            break;
        }
    }
}

#[tokio::test]
async fn test_third_player_gets_room_full() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    let mut carol = login(&addr, 3).await;

    send(&mut alice, &join("r1")).await;
    recv_until(&mut alice, |m| matches!(m, ServerMessage::Joined { .. })).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut bob, |m| matches!(m, ServerMessage::Joined { .. })).await;

    send(&mut carol, &join("r1")).await;
    let full = recv(&mut carol).await;
    assert_eq!(
        full.payload,
        ServerMessage::RoomFull {
            room_id: RoomId::new("r1")
        }
    );
}

#[tokio::test]
async fn test_invalid_room_id_is_an_error() {
    let addr = start_server().await;
    let mut ws = login(&addr, 1).await;

    send(&mut ws, &join("")).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Error { code, .. } => assert_eq!(code, ERR_BAD_REQUEST),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_emote_is_relayed_to_opponent() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut bob, is_setup_start).await;

    send(&mut alice, &ClientMessage::Emote { emoji: "gg".into() }).await;
    let emote = recv_until(&mut bob, |m| matches!(m, ServerMessage::Emote { .. })).await;
    assert_eq!(
        emote.payload,
        ServerMessage::Emote {
            player_id: PlayerId(1),
            emoji: "gg".into()
        }
    );
}

#[tokio::test]
async fn test_both_ready_starts_the_game() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut alice, is_setup_start).await;
    recv_until(&mut bob, is_setup_start).await;

    for ws in [&mut alice, &mut bob] {
        send(ws, &ClientMessage::Randomize).await;
        send(ws, &ClientMessage::Ready).await;
    }

    for ws in [&mut alice, &mut bob] {
        let start = recv_until(ws, |m| matches!(m, ServerMessage::GameStart { .. })).await;
        let ServerMessage::GameStart { state, turn_start_time } = start.payload else {
            unreachable!()
        };
        assert_eq!(state.current_turn, Some(PlayerId(1)));
        assert_eq!(state.grid.occupied(), 24);
        assert!(turn_start_time > 0);
    }
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_dropped_socket_forfeits_after_grace() {
    let (addr, sink) = start_server_with(MatchConfig {
        reconnect_grace: Duration::from_millis(300),
        ..MatchConfig::default()
    })
    .await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut alice, is_setup_start).await;

    bob.close(None).await.expect("close");
    drop(bob);

    recv_until(&mut alice, |m| {
        matches!(m, ServerMessage::PlayerDisconnected { player_id } if *player_id == PlayerId(2))
    })
    .await;
    let over = recv_until(&mut alice, is_game_over).await;
    assert_eq!(
        over.payload,
        ServerMessage::GameOver {
            winner_id: PlayerId(1),
            flag_capture: false,
            disconnect_win: true,
            reason: GameOverReason::Forfeit,
        }
    );

    let mut recorded = Vec::new();
    for _ in 0..50 {
        recorded = sink.outcomes();
        if !recorded.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].winner, PlayerId(1));
    assert_eq!(recorded[0].loser, PlayerId(2));
}

#[tokio::test]
async fn test_reconnect_with_same_token_reclaims_seat() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut alice, is_setup_start).await;

    bob.close(None).await.expect("close");
    drop(bob);
    recv_until(&mut alice, |m| matches!(m, ServerMessage::PlayerDisconnected { .. })).await;

    let mut bob = login(&addr, 2).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut bob, |m| matches!(m, ServerMessage::Joined { .. })).await;
    let snapshot = recv_until(&mut bob, is_setup_start).await;
    let ServerMessage::SetupStart { room_id, .. } = snapshot.payload else {
        unreachable!()
    };
    assert_eq!(room_id, RoomId::new("r1"));

    recv_until(&mut alice, |m| {
        matches!(m, ServerMessage::PlayerReconnected { player_id } if *player_id == PlayerId(2))
    })
    .await;
}

#[tokio::test]
async fn test_leave_forfeits_running_match() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut bob, is_setup_start).await;

    send(&mut alice, &ClientMessage::Leave).await;
    let over = recv_until(&mut bob, is_game_over).await;
    assert!(matches!(
        over.payload,
        ServerMessage::GameOver {
            reason: GameOverReason::Forfeit,
            disconnect_win: true,
            ..
        }
    ));
}

#[tokio::test]
async fn test_refused_room_switch_keeps_current_match() {
    let (addr, sink) = start_server_with(MatchConfig::default()).await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    let mut carol = login(&addr, 3).await;
    let mut dave = login(&addr, 4).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut bob, is_setup_start).await;
    send(&mut carol, &join("r2")).await;
    send(&mut dave, &join("r2")).await;
    recv_until(&mut dave, is_setup_start).await;

    send(&mut alice, &join("r2")).await;
    recv_until(&mut alice, |m| matches!(m, ServerMessage::RoomFull { .. })).await;

    // Alice still holds her seat in r1, so her emote reaches Bob.
    send(&mut alice, &ClientMessage::Emote { emoji: "still here".into() }).await;
    loop {
        let env = recv(&mut bob).await;
        assert!(!is_game_over(&env.payload), "match ended: {:?}", env.payload);
        if matches!(env.payload, ServerMessage::Emote { .. }) {
            break;
        }
    }
    assert!(sink.outcomes().is_empty());
}

#[tokio::test]
async fn test_switching_rooms_forfeits_the_old_match() {
    let addr = start_server().await;
    let mut alice = login(&addr, 1).await;
    let mut bob = login(&addr, 2).await;
    send(&mut alice, &join("r1")).await;
    send(&mut bob, &join("r1")).await;
    recv_until(&mut bob, is_setup_start).await;

    send(&mut alice, &join("r3")).await;
    let joined = recv_until(&mut alice, |m| matches!(m, ServerMessage::Joined { .. })).await;
    assert!(matches!(
        joined.payload,
        ServerMessage::Joined { ref room_id, .. } if *room_id == RoomId::new("r3")
    ));
    let over = recv_until(&mut bob, is_game_over).await;
    assert!(matches!(
        over.payload,
        ServerMessage::GameOver {
            winner_id: PlayerId(2),
            reason: GameOverReason::Forfeit,
            ..
        }
    ));
}
