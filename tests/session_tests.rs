//! End-to-end session scenarios driven through registered test connections:
//! the gateway, rooms, clocks and side protocols without the WebSocket
//! transport in the way.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use gambit_server::config::AppConfig;
use gambit_server::protocol::{
    AckFrame, ClientFrame, ConnId, GameStatus, Outbound, ServerEvent, Side, UserBrief,
};
use gambit_server::server::GameServer;
use gambit_server::social::InMemorySocialGraph;

struct TestClient {
    conn_id: ConnId,
    user: UserBrief,
    rx: mpsc::Receiver<Outbound>,
}

struct Harness {
    server: Arc<GameServer>,
    social: Arc<InMemorySocialGraph>,
}

fn harness() -> Harness {
    let social = Arc::new(InMemorySocialGraph::new());
    let server = GameServer::new(AppConfig::default(), social.clone());
    Harness { server, social }
}

impl Harness {
    async fn connect(&self, user_id: &str, username: &str) -> TestClient {
        let (tx, rx) = mpsc::channel(256);
        let user = UserBrief {
            user_id: user_id.to_string(),
            username: username.to_string(),
        };
        let conn_id = self.server.connect_client(user.clone(), tx).await;
        TestClient { conn_id, user, rx }
    }

    async fn request(&self, client: &TestClient, event: &str, data: Value) -> AckFrame {
        let frame = ClientFrame {
            event: event.to_string(),
            seq: Some(1),
            data,
        };
        self.server
            .handle_frame(client.conn_id, frame)
            .await
            .expect("ack-bearing event must produce an ack")
    }

    /// Create a room with `a`, join with `b`, and return the room code.
    async fn start_game(&self, a: &TestClient, b: &TestClient) -> String {
        let ack = self.request(a, "room:create", Value::Null).await;
        assert!(ack.ok, "room:create failed: {:?}", ack.error);
        let code = ack.data.as_ref().unwrap()["roomId"]
            .as_str()
            .unwrap()
            .to_string();
        let ack = self
            .request(b, "room:join", json!({ "roomId": code }))
            .await;
        assert!(ack.ok, "room:join failed: {:?}", ack.error);
        code
    }
}

impl TestClient {
    /// Next server-push event, skipping acks. Panics after a short timeout.
    async fn next_event(&mut self) -> Arc<ServerEvent> {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("connection queue closed");
            if let Outbound::Event(event) = frame {
                return event;
            }
        }
    }

    /// Skip events until one matches the predicate.
    async fn expect_event<F>(&mut self, mut pred: F) -> Arc<ServerEvent>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        for _ in 0..64 {
            let event = self.next_event().await;
            if pred(&event) {
                return event;
            }
        }
        panic!("expected event not observed within 64 frames");
    }

    fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

fn game_start(event: &ServerEvent) -> Option<&gambit_server::protocol::GameStartBody> {
    match event {
        ServerEvent::GameStart(body) => Some(body),
        _ => None,
    }
}

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[tokio::test]
async fn happy_path_create_join_and_auto_start() {
    let h = harness();
    let mut u1 = h.connect("u1", "alice").await;
    let mut u2 = h.connect("u2", "bob").await;

    let ack = h.request(&u1, "room:create", Value::Null).await;
    assert!(ack.ok);
    let data = ack.data.unwrap();
    let code = data["roomId"].as_str().unwrap().to_string();
    assert!(code.len() >= 6);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(data["status"], "waiting");

    let ack = h.request(&u2, "room:join", json!({ "roomId": code })).await;
    assert!(ack.ok);
    assert_eq!(ack.data.unwrap()["status"], "playing");

    // Both players receive the same game:start with the opening position.
    for client in [&mut u1, &mut u2] {
        let event = client.expect_event(|e| game_start(e).is_some()).await;
        let start = game_start(&event).unwrap();
        assert_eq!(start.fen, START_FEN);
        assert_eq!(start.turn, Side::White);
        let mut ids = vec![start.white.user_id.clone(), start.black.user_id.clone()];
        ids.sort();
        assert_eq!(ids, vec!["u1", "u2"]);
    }
}

#[tokio::test]
async fn client_seed_is_accepted_and_normalized() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let ack = h
        .request(&u1, "room:create", json!({ "roomId": "myroom99" }))
        .await;
    assert!(ack.ok);
    assert_eq!(ack.data.unwrap()["roomId"], "MYROOM99");

    // Second create while still seated is rejected.
    let u1b = h.connect("u1", "alice").await;
    let ack = h.request(&u1b, "room:create", Value::Null).await;
    assert_eq!(ack.error.as_deref(), Some("You are already in a room"));
}

#[tokio::test]
async fn join_errors_cover_the_taxonomy() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    let u3 = h.connect("u3", "carol").await;

    let ack = h
        .request(&u1, "room:join", json!({ "roomId": "NOSUCH99" }))
        .await;
    assert_eq!(ack.error.as_deref(), Some("Room not found"));

    let ack = h.request(&u1, "room:join", json!({ "roomId": "ab" })).await;
    assert_eq!(ack.error.as_deref(), Some("Invalid room"));

    let code = h.start_game(&u1, &u2).await;
    let ack = h.request(&u3, "room:join", json!({ "roomId": code })).await;
    assert_eq!(ack.error.as_deref(), Some("Room is full"));

    let other = h.request(&u3, "room:create", Value::Null).await;
    let other_code = other.data.unwrap()["roomId"].as_str().unwrap().to_string();
    assert_ne!(other_code, code);
    let ack = h.request(&u1, "room:join", json!({ "roomId": other_code })).await;
    assert_eq!(ack.error.as_deref(), Some("Leave your current room first"));

    let ack = h.request(&u3, "chess:move", json!({ "from": "e2", "to": "e4" })).await;
    assert_eq!(ack.error.as_deref(), Some("Game not started"));
}

#[tokio::test]
async fn room_state_is_stable_between_events() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    h.start_game(&u1, &u2).await;

    let a = h.request(&u1, "room:state", Value::Null).await;
    let b = h.request(&u1, "room:state", Value::Null).await;
    assert!(a.ok && b.ok);
    assert_eq!(a.data, b.data);
}

#[tokio::test]
async fn timeout_is_observed_lazily_and_blocks_moves() {
    let h = harness();
    let mut u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    let code = h.start_game(&u1, &u2).await;

    // 181 seconds pass with white never moving: fold them into the clock
    // through the room handle, the way any snapshot request would.
    let handle = h.server.room_handle(&code).unwrap();
    {
        let mut room = handle.lock().await;
        let now = chrono::Utc::now().timestamp_millis();
        let snap = room.snapshot(now + 181_000).unwrap();
        assert_eq!(snap.status, GameStatus::Timeout);
        assert_eq!(snap.winner_color, Some(Side::Black));
        assert_eq!(snap.clock_ms.w, 0);
    }

    u1.drain();
    let ack = h
        .request(&u1, "chess:move", json!({ "from": "e2", "to": "e4" }))
        .await;
    assert_eq!(ack.error.as_deref(), Some("Game is already over"));

    // The rejected move pushed the terminal snapshot to the room.
    let event = u1
        .expect_event(|e| matches!(e, ServerEvent::GameOver(_)))
        .await;
    let ServerEvent::GameOver(snap) = event.as_ref() else {
        unreachable!()
    };
    assert_eq!(snap.status, GameStatus::Timeout);
    assert_eq!(snap.winner_color, Some(Side::Black));
}

#[tokio::test]
async fn draw_offer_accepted_ends_in_draw() {
    let h = harness();
    let mut u1 = h.connect("u1", "alice").await;
    let mut u2 = h.connect("u2", "bob").await;
    h.start_game(&u1, &u2).await;
    u1.drain();
    u2.drain();

    let ack = h.request(&u1, "game:draw:request", Value::Null).await;
    assert!(ack.ok);
    assert_eq!(ack.data.unwrap()["waitingFor"], "u2");

    let event = u2
        .expect_event(|e| matches!(e, ServerEvent::DrawRequested { .. }))
        .await;
    let ServerEvent::DrawRequested { from } = event.as_ref() else {
        unreachable!()
    };
    assert_eq!(from.user_id, "u1");

    let ack = h
        .request(&u2, "game:draw:respond", json!({ "accept": true }))
        .await;
    assert!(ack.ok);
    assert_eq!(ack.data.unwrap()["accepted"], true);

    for client in [&mut u1, &mut u2] {
        let event = client
            .expect_event(|e| matches!(e, ServerEvent::GameOver(_)))
            .await;
        let ServerEvent::GameOver(snap) = event.as_ref() else {
            unreachable!()
        };
        assert_eq!(snap.status, GameStatus::Draw);
        assert_eq!(snap.winner_color, None);
    }
}

#[tokio::test]
async fn draw_respond_without_offer_is_rejected() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    h.start_game(&u1, &u2).await;

    let ack = h
        .request(&u2, "game:draw:respond", json!({ "accept": true }))
        .await;
    assert_eq!(ack.error.as_deref(), Some("No draw request to respond to"));
}

#[tokio::test]
async fn fools_mate_then_rematch_restarts_fresh() {
    let h = harness();
    let mut u1 = h.connect("u1", "alice").await;
    let mut u2 = h.connect("u2", "bob").await;
    h.start_game(&u1, &u2).await;

    let event = u1.expect_event(|e| game_start(e).is_some()).await;
    let start = game_start(&event).unwrap().clone();
    let (white, black) = if start.white.user_id == "u1" {
        (&u1, &u2)
    } else {
        (&u2, &u1)
    };

    for (client, from, to) in [
        (white, "f2", "f3"),
        (black, "e7", "e5"),
        (white, "g2", "g4"),
    ] {
        let ack = h
            .request(client, "chess:move", json!({ "from": from, "to": to }))
            .await;
        assert!(ack.ok, "move {from}{to} failed: {:?}", ack.error);
    }
    let ack = h
        .request(black, "chess:move", json!({ "from": "d8", "to": "h4" }))
        .await;
    assert!(ack.ok);
    assert_eq!(ack.data.as_ref().unwrap()["san"], "Qh4#");

    // Moving after mate is rejected.
    let ack = h
        .request(white, "chess:move", json!({ "from": "e2", "to": "e4" }))
        .await;
    assert_eq!(ack.error.as_deref(), Some("Game is already over"));

    let black_id = start.black.user_id.clone();
    for client in [&mut u1, &mut u2] {
        let event = client
            .expect_event(|e| matches!(e, ServerEvent::GameOver(_)))
            .await;
        let ServerEvent::GameOver(snap) = event.as_ref() else {
            unreachable!()
        };
        assert_eq!(snap.status, GameStatus::Checkmate);
        assert_eq!(snap.winner_color, Some(Side::Black));
        assert_eq!(snap.players.black.user_id, black_id);
    }

    // Rematch handshake.
    let ack = h.request(&u1, "game:rematch:request", Value::Null).await;
    assert!(ack.ok);
    assert_eq!(ack.data.unwrap()["waitingFor"], "u2");

    let event = u2
        .expect_event(|e| matches!(e, ServerEvent::RematchRequested { .. }))
        .await;
    assert!(matches!(event.as_ref(), ServerEvent::RematchRequested { from } if from.user_id == "u1"));

    u1.drain();
    u2.drain();
    let ack = h
        .request(&u2, "game:rematch:respond", json!({ "accept": true }))
        .await;
    assert!(ack.ok);
    assert_eq!(ack.data.unwrap()["started"], true);

    for client in [&mut u1, &mut u2] {
        client
            .expect_event(
                |e| matches!(e, ServerEvent::RematchStatus(body) if body.status == "started"),
            )
            .await;
        let event = client.expect_event(|e| game_start(e).is_some()).await;
        let fresh = game_start(&event).unwrap();
        assert_eq!(fresh.fen, START_FEN);
        let event = client
            .expect_event(|e| matches!(e, ServerEvent::GameState(_)))
            .await;
        let ServerEvent::GameState(snap) = event.as_ref() else {
            unreachable!()
        };
        assert_eq!(snap.status, GameStatus::Active);
        assert_eq!(snap.clock_ms.w, 180_000);
    }
}

#[tokio::test]
async fn rematch_before_game_over_is_rejected() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    h.start_game(&u1, &u2).await;

    let ack = h.request(&u1, "game:rematch:request", Value::Null).await;
    assert_eq!(
        ack.error.as_deref(),
        Some("Rematch is only available after game over")
    );
}

#[tokio::test]
async fn invite_gating_follows_check_order() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    h.start_game(&u1, &u2).await;

    let ack = h.request(&u1, "invite:send", json!({})).await;
    assert_eq!(ack.error.as_deref(), Some("Missing target user"));

    let ack = h
        .request(&u1, "invite:send", json!({ "toUserId": "u1" }))
        .await;
    assert_eq!(ack.error.as_deref(), Some("You cannot invite yourself"));

    // Not friends yet.
    let ack = h
        .request(&u1, "invite:send", json!({ "toUserId": "u3" }))
        .await;
    assert_eq!(
        ack.error.as_deref(),
        Some("You can only invite users from your friend list")
    );

    // Friends but offline.
    h.social.add_friendship("u1", "u3");
    let ack = h
        .request(&u1, "invite:send", json!({ "toUserId": "u3" }))
        .await;
    assert_eq!(ack.error.as_deref(), Some("Friend is offline"));

    // Online with two tabs: both connections get the invite.
    let mut tab_a = h.connect("u3", "carol").await;
    let mut tab_b = h.connect("u3", "carol").await;
    let ack = h
        .request(&u1, "invite:send", json!({ "toUserId": "u3" }))
        .await;
    assert!(ack.ok);
    let data = ack.data.unwrap();
    let code = data["roomId"].as_str().unwrap();
    assert_eq!(
        data["inviteLink"],
        format!("http://localhost:5173/?room={code}")
    );

    for tab in [&mut tab_a, &mut tab_b] {
        let event = tab
            .expect_event(|e| matches!(e, ServerEvent::InviteReceived(_)))
            .await;
        let ServerEvent::InviteReceived(body) = event.as_ref() else {
            unreachable!()
        };
        assert_eq!(body.from.user_id, "u1");
        assert_eq!(body.room_id, code);
    }
}

#[tokio::test]
async fn invite_without_room_requires_joining_first() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    h.social.add_friendship("u1", "u2");
    let _u2 = h.connect("u2", "bob").await;

    let ack = h
        .request(&u1, "invite:send", json!({ "toUserId": "u2" }))
        .await;
    assert_eq!(ack.error.as_deref(), Some("Create or join a room first"));
}

#[tokio::test]
async fn disconnect_without_leave_keeps_the_seat() {
    let h = harness();
    let mut u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    let code = h.start_game(&u1, &u2).await;
    u1.drain();

    h.server.unregister_connection(u2.conn_id).await;

    // Remaining player sees the teammate offline, still seated.
    let event = u1
        .expect_event(|e| matches!(e, ServerEvent::RoomState(_)))
        .await;
    let ServerEvent::RoomState(state) = event.as_ref() else {
        unreachable!()
    };
    assert_eq!(state.players.len(), 2);
    let bob = state.players.iter().find(|p| p.user_id == "u2").unwrap();
    assert!(!bob.online);

    // Reconnect: the new connection is re-subscribed and replayed the
    // current room and game snapshot; the game proceeds.
    let mut u2 = h.connect("u2", "bob").await;
    let event = u2
        .expect_event(|e| matches!(e, ServerEvent::RoomState(_)))
        .await;
    let ServerEvent::RoomState(state) = event.as_ref() else {
        unreachable!()
    };
    assert_eq!(state.room_id, code);
    let event = u2
        .expect_event(|e| matches!(e, ServerEvent::GameState(_)))
        .await;
    let ServerEvent::GameState(snap) = event.as_ref() else {
        unreachable!()
    };
    assert_eq!(snap.status, GameStatus::Active);

    let ack = h.request(&u2, "room:state", Value::Null).await;
    assert!(ack.ok);
}

#[tokio::test]
async fn leaving_mid_game_drops_the_game_without_forfeit() {
    let h = harness();
    let mut u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    h.start_game(&u1, &u2).await;
    u1.drain();

    let ack = h.request(&u2, "room:leave", Value::Null).await;
    assert!(ack.ok);

    let event = u1
        .expect_event(|e| matches!(e, ServerEvent::RoomError { .. }))
        .await;
    assert!(
        matches!(event.as_ref(), ServerEvent::RoomError { message } if message == "bob left the room")
    );
    let event = u1
        .expect_event(|e| matches!(e, ServerEvent::RoomState(_)))
        .await;
    let ServerEvent::RoomState(state) = event.as_ref() else {
        unreachable!()
    };
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.status, gambit_server::protocol::RoomPhase::Waiting);

    // No game anymore.
    let ack = h.request(&u1, "game:state", Value::Null).await;
    assert_eq!(ack.error.as_deref(), Some("Game not started"));
}

#[tokio::test]
async fn last_leaver_destroys_the_room() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let ack = h.request(&u1, "room:create", Value::Null).await;
    let code = ack.data.unwrap()["roomId"].as_str().unwrap().to_string();

    let ack = h.request(&u1, "room:leave", Value::Null).await;
    assert!(ack.ok);
    assert!(h.server.room_handle(&code).is_none());

    let ack = h.request(&u1, "room:state", Value::Null).await;
    assert_eq!(ack.error.as_deref(), Some("You are not in a room"));
}

#[tokio::test]
async fn presence_online_list_tracks_connections() {
    let h = harness();
    let mut u1 = h.connect("u1", "alice").await;
    let _u2 = h.connect("u2", "bob").await;

    let event = u1
        .expect_event(|e| match e {
            ServerEvent::PresenceOnline(users) => users.iter().any(|u| u.user_id == "u2"),
            _ => false,
        })
        .await;
    let ServerEvent::PresenceOnline(users) = event.as_ref() else {
        unreachable!()
    };
    let mut ids: Vec<_> = users.iter().map(|u| u.user_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["u1", "u2"]);
}

#[tokio::test]
async fn reset_clears_all_registries() {
    let h = harness();
    let u1 = h.connect("u1", "alice").await;
    let u2 = h.connect("u2", "bob").await;
    let code = h.start_game(&u1, &u2).await;

    h.server.reset();
    assert!(h.server.room_handle(&code).is_none());
    assert!(h.server.presence().online_users().is_empty());
}
