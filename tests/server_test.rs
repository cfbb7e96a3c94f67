//! End-to-end scenarios against a live server on a loopback port.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

use rockfall::core::vec2::Vec2;
use rockfall::game::input::ControlState;
use rockfall::game::state::{Hazard, WorldSnapshot};
use rockfall::network::protocol::{ClientMessage, ServerMessage};
use rockfall::{GameServer, ServerConfig, ServerHandle, SessionId, WorldConfig};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> ServerHandle {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        rng_seed: Some(7),
        world: WorldConfig {
            hazard_spawn_interval: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    GameServer::new(config).start().await.unwrap()
}

struct TestClient {
    id: SessionId,
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(handle: &ServerHandle) -> Self {
        let stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        let (read, write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let first = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
        let id = match ServerMessage::from_line(&first).unwrap() {
            ServerMessage::ClientId(id) => id,
            other => panic!("first message was {:?}", other),
        };
        Self { id, lines, write }
    }

    async fn send(&mut self, message: ClientMessage) {
        self.write.write_all(message.to_line().unwrap().as_bytes()).await.unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.write.write_all(bytes).await.unwrap();
    }

    async fn next(&mut self) -> ServerMessage {
        let line = timeout(WAIT, self.lines.next_line())
            .await
            .expect("no message in time")
            .unwrap()
            .expect("connection closed");
        ServerMessage::from_line(&line).unwrap()
    }

    async fn expect_pong(&mut self) {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.next().await == ServerMessage::Pong {
                return;
            }
        }
        panic!("no PONG");
    }

    async fn state_where(&mut self, pred: impl Fn(&WorldSnapshot) -> bool) -> WorldSnapshot {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if let ServerMessage::GameState(state) = self.next().await {
                if pred(&state) {
                    return state;
                }
            }
        }
        panic!("condition never held");
    }
}

fn fire() -> ClientMessage {
    ClientMessage::Input(ControlState { fire: true, ..Default::default() })
}

#[tokio::test]
async fn client_id_is_first_and_distinct() {
    let handle = start_server().await;
    let a = TestClient::connect(&handle).await;
    let b = TestClient::connect(&handle).await;
    assert_ne!(a.id, b.id);
    handle.shutdown().await;
}

#[tokio::test]
async fn ping_gets_pong() {
    let handle = start_server().await;
    let mut client = TestClient::connect(&handle).await;
    client.send(ClientMessage::Ping).await;
    client.expect_pong().await;
    handle.shutdown().await;
}

#[tokio::test]
async fn malformed_line_keeps_connection_open() {
    let handle = start_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send_raw(b"{this is not json}\n").await;
    client.send_raw(b"{\"kind\":\"GAME_STATE\",\"payload\":\"{}\"}\n").await;
    client.send(ClientMessage::Ping).await;
    client.expect_pong().await;
    assert_eq!(handle.session_count(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn every_client_receives_game_state() {
    let handle = start_server().await;
    let mut a = TestClient::connect(&handle).await;
    let mut b = TestClient::connect(&handle).await;

    a.send(ClientMessage::Input(ControlState::default())).await;
    let a_id = a.id.clone();
    b.state_where(|s| s.crafts.contains_key(&a_id)).await;

    // Silent clients get no craft
    let state = a.state_where(|s| s.tick > 2).await;
    assert!(!state.crafts.contains_key(&b.id));

    handle.shutdown().await;
}

#[tokio::test]
async fn two_clients_fire_two_projectiles() {
    let handle = start_server().await;
    let mut a = TestClient::connect(&handle).await;
    let mut b = TestClient::connect(&handle).await;

    a.send(fire()).await;
    b.send(fire()).await;

    let state = a.state_where(|s| s.crafts.len() == 2 && s.projectiles.len() == 2).await;
    assert_eq!(state.score, 0);
    assert!(state.projectiles.iter().all(|p| p.velocity.y < 0.0));

    handle.shutdown().await;
}

#[tokio::test]
async fn projectile_destroys_placed_hazard() {
    let handle = start_server().await;
    let mut client = TestClient::connect(&handle).await;

    client.send(ClientMessage::Input(ControlState::default())).await;
    let id = client.id.clone();
    let state = client.state_where(|s| s.crafts.contains_key(&id)).await;
    let craft_x = state.crafts[&id].position.x;

    // In the projectile's column, far from the craft
    handle.store().spawn_hazard(Hazard::stationary(Vec2::new(craft_x, 100.0), 20.0));
    client.send(fire()).await;

    let state = client.state_where(|s| s.score > 0).await;
    assert_eq!(state.score, 10);
    assert!(state.hazards.is_empty());
    assert!(!state.game_over);

    handle.shutdown().await;
}

#[tokio::test]
async fn disconnect_with_partial_line_removes_craft() {
    let handle = start_server().await;
    let mut stay = TestClient::connect(&handle).await;
    let mut leave = TestClient::connect(&handle).await;

    leave.send(ClientMessage::Input(ControlState::default())).await;
    let leave_id = leave.id.clone();
    stay.state_where(|s| s.crafts.contains_key(&leave_id)).await;

    leave.send_raw(b"{\"kind\":\"INPUT\",\"payload\":\"{\\\"le").await;
    drop(leave);

    let deadline = Instant::now() + WAIT;
    while handle.session_count() > 1 || handle.snapshot().crafts.contains_key(&leave_id) {
        assert!(Instant::now() < deadline, "session was not cleaned up");
        sleep(Duration::from_millis(10)).await;
    }

    // The remaining client keeps receiving state without the departed craft
    let after = handle.snapshot().tick;
    let state = stay.state_where(|s| s.tick > after).await;
    assert!(!state.crafts.contains_key(&leave_id));
    assert_eq!(handle.session_count(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_clients() {
    let handle = start_server().await;
    let mut client = TestClient::connect(&handle).await;

    timeout(WAIT, handle.shutdown()).await.unwrap();

    let closed = timeout(WAIT, async {
        loop {
            match client.lines.next_line().await {
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
