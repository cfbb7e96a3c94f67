//! Probe client for a running Rockfall server.
//!
//! Connects, prints its id, sends a PING and a short burst of inputs,
//! then prints a one-line summary of each GAME_STATE it receives.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use rockfall::game::input::ControlState;
use rockfall::network::protocol::{ClientMessage, ServerMessage};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:7777")]
    addr: String,
    /// Number of GAME_STATE frames to print before exiting
    #[clap(short, long, default_value_t = 60)]
    frames: usize,
}

/// Input for frame `n`: sweep right, then left, tapping fire.
fn scripted_input(n: usize) -> ControlState {
    ControlState {
        right: (n / 30) % 2 == 0,
        left: (n / 30) % 2 == 1,
        fire: n % 10 < 5,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.addr)
        .await
        .with_context(|| format!("connecting to {}", args.addr))?;
    println!("Connected to {}", args.addr);

    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    let first = timeout(Duration::from_secs(5), lines.next_line())
        .await
        .context("timed out waiting for CLIENT_ID")??;
    match first.as_deref().map(ServerMessage::from_line) {
        Some(Ok(ServerMessage::ClientId(id))) => println!("Assigned id {}", id),
        Some(other) => bail!("expected CLIENT_ID first, got {:?}", other),
        None => bail!("server closed the connection"),
    }

    write.write_all(ClientMessage::Ping.to_line()?.as_bytes()).await?;

    let mut frames = 0;
    while frames < args.frames {
        let Some(line) = lines.next_line().await? else {
            println!("Server closed the connection");
            break;
        };
        match ServerMessage::from_line(&line) {
            Ok(ServerMessage::Pong) => println!("PONG"),
            Ok(ServerMessage::GameState(state)) => {
                let alive = state.crafts.values().filter(|c| c.alive).count();
                println!(
                    "tick {:>6} | crafts {}/{} | projectiles {:>3} | hazards {:>3} | score {:>5}{}",
                    state.tick,
                    alive,
                    state.crafts.len(),
                    state.projectiles.len(),
                    state.hazards.len(),
                    state.score,
                    if state.game_over { " | GAME OVER" } else { "" },
                );

                let controls = ControlState {
                    reset: state.game_over,
                    ..scripted_input(frames)
                };
                write
                    .write_all(ClientMessage::Input(controls).to_line()?.as_bytes())
                    .await?;
                frames += 1;
            }
            Ok(ServerMessage::ClientId(id)) => println!("Unexpected second id {}", id),
            Err(e) => println!("Undecodable line: {}", e),
        }
    }

    Ok(())
}
