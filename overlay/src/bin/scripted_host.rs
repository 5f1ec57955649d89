//! Plays a fixed session against a running overlay and prints what comes back.
//!
//! Start the overlay in the menu first, e.g. `overlay --seed 1`.

use clap::Parser;
use shared::{
    AudioCommand, ContextAction, Key, KeyEvent, Packet, Player, UiAction, MAX_PACKET_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Overlay address
    #[arg(short = 'o', long, default_value = "127.0.0.1:27080")]
    overlay: String,

    /// Pause between script steps in milliseconds
    #[arg(short = 'p', long, default_value = "500")]
    pause_ms: u64,
}

enum Step {
    Send(Packet),
    Wait(u64),
}

fn roster() -> Vec<Player> {
    ["Tarasov", "Kuznetsova", "Belov"]
        .iter()
        .zip(1u32..)
        .map(|(name, id)| Player {
            id,
            display_name: name.to_string(),
            rank_label: "Machinist".to_string(),
            ping_ms: 20 + id * 7,
            avatar_variant: id as u8,
            country_code: "RU".to_string(),
            geo_label: "Moscow".to_string(),
            status_label: "On the Ring line".to_string(),
            platform_id: format!("7656119800000{:04}", id),
        })
        .collect()
}

fn script() -> Vec<Step> {
    vec![
        Step::Send(Packet::Roster(roster())),
        Step::Send(Packet::Key(KeyEvent::pressed(Key::Tab))),
        Step::Send(Packet::Key(KeyEvent::repeated(Key::Tab))),
        Step::Send(Packet::RowContextClick {
            row: 1,
            x: 420.0,
            y: 260.0,
        }),
        Step::Send(Packet::Action(UiAction::ContextMenu(ContextAction::ViewProfile))),
        Step::Send(Packet::Key(KeyEvent::released(Key::Tab))),
        Step::Send(Packet::Action(UiAction::OpenBattlePass)),
        Step::Wait(3_500),
        Step::Send(Packet::Action(UiAction::AddBattlePassXp(400))),
        Step::Send(Packet::Action(UiAction::Back)),
        Step::Send(Packet::Key(KeyEvent::pressed(Key::Escape))),
        Step::Send(Packet::Key(KeyEvent::released(Key::Escape))),
        Step::Send(Packet::Action(UiAction::OpenMapVote)),
        Step::Send(Packet::Action(UiAction::SelectCandidate(2))),
        Step::Send(Packet::Action(UiAction::SelectCandidate(1))),
        Step::Send(Packet::Action(UiAction::ActivateVote)),
        Step::Send(Packet::Action(UiAction::ActivateVote)),
        Step::Wait(1_500),
        Step::Send(Packet::Goodbye),
    ]
}

async fn send(socket: &UdpSocket, packet: &Packet, overlay: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let data = packet.encode()?;
    socket.send_to(&data, overlay).await?;
    Ok(())
}

/// Prints everything the overlay sends during `window`
async fn drain(socket: &UdpSocket, window: Duration) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    let deadline = tokio::time::Instant::now() + window;

    loop {
        let left = deadline.saturating_duration_since(tokio::time::Instant::now());
        if left.is_zero() {
            break;
        }
        match timeout(left, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => match Packet::decode(&buf[0..len]) {
                // Snapshots arrive ten times a second; only the mode is interesting here.
                Ok(Packet::Snapshot(snapshot)) => {
                    println!("  snapshot: {:?} at {}ms", snapshot.mode, snapshot.now_ms)
                }
                Ok(Packet::Audio(AudioCommand::SetVolume(_))) => {}
                Ok(packet) => println!("  {:?}", packet),
                Err(e) => println!("  undecodable packet: {}", e),
            },
            Ok(Err(e)) => {
                println!("  receive error: {}", e);
                break;
            }
            Err(_) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let overlay: SocketAddr = args.overlay.parse()?;
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let pause = Duration::from_millis(args.pause_ms);

    println!("Attaching to overlay at {}", overlay);
    send(
        &socket,
        &Packet::Hello {
            client_version: PROTOCOL_VERSION,
        },
        overlay,
    )
    .await?;
    drain(&socket, pause).await;

    for step in script() {
        match step {
            Step::Send(packet) => {
                println!("Sending {:?}", packet);
                send(&socket, &packet, overlay).await?;
                drain(&socket, pause).await;
            }
            Step::Wait(ms) => {
                println!("Waiting {}ms", ms);
                drain(&socket, Duration::from_millis(ms)).await;
            }
        }
    }

    sleep(pause).await;
    println!("Scripted host finished");
    Ok(())
}
