//! Integration tests for the overlay session and its host bridge
//!
//! These tests drive whole sessions through the public API and exercise the
//! real UDP link with a simulated game client.

use assert_approx_eq::assert_approx_eq;
use overlay::audio::{AudioSink, NullAudio};
use overlay::bridge::HostBridge;
use overlay::config::OverlayConfig;
use overlay::error::{AudioError, OverlayError};
use overlay::random::StdRandom;
use overlay::session::{ActionResult, InitialModeParams, SessionController};
use shared::{
    AudioCommand, ContextAction, ContextOutcome, InterfaceMode, Key, KeyEvent, OverlayEvent,
    Packet, Player, Track, TrackId, UiAction, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
use std::cell::RefCell;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const START_EPOCH_MS: i64 = 1_704_144_600_000;

#[derive(Clone, Default)]
struct RecordingAudio {
    commands: Rc<RefCell<Vec<AudioCommand>>>,
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, track_id: TrackId) -> Result<(), AudioError> {
        self.commands
            .borrow_mut()
            .push(AudioCommand::Play { track_id });
        Ok(())
    }

    fn pause(&mut self) {
        self.commands.borrow_mut().push(AudioCommand::Pause);
    }

    fn set_volume(&mut self, volume: f32) {
        self.commands
            .borrow_mut()
            .push(AudioCommand::SetVolume(volume));
    }
}

fn player(id: u32) -> Player {
    Player {
        id,
        display_name: format!("Driver {}", id),
        rank_label: "Machinist".to_string(),
        ping_ms: 25,
        avatar_variant: 0,
        country_code: "RU".to_string(),
        geo_label: "Moscow".to_string(),
        status_label: "In depot".to_string(),
        platform_id: format!("7656119800000{:04}", id),
    }
}

fn recorded_session(
    config: &OverlayConfig,
    params: InitialModeParams,
) -> (SessionController, RecordingAudio) {
    let audio = RecordingAudio::default();
    let session = SessionController::new(
        config,
        &params,
        START_EPOCH_MS,
        Box::new(StdRandom::seeded(42)),
        Box::new(audio.clone()),
    );
    (session, audio)
}

fn started_tracks(events: &[OverlayEvent]) -> Vec<TrackId> {
    events
        .iter()
        .filter_map(|event| match event {
            OverlayEvent::TrackStarted { track_id } => Some(*track_id),
            _ => None,
        })
        .collect()
}

/// FULL SESSION TESTS
mod session_tests {
    use super::*;

    /// Walks the platform host path from loading to the game
    #[test]
    fn platform_host_session_reaches_game() {
        let params = InitialModeParams::from_query("", true);
        let (mut session, audio) = recorded_session(&OverlayConfig::default(), params);
        assert_eq!(session.mode(), InterfaceMode::Loading);

        session.advance_to(10_000);
        assert_eq!(session.mode(), InterfaceMode::Connecting);
        session.advance_by(3_000);
        session.click(400.0, 300.0);
        assert_eq!(session.mode(), InterfaceMode::ClickToStart);

        session.advance_by(4_000);
        session.click(400.0, 300.0);
        assert_eq!(session.mode(), InterfaceMode::SpawnSelection);
        assert_eq!(session.perform(UiAction::SelectSpawn(5)), ActionResult::Applied);
        assert_eq!(session.mode(), InterfaceMode::InGame);

        session.advance_by(2_000);
        let modes: Vec<InterfaceMode> = session
            .drain_events()
            .iter()
            .filter_map(|event| match event {
                OverlayEvent::ModeChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(
            modes,
            vec![
                InterfaceMode::Connecting,
                InterfaceMode::ClickToStart,
                InterfaceMode::SpawnSelection,
                InterfaceMode::InGame,
            ]
        );

        let commands = audio.commands.borrow();
        assert!(matches!(commands.first(), Some(AudioCommand::SetVolume(v)) if *v == 0.0));
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, AudioCommand::Play { .. }))
                .count(),
            1
        );
        assert_eq!(commands.last(), Some(&AudioCommand::Pause));
        assert_eq!(session.active_timer_count(), 1);
    }

    /// Queue waits a minute, then the usual loading path follows
    #[test]
    fn queue_session_flows_into_loading() {
        let params = InitialModeParams {
            gamemode: Some("queue".to_string()),
            platform_host: true,
        };
        let (mut session, _) = recorded_session(&OverlayConfig::default(), params);

        session.advance_to(30_000);
        assert_eq!(session.mode(), InterfaceMode::Queue);
        session.advance_to(60_000);
        assert_eq!(session.mode(), InterfaceMode::Loading);
        session.advance_to(75_000);
        assert_eq!(session.mode(), InterfaceMode::Connecting);
        assert!(session.connect_ready());
    }

    /// Every track plays once before any repeats
    #[test]
    fn music_cycle_without_repeats() {
        let mut config = OverlayConfig::default();
        config.catalog.tracks = (1..=4)
            .map(|id| Track {
                id,
                title: format!("Loop {}", id),
                duration_ms: 15_000,
            })
            .collect();
        let (mut session, _) = recorded_session(&config, InitialModeParams::default());

        session.perform(UiAction::OpenBattlePass);
        session.advance_to(4_000);
        assert_approx_eq!(session.music().volume(), config.audio.target_volume, 0.001);

        session.advance_to(15_000 * 4 - 1);

        let started = started_tracks(&session.drain_events());
        assert_eq!(started.len(), 4);
        let unique: HashSet<TrackId> = started.into_iter().collect();
        assert_eq!(unique.len(), 4);

        session.advance_to(15_000 * 4);
        assert_eq!(started_tracks(&session.drain_events()).len(), 1);
    }

    /// Volume stays within bounds while modes flip back and forth
    #[test]
    fn volume_bounds_under_mode_churn() {
        let config = OverlayConfig::default();
        let target = config.audio.target_volume;
        let (mut session, audio) = recorded_session(&config, InitialModeParams::default());

        for step in 0..800u64 {
            let action = if step % 2 == 0 {
                UiAction::OpenBattlePass
            } else {
                UiAction::Back
            };
            session.perform(action);
            // Uneven gaps so switches land mid-fade and mid-track.
            session.advance_by(350 + (step * 137) % 2_900);
        }

        for command in audio.commands.borrow().iter() {
            if let AudioCommand::SetVolume(volume) = command {
                assert!(
                    (0.0..=target).contains(volume),
                    "volume {} outside [0, {}]",
                    volume,
                    target
                );
            }
        }

        let events = session.drain_events();
        let starts = started_tracks(&events).len();
        let stops = events
            .iter()
            .filter(|e| matches!(e, OverlayEvent::TrackStopped { .. }))
            .count();
        assert!(starts >= 1);
        assert!(stops == starts || stops + 1 == starts);
    }

    /// Map vote, scoreboard and battle pass running side by side
    #[test]
    fn overlays_coexist_in_game() {
        let mut config = OverlayConfig::default();
        config.catalog.roster = (1..=6).map(player).collect();
        config.viewer_id = 2;
        let params = InitialModeParams {
            gamemode: Some("ingame".to_string()),
            platform_host: true,
        };
        let mut session = SessionController::new(
            &config,
            &params,
            START_EPOCH_MS,
            Box::new(StdRandom::seeded(3)),
            Box::new(NullAudio),
        );

        session.perform(UiAction::OpenMapVote);
        session.handle_key(KeyEvent::pressed(Key::Tab));
        assert!(session.row_context_click(5, 900.0, 40.0));
        assert_eq!(
            session.perform(UiAction::ContextMenu(ContextAction::Mute)),
            ActionResult::Context(ContextOutcome::Muted {
                player_id: 6,
                muted: true,
            })
        );

        session.perform(UiAction::SelectCandidate(4));
        session.perform(UiAction::ActivateVote);
        session.advance_by(120_000);

        let snapshot = session.snapshot();
        assert!(snapshot.scoreboard_visible);
        assert!(snapshot.map_vote.open);
        assert_eq!(snapshot.map_vote.remaining_seconds, 180);
        assert!(snapshot.map_vote.candidates[3].voter_ids.contains(&2));
        assert_eq!(snapshot.clock.date_label, "02.01.2024");
        assert_eq!(snapshot.clock.time_of_day, "00:32");
    }
}

async fn recv_packet(socket: &UdpSocket) -> Packet {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("Timed out waiting for overlay")
        .expect("Failed to receive");
    Packet::decode(&buf[..len]).expect("Failed to decode packet from overlay")
}

/// Reads packets until one matches, returning everything seen on the way
async fn recv_until(socket: &UdpSocket, wanted: fn(&Packet) -> bool) -> Vec<Packet> {
    let mut seen = Vec::new();
    loop {
        let packet = recv_packet(socket).await;
        let done = wanted(&packet);
        seen.push(packet);
        if done {
            return seen;
        }
    }
}

async fn send_packet(socket: &UdpSocket, packet: Packet, overlay: SocketAddr) {
    let data = packet.encode().unwrap();
    socket.send_to(&data, overlay).await.unwrap();
}

async fn attached_host(overlay: SocketAddr) -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    send_packet(
        &socket,
        Packet::Hello {
            client_version: PROTOCOL_VERSION,
        },
        overlay,
    )
    .await;
    recv_until(&socket, |p| matches!(p, Packet::Welcome { .. })).await;
    socket
}

async fn bind_bridge(config: &OverlayConfig) -> HostBridge {
    HostBridge::bind(
        "127.0.0.1:0",
        config,
        &InitialModeParams::default(),
        Box::new(StdRandom::seeded(9)),
        Duration::from_millis(5),
    )
    .await
    .expect("Failed to bind bridge")
}

/// HOST BRIDGE TESTS
mod bridge_tests {
    use super::*;

    /// Tests the hello, action and goodbye exchange over real UDP
    #[tokio::test]
    async fn bridge_round_trip() {
        let mut bridge = bind_bridge(&OverlayConfig::default()).await;
        let overlay = bridge.local_addr().unwrap();

        let host = async {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            send_packet(
                &socket,
                Packet::Hello {
                    client_version: PROTOCOL_VERSION,
                },
                overlay,
            )
            .await;
            match recv_packet(&socket).await {
                Packet::Welcome { mode } => assert_eq!(mode, InterfaceMode::Menu),
                other => panic!("Expected welcome, got {:?}", other),
            }

            send_packet(&socket, Packet::Action(UiAction::OpenBattlePass), overlay).await;
            let seen = recv_until(&socket, |p| {
                matches!(p, Packet::Events(events) if events.iter().any(|e| matches!(
                    e,
                    OverlayEvent::ModeChanged { to: InterfaceMode::BattlePass, .. }
                )))
            })
            .await;
            assert!(seen
                .iter()
                .any(|p| matches!(p, Packet::Audio(AudioCommand::Play { .. }))));

            send_packet(&socket, Packet::Action(UiAction::Back), overlay).await;
            recv_until(&socket, |p| matches!(p, Packet::Audio(AudioCommand::Pause))).await;

            send_packet(&socket, Packet::Goodbye, overlay).await;
        };

        let (result, ()) = timeout(Duration::from_secs(10), async {
            tokio::join!(bridge.run(), host)
        })
        .await
        .expect("Bridge session did not finish");

        assert!(result.is_ok());
        assert!(bridge.session().is_ended());
        assert_eq!(bridge.session().mode(), InterfaceMode::Menu);
    }

    /// Packets from an address that never said hello are dropped
    #[tokio::test]
    async fn unknown_sender_is_ignored() {
        let mut bridge = bind_bridge(&OverlayConfig::default()).await;
        let overlay = bridge.local_addr().unwrap();

        let host = async {
            let socket = attached_host(overlay).await;

            let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            send_packet(&stranger, Packet::Action(UiAction::Resume), overlay).await;
            tokio::time::sleep(Duration::from_millis(50)).await;

            send_packet(&socket, Packet::Goodbye, overlay).await;
        };

        timeout(Duration::from_secs(10), async {
            tokio::join!(bridge.run(), host)
        })
        .await
        .expect("Bridge session did not finish")
        .0
        .unwrap();

        assert_eq!(bridge.session().mode(), InterfaceMode::Menu);
    }

    /// A host with the wrong protocol version is turned away
    #[tokio::test]
    async fn version_mismatch_is_rejected() {
        let mut bridge = bind_bridge(&OverlayConfig::default()).await;
        let overlay = bridge.local_addr().unwrap();

        let host = async {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            send_packet(
                &socket,
                Packet::Hello {
                    client_version: PROTOCOL_VERSION + 1,
                },
                overlay,
            )
            .await;
            match recv_packet(&socket).await {
                Packet::Disconnected { reason } => assert!(reason.contains("not supported")),
                other => panic!("Expected disconnect, got {:?}", other),
            }

            // Still unattached: this goodbye must not stop the bridge.
            send_packet(&socket, Packet::Goodbye, overlay).await;
            tokio::time::sleep(Duration::from_millis(50)).await;

            let socket = attached_host(overlay).await;
            send_packet(&socket, Packet::Goodbye, overlay).await;
        };

        timeout(Duration::from_secs(10), async {
            tokio::join!(bridge.run(), host)
        })
        .await
        .expect("Bridge session did not finish")
        .0
        .unwrap();
    }

    /// Context menu outcomes travel back to the host
    #[tokio::test]
    async fn context_outcome_reaches_host() {
        let mut bridge = bind_bridge(&OverlayConfig::default()).await;
        let overlay = bridge.local_addr().unwrap();

        let host = async {
            let socket = attached_host(overlay).await;
            send_packet(&socket, Packet::Roster((1..=3).map(player).collect()), overlay).await;
            send_packet(&socket, Packet::Key(KeyEvent::pressed(Key::Tab)), overlay).await;
            send_packet(
                &socket,
                Packet::RowContextClick {
                    row: 2,
                    x: 10.0,
                    y: 20.0,
                },
                overlay,
            )
            .await;
            send_packet(
                &socket,
                Packet::Action(UiAction::ContextMenu(ContextAction::CopyId)),
                overlay,
            )
            .await;

            let seen = recv_until(&socket, |p| matches!(p, Packet::Outcome(_))).await;
            match seen.last() {
                Some(Packet::Outcome(ContextOutcome::CopyToClipboard(id))) => {
                    assert_eq!(id, "76561198000000003")
                }
                other => panic!("Expected clipboard outcome, got {:?}", other),
            }

            send_packet(&socket, Packet::Goodbye, overlay).await;
        };

        timeout(Duration::from_secs(10), async {
            tokio::join!(bridge.run(), host)
        })
        .await
        .expect("Bridge session did not finish")
        .0
        .unwrap();
    }

    /// A full server's roster arrives in one datagram and reaches the scoreboard
    #[tokio::test]
    async fn full_server_roster_is_applied() {
        let mut bridge = bind_bridge(&OverlayConfig::default()).await;
        let overlay = bridge.local_addr().unwrap();

        let host = async {
            let socket = attached_host(overlay).await;
            let roster = Packet::Roster((1..=128).map(player).collect());
            assert!(roster.encode().unwrap().len() > 8192);

            send_packet(&socket, roster, overlay).await;
            send_packet(&socket, Packet::Goodbye, overlay).await;
        };

        timeout(Duration::from_secs(10), async {
            tokio::join!(bridge.run(), host)
        })
        .await
        .expect("Bridge session did not finish")
        .0
        .unwrap();

        let roster = bridge.session().scoreboard().roster();
        assert_eq!(roster.len(), 128);
        assert_eq!(roster[127].id, 128);
    }

    /// An invalid config is refused before anything is mounted
    #[tokio::test]
    async fn invalid_config_is_rejected_at_bind() {
        let mut config = OverlayConfig::default();
        config.battle_pass.max_level = 0;

        let result = HostBridge::bind(
            "127.0.0.1:0",
            &config,
            &InitialModeParams::default(),
            Box::new(StdRandom::seeded(9)),
            Duration::from_millis(5),
        )
        .await;

        assert!(matches!(result, Err(OverlayError::InvalidConfig { .. })));
    }

    /// Garbage on the socket does not take the bridge down
    #[tokio::test]
    async fn malformed_packets_are_skipped() {
        let mut bridge = bind_bridge(&OverlayConfig::default()).await;
        let overlay = bridge.local_addr().unwrap();

        let host = async {
            let socket = attached_host(overlay).await;
            socket.send_to(&[0xff; 3], overlay).await.unwrap();
            socket.send_to(&[], overlay).await.unwrap();
            send_packet(&socket, Packet::Action(UiAction::Resume), overlay).await;
            recv_until(&socket, |p| {
                matches!(p, Packet::Snapshot(s) if s.mode == InterfaceMode::InGame)
            })
            .await;
            send_packet(&socket, Packet::Goodbye, overlay).await;
        };

        timeout(Duration::from_secs(10), async {
            tokio::join!(bridge.run(), host)
        })
        .await
        .expect("Bridge session did not finish")
        .0
        .unwrap();

        assert_eq!(bridge.session().mode(), InterfaceMode::InGame);
    }
}
