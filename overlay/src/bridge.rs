//! UDP bridge between the overlay session and the game client that hosts it
//!
//! The bridge serves a single host. A host attaches with `Hello`, after which
//! its input packets drive the session and the session's audio commands,
//! events and periodic snapshots are sent back to it. Packets from any other
//! address are dropped.

use crate::audio::ChannelAudio;
use crate::config::OverlayConfig;
use crate::error::OverlayError;
use crate::random::RandomSource;
use crate::session::{ActionResult, InitialModeParams, SessionController};
use chrono::Utc;
use log::{debug, error, info, warn};
use shared::{AudioCommand, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

pub const SNAPSHOT_PERIOD: Duration = Duration::from_millis(100);

pub struct HostBridge {
    socket: UdpSocket,
    host: Option<SocketAddr>,
    session: SessionController,
    audio_rx: mpsc::UnboundedReceiver<AudioCommand>,
    started: Instant,
    tick: Duration,
    running: bool,
}

impl HostBridge {
    pub async fn bind(
        addr: &str,
        config: &OverlayConfig,
        params: &InitialModeParams,
        random: Box<dyn RandomSource>,
        tick: Duration,
    ) -> Result<Self, OverlayError> {
        config.validate()?;
        let socket = UdpSocket::bind(addr).await?;
        info!("Overlay listening on {}", socket.local_addr()?);

        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let session = SessionController::new(
            config,
            params,
            Utc::now().timestamp_millis(),
            random,
            Box::new(ChannelAudio::new(audio_tx)),
        );

        Ok(Self {
            socket,
            host: None,
            session,
            audio_rx,
            started: Instant::now(),
            tick,
            running: true,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, OverlayError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Serves the host until it says goodbye
    pub async fn run(&mut self) -> Result<(), OverlayError> {
        let mut tick_interval = interval(self.tick);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut snapshot_interval = interval(SNAPSHOT_PERIOD);

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        while self.running {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) => match Packet::decode(&buffer[0..len]) {
                            Ok(packet) => self.handle_packet(packet, addr).await?,
                            Err(e) => warn!("Failed to decode packet from {}: {}", addr, e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                    self.flush().await?;
                },

                _ = tick_interval.tick() => {
                    self.session.advance_to(self.elapsed_ms());
                    self.flush().await?;
                },

                _ = snapshot_interval.tick() => {
                    if let Some(host) = self.host {
                        let snapshot = Packet::Snapshot(Box::new(self.session.snapshot()));
                        self.send(&snapshot, host).await?;
                    }
                },
            }
        }

        self.session.end();
        self.flush().await?;
        info!("Bridge stopped after {}ms", self.session.now_ms());
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) -> Result<(), OverlayError> {
        if let Packet::Hello { client_version } = packet {
            return self.attach(client_version, addr).await;
        }
        if self.host != Some(addr) {
            warn!("Dropping packet from unknown sender {}", addr);
            return Ok(());
        }

        // Inputs apply at the current wall time, after anything already due.
        self.session.advance_to(self.elapsed_ms());

        match packet {
            Packet::Key(event) => self.session.handle_key(event),
            Packet::Click { x, y } => self.session.click(x, y),
            Packet::RowContextClick { row, x, y } => {
                self.session.row_context_click(row, x, y);
            }
            Packet::Action(action) => {
                if let ActionResult::Context(outcome) = self.session.perform(action) {
                    self.send(&Packet::Outcome(outcome), addr).await?;
                }
            }
            Packet::TrackEnded { track_id } => {
                self.session.track_ended(track_id);
            }
            Packet::Roster(players) => {
                debug!("Roster update with {} players", players.len());
                self.session.set_roster(players);
            }
            Packet::Goodbye => {
                info!("Host {} said goodbye", addr);
                self.running = false;
            }
            other => warn!("Unexpected packet from host: {:?}", other),
        }
        Ok(())
    }

    async fn attach(&mut self, client_version: u32, addr: SocketAddr) -> Result<(), OverlayError> {
        if client_version != PROTOCOL_VERSION {
            warn!(
                "Host {} speaks protocol {}, expected {}",
                addr, client_version, PROTOCOL_VERSION
            );
            let reason = format!("protocol version {} is not supported", client_version);
            return self.send(&Packet::Disconnected { reason }, addr).await;
        }

        if let Some(previous) = self.host.replace(addr) {
            if previous != addr {
                info!("Host moved from {} to {}", previous, addr);
            }
        }
        info!("Host attached from {}", addr);

        let welcome = Packet::Welcome {
            mode: self.session.mode(),
        };
        self.send(&welcome, addr).await?;
        let snapshot = Packet::Snapshot(Box::new(self.session.snapshot()));
        self.send(&snapshot, addr).await
    }

    /// Ships pending audio commands and events to the host.
    /// Without a host they are discarded.
    async fn flush(&mut self) -> Result<(), OverlayError> {
        let mut audio = Vec::new();
        while let Ok(command) = self.audio_rx.try_recv() {
            audio.push(command);
        }
        let events = self.session.drain_events();

        let Some(host) = self.host else {
            return Ok(());
        };
        for command in audio {
            self.send(&Packet::Audio(command), host).await?;
        }
        if !events.is_empty() {
            self.send(&Packet::Events(events), host).await?;
        }
        Ok(())
    }

    async fn send(&self, packet: &Packet, addr: SocketAddr) -> Result<(), OverlayError> {
        let data = packet.encode()?;
        if let Err(e) = self.socket.send_to(&data, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
        Ok(())
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
