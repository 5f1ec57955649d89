//! Audio output seam. Only the music scheduler holds a sink.

use crate::error::AudioError;
use log::debug;
use shared::{AudioCommand, TrackId};
use tokio::sync::mpsc;

pub trait AudioSink {
    fn play(&mut self, track_id: TrackId) -> Result<(), AudioError>;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
}

/// Discards everything. Used when no host is attached.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _track_id: TrackId) -> Result<(), AudioError> {
        Ok(())
    }

    fn pause(&mut self) {}

    fn set_volume(&mut self, _volume: f32) {}
}

/// Forwards commands to the host bridge, which ships them to the game client.
pub struct ChannelAudio {
    tx: mpsc::UnboundedSender<AudioCommand>,
    last_volume: Option<f32>,
}

impl ChannelAudio {
    pub fn new(tx: mpsc::UnboundedSender<AudioCommand>) -> Self {
        Self {
            tx,
            last_volume: None,
        }
    }

    fn send(&self, command: AudioCommand) -> Result<(), AudioError> {
        self.tx.send(command).map_err(|_| AudioError::Unavailable)
    }
}

impl AudioSink for ChannelAudio {
    fn play(&mut self, track_id: TrackId) -> Result<(), AudioError> {
        self.send(AudioCommand::Play { track_id })
    }

    fn pause(&mut self) {
        if self.send(AudioCommand::Pause).is_err() {
            debug!("Audio channel closed, pause dropped");
        }
    }

    fn set_volume(&mut self, volume: f32) {
        // Skip unchanged volumes so a steady track does not flood the host.
        if self.last_volume == Some(volume) {
            return;
        }
        self.last_volume = Some(volume);
        if self.send(AudioCommand::SetVolume(volume)).is_err() {
            debug!("Audio channel closed, volume change dropped");
        }
    }
}
