//! Background music with crossfades and a no-repeat shuffle
//!
//! One periodic music tick drives every ramp. A track fades in with fixed
//! steps, plays at the target volume, then fades out adaptively so that it
//! reaches silence at its natural end. Leaving a music mode fades out on a
//! faster fixed schedule and pauses without counting the track as finished.

use crate::audio::AudioSink;
use crate::config::TimingConfig;
use crate::random::RandomSource;
use crate::timers::{TimerId, TimerKind, TimerSet};
use log::{debug, info};
use shared::{OverlayEvent, Track, TrackId};
use std::collections::HashSet;

/// Volumes at or below this count as silent when a quick fade completes.
const SILENCE: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicPhase {
    Idle,
    FadingIn,
    Playing,
    /// Approaching the natural end of the track
    FadingOut,
    /// Quick fade after leaving a music mode, ends in a pause
    Stopping,
}

pub struct MusicScheduler {
    tracks: Vec<Track>,
    played_history: HashSet<TrackId>,
    current: Option<TrackId>,
    phase: MusicPhase,
    volume: f32,
    target: f32,
    track_started_ms: u64,
    tick_timer: Option<TimerId>,
    tick_ms: u64,
    fade_in_ms: u64,
    fade_out_window_ms: u64,
    quick_fade_ms: u64,
    sink: Box<dyn AudioSink>,
}

impl MusicScheduler {
    pub fn new(
        tracks: Vec<Track>,
        timing: &TimingConfig,
        target: f32,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        Self {
            tracks,
            played_history: HashSet::new(),
            current: None,
            phase: MusicPhase::Idle,
            volume: 0.0,
            target,
            track_started_ms: 0,
            tick_timer: None,
            tick_ms: timing.music_tick_ms,
            fade_in_ms: timing.fade_in_ms,
            fade_out_window_ms: timing.fade_out_window_ms,
            quick_fade_ms: timing.quick_fade_ms,
            sink,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn target_volume(&self) -> f32 {
        self.target
    }

    pub fn current_track(&self) -> Option<TrackId> {
        self.current
    }

    pub fn phase(&self) -> MusicPhase {
        self.phase
    }

    pub fn played_history(&self) -> &HashSet<TrackId> {
        &self.played_history
    }

    /// Starts, resumes or winds down playback to match whether the current
    /// mode has music.
    pub fn sync(
        &mut self,
        music_wanted: bool,
        timers: &mut TimerSet,
        random: &mut dyn RandomSource,
        now_ms: u64,
        events: &mut Vec<OverlayEvent>,
    ) {
        match (music_wanted, self.phase) {
            (true, MusicPhase::Idle) => self.start_next(timers, random, now_ms, events),
            (true, MusicPhase::Stopping) => {
                debug!("Music wanted again, fading {:?} back in", self.current);
                self.phase = MusicPhase::FadingIn;
            }
            (false, MusicPhase::FadingIn | MusicPhase::Playing | MusicPhase::FadingOut) => {
                debug!("Music no longer wanted, stopping {:?}", self.current);
                self.phase = MusicPhase::Stopping;
            }
            _ => {}
        }
    }

    /// Handles one music tick
    pub fn on_tick(
        &mut self,
        timers: &mut TimerSet,
        random: &mut dyn RandomSource,
        now_ms: u64,
        events: &mut Vec<OverlayEvent>,
    ) {
        let Some(duration_ms) = self.current_duration() else {
            return;
        };
        let position = now_ms.saturating_sub(self.track_started_ms);

        if self.phase != MusicPhase::Stopping && position >= duration_ms {
            self.finish_track(timers, random, now_ms, events);
            return;
        }

        let remaining = duration_ms - position.min(duration_ms);
        if matches!(self.phase, MusicPhase::FadingIn | MusicPhase::Playing)
            && remaining <= self.fade_out_window_ms
        {
            self.phase = MusicPhase::FadingOut;
        }

        match self.phase {
            MusicPhase::FadingIn => {
                self.volume += self.target * self.tick_ms as f32 / self.fade_in_ms as f32;
                if self.volume >= self.target {
                    self.phase = MusicPhase::Playing;
                }
            }
            MusicPhase::FadingOut => {
                // Recomputed every tick so late ticks still land on silence.
                let steps_left = remaining.div_ceil(self.tick_ms).max(1);
                self.volume -= self.volume / steps_left as f32;
            }
            MusicPhase::Stopping => {
                self.volume -= self.target * self.tick_ms as f32 / self.quick_fade_ms as f32;
                if self.volume <= SILENCE {
                    self.stop(timers, events);
                    return;
                }
            }
            MusicPhase::Playing | MusicPhase::Idle => {}
        }

        self.apply_volume(self.volume);
    }

    /// Handles an end-of-track report from the host
    pub fn on_track_ended(
        &mut self,
        track_id: TrackId,
        timers: &mut TimerSet,
        random: &mut dyn RandomSource,
        now_ms: u64,
        events: &mut Vec<OverlayEvent>,
    ) -> bool {
        let audible = matches!(
            self.phase,
            MusicPhase::FadingIn | MusicPhase::Playing | MusicPhase::FadingOut
        );
        if !audible || self.current != Some(track_id) {
            return false;
        }
        self.finish_track(timers, random, now_ms, events);
        true
    }

    /// Silences immediately, skipping the quick fade. Used when the session ends.
    pub fn halt(&mut self, timers: &mut TimerSet, events: &mut Vec<OverlayEvent>) {
        if self.phase != MusicPhase::Idle {
            self.stop(timers, events);
        }
    }

    fn current_duration(&self) -> Option<u64> {
        let id = self.current?;
        self.tracks
            .iter()
            .find(|track| track.id == id)
            .map(|track| track.duration_ms)
    }

    fn finish_track(
        &mut self,
        timers: &mut TimerSet,
        random: &mut dyn RandomSource,
        now_ms: u64,
        events: &mut Vec<OverlayEvent>,
    ) {
        if let Some(track_id) = self.current.take() {
            debug!("Track {} finished", track_id);
            events.push(OverlayEvent::TrackStopped { track_id });
        }
        self.start_next(timers, random, now_ms, events);
    }

    fn start_next(
        &mut self,
        timers: &mut TimerSet,
        random: &mut dyn RandomSource,
        now_ms: u64,
        events: &mut Vec<OverlayEvent>,
    ) {
        let Some(track_id) = self.pick_next(random) else {
            debug!("No tracks configured, music stays silent");
            self.phase = MusicPhase::Idle;
            timers.cancel_slot(&mut self.tick_timer);
            return;
        };

        self.current = Some(track_id);
        self.track_started_ms = now_ms;
        self.phase = MusicPhase::FadingIn;
        self.apply_volume(0.0);

        if let Err(e) = self.sink.play(track_id) {
            // Silence is not fatal; the ramp carries on as if playing.
            debug!("Playback of track {} rejected: {}", track_id, e);
        }
        info!("Playing track {}", track_id);
        events.push(OverlayEvent::TrackStarted { track_id });

        if self.tick_timer.is_none() {
            self.tick_timer = Some(timers.start_interval(TimerKind::Music, now_ms, self.tick_ms));
        }
    }

    fn stop(&mut self, timers: &mut TimerSet, events: &mut Vec<OverlayEvent>) {
        timers.cancel_slot(&mut self.tick_timer);
        self.apply_volume(0.0);
        self.sink.pause();
        self.phase = MusicPhase::Idle;

        if let Some(track_id) = self.current.take() {
            info!("Paused track {}", track_id);
            events.push(OverlayEvent::TrackStopped { track_id });
        }
    }

    /// Picks a track not yet played in this cycle, starting a new cycle once
    /// every track has played.
    fn pick_next(&mut self, random: &mut dyn RandomSource) -> Option<TrackId> {
        if self.tracks.is_empty() {
            return None;
        }
        let mut fresh: Vec<TrackId> = self
            .tracks
            .iter()
            .map(|track| track.id)
            .filter(|id| !self.played_history.contains(id))
            .collect();
        if fresh.is_empty() {
            // Duplicate ids in the catalog can exhaust a cycle early.
            self.played_history.clear();
            fresh = self.tracks.iter().map(|track| track.id).collect();
        }

        let track_id = fresh[random.index(fresh.len())];
        self.played_history.insert(track_id);
        if self.played_history.len() >= self.tracks.len() {
            self.played_history.clear();
        }
        Some(track_id)
    }

    fn apply_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, self.target);
        self.sink.set_volume(self.volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AudioError;
    use crate::random::StdRandom;
    use assert_approx_eq::assert_approx_eq;
    use shared::AudioCommand;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingAudio {
        commands: Rc<RefCell<Vec<AudioCommand>>>,
        reject_play: bool,
    }

    impl AudioSink for RecordingAudio {
        fn play(&mut self, track_id: TrackId) -> Result<(), AudioError> {
            self.commands
                .borrow_mut()
                .push(AudioCommand::Play { track_id });
            if self.reject_play {
                return Err(AudioError::Rejected("autoplay blocked".to_string()));
            }
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

    struct Rig {
        music: MusicScheduler,
        timers: TimerSet,
        random: StdRandom,
        events: Vec<OverlayEvent>,
        audio: RecordingAudio,
        now: u64,
    }

    impl Rig {
        fn new(tracks: Vec<Track>) -> Self {
            Self::with_audio(tracks, RecordingAudio::default())
        }

        fn with_audio(tracks: Vec<Track>, audio: RecordingAudio) -> Self {
            let music = MusicScheduler::new(
                tracks,
                &TimingConfig::default(),
                0.5,
                Box::new(audio.clone()),
            );
            Self {
                music,
                timers: TimerSet::new(),
                random: StdRandom::seeded(11),
                events: Vec::new(),
                audio,
                now: 0,
            }
        }

        fn sync(&mut self, wanted: bool) {
            self.music.sync(
                wanted,
                &mut self.timers,
                &mut self.random,
                self.now,
                &mut self.events,
            );
        }

        /// Runs music ticks up to `until`, checking the volume bound on each.
        fn run_until(&mut self, until: u64) {
            while let Some((_, kind, due)) = self.timers.pop_due(until) {
                assert_eq!(kind, TimerKind::Music);
                self.now = due;
                self.music
                    .on_tick(&mut self.timers, &mut self.random, due, &mut self.events);
                let volume = self.music.volume();
                assert!(
                    (0.0..=self.music.target_volume()).contains(&volume),
                    "volume {} out of bounds at {}ms",
                    volume,
                    due
                );
            }
            self.now = until;
        }

        fn started(&self) -> Vec<TrackId> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    OverlayEvent::TrackStarted { track_id } => Some(*track_id),
                    _ => None,
                })
                .collect()
        }
    }

    fn tracks(count: u32, secs: u64) -> Vec<Track> {
        (1..=count)
            .map(|id| Track {
                id,
                title: format!("Track {}", id),
                duration_ms: secs * 1_000,
            })
            .collect()
    }

    #[test]
    fn test_fade_in_reaches_target_in_three_seconds() {
        let mut rig = Rig::new(tracks(3, 120));
        rig.sync(true);

        assert_eq!(rig.music.phase(), MusicPhase::FadingIn);
        assert_eq!(rig.music.volume(), 0.0);

        rig.run_until(1_500);
        assert_approx_eq!(rig.music.volume(), 0.25, 0.01);

        rig.run_until(3_050);
        assert_approx_eq!(rig.music.volume(), 0.5, 0.001);
        assert_eq!(rig.music.phase(), MusicPhase::Playing);
    }

    #[test]
    fn test_fade_out_reaches_silence_at_track_end() {
        let mut rig = Rig::new(tracks(2, 30));
        rig.sync(true);
        let first = rig.music.current_track().unwrap();

        rig.run_until(19_950);
        assert_eq!(rig.music.phase(), MusicPhase::Playing);

        rig.run_until(20_000);
        assert_eq!(rig.music.phase(), MusicPhase::FadingOut);
        assert!(rig.music.volume() < 0.5);

        rig.run_until(25_000);
        assert_approx_eq!(rig.music.volume(), 0.25, 0.01);

        rig.run_until(29_950);
        assert_approx_eq!(rig.music.volume(), 0.0, 0.0001);
        assert_eq!(rig.music.current_track(), Some(first));

        rig.run_until(30_000);
        assert_ne!(rig.music.current_track(), Some(first));
        assert_eq!(rig.music.phase(), MusicPhase::FadingIn);
        assert!(rig
            .events
            .contains(&OverlayEvent::TrackStopped { track_id: first }));
    }

    #[test]
    fn test_no_repeat_until_all_tracks_played() {
        let count = 5;
        let mut rig = Rig::new(tracks(count, 12));
        rig.sync(true);

        rig.run_until(12_000 * (count as u64 - 1));
        let started = rig.started();
        assert_eq!(started.len(), count as usize);
        let unique: HashSet<TrackId> = started.iter().copied().collect();
        assert_eq!(unique.len(), count as usize);
        // The last track of a cycle empties the history as it starts.
        assert!(rig.music.played_history().is_empty());

        // The next start opens a fresh cycle.
        rig.run_until(12_000 * count as u64);
        assert_eq!(rig.started().len(), count as usize + 1);
        assert_eq!(rig.music.played_history().len(), 1);
    }

    #[test]
    fn test_leaving_music_mode_fades_and_pauses() {
        let mut rig = Rig::new(tracks(4, 120));
        rig.sync(true);
        rig.run_until(4_000);
        let track = rig.music.current_track().unwrap();
        let history = rig.music.played_history().clone();

        rig.sync(false);
        assert_eq!(rig.music.phase(), MusicPhase::Stopping);

        rig.run_until(5_100);
        assert_eq!(rig.music.phase(), MusicPhase::Idle);
        assert_eq!(rig.music.volume(), 0.0);
        assert_eq!(rig.music.current_track(), None);
        assert_eq!(rig.music.played_history(), &history);
        assert!(rig.timers.is_empty());
        assert_eq!(
            rig.events.last(),
            Some(&OverlayEvent::TrackStopped { track_id: track })
        );
        assert_eq!(
            rig.audio.commands.borrow().last(),
            Some(&AudioCommand::Pause)
        );

        // Nothing resurrects the paused track later on.
        let events_before = rig.events.len();
        rig.run_until(600_000);
        assert_eq!(rig.events.len(), events_before);
    }

    #[test]
    fn test_reentering_while_stopping_resumes_same_track() {
        let mut rig = Rig::new(tracks(4, 120));
        rig.sync(true);
        rig.run_until(4_000);
        let track = rig.music.current_track();

        rig.sync(false);
        rig.run_until(4_300);
        let faded = rig.music.volume();
        assert!(faded < 0.5);

        rig.sync(true);
        assert_eq!(rig.music.phase(), MusicPhase::FadingIn);
        rig.run_until(8_000);

        assert_eq!(rig.music.current_track(), track);
        assert_eq!(rig.music.phase(), MusicPhase::Playing);
        assert_eq!(rig.started().len(), 1);
    }

    #[test]
    fn test_rejected_playback_keeps_ramping() {
        let audio = RecordingAudio {
            reject_play: true,
            ..RecordingAudio::default()
        };
        let mut rig = Rig::with_audio(tracks(2, 60), audio);
        rig.sync(true);

        assert_eq!(rig.music.phase(), MusicPhase::FadingIn);
        rig.run_until(3_050);
        assert_eq!(rig.music.phase(), MusicPhase::Playing);
        assert_approx_eq!(rig.music.volume(), 0.5, 0.001);
    }

    #[test]
    fn test_host_reported_end_advances_track() {
        let mut rig = Rig::new(tracks(3, 120));
        rig.sync(true);
        rig.run_until(10_000);
        let first = rig.music.current_track().unwrap();

        assert!(!rig.music.on_track_ended(
            first + 100,
            &mut rig.timers,
            &mut rig.random,
            rig.now,
            &mut rig.events
        ));
        assert!(rig.music.on_track_ended(
            first,
            &mut rig.timers,
            &mut rig.random,
            rig.now,
            &mut rig.events
        ));

        assert_ne!(rig.music.current_track(), Some(first));
        assert_eq!(rig.music.volume(), 0.0);
        assert_eq!(rig.started().len(), 2);
    }

    #[test]
    fn test_halt_pauses_without_fade() {
        let mut rig = Rig::new(tracks(3, 120));
        rig.sync(true);
        rig.run_until(4_000);

        rig.music.halt(&mut rig.timers, &mut rig.events);
        assert_eq!(rig.music.phase(), MusicPhase::Idle);
        assert_eq!(rig.music.volume(), 0.0);
        assert!(rig.timers.is_empty());
        assert_eq!(
            rig.audio.commands.borrow().last(),
            Some(&AudioCommand::Pause)
        );

        let commands = rig.audio.commands.borrow().len();
        rig.music.halt(&mut rig.timers, &mut rig.events);
        assert_eq!(rig.audio.commands.borrow().len(), commands);
    }

    #[test]
    fn test_empty_catalog_stays_idle() {
        let mut rig = Rig::new(Vec::new());
        rig.sync(true);

        assert_eq!(rig.music.phase(), MusicPhase::Idle);
        assert!(rig.timers.is_empty());
        assert!(rig.events.is_empty());
    }
}
