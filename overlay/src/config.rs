//! Overlay configuration: timings, audio, battle pass and static catalogs
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Catalogs default to a small Metrostroi server setup.

use crate::error::OverlayError;
use serde::{Deserialize, Serialize};
use shared::{
    MapCandidate, NewsItem, Player, PlayerId, SpawnPoint, SpawnRole, Track, CLOCK_REFRESH_MS,
    CONNECT_GATE_MS, FADE_IN_MS, FADE_OUT_WINDOW_MS, MUSIC_TICK_MS, QUEUE_WAIT_MS,
    QUICK_FADE_MS, VOTE_DURATION_SECS,
};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub clock_refresh_ms: u64,
    pub loading_tick_ms: u64,
    /// Smallest loading step in percent
    pub loading_step_min: u32,
    /// Largest loading step in percent (exclusive)
    pub loading_step_max: u32,
    pub connect_gate_ms: u64,
    pub queue_wait_ms: u64,
    pub queue_step_ms: u64,
    pub music_tick_ms: u64,
    pub fade_in_ms: u64,
    pub fade_out_window_ms: u64,
    pub quick_fade_ms: u64,
    pub vote_duration_secs: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            clock_refresh_ms: CLOCK_REFRESH_MS,
            loading_tick_ms: 100,
            loading_step_min: 1,
            loading_step_max: 4,
            connect_gate_ms: CONNECT_GATE_MS,
            queue_wait_ms: QUEUE_WAIT_MS,
            queue_step_ms: 5_000,
            music_tick_ms: MUSIC_TICK_MS,
            fade_in_ms: FADE_IN_MS,
            fade_out_window_ms: FADE_OUT_WINDOW_MS,
            quick_fade_ms: QUICK_FADE_MS,
            vote_duration_secs: VOTE_DURATION_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub target_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { target_volume: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattlePassConfig {
    pub xp_per_level: u32,
    pub max_level: u32,
    pub start_level: u32,
    pub start_xp: u32,
}

impl Default for BattlePassConfig {
    fn default() -> Self {
        Self {
            xp_per_level: 1_000,
            max_level: 100,
            start_level: 1,
            start_xp: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub tracks: Vec<Track>,
    pub spawns: Vec<SpawnPoint>,
    pub candidates: Vec<MapCandidate>,
    pub roster: Vec<Player>,
    pub news: Vec<NewsItem>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let track = |id, title: &str, secs: u64| Track {
            id,
            title: title.to_string(),
            duration_ms: secs * 1_000,
        };
        let spawn = |id, name: &str, station: &str, role| SpawnPoint {
            id,
            name: name.to_string(),
            station: station.to_string(),
            role,
        };

        Self {
            tracks: vec![
                track(1, "Depot Morning", 184),
                track(2, "Ring Line", 201),
                track(3, "Last Train", 163),
                track(4, "Tunnel Lights", 225),
                track(5, "Platform Echo", 192),
            ],
            spawns: vec![
                spawn(1, "Depot track 3", "Severnoye depot", SpawnRole::Driver),
                spawn(2, "Turnback siding", "Park Pobedy", SpawnRole::Driver),
                spawn(3, "Cab 81-717", "Prospekt Mira", SpawnRole::Driver),
                spawn(4, "Platform 1", "Park Pobedy", SpawnRole::Passenger),
                spawn(5, "Platform 2", "Prospekt Mira", SpawnRole::Passenger),
                spawn(6, "Concourse", "Novoslobodskaya", SpawnRole::Passenger),
            ],
            candidates: vec![
                MapCandidate::new(1, "gm_metro_jar_imagine_line_v4"),
                MapCandidate::new(2, "gm_mus_crimson_line"),
                MapCandidate::new(3, "gm_metro_ruralline_v29"),
                MapCandidate::new(4, "gm_metro_minsk_1984"),
            ],
            roster: Vec::new(),
            news: vec![
                NewsItem {
                    id: 1,
                    title: "New signalling on the Crimson line".to_string(),
                },
                NewsItem {
                    id: 2,
                    title: "Battle pass season 3".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub timing: TimingConfig,
    pub audio: AudioConfig,
    pub battle_pass: BattlePassConfig,
    pub catalog: CatalogConfig,
    /// Roster id of the local viewer, recorded on locked ballots
    pub viewer_id: PlayerId,
    /// Offset of the displayed clock from UTC
    pub utc_offset_hours: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            audio: AudioConfig::default(),
            battle_pass: BattlePassConfig::default(),
            catalog: CatalogConfig::default(),
            viewer_id: 0,
            utc_offset_hours: 3,
        }
    }
}

impl OverlayConfig {
    /// Reads and validates a JSON config file
    pub fn load(path: &Path) -> Result<Self, OverlayError> {
        let raw = fs::read_to_string(path).map_err(|source| OverlayError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: OverlayConfig =
            serde_json::from_str(&raw).map_err(|source| OverlayError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), OverlayError> {
        let timing = &self.timing;
        let periods = [
            ("timing.clock_refresh_ms", timing.clock_refresh_ms),
            ("timing.loading_tick_ms", timing.loading_tick_ms),
            ("timing.queue_step_ms", timing.queue_step_ms),
            ("timing.music_tick_ms", timing.music_tick_ms),
            ("timing.fade_in_ms", timing.fade_in_ms),
            ("timing.quick_fade_ms", timing.quick_fade_ms),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        if timing.vote_duration_secs == 0 {
            return Err(invalid(
                "timing.vote_duration_secs",
                "must be greater than zero",
            ));
        }
        if timing.loading_step_min == 0 || timing.loading_step_max <= timing.loading_step_min {
            return Err(invalid(
                "timing.loading_step_max",
                "loading steps need 0 < min < max",
            ));
        }

        let volume = self.audio.target_volume;
        if !(volume > 0.0 && volume <= 1.0) {
            return Err(invalid(
                "audio.target_volume",
                &format!("{} is outside (0, 1]", volume),
            ));
        }

        let pass = &self.battle_pass;
        if pass.xp_per_level == 0 {
            return Err(invalid("battle_pass.xp_per_level", "must be greater than zero"));
        }
        if pass.max_level == 0 || pass.start_level == 0 || pass.start_level > pass.max_level {
            return Err(invalid(
                "battle_pass.start_level",
                "levels need 1 <= start_level <= max_level",
            ));
        }

        if let Some(track) = self.catalog.tracks.iter().find(|t| t.duration_ms == 0) {
            return Err(invalid(
                "catalog.tracks",
                &format!("track {} has no duration", track.id),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> OverlayError {
    OverlayError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}
