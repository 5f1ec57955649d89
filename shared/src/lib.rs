use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PROTOCOL_VERSION: u32 = 1;
/// Largest UDP payload over IPv4. Receive buffers must hold this much, since
/// a full server's roster does not fit in a small one.
pub const MAX_PACKET_SIZE: usize = 65_507;

pub const VOTE_DURATION_SECS: u32 = 300;
pub const CONNECT_GATE_MS: u64 = 3_000;
pub const QUEUE_WAIT_MS: u64 = 60_000;
pub const CLOCK_REFRESH_MS: u64 = 2_000;
pub const MUSIC_TICK_MS: u64 = 50;
pub const FADE_IN_MS: u64 = 3_000;
pub const FADE_OUT_WINDOW_MS: u64 = 10_000;
pub const QUICK_FADE_MS: u64 = 1_000;

pub type PlayerId = u32;
pub type TrackId = u32;
pub type SpawnId = u32;
pub type CandidateId = u32;
pub type NewsId = u32;

/// The single full-screen overlay currently shown by the game client.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceMode {
    Menu,
    Loading,
    Connecting,
    Queue,
    ClickToStart,
    SpawnSelection,
    InGame,
    BattlePass,
}

impl InterfaceMode {
    /// Modes during which background music plays.
    pub fn has_music(&self) -> bool {
        matches!(
            self,
            InterfaceMode::ClickToStart | InterfaceMode::SpawnSelection | InterfaceMode::BattlePass
        )
    }

    /// Modes that hide the scoreboard even while its key is held.
    pub fn suppresses_scoreboard(&self) -> bool {
        matches!(self, InterfaceMode::Loading | InterfaceMode::Queue)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnFilter {
    #[default]
    All,
    Driver,
    Passenger,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SpawnRole {
    Driver,
    Passenger,
}

impl SpawnFilter {
    pub fn admits(&self, role: SpawnRole) -> bool {
        match self {
            SpawnFilter::All => true,
            SpawnFilter::Driver => role == SpawnRole::Driver,
            SpawnFilter::Passenger => role == SpawnRole::Passenger,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpawnPoint {
    pub id: SpawnId,
    pub name: String,
    pub station: String,
    pub role: SpawnRole,
}

/// A scoreboard row. Supplied by the host and never mutated by the overlay.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub rank_label: String,
    pub ping_ms: u32,
    pub avatar_variant: u8,
    pub country_code: String,
    pub geo_label: String,
    pub status_label: String,
    pub platform_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MapCandidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(default)]
    pub voter_ids: BTreeSet<PlayerId>,
}

impl MapCandidate {
    pub fn new(id: CandidateId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            voter_ids: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewsItem {
    pub id: NewsId,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Tab,
    Escape,
    Other(u32),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// A raw keyboard event as reported by the host. `repeat` is set for
/// auto-repeat presses generated while a key is held.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    pub repeat: bool,
}

impl KeyEvent {
    pub fn pressed(key: Key) -> Self {
        Self {
            key,
            state: KeyState::Pressed,
            repeat: false,
        }
    }

    pub fn repeated(key: Key) -> Self {
        Self {
            key,
            state: KeyState::Pressed,
            repeat: true,
        }
    }

    pub fn released(key: Key) -> Self {
        Self {
            key,
            state: KeyState::Released,
            repeat: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    ViewProfile,
    CopyId,
    Message,
    Mute,
}

/// What a completed context menu item asks the host to do.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ContextOutcome {
    OpenUrl(String),
    CopyToClipboard(String),
    OpenChat(PlayerId),
    Muted { player_id: PlayerId, muted: bool },
}

/// Activations of named controls inside the overlay.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum UiAction {
    Resume,
    OpenBattlePass,
    Back,
    SetSpawnFilter(SpawnFilter),
    SelectSpawn(SpawnId),
    OpenMapVote,
    CloseMapVote,
    SelectCandidate(CandidateId),
    ActivateVote,
    HoverVoter {
        candidate_id: CandidateId,
        voter_id: PlayerId,
        x: f32,
        y: f32,
    },
    ClearVoterHover,
    OpenNews(NewsId),
    CloseNews,
    ContextMenu(ContextAction),
    AddBattlePassXp(u32),
    BattlePassLevelUp,
    UnlockPremium,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum VoteCloseReason {
    Dismissed,
    Confirmed,
    Timeout,
}

/// Notable state changes, in the order they happened.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum OverlayEvent {
    ModeChanged {
        from: InterfaceMode,
        to: InterfaceMode,
    },
    ScoreboardShown,
    ScoreboardHidden,
    ContextMenuOpened {
        player_id: PlayerId,
        x: f32,
        y: f32,
    },
    ContextMenuClosed,
    MapVoteOpened,
    MapVoteClosed {
        reason: VoteCloseReason,
        locked: bool,
    },
    BallotLocked {
        candidate_id: CandidateId,
    },
    TrackStarted {
        track_id: TrackId,
    },
    TrackStopped {
        track_id: TrackId,
    },
    LevelUp {
        level: u32,
    },
}

/// Commands for the single audio output channel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum AudioCommand {
    Play { track_id: TrackId },
    Pause,
    SetVolume(f32),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContextMenuView {
    pub player_id: PlayerId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MapVoteView {
    pub open: bool,
    pub remaining_seconds: u32,
    pub selected_candidate_id: Option<CandidateId>,
    pub locked: bool,
    pub candidates: Vec<MapCandidate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClockView {
    pub time_of_day: String,
    pub date_label: String,
    pub fps: u32,
    pub ping_ms: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BattlePassView {
    pub level: u32,
    pub xp: u32,
    pub xp_per_level: u32,
    pub has_premium_track: bool,
}

/// Everything the host needs to draw the overlay.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Snapshot {
    pub now_ms: u64,
    pub mode: InterfaceMode,
    pub loading_percent: u32,
    pub queue_position: u32,
    pub spawn_filter: SpawnFilter,
    pub scoreboard_visible: bool,
    pub context_menu: Option<ContextMenuView>,
    pub map_vote: MapVoteView,
    pub news_open: Option<NewsId>,
    pub clock: ClockView,
    pub current_track: Option<TrackId>,
    pub volume: f32,
    pub battle_pass: BattlePassView,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Hello {
        client_version: u32,
    },
    Key(KeyEvent),
    Click {
        x: f32,
        y: f32,
    },
    RowContextClick {
        row: usize,
        x: f32,
        y: f32,
    },
    Action(UiAction),
    TrackEnded {
        track_id: TrackId,
    },
    Roster(Vec<Player>),
    Goodbye,

    Welcome {
        mode: InterfaceMode,
    },
    Audio(AudioCommand),
    Events(Vec<OverlayEvent>),
    Outcome(ContextOutcome),
    Snapshot(Box<Snapshot>),
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
