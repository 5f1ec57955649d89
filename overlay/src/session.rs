//! Overlay session controller
//!
//! Owns the current [`InterfaceMode`] and every piece of state that hangs off
//! it. All mutation happens synchronously inside one of the input handlers
//! (`handle_key`, `click`, `row_context_click`, `perform`, `track_ended`) or
//! inside a timer callback run by [`SessionController::advance_to`].
//!
//! Mode changes go through a single transition routine: the old mode's timers
//! are cancelled, the new mode's timers are started, music and scoreboard
//! visibility are re-evaluated and a `ModeChanged` event is queued.

use crate::audio::AudioSink;
use crate::battle_pass::BattlePass;
use crate::clock::SessionClock;
use crate::config::{OverlayConfig, TimingConfig};
use crate::input::{KeyEdge, KeyTracker};
use crate::map_vote::{MapVote, VoteButton};
use crate::music::MusicScheduler;
use crate::news::NewsModal;
use crate::random::RandomSource;
use crate::scoreboard::{ContextOutcome, Scoreboard};
use crate::stages::{ConnectGate, LoadingStage, QueueStage, SpawnSelection};
use crate::timers::{TimerId, TimerKind, TimerSet};
use log::{debug, info};
use shared::{
    InterfaceMode, Key, KeyEvent, NewsId, OverlayEvent, Player, Snapshot, SpawnFilter, SpawnId,
    SpawnPoint, TrackId, UiAction, VoteCloseReason,
};

/// Startup inputs that pick the first mode. Read once, never polled again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialModeParams {
    pub gamemode: Option<String>,
    /// True when running inside the game client rather than a plain browser
    pub platform_host: bool,
}

impl InitialModeParams {
    /// Extracts `gamemode` from a query string such as `?gamemode=loading&x=1`
    pub fn from_query(query: &str, platform_host: bool) -> Self {
        let gamemode = query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "gamemode")
            .map(|(_, value)| value.to_string());
        Self {
            gamemode,
            platform_host,
        }
    }
}

/// Picks the first mode. Unknown `gamemode` values fall back to the menu.
pub fn initial_mode(params: &InitialModeParams) -> InterfaceMode {
    let requested = params
        .gamemode
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match requested {
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "loading" => InterfaceMode::Loading,
            "connecting" => InterfaceMode::Connecting,
            "ingame" => InterfaceMode::InGame,
            "queue" => InterfaceMode::Queue,
            other => {
                debug!("Unknown gamemode {:?}, starting in the menu", other);
                InterfaceMode::Menu
            }
        },
        None if params.platform_host => InterfaceMode::Loading,
        None => InterfaceMode::Menu,
    }
}

/// What a [`UiAction`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Applied,
    Ignored,
    /// A context menu item ran and produced something for the host to do
    Context(ContextOutcome),
}

pub struct SessionController {
    mode: InterfaceMode,
    now_ms: u64,
    start_epoch_ms: i64,
    ended: bool,
    timing: TimingConfig,
    timers: TimerSet,
    random: Box<dyn RandomSource>,
    keys: KeyTracker,
    clock: SessionClock,
    clock_timer: Option<TimerId>,
    loading: LoadingStage,
    gate: ConnectGate,
    queue: QueueStage,
    spawns: SpawnSelection,
    music: MusicScheduler,
    map_vote: MapVote,
    news: NewsModal,
    scoreboard: Scoreboard,
    battle_pass: BattlePass,
    events: Vec<OverlayEvent>,
}

impl SessionController {
    /// Mounts a session at `now_ms = 0`. `start_epoch_ms` anchors the clock.
    pub fn new(
        config: &OverlayConfig,
        params: &InitialModeParams,
        start_epoch_ms: i64,
        random: Box<dyn RandomSource>,
        audio: Box<dyn AudioSink>,
    ) -> Self {
        let catalog = &config.catalog;
        let mode = initial_mode(params);

        let mut session = Self {
            mode,
            now_ms: 0,
            start_epoch_ms,
            ended: false,
            timing: config.timing.clone(),
            timers: TimerSet::new(),
            random,
            keys: KeyTracker::new(),
            clock: SessionClock::new(config.utc_offset_hours),
            clock_timer: None,
            loading: LoadingStage::default(),
            gate: ConnectGate::default(),
            queue: QueueStage::default(),
            spawns: SpawnSelection::new(catalog.spawns.clone()),
            music: MusicScheduler::new(
                catalog.tracks.clone(),
                &config.timing,
                config.audio.target_volume,
                audio,
            ),
            map_vote: MapVote::new(
                catalog.candidates.clone(),
                config.viewer_id,
                config.timing.vote_duration_secs,
            ),
            news: NewsModal::new(catalog.news.clone()),
            scoreboard: Scoreboard::new(catalog.roster.clone()),
            battle_pass: BattlePass::new(&config.battle_pass),
            events: Vec::new(),
        };

        session.refresh_clock();
        session.clock_timer = Some(session.timers.start_interval(
            TimerKind::Clock,
            0,
            session.timing.clock_refresh_ms,
        ));
        session.enter(mode);

        info!("Overlay session started in {:?}", mode);
        session
    }

    pub fn mode(&self) -> InterfaceMode {
        self.mode
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn music(&self) -> &MusicScheduler {
        &self.music
    }

    pub fn map_vote(&self) -> &MapVote {
        &self.map_vote
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn battle_pass(&self) -> &BattlePass {
        &self.battle_pass
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn loading_percent(&self) -> u32 {
        self.loading.percent()
    }

    pub fn queue_position(&self) -> u32 {
        self.queue.position()
    }

    pub fn connect_ready(&self) -> bool {
        self.gate.is_open()
    }

    pub fn spawn_filter(&self) -> SpawnFilter {
        self.spawns.filter()
    }

    pub fn visible_spawns(&self) -> Vec<&SpawnPoint> {
        self.spawns.visible().collect()
    }

    pub fn news_open(&self) -> Option<NewsId> {
        self.news.open_item()
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn next_timer_due(&self) -> Option<u64> {
        self.timers.next_due()
    }

    /// Runs every timer due up to `target_ms`, in due order.
    /// Time never moves backwards; an earlier target is ignored.
    pub fn advance_to(&mut self, target_ms: u64) {
        if self.ended || target_ms < self.now_ms {
            return;
        }
        while let Some((_, kind, due_ms)) = self.timers.pop_due(target_ms) {
            self.now_ms = due_ms;
            self.on_timer(kind);
        }
        self.now_ms = target_ms;
    }

    pub fn advance_by(&mut self, elapsed_ms: u64) {
        self.advance_to(self.now_ms.saturating_add(elapsed_ms));
    }

    pub fn handle_key(&mut self, event: KeyEvent) {
        if self.ended {
            return;
        }
        let Some(edge) = self.keys.process(event) else {
            return;
        };

        match edge {
            KeyEdge::Down(Key::Tab) => {
                self.scoreboard
                    .set_key_held(true, self.mode.suppresses_scoreboard(), &mut self.events)
            }
            KeyEdge::Up(Key::Tab) => {
                self.scoreboard
                    .set_key_held(false, self.mode.suppresses_scoreboard(), &mut self.events)
            }
            KeyEdge::Down(Key::Escape) => match self.mode {
                InterfaceMode::InGame => self.transition(InterfaceMode::Menu),
                InterfaceMode::Menu => self.transition(InterfaceMode::InGame),
                _ => {}
            },
            _ => {}
        }
    }

    /// Primary click anywhere on the page
    pub fn click(&mut self, x: f32, y: f32) {
        if self.ended {
            return;
        }
        debug!("Click at ({}, {}) in {:?}", x, y, self.mode);
        self.scoreboard.close_menu(&mut self.events);

        match self.mode {
            InterfaceMode::Connecting if self.gate.is_open() => {
                self.transition(InterfaceMode::ClickToStart)
            }
            InterfaceMode::ClickToStart => self.transition(InterfaceMode::SpawnSelection),
            _ => {}
        }
    }

    /// Secondary click on a scoreboard row
    pub fn row_context_click(&mut self, row: usize, x: f32, y: f32) -> bool {
        if self.ended {
            return false;
        }
        self.scoreboard.open_menu(row, x, y, &mut self.events)
    }

    pub fn perform(&mut self, action: UiAction) -> ActionResult {
        if self.ended {
            return ActionResult::Ignored;
        }

        let applied = match action {
            UiAction::Resume => self.transition_from(InterfaceMode::Menu, InterfaceMode::InGame),
            UiAction::OpenBattlePass => {
                self.transition_from(InterfaceMode::Menu, InterfaceMode::BattlePass)
            }
            UiAction::Back => self.transition_from(InterfaceMode::BattlePass, InterfaceMode::Menu),
            UiAction::SetSpawnFilter(filter) => {
                let in_selection = self.mode == InterfaceMode::SpawnSelection;
                if in_selection {
                    self.spawns.set_filter(filter);
                }
                in_selection
            }
            UiAction::SelectSpawn(spawn_id) => self.select_spawn(spawn_id),
            UiAction::OpenMapVote => {
                let was_open = self.map_vote.is_open();
                self.map_vote
                    .open(&mut self.timers, self.now_ms, &mut self.events);
                !was_open
            }
            UiAction::CloseMapVote => {
                let was_open = self.map_vote.is_open();
                self.map_vote
                    .close(VoteCloseReason::Dismissed, &mut self.timers, &mut self.events);
                was_open
            }
            UiAction::SelectCandidate(candidate_id) => self.map_vote.select(candidate_id),
            UiAction::ActivateVote => {
                self.map_vote
                    .activate_button(&mut self.timers, &mut self.events)
                    != VoteButton::Disabled
            }
            UiAction::HoverVoter {
                candidate_id,
                voter_id,
                x,
                y,
            } => {
                self.map_vote.hover_voter(candidate_id, voter_id, x, y);
                self.map_vote.tooltip().is_some()
            }
            UiAction::ClearVoterHover => {
                let had_tooltip = self.map_vote.tooltip().is_some();
                self.map_vote.clear_hover();
                had_tooltip
            }
            UiAction::OpenNews(news_id) => self.news.open(news_id),
            UiAction::CloseNews => self.news.close(),
            UiAction::ContextMenu(item) => {
                return match self.scoreboard.run_action(item, &mut self.events) {
                    Some(outcome) => ActionResult::Context(outcome),
                    None => ActionResult::Ignored,
                };
            }
            UiAction::AddBattlePassXp(amount) => self.battle_pass.add_xp(amount) > 0,
            UiAction::BattlePassLevelUp => self.battle_pass.level_up(&mut self.events),
            UiAction::UnlockPremium => {
                let locked = !self.battle_pass.has_premium_track();
                self.battle_pass.unlock_premium();
                locked
            }
        };

        if applied {
            ActionResult::Applied
        } else {
            debug!("{:?} ignored in {:?}", action, self.mode);
            ActionResult::Ignored
        }
    }

    /// End-of-track report from the host's audio element
    pub fn track_ended(&mut self, track_id: TrackId) -> bool {
        if self.ended {
            return false;
        }
        self.music.on_track_ended(
            track_id,
            &mut self.timers,
            self.random.as_mut(),
            self.now_ms,
            &mut self.events,
        )
    }

    pub fn set_roster(&mut self, roster: Vec<Player>) {
        self.scoreboard.set_roster(roster, &mut self.events);
    }

    /// Unmounts the session: every timer is cancelled and audio is paused.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.exit(self.mode);
        self.music.halt(&mut self.timers, &mut self.events);
        self.map_vote
            .close(VoteCloseReason::Dismissed, &mut self.timers, &mut self.events);
        self.timers.cancel_slot(&mut self.clock_timer);
        self.ended = true;
        debug_assert!(self.timers.is_empty(), "timers left after session end");
        info!("Overlay session ended in {:?} at {}ms", self.mode, self.now_ms);
    }

    pub fn drain_events(&mut self) -> Vec<OverlayEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            now_ms: self.now_ms,
            mode: self.mode,
            loading_percent: self.loading.percent(),
            queue_position: self.queue.position(),
            spawn_filter: self.spawns.filter(),
            scoreboard_visible: self.scoreboard.is_visible(),
            context_menu: self.scoreboard.menu_view(),
            map_vote: self.map_vote.view(),
            news_open: self.news.open_item(),
            clock: self.clock.view(),
            current_track: self.music.current_track(),
            volume: self.music.volume(),
            battle_pass: self.battle_pass.view(),
        }
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Clock => self.refresh_clock(),
            TimerKind::LoadingProgress => {
                debug_assert_eq!(self.mode, InterfaceMode::Loading);
                let full = self.loading.on_tick(
                    self.random.as_mut(),
                    self.timing.loading_step_min,
                    self.timing.loading_step_max,
                );
                if full {
                    self.transition(InterfaceMode::Connecting);
                }
            }
            TimerKind::ConnectGate => {
                debug_assert_eq!(self.mode, InterfaceMode::Connecting);
                self.gate.on_timer();
                debug!("Connect gate open at {}ms", self.now_ms);
            }
            TimerKind::QueuePosition => self.queue.on_step(),
            TimerKind::QueueWait => {
                debug_assert_eq!(self.mode, InterfaceMode::Queue);
                self.queue.on_wait();
                self.transition(InterfaceMode::Loading);
            }
            TimerKind::Music => self.music.on_tick(
                &mut self.timers,
                self.random.as_mut(),
                self.now_ms,
                &mut self.events,
            ),
            TimerKind::VoteCountdown => self.map_vote.on_countdown(&mut self.timers, &mut self.events),
        }
    }

    fn refresh_clock(&mut self) {
        let epoch_ms = self.start_epoch_ms.saturating_add(self.now_ms as i64);
        self.clock.refresh(epoch_ms, self.random.as_mut());
    }

    fn select_spawn(&mut self, spawn_id: SpawnId) -> bool {
        if self.mode != InterfaceMode::SpawnSelection {
            return false;
        }
        let Some(spawn) = self.spawns.select(spawn_id) else {
            debug!("Spawn {} is not selectable under {:?}", spawn_id, self.spawns.filter());
            return false;
        };
        info!("Spawning at {} ({})", spawn.name, spawn.station);
        self.transition(InterfaceMode::InGame);
        true
    }

    fn transition_from(&mut self, from: InterfaceMode, to: InterfaceMode) -> bool {
        if self.mode != from {
            return false;
        }
        self.transition(to);
        true
    }

    fn transition(&mut self, to: InterfaceMode) {
        let from = self.mode;
        if from == to {
            return;
        }
        self.exit(from);
        self.mode = to;
        info!("Mode {:?} -> {:?}", from, to);
        self.events.push(OverlayEvent::ModeChanged { from, to });
        self.enter(to);
    }

    /// Cancels the timers owned by `mode`'s stage
    fn exit(&mut self, mode: InterfaceMode) {
        match mode {
            InterfaceMode::Loading => self.loading.exit(&mut self.timers),
            InterfaceMode::Connecting => self.gate.exit(&mut self.timers),
            InterfaceMode::Queue => self.queue.exit(&mut self.timers),
            _ => {}
        }
    }

    fn enter(&mut self, mode: InterfaceMode) {
        let now_ms = self.now_ms;
        match mode {
            InterfaceMode::Loading => {
                self.loading
                    .enter(&mut self.timers, now_ms, self.timing.loading_tick_ms)
            }
            InterfaceMode::Connecting => {
                self.gate
                    .enter(&mut self.timers, now_ms, self.timing.connect_gate_ms)
            }
            InterfaceMode::Queue => self.queue.enter(
                &mut self.timers,
                self.random.as_mut(),
                now_ms,
                self.timing.queue_step_ms,
                self.timing.queue_wait_ms,
            ),
            InterfaceMode::SpawnSelection => self.spawns.reset(),
            InterfaceMode::Menu
            | InterfaceMode::ClickToStart
            | InterfaceMode::InGame
            | InterfaceMode::BattlePass => {}
        }

        self.music.sync(
            mode.has_music(),
            &mut self.timers,
            self.random.as_mut(),
            now_ms,
            &mut self.events,
        );
        self.scoreboard
            .refresh(mode.suppresses_scoreboard(), &mut self.events);
    }
}
