//! Per-mode state for the pre-game screens
//!
//! Each stage owns the timers it starts on entry and cancels them on exit.

use crate::random::RandomSource;
use crate::timers::{TimerId, TimerKind, TimerSet};
use log::debug;
use shared::{SpawnFilter, SpawnId, SpawnPoint};

const QUEUE_START_RANGE: (u32, u32) = (5, 25);

#[derive(Debug, Default)]
pub struct LoadingStage {
    percent: u32,
    timer: Option<TimerId>,
}

impl LoadingStage {
    pub fn percent(&self) -> u32 {
        self.percent
    }

    pub fn enter(&mut self, timers: &mut TimerSet, now_ms: u64, tick_ms: u64) {
        self.percent = 0;
        self.timer = Some(timers.start_interval(TimerKind::LoadingProgress, now_ms, tick_ms));
    }

    pub fn exit(&mut self, timers: &mut TimerSet) {
        timers.cancel_slot(&mut self.timer);
    }

    /// Advances the bar by a random step; true once it is full.
    pub fn on_tick(&mut self, random: &mut dyn RandomSource, step_min: u32, step_max: u32) -> bool {
        let step = random.range_u32(step_min, step_max);
        self.percent = (self.percent + step).min(100);
        debug!("Loading {}%", self.percent);
        self.percent >= 100
    }
}

/// Ignores clicks on the connecting screen until its delay has passed
#[derive(Debug, Default)]
pub struct ConnectGate {
    open: bool,
    timer: Option<TimerId>,
}

impl ConnectGate {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn enter(&mut self, timers: &mut TimerSet, now_ms: u64, delay_ms: u64) {
        self.open = false;
        self.timer = Some(timers.start_once(TimerKind::ConnectGate, now_ms, delay_ms));
    }

    pub fn exit(&mut self, timers: &mut TimerSet) {
        timers.cancel_slot(&mut self.timer);
    }

    pub fn on_timer(&mut self) {
        // One-shot timers are gone once they fire.
        self.timer = None;
        self.open = true;
    }
}

#[derive(Debug, Default)]
pub struct QueueStage {
    position: u32,
    step_timer: Option<TimerId>,
    wait_timer: Option<TimerId>,
}

impl QueueStage {
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn enter(
        &mut self,
        timers: &mut TimerSet,
        random: &mut dyn RandomSource,
        now_ms: u64,
        step_ms: u64,
        wait_ms: u64,
    ) {
        self.position = random.range_u32(QUEUE_START_RANGE.0, QUEUE_START_RANGE.1);
        self.step_timer = Some(timers.start_interval(TimerKind::QueuePosition, now_ms, step_ms));
        self.wait_timer = Some(timers.start_once(TimerKind::QueueWait, now_ms, wait_ms));
    }

    pub fn exit(&mut self, timers: &mut TimerSet) {
        timers.cancel_slot(&mut self.step_timer);
        timers.cancel_slot(&mut self.wait_timer);
    }

    pub fn on_step(&mut self) {
        self.position = self.position.saturating_sub(1).max(1);
    }

    pub fn on_wait(&mut self) {
        self.wait_timer = None;
    }
}

pub struct SpawnSelection {
    points: Vec<SpawnPoint>,
    filter: SpawnFilter,
}

impl SpawnSelection {
    pub fn new(points: Vec<SpawnPoint>) -> Self {
        Self {
            points,
            filter: SpawnFilter::All,
        }
    }

    pub fn filter(&self) -> SpawnFilter {
        self.filter
    }

    pub fn reset(&mut self) {
        self.filter = SpawnFilter::All;
    }

    pub fn set_filter(&mut self, filter: SpawnFilter) {
        self.filter = filter;
    }

    pub fn visible(&self) -> impl Iterator<Item = &SpawnPoint> {
        self.points
            .iter()
            .filter(move |point| self.filter.admits(point.role))
    }

    /// Looks up a spawn among those shown under the current filter
    pub fn select(&self, id: SpawnId) -> Option<&SpawnPoint> {
        self.visible().find(|point| point.id == id)
    }
}
