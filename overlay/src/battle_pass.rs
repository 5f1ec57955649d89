//! Battle pass progress
//!
//! XP is clamped at a full bar instead of overflowing. A full bar is the
//! "ready" state; `level_up` rolls it into the next level. At the top level
//! the bar stays full.

use crate::config::BattlePassConfig;
use log::info;
use shared::{BattlePassView, OverlayEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattlePass {
    level: u32,
    xp: u32,
    xp_per_level: u32,
    max_level: u32,
    has_premium_track: bool,
}

impl BattlePass {
    pub fn new(config: &BattlePassConfig) -> Self {
        let max_level = config.max_level.max(1);
        Self {
            level: config.start_level.clamp(1, max_level),
            xp: config.start_xp.min(config.xp_per_level),
            xp_per_level: config.xp_per_level,
            max_level,
            has_premium_track: false,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn xp(&self) -> u32 {
        self.xp
    }

    pub fn has_premium_track(&self) -> bool {
        self.has_premium_track
    }

    pub fn is_ready_to_level(&self) -> bool {
        self.xp >= self.xp_per_level && self.level < self.max_level
    }

    /// Adds XP, clamped at a full bar. Returns the XP actually gained.
    pub fn add_xp(&mut self, amount: u32) -> u32 {
        let before = self.xp;
        self.xp = self.xp.saturating_add(amount).min(self.xp_per_level);
        self.xp - before
    }

    /// Rolls a full bar into the next level
    pub fn level_up(&mut self, events: &mut Vec<OverlayEvent>) -> bool {
        if !self.is_ready_to_level() {
            return false;
        }
        self.level += 1;
        self.xp -= self.xp_per_level;
        info!("Battle pass reached level {}", self.level);
        events.push(OverlayEvent::LevelUp { level: self.level });
        true
    }

    pub fn unlock_premium(&mut self) {
        self.has_premium_track = true;
    }

    pub fn view(&self) -> BattlePassView {
        BattlePassView {
            level: self.level,
            xp: self.xp,
            xp_per_level: self.xp_per_level,
            has_premium_track: self.has_premium_track,
        }
    }
}
