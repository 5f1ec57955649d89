//! Hold-to-show roster overlay and its per-row context menu

use log::{debug, info};
use shared::{ContextAction, ContextMenuView, OverlayEvent, Player, PlayerId};
use std::collections::HashSet;

pub use shared::ContextOutcome;

const PROFILE_URL_BASE: &str = "https://steamcommunity.com/profiles/";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextMenu {
    pub player_id: PlayerId,
    pub x: f32,
    pub y: f32,
}

pub struct Scoreboard {
    roster: Vec<Player>,
    key_held: bool,
    visible: bool,
    context_menu: Option<ContextMenu>,
    muted: HashSet<PlayerId>,
}

impl Scoreboard {
    pub fn new(roster: Vec<Player>) -> Self {
        Self {
            roster,
            key_held: false,
            visible: false,
            context_menu: None,
            muted: HashSet::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn context_menu(&self) -> Option<ContextMenu> {
        self.context_menu
    }

    pub fn is_muted(&self, player_id: PlayerId) -> bool {
        self.muted.contains(&player_id)
    }

    /// Replaces the roster. An open menu for a player who left is closed.
    pub fn set_roster(&mut self, roster: Vec<Player>, events: &mut Vec<OverlayEvent>) {
        self.roster = roster;
        if let Some(menu) = self.context_menu {
            if !self.roster.iter().any(|p| p.id == menu.player_id) {
                self.close_menu(events);
            }
        }
    }

    pub fn set_key_held(&mut self, held: bool, suppressed: bool, events: &mut Vec<OverlayEvent>) {
        self.key_held = held;
        self.refresh(suppressed, events);
    }

    /// Recomputes visibility, emitting an event only when it changes
    pub fn refresh(&mut self, suppressed: bool, events: &mut Vec<OverlayEvent>) {
        let visible = self.key_held && !suppressed;
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        if visible {
            debug!("Scoreboard shown");
            events.push(OverlayEvent::ScoreboardShown);
        } else {
            debug!("Scoreboard hidden");
            self.close_menu(events);
            events.push(OverlayEvent::ScoreboardHidden);
        }
    }

    /// Secondary activation on a roster row
    pub fn open_menu(&mut self, row: usize, x: f32, y: f32, events: &mut Vec<OverlayEvent>) -> bool {
        if !self.visible {
            return false;
        }
        let Some(player) = self.roster.get(row) else {
            return false;
        };
        let menu = ContextMenu {
            player_id: player.id,
            x,
            y,
        };
        self.context_menu = Some(menu);
        events.push(OverlayEvent::ContextMenuOpened {
            player_id: menu.player_id,
            x,
            y,
        });
        true
    }

    /// Global primary-click dismissal
    pub fn close_menu(&mut self, events: &mut Vec<OverlayEvent>) -> bool {
        if self.context_menu.take().is_none() {
            return false;
        }
        events.push(OverlayEvent::ContextMenuClosed);
        true
    }

    /// Runs a menu item for the bound player; completing an item closes the menu.
    pub fn run_action(
        &mut self,
        action: ContextAction,
        events: &mut Vec<OverlayEvent>,
    ) -> Option<ContextOutcome> {
        let menu = self.context_menu?;
        let player = self.roster.iter().find(|p| p.id == menu.player_id)?;

        let outcome = match action {
            ContextAction::ViewProfile => {
                ContextOutcome::OpenUrl(format!("{}{}", PROFILE_URL_BASE, player.platform_id))
            }
            ContextAction::CopyId => ContextOutcome::CopyToClipboard(player.platform_id.clone()),
            ContextAction::Message => ContextOutcome::OpenChat(player.id),
            ContextAction::Mute => {
                let player_id = player.id;
                let muted = if self.muted.remove(&player_id) {
                    false
                } else {
                    self.muted.insert(player_id);
                    true
                };
                info!("Player {} muted: {}", player_id, muted);
                ContextOutcome::Muted { player_id, muted }
            }
        };

        self.close_menu(events);
        Some(outcome)
    }

    pub fn menu_view(&self) -> Option<ContextMenuView> {
        self.context_menu.map(|menu| ContextMenuView {
            player_id: menu.player_id,
            x: menu.x,
            y: menu.y,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_player(id: PlayerId) -> Player {
    Player {
        id,
        display_name: format!("Driver {}", id),
        rank_label: "Machinist".to_string(),
        ping_ms: 30 + id,
        avatar_variant: (id % 4) as u8,
        country_code: "RU".to_string(),
        geo_label: "Moscow".to_string(),
        status_label: "On line 1".to_string(),
        platform_id: format!("7656119800000000{}", id),
    }
}
