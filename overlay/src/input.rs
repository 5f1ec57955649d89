//! Keyboard edge detection for host key events

use log::debug;
use shared::{Key, KeyEvent, KeyState};
use std::collections::HashSet;

/// A key transition after filtering out auto-repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down(Key),
    Up(Key),
}

/// Turns raw host key events into press/release edges
///
/// Hosts report auto-repeat either with the `repeat` flag or by sending
/// another press for a key that is already down. Both are dropped, so a held
/// key yields exactly one `Down` and one `Up`.
#[derive(Debug, Default)]
pub struct KeyTracker {
    held: HashSet<Key>,
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, event: KeyEvent) -> Option<KeyEdge> {
        match event.state {
            KeyState::Pressed => {
                if event.repeat || !self.held.insert(event.key) {
                    debug!("Ignoring repeat of {:?}", event.key);
                    return None;
                }
                Some(KeyEdge::Down(event.key))
            }
            KeyState::Released => {
                if !self.held.remove(&event.key) {
                    return None;
                }
                Some(KeyEdge::Up(event.key))
            }
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }
}
