//! # Metro Overlay Library
//!
//! This library implements the in-game overlay of a Metrostroi community
//! server: the full-screen interface the game client shows while a player
//! loads in, waits in the queue, picks a spawn point, plays, or browses the
//! menu and battle pass.
//!
//! ## Architecture Overview
//!
//! Everything revolves around a single [`session::SessionController`]. It owns
//! the current interface mode and all state hanging off it, and it is driven
//! purely by inputs (keys, clicks, named control actions) and by explicit
//! timers. Nothing blocks and nothing runs in parallel; the controller is
//! advanced to a point in time and fires whatever became due.
//!
//! ### Explicit Timers
//! Every periodic behaviour (loading bar, connect gate, queue countdown,
//! music fades, vote countdown, clock refresh) is a handle in a
//! [`timers::TimerSet`]. A state starts its timers when it is entered and
//! cancels them when it is left, so a superseded mode or track can never be
//! touched by a late callback.
//!
//! ### Injected Collaborators
//! Randomness and audio output are traits. Tests pass a seeded random source
//! and a recording sink; the binary passes entropy and a channel to the host.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The mode state machine and the input surface:
//! - Initial mode selection from the `gamemode` parameter and host detection
//! - Transition routine with per-mode timer setup and teardown
//! - Key, click and control handling
//! - Snapshots and the ordered event outbox
//!
//! ### Stages Module (`stages`)
//! Loading progress, the connect gate, the queue and spawn selection.
//!
//! ### Music Module (`music`)
//! Background music with fade-in, adaptive fade-out, quick stop and a
//! no-repeat shuffle. The only owner of the audio sink.
//!
//! ### Map Vote Module (`map_vote`)
//! Per-opening countdown, a lockable single-choice ballot and voter tooltips.
//!
//! ### Scoreboard Module (`scoreboard`)
//! Hold-to-show roster and the per-row context menu.
//!
//! ### Supporting Modules
//! - `battle_pass`: level and XP progress with a clamped bar
//! - `clock`: cosmetic HUD clock, fps and ping
//! - `news`: news detail modal
//! - `input`: key edge detection that drops auto-repeat
//! - `audio`, `random`: collaborator traits and their implementations
//! - `config`, `error`: JSON configuration and error types
//! - `bridge`: UDP link to the game client
//!
//! ## Usage Example
//!
//! ```rust
//! use overlay::audio::NullAudio;
//! use overlay::config::OverlayConfig;
//! use overlay::random::StdRandom;
//! use overlay::session::{InitialModeParams, SessionController};
//! use shared::{InterfaceMode, UiAction};
//!
//! let params = InitialModeParams::from_query("?gamemode=connecting", true);
//! let mut session = SessionController::new(
//!     &OverlayConfig::default(),
//!     &params,
//!     0,
//!     Box::new(StdRandom::seeded(1)),
//!     Box::new(NullAudio),
//! );
//! assert_eq!(session.mode(), InterfaceMode::Connecting);
//!
//! session.advance_by(3_000);
//! session.click(0.0, 0.0);
//! assert_eq!(session.mode(), InterfaceMode::ClickToStart);
//!
//! session.click(0.0, 0.0);
//! session.perform(UiAction::SelectSpawn(1));
//! assert_eq!(session.mode(), InterfaceMode::InGame);
//! ```

pub mod audio;
pub mod battle_pass;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod input;
pub mod map_vote;
pub mod music;
pub mod news;
pub mod random;
pub mod scoreboard;
pub mod session;
pub mod stages;
pub mod timers;
