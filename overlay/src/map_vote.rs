//! Map vote modal: per-opening countdown and a single lockable ballot

use crate::timers::{TimerId, TimerKind, TimerSet};
use log::{debug, info};
use shared::{
    CandidateId, MapCandidate, MapVoteView, OverlayEvent, PlayerId, VoteCloseReason,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ballot {
    pub selected_candidate_id: Option<CandidateId>,
    pub locked: bool,
}

/// Presentational tooltip shown while hovering a voter avatar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoterTooltip {
    pub candidate_id: CandidateId,
    pub voter_id: PlayerId,
    pub x: f32,
    pub y: f32,
}

/// What activating the vote button did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteButton {
    /// Nothing selected yet, or the modal is closed
    Disabled,
    Locked(CandidateId),
    /// Already locked; the button only confirms and closes
    Confirmed,
}

pub struct MapVote {
    candidates: Vec<MapCandidate>,
    viewer_id: PlayerId,
    duration_secs: u32,
    remaining_seconds: u32,
    open: bool,
    ballot: Ballot,
    tooltip: Option<VoterTooltip>,
    countdown: Option<TimerId>,
}

impl MapVote {
    pub fn new(candidates: Vec<MapCandidate>, viewer_id: PlayerId, duration_secs: u32) -> Self {
        Self {
            candidates,
            viewer_id,
            duration_secs,
            remaining_seconds: duration_secs,
            open: false,
            ballot: Ballot::default(),
            tooltip: None,
            countdown: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn ballot(&self) -> Ballot {
        self.ballot
    }

    pub fn candidates(&self) -> &[MapCandidate] {
        &self.candidates
    }

    pub fn tooltip(&self) -> Option<VoterTooltip> {
        self.tooltip
    }

    /// Opens the modal with a fresh countdown and an empty ballot
    pub fn open(&mut self, timers: &mut TimerSet, now_ms: u64, events: &mut Vec<OverlayEvent>) {
        if self.open {
            return;
        }
        self.open = true;
        self.remaining_seconds = self.duration_secs;
        self.ballot = Ballot::default();
        self.tooltip = None;
        self.countdown = Some(timers.start_interval(TimerKind::VoteCountdown, now_ms, 1_000));
        info!("Map vote opened, {}s to vote", self.remaining_seconds);
        events.push(OverlayEvent::MapVoteOpened);
    }

    pub fn on_countdown(&mut self, timers: &mut TimerSet, events: &mut Vec<OverlayEvent>) {
        if !self.open {
            return;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.close(VoteCloseReason::Timeout, timers, events);
        }
    }

    /// Closes the modal. An unlocked selection is discarded.
    pub fn close(
        &mut self,
        reason: VoteCloseReason,
        timers: &mut TimerSet,
        events: &mut Vec<OverlayEvent>,
    ) {
        if !self.open {
            return;
        }
        timers.cancel_slot(&mut self.countdown);
        let locked = self.ballot.locked;
        if !locked {
            self.ballot.selected_candidate_id = None;
        }
        self.open = false;
        self.remaining_seconds = self.duration_secs;
        self.tooltip = None;
        info!("Map vote closed ({:?}, locked: {})", reason, locked);
        events.push(OverlayEvent::MapVoteClosed { reason, locked });
    }

    /// Selects a candidate. Ignored once the ballot is locked.
    pub fn select(&mut self, candidate_id: CandidateId) -> bool {
        if !self.open || self.ballot.locked {
            return false;
        }
        if !self.candidates.iter().any(|c| c.id == candidate_id) {
            debug!("Unknown map candidate {}", candidate_id);
            return false;
        }
        self.ballot.selected_candidate_id = Some(candidate_id);
        true
    }

    pub fn activate_button(
        &mut self,
        timers: &mut TimerSet,
        events: &mut Vec<OverlayEvent>,
    ) -> VoteButton {
        if !self.open {
            return VoteButton::Disabled;
        }
        if self.ballot.locked {
            self.close(VoteCloseReason::Confirmed, timers, events);
            return VoteButton::Confirmed;
        }
        let Some(candidate_id) = self.ballot.selected_candidate_id else {
            return VoteButton::Disabled;
        };

        self.ballot.locked = true;
        for candidate in &mut self.candidates {
            candidate.voter_ids.remove(&self.viewer_id);
            if candidate.id == candidate_id {
                candidate.voter_ids.insert(self.viewer_id);
            }
        }
        info!("Ballot locked for candidate {}", candidate_id);
        events.push(OverlayEvent::BallotLocked { candidate_id });
        VoteButton::Locked(candidate_id)
    }

    pub fn hover_voter(&mut self, candidate_id: CandidateId, voter_id: PlayerId, x: f32, y: f32) {
        if !self.open {
            return;
        }
        let votes_there = self
            .candidates
            .iter()
            .any(|c| c.id == candidate_id && c.voter_ids.contains(&voter_id));
        self.tooltip = votes_there.then_some(VoterTooltip {
            candidate_id,
            voter_id,
            x,
            y,
        });
    }

    pub fn clear_hover(&mut self) {
        self.tooltip = None;
    }

    pub fn view(&self) -> MapVoteView {
        MapVoteView {
            open: self.open,
            remaining_seconds: self.remaining_seconds,
            selected_candidate_id: self.ballot.selected_candidate_id,
            locked: self.ballot.locked,
            candidates: self.candidates.clone(),
        }
    }
}
