//! Player lifecycle state machine
//!
//! ```text
//! Uninitialized ──► Initialized ──► Loading ──► Loaded ──┬──► Playing ◄──► Paused
//!                       ▲              │          │      │       │           │
//!                       │              │          │      └───────┼───────────┤
//!                       │              ▼          ▼              ▼           ▼
//!                       └──────────────┴──────────┴───────── Complete ◄──────┘
//! ```
//!
//! Every state past `Initialized` can fall back to it (stop), and
//! `Complete` only leads back to `Initialized` so the same content can be replayed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Player lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// No backend attached
    Uninitialized = 0,
    /// Backend ready, no content
    Initialized = 1,
    /// Source being configured
    Loading = 2,
    /// Source set, playback not started
    Loaded = 3,
    /// Playback paused
    Paused = 4,
    /// Content is playing
    Playing = 5,
    /// Playback reached the end of the content
    Complete = 6,
}

impl PlayerState {
    /// All states, ordered by identifier
    pub const ALL: [PlayerState; 7] = [
        PlayerState::Uninitialized,
        PlayerState::Initialized,
        PlayerState::Loading,
        PlayerState::Loaded,
        PlayerState::Paused,
        PlayerState::Playing,
        PlayerState::Complete,
    ];

    /// Stable numeric identifier carried by `stateChanged` notifications
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Look up a state by its identifier
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// States reachable from this one in a single transition
    pub fn successors(&self) -> &'static [PlayerState] {
        use PlayerState::*;
        match self {
            Uninitialized => &[Initialized],
            Initialized => &[Loading],
            Loading => &[Initialized, Loaded],
            Loaded => &[Initialized, Paused, Playing],
            Paused => &[Initialized, Playing, Complete],
            Playing => &[Initialized, Paused, Complete],
            Complete => &[Initialized],
        }
    }

    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        *self != target && self.successors().contains(&target)
    }

    /// Validate a transition, returning the target state on success
    pub fn transition(self, target: PlayerState) -> Result<PlayerState> {
        if !self.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: target.to_string(),
            });
        }
        Ok(target)
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        PlayerState::Uninitialized
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Uninitialized => write!(f, "Uninitialized"),
            PlayerState::Initialized => write!(f, "Initialized"),
            PlayerState::Loading => write!(f, "Loading"),
            PlayerState::Loaded => write!(f, "Loaded"),
            PlayerState::Paused => write!(f, "Paused"),
            PlayerState::Playing => write!(f, "Playing"),
            PlayerState::Complete => write!(f, "Complete"),
        }
    }
}
