//! Versioned saved-game records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::{GameConfig, UndoPolicy};
use super::history::MoveHistory;
use super::GameState;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("unsupported save version {0}")]
    Version(u32),
    #[error("malformed save: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ClockSnapshot {
    /// Milliseconds left on the clock.
    pub remaining: u64,
    /// Budget the percentage display is measured against.
    pub total: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ClocksSnapshot {
    pub white: ClockSnapshot,
    pub black: ClockSnapshot,
}

/// The full on-disk shape: everything needed to resume a game where it
/// stood, including finished ones kept for review.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGame {
    pub version: u32,
    #[serde(flatten)]
    pub state: GameState,
    pub undo: UndoPolicy,
    pub clocks: ClocksSnapshot,
    pub config: GameConfig,
    pub moves: MoveHistory,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl SavedGame {
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a save, rejecting unknown versions before looking at the
    /// rest of the record.
    pub fn from_json(data: &str) -> Result<SavedGame, SaveError> {
        let probe: VersionProbe = serde_json::from_str(data)?;
        if probe.version != SAVE_VERSION {
            return Err(SaveError::Version(probe.version));
        }
        Ok(serde_json::from_str(data)?)
    }
}
