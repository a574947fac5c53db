//! Game configuration and the difficulty presets.

use serde::{Deserialize, Serialize};

use crate::board::Side;
use crate::engine::SessionOptions;

pub const DEPTH_MIN: u32 = 1;
pub const DEPTH_MAX: u32 = 30;
pub const DEPTH_DEFAULT: u32 = 12;

/// Named strength presets, each a fixed search depth.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Difficulty {
    Novice,
    Amateur,
    Master,
    Grandmaster,
    Champion,
}

impl Difficulty {
    pub fn depth(self) -> u32 {
        match self {
            Difficulty::Novice => 3,
            Difficulty::Amateur => 6,
            Difficulty::Master => 12,
            Difficulty::Grandmaster => 16,
            Difficulty::Champion => 21,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OpponentKind {
    Computer,
    Human,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum UndoPolicy {
    None,
    Single,
    Full,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub opponent: OpponentKind,
    pub my_side: Side,
    /// Search depth; anything above [`DEPTH_MAX`] means "let the engine
    /// decide".
    pub depth: u32,
    /// Starting position; `None` is the standard layout.
    pub fen: Option<String>,
    /// Clock budget per side in seconds; 0 plays without clocks.
    pub total_time: u64,
    /// Seconds granted to the mover after every ply.
    pub ply_increment: u64,
    /// Engine per-move budget in seconds.
    pub ply_time: Option<u64>,
    pub undo: UndoPolicy,
    pub show_analysis: bool,
    /// Strength cap forwarded as `UCI_Elo`.
    pub elo: Option<u32>,
    /// Engine-side protocol log, not part of the saved game.
    #[serde(skip)]
    pub debug_log: Option<String>,
}

impl Default for GameConfig {
    fn default() -> GameConfig {
        GameConfig {
            opponent: OpponentKind::Computer,
            my_side: Side::White,
            depth: DEPTH_DEFAULT,
            fen: None,
            total_time: 600,
            ply_increment: 10,
            ply_time: None,
            undo: UndoPolicy::Single,
            show_analysis: true,
            elo: None,
            debug_log: None,
        }
    }
}

impl GameConfig {
    /// Depth as sent to the engine: raised to the floor, unlimited past
    /// the cap.
    pub fn engine_depth(&self) -> Option<u32> {
        (self.depth <= DEPTH_MAX).then_some(self.depth.max(DEPTH_MIN))
    }

    pub fn clocks_enabled(&self) -> bool {
        self.total_time > 0
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            threads: Some(num_cpus::get() as u32),
            depth: self.engine_depth(),
            move_time: self.ply_time.map(|secs| secs * 1000),
            elo: self.elo,
            debug_log: self.debug_log.clone(),
        }
    }
}
