//! The move list: one record per applied ply.

use serde::{Deserialize, Serialize};

use crate::board::{Piece, PieceKind, Side, Square};

/// Everything a ply leaves behind: what moved, what fell, and the
/// position snapshots undo and replay restore from.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub side: Side,
    pub from: Square,
    pub to: Square,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub promotion: Option<PieceKind>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub captured: Option<Piece>,
    /// The piece standing on `to` afterwards, promotion applied.
    pub piece: Piece,
    pub check: bool,
    pub mate: bool,
    /// Position before the ply.
    pub fen_before: String,
    /// Position after the ply; undo restores this snapshot.
    pub fen_after: String,
}

impl MoveRecord {
    /// The ply in engine notation, promotion letter included.
    pub fn raw(&self) -> crate::engine::proto::RawMove {
        crate::engine::proto::RawMove {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

/// Append-only while playing; undo truncates from the tail.
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveHistory {
    moves: Vec<MoveRecord>,
}

impl MoveHistory {
    pub fn new() -> MoveHistory {
        MoveHistory::default()
    }

    pub fn push(&mut self, record: MoveRecord) {
        self.moves.push(record);
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn last(&self) -> Option<&MoveRecord> {
        self.moves.last()
    }

    pub fn get(&self, index: usize) -> Option<&MoveRecord> {
        self.moves.get(index)
    }

    /// Keeps the first `len` records and drops the rest.
    pub fn truncate(&mut self, len: usize) {
        self.moves.truncate(len);
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MoveRecord> {
        self.moves.iter()
    }
}
