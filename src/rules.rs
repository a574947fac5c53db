//! Pure rule helpers: en passant bookkeeping, castling geometry and
//! legality, and the centipawn-to-chances transform.
//!
//! Everything here is side-effect free; [`crate::game`] decides when to
//! apply the results.

use crate::board::fen::{EnPassant, Position};
use crate::board::{CastleSide, Piece, PieceKind, Side, Square};

/// Records a pawn jump of two or more ranks along one file. Anything else
/// clears the en-passant state.
pub fn en_passant_record(kind: PieceKind, from: Square, to: Square) -> Option<EnPassant> {
    if kind != PieceKind::Pawn || from.file() != to.file() {
        return None;
    }
    let jump = (from.rank() as i8 - to.rank() as i8).abs();
    (jump >= 2).then_some(EnPassant { from, to })
}

/// Capture squares for a remembered jump: every square strictly between
/// origin and landing, listed walking away from the origin. The jumping
/// pawn itself stands on `to`.
pub fn en_passant_targets(ep: &EnPassant) -> Vec<Square> {
    let file = ep.from.file();
    let (from, to) = (ep.from.rank() as i8, ep.to.rank() as i8);
    let step = if to > from { 1 } else { -1 };
    let mut squares = Vec::new();
    let mut rank = from + step;
    while rank != to {
        squares.push(Square::new(file, rank as u8));
        rank += step;
    }
    squares
}

/// The king starts on the e-file for both sides.
pub const KING_HOME_FILE: u8 = 4;

/// Board geometry of one castling direction. The king-side rook lives on
/// the a-file and the queen-side rook on the j-file; `king_path` covers
/// every square the king stands on or crosses, endpoints included.
#[derive(Clone, Debug)]
pub struct CastleGeometry {
    pub king_home: Square,
    pub rook_home: Square,
    pub king_to: Square,
    pub rook_to: Square,
    pub king_path: Vec<Square>,
}

pub fn castle_geometry(side: Side, castle: CastleSide) -> CastleGeometry {
    let rank = match side {
        Side::White => 0,
        Side::Black => 9,
    };
    let (rook_file, king_to, rook_to, path): (u8, u8, u8, &[u8]) = match castle {
        CastleSide::King => (0, 2, 3, &[4, 3, 2]),
        CastleSide::Queen => (9, 7, 6, &[4, 5, 6, 7]),
    };
    CastleGeometry {
        king_home: Square::new(KING_HOME_FILE, rank),
        rook_home: Square::new(rook_file, rank),
        king_to: Square::new(king_to, rank),
        rook_to: Square::new(rook_to, rank),
        king_path: path.iter().map(|f| Square::new(*f, rank)).collect(),
    }
}

/// Both castling pieces still standing on their home squares.
pub fn castle_pieces_at_home(pos: &Position, side: Side, castle: CastleSide) -> bool {
    let geo = castle_geometry(side, castle);
    pos.piece_at(geo.king_home) == Some(Piece { side, kind: PieceKind::King })
        && pos.piece_at(geo.rook_home) == Some(Piece { side, kind: PieceKind::Rook })
}

/// Every square strictly between king and rook is empty. The castle slides
/// both pieces through that span, so nothing may stand in it.
pub fn castle_path_is_clear(pos: &Position, side: Side, castle: CastleSide) -> bool {
    let geo = castle_geometry(side, castle);
    let rank = geo.king_home.rank();
    let lo = geo.king_home.file().min(geo.rook_home.file());
    let hi = geo.king_home.file().max(geo.rook_home.file());
    (lo + 1..hi).all(|file| pos.piece_at(Square::new(file, rank)).is_none())
}

/// No square of the king's path may appear among the opponent's current
/// destinations.
pub fn castle_path_is_safe<I>(side: Side, castle: CastleSide, opponent_targets: I) -> bool
where
    I: IntoIterator<Item = Square>,
{
    let geo = castle_geometry(side, castle);
    !opponent_targets.into_iter().any(|sq| geo.king_path.contains(&sq))
}

/// Centipawns to expected score in [-1, 1], the logistic curve used for
/// draw-offer arbitration.
pub fn winning_chances(cp: i32) -> f64 {
    2.0 / (1.0 + (-0.004 * cp as f64).exp()) - 1.0
}
