use thiserror::Error;

use super::{CastleSide, Piece, PieceKind, Side, Square, BOARD_FILES, BOARD_RANKS};

/// Default start layout. Back rank is rook, knight, bishop, princess, king,
/// queen, prince, bishop, knight, rook; the trailing fields grant both
/// castling directions and both princess promotions.
pub const START_FEN: &str =
    "rnbskqtbnr/pppppppppp/55/55/55/55/55/55/PPPPPPPPPP/RNBSKQTBNR w KQkq Ss - 0 1";

#[derive(Debug, Error)]
pub enum FenError {
    #[error("expected 7 fen fields, got {0}")]
    FieldCount(usize),
    #[error("bad placement: {0}")]
    Placement(String),
    #[error("bad side to move: {0}")]
    SideToMove(String),
    #[error("bad castling field: {0}")]
    Castling(String),
    #[error("bad princess field: {0}")]
    Princess(String),
    #[error("bad en passant field: {0}")]
    EnPassant(String),
    #[error("bad move counter: {0}")]
    Counter(String),
}

/// Per-side, per-direction castling availability, the `KQkq` field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CastlingRights {
    pub white_king: bool,
    pub white_queen: bool,
    pub black_king: bool,
    pub black_queen: bool,
}

impl CastlingRights {
    pub fn none() -> CastlingRights {
        CastlingRights {
            white_king: false,
            white_queen: false,
            black_king: false,
            black_queen: false,
        }
    }

    pub fn allowed(&self, side: Side, castle: CastleSide) -> bool {
        match (side, castle) {
            (Side::White, CastleSide::King) => self.white_king,
            (Side::White, CastleSide::Queen) => self.white_queen,
            (Side::Black, CastleSide::King) => self.black_king,
            (Side::Black, CastleSide::Queen) => self.black_queen,
        }
    }

    pub fn revoke(&mut self, side: Side, castle: CastleSide) {
        match (side, castle) {
            (Side::White, CastleSide::King) => self.white_king = false,
            (Side::White, CastleSide::Queen) => self.white_queen = false,
            (Side::Black, CastleSide::King) => self.black_king = false,
            (Side::Black, CastleSide::Queen) => self.black_queen = false,
        }
    }

    pub fn revoke_both(&mut self, side: Side) {
        self.revoke(side, CastleSide::King);
        self.revoke(side, CastleSide::Queen);
    }

    fn to_field(self) -> String {
        let mut out = String::new();
        for side in [Side::White, Side::Black] {
            for castle in CastleSide::BOTH {
                if self.allowed(side, castle) {
                    out.push(castle.fen_char(side));
                }
            }
        }
        if out.is_empty() {
            out.push('-');
        }
        out
    }
}

/// A remembered pawn jump: the origin and landing square. The capture
/// squares are the strictly-intermediate squares, the captured pawn sits
/// on `to`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EnPassant {
    pub from: Square,
    pub to: Square,
}

/// Full game position, one extended-FEN line worth of state.
#[derive(Clone)]
pub struct Position {
    squares: [Option<Piece>; 100],
    pub turn: Side,
    pub castling: CastlingRights,
    pub white_princess: bool,
    pub black_princess: bool,
    pub en_passant: Option<EnPassant>,
    pub halfmove: u32,
    pub fullmove: u32,
}

impl Position {
    pub fn start() -> Position {
        Position::from_fen(START_FEN).expect("start fen parses")
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()]
    }

    pub fn set_piece(&mut self, sq: Square, piece: Option<Piece>) {
        self.squares[sq.index()] = piece;
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    /// First square holding the given piece, scanning a1..j10.
    pub fn locate(&self, side: Side, kind: PieceKind) -> Option<Square> {
        self.pieces().find(|(_, p)| p.side == side && p.kind == kind).map(|(sq, _)| sq)
    }

    pub fn princess_available(&self, side: Side) -> bool {
        match side {
            Side::White => self.white_princess,
            Side::Black => self.black_princess,
        }
    }

    pub fn set_princess_available(&mut self, side: Side, available: bool) {
        match side {
            Side::White => self.white_princess = available,
            Side::Black => self.black_princess = available,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 7 {
            return Err(FenError::FieldCount(fields.len()));
        }

        let squares = parse_placement(fields[0])?;

        let turn = match fields[1] {
            s if s.len() == 1 => Side::from_fen_char(s.chars().next().unwrap_or(' '))
                .ok_or_else(|| FenError::SideToMove(s.to_string()))?,
            s => return Err(FenError::SideToMove(s.to_string())),
        };

        let castling = parse_castling(fields[2])?;
        let (white_princess, black_princess) = parse_princess(fields[3])?;
        let en_passant = parse_en_passant(fields[4])?;

        let halfmove =
            fields[5].parse::<u32>().map_err(|_| FenError::Counter(fields[5].to_string()))?;
        let fullmove =
            fields[6].parse::<u32>().map_err(|_| FenError::Counter(fields[6].to_string()))?;

        Ok(Position {
            squares,
            turn,
            castling,
            white_princess,
            black_princess,
            en_passant,
            halfmove,
            fullmove,
        })
    }

    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {} {} {} {} {}",
            self.placement_field(),
            self.turn.fen_char(),
            self.castling.to_field(),
            self.princess_field(),
            self.en_passant_field(),
            self.halfmove,
            self.fullmove,
        )
    }

    /// Same position with only the side to move replaced; used to ask the
    /// engine for the other side's legal destinations.
    pub fn to_fen_with_turn(&self, turn: Side) -> String {
        let mut flipped = self.clone();
        flipped.turn = turn;
        flipped.to_fen()
    }

    fn placement_field(&self) -> String {
        let mut out = String::new();
        for rank in (0..BOARD_RANKS).rev() {
            if rank != BOARD_RANKS - 1 {
                out.push('/');
            }
            let mut empty = 0u8;
            for file in 0..BOARD_FILES {
                match self.piece_at(Square::new(file, rank)) {
                    Some(piece) => {
                        push_empty_run(&mut out, empty);
                        empty = 0;
                        out.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            push_empty_run(&mut out, empty);
        }
        out
    }

    fn princess_field(&self) -> String {
        let mut out = String::new();
        if self.white_princess {
            out.push('S');
        }
        if self.black_princess {
            out.push('s');
        }
        if out.is_empty() {
            out.push('-');
        }
        out
    }

    fn en_passant_field(&self) -> String {
        match self.en_passant {
            Some(ep) => format!("{}{}", ep.from, ep.to),
            None => "-".to_string(),
        }
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Position").field("fen", &self.to_fen()).finish()
    }
}

/// The engine's placement parser reads digit by digit, so a fully empty
/// rank must be written `55`, never `10`.
fn push_empty_run(out: &mut String, run: u8) {
    match run {
        0 => {}
        10 => out.push_str("55"),
        n => out.push((b'0' + n) as char),
    }
}

fn parse_placement(field: &str) -> Result<[Option<Piece>; 100], FenError> {
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != BOARD_RANKS as usize {
        return Err(FenError::Placement(format!("expected 10 ranks, got {}", ranks.len())));
    }

    let mut squares = [None; 100];
    for (i, chunk) in ranks.iter().enumerate() {
        let rank = BOARD_RANKS - 1 - i as u8;
        let mut file = 0u8;
        for c in chunk.chars() {
            match c {
                '1'..='9' => file += c as u8 - b'0',
                _ => {
                    let piece = Piece::from_fen_char(c)
                        .ok_or_else(|| FenError::Placement(format!("unknown piece {c:?}")))?;
                    if file >= BOARD_FILES {
                        return Err(FenError::Placement(format!("rank overflow in {chunk:?}")));
                    }
                    squares[Square::new(file, rank).index()] = Some(piece);
                    file += 1;
                }
            }
        }
        if file != BOARD_FILES {
            return Err(FenError::Placement(format!("rank {chunk:?} covers {file} files")));
        }
    }
    Ok(squares)
}

fn parse_castling(field: &str) -> Result<CastlingRights, FenError> {
    let mut rights = CastlingRights::none();
    if field == "-" {
        return Ok(rights);
    }
    for c in field.chars() {
        match c {
            'K' => rights.white_king = true,
            'Q' => rights.white_queen = true,
            'k' => rights.black_king = true,
            'q' => rights.black_queen = true,
            _ => return Err(FenError::Castling(field.to_string())),
        }
    }
    Ok(rights)
}

fn parse_princess(field: &str) -> Result<(bool, bool), FenError> {
    let (mut white, mut black) = (false, false);
    if field == "-" {
        return Ok((white, black));
    }
    for c in field.chars() {
        match c {
            'S' => white = true,
            's' => black = true,
            _ => return Err(FenError::Princess(field.to_string())),
        }
    }
    Ok((white, black))
}

fn parse_en_passant(field: &str) -> Result<Option<EnPassant>, FenError> {
    if field == "-" {
        return Ok(None);
    }
    // Two concatenated squares, e.g. `e2e5`; the second square starts at
    // the second file letter.
    let split = field
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .ok_or_else(|| FenError::EnPassant(field.to_string()))?;
    let from: Square =
        field[..split].parse().map_err(|_| FenError::EnPassant(field.to_string()))?;
    let to: Square =
        field[split..].parse().map_err(|_| FenError::EnPassant(field.to_string()))?;
    Ok(Some(EnPassant { from, to }))
}
