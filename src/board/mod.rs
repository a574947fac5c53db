use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod fen;
pub mod setup;

pub use fen::{CastlingRights, EnPassant, FenError, Position, START_FEN};

/// Board width and height; files run a..j, ranks 1..10.
pub const BOARD_FILES: u8 = 10;
pub const BOARD_RANKS: u8 = 10;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn fen_char(self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }

    pub fn from_fen_char(c: char) -> Option<Side> {
        match c {
            'w' => Some(Side::White),
            'b' => Some(Side::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
    Prince,
    Princess,
}

impl PieceKind {
    /// Lowercase FEN letter; the prince is `t`, the princess `s`.
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
            PieceKind::Prince => 't',
            PieceKind::Princess => 's',
        }
    }

    pub fn from_letter(c: char) -> Option<PieceKind> {
        match c {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            't' => Some(PieceKind::Prince),
            's' => Some(PieceKind::Princess),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Piece {
    pub side: Side,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(side: Side, kind: PieceKind) -> Piece {
        Piece { side, kind }
    }

    pub fn fen_char(self) -> char {
        match self.side {
            Side::White => self.kind.letter().to_ascii_uppercase(),
            Side::Black => self.kind.letter(),
        }
    }

    pub fn from_fen_char(c: char) -> Option<Piece> {
        let side = if c.is_ascii_uppercase() { Side::White } else { Side::Black };
        PieceKind::from_letter(c.to_ascii_lowercase()).map(|kind| Piece { side, kind })
    }
}

/// One of the two castling directions. `King` is toward the a-file rook
/// (king lands on the c-file), `Queen` toward the j-file rook (king lands
/// on the h-file), matching the K/Q letters of the FEN castling field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CastleSide {
    King,
    Queen,
}

impl CastleSide {
    pub const BOTH: [CastleSide; 2] = [CastleSide::King, CastleSide::Queen];

    pub fn fen_char(self, side: Side) -> char {
        let c = match self {
            CastleSide::King => 'k',
            CastleSide::Queen => 'q',
        };
        match side {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }
}

/// A board square. On the wire squares read `a1`..`j10`; the board-key
/// form writes rank ten as the single glyph `:` so keys stay two
/// characters, and the parser accepts both.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Square {
        debug_assert!(file < BOARD_FILES && rank < BOARD_RANKS);
        Square { file, rank }
    }

    /// File index, 0 = a .. 9 = j.
    pub fn file(self) -> u8 {
        self.file
    }

    /// Rank index, 0 = rank 1 .. 9 = rank 10.
    pub fn rank(self) -> u8 {
        self.rank
    }

    pub fn index(self) -> usize {
        self.rank as usize * BOARD_FILES as usize + self.file as usize
    }

    pub fn all() -> impl Iterator<Item = Square> {
        (0..BOARD_RANKS).flat_map(|rank| (0..BOARD_FILES).map(move |file| Square::new(file, rank)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("bad square {0:?}")]
pub struct SquareParseError(pub String);

impl FromStr for Square {
    type Err = SquareParseError;

    fn from_str(s: &str) -> Result<Square, SquareParseError> {
        let mut chars = s.chars();
        let file = match chars.next() {
            Some(c @ 'a'..='j') => c as u8 - b'a',
            _ => return Err(SquareParseError(s.to_string())),
        };
        let rank = match chars.as_str() {
            ":" => 10,
            digits => digits.parse::<u8>().map_err(|_| SquareParseError(s.to_string()))?,
        };
        if !(1..=BOARD_RANKS).contains(&rank) {
            return Err(SquareParseError(s.to_string()));
        }
        Ok(Square::new(file, rank - 1))
    }
}

impl From<Square> for String {
    fn from(sq: Square) -> String {
        sq.to_string()
    }
}

impl TryFrom<String> for Square {
    type Error = SquareParseError;

    fn try_from(s: String) -> Result<Square, SquareParseError> {
        s.parse()
    }
}
