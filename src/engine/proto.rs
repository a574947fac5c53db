//! Wire protocol for the search worker: command builders and the line
//! classifier. The worker speaks a UCI-like protocol extended with
//! `valid_moves`, `checkers` and `fen` queries; replies are one line each.

use std::fmt;

use crate::board::{PieceKind, Square};

/// A move as written on the wire: `<from><to>[promo]`, ranks `1`..`10`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RawMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl RawMove {
    pub fn new(from: Square, to: Square) -> RawMove {
        RawMove { from, to, promotion: None }
    }
}

impl fmt::Display for RawMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p.letter())?;
        }
        Ok(())
    }
}

/// Engine-side royal promotion announced on a best-move line: `K` for a
/// prince crowned king, `Q` for a princess raised to queen.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RoyalMarker {
    King,
    Queen,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BestMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub royal: Option<RoyalMarker>,
}

/// Search evaluation from the engine's point of view.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

/// One classified line of worker output.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Reply {
    Ready,
    Checkers(Vec<Square>),
    Fen(String),
    ValidMoves(Vec<RawMove>),
    Score(Score),
    BestMove(BestMove),
    /// Anything we do not recognize, kept for diagnostics.
    Raw(String),
}

/// Classifies one line of worker output. The checks run in the same order
/// the replies are most distinctive: readiness, checkers, fen echo, move
/// list, score, best move, raw fallthrough.
pub fn classify(line: &str) -> Reply {
    let line = line.trim();
    if line.contains("readyok") {
        return Reply::Ready;
    }
    if let Some(rest) = strip_label(line, "checkers:") {
        let squares = rest.split_whitespace().filter_map(|t| t.parse().ok()).collect();
        return Reply::Checkers(squares);
    }
    if let Some(fen) = parse_fen_echo(line) {
        return Reply::Fen(fen.to_string());
    }
    if let Some(rest) = strip_label(line, "valid_moves:") {
        let moves = rest.split_whitespace().filter_map(parse_move).collect();
        return Reply::ValidMoves(moves);
    }
    if let Some(score) = parse_score(line) {
        return Reply::Score(score);
    }
    if let Some(best) = parse_best_move(line) {
        return Reply::BestMove(best);
    }
    Reply::Raw(line.to_string())
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(label)?;
    Some(rest.trim_start())
}

/// The `fen` query echoes the position as a bare extended-FEN line; the
/// worker's debug dump labels the same thing `Fen:`. Accept both, shape
/// checked so ordinary chatter falls through.
fn parse_fen_echo(line: &str) -> Option<&str> {
    let fen = match line.strip_prefix("Fen:") {
        Some(rest) => rest.trim(),
        None => line,
    };
    let fields: Vec<&str> = fen.split_whitespace().collect();
    let shaped = fields.len() == 7
        && fields[0].matches('/').count() == 9
        && matches!(fields[1], "w" | "b");
    shaped.then_some(fen)
}

fn parse_score(line: &str) -> Option<Score> {
    if !line.contains("info") {
        return None;
    }
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "score" {
            let kind = tokens.next()?;
            let value = tokens.next()?.parse().ok()?;
            return match kind {
                "cp" => Some(Score::Cp(value)),
                "mate" => Some(Score::Mate(value)),
                _ => None,
            };
        }
    }
    None
}

fn parse_best_move(line: &str) -> Option<BestMove> {
    let rest = line.strip_prefix("bestmove")?.trim_start();
    let token = rest.split_whitespace().next()?;
    let (royal, token) = if let Some(t) = token.strip_prefix('K') {
        (Some(RoyalMarker::King), t)
    } else if let Some(t) = token.strip_prefix('Q') {
        (Some(RoyalMarker::Queen), t)
    } else {
        (None, token)
    };
    let mv = parse_move(token)?;
    Some(BestMove { from: mv.from, to: mv.to, promotion: mv.promotion, royal })
}

/// Parses `<from><to>[promo]`, tolerating the two-digit tenth rank.
pub fn parse_move(s: &str) -> Option<RawMove> {
    let (from, rest) = split_square(s)?;
    let (to, rest) = split_square(rest)?;
    let promotion = match rest.len() {
        0 => None,
        1 => Some(PieceKind::from_letter(rest.chars().next()?)?),
        _ => return None,
    };
    Some(RawMove { from, to, promotion })
}

fn split_square(s: &str) -> Option<(Square, &str)> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, 'a'..='j')) => {}
        _ => return None,
    }
    let mut end = 1;
    for (i, c) in chars {
        if c.is_ascii_digit() || c == ':' {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    let square = s[..end].parse().ok()?;
    Some((square, &s[end..]))
}

pub fn cmd_set_option(name: &str, value: &str) -> String {
    format!("setoption name {name} value {value}")
}

pub fn cmd_position(fen: &str, moves: &[RawMove]) -> String {
    if moves.is_empty() {
        return format!("position fen {fen}");
    }
    let list: Vec<String> = moves.iter().map(|m| m.to_string()).collect();
    format!("position fen {fen} moves {}", list.join(" "))
}

pub fn cmd_go(depth: Option<u32>, move_time: Option<u64>, clock: Option<(u64, u64)>) -> String {
    let mut parts = vec!["go".to_string()];
    if let Some(d) = depth {
        parts.push(format!("depth {d}"));
    }
    if let Some(ms) = move_time {
        parts.push(format!("movetime {ms}"));
    }
    if let Some((wtime, btime)) = clock {
        parts.push(format!("wtime {wtime} btime {btime}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn classifies_ready() {
        assert_eq!(classify("readyok"), Reply::Ready);
        assert_eq!(classify("  readyok  "), Reply::Ready);
    }

    #[test]
    fn classifies_checkers() {
        assert_eq!(classify("checkers: e4 d10"), Reply::Checkers(vec![sq("e4"), sq("d10")]));
        assert_eq!(classify("checkers:"), Reply::Checkers(vec![]));
    }

    #[test]
    fn classifies_fen_echo_with_and_without_label() {
        let fen = "rnbskqtbnr/pppppppppp/55/55/55/55/55/55/PPPPPPPPPP/RNBSKQTBNR w KQkq Ss - 0 1";
        assert_eq!(classify(fen), Reply::Fen(fen.to_string()));
        assert_eq!(classify(&format!("Fen: {fen}")), Reply::Fen(fen.to_string()));
        assert!(matches!(classify("position fen something"), Reply::Raw(_)));
    }

    #[test]
    fn classifies_valid_moves_with_promotions() {
        let reply = classify("valid_moves: e2e3 e2e4 a9a10q b9b10s");
        let Reply::ValidMoves(moves) = reply else {
            panic!("expected a move list");
        };
        assert_eq!(moves.len(), 4);
        assert_eq!(moves[0], RawMove::new(sq("e2"), sq("e3")));
        assert_eq!(moves[2].promotion, Some(PieceKind::Queen));
        assert_eq!(moves[3].promotion, Some(PieceKind::Princess));
        assert_eq!(moves[3].to, sq("b10"));
    }

    #[test]
    fn score_needs_an_info_line() {
        let line = "info depth 9 seldepth 12 score cp -31 nodes 77788";
        assert_eq!(classify(line), Reply::Score(Score::Cp(-31)));
        assert_eq!(classify("info depth 20 score mate 3"), Reply::Score(Score::Mate(3)));
        assert!(matches!(classify("score cp 100"), Reply::Raw(_)));
    }

    #[test]
    fn best_move_with_royal_marker() {
        assert_eq!(
            classify("bestmove e2e4"),
            Reply::BestMove(BestMove {
                from: sq("e2"),
                to: sq("e4"),
                promotion: None,
                royal: None,
            })
        );
        assert_eq!(
            classify("bestmove Qg9f10"),
            Reply::BestMove(BestMove {
                from: sq("g9"),
                to: sq("f10"),
                promotion: None,
                royal: Some(RoyalMarker::Queen),
            })
        );
        assert_eq!(
            classify("bestmove Ka10a9 ponder e2e4"),
            Reply::BestMove(BestMove {
                from: sq("a10"),
                to: sq("a9"),
                promotion: None,
                royal: Some(RoyalMarker::King),
            })
        );
        assert!(matches!(classify("bestmove (none)"), Reply::Raw(_)));
    }

    #[test]
    fn command_builders() {
        assert_eq!(cmd_set_option("Threads", "4"), "setoption name Threads value 4");
        assert_eq!(cmd_go(Some(12), None, None), "go depth 12");
        assert_eq!(
            cmd_go(None, Some(3000), Some((60_000, 59_000))),
            "go movetime 3000 wtime 60000 btime 59000"
        );
        let mv = RawMove { from: sq("e9"), to: sq("e10"), promotion: Some(PieceKind::Queen) };
        assert_eq!(cmd_position("FEN", &[mv]), "position fen FEN moves e9e10q");
        assert_eq!(cmd_position("FEN", &[]), "position fen FEN");
    }
}
