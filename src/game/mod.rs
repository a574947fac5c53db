//! Game orchestration: a [`GameController`] owns the authoritative
//! position, the move history and the clocks, and drives the engine
//! session for move generation, check detection and play.

pub mod clock;
pub mod config;
pub mod history;
pub mod save;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{CastleSide, FenError, Piece, PieceKind, Position, Side, Square, START_FEN};
use crate::engine::proto::{BestMove, RawMove, RoyalMarker, Score};
use crate::engine::transport::Spawner;
use crate::engine::{Session, SessionError, SessionOptions, Timeouts};
use crate::rules;

use clock::ClockPair;
use config::{GameConfig, OpponentKind, UndoPolicy};
use history::{MoveHistory, MoveRecord};
use save::{ClockSnapshot, ClocksSnapshot, SaveError, SavedGame, SAVE_VERSION};

/// Fifty-move rule scaled to the ten-rank board: a hundred reversible
/// half-moves end the game in a draw.
pub const DRAW_HALF_MOVES: u32 = 100;
/// Draw offers are ignored before this many plies.
pub const DRAW_MIN_MOVES: usize = 5;

/// The engine accepts a draw offer below this many winning-chance points.
const DRAW_ACCEPT_THRESHOLD: f64 = 20.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum WinReason {
    Mate,
    Timeout,
    Resignation,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DrawReason {
    Agreement,
    Stalemate,
    HalfMoveLimit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum GameState {
    Paused,
    Playing,
    Draw { reason: DrawReason },
    Win { side: Side, reason: WinReason },
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Paused => write!(f, "paused"),
            GameState::Playing => write!(f, "playing"),
            GameState::Draw { reason } => {
                let why = match reason {
                    DrawReason::Agreement => "agreement",
                    DrawReason::Stalemate => "stalemate",
                    DrawReason::HalfMoveLimit => "the half-move limit",
                };
                write!(f, "draw by {why}")
            }
            GameState::Win { side, reason } => {
                let why = match reason {
                    WinReason::Mate => "checkmate",
                    WinReason::Timeout => "time forfeit",
                    WinReason::Resignation => "resignation",
                };
                write!(f, "{side} wins by {why}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("invalid position: {0}")]
    BadFen(#[from] FenError),
    #[error("move {from}{to} is not legal here")]
    IllegalMove { from: Square, to: Square },
    #[error("a valid promotion choice is required")]
    Promotion,
    #[error("undoing move {0} is not allowed")]
    UndoRejected(usize),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Legal destinations per origin square, plus the promotion choices for
/// origin/destination pairs that reach the back rank.
#[derive(Clone, Default, Debug)]
pub struct ValidMoves {
    destinations: BTreeMap<Square, Vec<Square>>,
    promotions: HashMap<(Square, Square), Vec<PieceKind>>,
}

impl ValidMoves {
    fn from_raw(moves: &[RawMove]) -> ValidMoves {
        let mut valid = ValidMoves::default();
        for mv in moves {
            valid.add(mv.from, mv.to);
            if let Some(kind) = mv.promotion {
                let choices = valid.promotions.entry((mv.from, mv.to)).or_default();
                if !choices.contains(&kind) {
                    choices.push(kind);
                }
            }
        }
        valid
    }

    fn add(&mut self, from: Square, to: Square) {
        let dests = self.destinations.entry(from).or_default();
        if !dests.contains(&to) {
            dests.push(to);
        }
    }

    pub fn contains(&self, from: Square, to: Square) -> bool {
        self.destinations.get(&from).is_some_and(|d| d.contains(&to))
    }

    pub fn destinations(&self, from: Square) -> &[Square] {
        self.destinations.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn promotions(&self, from: Square, to: Square) -> &[PieceKind] {
        self.promotions.get(&(from, to)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn origins(&self) -> impl Iterator<Item = Square> + '_ {
        self.destinations.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.values().all(|d| d.is_empty())
    }

    fn all_targets(&self) -> impl Iterator<Item = Square> + '_ {
        self.destinations.values().flatten().copied()
    }
}

/// Human input collected mid-move: the pawn promotion pick and the
/// princess-for-queen confirmation.
pub trait PlayerPrompt {
    /// Picks one of `choices` for a pawn reaching the back rank. `None`
    /// abandons the move.
    fn choose_promotion(&mut self, side: Side, choices: &[PieceKind]) -> Option<PieceKind>;

    /// Asks whether `side`'s princess should take the captured queen's
    /// place.
    fn confirm_princess_promotion(&mut self, side: Side) -> bool;
}

pub struct GameController {
    engine: Session,
    prompt: Box<dyn PlayerPrompt>,
    config: GameConfig,
    state: GameState,
    position: Position,
    history: MoveHistory,
    valid_moves: ValidMoves,
    clocks: ClockPair,
    /// Side that used its single undo and has not moved since.
    undid_move: Option<Side>,
    /// Side currently in check, refreshed after every applied ply.
    check: Option<Side>,
}

impl GameController {
    pub fn new(spawner: Box<dyn Spawner>, prompt: Box<dyn PlayerPrompt>) -> GameController {
        GameController::with_timeouts(spawner, prompt, Timeouts::default())
    }

    pub fn with_timeouts(
        spawner: Box<dyn Spawner>,
        prompt: Box<dyn PlayerPrompt>,
        timeouts: Timeouts,
    ) -> GameController {
        GameController {
            engine: Session::new(spawner, SessionOptions::default(), timeouts),
            prompt,
            config: GameConfig::default(),
            state: GameState::Paused,
            position: Position::start(),
            history: MoveHistory::new(),
            valid_moves: ValidMoves::default(),
            clocks: ClockPair::default(),
            undid_move: None,
            check: None,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, GameState::Playing)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn fen(&self) -> String {
        self.position.to_fen()
    }

    pub fn turn(&self) -> Side {
        self.position.turn
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    pub fn valid_moves(&self) -> &ValidMoves {
        &self.valid_moves
    }

    pub fn clocks(&self) -> &ClockPair {
        &self.clocks
    }

    /// Side currently in check, if any.
    pub fn check(&self) -> Option<Side> {
        self.check
    }

    /// Latest engine evaluation, hidden when analysis display is off.
    pub fn score(&self) -> Option<Score> {
        if self.config.show_analysis {
            self.engine.last_score()
        } else {
            None
        }
    }

    /// True when the side to move is controlled by a person.
    pub fn is_my_turn(&self) -> bool {
        self.is_side_human(self.position.turn)
    }

    pub fn shutdown(&mut self) {
        self.engine.quit();
    }

    /// Starts a fresh game. Validates the configured position, restarts
    /// the engine with the new options and, when the engine owns the
    /// first move, plays it.
    pub fn new_game(&mut self, config: GameConfig) -> Result<(), GameError> {
        assert!(!self.is_playing(), "cannot start a game while one is playing");

        let start_fen = match &config.fen {
            Some(fen) => {
                Position::from_fen(fen)?;
                fen.clone()
            }
            None => START_FEN.to_string(),
        };

        self.engine.new_game(config.session_options())?;
        let echoed = self.engine.query_fen(&start_fen, &[]);
        self.position = Position::from_fen(&echoed)?;

        self.config = config;
        self.history.clear();
        self.undid_move = None;
        self.check = None;

        self.clocks.used = self.config.clocks_enabled();
        let budget = if self.clocks.used { self.config.total_time * 1000 } else { 0 };
        self.clocks.white.set(budget, budget);
        self.clocks.black.set(budget, budget);

        info!(
            "new game: {} as {}, depth {:?}",
            match self.config.opponent {
                OpponentKind::Computer => "vs computer",
                OpponentKind::Human => "two players",
            },
            self.config.my_side,
            self.config.engine_depth(),
        );

        self.set_state(GameState::Playing);
        self.refresh_valid_moves();
        self.make_engine_move_if_due();
        Ok(())
    }

    /// Applies the human move `from` -> `to`, then the engine's reply when
    /// one is due.
    ///
    /// # Panics
    ///
    /// Panics when no game is in progress.
    pub fn make_move(&mut self, from: Square, to: Square) -> Result<(), GameError> {
        assert!(self.is_playing(), "make_move outside an active game");
        if self.check_time().is_some() {
            return Ok(());
        }
        if !self.valid_moves.contains(from, to) {
            return Err(GameError::IllegalMove { from, to });
        }
        let promotion = self.promotion_choice(from, to)?;
        self.apply_move(from, to, promotion, None);
        Ok(())
    }

    /// Whether history entry `target` can be taken back right now.
    pub fn can_undo(&self, target: usize) -> bool {
        let Some(record) = self.history.get(target) else {
            return false;
        };
        if !self.is_playing() {
            return false;
        }
        if self.config.opponent == OpponentKind::Computer
            && self.position.turn != self.config.my_side
        {
            return false;
        }
        if self.config.undo == UndoPolicy::None {
            return false;
        }
        // The first move of each side stays on the board.
        if target < 2 {
            return false;
        }
        if record.side != self.position.turn {
            return false;
        }
        if self.config.undo == UndoPolicy::Single {
            if self.undid_move == Some(self.position.turn) {
                return false;
            }
            if target < self.history.len() - 2 {
                return false;
            }
        }
        true
    }

    pub fn can_undo_last(&self) -> bool {
        self.history.len() >= 2 && self.can_undo(self.history.len() - 2)
    }

    /// Rewinds the game so the move at `target` is to be made again:
    /// truncates history past it and restores the snapshot before it.
    /// Both clocks stop; no time is refunded.
    pub fn undo_move(&mut self, target: usize) -> Result<(), GameError> {
        self.check_time();
        if !self.can_undo(target) {
            return Err(GameError::UndoRejected(target));
        }
        let undone_side = match self.history.get(target) {
            Some(record) => record.side,
            None => return Err(GameError::UndoRejected(target)),
        };
        let fen = match self.history.get(target - 1) {
            Some(record) => record.fen_after.clone(),
            None => panic!("history entry {} missing", target - 1),
        };
        self.history.truncate(target);
        self.position = Position::from_fen(&fen)?;
        self.clocks.stop_both();
        self.undid_move = Some(undone_side);
        self.refresh_valid_moves();
        self.check = self.detect_check();
        debug!("rewound to move {target}");
        Ok(())
    }

    pub fn undo_last(&mut self) -> Result<(), GameError> {
        match self.history.len().checked_sub(2) {
            Some(target) => self.undo_move(target),
            None => Err(GameError::UndoRejected(0)),
        }
    }

    /// Concedes the game. Against the engine the human side loses; in a
    /// two-player game the side to move does.
    pub fn resign(&mut self) {
        if !self.is_playing() {
            return;
        }
        let loser = match self.config.opponent {
            OpponentKind::Human => self.position.turn,
            OpponentKind::Computer => self.config.my_side,
        };
        self.set_state(GameState::Win { side: loser.opposite(), reason: WinReason::Resignation });
    }

    pub fn can_offer_draw(&self) -> bool {
        self.config.opponent == OpponentKind::Computer
            && self.is_playing()
            && self.history.len() >= DRAW_MIN_MOVES
            && self.engine.last_score().is_some()
    }

    /// Offers the engine a draw. The offer forces a fresh evaluation; the
    /// engine declines on a forced mate or when its winning chances are
    /// still worth playing for. Returns whether the draw was agreed.
    ///
    /// # Panics
    ///
    /// Panics when the opponent is not the engine.
    pub fn offer_draw(&mut self) -> bool {
        assert!(
            self.config.opponent == OpponentKind::Computer,
            "draw offers need an engine opponent"
        );
        if self.check_time().is_some() || !self.can_offer_draw() {
            return false;
        }

        let fen = self.position.to_fen();
        let clock = self.clocks.used.then(|| self.clocks.remaining_pair());
        let _ = self.engine.query_best_move(&fen, &[], clock);

        let Some(score) = self.engine.last_score() else {
            return false;
        };
        let engine_side = self.config.my_side.opposite();
        let accepted = match score {
            Score::Mate(_) => false,
            Score::Cp(cp) => {
                // The evaluation is from the side to move; flip it to the
                // engine's point of view.
                let engine_cp = if self.position.turn == engine_side { cp } else { -cp };
                rules::winning_chances(engine_cp) * 100.0 < DRAW_ACCEPT_THRESHOLD
            }
        };
        if accepted {
            self.set_state(GameState::Draw { reason: DrawReason::Agreement });
        } else {
            debug!("draw offer declined ({score:?})");
        }
        accepted
    }

    /// Asks the engine for a suggestion in the current position without
    /// touching the game.
    pub fn hint(&mut self) -> BestMove {
        let fen = self.position.to_fen();
        let clock = self.clocks.used.then(|| self.clocks.remaining_pair());
        self.engine.query_best_move(&fen, &[], clock)
    }

    /// Polls the clocks; on a flag fall the game ends with a win on time
    /// for the opponent, returned here.
    pub fn check_time(&mut self) -> Option<Side> {
        if !self.is_playing() {
            return None;
        }
        let loser = self.clocks.expired()?;
        let winner = loser.opposite();
        info!("{loser} lost on time");
        self.set_state(GameState::Win { side: winner, reason: WinReason::Timeout });
        Some(winner)
    }

    /// Snapshot of the whole game for persistence.
    pub fn serialize(&self) -> SavedGame {
        SavedGame {
            version: SAVE_VERSION,
            state: self.state,
            undo: self.config.undo,
            clocks: ClocksSnapshot {
                white: ClockSnapshot {
                    remaining: self.clocks.white.remaining_ms(),
                    total: self.clocks.white.total_ms(),
                },
                black: ClockSnapshot {
                    remaining: self.clocks.black.remaining_ms(),
                    total: self.clocks.black.total_ms(),
                },
            },
            config: self.config.clone(),
            moves: self.history.clone(),
        }
    }

    /// Resumes a saved game exactly where it stood. Clocks come back
    /// stopped; the first move resumes them. A saved position that fails
    /// validation leaves the current game untouched.
    ///
    /// # Panics
    ///
    /// Panics when a game is in progress.
    pub fn restore_game(&mut self, saved: SavedGame) -> Result<(), GameError> {
        assert!(!self.is_playing(), "cannot restore over a game in progress");
        if saved.version != SAVE_VERSION {
            return Err(SaveError::Version(saved.version).into());
        }

        let mut config = saved.config;
        config.undo = saved.undo;

        let fen = saved
            .moves
            .last()
            .map(|m| m.fen_after.clone())
            .or_else(|| config.fen.clone())
            .unwrap_or_else(|| START_FEN.to_string());
        Position::from_fen(&fen)?;

        self.engine.new_game(config.session_options())?;
        let echoed = self.engine.query_fen(&fen, &[]);
        self.position = Position::from_fen(&echoed)?;

        self.config = config;
        self.history = saved.moves;
        self.undid_move = None;
        self.check = None;

        self.clocks.used = self.config.clocks_enabled();
        self.clocks.white.set(saved.clocks.white.remaining, saved.clocks.white.total);
        self.clocks.black.set(saved.clocks.black.remaining, saved.clocks.black.total);

        self.set_state(saved.state);
        if self.is_playing() {
            self.refresh_valid_moves();
            self.make_engine_move_if_due();
        }
        Ok(())
    }

    fn is_side_human(&self, side: Side) -> bool {
        self.config.opponent == OpponentKind::Human || side == self.config.my_side
    }

    fn engine_side(&self) -> Option<Side> {
        match self.config.opponent {
            OpponentKind::Computer => Some(self.config.my_side.opposite()),
            OpponentKind::Human => None,
        }
    }

    fn promotion_choice(&mut self, from: Square, to: Square) -> Result<Option<PieceKind>, GameError> {
        let choices = self.valid_moves.promotions(from, to);
        if choices.is_empty() {
            return Ok(None);
        }
        let choices = choices.to_vec();
        match self.prompt.choose_promotion(self.position.turn, &choices) {
            Some(kind) if choices.contains(&kind) => Ok(Some(kind)),
            _ => Err(GameError::Promotion),
        }
    }

    /// Applies one ply to the authoritative position: captures (en
    /// passant included), castling, royal promotions, bookkeeping, the
    /// clock handoff, end-of-game detection and the engine's reply.
    fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
        royal: Option<RoyalMarker>,
    ) {
        let mover = self.position.turn;
        let fen_before = self.position.to_fen();

        if let Some(marker) = royal {
            self.apply_royal_marker(mover, marker);
        }
        if self.undid_move == Some(mover) {
            self.undid_move = None;
        }

        let moved = match self.position.piece_at(from) {
            Some(piece) => piece,
            None => panic!("no piece on {from}"),
        };

        let mut captured = self.position.piece_at(to);
        let mut capture_square = to;
        if captured.is_none() {
            if let Some(ep) = self.position.en_passant {
                if moved.kind == PieceKind::Pawn
                    && from.file() != to.file()
                    && rules::en_passant_targets(&ep).contains(&to)
                {
                    captured = self.position.piece_at(ep.to);
                    capture_square = ep.to;
                }
            }
        }

        self.position.set_piece(from, None);
        if capture_square != to {
            self.position.set_piece(capture_square, None);
        }
        let mut placed = moved;
        if let Some(kind) = promotion {
            placed.kind = kind;
        }
        self.position.set_piece(to, Some(placed));

        if moved.kind == PieceKind::King {
            for castle in CastleSide::BOTH {
                let geo = rules::castle_geometry(mover, castle);
                if from == geo.king_home
                    && to == geo.king_to
                    && self.position.piece_at(geo.rook_home)
                        == Some(Piece::new(mover, PieceKind::Rook))
                {
                    self.position.set_piece(geo.rook_home, None);
                    self.position.set_piece(geo.rook_to, Some(Piece::new(mover, PieceKind::Rook)));
                }
            }
        }

        match moved.kind {
            PieceKind::King => self.position.castling.revoke_both(mover),
            PieceKind::Rook => {
                for castle in CastleSide::BOTH {
                    if from == rules::castle_geometry(mover, castle).rook_home {
                        self.position.castling.revoke(mover, castle);
                    }
                }
            }
            _ => {}
        }

        if let Some(victim) = captured {
            // A capture on a rook's home square spends the victim's right too.
            for castle in CastleSide::BOTH {
                if capture_square == rules::castle_geometry(victim.side, castle).rook_home {
                    self.position.castling.revoke(victim.side, castle);
                }
            }
            self.handle_royal_capture(victim);
        }

        self.position.en_passant = rules::en_passant_record(moved.kind, from, to);
        if captured.is_some() || moved.kind == PieceKind::Pawn {
            self.position.halfmove = 0;
        } else {
            self.position.halfmove += 1;
        }
        if mover == Side::Black {
            self.position.fullmove += 1;
        }
        self.position.turn = mover.opposite();

        if self.clocks.used {
            let mover_clock = self.clocks.side(mover);
            mover_clock.stop();
            mover_clock.add(self.config.ply_increment * 1000);
            self.clocks.side(mover.opposite()).resume();
        }

        self.refresh_valid_moves();
        self.check = self.detect_check();
        self.detect_end_game(self.check);

        let mate = matches!(self.state, GameState::Win { reason: WinReason::Mate, .. });
        let record = MoveRecord {
            side: mover,
            from,
            to,
            promotion,
            captured,
            piece: placed,
            check: self.check.is_some(),
            mate,
            fen_before,
            fen_after: self.position.to_fen(),
        };
        debug!("{mover}: {from}{to}{}", match promotion {
            Some(kind) => kind.letter().to_string(),
            None => String::new(),
        });
        self.history.push(record);

        if self.is_playing() {
            self.make_engine_move_if_due();
        }
    }

    /// Royal replacements after a capture. The princess flag is spent the
    /// moment the queen falls, accepted or not; a fallen king crowns the
    /// prince on either side.
    fn handle_royal_capture(&mut self, victim: Piece) {
        match victim.kind {
            PieceKind::Princess => {
                self.position.set_princess_available(victim.side, false);
            }
            PieceKind::Queen => {
                if !self.position.princess_available(victim.side) {
                    return;
                }
                self.position.set_princess_available(victim.side, false);
                if !self.is_side_human(victim.side) {
                    // The engine announces its own replacement with the
                    // royal marker on its next move.
                    return;
                }
                if let Some(princess) = self.position.locate(victim.side, PieceKind::Princess) {
                    if self.prompt.confirm_princess_promotion(victim.side) {
                        self.position
                            .set_piece(princess, Some(Piece::new(victim.side, PieceKind::Queen)));
                        info!("{} princess becomes queen", victim.side);
                    }
                }
            }
            PieceKind::King => {
                if let Some(prince) = self.position.locate(victim.side, PieceKind::Prince) {
                    self.position.set_piece(prince, Some(Piece::new(victim.side, PieceKind::King)));
                    info!("{} prince crowned", victim.side);
                }
            }
            _ => {}
        }
    }

    /// Applies the engine's coronation announcement. Idempotent: when the
    /// replacement already happened locally there is nothing left to do.
    fn apply_royal_marker(&mut self, side: Side, marker: RoyalMarker) {
        match marker {
            RoyalMarker::King => {
                if self.position.locate(side, PieceKind::King).is_none() {
                    if let Some(prince) = self.position.locate(side, PieceKind::Prince) {
                        self.position.set_piece(prince, Some(Piece::new(side, PieceKind::King)));
                        info!("{side} prince crowned");
                    }
                }
            }
            RoyalMarker::Queen => {
                if let Some(princess) = self.position.locate(side, PieceKind::Princess) {
                    self.position.set_piece(princess, Some(Piece::new(side, PieceKind::Queen)));
                    info!("{side} princess becomes queen");
                }
            }
        }
    }

    fn make_engine_move_if_due(&mut self) {
        if !self.is_playing() {
            return;
        }
        if self.engine_side() != Some(self.position.turn) {
            return;
        }
        // Replaying the last move on top of its prior position keeps the
        // engine's board in lockstep with ours.
        let (fen, moves) = match self.history.last() {
            Some(last) => (last.fen_before.clone(), vec![last.raw()]),
            None => (self.position.to_fen(), Vec::new()),
        };
        let clock = self.clocks.used.then(|| self.clocks.remaining_pair());
        debug!("engine thinking");
        let best = self.engine.query_best_move(&fen, &moves, clock);
        if self.check_time().is_some() {
            return;
        }
        self.apply_move(best.from, best.to, best.promotion, best.royal);
    }

    /// Fetches the mover's legal moves and augments them with castling,
    /// which the engine does not report.
    fn refresh_valid_moves(&mut self) {
        let fen = self.position.to_fen();
        let raw = self.engine.query_legal_moves(&fen);
        let mut moves = ValidMoves::from_raw(&raw);
        self.augment_castling(&mut moves);
        self.valid_moves = moves;
    }

    fn augment_castling(&mut self, moves: &mut ValidMoves) {
        let side = self.position.turn;
        let candidates: Vec<CastleSide> = CastleSide::BOTH
            .into_iter()
            .filter(|&castle| {
                self.position.castling.allowed(side, castle)
                    && rules::castle_pieces_at_home(&self.position, side, castle)
                    && rules::castle_path_is_clear(&self.position, side, castle)
            })
            .collect();
        if candidates.is_empty() {
            return;
        }
        // Path safety is judged against what the opponent could play if it
        // were their turn.
        let flipped = self.position.to_fen_with_turn(side.opposite());
        let opponent = ValidMoves::from_raw(&self.engine.query_legal_moves(&flipped));
        for castle in candidates {
            if rules::castle_path_is_safe(side, castle, opponent.all_targets()) {
                let geo = rules::castle_geometry(side, castle);
                moves.add(geo.king_home, geo.king_to);
            }
        }
    }

    fn detect_check(&mut self) -> Option<Side> {
        let fen = self.position.to_fen();
        for sq in self.engine.query_checkers(&fen) {
            if let Some(piece) = self.position.piece_at(sq) {
                return Some(piece.side.opposite());
            }
        }
        None
    }

    fn has_moves(&mut self, side: Side) -> bool {
        let fen = self.position.to_fen_with_turn(side);
        !self.engine.query_legal_moves(&fen).is_empty()
    }

    /// End-of-game detection after a ply: the half-move limit first, then
    /// mate or stalemate when the side to move has nothing to play.
    fn detect_end_game(&mut self, check: Option<Side>) {
        assert!(self.is_playing(), "end-of-game detection outside a game");
        if self.position.halfmove >= DRAW_HALF_MOVES {
            self.set_state(GameState::Draw { reason: DrawReason::HalfMoveLimit });
            return;
        }
        if !self.valid_moves.is_empty() {
            return;
        }
        let mover = self.position.turn;
        let opponent = mover.opposite();
        if self.has_moves(opponent) && check.is_some() {
            self.set_state(GameState::Win { side: opponent, reason: WinReason::Mate });
        } else {
            self.set_state(GameState::Draw { reason: DrawReason::Stalemate });
        }
    }

    fn set_state(&mut self, state: GameState) {
        self.state = state;
        if !matches!(state, GameState::Playing) {
            self.clocks.stop_both();
            self.valid_moves = ValidMoves::default();
        }
        if !matches!(state, GameState::Playing | GameState::Paused) {
            info!("{state}");
        }
    }
}
