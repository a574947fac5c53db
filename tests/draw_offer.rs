//! Draw-offer arbitration: the offer gate, the forced re-evaluation and
//! the engine-point-of-view threshold.

mod common;

use common::{fast_timeouts, CannedPrompt, Script};
use royal100::board::Square;
use royal100::game::config::{GameConfig, OpponentKind};
use royal100::game::{DrawReason, GameState};
use royal100::GameController;

const FEN0: &str = "9k/8p1/55/55/55/55/55/55/1P8/K9 w - - - 0 1";
const FEN1: &str = "9k/8p1/55/55/55/55/55/1P8/55/K9 b - - - 0 1";
const FEN2: &str = "9k/55/8p1/55/55/55/55/1P8/55/K9 w - - - 0 2";
const FEN3: &str = "9k/55/8p1/55/55/55/1P8/55/55/K9 b - - - 0 2";
const FEN4: &str = "9k/55/55/8p1/55/55/1P8/55/55/K9 w - - - 0 3";
const FEN5: &str = "9k/55/55/8p1/55/1P8/55/55/55/K9 b - - - 0 3";
const FEN6: &str = "9k/55/55/55/8p1/1P8/55/55/55/K9 w - - - 0 4";

fn sq(s: &str) -> Square {
    s.parse().unwrap()
}

fn stock_walk_tables(script: &Script) {
    script.moves(FEN0, "b2b3 b2b4 a1a2 a1b1");
    script.moves(FEN1, "i9i8 i9i7 j10j9");
    script.moves(FEN2, "b3b4 a1a2 a1b1");
    script.moves(FEN3, "i8i7 j10j9");
    script.moves(FEN4, "b4b5 a1a2 a1b1");
    script.moves(FEN5, "i7i6 j10j9");
    script.moves(FEN6, "b5b6 a1a2 a1b1");
}

fn engine_game(script: &Script) -> GameController {
    let mut game = GameController::with_timeouts(
        script.spawner(),
        Box::new(CannedPrompt::default()),
        fast_timeouts(),
    );
    let config = GameConfig {
        opponent: OpponentKind::Computer,
        fen: Some(FEN0.to_string()),
        total_time: 0,
        ..GameConfig::default()
    };
    game.new_game(config).expect("scripted game");
    game
}

#[test]
fn offer_needs_history_and_a_score() {
    let script = Script::new();
    stock_walk_tables(&script);
    script.best("i9i8");
    script.best("i8i7");
    script.best("i7i6");
    let mut game = engine_game(&script);

    game.make_move(sq("b2"), sq("b3")).expect("ply 1");
    assert!(!game.can_offer_draw(), "two plies are too early");
    assert!(!game.offer_draw());

    game.make_move(sq("b3"), sq("b4")).expect("ply 3");
    game.make_move(sq("b4"), sq("b5")).expect("ply 5");
    assert_eq!(game.history().len(), 6);
    assert!(!game.can_offer_draw(), "no evaluation has been seen yet");

    // A hint brings the first score with it.
    script.reply_go(&["info depth 9 score cp -250 pv b5b6", "bestmove b5b6"]);
    let suggestion = game.hint();
    assert_eq!(suggestion.from, sq("b5"));
    assert!(game.can_offer_draw());
    assert!(game.is_playing(), "offers so far changed nothing");
}

#[test]
fn engine_declines_while_ahead_and_agrees_when_level() {
    let script = Script::new();
    stock_walk_tables(&script);
    script.best("i9i8");
    script.best("i8i7");
    script.reply_go(&["info depth 11 score cp -30 pv i7i6", "bestmove i7i6"]);
    let mut game = engine_game(&script);

    game.make_move(sq("b2"), sq("b3")).expect("ply 1");
    game.make_move(sq("b3"), sq("b4")).expect("ply 3");
    game.make_move(sq("b4"), sq("b5")).expect("ply 5");
    assert!(game.can_offer_draw());

    // Three pawns up from the mover's side means the engine is winning;
    // it plays on.
    script.reply_go(&["info depth 12 score cp -300", "bestmove b5b6"]);
    assert!(!game.offer_draw());
    assert!(game.is_playing());

    // A forced mate is never given away.
    script.reply_go(&["info depth 14 score mate 4", "bestmove b5b6"]);
    assert!(!game.offer_draw());
    assert!(game.is_playing());

    // Near equality is not worth grinding out.
    script.reply_go(&["info depth 12 score cp 40", "bestmove b5b6"]);
    assert!(game.offer_draw());
    assert_eq!(game.state(), GameState::Draw { reason: DrawReason::Agreement });
    assert_eq!(game.state().to_string(), "draw by agreement");
}

#[test]
fn early_offer_is_ignored_even_with_a_score() {
    let script = Script::new();
    stock_walk_tables(&script);
    script.reply_go(&["info depth 8 score cp 12 pv i9i8", "bestmove i9i8"]);
    let mut game = engine_game(&script);

    game.make_move(sq("b2"), sq("b3")).expect("ply 1");
    assert_eq!(game.history().len(), 2);
    assert!(!game.can_offer_draw(), "the score alone does not open the gate");
    assert!(!game.offer_draw());
    assert!(game.is_playing());
}
