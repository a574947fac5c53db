//! Engine session lifecycle against a scripted worker: handshake,
//! reply routing, and recovery from hangs and crashes.

mod common;

use common::{fast_timeouts, BrokenSpawner, Script};
use royal100::engine::proto::Score;
use royal100::engine::{Session, SessionError, SessionOptions};

fn options() -> SessionOptions {
    SessionOptions::default()
}

fn started(script: &Script) -> Session {
    Session::start_with(script.spawner(), options(), fast_timeouts()).expect("scripted start")
}

#[test]
fn failed_spawn_surfaces_immediately() {
    let err = Session::start_with(Box::new(BrokenSpawner), options(), fast_timeouts())
        .err()
        .expect("a missing binary must fail the start");
    assert!(matches!(err, SessionError::Spawn(_)), "{err}");
}

#[test]
fn eager_start_performs_the_handshake() {
    let script = Script::new();
    let _session = Session::start(script.spawner(), options()).expect("start");
    assert_eq!(script.spawns(), 1);
    assert!(script.saw("ucinewgame"));
    assert!(script.saw("isready"));
}

#[test]
fn construction_is_lazy_until_new_game() {
    let script = Script::new();
    let mut session = Session::new(script.spawner(), options(), fast_timeouts());
    assert_eq!(script.spawns(), 0, "construction must not spawn");
    session.new_game(options()).expect("first start");
    assert_eq!(script.spawns(), 1);
    session.new_game(options()).expect("restart");
    assert_eq!(script.spawns(), 2, "every new game restarts the worker");
}

#[test]
fn handshake_configures_then_asks_ready() {
    let script = Script::new();
    let opts = SessionOptions { threads: Some(2), elo: Some(1500), ..options() };
    let _session = Session::start_with(script.spawner(), opts, fast_timeouts()).expect("start");
    assert!(script.saw("setoption name Threads value 2"), "{:?}", script.log());
    assert!(script.saw("setoption name UCI_LimitStrength value true"));
    assert!(script.saw("setoption name UCI_Elo value 1500"));
    let log = script.log();
    let newgame = log.iter().position(|l| l == "ucinewgame").expect("ucinewgame sent");
    let ready = log.iter().position(|l| l == "isready").expect("isready sent");
    assert!(newgame < ready, "ucinewgame must precede isready: {log:?}");
}

#[test]
fn best_move_query_rides_out_info_noise() {
    let script = Script::new();
    script.reply_go(&[
        "info depth 3 seldepth 5 nodes 1200 score cp 42 pv e2e3",
        "info string still thinking",
        "bestmove e2e3 ponder e9e8",
    ]);
    let mut session = started(&script);
    let best = session.query_best_move("key", &[], None);
    assert_eq!(best.from.to_string(), "e2");
    assert_eq!(best.to.to_string(), "e3");
    assert_eq!(best.promotion, None);
    assert_eq!(session.last_score(), Some(Score::Cp(42)), "score line must be captured");
}

#[test]
fn unrelated_replies_do_not_resolve_the_best_move() {
    let script = Script::new();
    script.reply_go(&["checkers: b4", "valid_moves: a2a3 a2a4", "bestmove a2a4"]);
    let mut session = started(&script);
    let best = session.query_best_move("key", &[], None);
    assert_eq!(best.to.to_string(), "a4");
}

#[test]
fn go_carries_depth_and_clock() {
    let script = Script::new();
    let opts = SessionOptions { depth: Some(6), ..options() };
    let mut session = Session::start_with(script.spawner(), opts, fast_timeouts()).expect("start");
    script.best("d2d3");
    session.query_best_move("key", &[], Some((180_000, 175_500)));
    assert!(script.saw("go depth 6 wtime 180000 btime 175500"), "{:?}", script.log());
}

#[test]
fn set_position_is_fire_and_forget() {
    let script = Script::new();
    script.moves("key", "a2a3 a2a4");
    let mut session = started(&script);
    session.set_position("key", &[]);
    assert!(script.saw("position fen key"), "{:?}", script.log());
    // The unacknowledged send must not disturb later reply correlation.
    let moves = session.query_legal_moves("key");
    assert_eq!(moves.len(), 2);
    assert_eq!(moves[1].to.to_string(), "a4");
}

#[test]
fn hung_search_respawns_the_worker_once() {
    let script = Script::new();
    script.hang_goes(1);
    script.best("b2b3");
    let mut session = started(&script);
    let best = session.query_best_move("key", &[], None);
    assert_eq!(best.from.to_string(), "b2");
    assert_eq!(script.spawns(), 2, "exactly one respawn after the hang");
}

#[test]
fn dead_worker_is_replaced() {
    let script = Script::new();
    script.die_goes(1);
    script.best("c2c3");
    let mut session = started(&script);
    let best = session.query_best_move("key", &[], None);
    assert_eq!(best.from.to_string(), "c2");
    assert_eq!(script.spawns(), 2);
}

#[test]
fn new_game_applies_fresh_options() {
    let script = Script::new();
    let mut session = started(&script);
    assert!(!script.saw("setoption"), "defaults send no options");
    session
        .new_game(SessionOptions { threads: Some(1), depth: Some(4), ..options() })
        .expect("restart");
    assert_eq!(script.spawns(), 2);
    assert!(script.saw("setoption name Threads value 1"));
    script.best("e2e3");
    session.query_best_move("key", &[], None);
    assert!(script.saw("go depth 4"), "{:?}", script.log());
}

#[test]
fn stop_reaches_the_worker_through_a_handle() {
    let script = Script::new();
    let mut session = started(&script);
    session.stop_search();
    session.stop_handle().stop();
    let stops = script.log().iter().filter(|l| *l == "stop").count();
    assert_eq!(stops, 2);
}

#[test]
fn quit_says_goodbye_first() {
    let script = Script::new();
    let mut session = started(&script);
    session.quit();
    assert!(script.saw("quit"));
}
