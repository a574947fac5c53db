//! Shared scaffolding: a scripted in-process stand-in for the search
//! worker, plus a canned player prompt.

// Each test binary uses its own subset of this module.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use royal100::board::{PieceKind, Side};
use royal100::engine::transport::{Spawner, Transport};
use royal100::engine::Timeouts;
use royal100::game::PlayerPrompt;

/// Timeouts small enough that restart paths finish within a test run.
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        ready: Duration::from_millis(500),
        reply: Duration::from_millis(500),
        best_move: Duration::from_millis(500),
        backoff: Duration::from_millis(5),
    }
}

enum Response {
    None,
    Lines(Vec<String>),
    Die,
}

/// Behavior tables for the scripted worker. Every spawned worker shares
/// them, so reply queues and counters survive restarts.
#[derive(Default)]
struct Sim {
    position: String,
    valid: HashMap<String, String>,
    checkers: HashMap<String, String>,
    go_replies: VecDeque<Vec<String>>,
    hang_goes: usize,
    die_goes: usize,
    log: Vec<String>,
    spawns: usize,
}

impl Sim {
    fn respond(&mut self, line: &str) -> Response {
        self.log.push(line.to_string());
        if let Some(rest) = line.strip_prefix("position fen ") {
            self.position = rest.to_string();
            return Response::None;
        }
        match line {
            "isready" => Response::Lines(vec!["readyok".to_string()]),
            "valid_moves" => {
                let key = self.position_fen();
                let moves = match self.valid.get(&key) {
                    Some(moves) => moves.clone(),
                    None => panic!("no scripted move list for {key:?}"),
                };
                Response::Lines(vec![format!("valid_moves: {moves}")])
            }
            "checkers" => {
                let key = self.position_fen();
                let squares = self.checkers.get(&key).cloned().unwrap_or_default();
                Response::Lines(vec![format!("checkers: {squares}")])
            }
            "fen" => Response::Lines(vec![self.position_fen()]),
            _ if line.starts_with("go") => {
                if self.die_goes > 0 {
                    self.die_goes -= 1;
                    return Response::Die;
                }
                if self.hang_goes > 0 {
                    self.hang_goes -= 1;
                    return Response::None;
                }
                match self.go_replies.pop_front() {
                    Some(lines) => Response::Lines(lines),
                    None => panic!("no scripted reply for {line:?} at {:?}", self.position),
                }
            }
            _ => Response::None,
        }
    }

    fn position_fen(&self) -> String {
        match self.position.split_once(" moves ") {
            Some((fen, _)) => fen.to_string(),
            None => self.position.clone(),
        }
    }
}

/// Handle for building the worker's script and inspecting what it saw.
#[derive(Clone, Default)]
pub struct Script(Arc<Mutex<Sim>>);

impl Script {
    pub fn new() -> Script {
        Script::default()
    }

    /// Legal moves the worker reports for `fen`, space separated.
    pub fn moves(&self, fen: &str, list: &str) {
        self.0.lock().unwrap().valid.insert(fen.to_string(), list.to_string());
    }

    /// Checker squares the worker reports for `fen`.
    pub fn checkers(&self, fen: &str, list: &str) {
        self.0.lock().unwrap().checkers.insert(fen.to_string(), list.to_string());
    }

    /// Raw reply lines for the next `go`, in order.
    pub fn reply_go(&self, lines: &[&str]) {
        let lines = lines.iter().map(|l| l.to_string()).collect();
        self.0.lock().unwrap().go_replies.push_back(lines);
    }

    /// Shorthand: the next `go` answers with just this best move.
    pub fn best(&self, mv: &str) {
        let line = format!("bestmove {mv}");
        self.reply_go(&[line.as_str()]);
    }

    /// Swallow the next `n` `go` commands without answering.
    pub fn hang_goes(&self, n: usize) {
        self.0.lock().unwrap().hang_goes = n;
    }

    /// Drop the worker's pipe on the next `n` `go` commands.
    pub fn die_goes(&self, n: usize) {
        self.0.lock().unwrap().die_goes = n;
    }

    pub fn spawns(&self) -> usize {
        self.0.lock().unwrap().spawns
    }

    pub fn log(&self) -> Vec<String> {
        self.0.lock().unwrap().log.clone()
    }

    pub fn saw(&self, needle: &str) -> bool {
        self.0.lock().unwrap().log.iter().any(|l| l.contains(needle))
    }

    pub fn spawner(&self) -> Box<dyn Spawner> {
        Box::new(ScriptedSpawner { sim: Arc::clone(&self.0) })
    }
}

struct ScriptedSpawner {
    sim: Arc<Mutex<Sim>>,
}

impl Spawner for ScriptedSpawner {
    fn spawn(&mut self) -> io::Result<(Box<dyn Transport>, Receiver<String>)> {
        let (tx, rx) = unbounded();
        self.sim.lock().unwrap().spawns += 1;
        Ok((Box::new(ScriptedTransport { sim: Arc::clone(&self.sim), tx: Some(tx) }), rx))
    }
}

struct ScriptedTransport {
    sim: Arc<Mutex<Sim>>,
    tx: Option<Sender<String>>,
}

impl Transport for ScriptedTransport {
    fn send(&mut self, line: &str) -> io::Result<()> {
        let response = self.sim.lock().unwrap().respond(line);
        match response {
            Response::None => {}
            Response::Lines(lines) => {
                if let Some(tx) = &self.tx {
                    for line in lines {
                        let _ = tx.send(line);
                    }
                }
            }
            Response::Die => self.tx = None,
        }
        Ok(())
    }

    fn kill(&mut self) {
        self.tx = None;
    }
}

/// Spawner whose every attempt fails, for fail-fast coverage.
pub struct BrokenSpawner;

impl Spawner for BrokenSpawner {
    fn spawn(&mut self) -> io::Result<(Box<dyn Transport>, Receiver<String>)> {
        Err(io::Error::new(io::ErrorKind::NotFound, "engine binary missing"))
    }
}

/// Prompt with canned answers and a call count.
pub struct CannedPrompt {
    pub promotion: Option<PieceKind>,
    pub accept_princess: bool,
    pub princess_asked: Arc<Mutex<usize>>,
}

impl Default for CannedPrompt {
    fn default() -> CannedPrompt {
        CannedPrompt {
            promotion: Some(PieceKind::Queen),
            accept_princess: true,
            princess_asked: Arc::new(Mutex::new(0)),
        }
    }
}

impl PlayerPrompt for CannedPrompt {
    fn choose_promotion(&mut self, _side: Side, choices: &[PieceKind]) -> Option<PieceKind> {
        match self.promotion {
            Some(kind) if choices.contains(&kind) => Some(kind),
            Some(_) => choices.first().copied(),
            None => None,
        }
    }

    fn confirm_princess_promotion(&mut self, _side: Side) -> bool {
        *self.princess_asked.lock().unwrap() += 1;
        self.accept_princess
    }
}
