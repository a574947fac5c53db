//! The engine session: one search-worker process behind a synchronous
//! request/response facade. The reply protocol is correlated by a FIFO of
//! waiters; a hung or dead worker is killed and respawned transparently,
//! so queries either succeed eventually or block forever.

pub mod proto;
pub mod transport;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::board::Square;
use proto::{classify, BestMove, RawMove, Reply, Score};
use transport::{Spawner, Transport};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not spawn engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine reply timed out")]
    Timeout,
    #[error("engine exited")]
    Exited,
}

/// Knobs applied during the start handshake and on every restart.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    /// Search threads, clamped to 1..=2x the logical CPU count.
    pub threads: Option<u32>,
    /// Fixed search depth; absent means the engine decides.
    pub depth: Option<u32>,
    /// Per-move time budget in milliseconds.
    pub move_time: Option<u64>,
    /// Strength limit; sets `UCI_LimitStrength` together with `UCI_Elo`.
    pub elo: Option<u32>,
    pub debug_log: Option<String>,
}

/// Waiting budgets. Tests shrink these to keep restart paths fast.
#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    pub ready: Duration,
    pub reply: Duration,
    pub best_move: Duration,
    pub backoff: Duration,
}

impl Default for Timeouts {
    fn default() -> Timeouts {
        Timeouts {
            ready: Duration::from_millis(5000),
            reply: Duration::from_millis(5000),
            best_move: Duration::from_secs(60),
            backoff: Duration::from_millis(1000),
        }
    }
}

type Matcher = Box<dyn Fn(&Reply) -> bool + Send>;

struct Waiter {
    id: u64,
    matcher: Matcher,
    tx: Sender<Reply>,
}

type SharedTransport = Arc<Mutex<Option<Box<dyn Transport>>>>;

pub struct Session {
    spawner: Box<dyn Spawner>,
    transport: SharedTransport,
    waiters: Arc<Mutex<VecDeque<Waiter>>>,
    last_score: Arc<Mutex<Option<Score>>>,
    generation: Arc<AtomicU64>,
    options: SessionOptions,
    timeouts: Timeouts,
    next_waiter: u64,
    started: bool,
}

impl Session {
    /// Builds an idle session; nothing is spawned until
    /// [`ensure_started`](Session::ensure_started) or the first
    /// [`new_game`](Session::new_game).
    pub fn new(spawner: Box<dyn Spawner>, options: SessionOptions, timeouts: Timeouts) -> Session {
        Session {
            spawner,
            transport: Arc::new(Mutex::new(None)),
            waiters: Arc::new(Mutex::new(VecDeque::new())),
            last_score: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            options,
            timeouts,
            next_waiter: 0,
            started: false,
        }
    }

    /// Spawns the worker and completes the ready handshake. The very first
    /// spawn failure is reported so a bad engine path fails fast; once
    /// running, all later failures are retried forever.
    pub fn start(spawner: Box<dyn Spawner>, options: SessionOptions) -> Result<Session, SessionError> {
        Session::start_with(spawner, options, Timeouts::default())
    }

    pub fn start_with(
        spawner: Box<dyn Spawner>,
        options: SessionOptions,
        timeouts: Timeouts,
    ) -> Result<Session, SessionError> {
        let mut session = Session::new(spawner, options, timeouts);
        session.ensure_started()?;
        Ok(session)
    }

    /// First spawn plus handshake, once. Idempotent, and a failure leaves
    /// the session idle so the call can be retried.
    pub fn ensure_started(&mut self) -> Result<(), SessionError> {
        if self.started {
            return Ok(());
        }
        self.attach()?;
        if !self.handshake() {
            self.restart();
        }
        self.started = true;
        Ok(())
    }

    /// Applies fresh options and restarts the worker for a new game.
    pub fn new_game(&mut self, options: SessionOptions) -> Result<(), SessionError> {
        self.options = options;
        *lock(&self.last_score) = None;
        if self.started {
            self.restart();
            Ok(())
        } else {
            self.ensure_started()
        }
    }

    /// Sends a position without waiting for an acknowledgment; the next
    /// query's reply doubles as the ack. The queries set their own
    /// position, so this is only needed to prime the worker out of band.
    pub fn set_position(&mut self, fen: &str, moves: &[RawMove]) {
        self.send(&proto::cmd_position(fen, moves));
    }

    /// Searches from `fen` (plus `moves` played after it) and returns the
    /// best move. Never gives up: a timeout kills and respawns the worker,
    /// waits out a short backoff and retries.
    pub fn query_best_move(
        &mut self,
        fen: &str,
        moves: &[RawMove],
        clock: Option<(u64, u64)>,
    ) -> BestMove {
        loop {
            let waiter = self.enqueue(Box::new(|r| matches!(r, Reply::BestMove(_))));
            self.send(&proto::cmd_position(fen, moves));
            let go = proto::cmd_go(self.options.depth, self.options.move_time, clock);
            self.send(&go);
            match self.await_reply(waiter, self.timeouts.best_move) {
                Ok(Reply::BestMove(best)) => return best,
                Ok(_) => {}
                Err(e) => {
                    warn!("best-move query failed: {e}");
                    self.restart();
                    thread::sleep(self.timeouts.backoff);
                }
            }
        }
    }

    pub fn query_legal_moves(&mut self, fen: &str) -> Vec<RawMove> {
        loop {
            let waiter = self.enqueue(Box::new(|r| matches!(r, Reply::ValidMoves(_))));
            self.send(&proto::cmd_position(fen, &[]));
            self.send("valid_moves");
            match self.await_reply(waiter, self.timeouts.reply) {
                Ok(Reply::ValidMoves(moves)) => return moves,
                Ok(_) => {}
                Err(e) => {
                    warn!("valid-moves query failed: {e}");
                    self.restart();
                }
            }
        }
    }

    pub fn query_checkers(&mut self, fen: &str) -> Vec<Square> {
        loop {
            let waiter = self.enqueue(Box::new(|r| matches!(r, Reply::Checkers(_))));
            self.send(&proto::cmd_position(fen, &[]));
            self.send("checkers");
            match self.await_reply(waiter, self.timeouts.reply) {
                Ok(Reply::Checkers(squares)) => return squares,
                Ok(_) => {}
                Err(e) => {
                    warn!("checkers query failed: {e}");
                    self.restart();
                }
            }
        }
    }

    /// Round-trips a position through the worker, returning its normalized
    /// FEN echo. Used to validate caller-supplied positions.
    pub fn query_fen(&mut self, fen: &str, moves: &[RawMove]) -> String {
        loop {
            let waiter = self.enqueue(Box::new(|r| matches!(r, Reply::Fen(_))));
            self.send(&proto::cmd_position(fen, moves));
            self.send("fen");
            match self.await_reply(waiter, self.timeouts.reply) {
                Ok(Reply::Fen(echo)) => return echo,
                Ok(_) => {}
                Err(e) => {
                    warn!("fen query failed: {e}");
                    self.restart();
                }
            }
        }
    }

    /// Latest `score cp|mate` seen on the worker's info stream, from the
    /// engine's point of view.
    pub fn last_score(&self) -> Option<Score> {
        *lock(&self.last_score)
    }

    pub fn stop_search(&mut self) {
        self.send("stop");
    }

    /// Cheap cloneable handle for signalling `stop` from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { transport: Arc::clone(&self.transport) }
    }

    pub fn quit(&mut self) {
        self.send("quit");
        self.kill_worker();
    }

    fn attach(&mut self) -> Result<(), SessionError> {
        let (transport, lines) = self.spawner.spawn()?;
        *lock(&self.transport) = Some(transport);
        let waiters = Arc::clone(&self.waiters);
        let last_score = Arc::clone(&self.last_score);
        let generation = Arc::clone(&self.generation);
        let born = generation.load(Ordering::SeqCst);
        thread::spawn(move || dispatch_lines(lines, waiters, last_score, generation, born));
        Ok(())
    }

    fn handshake(&mut self) -> bool {
        let waiter = self.enqueue(Box::new(|r| matches!(r, Reply::Ready)));
        self.configure();
        self.send("ucinewgame");
        self.send("isready");
        match self.await_reply(waiter, self.timeouts.ready) {
            Ok(_) => {
                debug!("engine ready");
                true
            }
            Err(e) => {
                warn!("engine not ready: {e}");
                false
            }
        }
    }

    fn configure(&mut self) {
        let options = self.options.clone();
        if let Some(threads) = options.threads {
            let value = threads.clamp(1, num_cpus::get() as u32 * 2);
            self.send(&proto::cmd_set_option("Threads", &value.to_string()));
        }
        if let Some(elo) = options.elo {
            self.send(&proto::cmd_set_option("UCI_LimitStrength", "true"));
            self.send(&proto::cmd_set_option("UCI_Elo", &elo.to_string()));
        }
        if let Some(path) = options.debug_log {
            self.send(&proto::cmd_set_option("Debug Log File", &path));
        }
    }

    /// Kill, respawn, handshake; loops until a worker comes up ready.
    fn restart(&mut self) {
        loop {
            self.kill_worker();
            if let Err(e) = self.attach() {
                warn!("engine spawn failed: {e}");
                thread::sleep(self.timeouts.backoff);
                continue;
            }
            if self.handshake() {
                info!("engine restarted");
                return;
            }
        }
    }

    fn kill_worker(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut transport) = lock(&self.transport).take() {
            transport.kill();
        }
        // Waiters left by abandoned query attempts would otherwise soak up
        // the next worker's replies.
        lock(&self.waiters).clear();
    }

    fn send(&mut self, line: &str) {
        trace!("-> {line}");
        if let Some(transport) = lock(&self.transport).as_mut() {
            if let Err(e) = transport.send(line) {
                debug!("engine write failed: {e}");
            }
        }
    }

    /// Queues a waiter ahead of sending its command, so a reply can never
    /// slip past between the send and the wait.
    fn enqueue(&mut self, matcher: Matcher) -> (u64, Receiver<Reply>) {
        let (tx, rx) = bounded(1);
        let id = self.next_waiter;
        self.next_waiter += 1;
        lock(&self.waiters).push_back(Waiter { id, matcher, tx });
        (id, rx)
    }

    fn await_reply(
        &mut self,
        (id, rx): (u64, Receiver<Reply>),
        timeout: Duration,
    ) -> Result<Reply, SessionError> {
        match rx.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::Exited),
            Err(RecvTimeoutError::Timeout) => {
                let still_queued = {
                    let mut queue = lock(&self.waiters);
                    match queue.iter().position(|w| w.id == id) {
                        Some(i) => {
                            queue.remove(i);
                            true
                        }
                        None => false,
                    }
                };
                if still_queued {
                    Err(SessionError::Timeout)
                } else {
                    // Resolved in the same instant; the reply is already in
                    // the channel.
                    rx.try_recv().map_err(|_| SessionError::Exited)
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.kill_worker();
    }
}

#[derive(Clone)]
pub struct StopHandle {
    transport: SharedTransport,
}

impl StopHandle {
    /// Best-effort `stop`; the result of the interrupted search still
    /// arrives as a regular best-move reply.
    pub fn stop(&self) {
        if let Some(transport) = lock(&self.transport).as_mut() {
            if let Err(e) = transport.send("stop") {
                debug!("stop not delivered: {e}");
            }
        }
    }
}

/// Classifies worker output and resolves the first matching waiter; runs
/// on its own thread, one per spawned worker. A stale thread from before a
/// restart recognizes itself by generation and backs off.
fn dispatch_lines(
    lines: Receiver<String>,
    waiters: Arc<Mutex<VecDeque<Waiter>>>,
    last_score: Arc<Mutex<Option<Score>>>,
    generation: Arc<AtomicU64>,
    born: u64,
) {
    while let Ok(line) = lines.recv() {
        if generation.load(Ordering::SeqCst) != born {
            return;
        }
        let reply = classify(&line);
        match &reply {
            Reply::Raw(text) => {
                debug!("engine: {text}");
                continue;
            }
            Reply::Score(score) => {
                trace!("engine: {line}");
                *lock(&last_score) = Some(*score);
            }
            _ => trace!("engine: {line}"),
        }
        let mut queue = lock(&waiters);
        if let Some(i) = queue.iter().position(|w| (w.matcher)(&reply)) {
            if let Some(waiter) = queue.remove(i) {
                let _ = waiter.tx.send(reply);
            }
        }
    }
    // Worker exited on its own: reject everything still pending.
    if generation.load(Ordering::SeqCst) == born {
        lock(&waiters).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
