//! Countdown clocks. Exactly one side's clock runs at a time; the
//! controller hands off on every move. A running clock decrements on a
//! 250 ms ticker thread and stops itself when it reaches zero.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::board::Side;

const TICK_MS: u64 = 250;

#[derive(Default)]
struct ClockState {
    remaining_ms: u64,
    total_ms: u64,
    running: bool,
    // Bumped on every stop/resume so stale ticker threads retire.
    epoch: u64,
}

/// One side's countdown. Clones share the same state.
#[derive(Clone, Default)]
pub struct Clock {
    state: Arc<Mutex<ClockState>>,
}

impl Clock {
    pub fn new() -> Clock {
        Clock::default()
    }

    /// Resets remaining and total. A zero budget leaves the clock stopped.
    pub fn set(&self, remaining_ms: u64, total_ms: u64) {
        let mut state = self.lock();
        state.total_ms = total_ms;
        state.remaining_ms = remaining_ms;
        if remaining_ms == 0 {
            halt(&mut state);
        }
    }

    /// Per-ply increment: extends remaining and total alike, so the
    /// percentage display never overflows.
    pub fn add(&self, ms: u64) {
        let mut state = self.lock();
        state.remaining_ms += ms;
        state.total_ms += ms;
    }

    pub fn resume(&self) {
        let epoch = {
            let mut state = self.lock();
            if state.running || state.remaining_ms == 0 {
                return;
            }
            state.running = true;
            state.epoch += 1;
            state.epoch
        };
        let clock = self.clone();
        thread::spawn(move || clock.run_ticker(epoch));
    }

    pub fn stop(&self) {
        halt(&mut self.lock());
    }

    pub fn is_active(&self) -> bool {
        self.lock().running
    }

    pub fn remaining_ms(&self) -> u64 {
        self.lock().remaining_ms
    }

    /// Whole seconds left, floored.
    pub fn remaining_secs(&self) -> u64 {
        self.lock().remaining_ms / 1000
    }

    pub fn total_ms(&self) -> u64 {
        self.lock().total_ms
    }

    /// Remaining fraction of the budget in [0, 1]; 0 when no budget is set.
    pub fn remaining_pct(&self) -> f64 {
        let state = self.lock();
        if state.total_ms == 0 {
            0.0
        } else {
            state.remaining_ms as f64 / state.total_ms as f64
        }
    }

    /// `mm:ss`, switching to `h:mm:ss` past an hour.
    pub fn format_remaining(&self) -> String {
        format_ms(self.remaining_ms())
    }

    /// Deterministic decrement, floored at zero; the first landing on zero
    /// also stops the clock. The ticker thread and tests share this path.
    pub fn tick(&self, elapsed_ms: u64) {
        advance(&mut self.lock(), elapsed_ms);
    }

    fn run_ticker(self, epoch: u64) {
        loop {
            thread::sleep(Duration::from_millis(TICK_MS));
            let mut state = self.lock();
            if !state.running || state.epoch != epoch {
                return;
            }
            advance(&mut state, TICK_MS);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn halt(state: &mut ClockState) {
    state.running = false;
    state.epoch += 1;
}

fn advance(state: &mut ClockState, elapsed_ms: u64) {
    if state.remaining_ms == 0 {
        return;
    }
    state.remaining_ms = state.remaining_ms.saturating_sub(elapsed_ms);
    if state.remaining_ms == 0 {
        halt(state);
    }
}

pub fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let (hours, mins, secs) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{mins:02}:{secs:02}")
    }
}

/// Both sides' clocks plus the enabled flag. With `used` false the game
/// ignores time entirely.
#[derive(Clone, Default)]
pub struct ClockPair {
    pub used: bool,
    pub white: Clock,
    pub black: Clock,
}

impl ClockPair {
    pub fn side(&self, side: Side) -> &Clock {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    pub fn stop_both(&self) {
        self.white.stop();
        self.black.stop();
    }

    /// (white, black) remaining, for the engine's `wtime`/`btime`.
    pub fn remaining_pair(&self) -> (u64, u64) {
        (self.white.remaining_ms(), self.black.remaining_ms())
    }

    /// The side whose flag has fallen, if any.
    pub fn expired(&self) -> Option<Side> {
        if !self.used {
            return None;
        }
        if self.white.remaining_ms() == 0 {
            Some(Side::White)
        } else if self.black.remaining_ms() == 0 {
            Some(Side::Black)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_terminal_style() {
        assert_eq!(format_ms(0), "00:00");
        assert_eq!(format_ms(59_000), "00:59");
        assert_eq!(format_ms(600_000), "10:00");
        assert_eq!(format_ms(3_661_000), "1:01:01");
        // Floors partial seconds rather than rounding up.
        assert_eq!(format_ms(599_750), "09:59");
    }

    #[test]
    fn percentage_tracks_increments() {
        let clock = Clock::new();
        assert_eq!(clock.remaining_pct(), 0.0);
        clock.set(300_000, 600_000);
        assert!((clock.remaining_pct() - 0.5).abs() < 1e-9);
        clock.add(300_000);
        // 600_000 of 900_000.
        assert!((clock.remaining_pct() - 2.0 / 3.0).abs() < 1e-9);
    }
}
