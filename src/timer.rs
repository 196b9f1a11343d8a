use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::clock::{Clock, ManualClock};
use crate::runtime::AppEvent;

/// What a scheduled timer is for once it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Random foreperiod elapsed, reveal the stimulus
    StimulusOnset,
    /// Fixed break after a completed trial, arm the next one
    InterTrialPause,
    /// Fixed "too early" warning elapsed, re-arm the same trial
    EarlyWarning,
}

/// Identifies one scheduled timer. `epoch` grows with every schedule call, so a
/// token from a cancelled or superseded timer never matches the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub epoch: u64,
    pub kind: TimerKind,
}

/// Cancellable one-shot timer capability.
///
/// Firing is reported out of band: the implementation hands the token back to
/// whoever drives the engine, which passes it to `Engine::on_timer`.
pub trait Timer {
    fn schedule(&mut self, delay: Duration, token: TimerToken);
    fn cancel(&mut self, token: TimerToken);
}

/// Production timer: one sleeper thread per schedule, posting
/// `AppEvent::Timer` into the app's event channel.
#[derive(Debug)]
pub struct ThreadTimer {
    tx: Sender<AppEvent>,
    // epoch of the timer allowed to post; 0 means none
    live: Arc<AtomicU64>,
}

impl ThreadTimer {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self {
            tx,
            live: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Timer for ThreadTimer {
    fn schedule(&mut self, delay: Duration, token: TimerToken) {
        self.live.store(token.epoch, Ordering::SeqCst);
        let live = Arc::clone(&self.live);
        let tx = self.tx.clone();

        thread::spawn(move || {
            thread::sleep(delay);
            if live.load(Ordering::SeqCst) == token.epoch {
                let _ = tx.send(AppEvent::Timer(token));
            }
        });
    }

    fn cancel(&mut self, token: TimerToken) {
        let _ = self
            .live
            .compare_exchange(token.epoch, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct ManualTimerState {
    pending: Vec<(f64, TimerToken)>,
    history: Vec<(TimerToken, Duration)>,
}

/// Simulated timer for tests. Nothing fires on its own: the test advances
/// the shared `ManualClock` through this timer and feeds the due tokens to
/// the engine. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    clock: ManualClock,
    state: Rc<RefCell<ManualTimerState>>,
}

impl ManualTimer {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            state: Rc::new(RefCell::new(ManualTimerState::default())),
        }
    }

    /// Tokens still waiting to fire, earliest first
    pub fn pending(&self) -> Vec<TimerToken> {
        let mut pending = self.state.borrow().pending.clone();
        pending.sort_by(|a, b| a.0.total_cmp(&b.0));
        pending.into_iter().map(|(_, token)| token).collect()
    }

    /// Every schedule call so far, in order, with the requested delay
    pub fn history(&self) -> Vec<(TimerToken, Duration)> {
        self.state.borrow().history.clone()
    }

    /// Advance the clock by `ms` and return the tokens that came due, earliest first.
    pub fn advance(&self, ms: f64) -> Vec<TimerToken> {
        self.clock.advance(ms);
        let now = self.clock.now_ms();

        let mut state = self.state.borrow_mut();
        let (mut due, rest): (Vec<_>, Vec<_>) =
            state.pending.drain(..).partition(|(at, _)| *at <= now);
        state.pending = rest;

        due.sort_by(|a, b| a.0.total_cmp(&b.0));
        due.into_iter().map(|(_, token)| token).collect()
    }

    /// Jump the clock to the earliest pending deadline and return that token.
    pub fn fire_next(&self) -> Option<TimerToken> {
        let mut state = self.state.borrow_mut();
        let idx = state
            .pending
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1).0.total_cmp(&(b.1).0))
            .map(|(idx, _)| idx)?;

        let (at, token) = state.pending.remove(idx);
        if at > self.clock.now_ms() {
            self.clock.set(at);
        }
        Some(token)
    }
}

impl Timer for ManualTimer {
    fn schedule(&mut self, delay: Duration, token: TimerToken) {
        let at = self.clock.now_ms() + delay.as_secs_f64() * 1000.0;
        let mut state = self.state.borrow_mut();
        state.pending.push((at, token));
        state.history.push((token, delay));
    }

    fn cancel(&mut self, token: TimerToken) {
        self.state
            .borrow_mut()
            .pending
            .retain(|(_, pending)| *pending != token);
    }
}
