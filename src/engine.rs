//! Trial scheduling and timing engine.
//!
//! `Engine` is an explicit state machine. It never sleeps and never reads the
//! wall clock: time comes from an injected [`Clock`], delays go through an
//! injected [`Timer`], and the host feeds fired timer tokens and response
//! events back in. Every transition runs to completion synchronously.
//!
//! Phases: `Setup -> Instructions -> Running -> Results`, with `reset()`
//! returning to `Setup` from anywhere. Inside `Running` each trial moves
//! `Armed -> AwaitingResponse -> Pause` on a valid response, or
//! `Armed -> EarlyWarning -> Armed` (same index) when the subject jumps the gun.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::result::{SessionKind, TestResult};
use crate::timer::{Timer, TimerKind, TimerToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    #[default]
    Setup,
    Instructions,
    Running,
    Results,
}

/// Where the current trial is. Only meaningful while `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TrialState {
    #[default]
    Idle,
    /// Foreperiod timer running, nothing on screen yet
    Armed,
    /// Stimulus visible since `onset_ms`
    AwaitingResponse { onset_ms: f64 },
    /// Premature response, showing the warning before re-arming
    EarlyWarning,
    /// Break between a completed trial and the next one
    Pause,
}

/// Delay parameters, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub min_onset_ms: f64,
    pub max_onset_ms: f64,
    pub inter_trial_pause_ms: f64,
    pub early_warning_ms: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            min_onset_ms: 1000.0,
            max_onset_ms: 4000.0,
            inter_trial_pause_ms: 1000.0,
            early_warning_ms: 1500.0,
        }
    }
}

/// In-progress session data, owned by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSession {
    kind: SessionKind,
    current_trial_index: usize,
    reaction_times: Vec<f64>,
    early_click: bool,
    trial: TrialState,
}

impl TestSession {
    fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn total_trials(&self) -> usize {
        self.kind.total_trials()
    }

    pub fn current_trial_index(&self) -> usize {
        self.current_trial_index
    }

    pub fn reaction_times(&self) -> &[f64] {
        &self.reaction_times
    }

    pub fn early_click(&self) -> bool {
        self.early_click
    }

    pub fn trial(&self) -> TrialState {
        self.trial
    }

    pub fn awaiting_response(&self) -> bool {
        self.stimulus_onset().is_some()
    }

    pub fn stimulus_onset(&self) -> Option<f64> {
        match self.trial {
            TrialState::AwaitingResponse { onset_ms } => Some(onset_ms),
            _ => None,
        }
    }
}

/// What a response event did
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// Not running, or between trials
    Ignored,
    /// Response before the stimulus; the same trial will be re-armed
    EarlyClick { trial_index: usize },
    /// Valid response, more trials to go
    Recorded { trial_index: usize, latency_ms: f64 },
    /// Valid response that finished the session
    Completed(TestResult),
    /// Latency came out negative; the trial was thrown away and re-armed
    Discarded { trial_index: usize },
}

/// What a fired timer did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    StimulusShown { trial_index: usize },
    TrialArmed { trial_index: usize },
    /// Cancelled, superseded or outside `Running`; dropped
    Stale,
}

pub struct Engine<C: Clock, T: Timer> {
    clock: C,
    timer: T,
    rng: StdRng,
    timings: Timings,
    phase: Phase,
    session: TestSession,
    result: Option<TestResult>,
    live_timer: Option<TimerToken>,
    epoch: u64,
}

impl<C: Clock, T: Timer> Engine<C, T> {
    pub fn new(clock: C, timer: T) -> Self {
        Self::with_rng(clock, timer, StdRng::from_entropy())
    }

    pub fn with_rng(clock: C, timer: T, rng: StdRng) -> Self {
        Self {
            clock,
            timer,
            rng,
            timings: Timings::default(),
            phase: Phase::Setup,
            session: TestSession::default(),
            result: None,
            live_timer: None,
            epoch: 0,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn kind(&self) -> SessionKind {
        self.session.kind
    }

    pub fn current_trial_index(&self) -> usize {
        self.session.current_trial_index
    }

    pub fn total_trials(&self) -> usize {
        self.session.total_trials()
    }

    pub fn awaiting_response(&self) -> bool {
        self.session.awaiting_response()
    }

    pub fn stimulus_visible(&self) -> bool {
        self.phase == Phase::Running && self.session.awaiting_response()
    }

    pub fn early_click(&self) -> bool {
        self.session.early_click
    }

    pub fn trial_state(&self) -> TrialState {
        self.session.trial
    }

    /// The finished result; only set while in `Results`
    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    /// Token of the one timer the engine will currently honour
    pub fn live_timer(&self) -> Option<TimerToken> {
        self.live_timer
    }

    pub fn start_session(&mut self, kind: SessionKind) -> Result<(), EngineError> {
        if self.phase != Phase::Setup {
            return Err(self.illegal("start a session"));
        }

        self.cancel_live();
        self.session = TestSession::new(kind);
        self.result = None;
        self.phase = Phase::Instructions;
        info!(%kind, total_trials = kind.total_trials(), "session started");
        Ok(())
    }

    pub fn begin_running(&mut self) -> Result<(), EngineError> {
        if self.phase != Phase::Instructions {
            return Err(self.illegal("begin running"));
        }

        self.phase = Phase::Running;
        self.arm_trial();
        Ok(())
    }

    /// Classify a response (pointer or key) that happened at `at_ms` on the
    /// engine's clock.
    pub fn on_response(&mut self, at_ms: f64) -> ResponseOutcome {
        if self.phase != Phase::Running {
            return ResponseOutcome::Ignored;
        }

        let trial_index = self.session.current_trial_index;
        match self.session.trial {
            TrialState::AwaitingResponse { onset_ms } => {
                let latency_ms = at_ms - onset_ms;
                if !latency_ms.is_finite() || latency_ms < 0.0 {
                    warn!(
                        trial_index,
                        onset_ms, at_ms, "response precedes stimulus onset, discarding trial"
                    );
                    self.arm_trial();
                    return ResponseOutcome::Discarded { trial_index };
                }
                self.on_trial_outcome(latency_ms)
            }
            TrialState::Armed | TrialState::EarlyWarning => {
                debug!(trial_index, "early response");
                self.session.early_click = true;
                self.session.trial = TrialState::EarlyWarning;
                self.schedule(TimerKind::EarlyWarning, self.timings.early_warning_ms);
                ResponseOutcome::EarlyClick { trial_index }
            }
            TrialState::Pause | TrialState::Idle => ResponseOutcome::Ignored,
        }
    }

    /// Same as `on_response`, timestamped with the engine's own clock
    pub fn respond_now(&mut self) -> ResponseOutcome {
        let now = self.clock.now_ms();
        self.on_response(now)
    }

    /// Deliver a fired timer. Anything but the live token is dropped.
    pub fn on_timer(&mut self, token: TimerToken) -> TimerOutcome {
        if self.phase != Phase::Running || self.live_timer != Some(token) {
            debug!(epoch = token.epoch, kind = ?token.kind, "dropping stale timer");
            return TimerOutcome::Stale;
        }
        self.live_timer = None;

        let trial_index = self.session.current_trial_index;
        match token.kind {
            TimerKind::StimulusOnset => {
                let onset_ms = self.clock.now_ms();
                self.session.trial = TrialState::AwaitingResponse { onset_ms };
                debug!(trial_index, onset_ms, "stimulus shown");
                TimerOutcome::StimulusShown { trial_index }
            }
            TimerKind::InterTrialPause | TimerKind::EarlyWarning => {
                self.arm_trial();
                TimerOutcome::TrialArmed { trial_index }
            }
        }
    }

    /// Abandon whatever is in progress and go back to `Setup`
    pub fn reset(&mut self) {
        self.cancel_live();
        if self.phase != Phase::Setup {
            info!(phase = %self.phase, "session reset");
        }
        self.phase = Phase::Setup;
        self.session = TestSession::default();
        self.result = None;
    }

    fn on_trial_outcome(&mut self, latency_ms: f64) -> ResponseOutcome {
        let trial_index = self.session.current_trial_index;
        self.session.reaction_times.push(latency_ms);
        self.session.early_click = false;
        self.session.current_trial_index += 1;
        debug!(trial_index, latency_ms, "trial completed");

        if self.session.current_trial_index < self.session.total_trials() {
            self.session.trial = TrialState::Pause;
            self.schedule(
                TimerKind::InterTrialPause,
                self.timings.inter_trial_pause_ms,
            );
            return ResponseOutcome::Recorded {
                trial_index,
                latency_ms,
            };
        }

        self.cancel_live();
        let session = std::mem::take(&mut self.session);
        let result = TestResult::new(session.kind, session.reaction_times);
        self.session = TestSession::new(session.kind);
        self.phase = Phase::Results;
        info!(
            kind = %result.kind(),
            trials = result.trials(),
            average_ms = result.average_time(),
            "session finished"
        );
        self.result = Some(result.clone());
        ResponseOutcome::Completed(result)
    }

    fn arm_trial(&mut self) {
        let delay_ms = self.onset_delay();
        self.session.trial = TrialState::Armed;
        self.session.early_click = false;
        debug!(
            trial_index = self.session.current_trial_index,
            delay_ms, "trial armed"
        );
        self.schedule(TimerKind::StimulusOnset, delay_ms);
    }

    fn onset_delay(&mut self) -> f64 {
        let lo = self.timings.min_onset_ms.max(0.0);
        let hi = self.timings.max_onset_ms.max(0.0);
        if hi > lo {
            self.rng.gen_range(lo..hi)
        } else {
            lo
        }
    }

    fn schedule(&mut self, kind: TimerKind, delay_ms: f64) {
        self.cancel_live();
        self.epoch += 1;
        let token = TimerToken {
            epoch: self.epoch,
            kind,
        };
        let delay = Duration::try_from_secs_f64(delay_ms.max(0.0) / 1000.0).unwrap_or_default();
        self.timer.schedule(delay, token);
        self.live_timer = Some(token);
    }

    fn cancel_live(&mut self) {
        if let Some(token) = self.live_timer.take() {
            self.timer.cancel(token);
        }
    }

    fn illegal(&self, operation: &'static str) -> EngineError {
        EngineError::IllegalTransition {
            operation,
            phase: self.phase,
        }
    }
}
