use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use tracing::warn;

use crate::clock::Clock;
use crate::config::Config;
use crate::engine::{Engine, Phase, ResponseOutcome, TimerOutcome};
use crate::error::StoreError;
use crate::result::SessionKind;
use crate::runtime::AppEvent;
use crate::store::{ResultStore, Submission};
use crate::timer::Timer;

/// What the event loop should do after handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Terminal host around the engine: key/mouse mapping, tags and saving
pub struct App<C: Clock, T: Timer> {
    pub engine: Engine<C, T>,
    pub config: Config,
    pub condition: Option<String>,
    pub notes: Option<String>,
    /// Latency of the trial that just finished, shown during the pause
    pub last_latency: Option<f64>,
    /// One-line feedback such as "Results saved."
    pub notice: Option<String>,
    pub last_error: Option<String>,
    store: Option<Box<dyn ResultStore>>,
}

impl<C: Clock, T: Timer> App<C, T> {
    pub fn new(engine: Engine<C, T>, config: Config) -> Self {
        Self {
            engine,
            config,
            condition: None,
            notes: None,
            last_latency: None,
            notice: None,
            last_error: None,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Box<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_tags(mut self, condition: Option<String>, notes: Option<String>) -> Self {
        self.condition = condition;
        self.notes = notes;
        self
    }

    pub fn saving_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Whether the result on screen may be saved
    pub fn can_save(&self) -> bool {
        self.saving_enabled()
            && self
                .engine
                .result()
                .is_some_and(|r| r.kind() == SessionKind::Full)
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Control {
        match event {
            AppEvent::Key(key, at_ms) => self.handle_key_at(key, at_ms),
            AppEvent::Mouse(mouse, at_ms) => {
                self.handle_mouse_at(mouse, at_ms);
                Control::Continue
            }
            AppEvent::Timer(token) => {
                if let TimerOutcome::StimulusShown { .. } = self.engine.on_timer(token) {
                    self.last_latency = None;
                }
                Control::Continue
            }
            AppEvent::Resize | AppEvent::Tick => Control::Continue,
        }
    }

    /// Handle a key stamped with the current engine time
    pub fn handle_key(&mut self, key: KeyEvent) -> Control {
        let now = self.engine.clock().now_ms();
        self.handle_key_at(key, now)
    }

    /// Handle a key read at `at_ms` on the engine clock
    pub fn handle_key_at(&mut self, key: KeyEvent, at_ms: f64) -> Control {
        if key.kind != KeyEventKind::Press {
            return Control::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        match self.engine.phase() {
            Phase::Setup => match key.code {
                KeyCode::Char('w') => self.start(SessionKind::Warmup),
                KeyCode::Char('f') => self.start(SessionKind::Full),
                KeyCode::Enter => self.start(self.config.default_kind),
                KeyCode::Esc | KeyCode::Char('q') => return Control::Quit,
                _ => {}
            },
            Phase::Instructions => match key.code {
                KeyCode::Enter => {
                    if let Err(e) = self.engine.begin_running() {
                        warn!(error = %e, "could not begin running");
                    }
                }
                KeyCode::Esc => self.abandon(),
                _ => {}
            },
            Phase::Running => match key.code {
                KeyCode::Char(c) if c == self.config.response_key => self.respond_at(at_ms),
                KeyCode::Esc => self.abandon(),
                _ => {}
            },
            Phase::Results => match key.code {
                KeyCode::Char('s') => self.save_results(),
                KeyCode::Char('r') => self.abandon(),
                KeyCode::Char('f') => {
                    self.abandon();
                    self.start(SessionKind::Full);
                }
                KeyCode::Esc | KeyCode::Char('q') => return Control::Quit,
                _ => {}
            },
        }

        Control::Continue
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        let now = self.engine.clock().now_ms();
        self.handle_mouse_at(mouse, now);
    }

    /// Left clicks anywhere count as a response while running
    pub fn handle_mouse_at(&mut self, mouse: MouseEvent, at_ms: f64) {
        if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
            if self.engine.phase() == Phase::Running {
                self.respond_at(at_ms);
            }
        }
    }

    /// Respond as of the current engine time
    pub fn respond(&mut self) {
        let now = self.engine.clock().now_ms();
        self.respond_at(now);
    }

    /// Shared path for every response channel
    pub fn respond_at(&mut self, at_ms: f64) {
        match self.engine.on_response(at_ms) {
            ResponseOutcome::Recorded { latency_ms, .. } => self.last_latency = Some(latency_ms),
            ResponseOutcome::Completed(_) => self.last_latency = None,
            ResponseOutcome::EarlyClick { .. }
            | ResponseOutcome::Discarded { .. }
            | ResponseOutcome::Ignored => {}
        }
    }

    pub fn start(&mut self, kind: SessionKind) {
        self.notice = None;
        self.last_error = None;
        self.last_latency = None;
        if let Err(e) = self.engine.start_session(kind) {
            warn!(error = %e, "could not start session");
        }
    }

    /// Drop the current session and return to setup
    pub fn abandon(&mut self) {
        self.engine.reset();
        self.last_latency = None;
    }

    /// Save the finished result. On failure the result stays on screen so the
    /// save can be retried.
    pub fn save_results(&mut self) {
        match self.try_save() {
            Ok(Some(_)) => {
                self.engine.reset();
                self.condition = None;
                self.notes = None;
                self.last_error = None;
                self.notice = Some("Results saved.".to_string());
            }
            Ok(None) => {
                self.notice = Some("Saving is disabled for this run.".to_string());
            }
            Err(e) => {
                warn!(error = %e, "saving results failed");
                self.last_error = Some(format!("Failed to save results: {e}"));
            }
        }
    }

    fn try_save(&mut self) -> Result<Option<i64>, StoreError> {
        let Some(result) = self.engine.result() else {
            return Ok(None);
        };
        let Some(store) = self.store.as_mut() else {
            return Ok(None);
        };

        let submission = Submission::new(result, self.config.user_id.as_str())?
            .with_condition(self.condition.as_deref())
            .with_notes(self.notes.as_deref());
        store.save(&submission).map(Some)
    }
}
