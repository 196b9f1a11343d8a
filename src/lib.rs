// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod result;
pub mod runtime;
pub mod store;
pub mod timer;
pub mod ui;
pub mod util;

pub use app::{App, Control};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use engine::{Engine, Phase, ResponseOutcome, TimerOutcome, Timings, TrialState};
pub use error::{EngineError, StoreError};
pub use result::{SessionKind, SpeedRating, TestResult};
pub use timer::{ManualTimer, ThreadTimer, Timer, TimerKind, TimerToken};
