pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};

use crate::app::App;
use crate::clock::Clock;
use crate::engine::{Phase, TrialState};
use crate::result::{SessionKind, SpeedRating, TestResult};
use crate::timer::Timer;

pub const HORIZONTAL_MARGIN: u16 = 5;
pub const VERTICAL_MARGIN: u16 = 1;

/// Everything a screen needs to draw one frame, copied out of the app
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub phase: Phase,
    pub kind: SessionKind,
    pub trial_index: usize,
    pub total_trials: usize,
    pub trial: TrialState,
    pub early_click: bool,
    pub last_latency: Option<f64>,
    pub result: Option<TestResult>,
    pub response_key: char,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub notice: Option<String>,
    pub last_error: Option<String>,
    pub can_save: bool,
    pub saving_enabled: bool,
}

impl<C: Clock, T: Timer> App<C, T> {
    pub fn view(&self) -> View {
        View {
            phase: self.engine.phase(),
            kind: self.engine.kind(),
            trial_index: self.engine.current_trial_index(),
            total_trials: self.engine.total_trials(),
            trial: self.engine.trial_state(),
            early_click: self.engine.early_click(),
            last_latency: self.last_latency,
            result: self.engine.result().cloned(),
            response_key: self.config.response_key,
            condition: self.condition.clone(),
            notes: self.notes.clone(),
            notice: self.notice.clone(),
            last_error: self.last_error.clone(),
            can_save: self.can_save(),
            saving_enabled: self.saving_enabled(),
        }
    }
}

impl Widget for &View {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(self.phase).render(self, area, buf);
    }
}

/// Human name for the response key
pub fn key_label(key: char) -> String {
    match key {
        ' ' => "space".to_string(),
        c => c.to_string(),
    }
}

pub fn rating_color(rating: SpeedRating) -> Color {
    match rating {
        SpeedRating::Fast => Color::Green,
        SpeedRating::Moderate => Color::Yellow,
        SpeedRating::Slow => Color::Red,
    }
}

pub fn title_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

pub fn dim_style() -> Style {
    Style::default().fg(Color::Gray).add_modifier(Modifier::DIM)
}

/// A `width` x `height` rect centred inside `area`, clamped to fit
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
