use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::engine::{Phase, TrialState};
use crate::result::SessionKind;
use crate::ui::{
    centered, dim_style, key_label, rating_color, title_style, View, HORIZONTAL_MARGIN,
    VERTICAL_MARGIN,
};
use crate::util::format_ms;

/// A UI Screen boundary: draws one phase of the session
pub trait Screen {
    fn render(&self, view: &View, area: Rect, buf: &mut Buffer);
}

/// Phase 1: choose warmup or full test
pub struct SetupScreen;

impl Screen for SetupScreen {
    fn render(&self, view: &View, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(3), // title
                Constraint::Length(4), // description
                Constraint::Length(4), // tags
                Constraint::Min(3),    // choices
                Constraint::Length(2), // notice / error
            ])
            .split(area);

        Paragraph::new("Reaction Time Test")
            .block(Block::default().borders(Borders::ALL))
            .style(title_style())
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        Paragraph::new(format!(
            "Measures how fast you react to a visual stimulus. A red block appears after a random delay; press {} or click as soon as you see it.",
            key_label(view.response_key)
        ))
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        let tag = |label: &str, value: &Option<String>| {
            Line::from(vec![
                Span::styled(format!("{label}: "), dim_style()),
                Span::raw(value.clone().unwrap_or_else(|| "-".to_string())),
            ])
        };
        Paragraph::new(vec![
            tag("Condition", &view.condition),
            tag("Notes", &view.notes),
        ])
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        Paragraph::new(vec![
            Line::from("(w) Warmup - 5 trials"),
            Line::from("(f) Full Test - 20 trials"),
            Line::from(""),
            Line::styled("(enter) default  (q)uit", dim_style()),
        ])
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

        render_feedback(view, chunks[4], buf);
    }
}

/// Phase 2: explain the task before the first trial
pub struct InstructionsScreen;

impl Screen for InstructionsScreen {
    fn render(&self, view: &View, area: Rect, buf: &mut Buffer) {
        let key = key_label(view.response_key);
        let lines = vec![
            Line::from("- A red block will appear on screen after a random delay"),
            Line::from(format!(
                "- Press {key} (or click) as quickly as possible when it appears"
            )),
            Line::from("- Don't respond before the block appears - wait for it!"),
            Line::from(format!("- You'll complete {} trials", view.total_trials)),
            Line::from("- Try to stay focused and react as quickly as possible"),
            Line::from(""),
            Line::styled(
                format!(
                    "(enter) begin {}  (esc) back",
                    view.kind.label().to_lowercase()
                ),
                dim_style(),
            ),
        ];

        let panel = centered(area, 70, lines.len() as u16 + 2);
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} Instructions", view.kind.label()))
                    .title_style(title_style()),
            )
            .wrap(Wrap { trim: false })
            .render(panel, buf);
    }
}

/// Phase 3: the trials themselves
pub struct RunningScreen;

impl Screen for RunningScreen {
    fn render(&self, view: &View, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // heading
                Constraint::Length(3), // progress
                Constraint::Min(5),    // stimulus panel
                Constraint::Length(1), // hint
            ])
            .split(area);

        Paragraph::new(format!("{} in Progress", view.kind.label()))
            .style(title_style())
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let shown = (view.trial_index + 1).min(view.total_trials);
        let ratio = if view.total_trials == 0 {
            0.0
        } else {
            shown as f64 / view.total_trials as f64
        };
        Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(ratio.clamp(0.0, 1.0))
            .label(format!("Trial {shown} of {}", view.total_trials))
            .render(chunks[1], buf);

        let panel = Block::default().borders(Borders::ALL);
        let inner = panel.inner(chunks[2]);
        panel.render(chunks[2], buf);

        if view.early_click {
            let text = vec![
                Line::styled(
                    "Too early!",
                    Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                ),
                Line::from("Wait for the red block to appear"),
            ];
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .render(centered(inner, inner.width, 2), buf);
        } else if let TrialState::AwaitingResponse { .. } = view.trial {
            let stimulus = centered(inner, 16, 5);
            Block::default()
                .style(Style::default().bg(Color::Red))
                .render(stimulus, buf);
            Paragraph::new("NOW")
                .style(
                    Style::default()
                        .bg(Color::Red)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                )
                .alignment(Alignment::Center)
                .render(centered(stimulus, stimulus.width, 1), buf);
        } else {
            let mut text = vec![Line::styled(
                match view.trial {
                    TrialState::Pause => "Get ready...",
                    _ => "Wait for it...",
                },
                dim_style(),
            )];
            if let (TrialState::Pause, Some(latency)) = (view.trial, view.last_latency) {
                text.push(Line::from(format!("Last reaction: {}", format_ms(latency))));
            }
            let height = text.len() as u16;
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .render(centered(inner, inner.width, height), buf);
        }

        Paragraph::new(format!(
            "Press {} or click when the red block appears  (esc) abandon",
            key_label(view.response_key)
        ))
        .style(dim_style())
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}

/// Phase 4: summary of the finished session
pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, view: &View, area: Rect, buf: &mut Buffer) {
        let Some(result) = view.result.as_ref() else {
            return;
        };

        let grid_rows = result.trials().div_ceil(5) as u16;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1),             // heading
                Constraint::Length(3),             // summary
                Constraint::Length(grid_rows + 2), // per-trial grid
                Constraint::Length(2),             // warmup note
                Constraint::Length(2),             // notice / error
                Constraint::Min(1),                // keys
            ])
            .split(area);

        Paragraph::new(format!("{} Complete!", result.kind().label()))
            .style(title_style())
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let summary = Line::from(vec![
            Span::styled("Average ", dim_style()),
            Span::styled(format_ms(result.average_time()), bold.fg(Color::Cyan)),
            Span::raw("   "),
            Span::styled("Best ", dim_style()),
            Span::styled(format_ms(result.best_time()), bold.fg(Color::Green)),
            Span::raw("   "),
            Span::styled("Worst ", dim_style()),
            Span::styled(format_ms(result.worst_time()), bold.fg(Color::Red)),
            Span::raw("   "),
            Span::styled("Trials ", dim_style()),
            Span::styled(result.trials().to_string(), bold),
        ]);
        Paragraph::new(summary)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        let rows: Vec<Line> = result
            .reaction_times()
            .chunks(5)
            .map(|row| {
                Line::from(
                    row.iter()
                        .map(|rt| {
                            Span::styled(
                                format!("{:>8}", format_ms(*rt)),
                                Style::default().fg(rating_color(
                                    crate::result::SpeedRating::of(*rt),
                                )),
                            )
                        })
                        .collect::<Vec<_>>(),
                )
            })
            .collect();
        Paragraph::new(rows)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Individual Trial Results"),
            )
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        if result.kind() == SessionKind::Warmup {
            Paragraph::new(
                "This was a warmup session. Take the full test to save your results.",
            )
            .style(Style::default().fg(Color::Blue))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[3], buf);
        }

        render_feedback(view, chunks[4], buf);

        let mut keys = vec!["(r) another test"];
        if view.can_save {
            keys.push("(s) save");
        }
        if result.kind() == SessionKind::Warmup {
            keys.push("(f) full test");
        }
        keys.push("(q)uit");
        Paragraph::new(keys.join("  "))
            .style(dim_style())
            .alignment(Alignment::Center)
            .render(chunks[5], buf);
    }
}

fn render_feedback(view: &View, area: Rect, buf: &mut Buffer) {
    let mut lines = Vec::new();
    if let Some(notice) = &view.notice {
        lines.push(Line::styled(
            notice.clone(),
            Style::default().fg(Color::Green),
        ));
    }
    if let Some(err) = &view.last_error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(area, buf);
}

/// Helper to construct the appropriate screen for the current phase
pub fn current_screen(phase: Phase) -> Box<dyn Screen> {
    match phase {
        Phase::Setup => Box::new(SetupScreen),
        Phase::Instructions => Box::new(InstructionsScreen),
        Phase::Running => Box::new(RunningScreen),
        Phase::Results => Box::new(ResultsScreen),
    }
}
