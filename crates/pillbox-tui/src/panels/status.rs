//! Serialized output, the newest notification and key hints.

use std::time::Instant;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::Level;

use crate::app::{App, Focus};

fn level_style(level: Level) -> Style {
    match level {
        Level::ERROR => Style::default().fg(Color::Red),
        Level::WARN => Style::default().fg(Color::Yellow),
        Level::INFO => Style::default().fg(Color::Green),
        Level::DEBUG => Style::default().fg(Color::Blue),
        Level::TRACE => Style::default().fg(Color::DarkGray),
    }
}

fn hints(focus: Focus) -> &'static str {
    match focus {
        Focus::Prompt => "Tab: pills  Ctrl+C: quit",
        Focus::Pills => "space toggle  d delete  J/K move  e edit  / search  b loras  m embeddings  Tab: prompt  q quit",
    }
}

pub fn render(frame: &mut Frame, app: &App, area: Rect, now: Instant) {
    let block = Block::default()
        .title(" Output ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let output = if app.serialized().is_empty() {
        Paragraph::new("(empty)").style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(app.serialized()).wrap(Wrap { trim: false })
    };
    frame.render_widget(output, chunks[0]);

    let footer = match app.notification(now) {
        Some(note) => Line::from(vec![
            Span::styled(format!("{:>5} ", note.level), level_style(note.level)),
            Span::raw(note.message),
        ]),
        None => Line::styled(hints(app.focus), Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(Paragraph::new(footer), chunks[1]);
}
