//! Pill list: one row per tag in the collection.

use pillbox_core::TagKind;
use pillbox_core::codec::format_token;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::app::{App, Focus};

fn kind_style(kind: TagKind) -> Style {
    match kind {
        TagKind::Tag => Style::default(),
        TagKind::Lora => Style::default().fg(Color::Magenta),
        TagKind::Embedding => Style::default().fg(Color::Yellow),
        TagKind::Group => Style::default().fg(Color::Green),
    }
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Pills;
    let collection = app.collection();
    let title = format!(" Tags ({}) ", collection.len());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        });

    if collection.is_empty() {
        let empty = Paragraph::new("  (no tags; type in the prompt or press / to search)")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = collection
        .iter()
        .map(|tag| {
            let mut style = kind_style(tag.kind);
            if !tag.active {
                style = style
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT);
            }
            let mut spans = vec![
                Span::styled(
                    format!("{:<9} ", tag.kind.as_str()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format_token(tag), style),
            ];
            if !tag.triggers.is_empty() {
                spans.push(Span::styled(
                    format!("  +{}", tag.triggers.join(", ")),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let highlight = if focused {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let list = List::new(items).block(block).highlight_style(highlight);
    let mut state = ListState::default().with_selected(Some(app.selected()));
    frame.render_stateful_widget(list, area, &mut state);
}
