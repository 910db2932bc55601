//! Prompt editor: the raw text, soft-wrapped per character.

use pillbox_core::autocomplete::{CaretMetrics, Monospace, TextSurface, visual_position};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::{ActivePopup, App, Focus};

/// Split `text` into display rows the same way the caret is measured.
pub fn wrap_lines(text: &str, width: i32) -> Vec<String> {
    let width = width.max(1);
    let mut lines = vec![String::new()];
    let mut column = 0;
    for c in text.chars() {
        if c == '\n' {
            lines.push(String::new());
            column = 0;
            continue;
        }
        let w = Monospace.char_width(c);
        if column > 0 && column + w > width {
            lines.push(String::new());
            column = 0;
        }
        if let Some(line) = lines.last_mut() {
            match c {
                '\t' => line.push_str("    "),
                c => line.push(c),
            }
        }
        column += w;
    }
    lines
}

/// Rows scrolled off the top so the caret row stays visible.
pub fn scroll_for(surface: &TextSurface, area: Rect) -> i32 {
    let caret = visual_position(
        &surface.text,
        surface.caret,
        i32::from(area.width),
        &Monospace,
    );
    (caret.line - i32::from(area.height) + 1).max(0)
}

/// Draw the prompt and return the inner text area.
pub fn render(frame: &mut Frame, app: &App, area: Rect) -> Rect {
    let focused = app.focus == Focus::Prompt;
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .title(" Prompt ")
        .borders(Borders::ALL)
        .border_style(border);
    let inner = block.inner(area);

    let surface = app.surface();
    let scroll = scroll_for(surface, inner);
    let lines: Vec<Line> = wrap_lines(&surface.text, i32::from(inner.width))
        .into_iter()
        .skip(scroll as usize)
        .take(usize::from(inner.height))
        .map(Line::from)
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);

    // Other popups take the keyboard; only suggestions leave the caret live.
    let caret_live = matches!(app.active_popup(), None | Some(ActivePopup::Autocomplete(_)));
    if focused && caret_live {
        let caret = visual_position(
            &surface.text,
            surface.caret,
            i32::from(inner.width),
            &Monospace,
        );
        let x = inner.x + caret.column.clamp(0, i32::from(inner.width)) as u16;
        let y = inner.y + (caret.line - scroll).clamp(0, i32::from(inner.height)) as u16;
        frame.set_cursor_position(Position::new(x, y));
    }
    inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrap_is_per_char() {
        assert_eq!(wrap_lines("abcdef\ngh", 4), vec!["abcd", "ef", "gh"]);
        assert_eq!(wrap_lines("", 4), vec![""]);
    }

    #[test]
    fn test_wrap_agrees_with_caret_measure() {
        let text = "sky, blue sky\nred";
        let lines = wrap_lines(text, 6);
        let caret = visual_position(text, 9, 6, &Monospace);
        // Char 9 is the space before the second "sky".
        assert_eq!(lines[caret.line as usize].chars().nth(caret.column as usize), Some(' '));
    }

    #[test]
    fn test_wrap_counts_wide_chars_as_two_cells() {
        assert_eq!(wrap_lines("青空青空", 5), vec!["青空", "青空"]);
        let caret = visual_position("ab青空", 4, 5, &Monospace);
        assert_eq!((caret.line, caret.column), (1, 2));
        assert_eq!(wrap_lines("ab青空", 5), vec!["ab青", "空"]);
    }

    #[test]
    fn test_scroll_follows_caret() {
        let area = Rect::new(0, 0, 4, 2);
        assert_eq!(scroll_for(&TextSurface::at_end("abcd"), area), 0);
        assert_eq!(scroll_for(&TextSurface::at_end("abcdefghij"), area), 1);
        assert_eq!(scroll_for(&TextSurface::new("abcdefghij", 0), area), 0);
    }
}
