//! Screen layout and rendering.

mod pills;
mod popup;
mod prompt;
mod status;

use std::time::Instant;

use pillbox_core::menu::{Point, Rect as CoreRect};
use ratatui::prelude::*;

use crate::app::{ActivePopup, App};

/// Rows given to the prompt editor, borders included.
const PROMPT_HEIGHT: u16 = 8;
/// Rows given to the status area, borders included.
const STATUS_HEIGHT: u16 = 5;

/// Draw the whole screen and report geometry back to the app.
pub fn draw(frame: &mut Frame, app: &mut App, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(PROMPT_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(frame.area());

    let text_area = prompt::render(frame, app, chunks[0]);
    pills::render(frame, app, chunks[1]);
    status::render(frame, app, chunks[2], now);

    let viewport = frame.area();
    let layout = match app.active_popup() {
        Some(active) => {
            // Suggestions hang below the word being typed.
            let anchor = match (&active, app.anchor()) {
                (ActivePopup::Autocomplete(_), Some(anchor)) => {
                    let (x, y) = to_tui_point(anchor, viewport);
                    (x, y.saturating_add(1))
                }
                _ => (chunks[1].x + 2, chunks[1].y + 1),
            };
            Some(popup::render(frame, &active, anchor, viewport))
        }
        None => None,
    };
    app.set_popup_layout(layout.map(|(rect, first)| (to_core(rect), first)));

    let scroll = prompt::scroll_for(app.surface(), text_area);
    app.set_prompt_geometry(
        Point::new(i32::from(text_area.x), i32::from(text_area.y)),
        i32::from(text_area.width),
        scroll,
    );
}

pub(crate) fn to_core(rect: Rect) -> CoreRect {
    CoreRect::new(
        i32::from(rect.x),
        i32::from(rect.y),
        i32::from(rect.width),
        i32::from(rect.height),
    )
}

/// Clamp a core rectangle into `bounds`.
pub(crate) fn to_tui(rect: CoreRect, bounds: Rect) -> Rect {
    let clamp = |v: i32, lo: u16, hi: u16| v.clamp(i32::from(lo), i32::from(hi)) as u16;
    let x = clamp(rect.x, bounds.x, bounds.right());
    let y = clamp(rect.y, bounds.y, bounds.bottom());
    let right = clamp(rect.right(), x, bounds.right());
    let bottom = clamp(rect.bottom(), y, bounds.bottom());
    Rect::new(x, y, right - x, bottom - y)
}

fn to_tui_point(point: Point, bounds: Rect) -> (u16, u16) {
    let x = point.x.clamp(i32::from(bounds.x), i32::from(bounds.right())) as u16;
    let y = point.y.clamp(i32::from(bounds.y), i32::from(bounds.bottom())) as u16;
    (x, y)
}
