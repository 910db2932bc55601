//! Popup rendering shared by every menu, plus the preview overlay.

use pillbox_core::menu::{
    ControlKind, Menu, MenuOption, Preview, Role, Size, highlight_matches, place_overlay,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::{to_core, to_tui};
use crate::app::ActivePopup;

const MIN_WIDTH: u16 = 24;
const MAX_WIDTH: u16 = 60;
const OVERLAY_SIZE: Size = Size::new(30, 6);

/// Draw the open popup near `anchor`. Returns its outer area and the index
/// of the option in its first row.
pub fn render(
    frame: &mut Frame,
    active: &ActivePopup<'_>,
    anchor: (u16, u16),
    viewport: Rect,
) -> (Rect, usize) {
    match active {
        ActivePopup::Autocomplete(search) | ActivePopup::Search(search) => {
            render_menu(frame, search.menu(), search.query(), anchor, viewport)
        }
        ActivePopup::Browser(menu) => {
            render_menu(frame, menu, menu.filter_text(), anchor, viewport)
        }
        ActivePopup::Editor(menu) => render_menu(frame, menu, "", anchor, viewport),
    }
}

fn render_menu<A: Clone>(
    frame: &mut Frame,
    menu: &Menu<A>,
    query: &str,
    anchor: (u16, u16),
    viewport: Rect,
) -> (Rect, usize) {
    let options = menu.options();
    let content_width = options
        .iter()
        .map(|o| {
            let detail = o.detail.as_deref().map_or(0, |d| d.chars().count() + 4);
            o.label.chars().count() + detail + 4
        })
        .max()
        .unwrap_or(0);
    let width = (content_width as u16 + 2)
        .clamp(MIN_WIDTH, MAX_WIDTH)
        .min(viewport.width);
    let height = (options.len() as u16 + 2).min(viewport.height);
    let area = popup_area(anchor, width, height, viewport);

    let rows = usize::from(area.height.saturating_sub(2));
    let first = first_visible(menu.highlighted(), rows);
    let inner_width = usize::from(area.width.saturating_sub(2));
    let lines: Vec<Line> = options
        .iter()
        .enumerate()
        .skip(first)
        .take(rows)
        .map(|(index, option)| {
            option_line(
                option,
                menu.filter_text(),
                query,
                menu.highlighted() == Some(index),
                inner_width,
            )
        })
        .collect();

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    if menu.preview_loading() {
        block = block.title_bottom(" loading preview… ");
    }
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(lines).block(block), area);

    if let Some(preview) = menu.preview() {
        render_preview(frame, preview, area, viewport);
    }
    (area, first)
}

/// Below-right of the anchor, shifted to stay on screen.
fn popup_area(anchor: (u16, u16), width: u16, height: u16, viewport: Rect) -> Rect {
    let x = anchor.0.min(viewport.right().saturating_sub(width)).max(viewport.x);
    let y = anchor.1.min(viewport.bottom().saturating_sub(height)).max(viewport.y);
    Rect::new(x, y, width, height)
}

/// First option row so the highlighted option is visible.
fn first_visible(highlighted: Option<usize>, rows: usize) -> usize {
    match highlighted {
        Some(index) if rows > 0 && index >= rows => index + 1 - rows,
        _ => 0,
    }
}

fn option_line<A>(
    option: &MenuOption<A>,
    filter_text: &str,
    query: &str,
    highlighted: bool,
    width: usize,
) -> Line<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut spans: Vec<Span<'static>> = match option.role {
        Role::FilterInput if filter_text.is_empty() => {
            vec![Span::raw("> "), Span::styled(option.label.clone(), dim)]
        }
        Role::FilterInput => vec![Span::raw(format!("> {filter_text}"))],
        Role::Separator => return Line::styled("─".repeat(width), dim),
        Role::Title => vec![Span::styled(
            option.label.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )],
        Role::DisabledDisplay => vec![Span::styled(
            option.label.clone(),
            dim.add_modifier(Modifier::ITALIC),
        )],
        Role::Action => vec![Span::styled(
            option.label.clone(),
            Style::default().fg(Color::Cyan),
        )],
        Role::Control(ControlKind::Pills) => {
            let mark = if option.disabled {
                "·"
            } else if option.detail.as_deref() == Some("on") {
                "[x]"
            } else {
                "[ ]"
            };
            return finish(
                vec![Span::raw(format!("{mark} {}", option.label))],
                None,
                option.disabled,
                highlighted,
                width,
            );
        }
        Role::Control(ControlKind::Stepper) => {
            let value = option.detail.clone().unwrap_or_default();
            return finish(
                vec![Span::raw(option.label.clone())],
                Some(format!("◂ {value} ▸")),
                option.disabled,
                highlighted,
                width,
            );
        }
        Role::Control(ControlKind::NameShortcut) => vec![Span::styled(
            format!("{} ›", option.label),
            Style::default().add_modifier(Modifier::UNDERLINED),
        )],
        Role::Normal => {
            let mut spans = emphasized(&option.label, query, Style::default());
            if !option.aliases.is_empty() {
                spans.push(Span::styled(" (", dim));
                for (i, alias) in option.aliases.iter().enumerate() {
                    if i > 0 {
                        spans.push(Span::styled(", ", dim));
                    }
                    spans.extend(emphasized(alias, query, dim));
                }
                spans.push(Span::styled(")", dim));
            }
            spans
        }
    };
    if option.role == Role::FilterInput {
        spans.push(Span::styled("▏", dim));
    }
    finish(
        spans,
        option.detail.clone(),
        option.disabled,
        highlighted,
        width,
    )
}

/// Split `text` into spans with the parts matching `query` emphasized.
fn emphasized(text: &str, query: &str, base: Style) -> Vec<Span<'static>> {
    highlight_matches(text, query)
        .into_iter()
        .map(|segment| {
            if segment.emphasized {
                Span::styled(
                    segment.text,
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )
            } else {
                Span::styled(segment.text, base)
            }
        })
        .collect()
}

/// Right-align `detail` and apply the row-wide styles.
fn finish(
    mut spans: Vec<Span<'static>>,
    detail: Option<String>,
    disabled: bool,
    highlighted: bool,
    width: usize,
) -> Line<'static> {
    if let Some(detail) = detail {
        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let pad = width.saturating_sub(used + detail.chars().count()).max(2);
        spans.push(Span::raw(" ".repeat(pad)));
        spans.push(Span::styled(detail, Style::default().fg(Color::DarkGray)));
    }
    let mut line = Line::from(spans);
    if disabled {
        line = line.patch_style(Style::default().fg(Color::DarkGray));
    }
    if highlighted {
        line = line.patch_style(Style::default().add_modifier(Modifier::REVERSED));
    }
    line
}

fn render_preview(frame: &mut Frame, preview: &Preview, popup: Rect, viewport: Rect) {
    let placed = place_overlay(to_core(popup), OVERLAY_SIZE, to_core(viewport));
    let area = to_tui(placed, viewport);
    let image = &preview.image;
    let lines = vec![
        Line::from(preview.target.name.clone()),
        Line::styled(
            format!("{} {}x{}", image.format, image.width(), image.height()),
            Style::default().fg(Color::Yellow),
        ),
        Line::styled(
            format!("{} bytes", image.bytes.len()),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    let block = Block::default()
        .title(" preview ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_first_visible_keeps_highlight_on_screen() {
        assert_eq!(first_visible(None, 5), 0);
        assert_eq!(first_visible(Some(4), 5), 0);
        assert_eq!(first_visible(Some(7), 5), 3);
    }

    #[test]
    fn test_popup_area_stays_on_screen() {
        let viewport = Rect::new(0, 0, 80, 24);
        assert_eq!(popup_area((10, 5), 30, 8, viewport), Rect::new(10, 5, 30, 8));
        assert_eq!(popup_area((70, 20), 30, 8, viewport), Rect::new(50, 16, 30, 8));
    }

    #[test]
    fn test_detail_is_right_aligned() {
        let option = MenuOption::normal("blue_sky", ()).with_detail("900");
        let line = option_line(&option, "", "sky", false, 20);
        assert_eq!(text(&line), "blue_sky         900");
        assert_eq!(line.spans[1].content, "sky");
    }

    #[test]
    fn test_alias_matches_are_emphasized() {
        let option = MenuOption::normal("blue_sky", ())
            .with_aliases(vec!["sky_blue".into(), "azure".into()])
            .with_detail("42");
        let line = option_line(&option, "", "azure", false, 40);
        assert_eq!(text(&line), "blue_sky (sky_blue, azure)            42");

        let hits: Vec<&str> = line
            .spans
            .iter()
            .filter(|s| s.style.add_modifier.contains(Modifier::BOLD))
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(hits, vec!["azure"]);
    }

    #[test]
    fn test_stepper_and_pill_rows() {
        let stepper =
            MenuOption::control(ControlKind::Stepper, "strength", ()).with_detail("1.05");
        assert_eq!(text(&option_line(&stepper, "", "", false, 20)), "strength    ◂ 1.05 ▸");

        let pill = MenuOption::control(ControlKind::Pills, "ink", ()).with_detail("on");
        assert_eq!(text(&option_line(&pill, "", "", false, 20)), "[x] ink");
    }

    #[test]
    fn test_filter_row_shows_placeholder_until_typed() {
        let filter = MenuOption::<()>::filter_input("filter");
        assert_eq!(text(&option_line(&filter, "", "", false, 20)), "> filter▏");
        assert_eq!(text(&option_line(&filter, "oil", "", false, 20)), "> oil▏");
    }
}
