//! Locating the caret on screen.
//!
//! The host's text surface soft-wraps at its width. To put the popup under
//! the word being typed we replay the same wrapping off-screen with the
//! surface's character metrics.

use unicode_width::UnicodeWidthChar;

use crate::menu::Point;

/// Character metrics of a text surface.
pub trait CaretMetrics: Send + Sync {
    /// Width of `c` in layout units.
    fn char_width(&self, c: char) -> i32;

    fn line_height(&self) -> i32 {
        1
    }
}

/// Terminal cell widths: wide (CJK, emoji) characters take two cells,
/// combining marks none, tabs four.
#[derive(Debug, Clone, Copy, Default)]
pub struct Monospace;

impl CaretMetrics for Monospace {
    fn char_width(&self, c: char) -> i32 {
        match c {
            '\t' => 4,
            c => c.width().unwrap_or(0) as i32,
        }
    }
}

/// Where the surface is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceGeometry {
    /// Top-left of the text area.
    pub origin: Point,
    /// Wrap width in layout units.
    pub width: i32,
    /// Visual lines scrolled out of view above the origin.
    pub scroll: i32,
}

/// Visual line and column of a char index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualPosition {
    pub line: i32,
    pub column: i32,
}

/// Replay soft wrapping up to char index `index`.
pub fn visual_position(
    text: &str,
    index: usize,
    width: i32,
    metrics: &dyn CaretMetrics,
) -> VisualPosition {
    let width = width.max(1);
    let mut line = 0;
    let mut column = 0;
    for c in text.chars().take(index) {
        if c == '\n' {
            line += 1;
            column = 0;
            continue;
        }
        let w = metrics.char_width(c);
        if column > 0 && column + w > width {
            line += 1;
            column = 0;
        }
        column += w;
    }
    if column >= width {
        line += 1;
        column = 0;
    }
    VisualPosition { line, column }
}

/// Screen anchor for a popup tracking the word `word_start..caret`.
///
/// Normally the word's first cell. When the word wraps across lines, the
/// anchor falls back to the surface's left edge on the caret's line.
pub fn caret_anchor(
    text: &str,
    word_start: usize,
    caret: usize,
    geometry: &SurfaceGeometry,
    metrics: &dyn CaretMetrics,
) -> Point {
    let start = visual_position(text, word_start, geometry.width, metrics);
    let end = visual_position(text, caret, geometry.width, metrics);
    let line_height = metrics.line_height();

    let (column, line) = if start.line != end.line {
        (0, end.line)
    } else {
        (start.column, start.line)
    };
    Point::new(
        geometry.origin.x + column,
        geometry.origin.y + (line - geometry.scroll) * line_height,
    )
}
