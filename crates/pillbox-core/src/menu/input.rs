//! Host-neutral input events.
//!
//! Hosts translate their native key and mouse events into these types, so
//! the engine never depends on a particular terminal or windowing crate.

use super::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Tab,
    BackTab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Home,
    End,
    Char(char),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
    };

    pub fn any(self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

/// A key press with its modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub const fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub const fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::NONE)
    }
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        Self::plain(key)
    }
}

/// Pointer interaction with a popup. Option indices are resolved by the
/// host's hit testing; `Down` carries raw coordinates so clicks outside the
/// popup can be detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    /// Button pressed anywhere on screen.
    Down(Point),
    /// Pointer moved over option `index`.
    Hover(usize),
    /// Option `index` was clicked.
    Activate { index: usize, modifiers: Modifiers },
    /// One of a stepper's buttons was clicked; `delta` is -1 or +1.
    Step {
        index: usize,
        delta: i32,
        modifiers: Modifiers,
    },
    /// Horizontal drag over option `index`, `dx` cells since the last event.
    Drag {
        index: usize,
        dx: i32,
        modifiers: Modifiers,
    },
    /// Button released.
    Release,
}
