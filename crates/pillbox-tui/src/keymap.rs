//! Key translation.
//!
//! Crossterm events become engine [`KeyInput`]s for the prompt and popups.
//! The pill list has its own vim-style bindings, including the two-key
//! `gg` sequence.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pillbox_core::menu::{Key, KeyInput, Modifiers};

/// Translate a terminal key event. Keys the engine has no name for yield
/// `None`.
pub fn to_input(event: KeyEvent) -> Option<KeyInput> {
    let key = match event.code {
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Escape,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Char(c) => Key::Char(c),
        _ => return None,
    };
    let mut modifiers = to_modifiers(event.modifiers);
    modifiers.shift |= event.code == KeyCode::BackTab;
    Some(KeyInput::new(key, modifiers))
}

pub fn to_modifiers(modifiers: KeyModifiers) -> Modifiers {
    Modifiers {
        shift: modifiers.contains(KeyModifiers::SHIFT),
        ctrl: modifiers.contains(KeyModifiers::CONTROL),
        alt: modifiers.contains(KeyModifiers::ALT),
    }
}

/// A pill-list command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PillAction {
    Quit,
    Next,
    Prev,
    First,
    Last,
    Toggle,
    Delete,
    MoveDown,
    MoveUp,
    Edit,
    BrowseLoras,
    BrowseEmbeddings,
    Search,
    None,
}

/// Key mapper for the pill list, with support for `gg`.
pub struct KeyMapper {
    /// Pending first key of a two-key sequence.
    pending: Option<Key>,
}

impl KeyMapper {
    pub fn new() -> Self {
        Self { pending: None }
    }

    pub fn resolve(&mut self, input: KeyInput) -> PillAction {
        if let Some(prev) = self.pending.take() {
            return self.resolve_sequence(prev, input);
        }

        match input.key {
            Key::Char('q') => PillAction::Quit,

            Key::Char('j') | Key::Down => PillAction::Next,
            Key::Char('k') | Key::Up => PillAction::Prev,
            Key::Char('G') | Key::End => PillAction::Last,
            Key::Home => PillAction::First,

            Key::Char(' ') => PillAction::Toggle,
            Key::Char('d') | Key::Delete => PillAction::Delete,
            Key::Char('J') => PillAction::MoveDown,
            Key::Char('K') => PillAction::MoveUp,
            Key::Char('e') | Key::Enter => PillAction::Edit,
            Key::Char('b') => PillAction::BrowseLoras,
            Key::Char('m') => PillAction::BrowseEmbeddings,
            Key::Char('/') | Key::Char('a') => PillAction::Search,

            Key::Char('g') => {
                self.pending = Some(input.key);
                PillAction::None
            }

            _ => PillAction::None,
        }
    }

    fn resolve_sequence(&mut self, first: Key, second: KeyInput) -> PillAction {
        match (first, second.key) {
            (Key::Char('g'), Key::Char('g')) => PillAction::First,
            _ => self.resolve(second),
        }
    }
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn press(c: char) -> KeyInput {
        KeyInput::plain(Key::Char(c))
    }

    #[test]
    fn test_to_input_modifiers() {
        let input = to_input(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL)).unwrap();
        assert_eq!(input.key, Key::Char('x'));
        assert!(input.modifiers.ctrl);
        assert!(!input.modifiers.shift);

        let back = to_input(KeyEvent::new(KeyCode::BackTab, KeyModifiers::NONE)).unwrap();
        assert_eq!(back.key, Key::BackTab);
        assert!(back.modifiers.shift);

        assert_eq!(to_input(KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_pill_keys() {
        let mut km = KeyMapper::new();
        assert_eq!(km.resolve(press(' ')), PillAction::Toggle);
        assert_eq!(km.resolve(press('d')), PillAction::Delete);
        assert_eq!(km.resolve(press('J')), PillAction::MoveDown);
        assert_eq!(km.resolve(press('K')), PillAction::MoveUp);
        assert_eq!(km.resolve(press('e')), PillAction::Edit);
        assert_eq!(km.resolve(press('b')), PillAction::BrowseLoras);
        assert_eq!(km.resolve(KeyInput::plain(Key::Down)), PillAction::Next);
    }

    #[test]
    fn test_gg_sequence() {
        let mut km = KeyMapper::new();
        assert_eq!(km.resolve(press('g')), PillAction::None);
        assert_eq!(km.resolve(press('g')), PillAction::First);
    }

    #[test]
    fn test_invalid_sequence_falls_through() {
        let mut km = KeyMapper::new();
        assert_eq!(km.resolve(press('g')), PillAction::None);
        assert_eq!(km.resolve(press('j')), PillAction::Next);
    }
}
