//! Headless popup menu engine.
//!
//! A [`Menu`] is an ordered list of [`MenuOption`]s with a highlight, an
//! optional filter input and an optional preview overlay. Hosts route key
//! and pointer input into it and get back a [`MenuEvent`]; the menu never
//! calls back into the host. The variants in [`browser`], [`search`] and
//! [`quick_edit`] wrap a `Menu` and translate its events into typed
//! outcomes.
//!
//! Only one menu can be open at a time. Each menu holds a
//! [`MenuCoordinator`] handle, and opening one revokes the registration of
//! whichever menu was open before.

pub mod browser;
pub mod coordinator;
pub mod geometry;
pub mod input;
pub mod preview;
pub mod quick_edit;
pub mod search;

pub use browser::{BrowseRequest, BrowseTicket, BrowserAction, BrowserOutcome, FileBrowser};
pub use coordinator::{MenuCoordinator, Registration};
pub use geometry::{Point, Rect, Size};
pub use input::{Key, KeyInput, Modifiers, PointerEvent};
pub use preview::{
    Preview, PreviewRequest, PreviewResponse, PreviewSlot, PreviewTarget, place_overlay,
};
pub use quick_edit::{EditAction, EditOutcome, PanelRequest, PanelResponse, QuickEditor};
pub use search::{SearchAction, SearchMode, SearchOutcome, SearchRequest, SearchTicket, TagSearch};

/// Special controls rendered by the quick editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Numeric value with decrement/increment buttons and drag support.
    Stepper,
    /// A toggle-able pill in a pill panel.
    Pills,
    /// Shows a name and opens a browser when activated.
    NameShortcut,
}

/// Structural role of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Normal,
    Action,
    FilterInput,
    Separator,
    Title,
    DisabledDisplay,
    Control(ControlKind),
}

impl Role {
    /// Whether keyboard navigation may land on this role.
    pub fn is_selectable(self) -> bool {
        matches!(self, Role::Normal | Role::Action | Role::Control(_))
    }
}

/// One row of a popup.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuOption<A> {
    pub label: String,
    /// Secondary text (counts, extensions).
    pub detail: Option<String>,
    /// Alternate names, rendered after the label and highlighted like it.
    pub aliases: Vec<String>,
    pub role: Role,
    pub disabled: bool,
    pub action: Option<A>,
    pub preview: Option<PreviewTarget>,
}

impl<A> MenuOption<A> {
    fn with_role(role: Role, label: impl Into<String>, action: Option<A>) -> Self {
        Self {
            label: label.into(),
            detail: None,
            aliases: Vec::new(),
            role,
            disabled: false,
            action,
            preview: None,
        }
    }

    pub fn normal(label: impl Into<String>, action: A) -> Self {
        Self::with_role(Role::Normal, label, Some(action))
    }

    pub fn action(label: impl Into<String>, action: A) -> Self {
        Self::with_role(Role::Action, label, Some(action))
    }

    pub fn control(kind: ControlKind, label: impl Into<String>, action: A) -> Self {
        Self::with_role(Role::Control(kind), label, Some(action))
    }

    pub fn filter_input(placeholder: impl Into<String>) -> Self {
        Self::with_role(Role::FilterInput, placeholder, None)
    }

    pub fn separator() -> Self {
        Self::with_role(Role::Separator, "", None)
    }

    pub fn title(label: impl Into<String>) -> Self {
        Self::with_role(Role::Title, label, None)
    }

    pub fn display(label: impl Into<String>) -> Self {
        Self::with_role(Role::DisabledDisplay, label, None)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_preview(mut self, target: PreviewTarget) -> Self {
        self.preview = Some(target);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn is_navigable(&self) -> bool {
        self.role.is_selectable() && !self.disabled
    }
}

/// What a menu did with one input event.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuEvent<A> {
    /// An option was chosen by Enter or pointer.
    Activated {
        index: usize,
        action: A,
        modifiers: Modifiers,
    },
    /// Enter in the filter input with nothing highlighted.
    Submitted(String),
    FilterChanged(String),
    /// A stepper control was nudged by `delta_steps`.
    Adjust {
        index: usize,
        delta_steps: i32,
        large: bool,
    },
    Highlighted(Option<usize>),
    Closed,
    /// Consumed with no further effect.
    Handled,
    /// Not for this menu; the host may process it.
    Ignored,
}

const NAVIGATION_KEYS: [Key; 6] = [
    Key::Up,
    Key::Down,
    Key::Tab,
    Key::BackTab,
    Key::Enter,
    Key::Escape,
];

const DEFAULT_DRAG_PIXELS: i32 = 8;

/// A single popup instance.
#[derive(Debug)]
pub struct Menu<A> {
    coordinator: MenuCoordinator,
    registration: Option<Registration>,
    options: Vec<MenuOption<A>>,
    highlighted: Option<usize>,
    filter_text: String,
    filter_focused: bool,
    override_keys: Vec<Key>,
    bounds: Option<Rect>,
    preview: PreviewSlot,
    drag_pixels: i32,
    drag: Option<(usize, i32)>,
}

impl<A: Clone> Menu<A> {
    pub fn new(coordinator: MenuCoordinator) -> Self {
        Self {
            coordinator,
            registration: None,
            options: Vec::new(),
            highlighted: None,
            filter_text: String::new(),
            filter_focused: false,
            override_keys: Vec::new(),
            bounds: None,
            preview: PreviewSlot::default(),
            drag_pixels: DEFAULT_DRAG_PIXELS,
            drag: None,
        }
    }

    /// Keys forwarded to the menu even while the filter input has focus.
    pub fn with_override_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.override_keys = keys.into_iter().collect();
        self
    }

    /// Drag distance that counts as one stepper step.
    pub fn with_drag_pixels(mut self, pixels: i32) -> Self {
        self.drag_pixels = pixels.max(1);
        self
    }

    pub fn coordinator(&self) -> &MenuCoordinator {
        &self.coordinator
    }

    /// Open with `options`, closing whichever menu held the active slot.
    pub fn open(&mut self, options: Vec<MenuOption<A>>) {
        self.registration = Some(self.coordinator.register());
        self.reset();
        self.filter_focused = options.iter().any(|o| o.role == Role::FilterInput);
        self.options = options;
    }

    /// Close and release the active slot. Returns whether it was open.
    pub fn close(&mut self) -> bool {
        let was_open = self.is_open();
        if let Some(registration) = self.registration.take() {
            registration.revoke();
        }
        self.reset();
        self.options.clear();
        was_open
    }

    fn reset(&mut self) {
        self.highlighted = None;
        self.filter_text.clear();
        self.filter_focused = false;
        self.drag = None;
        self.preview.clear();
    }

    pub fn is_open(&self) -> bool {
        self.registration.as_ref().is_some_and(Registration::is_active)
    }

    /// Tear down local state if another menu took the slot.
    fn ensure_live(&mut self) -> bool {
        if self.is_open() {
            return true;
        }
        if self.registration.take().is_some() {
            self.reset();
            self.options.clear();
        }
        false
    }

    pub fn options(&self) -> &[MenuOption<A>] {
        &self.options
    }

    pub fn option(&self, index: usize) -> Option<&MenuOption<A>> {
        self.options.get(index)
    }

    /// Replace the options and clear the highlight.
    pub fn set_options(&mut self, options: Vec<MenuOption<A>>) {
        self.options = options;
        self.set_highlighted(None);
    }

    /// Replace the options, keeping the highlight near its old index.
    pub fn set_options_keep_highlight(&mut self, options: Vec<MenuOption<A>>, index: Option<usize>) {
        self.options = options;
        let Some(index) = index.or(self.highlighted) else {
            self.set_highlighted(None);
            return;
        };
        let last = self.options.len().saturating_sub(1);
        let start = index.min(last);
        let target = (0..=start)
            .rev()
            .chain(start + 1..self.options.len())
            .find(|&i| self.options[i].is_navigable());
        self.highlighted = None;
        self.set_highlighted(target);
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn highlighted_option(&self) -> Option<&MenuOption<A>> {
        self.highlighted.and_then(|i| self.options.get(i))
    }

    /// Move the highlight, requesting a preview when the new option has
    /// one. Returns whether the highlight changed.
    pub fn set_highlighted(&mut self, index: Option<usize>) -> bool {
        let index = index.filter(|&i| self.options.get(i).is_some_and(MenuOption::is_navigable));
        if index == self.highlighted {
            return false;
        }
        self.highlighted = index;
        self.drag = None;
        match index.and_then(|i| self.options[i].preview.clone()) {
            Some(target) => self.preview.request(target),
            None => self.preview.clear(),
        }
        true
    }

    fn step_highlight(&mut self, forward: bool) -> Option<usize> {
        let len = self.options.len();
        if len == 0 {
            return None;
        }
        let mut cursor = self.highlighted;
        for _ in 0..len {
            let next = match (cursor, forward) {
                (None, true) => 0,
                (None, false) => len - 1,
                (Some(i), true) => (i + 1) % len,
                (Some(i), false) => (i + len - 1) % len,
            };
            if self.options[next].is_navigable() {
                self.set_highlighted(Some(next));
                return Some(next);
            }
            cursor = Some(next);
        }
        self.highlighted
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn set_filter_text(&mut self, text: impl Into<String>) {
        self.filter_text = text.into();
    }

    pub fn filter_focused(&self) -> bool {
        self.filter_focused
    }

    pub fn focus_filter(&mut self, focused: bool) {
        self.filter_focused = focused && self.options.iter().any(|o| o.role == Role::FilterInput);
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Record where the host drew the popup, for outside-click detection.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = Some(bounds);
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.shown()
    }

    pub fn preview_loading(&self) -> bool {
        self.preview.is_loading()
    }

    pub fn take_preview_request(&mut self) -> Option<PreviewRequest> {
        if !self.is_open() {
            return None;
        }
        self.preview.take_request()
    }

    pub fn apply_preview(&mut self, response: PreviewResponse) -> bool {
        self.ensure_live() && self.preview.apply(response)
    }

    fn activate(&mut self, index: usize, modifiers: Modifiers) -> MenuEvent<A> {
        let Some(option) = self.options.get(index) else {
            return MenuEvent::Ignored;
        };
        if !option.is_navigable() {
            return MenuEvent::Handled;
        }
        let Some(action) = option.action.clone() else {
            return MenuEvent::Handled;
        };
        self.set_highlighted(Some(index));
        MenuEvent::Activated {
            index,
            action,
            modifiers,
        }
    }

    fn is_stepper(&self, index: usize) -> bool {
        self.options
            .get(index)
            .is_some_and(|o| o.role == Role::Control(ControlKind::Stepper) && !o.disabled)
    }

    pub fn handle_key(&mut self, input: KeyInput) -> MenuEvent<A> {
        if !self.ensure_live() {
            return MenuEvent::Ignored;
        }
        let KeyInput { key, modifiers } = input;

        if self.filter_focused
            && !NAVIGATION_KEYS.contains(&key)
            && !self.override_keys.contains(&key)
        {
            return self.edit_filter(input);
        }

        match key {
            Key::Up | Key::BackTab => MenuEvent::Highlighted(self.step_highlight(false)),
            Key::Tab if modifiers.shift => MenuEvent::Highlighted(self.step_highlight(false)),
            Key::Down | Key::Tab => MenuEvent::Highlighted(self.step_highlight(true)),
            Key::Enter => match self.highlighted {
                Some(index) => self.activate(index, modifiers),
                None if self.filter_focused && !self.filter_text.trim().is_empty() => {
                    MenuEvent::Submitted(self.filter_text.trim().to_string())
                }
                None => MenuEvent::Handled,
            },
            Key::Escape => {
                self.close();
                MenuEvent::Closed
            }
            Key::Left | Key::Right => match self.highlighted {
                Some(index) if self.is_stepper(index) => MenuEvent::Adjust {
                    index,
                    delta_steps: if key == Key::Left { -1 } else { 1 },
                    large: modifiers.any(),
                },
                _ => MenuEvent::Ignored,
            },
            _ => MenuEvent::Ignored,
        }
    }

    fn edit_filter(&mut self, input: KeyInput) -> MenuEvent<A> {
        match input.key {
            Key::Char(c) if !input.modifiers.ctrl && !input.modifiers.alt => {
                self.filter_text.push(c);
            }
            Key::Backspace => {
                if self.filter_text.pop().is_none() {
                    return MenuEvent::Handled;
                }
            }
            _ => return MenuEvent::Ignored,
        }
        self.set_highlighted(None);
        MenuEvent::FilterChanged(self.filter_text.clone())
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> MenuEvent<A> {
        if !self.ensure_live() {
            return MenuEvent::Ignored;
        }
        match event {
            PointerEvent::Down(point) => match self.bounds {
                Some(bounds) if !bounds.contains(point) => {
                    self.close();
                    MenuEvent::Closed
                }
                _ => MenuEvent::Ignored,
            },
            PointerEvent::Hover(index) => {
                let navigable = self.options.get(index).is_some_and(MenuOption::is_navigable);
                if navigable && self.set_highlighted(Some(index)) {
                    MenuEvent::Highlighted(Some(index))
                } else {
                    MenuEvent::Handled
                }
            }
            PointerEvent::Activate { index, modifiers } => self.activate(index, modifiers),
            PointerEvent::Step {
                index,
                delta,
                modifiers,
            } if self.is_stepper(index) => {
                self.set_highlighted(Some(index));
                MenuEvent::Adjust {
                    index,
                    delta_steps: delta.signum(),
                    large: modifiers.any(),
                }
            }
            PointerEvent::Drag {
                index,
                dx,
                modifiers,
            } if self.is_stepper(index) => {
                if self.highlighted != Some(index) {
                    self.set_highlighted(Some(index));
                }
                let accumulated = match self.drag {
                    Some((i, residual)) if i == index => residual + dx,
                    _ => dx,
                };
                let steps = accumulated / self.drag_pixels;
                self.drag = Some((index, accumulated % self.drag_pixels));
                if steps == 0 {
                    MenuEvent::Handled
                } else {
                    MenuEvent::Adjust {
                        index,
                        delta_steps: steps,
                        large: modifiers.any(),
                    }
                }
            }
            PointerEvent::Release => {
                self.drag = None;
                MenuEvent::Handled
            }
            PointerEvent::Step { .. } | PointerEvent::Drag { .. } => MenuEvent::Handled,
        }
    }
}

/// A run of text, emphasized when it matches the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub emphasized: bool,
}

/// Split `text` into segments, emphasizing every case-insensitive
/// occurrence of `query`.
pub fn highlight_matches(text: &str, query: &str) -> Vec<Segment> {
    let hay: Vec<char> = text.chars().collect();
    let needle: Vec<char> = query.trim().chars().collect();
    let eq = |a: char, b: char| a == b || a.to_lowercase().eq(b.to_lowercase());

    let mut segments: Vec<Segment> = Vec::new();
    let mut push = |chars: &[char], emphasized: bool| {
        if chars.is_empty() {
            return;
        }
        let text: String = chars.iter().collect();
        match segments.last_mut() {
            Some(last) if last.emphasized == emphasized => last.text.push_str(&text),
            _ => segments.push(Segment { text, emphasized }),
        }
    };

    if needle.is_empty() || needle.len() > hay.len() {
        push(&hay, false);
        return segments;
    }

    let mut plain_start = 0;
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        let hit = hay[i..i + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(&a, &b)| eq(a, b));
        if hit {
            push(&hay[plain_start..i], false);
            push(&hay[i..i + needle.len()], true);
            i += needle.len();
            plain_start = i;
        } else {
            i += 1;
        }
    }
    push(&hay[plain_start..], false);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(disabled: &[usize]) -> Vec<MenuOption<usize>> {
        (1..=5)
            .map(|n| {
                let option = MenuOption::normal(format!("option {n}"), n);
                if disabled.contains(&n) {
                    option.disabled()
                } else {
                    option
                }
            })
            .collect()
    }

    fn open_menu(options: Vec<MenuOption<usize>>) -> Menu<usize> {
        let mut menu = Menu::new(MenuCoordinator::new());
        menu.open(options);
        menu
    }

    fn down(menu: &mut Menu<usize>) -> Option<usize> {
        match menu.handle_key(Key::Down.into()) {
            MenuEvent::Highlighted(index) => index,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_down_skips_disabled_and_wraps() {
        let mut menu = open_menu(numbered(&[2, 4]));
        assert_eq!(menu.highlighted(), None);

        // Indices are zero-based: options 1, 3, 5, then 1 again.
        assert_eq!(down(&mut menu), Some(0));
        assert_eq!(down(&mut menu), Some(2));
        assert_eq!(down(&mut menu), Some(4));
        assert_eq!(down(&mut menu), Some(0));
    }

    #[test]
    fn test_up_from_none_starts_at_end() {
        let mut menu = open_menu(numbered(&[5]));
        assert_eq!(
            menu.handle_key(Key::Up.into()),
            MenuEvent::Highlighted(Some(3))
        );
        assert_eq!(
            menu.handle_key(KeyInput::new(Key::Tab, Modifiers::SHIFT)),
            MenuEvent::Highlighted(Some(2))
        );
    }

    #[test]
    fn test_navigation_skips_structural_roles() {
        let mut menu = open_menu(vec![
            MenuOption::title("Pick one"),
            MenuOption::normal("a", 1),
            MenuOption::separator(),
            MenuOption::display("(nothing here)"),
            MenuOption::action("b", 2),
        ]);
        assert_eq!(down(&mut menu), Some(1));
        assert_eq!(down(&mut menu), Some(4));
        assert_eq!(down(&mut menu), Some(1));
    }

    #[test]
    fn test_all_disabled_highlights_nothing() {
        let mut menu = open_menu(numbered(&[1, 2, 3, 4, 5]));
        assert_eq!(down(&mut menu), None);
    }

    #[test]
    fn test_enter_activates_highlighted() {
        let mut menu = open_menu(numbered(&[]));
        down(&mut menu);
        down(&mut menu);
        assert_eq!(
            menu.handle_key(KeyInput::new(Key::Enter, Modifiers::CTRL)),
            MenuEvent::Activated {
                index: 1,
                action: 2,
                modifiers: Modifiers::CTRL
            }
        );
    }

    #[test]
    fn test_disabled_option_cannot_be_activated() {
        let mut menu = open_menu(numbered(&[2]));
        assert_eq!(
            menu.handle_pointer(PointerEvent::Activate {
                index: 1,
                modifiers: Modifiers::NONE
            }),
            MenuEvent::Handled
        );
        assert_eq!(menu.highlighted(), None);
    }

    #[test]
    fn test_escape_closes_and_is_idempotent() {
        let mut menu = open_menu(numbered(&[]));
        assert_eq!(menu.handle_key(Key::Escape.into()), MenuEvent::Closed);
        assert!(!menu.is_open());
        assert!(!menu.close());
        assert_eq!(menu.handle_key(Key::Down.into()), MenuEvent::Ignored);
    }

    #[test]
    fn test_opening_second_menu_closes_first() {
        let coordinator = MenuCoordinator::new();
        let mut first: Menu<usize> = Menu::new(coordinator.clone());
        let mut second: Menu<usize> = Menu::new(coordinator.clone());

        first.open(numbered(&[]));
        down(&mut first);
        second.open(numbered(&[]));

        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(first.handle_key(Key::Enter.into()), MenuEvent::Ignored);
        assert_eq!(first.highlighted(), None);

        // Closing the stale menu must not release the live one.
        first.close();
        assert!(second.is_open());
    }

    #[test]
    fn test_filter_captures_text_keys() {
        let mut menu = open_menu(vec![
            MenuOption::filter_input("search"),
            MenuOption::normal("a", 1),
        ]);
        assert!(menu.filter_focused());

        assert_eq!(
            menu.handle_key(Key::Char('h').into()),
            MenuEvent::FilterChanged("h".into())
        );
        menu.handle_key(Key::Char('i').into());
        assert_eq!(
            menu.handle_key(Key::Backspace.into()),
            MenuEvent::FilterChanged("h".into())
        );
        // Left is not reserved and not an override: left to the text field.
        assert_eq!(menu.handle_key(Key::Left.into()), MenuEvent::Ignored);
        // Navigation still reaches the menu.
        assert_eq!(down(&mut menu), Some(1));
    }

    #[test]
    fn test_enter_in_filter_with_no_highlight_submits() {
        let mut menu = open_menu(vec![MenuOption::filter_input("search")]);
        assert_eq!(menu.handle_key(Key::Enter.into()), MenuEvent::Handled);
        for c in "new tag ".chars() {
            menu.handle_key(Key::Char(c).into());
        }
        assert_eq!(
            menu.handle_key(Key::Enter.into()),
            MenuEvent::Submitted("new tag".into())
        );
    }

    #[test]
    fn test_override_keys_reach_stepper_while_typing() {
        let mut menu: Menu<usize> = Menu::new(MenuCoordinator::new())
            .with_override_keys([Key::Left, Key::Right]);
        menu.open(vec![
            MenuOption::filter_input("name"),
            MenuOption::control(ControlKind::Stepper, "strength", 0),
        ]);
        down(&mut menu);
        assert_eq!(
            menu.handle_key(KeyInput::new(Key::Right, Modifiers::SHIFT)),
            MenuEvent::Adjust {
                index: 1,
                delta_steps: 1,
                large: true
            }
        );
        assert_eq!(
            menu.handle_key(Key::Left.into()),
            MenuEvent::Adjust {
                index: 1,
                delta_steps: -1,
                large: false
            }
        );
    }

    #[test]
    fn test_pointer_hover_and_outside_click() {
        let mut menu = open_menu(numbered(&[3]));
        menu.set_bounds(Rect::new(10, 10, 20, 5));

        assert_eq!(
            menu.handle_pointer(PointerEvent::Hover(1)),
            MenuEvent::Highlighted(Some(1))
        );
        assert_eq!(menu.handle_pointer(PointerEvent::Hover(2)), MenuEvent::Handled);
        assert_eq!(menu.highlighted(), Some(1));

        assert_eq!(
            menu.handle_pointer(PointerEvent::Down(Point::new(12, 11))),
            MenuEvent::Ignored
        );
        assert_eq!(
            menu.handle_pointer(PointerEvent::Down(Point::new(0, 0))),
            MenuEvent::Closed
        );
        assert!(!menu.is_open());
    }

    #[test]
    fn test_drag_accumulates_into_steps() {
        let mut menu: Menu<usize> = Menu::new(MenuCoordinator::new()).with_drag_pixels(4);
        menu.open(vec![MenuOption::control(ControlKind::Stepper, "s", 0)]);
        let drag = |dx| PointerEvent::Drag {
            index: 0,
            dx,
            modifiers: Modifiers::NONE,
        };

        assert_eq!(menu.handle_pointer(drag(3)), MenuEvent::Handled);
        assert_eq!(
            menu.handle_pointer(drag(6)),
            MenuEvent::Adjust {
                index: 0,
                delta_steps: 2,
                large: false
            }
        );
        assert_eq!(
            menu.handle_pointer(drag(-5)),
            MenuEvent::Adjust {
                index: 0,
                delta_steps: -1,
                large: false
            }
        );
        menu.handle_pointer(PointerEvent::Release);
        assert_eq!(menu.handle_pointer(drag(3)), MenuEvent::Handled);
    }

    #[test]
    fn test_highlight_requests_preview_and_clears_previous() {
        let mut menu: Menu<usize> = Menu::new(MenuCoordinator::new());
        menu.open(vec![
            MenuOption::normal("a", 0)
                .with_preview(PreviewTarget::new(crate::api::AssetKind::Lora, "a")),
            MenuOption::normal("b", 1),
        ]);
        down(&mut menu);
        let request = menu.take_preview_request().unwrap();
        assert_eq!(request.target.name, "a");
        assert!(menu.preview_loading());

        down(&mut menu);
        assert!(menu.take_preview_request().is_none());
        assert!(!menu.preview_loading());
        assert!(!menu.apply_preview(PreviewResponse {
            generation: request.generation,
            image: Ok(None),
        }));
    }

    #[test]
    fn test_keep_highlight_clamps_when_list_shrinks() {
        let mut menu = open_menu(numbered(&[]));
        menu.set_highlighted(Some(4));
        menu.set_options_keep_highlight(numbered(&[3]).into_iter().take(3).collect(), None);
        assert_eq!(menu.highlighted(), Some(1));
    }

    #[test]
    fn test_highlight_matches_case_insensitive() {
        let segments = highlight_matches("Blue Sky blue", "blue");
        assert_eq!(
            segments,
            vec![
                Segment {
                    text: "Blue".into(),
                    emphasized: true
                },
                Segment {
                    text: " Sky ".into(),
                    emphasized: false
                },
                Segment {
                    text: "blue".into(),
                    emphasized: true
                },
            ]
        );
    }

    #[test]
    fn test_highlight_matches_no_query_or_no_hit() {
        assert_eq!(
            highlight_matches("sky", ""),
            vec![Segment {
                text: "sky".into(),
                emphasized: false
            }]
        );
        assert_eq!(highlight_matches("sky", "sea").len(), 1);
        assert!(highlight_matches("", "a").is_empty());
    }
}
