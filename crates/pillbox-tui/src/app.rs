//! TUI application state and event handling.
//!
//! The app owns the prompt surface, the pill list and one instance of each
//! popup. Everything here is synchronous: lookups leave as [`Job`]s that
//! the event loop runs on the runtime, and come back as [`Delivery`]s whose
//! stale tickets the popups drop on their own.

use std::time::Instant;

use pillbox_config::AppConfig;
use pillbox_core::autocomplete::{
    CaretAutocomplete, InputKind, KeyDisposition, SurfaceGeometry, SurfaceId, TextSurface,
};
use pillbox_core::codec::{format_text, parse_token};
use pillbox_core::menu::{
    BrowseRequest, BrowseTicket, BrowserAction, BrowserOutcome, ControlKind, EditAction,
    EditOutcome, FileBrowser, Key, KeyInput, Menu, MenuCoordinator, Modifiers, PanelRequest,
    PanelResponse, Point, PointerEvent, PreviewRequest, PreviewResponse, QuickEditor, Rect, Role,
    SearchMode, SearchOutcome, SearchRequest, SearchTicket, TagSearch,
};
use pillbox_core::notify::Notification;
use pillbox_core::{
    AssetApi, AssetKind, CachedGroupResolver, NotificationReader, Tag, TagCollection, parse_text,
    serialize,
};
use tracing::debug;

use crate::keymap::{KeyMapper, PillAction};

const PROMPT_SURFACE: SurfaceId = 1;

/// Which pane receives keys when no popup is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Prompt,
    Pills,
}

/// Async work for the event loop.
#[derive(Debug)]
pub enum Job {
    Autocomplete(SearchRequest),
    Search(SearchRequest),
    Browse(BrowseRequest),
    Panel(PanelRequest),
    Preview(PreviewRequest),
    Serialize {
        generation: u64,
        collection: TagCollection,
        separator: String,
    },
}

/// The result of a [`Job`].
#[derive(Debug)]
pub enum Delivery {
    Autocomplete(SearchTicket),
    Search(SearchTicket),
    Browse(BrowseTicket),
    Panel(PanelResponse),
    Preview(PreviewResponse),
    Serialized { generation: u64, text: String },
}

impl Job {
    pub async fn run(self, api: &AssetApi) -> Delivery {
        match self {
            Job::Autocomplete(request) => Delivery::Autocomplete(request.run(api).await),
            Job::Search(request) => Delivery::Search(request.run(api).await),
            Job::Browse(request) => Delivery::Browse(request.run(api).await),
            Job::Panel(request) => Delivery::Panel(request.run(api).await),
            Job::Preview(request) => Delivery::Preview(request.run(api).await),
            Job::Serialize {
                generation,
                collection,
                separator,
            } => {
                let resolver = CachedGroupResolver::new(api.clone());
                let text = serialize(&collection, &separator, &resolver).await;
                Delivery::Serialized { generation, text }
            }
        }
    }
}

/// What the file browser's selection is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrowseTarget {
    Add,
    /// Repoint the tag being edited at this index.
    Replace(usize),
}

/// The popup on screen, borrowed for rendering.
pub enum ActivePopup<'a> {
    Autocomplete(&'a TagSearch),
    Search(&'a TagSearch),
    Browser(&'a Menu<BrowserAction>),
    Editor(&'a Menu<EditAction>),
}

pub struct App {
    pub should_quit: bool,
    pub focus: Focus,
    separator: String,
    keymap: KeyMapper,
    surface: TextSurface,
    collection: TagCollection,
    selected: usize,
    autocomplete: CaretAutocomplete,
    anchor: Option<Point>,
    search: TagSearch,
    browser: FileBrowser,
    browse_target: BrowseTarget,
    editor: QuickEditor,
    editing: Option<usize>,
    serialized: String,
    serialize_generation: u64,
    notifications: NotificationReader,
    jobs: Vec<Job>,
    /// Where the open popup was drawn and the first option row shown.
    popup: Option<(Rect, usize)>,
    /// Stepper being dragged and the last pointer column.
    drag: Option<(usize, i32)>,
}

impl App {
    pub fn new(config: &AppConfig, notifications: NotificationReader) -> Self {
        let coordinator = MenuCoordinator::new();
        let mut autocomplete =
            CaretAutocomplete::new(coordinator.clone(), &config.autocomplete, config.tags.search_limit);
        autocomplete.attach(PROMPT_SURFACE);

        Self {
            should_quit: false,
            focus: Focus::Prompt,
            separator: config.tags.separator.clone(),
            keymap: KeyMapper::new(),
            surface: TextSurface::at_end(""),
            collection: TagCollection::new(),
            selected: 0,
            autocomplete,
            anchor: None,
            search: TagSearch::new(coordinator.clone(), SearchMode::Insert, config.tags.search_limit),
            browser: FileBrowser::new(coordinator.clone(), AssetKind::Lora),
            browse_target: BrowseTarget::Add,
            editor: QuickEditor::new(coordinator, &config.editor),
            editing: None,
            serialized: String::new(),
            serialize_generation: 0,
            notifications,
            jobs: Vec::new(),
            popup: None,
            drag: None,
        }
    }

    /// Start from existing prompt text.
    pub fn with_prompt(mut self, text: &str) -> Self {
        self.surface = TextSurface::at_end(text);
        self.text_changed();
        self
    }

    // ── Accessors for rendering ────────────────────────────────────

    pub fn surface(&self) -> &TextSurface {
        &self.surface
    }

    pub fn collection(&self) -> &TagCollection {
        &self.collection
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn serialized(&self) -> &str {
        &self.serialized
    }

    /// Where the autocomplete popup should hang from.
    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    pub fn notification(&self, now: Instant) -> Option<Notification> {
        self.notifications.latest(now)
    }

    pub fn active_popup(&self) -> Option<ActivePopup<'_>> {
        if self.autocomplete.is_open() {
            Some(ActivePopup::Autocomplete(self.autocomplete.search()))
        } else if self.search.is_open() {
            Some(ActivePopup::Search(&self.search))
        } else if self.browser.is_open() {
            Some(ActivePopup::Browser(self.browser.menu()))
        } else if self.editor.is_open() {
            Some(ActivePopup::Editor(self.editor.menu()))
        } else {
            None
        }
    }

    // ── Event loop plumbing ────────────────────────────────────────

    pub fn take_jobs(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.autocomplete.next_deadline()
    }

    /// Tell autocomplete where the prompt text is drawn.
    pub fn set_prompt_geometry(&mut self, origin: Point, width: i32, scroll: i32) {
        self.autocomplete.set_geometry(SurfaceGeometry {
            origin,
            width,
            scroll,
        });
    }

    /// Record where the active popup was drawn. `first` is the option in
    /// its first row; the border takes one row above it.
    pub fn set_popup_layout(&mut self, layout: Option<(Rect, usize)>) {
        self.popup = layout;
        let Some((bounds, _)) = layout else {
            return;
        };
        if self.autocomplete.is_open() {
            self.autocomplete.search_mut().menu_mut().set_bounds(bounds);
        } else if self.search.is_open() {
            self.search.menu_mut().set_bounds(bounds);
        } else if self.browser.is_open() {
            self.browser.menu_mut().set_bounds(bounds);
        } else if self.editor.is_open() {
            self.editor.menu_mut().set_bounds(bounds);
        }
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(request) = self.autocomplete.tick(now, &self.surface) {
            self.anchor = request.anchor;
            self.jobs.push(Job::Autocomplete(request.search));
        }
    }

    pub fn deliver(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Autocomplete(ticket) => {
                self.autocomplete.apply(ticket);
            }
            Delivery::Search(ticket) => {
                self.search.apply(ticket);
            }
            Delivery::Browse(ticket) => {
                self.browser.apply(ticket);
            }
            Delivery::Panel(response) => {
                self.editor.apply_panel(response);
            }
            Delivery::Preview(response) => {
                self.browser.menu_mut().apply_preview(response);
            }
            Delivery::Serialized { generation, text } => {
                if generation == self.serialize_generation {
                    self.serialized = text;
                } else {
                    debug!(generation, current = self.serialize_generation, "stale serialization dropped");
                }
            }
        }
        self.collect_preview();
    }

    // ── Input ──────────────────────────────────────────────────────

    pub fn handle_key(&mut self, input: KeyInput, now: Instant) {
        if input.key == Key::Char('c') && input.modifiers.ctrl {
            self.should_quit = true;
            return;
        }

        if self.browser.is_open() {
            let outcome = self.browser.handle_key(input);
            self.on_browser(outcome);
        } else if self.search.is_open() {
            let outcome = self.search.handle_key(input);
            self.on_search(outcome);
        } else if self.editor.is_open() {
            let outcome = self.editor.handle_key(input);
            self.on_edit(outcome);
        } else {
            match self.focus {
                Focus::Prompt => self.prompt_key(input, now),
                Focus::Pills => self.pills_key(input),
            }
        }
        self.collect_preview();
    }

    /// Option index under `point`, if it falls on a popup row.
    fn option_at(&self, point: Point) -> Option<usize> {
        let (bounds, first) = self.popup?;
        if !bounds.contains(point) {
            return None;
        }
        let row = point.y - bounds.y - 1;
        if row < 0 || row >= bounds.height - 2 {
            return None;
        }
        Some(first + row as usize)
    }

    fn is_stepper(&self, index: usize) -> bool {
        match self.active_popup() {
            Some(ActivePopup::Editor(menu)) => menu
                .option(index)
                .is_some_and(|o| o.role == Role::Control(ControlKind::Stepper)),
            _ => false,
        }
    }

    pub fn mouse_down(&mut self, point: Point, modifiers: Modifiers) {
        let event = match self.option_at(point) {
            Some(index) if self.is_stepper(index) => {
                self.drag = Some((index, point.x));
                let (bounds, _) = self.popup.unwrap_or_default();
                let delta = if point.x < bounds.x + bounds.width / 2 { -1 } else { 1 };
                PointerEvent::Step {
                    index,
                    delta,
                    modifiers,
                }
            }
            Some(index) => PointerEvent::Activate { index, modifiers },
            None => PointerEvent::Down(point),
        };
        self.handle_pointer(event);
    }

    pub fn mouse_drag(&mut self, point: Point, modifiers: Modifiers) {
        let Some((index, last)) = self.drag else {
            return;
        };
        self.drag = Some((index, point.x));
        self.handle_pointer(PointerEvent::Drag {
            index,
            dx: point.x - last,
            modifiers,
        });
    }

    pub fn mouse_up(&mut self) {
        if self.drag.take().is_some() {
            self.handle_pointer(PointerEvent::Release);
        }
    }

    pub fn mouse_move(&mut self, point: Point) {
        if let Some(index) = self.option_at(point) {
            self.handle_pointer(PointerEvent::Hover(index));
        }
    }

    /// Route a pointer event to whichever popup is open.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if self.autocomplete.is_open() {
            if let KeyDisposition::Accepted(splice) =
                self.autocomplete.handle_pointer(event, &self.surface)
            {
                self.surface.apply_splice(&splice);
                self.text_changed();
            }
        } else if self.browser.is_open() {
            let outcome = self.browser.handle_pointer(event);
            self.on_browser(outcome);
        } else if self.search.is_open() {
            let outcome = self.search.handle_pointer(event);
            self.on_search(outcome);
        } else if self.editor.is_open() {
            let outcome = self.editor.handle_pointer(event);
            self.on_edit(outcome);
        }
        self.collect_preview();
    }

    fn prompt_key(&mut self, input: KeyInput, now: Instant) {
        match self.autocomplete.handle_key(input, &self.surface) {
            KeyDisposition::Accepted(splice) => {
                self.surface.apply_splice(&splice);
                self.text_changed();
                return;
            }
            KeyDisposition::Consumed => return,
            KeyDisposition::Forward => {}
        }

        let caret = self.surface.caret;
        let len = self.surface.text.chars().count();
        let kind = match input.key {
            Key::Char(c) if !input.modifiers.ctrl && !input.modifiers.alt => {
                self.insert(c);
                InputKind::Insert(c)
            }
            Key::Enter => {
                self.insert('\n');
                InputKind::Insert('\n')
            }
            Key::Backspace if caret > 0 => {
                remove_char(&mut self.surface.text, caret - 1);
                self.surface.caret -= 1;
                InputKind::Backspace
            }
            Key::Delete if caret < len => {
                remove_char(&mut self.surface.text, caret);
                InputKind::Delete
            }
            Key::Left => {
                self.surface.caret = caret.saturating_sub(1);
                InputKind::CaretMoved
            }
            Key::Right => {
                self.surface.caret = (caret + 1).min(len);
                InputKind::CaretMoved
            }
            Key::Home => {
                self.surface.caret = 0;
                InputKind::CaretMoved
            }
            Key::End => {
                self.surface.caret = len;
                InputKind::CaretMoved
            }
            Key::Tab | Key::BackTab => {
                self.autocomplete.close();
                self.focus = Focus::Pills;
                return;
            }
            _ => return,
        };

        self.autocomplete
            .on_input(PROMPT_SURFACE, kind, &self.surface, now);
        if kind != InputKind::CaretMoved {
            self.text_changed();
        }
    }

    fn insert(&mut self, c: char) {
        let at = byte_offset(&self.surface.text, self.surface.caret);
        self.surface.text.insert(at, c);
        self.surface.caret += 1;
    }

    fn pills_key(&mut self, input: KeyInput) {
        if matches!(input.key, Key::Tab | Key::BackTab) {
            self.focus = Focus::Prompt;
            return;
        }
        let last = self.collection.len().saturating_sub(1);
        match self.keymap.resolve(input) {
            PillAction::Quit => self.should_quit = true,
            PillAction::Next => self.selected = (self.selected + 1).min(last),
            PillAction::Prev => self.selected = self.selected.saturating_sub(1),
            PillAction::First => self.selected = 0,
            PillAction::Last => self.selected = last,
            PillAction::Toggle => {
                if self.collection.toggle(self.selected).is_some() {
                    self.collection_changed();
                }
            }
            PillAction::Delete => {
                if self.collection.remove(self.selected).is_some() {
                    self.clamp_selection();
                    self.collection_changed();
                }
            }
            PillAction::MoveDown => {
                if self.collection.move_item(self.selected, self.selected + 1) {
                    self.selected += 1;
                    self.collection_changed();
                }
            }
            PillAction::MoveUp => {
                if self.selected > 0 && self.collection.move_item(self.selected, self.selected - 1)
                {
                    self.selected -= 1;
                    self.collection_changed();
                }
            }
            PillAction::Edit => self.open_editor(self.selected),
            PillAction::BrowseLoras => self.open_browser(AssetKind::Lora, BrowseTarget::Add),
            PillAction::BrowseEmbeddings => {
                self.open_browser(AssetKind::Embedding, BrowseTarget::Add)
            }
            PillAction::Search => {
                let request = self.search.search("", self.names());
                self.jobs.push(Job::Search(request));
            }
            PillAction::None => {}
        }
    }

    // ── Popups ─────────────────────────────────────────────────────

    fn names(&self) -> Vec<String> {
        self.collection.names().into_iter().map(str::to_string).collect()
    }

    fn open_editor(&mut self, index: usize) {
        let Some(tag) = self.collection.get(index).cloned() else {
            return;
        };
        self.editing = Some(index);
        if let Some(request) = self.editor.open(tag) {
            self.jobs.push(Job::Panel(request));
        }
    }

    fn open_browser(&mut self, kind: AssetKind, target: BrowseTarget) {
        self.browse_target = target;
        let request = self.browser.open(kind, "", self.names());
        self.jobs.push(Job::Browse(request));
    }

    fn on_browser(&mut self, outcome: BrowserOutcome) {
        match outcome {
            BrowserOutcome::Idle => {}
            BrowserOutcome::Fetch(request) => self.jobs.push(Job::Browse(request)),
            BrowserOutcome::Selected { items, refresh } => match self.browse_target {
                BrowseTarget::Add => {
                    let kind = self.browser.kind().tag_kind();
                    let mut added = 0;
                    for item in items {
                        let mut tag = Tag::new(kind, item.path);
                        if let Some(extension) = item.extension {
                            tag = tag.with_extension(extension);
                        }
                        if self.collection.push(tag) {
                            added += 1;
                        }
                    }
                    if added > 0 {
                        self.collection_changed();
                    }
                    if let Some(request) = refresh {
                        self.jobs.push(Job::Browse(request));
                    }
                }
                BrowseTarget::Replace(index) => {
                    self.browser.close();
                    self.browse_target = BrowseTarget::Add;
                    if let Some(item) = items.into_iter().next() {
                        let outcome = self.editor.set_file(&item.path, item.extension.as_deref());
                        self.on_edit(outcome);
                    }
                    self.open_editor(index);
                }
            },
            BrowserOutcome::Closed => {
                if let BrowseTarget::Replace(index) = self.browse_target {
                    self.browse_target = BrowseTarget::Add;
                    self.open_editor(index);
                }
            }
        }
    }

    fn on_search(&mut self, outcome: SearchOutcome) {
        match outcome {
            SearchOutcome::Idle | SearchOutcome::Closed => {}
            SearchOutcome::Search(request) => self.jobs.push(Job::Search(request)),
            SearchOutcome::Selected {
                name,
                created,
                refresh,
            } => {
                let tag = if created {
                    parse_token(&name).unwrap_or_else(|| Tag::plain(name))
                } else {
                    Tag::plain(name)
                };
                if self.collection.push(tag) {
                    self.collection_changed();
                }
                if let Some(request) = refresh {
                    self.jobs.push(Job::Search(request));
                }
            }
            SearchOutcome::Browse(kind) => self.open_browser(kind, BrowseTarget::Add),
        }
    }

    fn on_edit(&mut self, outcome: EditOutcome) {
        match outcome {
            EditOutcome::Idle => {}
            EditOutcome::Save(tag) => {
                if let Some(index) = self.editing {
                    if self.collection.replace(index, tag) {
                        self.collection_changed();
                    }
                }
            }
            EditOutcome::Delete => {
                if let Some(index) = self.editing.take() {
                    self.collection.remove(index);
                    self.clamp_selection();
                    self.collection_changed();
                }
            }
            EditOutcome::Browse(kind) => {
                if let Some(index) = self.editing {
                    self.open_browser(kind, BrowseTarget::Replace(index));
                }
            }
            EditOutcome::Closed => self.editing = None,
        }
    }

    fn collect_preview(&mut self) {
        if let Some(request) = self.browser.menu_mut().take_preview_request() {
            self.jobs.push(Job::Preview(request));
        }
    }

    // ── Text/collection sync ───────────────────────────────────────

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.collection.len().saturating_sub(1));
    }

    /// The prompt text was edited: reparse it, keeping toggle state.
    fn text_changed(&mut self) {
        self.collection = parse_text(&self.surface.text, Some(&self.collection));
        self.clamp_selection();
        self.request_serialize();
    }

    /// The pills were edited: rewrite the prompt text from them.
    fn collection_changed(&mut self) {
        self.autocomplete.close();
        self.surface = TextSurface::at_end(format_text(&self.collection, &self.separator));
        self.request_serialize();
    }

    fn request_serialize(&mut self) {
        self.serialize_generation += 1;
        self.jobs.push(Job::Serialize {
            generation: self.serialize_generation,
            collection: self.collection.clone(),
            separator: self.separator.clone(),
        });
    }
}

fn byte_offset(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

fn remove_char(text: &mut String, index: usize) {
    let at = byte_offset(text, index);
    if at < text.len() {
        text.remove(at);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pillbox_core::NotificationLayer;
    use pillbox_core::api::{BrowseItem, BrowseResponse, ItemType, TagSuggestion};
    use pillbox_core::menu::Modifiers;
    use pillbox_core::ResourceCache;
    use pillbox_test_utils::MemoryFetcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn make_app() -> App {
        let mut config = AppConfig::default();
        config.autocomplete.debounce_ms = 10;
        let layer = NotificationLayer::new(8, Duration::from_secs(5));
        App::new(&config, layer.reader())
    }

    fn type_text(app: &mut App, text: &str, now: Instant) {
        for c in text.chars() {
            app.handle_key(KeyInput::plain(Key::Char(c)), now);
        }
    }

    fn key(app: &mut App, key: Key) {
        app.handle_key(KeyInput::plain(key), Instant::now());
    }

    fn serialize_jobs(jobs: &[Job]) -> Vec<u64> {
        jobs.iter()
            .filter_map(|job| match job {
                Job::Serialize { generation, .. } => Some(*generation),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_typing_updates_collection() {
        let mut app = make_app();
        type_text(&mut app, "sky, (red:1.2)", Instant::now());

        assert_eq!(app.collection().names(), vec!["sky", "red"]);
        assert_eq!(app.collection().get(1).unwrap().strength, Some(1.2));
        assert_eq!(serialize_jobs(&app.take_jobs()).len(), 14);
    }

    #[test]
    fn test_prompt_edit_keeps_lora_triggers() {
        let mut app = make_app().with_prompt("<lora:ink:0.5>");
        app.collection.get_mut(0).unwrap().triggers = vec!["inkwash".to_string()];
        app.take_jobs();

        type_text(&mut app, ", sky", Instant::now());
        assert_eq!(app.collection().names(), vec!["ink", "sky"]);
        assert_eq!(
            app.collection().get(0).unwrap().triggers,
            vec!["inkwash".to_string()]
        );
        let last = app.take_jobs().into_iter().rev().find_map(|job| match job {
            Job::Serialize { collection, .. } => Some(collection),
            _ => None,
        });
        assert_eq!(last.unwrap().get(0).unwrap().triggers, vec!["inkwash".to_string()]);
    }

    #[test]
    fn test_only_latest_serialization_is_shown() {
        let mut app = make_app().with_prompt("a, b");
        key(&mut app, Key::Backspace);
        let generations = serialize_jobs(&app.take_jobs());
        let (first, last) = (generations[0], *generations.last().unwrap());

        app.deliver(Delivery::Serialized {
            generation: last,
            text: "a".to_string(),
        });
        app.deliver(Delivery::Serialized {
            generation: first,
            text: "a, b".to_string(),
        });
        assert_eq!(app.serialized(), "a");
    }

    #[test]
    fn test_pill_commands_rewrite_prompt() {
        let mut app = make_app().with_prompt("a, b, c");
        app.focus = Focus::Pills;

        key(&mut app, Key::Char(' '));
        assert!(!app.collection().get(0).unwrap().active);

        key(&mut app, Key::Char('J'));
        assert_eq!(app.collection().names(), vec!["b", "a", "c"]);
        assert_eq!(app.selected(), 1);
        assert_eq!(app.surface().text, "b, a, c");

        key(&mut app, Key::Char('j'));
        key(&mut app, Key::Char('d'));
        assert_eq!(app.collection().names(), vec!["b", "a"]);
        assert_eq!(app.selected(), 1);

        // The toggle survives a reparse of the text.
        app.focus = Focus::Prompt;
        key(&mut app, Key::Char(','));
        assert_eq!(app.surface().text, "b, a,");
        assert!(!app.collection().find("a").unwrap().active);
    }

    #[test]
    fn test_autocomplete_round_trip() {
        let mut app = make_app();
        let start = Instant::now();
        type_text(&mut app, "sky, blu", start);
        app.take_jobs();

        app.tick(start + Duration::from_millis(20));
        let jobs = app.take_jobs();
        let Some(Job::Autocomplete(request)) = jobs.into_iter().next() else {
            panic!("expected an autocomplete search");
        };
        assert_eq!(request.query, "blu");

        app.deliver(Delivery::Autocomplete(SearchTicket {
            generation: request.generation,
            results: Ok(vec![TagSuggestion {
                name: "blue_sky".to_string(),
                count: Some(10),
                aliases: Vec::new(),
            }]),
        }));
        assert!(matches!(app.active_popup(), Some(ActivePopup::Autocomplete(_))));

        key(&mut app, Key::Tab);
        assert_eq!(app.surface().text, "sky, blue_sky, ");
        assert_eq!(app.collection().names(), vec!["sky", "blue_sky"]);
        assert!(app.active_popup().is_none());
    }

    #[test]
    fn test_browse_adds_loras() {
        let mut app = make_app();
        app.focus = Focus::Pills;
        key(&mut app, Key::Char('b'));

        let jobs = app.take_jobs();
        let Some(Job::Browse(request)) = jobs.into_iter().next() else {
            panic!("expected a listing fetch");
        };
        app.deliver(Delivery::Browse(BrowseTicket {
            generation: request.generation,
            listing: Ok(BrowseResponse {
                items: vec![BrowseItem {
                    name: "ink".to_string(),
                    path: "styles/ink".to_string(),
                    item_type: ItemType::File,
                    extension: Some(".safetensors".to_string()),
                }],
                current_path: String::new(),
                parent_path: None,
            }),
        }));
        let Some(ActivePopup::Browser(menu)) = app.active_popup() else {
            panic!("browser should be open");
        };
        let index = menu.options().iter().position(|o| o.label == "ink").unwrap();

        app.handle_pointer(PointerEvent::Activate {
            index,
            modifiers: Modifiers::NONE,
        });
        let tag = app.collection().get(0).unwrap();
        assert_eq!(tag.name, "styles/ink");
        assert_eq!(tag.extension.as_deref(), Some(".safetensors"));
        assert_eq!(app.surface().text, "<lora:styles/ink.safetensors:1.0>");
    }

    #[test]
    fn test_edit_strength_then_close() {
        let mut app = make_app().with_prompt("sky");
        app.focus = Focus::Pills;
        key(&mut app, Key::Char('e'));
        assert!(matches!(app.active_popup(), Some(ActivePopup::Editor(_))));

        // The title and name field are skipped; the stepper is first.
        key(&mut app, Key::Down);
        key(&mut app, Key::Right);
        assert_eq!(app.surface().text, "(sky:1.05)");

        key(&mut app, Key::Escape);
        assert!(app.active_popup().is_none());
    }

    #[test]
    fn test_click_and_drag_stepper() {
        let mut app = make_app().with_prompt("sky");
        app.focus = Focus::Pills;
        key(&mut app, Key::Char('e'));
        app.set_popup_layout(Some((Rect::new(0, 0, 20, 7), 0)));

        // Row 3 holds option 2, the strength stepper; the right half steps up.
        app.mouse_down(Point::new(15, 3), Modifiers::NONE);
        assert_eq!(app.surface().text, "(sky:1.05)");

        app.mouse_drag(Point::new(31, 3), Modifiers::NONE);
        assert_eq!(app.surface().text, "(sky:1.15)");
        app.mouse_up();

        // Outside the popup closes it.
        app.mouse_down(Point::new(40, 40), Modifiers::NONE);
        assert!(app.active_popup().is_none());
    }

    #[test]
    fn test_insert_search_adds_new_tag() {
        let mut app = make_app();
        app.focus = Focus::Pills;
        key(&mut app, Key::Char('/'));
        app.take_jobs();

        for c in "moon".chars() {
            key(&mut app, Key::Char(c));
        }
        let request = app
            .take_jobs()
            .into_iter()
            .filter_map(|job| match job {
                Job::Search(request) => Some(request),
                _ => None,
            })
            .last()
            .unwrap();
        app.deliver(Delivery::Search(SearchTicket {
            generation: request.generation,
            results: Ok(Vec::new()),
        }));

        key(&mut app, Key::Enter);
        assert_eq!(app.collection().names(), vec!["moon"]);
        assert!(matches!(app.active_popup(), Some(ActivePopup::Search(_))));
    }

    #[test]
    fn test_multibyte_editing() {
        let mut app = make_app().with_prompt("äb");
        key(&mut app, Key::Left);
        key(&mut app, Key::Backspace);
        assert_eq!(app.surface().text, "b");
        assert_eq!(app.surface().caret, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_serialize_job_expands_groups() {
        let fetcher = MemoryFetcher::new();
        let api = AssetApi::new(
            ResourceCache::new(fetcher.clone().into_shared()),
            "http://assets.test",
        )
        .unwrap();
        fetcher.route_json(
            &api.group_url("look", None),
            json!([{"name": "soft light", "type": "tag"}]),
        );

        let mut app = make_app().with_prompt("sky, group:look");
        let job = app.take_jobs().pop().unwrap();
        let delivery = job.run(&api).await;
        app.deliver(delivery);
        assert_eq!(app.serialized(), "sky, soft light");
    }
}
