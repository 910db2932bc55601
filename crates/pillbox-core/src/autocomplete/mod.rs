//! Caret-tracking autocomplete for free-text surfaces.
//!
//! The host owns the text widget. After each edit it reports what happened
//! through [`CaretAutocomplete::on_input`], polls [`CaretAutocomplete::tick`]
//! from its event loop, runs the returned search, and feeds the result back
//! with [`CaretAutocomplete::apply`]. Accepting a suggestion produces a
//! [`Splice`] the host applies to its text.

mod debounce;
mod measure;
mod word;

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use pillbox_config::AutocompleteConfig;

pub use debounce::Debouncer;
pub use measure::{
    CaretMetrics, Monospace, SurfaceGeometry, VisualPosition, caret_anchor, visual_position,
};
pub use word::{SEPARATORS, Word, current_word, is_separator, separator_follows, touches_separator};

use crate::codec::{escape_parens, extract_tag_names};
use crate::menu::search::SearchTicket;
use crate::menu::{
    Key, KeyInput, MenuCoordinator, Point, PointerEvent, SearchMode, SearchOutcome, SearchRequest,
    TagSearch,
};

/// Separator appended after an accepted suggestion.
pub const ACCEPT_SEPARATOR: &str = ", ";

/// Identifies one text surface in the host.
pub type SurfaceId = u64;

/// Snapshot of a text surface after an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSurface {
    pub text: String,
    /// Caret position as a char index.
    pub caret: usize,
    /// A filter box holding one value; accepted words get no separator.
    pub single_value: bool,
}

impl TextSurface {
    pub fn new(text: impl Into<String>, caret: usize) -> Self {
        Self {
            text: text.into(),
            caret,
            single_value: false,
        }
    }

    /// Caret at the end of `text`.
    pub fn at_end(text: impl Into<String>) -> Self {
        let text = text.into();
        let caret = text.chars().count();
        Self::new(text, caret)
    }

    pub fn single_value(mut self) -> Self {
        self.single_value = true;
        self
    }

    /// Apply a splice produced by [`CaretAutocomplete::accept`].
    pub fn apply_splice(&mut self, splice: &Splice) {
        self.text = splice.apply(&self.text);
        self.caret = splice.caret;
    }
}

/// What kind of edit the host just performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Insert(char),
    Backspace,
    Delete,
    /// Caret moved without editing.
    CaretMoved,
}

/// Replace chars `range` with `replacement` and put the caret at `caret`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub range: Range<usize>,
    pub replacement: String,
    pub caret: usize,
}

impl Splice {
    pub fn apply(&self, text: &str) -> String {
        let head: String = text.chars().take(self.range.start).collect();
        let tail: String = text.chars().skip(self.range.end).collect();
        format!("{head}{}{tail}", self.replacement)
    }
}

/// A search the host should run for the word under the caret.
#[derive(Debug, Clone, PartialEq)]
pub struct AutocompleteRequest {
    pub search: SearchRequest,
    pub word: Word,
    /// Tag names already in the text, excluded from results.
    pub existing: Vec<String>,
    /// Where to put the popup, when the surface geometry is known.
    pub anchor: Option<Point>,
}

/// How a key press was handled while suggestions were showing.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDisposition {
    /// The host should apply this splice and not process the key further.
    Accepted(Splice),
    /// The key was used by the popup.
    Consumed,
    /// The host should process the key normally.
    Forward,
}

pub struct CaretAutocomplete {
    enabled: bool,
    min_word_len: usize,
    debouncer: Debouncer,
    attached: Option<SurfaceId>,
    generation: u64,
    word: Option<Word>,
    search: TagSearch,
    geometry: Option<SurfaceGeometry>,
    metrics: Arc<dyn CaretMetrics>,
}

impl std::fmt::Debug for CaretAutocomplete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaretAutocomplete")
            .field("attached", &self.attached)
            .field("generation", &self.generation)
            .field("word", &self.word)
            .field("open", &self.search.is_open())
            .finish()
    }
}

impl CaretAutocomplete {
    pub fn new(coordinator: MenuCoordinator, config: &AutocompleteConfig, search_limit: usize) -> Self {
        Self {
            enabled: config.enabled,
            min_word_len: config.min_word_len,
            debouncer: Debouncer::new(config.debounce()),
            attached: None,
            generation: 0,
            word: None,
            search: TagSearch::new(coordinator, SearchMode::Plain, search_limit),
            geometry: None,
            metrics: Arc::new(Monospace),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CaretMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Start observing `surface`, detaching from any previous one.
    pub fn attach(&mut self, surface: SurfaceId) {
        if self.attached == Some(surface) {
            return;
        }
        self.detach();
        self.attached = Some(surface);
        self.generation += 1;
        debug!(surface, generation = self.generation, "autocomplete attached");
    }

    /// Stop observing; pending work and the popup are dropped.
    pub fn detach(&mut self) {
        self.debouncer.cancel();
        self.search.close();
        self.word = None;
        self.attached = None;
    }

    pub fn attached(&self) -> Option<SurfaceId> {
        self.attached
    }

    pub fn set_geometry(&mut self, geometry: SurfaceGeometry) {
        self.geometry = Some(geometry);
    }

    pub fn search(&self) -> &TagSearch {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut TagSearch {
        &mut self.search
    }

    pub fn is_open(&self) -> bool {
        self.search.is_open()
    }

    pub fn word(&self) -> Option<&Word> {
        self.word.as_ref()
    }

    /// When the next [`tick`](Self::tick) may produce a request.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Record an edit on `surface`.
    pub fn on_input(&mut self, surface: SurfaceId, kind: InputKind, state: &TextSurface, now: Instant) {
        if !self.enabled || self.attached != Some(surface) {
            return;
        }
        match kind {
            InputKind::Insert(_) => {
                self.debouncer.schedule(now);
            }
            InputKind::Backspace | InputKind::Delete => {
                if !touches_separator(&state.text, state.caret) {
                    self.debouncer.schedule(now);
                }
            }
            InputKind::CaretMoved => {
                self.debouncer.cancel();
                self.close();
            }
        }
    }

    /// Recompute the word under the caret once the debounce has elapsed.
    pub fn tick(&mut self, now: Instant, state: &TextSurface) -> Option<AutocompleteRequest> {
        self.attached?;
        self.debouncer.tick(now)?;

        let Some(word) = current_word(&state.text, state.caret, self.min_word_len) else {
            self.close();
            return None;
        };

        let existing: Vec<String> = extract_tag_names(&state.text)
            .into_iter()
            .filter(|name| *name != word.normalized)
            .collect();
        let anchor = self.geometry.as_ref().map(|geometry| {
            caret_anchor(&state.text, word.start, word.end, geometry, self.metrics.as_ref())
        });

        let search = self.search.search(&word.normalized, existing.iter().cloned());
        debug!(word = %word.normalized, generation = search.generation, "autocomplete search");
        self.word = Some(word.clone());
        Some(AutocompleteRequest {
            search,
            word,
            existing,
            anchor,
        })
    }

    /// Install results for a search issued by [`tick`](Self::tick).
    pub fn apply(&mut self, ticket: SearchTicket) -> bool {
        if self.attached.is_none() {
            return false;
        }
        self.search.apply(ticket)
    }

    pub fn close(&mut self) {
        self.search.close();
        self.word = None;
    }

    /// Route a key press while suggestions may be showing.
    pub fn handle_key(&mut self, input: KeyInput, state: &TextSurface) -> KeyDisposition {
        if !self.search.is_open() {
            return KeyDisposition::Forward;
        }
        match input.key {
            Key::Tab if !input.modifiers.any() => {
                let choice = self
                    .search
                    .highlighted_result()
                    .or_else(|| self.search.results().first())
                    .map(|r| r.name.clone());
                match choice {
                    Some(value) => KeyDisposition::Accepted(self.accept(state, &value)),
                    None => KeyDisposition::Consumed,
                }
            }
            Key::Enter => match self.search.highlighted_result().map(|r| r.name.clone()) {
                Some(value) => KeyDisposition::Accepted(self.accept(state, &value)),
                None => KeyDisposition::Forward,
            },
            Key::Up | Key::Down | Key::BackTab => {
                self.search.handle_key(input);
                KeyDisposition::Consumed
            }
            Key::Escape => {
                self.close();
                KeyDisposition::Consumed
            }
            _ => KeyDisposition::Forward,
        }
    }

    /// Route a pointer event to the suggestion popup.
    pub fn handle_pointer(&mut self, event: PointerEvent, state: &TextSurface) -> KeyDisposition {
        if !self.search.is_open() {
            return KeyDisposition::Forward;
        }
        match self.search.handle_pointer(event) {
            SearchOutcome::Selected { name, .. } => {
                KeyDisposition::Accepted(self.accept(state, &name))
            }
            SearchOutcome::Closed => {
                self.word = None;
                KeyDisposition::Forward
            }
            _ => KeyDisposition::Consumed,
        }
    }

    /// Replace the tracked word with `value`.
    ///
    /// Parentheses in `value` are escaped. A separator is appended unless
    /// one already follows the caret or the surface holds a single value.
    pub fn accept(&mut self, state: &TextSurface, value: &str) -> Splice {
        let range = match self.word.take() {
            Some(word) if word.end == state.caret && word.end <= state.text.chars().count() => {
                word.start..word.end
            }
            _ => match current_word(&state.text, state.caret, 1) {
                Some(word) => word.start..word.end,
                None => state.caret..state.caret,
            },
        };
        self.search.close();
        self.debouncer.cancel();

        let mut replacement = escape_parens(value);
        if !state.single_value && !separator_follows(&state.text, state.caret) {
            replacement.push_str(ACCEPT_SEPARATOR);
        }
        let caret = range.start + replacement.chars().count();
        Splice {
            range,
            replacement,
            caret,
        }
    }
}
