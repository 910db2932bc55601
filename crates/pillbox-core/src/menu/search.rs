//! Remote tag search popup.
//!
//! [`SearchMode::Plain`] is what caret autocomplete drives: the query comes
//! from the word under the caret and the popup only lists results.
//! [`SearchMode::Insert`] has its own filter input, offers to add the typed
//! text as a new tag, offers shortcuts into the file browser while the
//! query is empty, and stays open after each pick.

use std::collections::HashSet;

use tracing::debug;

use super::{KeyInput, Menu, MenuCoordinator, MenuEvent, MenuOption, PointerEvent};
use crate::api::{AssetApi, AssetKind, TagSuggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Plain,
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchAction {
    /// Index into the current results.
    Result(usize),
    AddNew,
    Browse(AssetKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub generation: u64,
    pub query: String,
    pub limit: usize,
}

impl SearchRequest {
    pub async fn run(self, api: &AssetApi) -> SearchTicket {
        let results = api
            .search_tags(&self.query, self.limit)
            .await
            .map_err(|e| e.to_string());
        SearchTicket {
            generation: self.generation,
            results,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchTicket {
    pub generation: u64,
    pub results: Result<Vec<TagSuggestion>, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Idle,
    /// Run this search and hand the ticket to [`TagSearch::apply`].
    Search(SearchRequest),
    /// A tag was chosen. `created` marks the "add new" path.
    Selected {
        name: String,
        created: bool,
        refresh: Option<SearchRequest>,
    },
    /// Switch to the file browser for this category.
    Browse(AssetKind),
    Closed,
}

const BROWSE_SHORTCUTS: [AssetKind; 2] = [AssetKind::Lora, AssetKind::Embedding];

#[derive(Debug)]
pub struct TagSearch {
    mode: SearchMode,
    menu: Menu<SearchAction>,
    query: String,
    results: Vec<TagSuggestion>,
    exclude: HashSet<String>,
    generation: u64,
    limit: usize,
}

impl TagSearch {
    pub fn new(coordinator: MenuCoordinator, mode: SearchMode, limit: usize) -> Self {
        Self {
            mode,
            menu: Menu::new(coordinator),
            query: String::new(),
            results: Vec::new(),
            exclude: HashSet::new(),
            generation: 0,
            limit,
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn menu(&self) -> &Menu<SearchAction> {
        &self.menu
    }

    pub fn menu_mut(&mut self) -> &mut Menu<SearchAction> {
        &mut self.menu
    }

    pub fn is_open(&self) -> bool {
        self.menu.is_open()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[TagSuggestion] {
        &self.results
    }

    pub fn close(&mut self) -> bool {
        self.menu.close()
    }

    /// Open, or reuse the open popup, for `query`. Names in `exclude` are
    /// left out of the results.
    pub fn search<I, S>(&mut self, query: &str, exclude: I) -> SearchRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        if !self.menu.is_open() {
            self.results.clear();
            let mut options = Vec::new();
            if self.mode == SearchMode::Insert {
                options.push(MenuOption::filter_input("search tags"));
            }
            options.push(MenuOption::display("searching…"));
            self.menu.open(options);
            if self.mode == SearchMode::Insert {
                self.menu.set_filter_text(query);
            }
        }
        self.request(query)
    }

    fn request(&mut self, query: &str) -> SearchRequest {
        self.generation += 1;
        self.query = query.to_string();
        SearchRequest {
            generation: self.generation,
            query: self.query.clone(),
            limit: self.limit,
        }
    }

    /// Install search results. Returns false for stale tickets.
    pub fn apply(&mut self, ticket: SearchTicket) -> bool {
        if ticket.generation != self.generation || !self.menu.is_open() {
            debug!(ticket = ticket.generation, current = self.generation, "stale search dropped");
            return false;
        }
        match ticket.results {
            Ok(results) => {
                self.results = results
                    .into_iter()
                    .filter(|r| !self.exclude.contains(&r.name))
                    .collect();
            }
            Err(err) => {
                debug!(query = %self.query, error = %err, "tag search failed");
                self.results.clear();
            }
        }
        if self.mode == SearchMode::Plain && self.results.is_empty() {
            self.menu.close();
            return true;
        }
        let options = self.build_options();
        self.menu.set_options(options);
        true
    }

    fn wants_add_new(&self) -> bool {
        let query = self.query.trim();
        if query.is_empty() {
            return false;
        }
        let exact = self
            .results
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(query));
        !exact || self.results.len() > 1
    }

    fn build_options(&self) -> Vec<MenuOption<SearchAction>> {
        let mut options = Vec::new();
        if self.mode == SearchMode::Insert {
            options.push(MenuOption::filter_input("search tags"));
            if self.query.trim().is_empty() {
                for kind in BROWSE_SHORTCUTS {
                    options.push(MenuOption::action(
                        format!("browse {}s", kind.label()),
                        SearchAction::Browse(kind),
                    ));
                }
            } else if self.wants_add_new() {
                options.push(MenuOption::action(
                    format!("add new: {}", self.query.trim()),
                    SearchAction::AddNew,
                ));
            }
            if options.len() > 1 && !self.results.is_empty() {
                options.push(MenuOption::separator());
            }
        }

        for (index, result) in self.results.iter().enumerate() {
            let mut option = MenuOption::normal(result.name.clone(), SearchAction::Result(index))
                .with_aliases(result.aliases.clone());
            if let Some(count) = result.count {
                option = option.with_detail(count.to_string());
            }
            options.push(option);
        }
        if self.results.is_empty() {
            options.push(MenuOption::display("no matches"));
        }
        options
    }

    /// The result under the highlight, if any.
    pub fn highlighted_result(&self) -> Option<&TagSuggestion> {
        match self.menu.highlighted_option()?.action.as_ref()? {
            SearchAction::Result(index) => self.results.get(*index),
            _ => None,
        }
    }

    pub fn handle_key(&mut self, input: KeyInput) -> SearchOutcome {
        let event = self.menu.handle_key(input);
        self.on_event(event)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> SearchOutcome {
        let event = self.menu.handle_pointer(event);
        self.on_event(event)
    }

    fn on_event(&mut self, event: MenuEvent<SearchAction>) -> SearchOutcome {
        match event {
            MenuEvent::Activated { action, .. } => self.on_action(action),
            MenuEvent::Submitted(text) if self.mode == SearchMode::Insert => {
                self.pick(text, true)
            }
            MenuEvent::FilterChanged(text) => SearchOutcome::Search(self.request(&text)),
            MenuEvent::Closed => SearchOutcome::Closed,
            _ => SearchOutcome::Idle,
        }
    }

    fn on_action(&mut self, action: SearchAction) -> SearchOutcome {
        match action {
            SearchAction::Result(index) => match self.results.get(index) {
                Some(result) => {
                    let name = result.name.clone();
                    self.pick(name, false)
                }
                None => SearchOutcome::Idle,
            },
            SearchAction::AddNew => {
                let name = self.query.trim().to_string();
                self.pick(name, true)
            }
            SearchAction::Browse(kind) => {
                self.menu.close();
                SearchOutcome::Browse(kind)
            }
        }
    }

    fn pick(&mut self, name: String, created: bool) -> SearchOutcome {
        let refresh = match self.mode {
            SearchMode::Plain => {
                self.menu.close();
                None
            }
            SearchMode::Insert => {
                self.exclude.insert(name.clone());
                self.menu.set_filter_text("");
                Some(self.request(""))
            }
        };
        SearchOutcome::Selected {
            name,
            created,
            refresh,
        }
    }
}
