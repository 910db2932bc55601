//! Hierarchical asset browser.
//!
//! Lists one folder of an asset category at a time. Folders navigate in
//! place; "up" trusts the `parentPath` the server returned rather than a
//! local stack. Listings arrive through [`BrowseRequest`] /
//! [`BrowseTicket`] pairs so a response for a folder the user already left
//! is dropped.

use std::collections::HashSet;

use tracing::debug;

use super::{Menu, MenuCoordinator, MenuEvent, MenuOption, Modifiers, PreviewTarget};
use crate::api::{ApiError, AssetApi, AssetKind, BrowseItem, BrowseResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    Up,
    Folder(String),
    /// Index into the current listing.
    File(usize),
    LoadAll,
}

/// A listing the host should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseRequest {
    pub generation: u64,
    pub kind: AssetKind,
    pub path: String,
    pub query: String,
}

impl BrowseRequest {
    pub async fn run(self, api: &AssetApi) -> BrowseTicket {
        let listing = api
            .search_files(self.kind, &self.path, &self.query)
            .await
            .map_err(|e: ApiError| e.to_string());
        BrowseTicket {
            generation: self.generation,
            listing,
        }
    }
}

/// A fetched listing, tagged with the request that produced it.
#[derive(Debug, Clone)]
pub struct BrowseTicket {
    pub generation: u64,
    pub listing: Result<BrowseResponse, String>,
}

/// What the host should do after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserOutcome {
    Idle,
    /// Fetch a new listing.
    Fetch(BrowseRequest),
    /// Files were chosen. With `refresh` set the browser stays open and the
    /// host should fetch that listing once it has added the files.
    Selected {
        items: Vec<BrowseItem>,
        refresh: Option<BrowseRequest>,
    },
    Closed,
}

#[derive(Debug)]
pub struct FileBrowser {
    kind: AssetKind,
    menu: Menu<BrowserAction>,
    existing: HashSet<String>,
    listing: BrowseResponse,
    path: String,
    generation: u64,
    restore_highlight: Option<usize>,
}

impl FileBrowser {
    pub fn new(coordinator: MenuCoordinator, kind: AssetKind) -> Self {
        Self {
            kind,
            menu: Menu::new(coordinator),
            existing: HashSet::new(),
            listing: BrowseResponse::default(),
            path: String::new(),
            generation: 0,
            restore_highlight: None,
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn menu(&self) -> &Menu<BrowserAction> {
        &self.menu
    }

    pub fn menu_mut(&mut self) -> &mut Menu<BrowserAction> {
        &mut self.menu
    }

    pub fn is_open(&self) -> bool {
        self.menu.is_open()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn listing(&self) -> &BrowseResponse {
        &self.listing
    }

    /// Open at `path`. `existing` holds names the caller already has, used
    /// to decide whether "load all" would add anything.
    pub fn open<I, S>(&mut self, kind: AssetKind, path: &str, existing: I) -> BrowseRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = kind;
        self.existing = existing.into_iter().map(Into::into).collect();
        self.listing = BrowseResponse::default();
        self.path = path.to_string();
        self.restore_highlight = None;
        self.menu.open(vec![
            MenuOption::filter_input("filter"),
            MenuOption::display("loading…"),
        ]);
        self.request(path)
    }

    pub fn close(&mut self) -> bool {
        self.menu.close()
    }

    /// Names chosen since opening count as existing for "load all".
    pub fn mark_existing<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing.extend(names.into_iter().map(Into::into));
    }

    fn request(&mut self, path: &str) -> BrowseRequest {
        self.generation += 1;
        BrowseRequest {
            generation: self.generation,
            kind: self.kind,
            path: path.to_string(),
            query: self.menu.filter_text().to_string(),
        }
    }

    /// Install a fetched listing. Returns false for stale tickets.
    pub fn apply(&mut self, ticket: BrowseTicket) -> bool {
        if ticket.generation != self.generation || !self.menu.is_open() {
            debug!(ticket = ticket.generation, current = self.generation, "stale listing dropped");
            return false;
        }
        match ticket.listing {
            Ok(listing) => {
                self.path = listing.current_path.clone();
                self.listing = listing;
                let options = self.build_options();
                let restore = self.restore_highlight.take();
                match restore {
                    Some(index) => self.menu.set_options_keep_highlight(options, Some(index)),
                    None => self.menu.set_options(options),
                }
            }
            Err(err) => {
                debug!(kind = %self.kind, path = %self.path, error = %err, "listing failed");
                self.menu.set_options(vec![
                    MenuOption::filter_input("filter"),
                    MenuOption::display(format!("could not load: {err}")),
                ]);
            }
        }
        true
    }

    fn files(&self) -> impl Iterator<Item = &BrowseItem> {
        self.listing.items.iter().filter(|item| !item.is_folder())
    }

    fn build_options(&self) -> Vec<MenuOption<BrowserAction>> {
        let mut options = vec![
            MenuOption::filter_input("filter"),
            MenuOption::title(format!("{} /{}", self.kind.label(), self.path)),
        ];
        if self.listing.parent_path.is_some() {
            options.push(MenuOption::normal("..", BrowserAction::Up));
        }

        let missing = self
            .files()
            .filter(|item| !self.existing.contains(&item.path))
            .count();
        if missing > 0 {
            options.push(
                MenuOption::action("load all", BrowserAction::LoadAll)
                    .with_detail(format!("{missing} new")),
            );
        }

        for (index, item) in self.listing.items.iter().enumerate() {
            if item.is_folder() {
                options.push(MenuOption::normal(
                    format!("{}/", item.name),
                    BrowserAction::Folder(item.path.clone()),
                ));
                continue;
            }
            let mut option = MenuOption::normal(item.name.clone(), BrowserAction::File(index))
                .with_preview(PreviewTarget::new(self.kind, item.path.clone()));
            if let Some(ext) = &item.extension {
                option = option.with_detail(ext.clone());
            }
            if self.existing.contains(&item.path) {
                option = option.with_detail("added");
            }
            options.push(option);
        }

        if self.listing.items.is_empty() {
            options.push(MenuOption::display("no matches"));
        }
        options
    }

    pub fn handle_key(&mut self, input: super::KeyInput) -> BrowserOutcome {
        let event = self.menu.handle_key(input);
        self.on_event(event)
    }

    pub fn handle_pointer(&mut self, event: super::PointerEvent) -> BrowserOutcome {
        let event = self.menu.handle_pointer(event);
        self.on_event(event)
    }

    fn on_event(&mut self, event: MenuEvent<BrowserAction>) -> BrowserOutcome {
        match event {
            MenuEvent::Activated {
                index,
                action,
                modifiers,
            } => self.on_action(index, action, modifiers),
            MenuEvent::FilterChanged(_) => {
                let path = self.path.clone();
                BrowserOutcome::Fetch(self.request(&path))
            }
            MenuEvent::Closed => BrowserOutcome::Closed,
            _ => BrowserOutcome::Idle,
        }
    }

    fn on_action(
        &mut self,
        index: usize,
        action: BrowserAction,
        modifiers: Modifiers,
    ) -> BrowserOutcome {
        match action {
            BrowserAction::Up => {
                let parent = self.listing.parent_path.clone().unwrap_or_default();
                self.menu.set_filter_text("");
                BrowserOutcome::Fetch(self.request(&parent))
            }
            BrowserAction::Folder(path) => {
                self.menu.set_filter_text("");
                BrowserOutcome::Fetch(self.request(&path))
            }
            BrowserAction::LoadAll => {
                let items: Vec<BrowseItem> = self.files().cloned().collect();
                self.close();
                BrowserOutcome::Selected {
                    items,
                    refresh: None,
                }
            }
            BrowserAction::File(item_index) => {
                let Some(item) = self.listing.items.get(item_index).cloned() else {
                    return BrowserOutcome::Idle;
                };
                if modifiers.any() {
                    self.existing.insert(item.path.clone());
                    self.restore_highlight = Some(index);
                    let path = self.path.clone();
                    BrowserOutcome::Selected {
                        items: vec![item],
                        refresh: Some(self.request(&path)),
                    }
                } else {
                    self.close();
                    BrowserOutcome::Selected {
                        items: vec![item],
                        refresh: None,
                    }
                }
            }
        }
    }
}
