//! Inline editor for a single tag.
//!
//! Every change is pushed out immediately as [`EditOutcome::Save`]; there
//! is no confirm step. Closing with an empty free-text name asks the host
//! to delete the tag instead.

use tracing::debug;

use pillbox_config::EditorConfig;

use super::{
    ControlKind, Key, KeyInput, Menu, MenuCoordinator, MenuEvent, MenuOption, PointerEvent, Role,
};
use crate::api::{AssetApi, AssetKind, trigger_words};
use crate::codec::format_strength;
use crate::tag::{Tag, TagKind};

/// Trigger candidates shown for a LoRA.
const TRIGGER_PANEL_LIMIT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Open the file browser to pick another file.
    Rename,
    Strength,
    Trigger(String),
    Delete,
}

/// Where the pill panel gets its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelSource {
    LoraTriggers { file: String },
    GroupMembers { name: String, extension: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRequest {
    pub generation: u64,
    pub source: PanelSource,
}

impl PanelRequest {
    pub async fn run(self, api: &AssetApi) -> PanelResponse {
        let pills = match &self.source {
            PanelSource::LoraTriggers { file } => match api.lora_metadata(file).await {
                Ok(Some(metadata)) => Ok(trigger_words(&metadata, TRIGGER_PANEL_LIMIT)
                    .into_iter()
                    .map(|(word, _)| word)
                    .collect()),
                Ok(None) => Ok(Vec::new()),
                Err(err) => Err(err.to_string()),
            },
            PanelSource::GroupMembers { name, extension } => {
                match api.group(name, extension.as_deref()).await {
                    Ok(members) => Ok(members.active().map(|t| t.name.clone()).collect()),
                    Err(err) if err.is_missing() => Ok(Vec::new()),
                    Err(err) => Err(err.to_string()),
                }
            }
        };
        PanelResponse {
            generation: self.generation,
            pills,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelResponse {
    pub generation: u64,
    pub pills: Result<Vec<String>, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Idle,
    /// Write the edited tag back to the collection.
    Save(Tag),
    /// Remove the tag from the collection.
    Delete,
    /// Pick a new file for the tag in the browser.
    Browse(AssetKind),
    Closed,
}

#[derive(Debug, Clone, Default)]
enum Panel {
    #[default]
    None,
    Loading,
    Loaded(Vec<String>),
}

#[derive(Debug)]
pub struct QuickEditor {
    menu: Menu<EditAction>,
    tag: Tag,
    step: f64,
    step_large: f64,
    panel: Panel,
    generation: u64,
}

impl QuickEditor {
    pub fn new(coordinator: MenuCoordinator, config: &EditorConfig) -> Self {
        Self {
            menu: Menu::new(coordinator)
                .with_override_keys([Key::Left, Key::Right])
                .with_drag_pixels(config.drag_pixels_per_step),
            tag: Tag::plain(""),
            step: config.strength_step,
            step_large: config.strength_step_large,
            panel: Panel::None,
            generation: 0,
        }
    }

    pub fn menu(&self) -> &Menu<EditAction> {
        &self.menu
    }

    pub fn menu_mut(&mut self) -> &mut Menu<EditAction> {
        &mut self.menu
    }

    pub fn is_open(&self) -> bool {
        self.menu.is_open()
    }

    /// The tag as edited so far.
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Start editing `tag`. Returns the panel fetch to run, if the kind
    /// has a panel.
    pub fn open(&mut self, tag: Tag) -> Option<PanelRequest> {
        self.generation += 1;
        self.tag = tag;
        let source = match self.tag.kind {
            TagKind::Lora => Some(PanelSource::LoraTriggers {
                file: self.tag.file_name(),
            }),
            TagKind::Group => Some(PanelSource::GroupMembers {
                name: self.tag.name.clone(),
                extension: self.tag.extension.clone(),
            }),
            TagKind::Tag | TagKind::Embedding => None,
        };
        self.panel = if source.is_some() {
            Panel::Loading
        } else {
            Panel::None
        };

        let options = self.build_options();
        self.menu.open(options);
        if !self.tag.kind.is_file_backed() {
            self.menu.set_filter_text(self.tag.name.clone());
        }
        source.map(|source| PanelRequest {
            generation: self.generation,
            source,
        })
    }

    /// Install the pill panel contents. Returns false for stale responses.
    pub fn apply_panel(&mut self, response: PanelResponse) -> bool {
        if response.generation != self.generation || !self.menu.is_open() {
            debug!(response = response.generation, current = self.generation, "stale panel dropped");
            return false;
        }
        let mut pills = match response.pills {
            Ok(pills) => pills,
            Err(err) => {
                debug!(tag = %self.tag.name, error = %err, "panel load failed");
                Vec::new()
            }
        };
        if self.tag.kind == TagKind::Lora {
            for trigger in &self.tag.triggers {
                if !pills.contains(trigger) {
                    pills.push(trigger.clone());
                }
            }
        }
        self.panel = Panel::Loaded(pills);
        self.rebuild();
        true
    }

    /// Point a file-backed tag at a different file.
    pub fn set_file(&mut self, name: &str, extension: Option<&str>) -> EditOutcome {
        self.tag.name = name.to_string();
        self.tag.extension = extension.map(str::to_string);
        self.rebuild();
        EditOutcome::Save(self.tag.clone())
    }

    fn rebuild(&mut self) {
        if !self.menu.is_open() {
            return;
        }
        let options = self.build_options();
        let highlighted = self.menu.highlighted();
        self.menu.set_options_keep_highlight(options, highlighted);
    }

    fn build_options(&self) -> Vec<MenuOption<EditAction>> {
        let kind = AssetKind::for_tag(self.tag.kind);
        let mut options = vec![MenuOption::title(match kind {
            Some(kind) => kind.label(),
            None => "tag",
        })];

        if self.tag.kind.is_file_backed() {
            options.push(
                MenuOption::control(ControlKind::NameShortcut, self.tag.name.clone(), EditAction::Rename)
                    .with_detail(self.tag.extension.clone().unwrap_or_default()),
            );
        } else {
            options.push(MenuOption::filter_input("name"));
        }

        options.push(
            MenuOption::control(ControlKind::Stepper, "strength", EditAction::Strength)
                .with_detail(format_strength(self.tag.effective_strength())),
        );

        match &self.panel {
            Panel::None => {}
            Panel::Loading => {
                options.push(MenuOption::separator());
                options.push(MenuOption::display("loading…"));
            }
            Panel::Loaded(pills) => {
                options.push(MenuOption::separator());
                let read_only = self.tag.kind == TagKind::Group;
                for pill in pills {
                    let mut option = MenuOption::control(
                        ControlKind::Pills,
                        pill.clone(),
                        EditAction::Trigger(pill.clone()),
                    );
                    if read_only {
                        option = option.disabled();
                    } else if self.tag.triggers.contains(pill) {
                        option = option.with_detail("on");
                    }
                    options.push(option);
                }
                if pills.is_empty() {
                    options.push(MenuOption::display(if read_only {
                        "no active members"
                    } else {
                        "no trigger words"
                    }));
                }
            }
        }

        options.push(MenuOption::separator());
        options.push(MenuOption::action("delete", EditAction::Delete));
        options
    }

    /// Indices of the pill options, for hosts that lay them out as a panel.
    pub fn pill_indices(&self) -> Vec<usize> {
        self.menu
            .options()
            .iter()
            .enumerate()
            .filter(|(_, o)| o.role == Role::Control(ControlKind::Pills))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn handle_key(&mut self, input: KeyInput) -> EditOutcome {
        let event = self.menu.handle_key(input);
        self.on_event(event)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> EditOutcome {
        let event = self.menu.handle_pointer(event);
        self.on_event(event)
    }

    /// Close the editor, deleting the tag if its free-text name was cleared.
    pub fn close(&mut self) -> EditOutcome {
        if !self.menu.close() {
            return EditOutcome::Idle;
        }
        self.finish()
    }

    fn finish(&self) -> EditOutcome {
        if !self.tag.kind.is_file_backed() && self.tag.name.trim().is_empty() {
            EditOutcome::Delete
        } else {
            EditOutcome::Closed
        }
    }

    fn on_event(&mut self, event: MenuEvent<EditAction>) -> EditOutcome {
        match event {
            MenuEvent::Adjust {
                delta_steps, large, ..
            } => self.adjust(delta_steps, large),
            MenuEvent::FilterChanged(text) => {
                self.tag.name = text.trim().to_string();
                if self.tag.name.is_empty() {
                    EditOutcome::Idle
                } else {
                    EditOutcome::Save(self.tag.clone())
                }
            }
            MenuEvent::Submitted(_) => self.close(),
            MenuEvent::Activated { action, .. } => match action {
                EditAction::Rename => match AssetKind::for_tag(self.tag.kind) {
                    Some(kind) => EditOutcome::Browse(kind),
                    None => EditOutcome::Idle,
                },
                EditAction::Strength => EditOutcome::Idle,
                EditAction::Trigger(word) => {
                    if self.tag.kind != TagKind::Lora {
                        return EditOutcome::Idle;
                    }
                    self.tag.toggle_trigger(&word);
                    self.rebuild();
                    EditOutcome::Save(self.tag.clone())
                }
                EditAction::Delete => {
                    self.menu.close();
                    EditOutcome::Delete
                }
            },
            MenuEvent::Closed => self.finish(),
            _ => EditOutcome::Idle,
        }
    }

    fn adjust(&mut self, delta_steps: i32, large: bool) -> EditOutcome {
        let step = if large { self.step_large } else { self.step };
        let value = self.tag.effective_strength() + f64::from(delta_steps) * step;
        self.tag.set_strength(value);
        self.rebuild();
        EditOutcome::Save(self.tag.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::Modifiers;
    use pretty_assertions::assert_eq;

    fn editor() -> QuickEditor {
        QuickEditor::new(MenuCoordinator::new(), &EditorConfig::default())
    }

    fn stepper_index(editor: &QuickEditor) -> usize {
        editor
            .menu()
            .options()
            .iter()
            .position(|o| o.role == Role::Control(ControlKind::Stepper))
            .unwrap()
    }

    fn saved(outcome: EditOutcome) -> Tag {
        match outcome {
            EditOutcome::Save(tag) => tag,
            other => panic!("expected save, got {other:?}"),
        }
    }

    fn step(editor: &mut QuickEditor, delta: i32, modifiers: Modifiers) -> EditOutcome {
        let index = stepper_index(editor);
        editor.handle_pointer(PointerEvent::Step {
            index,
            delta,
            modifiers,
        })
    }

    #[test]
    fn test_stepper_buttons_save_each_change() {
        let mut editor = editor();
        assert_eq!(editor.open(Tag::plain("sky")), None);

        let tag = saved(step(&mut editor, 1, Modifiers::NONE));
        assert_eq!(tag.strength, Some(1.05));
        let tag = saved(step(&mut editor, 1, Modifiers::SHIFT));
        assert_eq!(tag.strength, Some(1.3));
        let tag = saved(step(&mut editor, -1, Modifiers::SHIFT));
        assert_eq!(tag.strength, Some(1.05));
        let tag = saved(step(&mut editor, -1, Modifiers::NONE));
        assert_eq!(tag.strength, None);
    }

    #[test]
    fn test_arrow_keys_adjust_highlighted_stepper() {
        let mut editor = editor();
        editor.open(Tag::plain("sky").with_strength(0.8));
        let index = stepper_index(&editor);
        editor.menu_mut().set_highlighted(Some(index));

        let tag = saved(editor.handle_key(KeyInput::plain(Key::Left)));
        assert_eq!(tag.strength, Some(0.75));
        assert_eq!(
            editor.menu().options()[index].detail.as_deref(),
            Some("0.75")
        );
        assert_eq!(editor.menu().highlighted(), Some(index));
    }

    #[test]
    fn test_drag_adjusts_by_configured_pixels() {
        let mut editor = editor();
        editor.open(Tag::plain("sky"));
        let index = stepper_index(&editor);
        let tag = saved(editor.handle_pointer(PointerEvent::Drag {
            index,
            dx: 17,
            modifiers: Modifiers::NONE,
        }));
        assert_eq!(tag.strength, Some(1.1));
    }

    #[test]
    fn test_name_edits_save_live() {
        let mut editor = editor();
        editor.open(Tag::plain("sk"));
        assert_eq!(editor.menu().filter_text(), "sk");
        let tag = saved(editor.handle_key(KeyInput::plain(Key::Char('y'))));
        assert_eq!(tag.name, "sky");
    }

    #[test]
    fn test_closing_with_empty_name_deletes() {
        let mut editor = editor();
        editor.open(Tag::plain("a"));
        assert_eq!(
            editor.handle_key(KeyInput::plain(Key::Backspace)),
            EditOutcome::Idle
        );
        assert_eq!(
            editor.handle_key(KeyInput::plain(Key::Escape)),
            EditOutcome::Delete
        );
    }

    #[test]
    fn test_closing_normally() {
        let mut editor = editor();
        editor.open(Tag::plain("a"));
        assert_eq!(editor.close(), EditOutcome::Closed);
        assert_eq!(editor.close(), EditOutcome::Idle);
    }

    #[test]
    fn test_file_backed_name_opens_browser() {
        let mut editor = editor();
        editor.open(Tag::embedding("bad-hands").with_extension(".pt"));
        let index = editor
            .menu()
            .options()
            .iter()
            .position(|o| o.role == Role::Control(ControlKind::NameShortcut))
            .unwrap();
        assert!(!editor.menu().filter_focused());
        assert_eq!(
            editor.handle_pointer(PointerEvent::Activate {
                index,
                modifiers: Modifiers::NONE
            }),
            EditOutcome::Browse(AssetKind::Embedding)
        );

        let tag = saved(editor.set_file("good-hands", Some(".safetensors")));
        assert_eq!(tag.file_name(), "good-hands.safetensors");
    }

    #[test]
    fn test_lora_triggers_toggle() {
        let mut editor = editor();
        let request = editor
            .open(Tag::lora("ink").with_extension(".safetensors").with_triggers(["old"]))
            .unwrap();
        assert_eq!(
            request.source,
            PanelSource::LoraTriggers {
                file: "ink.safetensors".into()
            }
        );
        assert!(editor.apply_panel(PanelResponse {
            generation: request.generation,
            pills: Ok(vec!["ink wash".into(), "brush".into()]),
        }));
        let pills = editor.pill_indices();
        let labels: Vec<_> = pills
            .iter()
            .map(|&i| editor.menu().options()[i].label.clone())
            .collect();
        assert_eq!(labels, vec!["ink wash", "brush", "old"]);

        let tag = saved(editor.handle_pointer(PointerEvent::Activate {
            index: pills[1],
            modifiers: Modifiers::NONE,
        }));
        assert_eq!(tag.triggers, vec!["old".to_string(), "brush".to_string()]);

        let tag = saved(editor.handle_pointer(PointerEvent::Activate {
            index: pills[2],
            modifiers: Modifiers::NONE,
        }));
        assert_eq!(tag.triggers, vec!["brush".to_string()]);
    }

    #[test]
    fn test_group_members_are_read_only() {
        let mut editor = editor();
        let request = editor.open(Tag::group("look")).unwrap();
        editor.apply_panel(PanelResponse {
            generation: request.generation,
            pills: Ok(vec!["tagC".into()]),
        });
        let pill = editor.pill_indices()[0];
        assert!(editor.menu().options()[pill].disabled);
        assert_eq!(
            editor.handle_pointer(PointerEvent::Activate {
                index: pill,
                modifiers: Modifiers::NONE
            }),
            EditOutcome::Idle
        );
    }

    #[test]
    fn test_stale_panel_dropped() {
        let mut editor = editor();
        let first = editor.open(Tag::group("one")).unwrap();
        editor.open(Tag::group("two"));
        assert!(!editor.apply_panel(PanelResponse {
            generation: first.generation,
            pills: Ok(vec!["x".into()]),
        }));
    }

    #[test]
    fn test_delete_action() {
        let mut editor = editor();
        editor.open(Tag::plain("a"));
        let index = editor
            .menu()
            .options()
            .iter()
            .position(|o| o.label == "delete")
            .unwrap();
        assert_eq!(
            editor.handle_pointer(PointerEvent::Activate {
                index,
                modifiers: Modifiers::NONE
            }),
            EditOutcome::Delete
        );
        assert!(!editor.is_open());
    }
}
