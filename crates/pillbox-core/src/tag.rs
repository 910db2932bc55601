//! Tag records and ordered, name-unique tag collections.
//!
//! A [`TagCollection`] is the live-bound model behind a pill widget: every
//! mutation is expected to be followed by re-serialization, there is no
//! separate commit step.

use serde::{Deserialize, Serialize};

/// Two strengths closer than this are considered equal; a strength within
/// this distance of `1.0` is the default and is never serialized.
pub const STRENGTH_EPSILON: f64 = 1e-4;

/// File extensions recognized as part of a model file name.
pub const MODEL_EXTENSIONS: [&str; 5] = [".safetensors", ".ckpt", ".pt", ".pth", ".bin"];

/// Whether a strength value is equivalent to the default multiplier.
pub fn is_default_strength(value: f64) -> bool {
    (value - 1.0).abs() < STRENGTH_EPSILON
}

/// Round a strength to the two decimals the editor works in.
pub fn round_strength(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split a known model extension off the end of a file name.
///
/// Matching is case-insensitive; the extension is returned as written.
pub fn split_extension(file: &str) -> (&str, Option<&str>) {
    let lower = file.to_ascii_lowercase();
    for ext in MODEL_EXTENSIONS {
        if lower.ends_with(ext) && file.len() > ext.len() {
            let cut = file.len() - ext.len();
            return (&file[..cut], Some(&file[cut..]));
        }
    }
    (file, None)
}

/// Discriminant for the different tag variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// A plain word, optionally weighted.
    Tag,
    /// A textual-inversion embedding reference.
    Embedding,
    /// A LoRA model reference.
    Lora,
    /// A reference to an externally stored tag group.
    Group,
}

impl TagKind {
    /// Kinds whose name is a path to a model file on the server.
    pub fn is_file_backed(self) -> bool {
        matches!(self, TagKind::Embedding | TagKind::Lora)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::Tag => "tag",
            TagKind::Embedding => "embedding",
            TagKind::Lora => "lora",
            TagKind::Group => "group",
        }
    }
}

fn default_active() -> bool {
    true
}

fn strength_is_default(strength: &Option<f64>) -> bool {
    strength.is_none_or(is_default_strength)
}

/// One annotated entry in a tag collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: TagKind,

    /// `None` and any value within [`STRENGTH_EPSILON`] of `1.0` are
    /// equivalent.
    #[serde(default, skip_serializing_if = "strength_is_default")]
    pub strength: Option<f64>,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Extra words emitted after an active LoRA.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl Tag {
    pub fn new(kind: TagKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            strength: None,
            active: true,
            triggers: Vec::new(),
            extension: None,
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(TagKind::Tag, name)
    }

    pub fn lora(name: impl Into<String>) -> Self {
        Self::new(TagKind::Lora, name)
    }

    pub fn embedding(name: impl Into<String>) -> Self {
        Self::new(TagKind::Embedding, name)
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(TagKind::Group, name)
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.set_strength(strength);
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The multiplier this tag applies, defaulting to `1.0`.
    pub fn effective_strength(&self) -> f64 {
        self.strength.unwrap_or(1.0)
    }

    /// Whether the strength differs from the default multiplier.
    pub fn has_custom_strength(&self) -> bool {
        !strength_is_default(&self.strength)
    }

    /// Set the strength, rounding to two decimals and normalizing the
    /// default multiplier to `None`.
    pub fn set_strength(&mut self, value: f64) {
        let rounded = round_strength(value);
        self.strength = if is_default_strength(rounded) {
            None
        } else {
            Some(rounded)
        };
    }

    /// Name plus extension, as the file is known on the server.
    pub fn file_name(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}{}", self.name, ext),
            None => self.name.clone(),
        }
    }

    /// Toggle a trigger word: removes it when present, appends otherwise.
    /// Returns whether the word is now present.
    pub fn toggle_trigger(&mut self, word: &str) -> bool {
        if let Some(pos) = self.triggers.iter().position(|t| t == word) {
            self.triggers.remove(pos);
            false
        } else {
            self.triggers.push(word.to_string());
            true
        }
    }
}

/// Ordered list of tags, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagCollection {
    tags: Vec<Tag>,
}

impl TagCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, dropping empty names and later duplicates.
    pub fn from_tags<I: IntoIterator<Item = Tag>>(tags: I) -> Self {
        let mut collection = Self::new();
        for tag in tags {
            collection.push(tag);
        }
        collection
    }

    /// Load a persisted collection. Entries are re-validated so that a
    /// hand-edited file cannot introduce duplicates or empty names.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let tags: Vec<Tag> = serde_json::from_str(json)?;
        Ok(Self::from_tags(tags))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let tags: Vec<Tag> = serde_json::from_value(value)?;
        Ok(Self::from_tags(tags))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.tags)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.tags)
    }

    /// Append a tag. Returns `false` (and changes nothing) when the name is
    /// empty or already present.
    pub fn push(&mut self, tag: Tag) -> bool {
        if tag.name.is_empty() || self.contains(&tag.name) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.tags.iter().position(|t| t.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.tags.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tag> {
        self.tags.get_mut(index)
    }

    pub fn find(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// Replace the tag at `index`. Rejected when the new name is empty or
    /// collides with a different entry.
    pub fn replace(&mut self, index: usize, tag: Tag) -> bool {
        if tag.name.is_empty() || index >= self.tags.len() {
            return false;
        }
        if matches!(self.position(&tag.name), Some(other) if other != index) {
            return false;
        }
        self.tags[index] = tag;
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Tag> {
        (index < self.tags.len()).then(|| self.tags.remove(index))
    }

    /// Flip `active` on the tag at `index`, returning the new state.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let tag = self.tags.get_mut(index)?;
        tag.active = !tag.active;
        Some(tag.active)
    }

    /// Move the tag at `from` so it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tags.len() || to >= self.tags.len() {
            return false;
        }
        let tag = self.tags.remove(from);
        self.tags.insert(to, tag);
        true
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn active(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.active)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.tags
    }
}

impl<'a> IntoIterator for &'a TagCollection {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl FromIterator<Tag> for TagCollection {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self::from_tags(iter)
    }
}
