//! Tag grammar: text ⇄ [`TagCollection`] conversion and group expansion.
//!
//! Recognized token forms, in priority order:
//!
//! ```text
//! group:<name>                  group reference
//! <lora:<name><ext>:<strength>> LoRA reference (strength optional)
//! (<name>:<strength>)           weighted tag; `(embedding:<name>:<s>)` is a weighted embedding
//! embedding:<name>              embedding reference
//! <name>:<number>               weighted tag, bare form
//! <name>                        plain tag
//! ```
//!
//! Everything in this module is side-effect free except [`serialize`], which
//! resolves group references through a [`GroupResolver`] and reports
//! resolution failures as notifications.

use tracing::{Level, debug};

use crate::BoxFuture;
use crate::notify;
use crate::tag::{Tag, TagCollection, TagKind, is_default_strength, round_strength, split_extension};

const GROUP_PREFIX: &str = "group:";
const EMBEDDING_PREFIX: &str = "embedding:";
const LORA_OPEN: &str = "<lora:";

/// Why a group reference could not be expanded.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GroupError {
    #[error("group not found: {0}")]
    Missing(String),

    #[error("failed to load group {name}: {reason}")]
    Failed { name: String, reason: String },

    #[error("group resolution unavailable")]
    Unavailable,
}

/// Supplies the contents of group files during serialization.
pub trait GroupResolver: Send + Sync {
    fn resolve<'a>(&'a self, group: &'a Tag) -> BoxFuture<'a, Result<TagCollection, GroupError>>;
}

/// Resolver used when no asset server is reachable: every group
/// contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGroups;

impl GroupResolver for NoGroups {
    fn resolve<'a>(&'a self, _group: &'a Tag) -> BoxFuture<'a, Result<TagCollection, GroupError>> {
        Box::pin(async { Err(GroupError::Unavailable) })
    }
}

// ── Tokenizing ──────────────────────────────────────────────────────

/// Split one line on commas that are not inside a parenthesized span.
///
/// Escaped parentheses (`\(`, `\)`) do not affect nesting. Tokens are
/// returned trimmed; empty tokens are dropped.
pub fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                tokens.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&line[start..]);

    tokens
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Escape structural parentheses so they are read back as literal text.
pub fn escape_parens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_backslash = false;
    for c in text.chars() {
        if (c == '(' || c == ')') && !prev_backslash {
            out.push('\\');
        }
        prev_backslash = c == '\\' && !prev_backslash;
        out.push(c);
    }
    out
}

fn unescape_parens(text: &str) -> String {
    text.replace("\\(", "(").replace("\\)", ")")
}

/// Parse a strength literal, rounded the way [`format_strength`] renders
/// it. Non-numeric input and anything rounding to the default multiplier
/// yield `None`.
fn parse_strength(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(round_strength)
        .filter(|v| !is_default_strength(*v))
}

/// Render a strength rounded to two decimals with at least one decimal
/// digit (`1.0`, `0.8`, `1.25`).
pub fn format_strength(value: f64) -> String {
    let rendered = format!("{}", round_strength(value));
    if rendered.contains('.') || rendered.contains('e') || !value.is_finite() {
        rendered
    } else {
        format!("{rendered}.0")
    }
}

/// Whether `text` is one parenthesized span from its first to its last char.
fn enclosing_parens(text: &str) -> Option<&str> {
    if !text.starts_with('(') || !text.ends_with(')') || text.ends_with("\\)") || text.len() < 2 {
        return None;
    }
    let mut depth = 0usize;
    let mut escaped = false;
    let last = text.len() - 1;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != last {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then(|| &text[1..last])
}

fn file_backed(kind: TagKind, file: &str, strength: Option<f64>) -> Option<Tag> {
    let (name, ext) = split_extension(file.trim());
    if name.is_empty() {
        return None;
    }
    let mut tag = Tag::new(kind, name);
    tag.extension = ext.map(str::to_string);
    tag.strength = strength;
    Some(tag)
}

fn parse_lora(inner: &str) -> Option<Tag> {
    match inner.rsplit_once(':') {
        Some((file, strength)) => file_backed(TagKind::Lora, file, parse_strength(strength)),
        None => file_backed(TagKind::Lora, inner, None),
    }
}

fn parse_embedding(rest: &str) -> Option<Tag> {
    match rest.rsplit_once(':') {
        Some((file, strength)) if strength.trim().parse::<f64>().is_ok() => {
            file_backed(TagKind::Embedding, file, parse_strength(strength))
        }
        _ => file_backed(TagKind::Embedding, rest, None),
    }
}

fn parse_weighted(inner: &str) -> Option<Tag> {
    let (name, strength) = inner.rsplit_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let strength = parse_strength(strength);
    if let Some(rest) = name.strip_prefix(EMBEDDING_PREFIX) {
        return file_backed(TagKind::Embedding, rest, strength);
    }
    let mut tag = Tag::plain(unescape_parens(name));
    tag.strength = strength;
    Some(tag)
}

fn parse_bare_weighted(text: &str) -> Option<Tag> {
    let (name, strength) = text.rsplit_once(':')?;
    let name = name.trim();
    if name.is_empty() || strength.trim().parse::<f64>().is_err() {
        return None;
    }
    let mut tag = Tag::plain(unescape_parens(name));
    tag.strength = parse_strength(strength);
    Some(tag)
}

/// Parse a single token into a tag. Returns `None` for empty input and for
/// tokens whose name part is empty.
pub fn parse_token(text: &str) -> Option<Tag> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(rest) = text.strip_prefix(GROUP_PREFIX) {
        let name = rest.trim();
        return (!name.is_empty()).then(|| Tag::group(name));
    }

    if text.starts_with(LORA_OPEN) && text.ends_with('>') {
        return parse_lora(&text[LORA_OPEN.len()..text.len() - 1]);
    }

    if let Some(inner) = enclosing_parens(text)
        && let Some(tag) = parse_weighted(inner)
    {
        return Some(tag);
    }

    if let Some(rest) = text.strip_prefix(EMBEDDING_PREFIX) {
        return parse_embedding(rest);
    }

    if let Some(tag) = parse_bare_weighted(text) {
        return Some(tag);
    }

    Some(Tag::plain(unescape_parens(text)))
}

/// Render one tag as a text token.
pub fn format_token(tag: &Tag) -> String {
    match tag.kind {
        TagKind::Group => format!("{GROUP_PREFIX}{}", tag.name),
        TagKind::Lora => format!(
            "{LORA_OPEN}{}:{}>",
            tag.file_name(),
            format_strength(tag.effective_strength())
        ),
        TagKind::Embedding => {
            let base = format!("{EMBEDDING_PREFIX}{}", tag.file_name());
            if tag.has_custom_strength() {
                format!("({base}:{})", format_strength(tag.effective_strength()))
            } else {
                base
            }
        }
        TagKind::Tag => {
            let name = escape_parens(&tag.name);
            if tag.has_custom_strength() {
                format!("({name}:{})", format_strength(tag.effective_strength()))
            } else {
                name
            }
        }
    }
}

/// Parse free text into a collection.
///
/// Each tag carries over `active` from a same-named entry in `prior`;
/// otherwise it starts active. Later duplicates are dropped.
pub fn parse_text(text: &str, prior: Option<&TagCollection>) -> TagCollection {
    let mut collection = TagCollection::new();
    for line in text.lines() {
        for token in split_tokens(line) {
            let Some(mut tag) = parse_token(token) else {
                debug!(token, "dropping unparseable token");
                continue;
            };
            // Activity and chosen triggers live only in the collection.
            if let Some(previous) = prior.and_then(|p| p.find(&tag.name)) {
                tag.active = previous.active;
                if tag.kind == previous.kind {
                    tag.triggers = previous.triggers.clone();
                }
            }
            collection.push(tag);
        }
    }
    collection
}

/// Render every tag (active or not) as editable text. Groups stay as
/// `group:<name>` references and triggers are not expanded.
pub fn format_text(collection: &TagCollection, separator: &str) -> String {
    collection
        .iter()
        .map(format_token)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Extract bare tag names from prompt text, stripping weighting and bracket
/// syntax. Whitespace inside a name is normalized to `_` so the result can
/// be compared with search results.
pub fn extract_tag_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for piece in text.split([',', '\n']) {
        let mut piece = piece.trim();
        if let Some(inner) = piece.strip_prefix(LORA_OPEN) {
            piece = inner.trim_end_matches('>');
        }
        let piece = piece
            .trim_start_matches(['(', '[', '{'])
            .trim_end_matches([')', ']', '}']);
        let piece = match piece.rsplit_once(':') {
            Some((name, weight)) if weight.trim().parse::<f64>().is_ok() => name,
            _ => piece,
        };
        let name = unescape_parens(piece.trim())
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn push_with_triggers(run: &mut Vec<String>, tag: &Tag) {
    run.push(format_token(tag));
    if tag.kind == TagKind::Lora {
        run.extend(tag.triggers.iter().filter(|t| !t.is_empty()).cloned());
    }
}

fn flush(parts: &mut Vec<String>, run: &mut Vec<String>, separator: &str) {
    if !run.is_empty() {
        parts.push(run.join(separator));
        run.clear();
    }
}

async fn expand_group<R: GroupResolver + ?Sized>(
    group: &Tag,
    separator: &str,
    resolver: &R,
) -> Option<String> {
    let members = match resolver.resolve(group).await {
        Ok(members) => members,
        Err(GroupError::Unavailable) => {
            debug!(group = %group.name, "group resolution unavailable, skipping");
            return None;
        }
        Err(err) => {
            notify::report(Level::WARN, &format!("{err}"));
            return None;
        }
    };

    let mut run = Vec::new();
    for member in members.active() {
        if member.kind == TagKind::Group {
            debug!(group = %group.name, nested = %member.name, "nested group reference skipped");
            continue;
        }
        push_with_triggers(&mut run, member);
    }
    if run.is_empty() {
        return None;
    }

    let block = run.join(separator);
    if group.has_custom_strength() {
        Some(format!("({block}:{:.2})", group.effective_strength()))
    } else {
        Some(block)
    }
}

/// Serialize the active tags of a collection for downstream consumption.
///
/// Consecutive non-group tags form runs; each group reference is expanded
/// in place into its own active members, wrapped as one weighted block when
/// the reference carries a strength. A group that fails to resolve
/// contributes nothing.
pub async fn serialize<R: GroupResolver + ?Sized>(
    collection: &TagCollection,
    separator: &str,
    resolver: &R,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run: Vec<String> = Vec::new();

    for tag in collection.active() {
        if tag.kind == TagKind::Group {
            flush(&mut parts, &mut run, separator);
            if let Some(block) = expand_group(tag, separator, resolver).await {
                parts.push(block);
            }
        } else {
            push_with_triggers(&mut run, tag);
        }
    }
    flush(&mut parts, &mut run, separator);

    parts.retain(|p| !p.trim().is_empty());
    parts.join(separator)
}
