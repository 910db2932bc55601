//! Locating the word under the caret.
//!
//! All positions are char indices, not byte offsets.

/// Characters that end a word for autocomplete purposes.
pub const SEPARATORS: [char; 12] = [',', '\n', '(', ')', '[', ']', '{', '}', '|', '<', '>', ':'];

/// Joiner that replaces internal whitespace in a word.
pub const WORD_JOINER: char = '_';

pub fn is_separator(c: char) -> bool {
    SEPARATORS.contains(&c)
}

/// The word being typed, as a char range of the surface text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub start: usize,
    pub end: usize,
    /// Text of the range as typed.
    pub raw: String,
    /// Search form: trimmed, whitespace runs replaced with `_`.
    pub normalized: String,
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(&WORD_JOINER.to_string())
}

/// The trailing run of text before `caret` that contains no separator.
///
/// Leading whitespace is not part of the word. Returns `None` when the
/// normalized word is shorter than `min_len` chars.
pub fn current_word(text: &str, caret: usize, min_len: usize) -> Option<Word> {
    let before: Vec<char> = text.chars().take(caret).collect();
    let caret = before.len();

    let mut start = caret;
    while start > 0 && !is_separator(before[start - 1]) {
        start -= 1;
    }
    while start < caret && before[start].is_whitespace() {
        start += 1;
    }

    let raw: String = before[start..caret].iter().collect();
    let normalized = normalize(&raw);
    if normalized.chars().count() < min_len.max(1) {
        return None;
    }
    Some(Word {
        start,
        end: caret,
        raw,
        normalized,
    })
}

/// Whether the char just before or at `caret` is a separator.
pub fn touches_separator(text: &str, caret: usize) -> bool {
    let before = caret.checked_sub(1).and_then(|i| text.chars().nth(i));
    let at = text.chars().nth(caret);
    before.is_some_and(is_separator) || at.is_some_and(is_separator)
}

/// Whether the text after `caret` already begins, after spaces, with a
/// separator.
pub fn separator_follows(text: &str, caret: usize) -> bool {
    text.chars()
        .skip(caret)
        .find(|c| *c != ' ' && *c != '\t')
        .is_some_and(|c| c == ',' || c == '\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(text: &str) -> Option<Word> {
        current_word(text, text.chars().count(), 2)
    }

    #[test]
    fn test_word_after_comma() {
        let w = word("sky, blu").unwrap();
        assert_eq!((w.start, w.end), (5, 8));
        assert_eq!(w.normalized, "blu");
    }

    #[test]
    fn test_internal_whitespace_is_joined() {
        let w = word("a, blue  sky").unwrap();
        assert_eq!(w.raw, "blue  sky");
        assert_eq!(w.normalized, "blue_sky");
    }

    #[test]
    fn test_each_separator_ends_a_word() {
        for sep in SEPARATORS {
            let text = format!("xx{sep}ab");
            assert_eq!(word(&text).unwrap().normalized, "ab", "{sep:?}");
        }
    }

    #[test]
    fn test_min_length() {
        assert_eq!(word("a, b"), None);
        assert_eq!(word("a, "), None);
        assert_eq!(word("(x:"), None);
        assert!(current_word("a, b", 4, 1).is_some());
    }

    #[test]
    fn test_caret_in_middle() {
        let w = current_word("blue sky, red", 4, 2).unwrap();
        assert_eq!(w.normalized, "blue");
        assert_eq!(w.end, 4);
    }

    #[test]
    fn test_multibyte_positions_are_chars() {
        let w = word("ä, ümlaut").unwrap();
        assert_eq!((w.start, w.end), (3, 9));
    }

    #[test]
    fn test_touches_separator() {
        assert!(touches_separator("a,b", 2));
        assert!(touches_separator("a,b", 1));
        assert!(!touches_separator("ab, c", 1));
        assert!(!touches_separator("", 0));
    }

    #[test]
    fn test_separator_follows() {
        assert!(separator_follows("ab , cd", 2));
        assert!(!separator_follows("ab cd", 2));
        assert!(!separator_follows("ab", 2));
    }
}
