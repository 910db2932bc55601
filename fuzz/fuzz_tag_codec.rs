//! Fuzz target for the prompt text grammar.
//!
//! Run with: cargo +nightly fuzz run fuzz_tag_codec
//!
//! Parses arbitrary text, renders it back and parses again. The first byte
//! also picks a caret position for the word finder.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pillbox_core::autocomplete::current_word;
use pillbox_core::codec::{extract_tag_names, format_text};
use pillbox_core::parse_text;

fuzz_target!(|data: &[u8]| {
    let Some((&caret, rest)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };

    let collection = parse_text(text, None);
    let rendered = format_text(&collection, ", ");
    let reparsed = parse_text(&rendered, Some(&collection));
    assert!(reparsed.iter().all(|tag| !tag.name.is_empty()));

    let _ = extract_tag_names(text);
    let caret = usize::from(caret) % (text.chars().count() + 1);
    if let Some(word) = current_word(text, caret, 1) {
        assert!(word.start <= word.end && word.end <= text.chars().count());
    }
});
