//! Property-based tests for text chunk planning

use proptest::prelude::*;

use crate::core::voice::chunking::plan;

/// Prose-like text: words, sentence ends, line and paragraph breaks.
fn prose() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            6 => "[a-zA-Z]{1,12}",
            2 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("? ".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
            1 => "[éßü日本語]{1,3}",
        ],
        1..120,
    )
    .prop_map(|parts| parts.concat())
    .prop_filter("needs visible text", |s| !s.trim().is_empty())
}

proptest! {
    #[test]
    fn reassembly_reproduces_input(text in prose(), max in 1usize..80) {
        let chunks = plan(&text, max).unwrap();
        prop_assert_eq!(chunks.reassemble(), text);
    }

    #[test]
    fn chunks_respect_limit_and_trim(text in prose(), max in 1usize..80) {
        let chunks = plan(&text, max).unwrap();
        prop_assert!(!chunks.is_empty());
        for (i, chunk) in chunks.chunks().iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            prop_assert!(!chunk.text.is_empty());
            prop_assert!(chunk.char_count() <= max);
            prop_assert_eq!(chunk.text.trim(), chunk.text.as_str());
        }
    }

    #[test]
    fn text_within_limit_is_single_chunk(text in prose()) {
        let max = text.trim().chars().count();
        let chunks = plan(&text, max).unwrap();
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(chunks.chunks()[0].text.as_str(), text.trim());
    }

    #[test]
    fn whitespace_only_text_is_rejected(text in "[ \t\n]{0,20}") {
        prop_assert!(plan(&text, 10).is_err());
    }
}
