use proptest::prelude::*;
use teledock_core::utils::{chunk_text, pack_entries};

proptest! {
    /// Concatenating the chunks in order reproduces the input exactly.
    #[test]
    fn chunks_reassemble_to_input(s in "\\PC*", max in 1usize..64) {
        let chunks = chunk_text(&s, max);
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        prop_assert_eq!(joined, s);
    }

    /// No chunk exceeds the limit and only the last one may be shorter.
    #[test]
    fn chunks_respect_the_limit(s in "\\PC+", max in 1usize..64) {
        let chunks = chunk_text(&s, max);
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let len = chunk.content.chars().count();
            prop_assert!(len <= max, "chunk {} has {} chars, limit {}", i, len, max);
            if i != last {
                prop_assert_eq!(len, max);
            }
            prop_assert_eq!(chunk.index, i);
        }
    }

    /// Packing never drops, reorders or splits entries.
    #[test]
    fn packing_preserves_entries(
        entries in proptest::collection::vec("[a-z<>/]{1,20}", 0..30),
        max in 1usize..80
    ) {
        let parts = pack_entries(&entries, "\n\n", max);
        let rejoined: Vec<String> = parts
            .iter()
            .flat_map(|p| p.split("\n\n").map(str::to_string))
            .collect();
        prop_assert_eq!(rejoined, entries);
    }
}

#[test]
fn empty_text_yields_one_empty_chunk() {
    for max in [1, 10, 3000] {
        let chunks = chunk_text("", max);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.is_empty());
    }
}
