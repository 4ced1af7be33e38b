//! Utility functions for text processing and message splitting.

/// One bounded piece of a longer text payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChunk {
    /// Position of the chunk in the original text, starting at 0.
    pub index: usize,
    /// Chunk content.
    pub content: String,
}

/// Splits `text` into ordered chunks of at most `max_chars` characters.
///
/// Splitting happens on `char` boundaries, so multi-byte characters are never
/// cut in half. Concatenating the chunks in order reproduces `text` exactly.
///
/// An empty `text` yields a single empty chunk, never an empty vector.
/// A `max_chars` of zero is treated as one.
///
/// # Examples
///
/// ```
/// use teledock_core::utils::chunk_text;
/// let chunks = chunk_text("Привет, мир!", 6);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0].content, "Привет");
/// assert_eq!(chunks[1].content, ", мир!");
/// ```
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<MessageChunk> {
    let max_chars = max_chars.max(1);

    if text.is_empty() {
        return vec![MessageChunk {
            index: 0,
            content: String::new(),
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (pos, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(MessageChunk {
                index: chunks.len(),
                content: text[start..pos].to_string(),
            });
            start = pos;
            count = 0;
        }
        count += 1;
    }

    chunks.push(MessageChunk {
        index: chunks.len(),
        content: text[start..].to_string(),
    });

    chunks
}

/// Packs whole entries into messages of at most `max_chars` characters.
///
/// Entries are joined with `separator` and are never split, so any markup
/// inside an entry stays balanced. An entry that alone exceeds the limit is
/// emitted as its own message.
///
/// # Examples
///
/// ```
/// use teledock_core::utils::pack_entries;
/// let entries = vec!["aaa".to_string(), "bbb".to_string(), "ccc".to_string()];
/// let parts = pack_entries(&entries, "\n", 7);
/// assert_eq!(parts, vec!["aaa\nbbb", "ccc"]);
/// ```
#[must_use]
pub fn pack_entries(entries: &[String], separator: &str, max_chars: usize) -> Vec<String> {
    let separator_len = separator.chars().count();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for entry in entries {
        let entry_len = entry.chars().count();

        if !current.is_empty() && current_len + separator_len + entry_len > max_chars {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push_str(separator);
            current_len += separator_len;
        }
        current.push_str(entry);
        current_len += entry_len;
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use teledock_core::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}
