/// Maximum byte length of a single metadata text value on Cardano.
pub const METADATA_CHUNK_LEN: usize = 64;

/// Split `text` into segments of at most `max_len` bytes.
///
/// Segments never split a UTF-8 character, and joining them gives back the
/// input. The result is never empty: `""` yields `[""]`. A character wider
/// than `max_len` is emitted on its own.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(text.len().div_ceil(max_len.max(1)));
    let mut start = 0;
    let mut end = 0;

    for (idx, ch) in text.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > max_len && end > start {
            chunks.push(text[start..end].to_string());
            start = end;
        }
        end = next;
    }
    chunks.push(text[start..end].to_string());

    chunks
}
