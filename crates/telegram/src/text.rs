/// Telegram message size limit, in bytes of UTF-8.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

fn char_boundary_at_or_before(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0)
}

/// Split `text` into pieces of at most `max_len` bytes, preferring to break
/// at a newline, then at a space.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while remaining.len() > max_len {
        let mut window = char_boundary_at_or_before(remaining, max_len);
        if window == 0 {
            window = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }

        let slice = &remaining[..window];
        let split_at = match slice.rfind('\n').or_else(|| slice.rfind(' ')) {
            Some(0) | None => window,
            Some(i) => i,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches(['\n', ' ']);
    }
    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}
