//! Chat text normalization applied by the relay before fan-out.

/// Default cap on sanitized chat length, in characters.
pub const DEFAULT_MAX_CHAT_LEN: usize = 1000;

/// Strip control characters (tab and newline survive), squeeze runs of
/// three or more spaces down to two, trim, and cap at `max_len` characters.
///
/// Returns an empty string when nothing printable is left.
pub fn sanitize_chat_text(raw: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(raw.len().min(max_len * 4));
    let mut spaces = 0usize;

    for c in raw.chars() {
        if c.is_control() && c != '\t' && c != '\n' {
            continue;
        }
        if c == ' ' {
            spaces += 1;
            if spaces > 2 {
                continue;
            }
        } else {
            spaces = 0;
        }
        out.push(c);
    }

    let trimmed = out.trim();
    let capped: String = trimmed.chars().take(max_len).collect();
    capped.trim_end().to_string()
}
