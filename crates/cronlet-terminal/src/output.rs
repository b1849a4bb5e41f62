//! Turning raw child-process output into the text stored on an execution row.
//!
//! Escape sequences are stripped, stdout and stderr are joined, and anything
//! past the configured budget is cut out of the middle so both the start of
//! the run and its final lines survive.

/// Strip ANSI escape codes and decode lossily as UTF-8.
pub fn clean(raw: &[u8]) -> String {
    let stripped = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&stripped).into_owned()
}

/// Join cleaned stdout and stderr into one capture, stdout first.
pub fn combine(stdout: &[u8], stderr: &[u8], max_chars: usize) -> String {
    let mut text = clean(stdout);
    let err = clean(stderr);
    if !err.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&err);
    }
    clip(&text, max_chars)
}

/// Keep at most `max_chars` characters, dropping the middle.
pub fn clip(text: &str, max_chars: usize) -> String {
    // byte length bounds char count from above
    if text.len() <= max_chars {
        return text.to_owned();
    }
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_owned();
    }

    let keep_head = max_chars / 2;
    let keep_tail = max_chars - keep_head;
    let omitted = total - max_chars;

    let head: String = text.chars().take(keep_head).collect();
    let tail: String = text.chars().skip(total - keep_tail).collect();
    format!("{head}\n... [{omitted} chars omitted] ...\n{tail}")
}
