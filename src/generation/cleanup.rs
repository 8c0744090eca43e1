//! Deterministic cleanup of free-text model replies.
//!
//! Tutor answers and diagram explanations are shown in a terminal and laid
//! out into PDF blocks, so stray carriage returns, invisible characters and
//! runs of blank lines matter. The rules run in order: normalise line endings
//! before trimming, trim before collapsing blank lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a reply.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Trim trailing whitespace per line
/// 3. Collapse 3+ consecutive blank lines down to 2
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Ensure the text ends with exactly one newline
pub fn clean_reply(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "動量\u{200B}守恆\u{FEFF}";
        assert_eq!(remove_invisible_chars(input), "動量守恆");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_clean_reply_full() {
        let input = "What do you think happens to p?   \r\n\r\n\r\n\r\n\r\nTry it.\u{200B}";
        let out = clean_reply(input);
        assert_eq!(out, "What do you think happens to p?\n\n\nTry it.\n");
    }
}
