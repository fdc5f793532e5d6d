//! Markdown to terminal styling
//!
//! A handful of regex substitutions; no parsing, no nesting rules.

use once_cell::sync::Lazy;
use regex::Regex;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const CODE: &str = "\x1b[0;37m";

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_+.-]*\n)?(.*?)```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static BOLD_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*\n]+)\*\*|\*([^*\n]+)\*").unwrap());
static ITALIC_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b_([^_\n]+)_\b").unwrap());

/// Replace bold, italic, inline code and fenced code markers with ANSI styling.
///
/// Code is styled first so its contents are not mistaken for emphasis markers
/// belonging to the surrounding text.
pub fn format_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = FENCED_CODE.replace_all(text, format!("{CODE}${{1}}{RESET}").as_str());
    let text = INLINE_CODE.replace_all(&text, format!("{CODE}${{1}}{RESET}").as_str());
    let text = BOLD_TEXT.replace_all(&text, format!("{BOLD}${{1}}${{2}}{RESET}").as_str());
    let text = ITALIC_TEXT.replace_all(&text, format!("{ITALIC}${{1}}{RESET}").as_str());
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_plain_text_unchanged() {
        assert_eq!(format_markdown(""), "");
        assert_eq!(format_markdown("Nothing to style here."), "Nothing to style here.");
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(format_markdown("a *b* c"), "a \x1b[1mb\x1b[0m c");
        assert_eq!(format_markdown("a **b** c"), "a \x1b[1mb\x1b[0m c");
        assert_eq!(format_markdown("an _aside_ here"), "an \x1b[3maside\x1b[0m here");
    }

    #[test]
    fn test_snake_case_is_not_italic() {
        assert_eq!(format_markdown("call my_func_name now"), "call my_func_name now");
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(
            format_markdown("run `cargo test` now"),
            "run \x1b[0;37mcargo test\x1b[0m now"
        );
    }

    #[test]
    fn test_fenced_code_drops_language_tag() {
        assert_eq!(
            format_markdown("```rust\nlet x = 1;\n```"),
            "\x1b[0;37mlet x = 1;\n\x1b[0m"
        );
    }
}
