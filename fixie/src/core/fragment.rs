//! Text transforms applied to body lines and fragments.

use std::sync::LazyLock;

use regex::Regex;

/// Marker that starts a trailing comment in a fixie body line.
pub const COMMENT_MARKER: &str = "//";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip a trailing comment and trailing semicolons from a body line.
///
/// The comment is cut at the first `//` even inside quotes, so
/// `curl https://example.com` becomes `curl https:`.
pub fn clean_line(line: &str) -> &str {
    let code = match line.find(COMMENT_MARKER) {
        Some(at) => &line[..at],
        None => line,
    };
    code.trim_end_matches(';')
}

/// Fragment text with trailing newlines removed and a terminator appended
/// unless it already ends in `;`, `&` or `|`.
///
/// The terminator is a newline, so a trailing heredoc delimiter stays on a
/// line of its own.
pub fn terminate(fragment: &str) -> String {
    let mut text = fragment.trim_end_matches(['\n', '\r']).to_string();
    if !text.ends_with([';', '&', '|']) {
        text.push('\n');
    }
    text
}

/// Single-line rendering of a fragment: newlines shown as ` ↩ `, whitespace collapsed.
pub fn display(fragment: &str) -> String {
    let visible = fragment
        .trim()
        .replace('\n', " ↩ ")
        .replace('\r', " ↩ ");
    WHITESPACE_RUN.replace_all(&visible, " ").into_owned()
}
