//! Line-level helpers for the Junos set-configuration language.
//!
//! Statements are flat, whitespace-delimited and prefix-nested, one per
//! line. Values that are not plain words are wrapped in double quotes with
//! `"` and `\` escaped, which is how the device itself prints them.
//!
//! # Example
//!
//! ```
//! use junos_cfg_common::codec::{quote, unquote};
//!
//! assert_eq!(quote("POL1"), "POL1");
//! assert_eq!(quote("peer in lab"), "\"peer in lab\"");
//! assert_eq!(unquote("\"peer in lab\""), "peer in lab");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading keyword of a statement that adds configuration.
pub const SET_LS: &str = "set ";

/// Leading keyword of a statement that removes configuration.
pub const DELETE_LS: &str = "delete ";

/// Opening marker of a `show configuration` text reply.
pub const CONFIG_OUTPUT_START: &str = "<configuration-output>";

/// Closing marker of a `show configuration` text reply.
pub const CONFIG_OUTPUT_END: &str = "</configuration-output>";

/// Values made only of these characters are emitted without quotes.
static BARE_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:/@+,=-]+$").expect("Invalid regex pattern"));

/// Characters escaped inside a quoted value: `"` and `\`.
static QUOTE_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(["\\])"#).expect("Invalid regex pattern"));

static QUOTE_UNESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\\(["\\])"#).expect("Invalid regex pattern"));

/// Quotes a value for use in a statement.
///
/// Plain words pass through unchanged; anything containing spaces, quotes
/// or other special characters (including the empty string) is wrapped in
/// double quotes with `"` and `\` escaped.
pub fn quote(value: &str) -> String {
    if BARE_WORD_RE.is_match(value) {
        value.to_string()
    } else {
        let escaped = QUOTE_ESCAPE_RE.replace_all(value, r"\$1");
        format!("\"{}\"", escaped)
    }
}

/// Reverses [`quote`]: strips surrounding double quotes and unescapes.
///
/// Unquoted input is returned trimmed but otherwise unchanged.
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        QUOTE_UNESCAPE_RE.replace_all(inner, "$1").into_owned()
    } else {
        value.to_string()
    }
}

/// Removes `prefix` from the front of `s` if present.
///
/// Returns true (and advances `s`) when the prefix matched.
pub fn cut_prefix(s: &mut &str, prefix: &str) -> bool {
    match s.strip_prefix(prefix) {
        Some(rest) => {
            *s = rest;
            true
        }
        None => false,
    }
}

/// Matches a statement keyword at the start of `rest`.
///
/// `rest` matches when it equals `keyword` or continues with a space after
/// it; the text following the keyword is returned. A keyword never matches
/// a longer word (`export` does not match `exports`).
pub fn match_keyword<'a>(rest: &'a str, keyword: &str) -> Option<&'a str> {
    let after = rest.strip_prefix(keyword)?;
    if after.is_empty() {
        Some(after)
    } else {
        after.strip_prefix(' ').map(str::trim_start)
    }
}

/// Splits the first token off `s`.
///
/// A token starting with `"` extends to the matching unescaped quote and is
/// returned with its quotes; otherwise it extends to the next space.
pub fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    if s.starts_with('"') {
        let mut escaped = false;
        for (idx, c) in s.char_indices().skip(1) {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    let end = idx + c.len_utf8();
                    return (&s[..end], s[end..].trim_start());
                }
                _ => escaped = false,
            }
        }
        return (s, "");
    }
    match s.split_once(' ') {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (s, ""),
    }
}

/// Extracts the statement lines of a `show configuration` text reply.
///
/// The `<configuration-output>` framing is removed, reading stops at the
/// closing marker, and blank or comment lines are dropped.
pub fn config_output_lines(reply: &str) -> Vec<&str> {
    let body = match reply.find(CONFIG_OUTPUT_START) {
        Some(idx) => &reply[idx + CONFIG_OUTPUT_START.len()..],
        None => reply,
    };
    let body = match body.find(CONFIG_OUTPUT_END) {
        Some(idx) => &body[..idx],
        None => body,
    };

    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
