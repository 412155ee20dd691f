//! Reading-frame aware token helpers.
//!
//! A token string is a plain `str` whose primitives are each `frame`
//! characters wide, so `"a1a2"` with a frame of 2 holds the tokens `a1` and
//! `a2`. All widths and offsets here count characters, never bytes.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip all whitespace so a line-wrapped stream file becomes one token string.
pub fn normalize_stream(text: &str) -> String {
    WHITESPACE.replace_all(text, "").into_owned()
}

/// Number of characters in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `n` characters of `s` (all of `s` if it is shorter).
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Byte offsets of every character boundary, including the end of the string.
fn boundaries(s: &str) -> Vec<usize> {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect()
}

/// Number of whole tokens in `s`.
pub fn token_count(s: &str, frame: usize) -> usize {
    char_len(s) / frame
}

/// Consecutive, token-aligned substrings that are `n` tokens long.
///
/// Duplicates are kept: `length_n_substrings("abab", 1, 1)` yields
/// `["a", "b", "a", "b"]`.
pub fn length_n_substrings(s: &str, n: usize, frame: usize) -> Vec<&str> {
    let tokens = token_count(s, frame);
    if n == 0 || tokens < n {
        return Vec::new();
    }
    let bounds = boundaries(s);
    let width = n * frame;
    (0..=tokens - n)
        .map(|i| &s[bounds[i * frame]..bounds[i * frame + width]])
        .collect()
}

/// Split `s` into its tokens.
pub fn split_tokens(s: &str, frame: usize) -> Vec<&str> {
    length_n_substrings(s, 1, frame)
}

/// All consecutive substrings from `min` to `max` tokens long, shortest first.
/// `max` defaults to the token count of `s`.
pub fn substrings(s: &str, min: usize, max: Option<usize>, frame: usize) -> Vec<&str> {
    let max = max.unwrap_or_else(|| token_count(s, frame));
    (min.max(1)..=max)
        .flat_map(|n| length_n_substrings(s, n, frame))
        .collect()
}

/// The first `n` tokens of `s`.
pub fn head(s: &str, n: usize, frame: usize) -> &str {
    char_prefix(s, n * frame)
}

/// The last `n` tokens of `s`.
pub fn tail(s: &str, n: usize, frame: usize) -> &str {
    let len = char_len(s);
    let skip = len.saturating_sub(n * frame);
    let bounds = boundaries(s);
    &s[bounds[skip]..]
}

/// Heads of `s` from `min` to `max` tokens long.
pub fn heads(s: &str, min: usize, max: Option<usize>, frame: usize) -> Vec<&str> {
    let max = max.unwrap_or_else(|| token_count(s, frame));
    (min..=max).map(|n| head(s, n, frame)).collect()
}

/// Tails of `s` from `min` to `max` tokens long.
pub fn tails(s: &str, min: usize, max: Option<usize>, frame: usize) -> Vec<&str> {
    let max = max.unwrap_or_else(|| token_count(s, frame));
    (min..=max).map(|n| tail(s, n, frame)).collect()
}

/// The `n`-token head and tail of `s`.
pub fn length_n_anchors(s: &str, n: usize, frame: usize) -> (&str, &str) {
    (head(s, n, frame), tail(s, n, frame))
}

/// All heads from `min` to `max` tokens, followed by all tails.
pub fn anchors(s: &str, min: usize, max: Option<usize>, frame: usize) -> Vec<&str> {
    let mut out = heads(s, min, max, frame);
    out.extend(tails(s, min, max, frame));
    out
}

/// Every `frame`-wide window of `stream`, taken at every character offset.
///
/// Handy for building an alphabet straight from a training stream when the
/// syllable inventory is not known up front.
pub fn primitives_from_stream(stream: &str, frame: usize) -> BTreeSet<String> {
    let bounds = boundaries(stream);
    let len = bounds.len() - 1;
    if frame == 0 || len < frame {
        return BTreeSet::new();
    }
    (0..=len - frame)
        .map(|i| stream[bounds[i]..bounds[i + frame]].to_string())
        .collect()
}
