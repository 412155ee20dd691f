//! Post-hoc comparison of token strings.
//!
//! None of this feeds back into the model. It exists to judge a finished
//! segmentation, e.g. how close each learned unit is to the words of the
//! language the stream was generated from. Positions are token indices,
//! not character offsets.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::tokens::{head, split_tokens, token_count};

/// A substring of `s1` found in `s2`, with every `(pos_in_s1, pos_in_s2)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SharedSubstring {
    pub substring: String,
    pub positions: Vec<(usize, usize)>,
}

/// Every `n`-token substring of `s1` that also occurs in `s2`, in `s1` order.
pub fn shared_length_n_substrings(
    s1: &str,
    s2: &str,
    n: usize,
    frame: usize,
) -> Vec<SharedSubstring> {
    let t1 = split_tokens(s1, frame);
    let t2 = split_tokens(s2, frame);
    if n == 0 || t1.len() < n || t2.len() < n {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for i in 0..=t1.len() - n {
        let window = &t1[i..i + n];
        let positions: Vec<(usize, usize)> = (0..=t2.len() - n)
            .filter(|&j| &t2[j..j + n] == window)
            .map(|j| (i, j))
            .collect();
        if !positions.is_empty() {
            hits.push(SharedSubstring {
                substring: window.concat(),
                positions,
            });
        }
    }
    hits
}

/// Shared substrings of every length, shortest first, skipping empty lengths.
pub fn shared_substrings(s1: &str, s2: &str, frame: usize) -> Vec<Vec<SharedSubstring>> {
    (1..=token_count(s1, frame))
        .map(|n| shared_length_n_substrings(s1, s2, n, frame))
        .filter(|hits| !hits.is_empty())
        .collect()
}

/// All shared substrings of the greatest shared length.
pub fn longest_shared_substrings(s1: &str, s2: &str, frame: usize) -> Vec<SharedSubstring> {
    (1..=token_count(s1, frame))
        .rev()
        .map(|n| shared_length_n_substrings(s1, s2, n, frame))
        .find(|hits| !hits.is_empty())
        .unwrap_or_default()
}

/// Length in tokens of the longest shared substring, 0 if nothing is shared.
pub fn longest_shared_substring_length(s1: &str, s2: &str, frame: usize) -> usize {
    longest_shared_substrings(s1, s2, frame)
        .first()
        .map_or(0, |hit| token_count(&hit.substring, frame))
}

/// `n`-token substrings of `s1` that never occur in `s2`, with their position in `s1`.
pub fn novel_length_n_substrings(
    s1: &str,
    s2: &str,
    n: usize,
    frame: usize,
) -> Vec<(String, usize)> {
    let t1 = split_tokens(s1, frame);
    let t2 = split_tokens(s2, frame);
    if n == 0 || t1.len() < n {
        return Vec::new();
    }
    let seen: HashSet<&[&str]> = if t2.len() >= n {
        t2.windows(n).collect()
    } else {
        HashSet::new()
    };
    t1.windows(n)
        .enumerate()
        .filter(|(_, w)| !seen.contains(w))
        .map(|(pos, w)| (w.concat(), pos))
        .collect()
}

/// The token prefix `s1` and `s2` share.
pub fn common_start<'a>(s1: &'a str, s2: &str, frame: usize) -> &'a str {
    head(s1, common_start_length(s1, s2, frame), frame)
}

/// Number of leading tokens `s1` and `s2` share.
pub fn common_start_length(s1: &str, s2: &str, frame: usize) -> usize {
    split_tokens(s1, frame)
        .into_iter()
        .zip(split_tokens(s2, frame))
        .take_while(|(a, b)| a == b)
        .count()
}

/// Whether the first `n` tokens of both strings are identical.
pub fn same_start(s1: &str, s2: &str, n: usize, frame: usize) -> bool {
    head(s1, n, frame) == head(s2, n, frame)
}

/// Whether `s1` occurs anywhere in `s2`, ignoring token alignment.
pub fn is_substring(s1: &str, s2: &str) -> bool {
    s2.contains(s1)
}

pub fn is_same(s1: &str, s2: &str) -> bool {
    s1 == s2
}

/// Whether `s1` begins with `s2`.
pub fn starts_with(s1: &str, s2: &str) -> bool {
    s1.starts_with(s2)
}

/// Sounding time of a token string: token durations plus a fixed gap
/// between consecutive tokens. `None` if a token has no known duration.
pub fn duration(
    s: &str,
    durations: &BTreeMap<String, f64>,
    gap: f64,
    frame: usize,
) -> Option<f64> {
    let tokens = split_tokens(s, frame);
    if tokens.is_empty() {
        return Some(0.0);
    }
    let sound = tokens
        .iter()
        .map(|t| durations.get(*t).copied())
        .sum::<Option<f64>>()?;
    Some(sound + (tokens.len() - 1) as f64 * gap)
}

/// Duration of the longest substring `s1` shares with `s2`, 0 if none.
pub fn longest_shared_substring_duration(
    s1: &str,
    s2: &str,
    durations: &BTreeMap<String, f64>,
    gap: f64,
    frame: usize,
) -> Option<f64> {
    longest_shared_substrings(s1, s2, frame)
        .iter()
        .map(|hit| duration(&hit.substring, durations, gap, frame))
        .try_fold(0.0_f64, |best, d| Some(best.max(d?)))
}

/// Duration of the token prefix `s1` and `s2` share.
pub fn common_start_duration(
    s1: &str,
    s2: &str,
    durations: &BTreeMap<String, f64>,
    gap: f64,
    frame: usize,
) -> Option<f64> {
    duration(common_start(s1, s2, frame), durations, gap, frame)
}

/// Token-aligned occurrences of the whole of `s1` in `s2`.
pub fn occurs_in(s1: &str, s2: &str, frame: usize) -> Option<SharedSubstring> {
    shared_length_n_substrings(s1, s2, token_count(s1, frame), frame)
        .into_iter()
        .next()
}

/// Count of equal tokens when `s1` slides across `s2`.
///
/// With `full`, every lag with any overlap is reported (length
/// `len1 + len2 - 1`); otherwise only the lags where `s1` lies entirely
/// inside `s2`.
pub fn cross_correlate(s1: &str, s2: &str, frame: usize, full: bool) -> Vec<usize> {
    cross_correlation_matches(s1, s2, frame, full)
        .iter()
        .map(|lag| lag.iter().flatten().count())
        .collect()
}

/// Per lag, the tokens of `s1` that line up with an equal token of `s2`
/// (`None` where they differ or hang over the edge). Lags as in
/// [`cross_correlate`].
pub fn cross_correlation_matches<'a>(
    s1: &'a str,
    s2: &str,
    frame: usize,
    full: bool,
) -> Vec<Vec<Option<&'a str>>> {
    let t1 = split_tokens(s1, frame);
    let t2 = split_tokens(s2, frame);
    if t1.is_empty() || t2.is_empty() {
        return Vec::new();
    }
    let pad = t1.len() - 1;
    let lags = t1.len() + t2.len() - 1;

    let correlation = (0..lags).map(|lag| {
        t1.iter()
            .enumerate()
            .map(|(j, &token)| {
                (lag + j)
                    .checked_sub(pad)
                    .and_then(|k| t2.get(k))
                    .filter(|&&other| other == token)
                    .map(|_| token)
            })
            .collect::<Vec<_>>()
    });

    if full {
        correlation.collect()
    } else if t2.len() >= t1.len() {
        correlation.skip(pad).take(t2.len() - t1.len() + 1).collect()
    } else {
        Vec::new()
    }
}

pub fn cross_correlation_max(s1: &str, s2: &str, frame: usize, full: bool) -> usize {
    cross_correlate(s1, s2, frame, full)
        .into_iter()
        .max()
        .unwrap_or(0)
}

/// Edit distance in tokens.
pub fn levenshtein(s1: &str, s2: &str, frame: usize) -> usize {
    let (long, short) = {
        let a = split_tokens(s1, frame);
        let b = split_tokens(s2, frame);
        if a.len() < b.len() { (b, a) } else { (a, b) }
    };
    if short.is_empty() {
        return long.len();
    }

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    for (i, t1) in long.iter().enumerate() {
        let mut current = Vec::with_capacity(short.len() + 1);
        current.push(i + 1);
        for (j, t2) in short.iter().enumerate() {
            let insertion = previous[j + 1] + 1;
            let deletion = current[j] + 1;
            let substitution = previous[j] + usize::from(t1 != t2);
            current.push(insertion.min(deletion).min(substitution));
        }
        previous = current;
    }
    previous[short.len()]
}

/// How one learned unit relates to a reference lexicon.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub weight: f64,
    pub in_lexicon: bool,
    /// Longest run of tokens the unit shares with any lexicon word.
    pub longest_shared: usize,
    /// Smallest token edit distance to any lexicon word.
    pub min_distance: usize,
    pub closest_word: Option<String>,
}

/// Score every unit of a store against `lexicon`, heaviest unit first.
pub fn lexicon_report(
    units: &BTreeMap<String, f64>,
    lexicon: &[String],
    frame: usize,
) -> Vec<UnitReport> {
    let mut reports: Vec<UnitReport> = units
        .iter()
        .map(|(unit, &weight)| {
            let closest = lexicon
                .iter()
                .map(|word| (levenshtein(unit, word, frame), word))
                .min_by_key(|&(distance, _)| distance);
            UnitReport {
                unit: unit.clone(),
                weight,
                in_lexicon: lexicon.iter().any(|word| word == unit),
                longest_shared: lexicon
                    .iter()
                    .map(|word| longest_shared_substring_length(unit, word, frame))
                    .max()
                    .unwrap_or(0),
                min_distance: closest.map_or(token_count(unit, frame), |(d, _)| d),
                closest_word: closest.map(|(_, word)| word.clone()),
            }
        })
        .collect();
    reports.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.unit.cmp(&b.unit)));
    reports
}
