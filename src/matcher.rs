//! Fuzzy pairing of roster names with names recorded in a raw log.
//!
//! Names are compared with a token-set ratio: both names are reduced to
//! their sets of words, and the score is the best indel similarity among the
//! shared words and each side's shared-plus-leftover words. Word order never
//! matters, and one name being a word subset of the other scores 100.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = 85.0;

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized indel similarity of two strings, 0-100.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Order-independent token overlap score, 0-100. Inputs are expected to be
/// normalized already.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let join = |set: BTreeSet<&str>| set.into_iter().collect::<Vec<_>>().join(" ");
    let shared = join(tokens_a.intersection(&tokens_b).copied().collect());
    let only_a = join(tokens_a.difference(&tokens_b).copied().collect());
    let only_b = join(tokens_b.difference(&tokens_a).copied().collect());

    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let combine = |rest: &str| {
        if shared.is_empty() {
            rest.to_string()
        } else {
            format!("{shared} {rest}")
        }
    };
    let combined_a = combine(&only_a);
    let combined_b = combine(&only_b);

    let mut best = ratio(&combined_a, &combined_b);
    if !shared.is_empty() {
        best = best
            .max(ratio(&shared, &combined_a))
            .max(ratio(&shared, &combined_b));
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Minimum score (inclusive) for a best candidate to be accepted.
    pub threshold: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// A roster row and its accepted raw-log candidate, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPair {
    pub roster_index: usize,
    pub raw_index: Option<usize>,
    /// Best score seen, whether or not it cleared the threshold.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    /// One entry per roster row, in roster order.
    pub pairs: Vec<MatchPair>,
    /// Raw rows never accepted as any roster row's best match, in raw order.
    pub unmatched_raw: Vec<usize>,
}

impl MatchOutcome {
    pub fn matched_raw(&self) -> BTreeSet<usize> {
        self.pairs.iter().filter_map(|p| p.raw_index).collect()
    }
}

/// Pair every roster name with its best-scoring raw name.
///
/// The first candidate reaching the maximum score wins. Blank roster names
/// never match. Several roster rows may claim the same raw row.
pub fn match_names<R, W>(roster: &[R], raw: &[W], options: &MatchOptions) -> MatchOutcome
where
    R: AsRef<str>,
    W: AsRef<str>,
{
    let raw_normalized: Vec<String> = raw.iter().map(|n| normalize_name(n.as_ref())).collect();

    let pairs: Vec<MatchPair> = roster
        .iter()
        .enumerate()
        .map(|(roster_index, name)| {
            let wanted = normalize_name(name.as_ref());
            if wanted.is_empty() {
                return MatchPair {
                    roster_index,
                    raw_index: None,
                    score: 0.0,
                };
            }

            let mut best: Option<(usize, f64)> = None;
            for (j, candidate) in raw_normalized.iter().enumerate() {
                let score = token_set_ratio(&wanted, candidate);
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((j, score));
                }
            }

            match best {
                Some((j, score)) if score >= options.threshold => MatchPair {
                    roster_index,
                    raw_index: Some(j),
                    score,
                },
                Some((_, score)) => MatchPair {
                    roster_index,
                    raw_index: None,
                    score,
                },
                None => MatchPair {
                    roster_index,
                    raw_index: None,
                    score: 0.0,
                },
            }
        })
        .collect();

    let claimed: HashSet<usize> = pairs.iter().filter_map(|p| p.raw_index).collect();
    let unmatched_raw = (0..raw.len()).filter(|j| !claimed.contains(j)).collect();

    MatchOutcome {
        pairs,
        unmatched_raw,
    }
}
