use crate::indexing::index::{EntryIndex, Snapshot};
use serde::Serialize;
use std::sync::Arc;

/// Leading token that scopes a query to the password store
pub const QUERY_PREFIX: &str = "pass";
/// Unscoped queries shorter than this are ignored
pub const MIN_QUERY_LEN: usize = 3;

/// Advisory ranking hint for the presentation layer. Never filters results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    /// Query and entry have the same length
    Exact,
    /// Query is a shorter substring of the entry
    Partial,
}

/// One entry that matched a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub entry: String,
    pub relevance: Relevance,
}

/// Normalize raw input into the text to match, or `None` if the query should
/// produce no matches at all.
///
/// `pass foo` is scoped to this store and matched as `foo`; scoped queries and
/// single-runner queries skip the minimum length check.
pub fn prepare_query(input: &str, single_runner: bool) -> Option<String> {
    if let Some(rest) = strip_prefix_token(input) {
        return Some(rest.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    if input.chars().count() < MIN_QUERY_LEN && !single_runner {
        return None;
    }

    Some(input.to_string())
}

fn strip_prefix_token(input: &str) -> Option<&str> {
    let trimmed = input.trim_start();
    let rest = trimmed.strip_prefix(QUERY_PREFIX)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Case-insensitive substring match of `input` against every entry, in
/// snapshot order
pub fn match_entries(entries: &[String], input: &str, single_runner: bool) -> Vec<Match> {
    let Some(query) = prepare_query(input, single_runner) else {
        return Vec::new();
    };

    let needle = query.to_lowercase();
    let query_len = query.chars().count();

    entries
        .iter()
        .filter(|entry| entry.to_lowercase().contains(&needle))
        .map(|entry| Match {
            entry: entry.clone(),
            relevance: if entry.chars().count() == query_len {
                Relevance::Exact
            } else {
                Relevance::Partial
            },
        })
        .collect()
}

/// Answers queries against the current snapshot of an `EntryIndex`
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    index: Arc<EntryIndex>,
}

impl QueryMatcher {
    pub fn new(index: Arc<EntryIndex>) -> Self {
        Self { index }
    }

    /// Match against whatever snapshot is current when the call starts
    pub fn find(&self, input: &str, single_runner: bool) -> Vec<Match> {
        let snapshot = self.index.current_snapshot();
        Self::find_in(&snapshot, input, single_runner)
    }

    pub fn find_in(snapshot: &Snapshot, input: &str, single_runner: bool) -> Vec<Match> {
        match_entries(&snapshot.entries, input, single_runner)
    }
}

/// Exact matches first, snapshot order within a tier
pub fn rank(mut matches: Vec<Match>) -> Vec<Match> {
    matches.sort_by_key(|m| m.relevance);
    matches
}
