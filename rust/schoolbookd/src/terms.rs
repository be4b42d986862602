//! Reporting-period keys of the form `"Term {n} {year}"`.
//!
//! No document enumerates the valid terms. They are discovered from whatever
//! keys exist under a student's results subtree.

use serde_json::Value;
use std::cmp::Ordering;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TermKey {
    pub year: i32,
    pub term: u32,
}

impl TermKey {
    /// Reads whitespace tokens 1 (term number) and 2 (year).
    pub fn parse(raw: &str) -> Option<Self> {
        let mut tokens = raw.split_whitespace();
        let label = tokens.next()?;
        if !label.eq_ignore_ascii_case("term") {
            return None;
        }
        let term = tokens.next()?.parse::<u32>().ok()?;
        let year = tokens.next()?.parse::<i32>().ok()?;
        if tokens.next().is_some() {
            return None;
        }
        Some(TermKey { year, term })
    }

    pub fn label(&self) -> String {
        format!("Term {} {}", self.term, self.year)
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (TermKey::parse(a), TermKey::parse(b)) {
        (Some(ka), Some(kb)) => kb.cmp(&ka),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Latest year first, then latest term. Unparseable keys go last.
pub fn sort_terms(terms: &mut [String]) {
    terms.sort_by(|a, b| compare_keys(a, b));
}

/// Term keys present under a student's results subtree, newest first.
pub fn list_terms(results: Option<&Value>) -> Vec<String> {
    let Some(Value::Object(map)) = results else {
        return Vec::new();
    };
    let mut terms: Vec<String> = map.keys().cloned().collect();
    for t in terms.iter().filter(|t| TermKey::parse(t).is_none()) {
        warn!(term = %t, "malformed term key in results");
    }
    sort_terms(&mut terms);
    terms
}

pub fn default_term(terms: &[String]) -> Option<&str> {
    terms.first().map(String::as_str)
}
