//! Outcome-service URL rewriting.
//!
//! Consumers running in development or behind gateways often advertise an
//! outcome-service URL that is not reachable from the tool (wrong scheme,
//! internal host name). The fixup table rewrites such URLs before a grade is
//! posted.
//!
//! The table has two levels: a base prefix selects a sub-table, and the
//! sub-table maps an exact URL or a URL prefix to its replacement.
//!
//! # Matching
//!
//! 1. Bases that are a prefix of the URL are tried longest first.
//! 2. Within a base, a key equal to the whole URL wins.
//! 3. Otherwise the longest key that is a prefix of the URL is replaced.
//! 4. The first base producing a match wins; without one the URL is
//!    returned unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Two-level URL rewrite table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UrlFixupTable {
    entries: HashMap<String, HashMap<String, String>>,
}

impl UrlFixupTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rewrite rule under `base`.
    #[must_use]
    pub fn with_rule(
        mut self,
        base: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.entries
            .entry(base.into())
            .or_default()
            .insert(from.into(), to.into());
        self
    }

    /// Returns true if the table holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashMap::is_empty)
    }

    /// Rewrites `url` according to the table.
    #[must_use]
    pub fn apply(&self, url: &str) -> String {
        let mut bases: Vec<(&String, &HashMap<String, String>)> = self
            .entries
            .iter()
            .filter(|(base, _)| url.starts_with(base.as_str()))
            .collect();
        bases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        for (base, rules) in bases {
            if let Some(replacement) = rules.get(url) {
                tracing::debug!(%base, from = %url, to = %replacement, "Outcome URL rewritten (exact)");
                return replacement.clone();
            }

            let prefix_match = rules
                .iter()
                .filter(|(from, _)| url.starts_with(from.as_str()))
                .max_by_key(|(from, _)| from.len());

            if let Some((from, to)) = prefix_match {
                let rewritten = format!("{to}{}", &url[from.len()..]);
                tracing::debug!(%base, from = %url, to = %rewritten, "Outcome URL rewritten (prefix)");
                return rewritten;
            }
        }

        url.to_string()
    }
}

impl From<HashMap<String, HashMap<String, String>>> for UrlFixupTable {
    fn from(entries: HashMap<String, HashMap<String, String>>) -> Self {
        Self { entries }
    }
}
