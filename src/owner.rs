// 🏷️ Owner Normalizer - Canonical owner names from free-text owner info
//
// "ACME, LLC, 123 MAIN ST"     → ("ACME LLC", "123 MAIN ST")
// "Foo, CORPORATION, 1 St"     → ("FOO CORP", "1 ST")
// "Jane Doe Trust, 5 Oak Ave"  → ("JANE DOE TRUST", "5 OAK AVE")

use crate::config::EngineConfig;
use anyhow::{Context as AnyhowContext, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// NORMALIZED OWNER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedOwner {
    /// Uppercase, whitespace-collapsed, suffix-standardized owner name
    pub name: String,

    /// Mailing address as it followed the name in the owner info
    pub mailing_address: String,
}

impl NormalizedOwner {
    pub fn new(name: impl Into<String>, mailing_address: impl Into<String>) -> Self {
        NormalizedOwner {
            name: name.into(),
            mailing_address: mailing_address.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.mailing_address.is_empty()
    }
}

// ============================================================================
// OWNER NORMALIZER
// ============================================================================

/// Two-path parser for the "Owner Info" column.
///
/// Suffix path: `<base>, <SUFFIX>[,] <mailing address>` where SUFFIX is one of
/// the configured entity suffixes. The first suffix occurrence wins.
///
/// Fallback path: everything before the first comma is the name, the rest is
/// the mailing address.
pub struct OwnerNormalizer {
    suffix_pattern: Option<Regex>,
    alias_pattern: Option<Regex>,
    aliases: HashMap<String, String>,
}

impl OwnerNormalizer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let suffix_pattern = match alternation(&config.entity_suffixes) {
            Some(alt) => Some(
                Regex::new(&format!(r"(?is)^(.*?),\s*({})\b(?:,\s*)?(.*)$", alt))
                    .context("Failed to compile entity suffix pattern")?,
            ),
            None => None,
        };

        let aliases: HashMap<String, String> = config
            .suffix_aliases
            .iter()
            .map(|(from, to)| (from.trim().to_uppercase(), to.trim().to_uppercase()))
            .filter(|(from, _)| !from.is_empty())
            .collect();

        let alias_keys: Vec<String> = aliases.keys().cloned().collect();
        let alias_pattern = match alternation(&alias_keys) {
            Some(alt) => Some(
                Regex::new(&format!(r"\b(?:{})\b", alt))
                    .context("Failed to compile suffix alias pattern")?,
            ),
            None => None,
        };

        Ok(OwnerNormalizer {
            suffix_pattern,
            alias_pattern,
            aliases,
        })
    }

    /// Split raw owner info into a canonical name and a mailing address.
    /// Blank input yields an empty owner; this never fails.
    pub fn normalize(&self, raw: &str) -> NormalizedOwner {
        let raw = raw.trim();
        if raw.is_empty() {
            return NormalizedOwner::default();
        }

        let (name, address) = match self.split_on_suffix(raw) {
            Some(parts) => parts,
            None => split_on_first_comma(raw),
        };

        NormalizedOwner {
            name: self.canonical_name(&name),
            mailing_address: address.trim().to_uppercase(),
        }
    }

    /// Normalized name only (used for run comparisons)
    pub fn name_of(&self, raw: &str) -> String {
        self.normalize(raw).name
    }

    fn split_on_suffix(&self, raw: &str) -> Option<(String, String)> {
        let caps = self.suffix_pattern.as_ref()?.captures(raw)?;

        let base = caps.get(1).map_or("", |m| m.as_str()).trim();
        let suffix = caps.get(2).map_or("", |m| m.as_str());
        let remainder = caps.get(3).map_or("", |m| m.as_str());

        // A comma left in the name would send it down the fallback path on a
        // second pass.
        let name = format!("{} {}", base.replace(',', " "), suffix.to_uppercase());
        let address = remainder
            .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
            .trim_end()
            .to_string();

        Some((name, address))
    }

    fn canonical_name(&self, name: &str) -> String {
        let collapsed = name
            .to_uppercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match &self.alias_pattern {
            Some(pattern) => pattern
                .replace_all(&collapsed, |caps: &Captures| {
                    let word = &caps[0];
                    self.aliases.get(word).cloned().unwrap_or_else(|| word.to_string())
                })
                .into_owned(),
            None => collapsed,
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Case-insensitive alternation of escaped words, longest first
fn alternation(words: &[String]) -> Option<String> {
    let mut words: Vec<String> = words
        .iter()
        .map(|w| w.trim().to_uppercase())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        return None;
    }

    words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    words.dedup();

    Some(
        words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|"),
    )
}

fn split_on_first_comma(raw: &str) -> (String, String) {
    match raw.split_once(',') {
        Some((name, rest)) => (name.trim().to_string(), rest.trim().to_string()),
        None => (raw.trim().to_string(), String::new()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
