// 🔀 Address Variants - Retry a lookup under other street-type spellings
//
// "10 RT 35" → "10 RT 35", "10 ROUTE 35", "10 HWY 35", "10 HIGHWAY 35", ...
//
// Each candidate differs from the original by exactly one word. Candidates are
// yielded lazily so a caller can stop at the first one that matches.

use crate::config::EngineConfig;
use crate::records::{normalize_text, PropertyKey, YearlyRecord};
use anyhow::Result;
use std::collections::{HashMap, HashSet};

// ============================================================================
// VARIANT TABLE
// ============================================================================

/// Bidirectional street-type table: abbreviation ↔ full forms
pub struct AddressVariants {
    /// RT → [ROUTE, HWY, HIGHWAY, US HIGHWAY, US HWY]
    expansions: HashMap<String, Vec<String>>,

    /// HIGHWAY → [HWY, RT]
    abbreviations: HashMap<String, Vec<String>>,
}

impl AddressVariants {
    pub fn new(config: &EngineConfig) -> Self {
        let mut expansions: HashMap<String, Vec<String>> = HashMap::new();
        let mut abbreviations: HashMap<String, Vec<String>> = HashMap::new();

        for (abbrev, forms) in &config.street_types {
            let abbrev = normalize_text(abbrev);
            if abbrev.is_empty() {
                continue;
            }

            let forms: Vec<String> = forms
                .iter()
                .map(|f| normalize_text(f))
                .filter(|f| !f.is_empty() && *f != abbrev)
                .collect();

            for form in &forms {
                let back = abbreviations.entry(form.clone()).or_default();
                if !back.contains(&abbrev) {
                    back.push(abbrev.clone());
                }
            }

            expansions.entry(abbrev).or_default().extend(forms);
        }

        AddressVariants {
            expansions,
            abbreviations,
        }
    }

    /// Ordered, case-insensitively distinct candidates for `address`,
    /// starting with `address` itself
    pub fn generate(&self, address: &str) -> Variants<'_> {
        Variants {
            table: self,
            original: Some(address.to_string()),
            words: address.split_whitespace().map(|w| w.to_string()).collect(),
            stage: Stage::Expand,
            word: 0,
            alt: 0,
            seen: HashSet::new(),
        }
    }

    pub fn full_forms(&self, abbrev: &str) -> &[String] {
        self.expansions
            .get(&normalize_text(abbrev))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn abbreviations_of(&self, full_form: &str) -> &[String] {
        self.abbreviations
            .get(&normalize_text(full_form))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

// ============================================================================
// LAZY VARIANT SEQUENCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Abbreviated words replaced by each full form
    Expand,
    /// Full-form words replaced by each abbreviation
    Abbreviate,
    Done,
}

pub struct Variants<'a> {
    table: &'a AddressVariants,
    original: Option<String>,
    words: Vec<String>,
    stage: Stage,
    word: usize,
    alt: usize,
    seen: HashSet<String>,
}

impl<'a> Variants<'a> {
    fn next_candidate(&mut self) -> Option<String> {
        if let Some(original) = self.original.take() {
            return Some(original);
        }

        let table = self.table;
        loop {
            let lookup = match self.stage {
                Stage::Expand => &table.expansions,
                Stage::Abbreviate => &table.abbreviations,
                Stage::Done => return None,
            };

            if self.word >= self.words.len() {
                self.stage = match self.stage {
                    Stage::Expand => Stage::Abbreviate,
                    _ => Stage::Done,
                };
                self.word = 0;
                self.alt = 0;
                continue;
            }

            let token = self.words[self.word].to_uppercase();
            match lookup.get(&token) {
                Some(alternatives) if self.alt < alternatives.len() => {
                    let candidate = self.substitute(&alternatives[self.alt]);
                    self.alt += 1;
                    return Some(candidate);
                }
                _ => {
                    self.word += 1;
                    self.alt = 0;
                }
            }
        }
    }

    fn substitute(&self, replacement: &str) -> String {
        self.words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == self.word { replacement } else { w.as_str() })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<'a> Iterator for Variants<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let candidate = self.next_candidate()?;
            if self.seen.insert(normalize_text(&candidate)) {
                return Some(candidate);
            }
        }
    }
}

// ============================================================================
// RECORD SOURCE SEAM
// ============================================================================

/// Anything that can be asked for a property's yearly records: the scraped
/// record index, or a live fetch adapter.
pub trait RecordSource: Send + Sync {
    /// Records for `key`; an empty vec means "no match"
    fn lookup(&self, key: &PropertyKey) -> Result<Vec<YearlyRecord>>;
}

/// First successful lookup while walking the variant sequence
#[derive(Debug, Clone, PartialEq)]
pub struct VariantMatch {
    /// The address spelling that matched
    pub address: String,
    /// Position in the variant sequence (0 = original)
    pub attempt: usize,
    pub records: Vec<YearlyRecord>,
}

/// Try `address` and its variants (same city/state/zip as `key`) against
/// `source`, stopping at the first non-empty result
pub fn find_with_variants<S: RecordSource + ?Sized>(
    source: &S,
    variants: &AddressVariants,
    key: &PropertyKey,
    address: &str,
) -> Result<Option<VariantMatch>> {
    for (attempt, candidate) in variants.generate(address).enumerate() {
        let records = source.lookup(&key.with_address(&candidate))?;
        if !records.is_empty() {
            tracing::debug!(original = %address, matched = %candidate, attempt, "address variant matched");
            return Ok(Some(VariantMatch {
                address: candidate,
                attempt,
                records,
            }));
        }
        tracing::trace!(candidate = %candidate, "no records for address variant");
    }

    Ok(None)
}

// ============================================================================
// TESTS
// ============================================================================
