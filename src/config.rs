// ⚙️ Engine Configuration - Tables as Data
// Entity suffixes, suffix aliases and the street-type table used by the
// owner normalizer and the address variant generator.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Read-only configuration handed to the normalizer and variant generator.
///
/// Every field has a built-in default, so a JSON file only needs to list the
/// tables it wants to replace:
///
/// ```json
/// { "street_types": { "RT": ["ROUTE", "HIGHWAY"] } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entity suffixes recognized right after the base name (case-insensitive)
    pub entity_suffixes: Vec<String>,

    /// Whole-word replacements applied to normalized owner names
    pub suffix_aliases: BTreeMap<String, String>,

    /// Abbreviated street-type token → ordered full-form alternatives
    pub street_types: BTreeMap<String, Vec<String>>,

    /// Retry unmatched query entries under address variants when joining
    pub match_address_variants: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            entity_suffixes: default_entity_suffixes(),
            suffix_aliases: default_suffix_aliases(),
            street_types: default_street_types(),
            match_address_variants: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path.as_ref()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the built-in tables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Reject tables the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if let Some(blank) = self.entity_suffixes.iter().find(|s| s.trim().is_empty()) {
            anyhow::bail!("entity_suffixes contains a blank entry: {:?}", blank);
        }

        for (abbrev, forms) in &self.street_types {
            if abbrev.trim().is_empty() || abbrev.split_whitespace().count() != 1 {
                anyhow::bail!("street_types key must be a single word, got {:?}", abbrev);
            }
            if forms.is_empty() || forms.iter().any(|f| f.trim().is_empty()) {
                anyhow::bail!("street_types[{}] must list at least one non-blank full form", abbrev);
            }
        }

        Ok(())
    }
}

// ============================================================================
// DEFAULT TABLES
// ============================================================================

fn default_entity_suffixes() -> Vec<String> {
    ["LLC", "INC", "CORP", "CORPORATION", "LTD", "LIMITED"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_suffix_aliases() -> BTreeMap<String, String> {
    [("CORPORATION", "CORP"), ("LIMITED", "LTD")]
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

fn default_street_types() -> BTreeMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        ("AVE", &["AVENUE"]),
        ("BLVD", &["BOULEVARD"]),
        ("CIR", &["CIRCLE"]),
        ("CT", &["COURT"]),
        ("DR", &["DRIVE"]),
        ("EXPY", &["EXPRESSWAY"]),
        ("FWY", &["FREEWAY"]),
        ("HWY", &["HIGHWAY"]),
        ("LN", &["LANE"]),
        ("PKWY", &["PARKWAY"]),
        ("PL", &["PLACE"]),
        ("RD", &["ROAD"]),
        ("RT", &["ROUTE", "HWY", "HIGHWAY", "US HIGHWAY", "US HWY"]),
        ("SQ", &["SQUARE"]),
        ("ST", &["STREET"]),
        ("TER", &["TERRACE"]),
    ];

    table
        .iter()
        .map(|(abbrev, forms)| {
            (
                abbrev.to_string(),
                forms.iter().map(|f| f.to_string()).collect(),
            )
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
