// 📊 Report Builder - One tenure row per queried property
//
// The query list is authoritative: every entry yields exactly one output row,
// in query order, whether or not any scraped records matched it.

use crate::config::EngineConfig;
use crate::owner::OwnerNormalizer;
use crate::records::{PropertyKey, QueryEntry, ReportRow, YearlyRecord};
use crate::tenure::{TenureResolver, TenureResult};
use crate::variants::{find_with_variants, AddressVariants, RecordSource};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

// ============================================================================
// PROPERTY INDEX
// ============================================================================

/// Scraped yearly records grouped by normalized property key
#[derive(Debug, Default)]
pub struct PropertyIndex {
    groups: HashMap<PropertyKey, Vec<YearlyRecord>>,
    duplicates_dropped: usize,
}

impl PropertyIndex {
    /// Group records by key. Exact duplicate rows (same key, year, owner
    /// info and assessed value) are kept once, first occurrence wins.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = YearlyRecord>,
    {
        let mut groups: HashMap<PropertyKey, Vec<YearlyRecord>> = HashMap::new();
        let mut seen = HashSet::new();
        let mut duplicates_dropped = 0;

        for record in records {
            if !seen.insert(record.fingerprint()) {
                duplicates_dropped += 1;
                continue;
            }
            groups.entry(record.key()).or_default().push(record);
        }

        if duplicates_dropped > 0 {
            tracing::info!(duplicates_dropped, "collapsed duplicate yearly rows");
        }

        PropertyIndex {
            groups,
            duplicates_dropped,
        }
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&[YearlyRecord]> {
        self.groups.get(key).map(|v| v.as_slice())
    }

    /// Number of distinct properties
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }
}

impl RecordSource for PropertyIndex {
    fn lookup(&self, key: &PropertyKey) -> Result<Vec<YearlyRecord>> {
        Ok(self.get(key).map(|r| r.to_vec()).unwrap_or_default())
    }
}

/// Most recent record; first in input order among equal years
pub fn most_recent(records: &[YearlyRecord]) -> Option<&YearlyRecord> {
    records.iter().min_by_key(|r| Reverse(r.year_value()))
}

// ============================================================================
// REPORT SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub generated_at: DateTime<Utc>,
    pub queried: usize,
    pub resolved: usize,
    pub no_data: usize,
    pub duplicate_rows_dropped: usize,
}

impl ReportSummary {
    pub fn from_results(results: &[TenureResult], duplicate_rows_dropped: usize) -> Self {
        let resolved = results.iter().filter(|r| r.is_resolved()).count();
        ReportSummary {
            generated_at: Utc::now(),
            queried: results.len(),
            resolved,
            no_data: results.len() - resolved,
            duplicate_rows_dropped,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Queried: {}, Resolved: {}, No data: {}, Duplicate rows dropped: {}",
            self.queried, self.resolved, self.no_data, self.duplicate_rows_dropped
        )
    }
}

/// Results plus run summary
#[derive(Debug, Clone)]
pub struct Report {
    pub results: Vec<TenureResult>,
    pub summary: ReportSummary,
}

impl Report {
    pub fn rows(&self) -> Vec<ReportRow> {
        self.results.iter().map(ReportRow::from).collect()
    }
}

// ============================================================================
// REPORT BUILDER
// ============================================================================

pub struct ReportBuilder {
    resolver: TenureResolver,
    variants: AddressVariants,
    match_address_variants: bool,
}

impl ReportBuilder {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(ReportBuilder {
            resolver: TenureResolver::new(OwnerNormalizer::new(config)?),
            variants: AddressVariants::new(config),
            match_address_variants: config.match_address_variants,
        })
    }

    pub fn resolver(&self) -> &TenureResolver {
        &self.resolver
    }

    /// One result per query entry, in query order
    pub fn build(&self, records: &[YearlyRecord], queries: &[QueryEntry]) -> Vec<TenureResult> {
        let index = PropertyIndex::from_records(records.iter().cloned());
        self.build_from_index(&index, queries)
    }

    pub fn build_from_index(&self, index: &PropertyIndex, queries: &[QueryEntry]) -> Vec<TenureResult> {
        queries
            .par_iter()
            .map(|query| self.resolve_entry(index, query))
            .collect()
    }

    /// `build` plus a run summary
    pub fn build_report(&self, records: Vec<YearlyRecord>, queries: &[QueryEntry]) -> Report {
        let index = PropertyIndex::from_records(records);
        tracing::info!(properties = index.len(), queries = queries.len(), "building tenure report");

        let results = self.build_from_index(&index, queries);
        let summary = ReportSummary::from_results(&results, index.duplicates_dropped());
        tracing::info!("{}", summary.summary());

        Report { results, summary }
    }

    fn resolve_entry(&self, index: &PropertyIndex, query: &QueryEntry) -> TenureResult {
        let key = query.key();

        let group = match index.get(&key) {
            Some(group) => Some(group.to_vec()),
            None if self.match_address_variants => self.lookup_variants(index, &key, query),
            None => None,
        };

        let records = match group {
            Some(records) if most_recent(&records).is_some_and(|r| r.has_any_data()) => records,
            Some(_) => {
                tracing::info!(property = %key, site = %query.site_name, "most recent record has no data");
                return TenureResult::empty(&key).with_identity(query);
            }
            None => {
                tracing::info!(property = %key, site = %query.site_name, "no records found");
                return TenureResult::empty(&key).with_identity(query);
            }
        };

        self.resolver.resolve(&key, &records).with_identity(query)
    }

    fn lookup_variants(
        &self,
        index: &PropertyIndex,
        key: &PropertyKey,
        query: &QueryEntry,
    ) -> Option<Vec<YearlyRecord>> {
        match find_with_variants(index, &self.variants, key, &query.address) {
            Ok(found) => found.map(|m| {
                tracing::info!(query = %query.address, matched = %m.address, "matched under address variant");
                m.records
            }),
            Err(err) => {
                tracing::warn!(property = %key, error = %err, "variant lookup failed");
                None
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
