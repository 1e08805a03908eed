// ⏰ Tenure Resolver - How long has the current owner held the property?
//
// Records are read most-recent-first. The run owner is the current owner's
// normalized name; the run extends while the name repeats and stops at the
// first different owner. Rows without a usable year or owner text are skipped,
// they neither extend nor break the run.

use crate::owner::{NormalizedOwner, OwnerNormalizer};
use crate::records::{normalize_zip, PropertyKey, QueryEntry, ReportRow, YearlyRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

// ============================================================================
// TENURE RESULT
// ============================================================================

/// Per-property outcome. When the data is insufficient every derived field is
/// empty (never zero) while the identity fields stay populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenureResult {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub site_name: Option<String>,

    // ========================================================================
    // DERIVED
    // ========================================================================
    pub current_owner: NormalizedOwner,
    pub ownership_start_year: Option<i32>,
    pub current_year: Option<i32>,
    pub years_owned: Option<i32>,
    pub assessed: Option<String>,
}

impl TenureResult {
    /// "Known property, no data" result
    pub fn empty(key: &PropertyKey) -> Self {
        TenureResult {
            address: key.address.clone(),
            city: key.city.clone(),
            state: key.state.clone(),
            zip: key.zip.clone(),
            site_name: None,
            current_owner: NormalizedOwner::default(),
            ownership_start_year: None,
            current_year: None,
            years_owned: None,
            assessed: None,
        }
    }

    /// Replace identity fields with a query entry's literal values
    pub fn with_identity(mut self, query: &QueryEntry) -> Self {
        self.address = query.address.clone();
        self.city = query.city.clone();
        self.state = query.state.clone();
        self.zip = normalize_zip(&query.zip_code);
        self.site_name = Some(query.site_name.clone());
        self
    }

    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(&self.address, &self.city, &self.state, &self.zip)
    }

    /// True when tenure could be computed
    pub fn is_resolved(&self) -> bool {
        self.years_owned.is_some()
    }
}

impl From<&TenureResult> for ReportRow {
    fn from(result: &TenureResult) -> Self {
        ReportRow {
            site_name: result.site_name.clone().unwrap_or_default(),
            address: result.address.clone(),
            city: result.city.clone(),
            state: result.state.clone(),
            zip: result.zip.clone(),
            owner: result.current_owner.name.clone(),
            mailing_address: result.current_owner.mailing_address.clone(),
            ownership_start_year: result.ownership_start_year,
            current_year: result.current_year,
            years_owned: result.years_owned,
            assessed: result.assessed.clone(),
        }
    }
}

// ============================================================================
// TENURE RESOLVER
// ============================================================================

pub struct TenureResolver {
    normalizer: OwnerNormalizer,
}

impl TenureResolver {
    pub fn new(normalizer: OwnerNormalizer) -> Self {
        TenureResolver { normalizer }
    }

    pub fn normalizer(&self) -> &OwnerNormalizer {
        &self.normalizer
    }

    /// Resolve one property's record set.
    ///
    /// Records are ordered by year descending with unusable years last; equal
    /// years keep their input order. The top record is "current".
    ///
    /// A current record with a year but blank owner text gives an insufficient
    /// result, even when older records name an owner.
    pub fn resolve(&self, key: &PropertyKey, records: &[YearlyRecord]) -> TenureResult {
        if records.iter().all(|r| !r.has_any_data()) {
            return TenureResult::empty(key);
        }

        let mut ordered: Vec<&YearlyRecord> = records.iter().collect();
        ordered.sort_by_key(|r| Reverse(r.year_value()));

        let current = ordered[0];
        let current_year = match current.year_value() {
            Some(year) if current.has_owner_info() => year,
            _ => {
                tracing::debug!(property = %key, "most recent record lacks year or owner");
                return TenureResult::empty(key);
            }
        };

        let current_owner = self.normalizer.normalize(&current.owner_info);
        let mut start_year = current_year;

        for record in &ordered {
            let Some(year) = record.year_value() else {
                tracing::debug!(property = %key, year = %record.year, "skipping row without usable year");
                continue;
            };
            if !record.has_owner_info() {
                tracing::debug!(property = %key, year, "skipping row without owner info");
                continue;
            }

            if self.normalizer.name_of(&record.owner_info) != current_owner.name {
                break;
            }
            start_year = year;
        }

        TenureResult {
            ownership_start_year: Some(start_year),
            current_year: Some(current_year),
            years_owned: Some(current_year - start_year + 1),
            assessed: current.assessed_value(),
            current_owner,
            ..TenureResult::empty(key)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn resolver() -> TenureResolver {
        TenureResolver::new(OwnerNormalizer::new(&EngineConfig::default()).unwrap())
    }

    fn key() -> PropertyKey {
        PropertyKey::new("201 Union Ln", "Brielle", "NJ", "08730")
    }

    fn record(year: &str, owner: &str, assessed: &str) -> YearlyRecord {
        YearlyRecord {
            address: "201 Union Ln".to_string(),
            city: "Brielle".to_string(),
            state: "NJ".to_string(),
            zip: "08730".to_string(),
            year: year.to_string(),
            owner_info: owner.to_string(),
            assessed: assessed.to_string(),
        }
    }

    #[test]
    fn test_run_stops_at_first_different_owner() {
        let records = vec![
            record("2023", "A, LLC, 1 Main St", "500"),
            record("2022", "A, LLC, 1 Main St", "480"),
            record("2021", "B, LLC, 9 Elm St", "450"),
            record("2020", "A, LLC, 1 Main St", "440"),
        ];

        let result = resolver().resolve(&key(), &records);

        assert_eq!(result.current_owner.name, "A LLC");
        assert_eq!(result.current_owner.mailing_address, "1 MAIN ST");
        assert_eq!(result.current_year, Some(2023));
        assert_eq!(result.ownership_start_year, Some(2022));
        assert_eq!(result.years_owned, Some(2));
        assert_eq!(result.assessed, Some("500".to_string()));
    }

    #[test]
    fn test_missing_year_is_skipped() {
        let records = vec![
            record("2023", "A, LLC", "500"),
            record("", "B, LLC", "480"),
            record("2021", "A, LLC", "450"),
        ];

        let result = resolver().resolve(&key(), &records);

        assert_eq!(result.ownership_start_year, Some(2021));
        assert_eq!(result.years_owned, Some(3));
    }

    #[test]
    fn test_non_numeric_year_is_skipped() {
        let records = vec![
            record("2023", "A, LLC", "500"),
            record("N/A", "A, LLC", "480"),
            record("2022", "A, LLC", "450"),
        ];

        let result = resolver().resolve(&key(), &records);
        assert_eq!(result.years_owned, Some(2));
    }

    #[test]
    fn test_blank_owner_row_is_skipped() {
        let records = vec![
            record("2023", "A, LLC", "500"),
            record("2022", "", "480"),
            record("2021", "A, LLC", "450"),
        ];

        let result = resolver().resolve(&key(), &records);
        assert_eq!(result.ownership_start_year, Some(2021));
        assert_eq!(result.years_owned, Some(3));
    }

    #[test]
    fn test_blank_current_owner_is_insufficient() {
        let records = vec![record("2023", "", "500"), record("2022", "A, LLC", "480")];

        let result = resolver().resolve(&key(), &records);

        assert!(!result.is_resolved());
        assert!(result.current_owner.is_empty());
        assert_eq!(result.years_owned, None);
    }

    #[test]
    fn test_out_of_range_years_are_skipped() {
        let records = vec![
            record("2147483647", "A, LLC", "500"),
            record("2023", "A, LLC", "480"),
            record("-5", "A, LLC", "450"),
            record("2021", "A, LLC", "440"),
        ];

        let result = resolver().resolve(&key(), &records);

        assert_eq!(result.current_year, Some(2023));
        assert_eq!(result.ownership_start_year, Some(2021));
        assert_eq!(result.years_owned, Some(3));
        assert_eq!(result.assessed, Some("480".to_string()));
    }

    #[test]
    fn test_only_out_of_range_years_is_insufficient() {
        let records = vec![record("2147483647", "A, LLC", "500"), record("-5", "A, LLC", "450")];

        let result = resolver().resolve(&key(), &records);

        assert!(!result.is_resolved());
        assert_eq!(result.years_owned, None);
    }

    #[test]
    fn test_unsorted_input_is_ordered_by_year() {
        let records = vec![
            record("2020", "Old Owner", "300"),
            record("2022", "A, CORPORATION, 1 Main", "480"),
            record("2023", "a, corp, 1 Main", "500"),
            record("2021", "A Corp", "450"),
        ];

        let result = resolver().resolve(&key(), &records);

        assert_eq!(result.current_owner.name, "A CORP");
        assert_eq!(result.current_year, Some(2023));
        assert_eq!(result.ownership_start_year, Some(2021));
        assert_eq!(result.years_owned, Some(3));
    }

    #[test]
    fn test_single_record_owns_one_year() {
        let result = resolver().resolve(&key(), &[record("2024", "Jane Doe, 5 Oak Ave", "")]);

        assert_eq!(result.current_owner, NormalizedOwner::new("JANE DOE", "5 OAK AVE"));
        assert_eq!(result.years_owned, Some(1));
        assert_eq!(result.assessed, None);
        assert!(result.is_resolved());
    }

    #[test]
    fn test_empty_record_set() {
        let result = resolver().resolve(&key(), &[]);

        assert_eq!(result, TenureResult::empty(&key()));
        assert!(!result.is_resolved());
        assert_eq!(result.address, "201 UNION LN");
    }

    #[test]
    fn test_all_rows_without_data() {
        let result = resolver().resolve(&key(), &[record("", "", ""), record(" ", "  ", "")]);

        assert_eq!(result.current_year, None);
        assert_eq!(result.years_owned, None);
        assert_eq!(result.ownership_start_year, None);
        assert!(result.current_owner.is_empty());
    }

    #[test]
    fn test_no_usable_year_anywhere_is_insufficient() {
        let result = resolver().resolve(&key(), &[record("", "A, LLC", "500")]);

        assert!(!result.is_resolved());
        assert_eq!(result.current_year, None);
        assert_eq!(result.assessed, None);
    }

    #[test]
    fn test_equal_years_keep_input_order() {
        let records = vec![
            record("2023", "B, LLC", "500"),
            record("2023", "A, LLC", "500"),
            record("2022", "A, LLC", "480"),
        ];

        let result = resolver().resolve(&key(), &records);

        // First 2023 row is current; the A rows break the run immediately
        assert_eq!(result.current_owner.name, "B LLC");
        assert_eq!(result.years_owned, Some(1));
    }

    #[test]
    fn test_with_identity_uses_query_literals() {
        let query = QueryEntry {
            address: "201 Union Lane".to_string(),
            city: "Brielle".to_string(),
            state: "NJ".to_string(),
            zip_code: "8730".to_string(),
            site_name: "Station 7".to_string(),
        };

        let result = resolver()
            .resolve(&key(), &[record("2024", "A, LLC", "1")])
            .with_identity(&query);

        assert_eq!(result.address, "201 Union Lane");
        assert_eq!(result.zip, "08730");
        assert_eq!(result.site_name.as_deref(), Some("Station 7"));

        let row = ReportRow::from(&result);
        assert_eq!(row.site_name, "Station 7");
        assert_eq!(row.owner, "A LLC");
        assert_eq!(row.years_owned, Some(1));
    }
}
