// 📄 Records - Yearly assessment rows, query list, report rows
// CSV in, CSV/JSON out. Column presence is checked before any row is read.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

// ============================================================================
// COLUMN CONTRACTS
// ============================================================================

pub const RECORD_COLUMNS: [&str; 7] = [
    "Address", "City", "State", "Zip Code", "Year", "Owner Info", "Assessed",
];

pub const QUERY_COLUMNS: [&str; 5] = ["address", "city", "state", "zip_code", "Site Name"];

/// Single-property tax history (the `analyze` input); `Assessed` is optional
pub const HISTORY_COLUMNS: [&str; 2] = ["Year", "Owner Info"];

// ============================================================================
// COLUMN ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    /// Required columns absent from a file's header row
    Missing { file: String, columns: Vec<String> },
}

impl std::fmt::Display for ColumnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnError::Missing { file, columns } => {
                write!(f, "{}: missing required column(s): {}", file, columns.join(", "))
            }
        }
    }
}

impl std::error::Error for ColumnError {}

/// Fail if any of `required` is not among `headers` (exact, after trimming)
pub fn require_columns(
    file: &str,
    headers: &csv::StringRecord,
    required: &[&str],
) -> std::result::Result<(), ColumnError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h.trim() == **col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ColumnError::Missing {
            file: file.to_string(),
            columns: missing,
        })
    }
}

// ============================================================================
// PROPERTY KEY
// ============================================================================

/// Normalized `(address, city, state, zip)` used to group and join records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyKey {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl PropertyKey {
    pub fn new(address: &str, city: &str, state: &str, zip: &str) -> Self {
        PropertyKey {
            address: normalize_text(address),
            city: normalize_text(city),
            state: normalize_text(state),
            zip: normalize_zip(zip),
        }
    }

    /// Same city/state/zip, different street address
    pub fn with_address(&self, address: &str) -> Self {
        PropertyKey {
            address: normalize_text(address),
            ..self.clone()
        }
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {} {}", self.address, self.city, self.state, self.zip)
    }
}

/// Uppercase, trim, collapse internal whitespace
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Zip as text; all-digit zips shorter than five characters are zero-padded
/// (`8730` → `08730`), and a spreadsheet float spelling (`8730.0`) is unwrapped.
pub fn normalize_zip(zip: &str) -> String {
    let zip = zip.trim();
    let zip = match zip.split_once('.') {
        Some((whole, frac))
            if !whole.is_empty()
                && whole.chars().all(|c| c.is_ascii_digit())
                && !frac.is_empty()
                && frac.chars().all(|c| c == '0') =>
        {
            whole
        }
        _ => zip,
    };

    if !zip.is_empty() && zip.len() < 5 && zip.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>5}", zip)
    } else {
        zip.to_uppercase()
    }
}

/// Years outside this range are treated as unusable
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Four-digit year; a zero-fraction float spelling (`2023.0`) is accepted
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let year = match raw.parse::<i32>() {
        Ok(year) => year,
        Err(_) => {
            let (whole, frac) = raw.split_once('.')?;
            if frac.is_empty() || !frac.chars().all(|c| c == '0') {
                return None;
            }
            whole.parse::<i32>().ok()?
        }
    };

    YEAR_RANGE.contains(&year).then_some(year)
}

// ============================================================================
// YEARLY RECORD
// ============================================================================

/// One property's assessment for one year, as scraped. Never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyRecord {
    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "State")]
    pub state: String,

    #[serde(rename = "Zip Code")]
    pub zip: String,

    #[serde(rename = "Year", default)]
    pub year: String,

    #[serde(rename = "Owner Info", default)]
    pub owner_info: String,

    #[serde(rename = "Assessed", default)]
    pub assessed: String,
}

impl YearlyRecord {
    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(&self.address, &self.city, &self.state, &self.zip)
    }

    pub fn year_value(&self) -> Option<i32> {
        parse_year(&self.year)
    }

    pub fn has_owner_info(&self) -> bool {
        !self.owner_info.trim().is_empty()
    }

    /// Assessed value as text, `None` when blank
    pub fn assessed_value(&self) -> Option<String> {
        let assessed = self.assessed.trim();
        if assessed.is_empty() {
            None
        } else {
            Some(assessed.to_string())
        }
    }

    /// False when year, owner info and assessed value are all unusable
    pub fn has_any_data(&self) -> bool {
        self.year_value().is_some() || self.has_owner_info() || self.assessed_value().is_some()
    }

    /// Content hash for collapsing duplicate rows from repeated scrapes
    pub fn fingerprint(&self) -> String {
        let key = self.key();
        let mut hasher = Sha256::new();
        for part in [
            key.address.as_str(),
            key.city.as_str(),
            key.state.as_str(),
            key.zip.as_str(),
            self.year.trim(),
            self.owner_info.trim(),
            self.assessed.trim(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1fu8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Row of a single-property tax history file
#[derive(Debug, Clone, Deserialize)]
struct HistoryRow {
    #[serde(rename = "Year", default)]
    year: String,

    #[serde(rename = "Owner Info", default)]
    owner_info: String,

    #[serde(rename = "Assessed", default)]
    assessed: String,
}

impl From<HistoryRow> for YearlyRecord {
    fn from(row: HistoryRow) -> Self {
        YearlyRecord {
            year: row.year,
            owner_info: row.owner_info,
            assessed: row.assessed,
            ..YearlyRecord::default()
        }
    }
}

// ============================================================================
// QUERY ENTRY
// ============================================================================

/// A property the report must cover, matched or not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEntry {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,

    #[serde(rename = "Site Name", default)]
    pub site_name: String,
}

impl QueryEntry {
    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(&self.address, &self.city, &self.state, &self.zip_code)
    }
}

// ============================================================================
// LOADERS
// ============================================================================

fn read_rows<T, R>(label: &str, reader: R, required: &[&str]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .with_context(|| format!("Failed to read header row of {}", label))?
        .clone();
    require_columns(label, &headers, required)?;

    let mut rows = Vec::new();
    for (line_num, result) in rdr.deserialize().enumerate() {
        let row: T = result.with_context(|| {
            format!("Failed to parse CSV line {} in {}", line_num + 2, label)
        })?;
        rows.push(row);
    }

    Ok(rows)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))
}

pub fn read_records<R: Read>(label: &str, reader: R) -> Result<Vec<YearlyRecord>> {
    read_rows(label, reader, &RECORD_COLUMNS)
}

pub fn read_queries<R: Read>(label: &str, reader: R) -> Result<Vec<QueryEntry>> {
    read_rows(label, reader, &QUERY_COLUMNS)
}

pub fn read_history<R: Read>(label: &str, reader: R) -> Result<Vec<YearlyRecord>> {
    let rows: Vec<HistoryRow> = read_rows(label, reader, &HISTORY_COLUMNS)?;
    Ok(rows.into_iter().map(YearlyRecord::from).collect())
}

/// Load scraped yearly records (`Address, City, State, Zip Code, Year, Owner Info, Assessed`)
pub fn load_records(path: &Path) -> Result<Vec<YearlyRecord>> {
    let records = read_records(&path.display().to_string(), open(path)?)?;
    tracing::debug!(path = %path.display(), rows = records.len(), "loaded yearly records");
    Ok(records)
}

/// Load the query list (`address, city, state, zip_code, Site Name`)
pub fn load_queries(path: &Path) -> Result<Vec<QueryEntry>> {
    let queries = read_queries(&path.display().to_string(), open(path)?)?;
    tracing::debug!(path = %path.display(), rows = queries.len(), "loaded query list");
    Ok(queries)
}

/// Load one property's tax history (`Year, Owner Info[, Assessed]`)
pub fn load_history(path: &Path) -> Result<Vec<YearlyRecord>> {
    read_history(&path.display().to_string(), open(path)?)
}

// ============================================================================
// REPORT ROW + WRITERS
// ============================================================================

/// One output line; column names are the report's external contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Site Name")]
    pub site_name: String,

    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "State")]
    pub state: String,

    #[serde(rename = "Zip Code")]
    pub zip: String,

    #[serde(rename = "Owner Info")]
    pub owner: String,

    #[serde(rename = "Mailing Address")]
    pub mailing_address: String,

    #[serde(rename = "Ownership Start Year")]
    pub ownership_start_year: Option<i32>,

    #[serde(rename = "Current Year")]
    pub current_year: Option<i32>,

    #[serde(rename = "Years Owned")]
    pub years_owned: Option<i32>,

    #[serde(rename = "Assessed")]
    pub assessed: Option<String>,
}

pub fn write_report_csv<W: Write>(writer: W, rows: &[ReportRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).context("Failed to write report row")?;
    }
    wtr.flush().context("Failed to flush report")?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a, S: Serialize> {
    summary: &'a S,
    rows: &'a [ReportRow],
}

pub fn write_report_json<W: Write, S: Serialize>(mut writer: W, summary: &S, rows: &[ReportRow]) -> Result<()> {
    let doc = JsonReport { summary, rows };
    serde_json::to_writer_pretty(&mut writer, &doc).context("Failed to write JSON report")?;
    writeln!(writer).context("Failed to write JSON report")?;
    writer.flush().context("Failed to flush report")?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS_CSV: &str = "\
Address,City,State,Zip Code,Year,Owner Info,Assessed,Exemption
201 Union Ln,Brielle,NJ,08730,2023,\"ACME, LLC, 1 MAIN ST\",350000,0
201 Union Ln,Brielle,NJ,08730,,,,
";

    #[test]
    fn test_read_records() {
        let records = read_records("records.csv", RECORDS_CSV.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].zip, "08730");
        assert_eq!(records[0].owner_info, "ACME, LLC, 1 MAIN ST");
        assert_eq!(records[0].year_value(), Some(2023));
        assert!(records[0].has_any_data());
        assert!(!records[1].has_any_data());
    }

    #[test]
    fn test_read_records_short_trailing_row() {
        let csv_data = "\
Address,City,State,Zip Code,Year,Owner Info,Assessed
201 Union Ln,Brielle,NJ,08730,2023,\"ACME, LLC, 1 MAIN ST\",350000
201 Union Ln,Brielle,NJ,08730,2022,\"ACME, LLC, 1 MAIN ST\"
";
        let records = read_records("records.csv", csv_data.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].year_value(), Some(2022));
        assert_eq!(records[1].owner_info, "ACME, LLC, 1 MAIN ST");
        assert_eq!(records[1].assessed, "");
        assert_eq!(records[1].assessed_value(), None);
    }

    #[test]
    fn test_missing_record_columns_is_fatal() {
        let csv_data = "Address,City,State,Zip Code,Year,Assessed\n1 A St,X,NJ,1,2023,5\n";
        let err = read_records("records.csv", csv_data.as_bytes()).unwrap_err();

        let column_err = err.downcast_ref::<ColumnError>().expect("column error");
        assert_eq!(
            column_err,
            &ColumnError::Missing {
                file: "records.csv".to_string(),
                columns: vec!["Owner Info".to_string()],
            }
        );
        assert!(err.to_string().contains("Owner Info"));
    }

    #[test]
    fn test_missing_query_columns_lists_all() {
        let csv_data = "address,city\n1 A St,X\n";
        let err = read_queries("queries.csv", csv_data.as_bytes()).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("state"));
        assert!(message.contains("zip_code"));
        assert!(message.contains("Site Name"));
    }

    #[test]
    fn test_read_queries() {
        let csv_data = "address,city,state,zip_code,Site Name\n10 RT 35,Wall,NJ,7719,Shell #12\n";
        let queries = read_queries("queries.csv", csv_data.as_bytes()).unwrap();

        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].site_name, "Shell #12");
        assert_eq!(queries[0].key().zip, "07719");
    }

    #[test]
    fn test_read_history_without_assessed() {
        let csv_data = "Year,Owner Info\n2024,\"ACME, LLC\"\n2023,\"ACME, LLC\"\n";
        let records = read_history("history.csv", csv_data.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].year_value(), Some(2023));
        assert_eq!(records[0].assessed_value(), None);
    }

    #[test]
    fn test_property_key_normalization() {
        let a = PropertyKey::new("  201  union ln ", "brielle", "nj", "8730");
        let b = PropertyKey::new("201 UNION LN", "BRIELLE", "NJ", "08730");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), "201 UNION LN, BRIELLE, NJ 08730");
    }

    #[test]
    fn test_normalize_zip() {
        assert_eq!(normalize_zip("8730"), "08730");
        assert_eq!(normalize_zip("08730"), "08730");
        assert_eq!(normalize_zip("8730.0"), "08730");
        assert_eq!(normalize_zip("07719-1234"), "07719-1234");
        assert_eq!(normalize_zip(""), "");
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2023"), Some(2023));
        assert_eq!(parse_year(" 2021 "), Some(2021));
        assert_eq!(parse_year("2022.0"), Some(2022));
        assert_eq!(parse_year("2022.5"), None);
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_parse_year_rejects_out_of_range() {
        assert_eq!(parse_year("-5"), None);
        assert_eq!(parse_year("0"), None);
        assert_eq!(parse_year("2147483647"), None);
        assert_eq!(parse_year("99999"), None);
        assert_eq!(parse_year("-2023.0"), None);
        assert_eq!(parse_year("1000"), Some(1000));
        assert_eq!(parse_year("9999"), Some(9999));
    }

    #[test]
    fn test_fingerprint_ignores_key_casing() {
        let a = YearlyRecord {
            address: "1 Main St".to_string(),
            city: "Wall".to_string(),
            state: "NJ".to_string(),
            zip: "7719".to_string(),
            year: "2023".to_string(),
            owner_info: "ACME, LLC".to_string(),
            assessed: "100".to_string(),
        };
        let mut b = a.clone();
        b.address = "1 MAIN ST".to_string();
        b.zip = "07719".to_string();

        assert_eq!(a.fingerprint(), b.fingerprint());

        b.year = "2022".to_string();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_write_report_csv_empty_derived_fields() {
        let rows = vec![ReportRow {
            site_name: "Site".to_string(),
            address: "1 Main St".to_string(),
            city: "Wall".to_string(),
            state: "NJ".to_string(),
            zip: "07719".to_string(),
            owner: String::new(),
            mailing_address: String::new(),
            ownership_start_year: None,
            current_year: None,
            years_owned: None,
            assessed: None,
        }];

        let mut out = Vec::new();
        write_report_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Site Name,Address,City,State,Zip Code,Owner Info,Mailing Address,Ownership Start Year,Current Year,Years Owned,Assessed"
        );
        assert_eq!(lines.next().unwrap(), "Site,1 Main St,Wall,NJ,07719,,,,,,");
    }

    #[test]
    fn test_write_report_json() {
        let rows = vec![ReportRow {
            site_name: "Site".to_string(),
            address: "1 Main St".to_string(),
            city: "Wall".to_string(),
            state: "NJ".to_string(),
            zip: "07719".to_string(),
            owner: "ACME LLC".to_string(),
            mailing_address: "1 MAIN ST".to_string(),
            ownership_start_year: Some(2020),
            current_year: Some(2024),
            years_owned: Some(5),
            assessed: Some("350,000".to_string()),
        }];

        let mut out = Vec::new();
        write_report_json(&mut out, &serde_json::json!({ "queried": 1 }), &rows).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(doc["summary"]["queried"], 1);
        assert_eq!(doc["rows"][0]["Owner Info"], "ACME LLC");
        assert_eq!(doc["rows"][0]["Years Owned"], 5);
        assert_eq!(doc["rows"][0]["Zip Code"], "07719");
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        std::fs::write(&path, RECORDS_CSV).unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);

        assert!(load_records(&dir.path().join("missing.csv")).is_err());
    }
}
