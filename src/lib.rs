// Property Tenure Engine - Core Library
// Owner normalization, tenure resolution, report building, address variants

pub mod config;
pub mod owner;
pub mod records;
pub mod report;
pub mod tenure;
pub mod variants;

// Re-export commonly used types
pub use config::EngineConfig;
pub use owner::{NormalizedOwner, OwnerNormalizer};
pub use records::{
    ColumnError, PropertyKey, QueryEntry, ReportRow, YearlyRecord,
    load_history, load_queries, load_records, normalize_zip, parse_year,
    write_report_csv, write_report_json,
};
pub use report::{PropertyIndex, Report, ReportBuilder, ReportSummary, most_recent};
pub use tenure::{TenureResolver, TenureResult};
pub use variants::{AddressVariants, RecordSource, VariantMatch, Variants, find_with_variants};
