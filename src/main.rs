use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use property_tenure::{
    AddressVariants, EngineConfig, OwnerNormalizer, PropertyKey, ReportBuilder, TenureResolver,
    load_history, load_queries, load_records, write_report_csv, write_report_json,
};

#[derive(Parser)]
#[command(name = "property-tenure", version, about = "Current owner and years owned from yearly tax-assessment records")]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// JSON file overriding suffix and street-type tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the tenure report for every property in the query list
    Report {
        /// Scraped yearly records (Address, City, State, Zip Code, Year, Owner Info, Assessed)
        #[arg(long)]
        records: PathBuf,

        /// Properties to report on (address, city, state, zip_code, Site Name)
        #[arg(long)]
        queries: PathBuf,

        /// Output file, `-` for stdout
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        /// Retry unmatched properties under street-type variants
        #[arg(long)]
        match_variants: bool,
    },

    /// Resolve tenure for a single property's tax history (Year, Owner Info[, Assessed])
    Analyze { history: PathBuf },

    /// Print the address variants tried for a lookup, in order
    Variants { address: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("❌ {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Report {
            records,
            queries,
            output,
            format,
            match_variants,
        } => {
            let config = EngineConfig {
                match_address_variants: config.match_address_variants || match_variants,
                ..config
            };
            run_report(&config, &records, &queries, &output, format)
        }
        Command::Analyze { history } => run_analyze(&config, &history),
        Command::Variants { address } => run_variants(&config, &address),
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("PROPERTY_TENURE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn run_report(
    config: &EngineConfig,
    records_path: &Path,
    queries_path: &Path,
    output: &Path,
    format: Format,
) -> Result<()> {
    let to_stdout = output == Path::new("-");
    let say = |msg: String| {
        if !to_stdout {
            println!("{}", msg);
        }
    };

    say("📂 Loading records...".to_string());
    let queries = load_queries(queries_path)?;
    let records = load_records(records_path)?;
    say(format!("✓ Loaded {} yearly records, {} queried properties", records.len(), queries.len()));

    let builder = ReportBuilder::new(config)?;
    let report = builder.build_report(records, &queries);
    let rows = report.rows();

    let writer: Box<dyn Write> = if to_stdout {
        Box::new(io::stdout().lock())
    } else {
        let file = File::create(output)
            .with_context(|| format!("Failed to create output file: {}", output.display()))?;
        Box::new(BufWriter::new(file))
    };

    match format {
        Format::Csv => write_report_csv(writer, &rows)?,
        Format::Json => write_report_json(writer, &report.summary, &rows)?,
    }

    say(format!("✓ {}", report.summary.summary()));
    say(format!("💾 Report written to {}", output.display()));

    Ok(())
}

fn run_analyze(config: &EngineConfig, history: &Path) -> Result<()> {
    let records = load_history(history)?;
    let resolver = TenureResolver::new(OwnerNormalizer::new(config)?);

    let key = PropertyKey::new("", "", "", "");
    let result = resolver.resolve(&key, &records);

    let show = |v: Option<i32>| v.map(|y| y.to_string()).unwrap_or_default();

    println!("\nOwnership Analysis:");
    println!("Current Owner: {}", result.current_owner.name);
    println!("Mailing Address: {}", result.current_owner.mailing_address);
    println!("Ownership Start Year: {}", show(result.ownership_start_year));
    println!("Current Year: {}", show(result.current_year));
    println!("Years Owned: {}", show(result.years_owned));

    if !result.is_resolved() {
        eprintln!("⚠️  Not enough data in {} to resolve tenure", history.display());
    }

    Ok(())
}

fn run_variants(config: &EngineConfig, address: &str) -> Result<()> {
    let variants = AddressVariants::new(config);
    for candidate in variants.generate(address) {
        println!("{}", candidate);
    }
    Ok(())
}
