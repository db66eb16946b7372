//! dtpi CLI - Digital Transformation Potential Index from Eurostat tables
//!
//! # Main Commands
//!
//! ```bash
//! dtpi run                                  # Full analysis, JSON report on stdout
//! dtpi run --data-dir data -o report.json   # Read tables from a directory
//! dtpi serve                                # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! dtpi reshape isoc_sk_oja1.tsv             # Wide table to long rows
//! dtpi series namq_10_a10_e.tsv --metric gva --country IT
//! dtpi metrics                              # Show metrics and their filters
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use dtpi::config::{parse_countries, parse_start_quarter};
use dtpi::parser::compound_geo_header;
use dtpi::transform::pipeline::prepare_rows;
use dtpi::{
    analyze_metric_table, parse_table_file, provider_from_config, run_analysis, AnalysisConfig,
    CachedProvider, Metric, PeriodKey, SourceConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dtpi")]
#[command(about = "Compute Digital Transformation Potential indices from Eurostat tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and output the JSON report
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// First quarter of the window, e.g. 2019Q4
        #[arg(short, long)]
        start: Option<String>,

        /// Comma-separated country codes, e.g. IT,FR,DE
        #[arg(long)]
        countries: Option<String>,

        /// Read `{dataset}.tsv` tables from this directory instead of Eurostat
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reshape a local wide table into long rows
    Reshape {
        /// Input table (Eurostat TSV or delimited)
        input: PathBuf,

        /// Comma-separated id columns (default: inferred from the metric)
        #[arg(long)]
        id_columns: Option<String>,

        /// Keep observations from this quarter on
        #[arg(short, long)]
        start: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalized series of one metric for one country
    Series {
        /// Input table (Eurostat TSV or delimited)
        input: PathBuf,

        /// gva, employment or labour-demand
        #[arg(short, long)]
        metric: Metric,

        /// Country code, e.g. IT
        #[arg(short, long)]
        country: String,

        /// Keep observations from this quarter on
        #[arg(short, long)]
        start: Option<String>,

        /// Moving-average window (2 to 4)
        #[arg(short, long)]
        window: Option<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the metrics with their datasets and dimension filters
    Metrics,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            start,
            countries,
            data_dir,
            output,
        } => {
            cmd_run(
                config.as_deref(),
                start.as_deref(),
                countries.as_deref(),
                data_dir,
                output.as_deref(),
            )
            .await
        }

        Commands::Reshape {
            input,
            id_columns,
            start,
            output,
        } => cmd_reshape(&input, id_columns.as_deref(), start.as_deref(), output.as_deref()),

        Commands::Series {
            input,
            metric,
            country,
            start,
            window,
            output,
        } => cmd_series(&input, metric, &country, start.as_deref(), window, output.as_deref()),

        Commands::Metrics => cmd_metrics(),

        Commands::Serve { port, config } => cmd_serve(port, config.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_run(
    config_path: Option<&Path>,
    start: Option<&str>,
    countries: Option<&str>,
    data_dir: Option<PathBuf>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AnalysisConfig::load(config_path)?;
    if let Some(start) = start {
        config.start_quarter = parse_start_quarter(start)?;
    }
    if let Some(countries) = countries {
        config.countries = parse_countries(countries);
    }
    if let Some(path) = data_dir {
        config.source = SourceConfig::Directory { path };
    }

    let provider = CachedProvider::new(provider_from_config(&config.source));
    let report = run_analysis(&provider, &config).await?;

    eprintln!("\n📊 Window from {}", report.start_quarter);
    for country in &report.countries {
        eprintln!(
            "   {}: {} quarters, {} warnings",
            country.country,
            country.records.len(),
            country.warnings.len()
        );
    }
    for failure in &report.failures {
        eprintln!("   {}: skipped ({})", failure.country, failure.reason);
    }

    let json = serde_json::to_string_pretty(&report)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_reshape(
    input: &Path,
    id_columns: Option<&str>,
    start: Option<&str>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reshaping: {}", input.display());

    let parsed = parse_table_file(input)?;
    eprintln!("   Encoding: {}", parsed.encoding);
    eprintln!("   Format: {:?}", parsed.format);
    eprintln!("   Columns: {}", parsed.table.headers.join(", "));
    if let Some(header) = compound_geo_header(&parsed.table) {
        eprintln!("   Geo column: {} renamed to geo", header);
    }

    let id_columns: Vec<String> = match id_columns {
        Some(list) => list.split(',').map(|c| c.trim().to_string()).collect(),
        None => infer_metric(&parsed.table.headers)
            .id_columns()
            .iter()
            .map(|c| c.to_string())
            .collect(),
    };
    eprintln!("   Id columns: {}", id_columns.join(", "));

    let mut rows = dtpi::reshape(&parsed.table, id_columns.as_slice())?;
    if let Some(start) = start {
        rows = dtpi::filter_from(&rows, parse_start_quarter(start)?);
    }
    eprintln!("✅ {} long rows", rows.len());

    let json = serde_json::to_string_pretty(&rows)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_series(
    input: &Path,
    metric: Metric,
    country: &str,
    start: Option<&str>,
    window: Option<usize>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AnalysisConfig::default();
    if let Some(start) = start {
        config.start_quarter = parse_start_quarter(start)?;
    }
    if let Some(window) = window {
        config.moving_average_window = window;
    }
    config.validate()?;

    let parsed = parse_table_file(input)?;
    let series = analyze_metric_table(&parsed.table, metric, &country.to_uppercase(), &config)?;

    if series.points.is_empty() {
        let available = prepare_rows(&parsed.table, metric, config.start_quarter)?.len();
        return Err(format!(
            "no {} observations for {} ({} rows from {} in the table)",
            metric, country, available, config.start_quarter
        )
        .into());
    }
    if series.degenerate {
        eprintln!("⚠️  Constant series: normalized values set to 0");
    }
    eprintln!("✅ {} points for {} {}", series.points.len(), series.country, metric);

    let json = serde_json::to_string_pretty(&series)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let config = AnalysisConfig::default();
    for metric in Metric::ALL {
        println!("📈 {} (dataset {})", metric, config.dataset(metric));
        println!("   Id columns: {}", metric.id_columns().join(", "));
        let filters: Vec<String> = metric
            .dimension_filters()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!("   Filters: {}", filters.join(", "));
        println!();
    }
    println!("Default window starts at {}", PeriodKey::DEFAULT_START);
    Ok(())
}

async fn cmd_serve(port: u16, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AnalysisConfig::load(config_path)?;
    dtpi::server::start_server(port, config).await?;
    Ok(())
}

/// National accounts tables carry the industry dimension.
fn infer_metric(headers: &[String]) -> Metric {
    if headers.iter().any(|h| h == "nace_r2") {
        Metric::Gva
    } else {
        Metric::LabourDemand
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
