//! Retail Insights CLI - sales dashboard views from a transaction export
//!
//! # Main Commands
//!
//! ```bash
//! retail-insights serve                       # Start HTTP server (port 3000)
//! retail-insights report sales.csv            # KPIs + matrix + trend as JSON
//! ```
//!
//! # Single-view Commands
//!
//! ```bash
//! retail-insights parse sales.csv             # Just parse CSV to JSON rows
//! retail-insights normalize sales.csv         # Typed, date-ordered transactions
//! retail-insights kpis sales.csv              # Headline metrics
//! retail-insights matrix sales.csv -p Tea     # Year x brand sales totals
//! retail-insights trend sales.csv -w 50       # Smoothed quantity series
//! ```

use clap::{Args, Parser, Subcommand};
use retail_insights::{
    analyze_csv, build_sales_matrix, build_trend_series, compute_kpis, filter_by_products,
    group_by_year_brand_product, load_bytes, parse_csv_file_auto, resolve_filter, AnalysisOptions,
    ColumnMapping, LoadedDataset, Settings,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "retail-insights")]
#[command(about = "KPIs, sales matrix and trend series from retail transaction exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Source column overrides shared by the analysis commands
#[derive(Args, Debug, Clone, Default)]
struct ColumnArgs {
    /// Date column (a year, year-month or full date; default from RETAIL_INSIGHTS_DATE_COLUMN or "year")
    #[arg(long)]
    date_column: Option<String>,

    /// Brand column (default: "Brand")
    #[arg(long)]
    brand_column: Option<String>,

    /// Product column (default: "Product")
    #[arg(long)]
    product_column: Option<String>,

    /// Quantity column (default: "Quantity")
    #[arg(long)]
    quantity_column: Option<String>,

    /// Total price column (default: "Total Price")
    #[arg(long)]
    price_column: Option<String>,

    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Skip malformed rows instead of failing
    #[arg(long)]
    lenient: bool,
}

impl ColumnArgs {
    fn mapping(&self, settings: &Settings) -> ColumnMapping {
        let defaults = ColumnMapping::default();
        ColumnMapping {
            date: self.date_column.clone().unwrap_or_else(|| settings.date_column.clone()),
            brand: self.brand_column.clone().unwrap_or(defaults.brand),
            product: self.product_column.clone().unwrap_or(defaults.product),
            quantity: self.quantity_column.clone().unwrap_or(defaults.quantity),
            total_price: self.price_column.clone().unwrap_or(defaults.total_price),
        }
    }

    fn options(&self, settings: &Settings) -> AnalysisOptions {
        AnalysisOptions {
            columns: self.mapping(settings),
            delimiter: self.delimiter,
            lenient: self.lenient,
            trend_window: settings.trend_window,
            ..AnalysisOptions::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON rows
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalize rows into typed, date-ordered transactions
    Normalize {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        columns: ColumnArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Total quantity, distinct products and best year
    Kpis {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        columns: ColumnArgs,
    },

    /// Year x brand sales totals for the selected products
    Matrix {
        /// Input CSV file
        input: PathBuf,

        /// Product to include (repeatable; default: first two products)
        #[arg(short, long = "product")]
        products: Vec<String>,

        /// Output the (year, brand, product) groups instead of the melted rows
        #[arg(long)]
        detail: bool,

        #[command(flatten)]
        columns: ColumnArgs,
    },

    /// Rolling-mean quantity series for the selected products
    Trend {
        /// Input CSV file
        input: PathBuf,

        /// Product to include (repeatable; default: first two products)
        #[arg(short, long = "product")]
        products: Vec<String>,

        /// Rolling window (default from RETAIL_INSIGHTS_TREND_WINDOW or 200)
        #[arg(short, long)]
        window: Option<usize>,

        #[command(flatten)]
        columns: ColumnArgs,
    },

    /// Full pipeline: KPIs, sales matrix and trend series
    Report {
        /// Input CSV file
        input: PathBuf,

        /// Product to include (repeatable; default: first two products)
        #[arg(short, long = "product")]
        products: Vec<String>,

        /// Rolling window (default from RETAIL_INSIGHTS_TREND_WINDOW or 200)
        #[arg(short, long)]
        window: Option<usize>,

        #[command(flatten)]
        columns: ColumnArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default from RETAIL_INSIGHTS_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match Settings::from_env() {
        Ok(settings) => run(cli.command, settings).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, settings: Settings) -> CliResult {
    match command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Normalize { input, columns, output } => {
            cmd_normalize(&input, &columns.options(&settings), output.as_deref())
        }

        Commands::Kpis { input, columns } => cmd_kpis(&input, &columns.options(&settings)),

        Commands::Matrix {
            input,
            products,
            detail,
            columns,
        } => {
            let options = with_selection(columns.options(&settings), products, None);
            cmd_matrix(&input, &options, detail)
        }

        Commands::Trend {
            input,
            products,
            window,
            columns,
        } => {
            let options = with_selection(columns.options(&settings), products, window);
            cmd_trend(&input, &options)
        }

        Commands::Report {
            input,
            products,
            window,
            columns,
            output,
        } => {
            let options = with_selection(columns.options(&settings), products, window);
            cmd_report(&input, &options, output.as_deref())
        }

        Commands::Serve { port } => {
            let settings = Settings {
                port: port.unwrap_or(settings.port),
                ..settings
            };
            retail_insights::server::start_server(settings).await?;
            Ok(())
        }
    }
}

fn with_selection(options: AnalysisOptions, products: Vec<String>, window: Option<usize>) -> AnalysisOptions {
    AnalysisOptions {
        products: (!products.is_empty()).then_some(products),
        trend_window: window.unwrap_or(options.trend_window),
        ..options
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> CliResult {
    eprintln!("Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("Parsed {} records", result.records.len());

    write_json(&result.records, output)
}

fn load(input: &Path, options: &AnalysisOptions) -> Result<LoadedDataset, Box<dyn std::error::Error>> {
    eprintln!("Processing: {}", input.display());
    let bytes = fs::read(input)?;
    Ok(load_bytes(&bytes, options)?)
}

fn cmd_normalize(input: &Path, options: &AnalysisOptions, output: Option<&Path>) -> CliResult {
    let dataset = load(input, options)?;
    write_json(&dataset.set, output)
}

fn cmd_kpis(input: &Path, options: &AnalysisOptions) -> CliResult {
    let dataset = load(input, options)?;
    let kpis = compute_kpis(&dataset.set)?;

    println!("Total quantity:     {}", kpis.total_quantity);
    println!("Distinct products:  {}", kpis.distinct_product_count);
    println!("Best year:          {}", kpis.best_year);
    Ok(())
}

fn cmd_matrix(input: &Path, options: &AnalysisOptions, detail: bool) -> CliResult {
    let dataset = load(input, options)?;
    let filtered = filter_by_products(&dataset.set, &resolve_filter(&dataset.set, options));

    if detail {
        write_json(&group_by_year_brand_product(&filtered), None)
    } else {
        write_json(&build_sales_matrix(&filtered), None)
    }
}

fn cmd_trend(input: &Path, options: &AnalysisOptions) -> CliResult {
    let dataset = load(input, options)?;
    let filtered = filter_by_products(&dataset.set, &resolve_filter(&dataset.set, options));
    let trend = build_trend_series(&filtered, options.trend_window)?;
    write_json(&trend, None)
}

fn cmd_report(input: &Path, options: &AnalysisOptions, output: Option<&Path>) -> CliResult {
    let result = analyze_csv(input, options)?;

    let csv = &result.dataset.csv_info;
    eprintln!("   Encoding: {}", csv.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(csv.delimiter));
    eprintln!("   Rows: {}", csv.row_count);
    eprintln!("   Columns: {}", csv.headers.join(", "));

    if !result.dataset.skipped.is_empty() {
        eprintln!("   Skipped: {} malformed rows", result.dataset.skipped.len());
    }

    write_json(&result.report, output)?;
    eprintln!("Done!");
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: Option<&Path>) -> CliResult {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(p) => {
            fs::write(p, &json)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}
