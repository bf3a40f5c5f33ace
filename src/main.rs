use chrono::NaiveDate;
use clap::{Parser, ValueEnum, builder::styling};
use entity_extractor::{
    CacheNaming, ExtractionRequest, SourceKind,
    cli::{load_settings, run_extraction},
    storage::write_table,
};
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Entity Extractor: pull one entity for one date from a warehouse, database, API or CSV file
#[derive(Parser)]
#[command(name = "extractor", version, styles = STYLES)]
struct Cli {
    /// Where to extract from
    #[arg(value_enum, ignore_case = true)]
    source: SourceKind,

    /// Name of the dataset to extract
    entity: String,

    /// As-of date (YYYY-MM-DD)
    date: NaiveDate,

    /// Connection string for the DB source
    #[arg(long)]
    dsn: Option<String>,

    /// Base name of the cache file, defaults to the entity
    #[arg(long)]
    file_name: Option<String>,

    /// Cache directory, or the file to read for the CSV source
    #[arg(long)]
    file_path: Option<PathBuf>,

    /// Override EXTRACT_CACHE_NAMING
    #[arg(long, value_enum)]
    cache_naming: Option<CacheNaming>,

    /// Write the extracted table to stdout
    #[arg(long, value_enum)]
    print: Option<PrintFormat>,

    /// The dotenv file to source settings from
    #[arg(short, long, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PrintFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if std::path::Path::new(&cli.env).exists() {
        dotenvy::from_filename(&cli.env)?;
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    let mut settings = load_settings()?;
    if let Some(naming) = cli.cache_naming {
        settings.cache_naming = naming;
    }

    let mut request = ExtractionRequest::new(cli.source, cli.entity, cli.date);
    if let Some(dsn) = cli.dsn {
        request = request.with_dsn(dsn);
    }
    if let Some(file_name) = cli.file_name {
        request = request.with_file_name(file_name);
    }
    if let Some(file_path) = cli.file_path {
        request = request.with_file_path(file_path);
    }

    log::info!(
        "Extracting {} for {} from {}",
        request.entity().bright_black(),
        request.date().cyan(),
        request.source().green()
    );

    let table = run_extraction(&request, &settings).await?;

    log::info!(
        "✓ Extracted {} row(s) x {} column(s)",
        table.len(),
        table.width()
    );

    match cli.print {
        Some(PrintFormat::Csv) => write_table(&table, std::io::stdout().lock(), false)?,
        Some(PrintFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&table.to_json_records())?)
        }
        None => {}
    }

    Ok(())
}
