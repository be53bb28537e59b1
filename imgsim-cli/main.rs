use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use imgsim_cli::{ImageSource, KeyStrategy, RankedMatch, SearchConfig, SearchError};
use log::debug;
use thiserror::Error;

/// Query argument that reads encoded image bytes from standard input
const STDIN_QUERY: &str = "-";

/// Rank the images in a directory by similarity to a query image.
#[derive(Parser, Debug)]
#[command(name = "imgsim", version, about = "Top-K image similarity search")]
struct CliArgs {
    /// Query image path, or `-` to read it from stdin.
    #[arg(value_name = "QUERY")]
    query: String,
    /// Directory holding the dataset images.
    #[arg(value_name = "DATASET_DIR")]
    dataset: PathBuf,
    /// Number of results to return.
    #[arg(long, short = 'k', value_name = "N")]
    top_k: Option<usize>,
    /// Feature cache directory.
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
    /// Path to TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// How cache keys are derived from image paths.
    #[arg(long, value_enum)]
    key_strategy: Option<KeyStrategy>,
    /// Recompute cached features when the image file changed.
    #[arg(long)]
    revalidate: bool,
    /// Output format for results.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Log filter, e.g. `debug` or `imgsim_cli=trace`.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("failed to read query from stdin: {0}")]
    Stdin(io::Error),
    #[error("failed to encode results: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    init_logger(&cli, &config);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(cli: &CliArgs) -> Result<SearchConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => SearchConfig::load_toml(path).map_err(SearchError::from)?,
        None => SearchConfig::default(),
    };
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut SearchConfig, cli: &CliArgs) {
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(strategy) = cli.key_strategy {
        config.cache.key_strategy = strategy;
    }
    if cli.revalidate {
        config.cache.revalidate_mtime = true;
    }
}

/// Level precedence: `--log-level`, then `RUST_LOG`, then the config file, then info
fn init_logger(cli: &CliArgs, config: &SearchConfig) {
    let mut builder = env_logger::Builder::new();
    builder.target(env_logger::Target::Stderr);
    builder.filter_level(log::LevelFilter::Info);

    let env_filter = std::env::var("RUST_LOG").ok();
    let filter = cli
        .log_level
        .as_deref()
        .or(env_filter.as_deref())
        .or(config.log_level.as_deref());
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }

    if let Err(err) = builder.try_init() {
        eprintln!("Failed to initialize logger: {}", err);
    }
}

fn read_query(cli: &CliArgs) -> Result<ImageSource, CliError> {
    if cli.query == STDIN_QUERY {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data).map_err(CliError::Stdin)?;
        debug!("Read {} query bytes from stdin", data.len());
        return Ok(ImageSource::Bytes { name: "stdin".to_string(), data });
    }
    Ok(ImageSource::Path(PathBuf::from(&cli.query)))
}

fn run(cli: &CliArgs, config: &SearchConfig) -> Result<(), CliError> {
    let ranker = config.build_ranker()?;
    let query = read_query(cli)?;
    let results = ranker.find_similar(&query, &cli.dataset, config.top_k)?;
    let output = render(&results, cli.format)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn render(results: &[RankedMatch], format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(results)?),
        OutputFormat::Text => Ok(results
            .iter()
            .enumerate()
            .map(|(i, m)| format!("{}. {} (score: {})", i + 1, m.path.display(), m.score))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}
