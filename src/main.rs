use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use era_rank::config::Config;
use era_rank::error::{DataError, ErrorKind, PipelineError, SchemaError};
use era_rank::scoring::{EraConfig, EraPreset, PipelineConfig, RankedTable, ScoringConfig};
use era_rank::table::DEFAULT_INPUT;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_IO: i32 = 2;
const EXIT_CONFIG: i32 = 4;
const EXIT_SCHEMA: i32 = 5;
const EXIT_DATA: i32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Aligned, colored table
    #[default]
    Table,
    /// Tab-separated values
    Tsv,
    /// Comma-separated values
    Csv,
    /// JSON array of row objects
    Json,
}

#[derive(Args, Debug, Default)]
struct RankArgs {
    /// Player stats CSV (defaults to the config `input`, then players_stats.csv)
    csv: Option<PathBuf>,

    /// Output format for stdout
    #[arg(short, long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Also write the full ranked table to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma-separated columns to display
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Only show Rank, Player and Score
    #[arg(short, long)]
    brief: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank players by era-adjusted score (default if no subcommand)
    Rank(RankArgs),
    /// Compare two ranked players side by side
    Compare {
        /// First player (exact name)
        first: String,
        /// Second player (exact name)
        second: String,
        /// Player stats CSV (defaults to the config `input`, then players_stats.csv)
        csv: Option<PathBuf>,
    },
    /// Bar chart of the top scores
    Chart {
        /// Player stats CSV (defaults to the config `input`, then players_stats.csv)
        csv: Option<PathBuf>,

        /// Number of players to chart
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Show how one player's score is built
    Explain {
        /// Player (exact name)
        player: String,
        /// Player stats CSV (defaults to the config `input`, then players_stats.csv)
        csv: Option<PathBuf>,
    },
    /// Print the effective scoring configuration as YAML
    Config,
}

#[derive(Parser, Debug)]
#[command(name = "era-rank")]
#[command(about = "Era-adjusted career ranking of basketball players", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/era-rank/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of ranked players to keep
    #[arg(short, long, global = true)]
    top: Option<usize>,

    /// Era tier table to use instead of the configured one
    #[arg(long, value_enum, global = true)]
    era_preset: Option<EraPreset>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Map an error to an exit code by the pipeline error kind it carries, if any
fn exit_code(err: &anyhow::Error) -> i32 {
    let kind = err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<PipelineError>() {
            Some(e.kind())
        } else if cause.is::<SchemaError>() {
            Some(ErrorKind::Schema)
        } else if cause.is::<DataError>() {
            Some(ErrorKind::Data)
        } else {
            None
        }
    });
    match kind {
        Some(ErrorKind::Config) => EXIT_CONFIG,
        Some(ErrorKind::Schema) => EXIT_SCHEMA,
        Some(ErrorKind::Data) => EXIT_DATA,
        None => EXIT_IO,
    }
}

/// Config file scoring section with CLI overrides applied
fn effective_scoring(cli: &Cli, config: &Config) -> ScoringConfig {
    let mut scoring = config.scoring.clone().unwrap_or_default();
    if let Some(top) = cli.top {
        scoring.top_n = Some(top);
    }
    if let Some(preset) = cli.era_preset {
        let column = scoring.era.as_ref().and_then(|e| e.column.clone());
        scoring.era = Some(EraConfig {
            preset: Some(preset),
            column,
            buckets: None,
        });
    }
    scoring
}

fn resolve_input(arg: Option<&Path>, config: &Config) -> PathBuf {
    arg.map(Path::to_path_buf)
        .or_else(|| config.input.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT))
}

fn rank_file(path: &Path, pipeline: &PipelineConfig) -> Result<RankedTable> {
    let start = Instant::now();
    let table = era_rank::table::load_csv(path)?;
    let ranked = era_rank::scoring::run_pipeline(table, pipeline)
        .with_context(|| format!("Failed to rank {}", path.display()))?;
    info!(
        kept = ranked.len(),
        population = ranked.population_size(),
        elapsed = ?start.elapsed(),
        "ranked {}",
        path.display()
    );
    Ok(ranked)
}

fn run(cli: Cli) -> Result<()> {
    let config = match era_rank::config::load_config(cli.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Validate scoring config at startup
    let scoring = effective_scoring(&cli, &config);
    if let Err(errors) = era_rank::scoring::validate_scoring(&scoring) {
        eprintln!("Scoring config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }
    let pipeline = PipelineConfig::from_scoring(&scoring)?;
    debug!(
        kpis = pipeline.kpis.len(),
        top_n = pipeline.top_n,
        "scoring config ready"
    );

    let use_colors = era_rank::output::should_use_colors();

    match cli.command.unwrap_or_else(|| Commands::Rank(RankArgs::default())) {
        Commands::Rank(args) => {
            let path = resolve_input(args.csv.as_deref(), &config);
            let ranked = rank_file(&path, &pipeline)?;

            if let Some(output) = &args.output {
                era_rank::table::save_csv(output, ranked.table())?;
                info!(path = %output.display(), "wrote ranked table");
            }

            let columns = args
                .columns
                .or_else(|| config.columns.clone())
                .unwrap_or_else(|| era_rank::output::display_columns(&ranked, args.brief));

            let rendered = match args.format {
                OutputFormat::Table => {
                    era_rank::output::format_ranked_table(&ranked, &columns, use_colors)?
                }
                OutputFormat::Tsv => era_rank::output::format_tsv(&ranked, &columns)?,
                OutputFormat::Json => era_rank::output::format_json(&ranked, &columns)?,
                OutputFormat::Csv => {
                    let view = ranked.table().select(&columns)?;
                    let mut buf = Vec::new();
                    era_rank::table::write_csv(&view, &mut buf)?;
                    String::from_utf8(buf).context("CSV output is not valid UTF-8")?
                }
            };
            println!("{}", rendered.trim_end());
        }
        Commands::Compare { first, second, csv } => {
            let path = resolve_input(csv.as_deref(), &config);
            let ranked = rank_file(&path, &pipeline)?;
            let (a, b) = ranked.compare(&first, &second)?;
            println!(
                "{}",
                era_rank::output::format_comparison(&a, &b, ranked.kpis(), use_colors)
            );
        }
        Commands::Chart { csv, count } => {
            let path = resolve_input(csv.as_deref(), &config);
            let ranked = rank_file(&path, &pipeline)?;
            println!(
                "{}",
                era_rank::output::format_score_chart(&ranked, count, use_colors)
            );
        }
        Commands::Explain { player, csv } => {
            let path = resolve_input(csv.as_deref(), &config);
            let ranked = rank_file(&path, &pipeline)?;
            let row = ranked.find(&player).with_context(|| {
                format!("'{}' is not in the top {} ranking", player, ranked.len())
            })?;
            println!(
                "{}",
                era_rank::output::format_breakdown(&row, ranked.factor_columns(), use_colors)
            );
        }
        Commands::Config => {
            let yaml = serde_saphyr::to_string(&scoring)
                .context("Failed to serialize scoring config")?;
            println!("{}", yaml.trim_end());
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }

    std::process::exit(EXIT_SUCCESS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn config_with_input(input: &str) -> Config {
        Config {
            input: Some(PathBuf::from(input)),
            ..Config::default()
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_compare_csv_is_optional() {
        let args = ["era-rank", "compare", "Magic Johnson", "Larry Bird"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Compare { first, second, csv }) => {
                assert_eq!(first, "Magic Johnson");
                assert_eq!(second, "Larry Bird");
                assert_eq!(csv, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = ["era-rank", "explain", "Bob Cousy", "stats.csv"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Explain { player, csv }) => {
                assert_eq!(player, "Bob Cousy");
                assert_eq!(csv, Some(PathBuf::from("stats.csv")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_input_fallbacks() {
        let config = config_with_input("cfg.csv");
        let explicit = resolve_input(Some(Path::new("given.csv")), &config);
        assert_eq!(explicit, PathBuf::from("given.csv"));

        let configured = resolve_input(None, &config_with_input("cfg.csv"));
        assert_eq!(configured, PathBuf::from("cfg.csv"));

        let default = resolve_input(None, &Config::default());
        assert_eq!(default, PathBuf::from(DEFAULT_INPUT));
    }

    #[test]
    fn test_era_preset_flag_replaces_buckets() {
        let args = ["era-rank", "--era-preset", "classic", "--top", "5"];
        let cli = Cli::try_parse_from(args).unwrap();
        let scoring = effective_scoring(&cli, &Config::default());

        assert_eq!(scoring.top_n, Some(5));
        let era = scoring.era.as_ref().unwrap();
        assert_eq!(era.preset, Some(EraPreset::Classic));
        assert_eq!(era.buckets, None);
        assert!(era_rank::scoring::validate_scoring(&scoring).is_ok());
    }
}
