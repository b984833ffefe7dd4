//! Hot Hand Core - latent-state shot segmentation
//!
//! The main entry point for hh-core, handling:
//! - Batch analysis of shot logs (ingest, fit, label, export)
//! - Player reports over previously exported augmented datasets
//! - Engine configuration inspection and validation

use clap::{Args, Parser, Subcommand};
use hh_common::{format_error_human, Error, OutputFormat, StructuredError};
use hh_config::{load_config, validate_config, EngineConfig, LoadedConfig, ValidationError};
use hh_core::cache::DatasetCache;
use hh_core::exit_codes::ExitCode;
use hh_core::export::{self, ExportFormat};
use hh_core::ingest::{self, IngestError, InputFormat};
use hh_core::log_event;
use hh_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogOverrides, Stage,
};
use hh_core::pipeline::{AugmentedShot, EntityStatus, Pipeline};
use hh_core::stats::{self, CategoryFilter};
use hh_core::summary::{ReportEnvelope, RunIo, RunSummary, SUMMARY_SCHEMA_VERSION};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Hot Hand Core - find hot and cold stretches in shot sequences
#[derive(Parser)]
#[command(name = "hh-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Engine config file (engine.json)
    #[arg(long, global = true, env = "HH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format for the command payload on stdout
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Log format on stderr: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit every player in a shot log and label hot-zone shots
    Analyze(AnalyzeArgs),

    /// Efficiency, career profile and trajectory from an augmented dataset
    Report(ReportArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Shot log (CSV with header row, or JSON Lines)
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Input format (default: from extension)
    #[arg(long, value_enum)]
    input_format: Option<InputFormat>,

    /// Write augmented rows here
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Format of the augmented rows (default: from extension)
    #[arg(long, value_enum)]
    export_format: Option<ExportFormat>,

    /// Only analyze these players (repeatable)
    #[arg(long = "player")]
    players: Vec<String>,

    /// Players with fewer shots are not fitted
    #[arg(long)]
    min_sequence_len: Option<usize>,

    /// Number of latent states
    #[arg(long)]
    states: Option<usize>,

    /// Seed for initial parameters
    #[arg(long)]
    seed: Option<u64>,

    /// Parallel fitting workers (0 = available parallelism)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Augmented dataset written by `analyze --output`
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Format of the augmented dataset (default: from extension)
    #[arg(long, value_enum)]
    input_format: Option<ExportFormat>,

    /// Players to report on (repeatable; default: every player)
    #[arg(long = "player")]
    players: Vec<String>,

    /// Shot category filter
    #[arg(long, value_enum, default_value = "all")]
    category: CategoryFilter,

    /// Rolling window for current form
    #[arg(long)]
    window: Option<usize>,

    /// Keep every n-th trajectory point
    #[arg(long)]
    stride: Option<usize>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the resolved engine configuration
    Show,

    /// Validate an engine config file
    Validate {
        /// File to validate (default: the resolved config)
        path: Option<PathBuf>,
    },
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(LogOverrides {
        verbose: cli.global.verbose,
        quiet: cli.global.quiet,
        format: cli.global.log_format,
        no_color: cli.global.no_color,
    });
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id());
    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_STARTED,
        Stage::Init,
        "run started",
        version = env!("CARGO_PKG_VERSION")
    );

    let result = match &cli.command {
        Commands::Analyze(args) => run_analyze(&cli.global, args, &ctx),
        Commands::Report(args) => run_report(&cli.global, args, &ctx),
        Commands::Config(args) => run_config(&cli.global, args, &ctx),
    };

    let exit_code = match result {
        Ok(()) => ExitCode::Clean,
        Err(err) => output_error(&cli.global, &ctx, &err),
    };

    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Init,
        "run finished",
        exit_code = exit_code.as_i32(),
        code_name = exit_code.code_name()
    );
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// analyze
// ============================================================================

fn run_analyze(global: &GlobalOpts, args: &AnalyzeArgs, ctx: &LogContext) -> Result<(), Error> {
    let LoadedConfig {
        mut config,
        snapshot,
    } = load_engine_config(global.config.as_deref(), ctx)?;
    apply_analyze_overrides(&mut config, args);
    validate_config(&config).map_err(config_error)?;

    let input_format = args
        .input_format
        .or_else(|| InputFormat::from_path(&args.input))
        .ok_or_else(|| IngestError::UnknownFormat(args.input.clone()))?;
    let input_display = args.input.display().to_string();

    log_event!(
        ctx,
        INFO,
        event_names::INGEST_STARTED,
        Stage::Ingest,
        "reading shot log",
        path = input_display.as_str(),
        format = input_format.to_string().as_str()
    );
    let ingested = ingest::load_path(&args.input, Some(input_format))?;
    log_event!(
        ctx,
        INFO,
        event_names::INGEST_FINISHED,
        Stage::Ingest,
        "shot log loaded",
        rows_read = ingested.report.rows_read,
        rows_kept = ingested.report.rows_kept,
        rows_dropped = ingested.report.rows_dropped()
    );
    for (reason, count) in &ingested.report.dropped {
        log_event!(
            ctx,
            WARN,
            event_names::INGEST_FINISHED,
            Stage::Ingest,
            "dropped malformed rows",
            reason = reason.to_string().as_str(),
            count = *count
        );
    }

    let pipeline = Pipeline::new(&config)?;
    log_event!(
        ctx,
        INFO,
        event_names::FIT_STARTED,
        Stage::Fit,
        "fitting players",
        n_states = config.estimator.n_states,
        min_sequence_len = pipeline.min_sequence_len(),
        workers = config.runtime.effective_workers(),
        policy = pipeline.policy_name()
    );
    let output = pipeline.analyze(ingested.events)?;

    log_event!(
        ctx,
        INFO,
        event_names::PREPARE_FINISHED,
        Stage::Prepare,
        "sequences prepared",
        players = output.entities.len(),
        excluded_events = output.excluded_events
    );
    for entity in output.entities.values() {
        match &entity.status {
            EntityStatus::Fitted { model, .. } => log_event!(
                ctx,
                DEBUG,
                event_names::FIT_ENTITY_DONE,
                Stage::Fit,
                "player fitted",
                player = entity.player.as_str(),
                shots = entity.shots,
                iterations = model.iterations,
                converged = model.converged,
                log_likelihood = model.log_likelihood
            ),
            EntityStatus::Skipped { min_sequence_len } => log_event!(
                ctx,
                INFO,
                event_names::PREPARE_ENTITY_SKIPPED,
                Stage::Prepare,
                "player below minimum sequence length",
                player = entity.player.as_str(),
                shots = entity.shots,
                min_sequence_len = *min_sequence_len
            ),
        }
    }
    log_event!(
        ctx,
        INFO,
        event_names::FIT_FINISHED,
        Stage::Fit,
        "fitting complete",
        fitted = output.fitted_count(),
        skipped = output.skipped_count()
    );
    log_event!(
        ctx,
        INFO,
        event_names::LABEL_FINISHED,
        Stage::Label,
        "hot zones labeled",
        hot_zone_shots = output.rows.iter().filter(|r| r.is_hot_zone).count(),
        shots = output.rows.len()
    );

    let mut output_display = None;
    if let Some(path) = &args.output {
        let format = export::resolve_format(path, args.export_format)?;
        export::write_rows(path, &output.rows, format)?;
        let shown = path.display().to_string();
        log_event!(
            ctx,
            INFO,
            event_names::EXPORT_WRITTEN,
            Stage::Export,
            "augmented dataset written",
            path = shown.as_str(),
            format = format.to_string().as_str(),
            rows = output.rows.len()
        );
        output_display = Some(shown);
    }

    let summary = RunSummary::new(
        ctx.run_id.clone(),
        RunIo {
            input: input_display,
            input_format,
            output: output_display,
        },
        ingested.report,
        snapshot,
        &output,
    );
    println!("{}", summary.render(global.format)?.trim_end());
    Ok(())
}

fn apply_analyze_overrides(config: &mut EngineConfig, args: &AnalyzeArgs) {
    if !args.players.is_empty() {
        config.preparation.players = Some(args.players.clone());
    }
    if let Some(n) = args.min_sequence_len {
        config.preparation.min_sequence_len = n;
    }
    if let Some(n) = args.states {
        config.estimator.n_states = n;
    }
    if let Some(seed) = args.seed {
        config.estimator.seed = seed;
    }
    if let Some(workers) = args.workers {
        config.runtime.workers = workers;
    }
}

// ============================================================================
// report
// ============================================================================

fn run_report(global: &GlobalOpts, args: &ReportArgs, ctx: &LogContext) -> Result<(), Error> {
    let LoadedConfig { mut config, .. } = load_engine_config(global.config.as_deref(), ctx)?;
    if let Some(window) = args.window {
        config.trajectory.rolling_window = window;
    }
    if let Some(stride) = args.stride {
        config.trajectory.stride = stride;
    }

    let format = export::resolve_format(&args.input, args.input_format)?;
    let cache: DatasetCache<Vec<AugmentedShot>> = DatasetCache::new();

    let (key, rows) = load_augmented(&cache, &args.input, format, ctx)?;
    let players: Vec<String> = if args.players.is_empty() {
        stats::players(&rows)
            .into_iter()
            .map(|p| p.as_str().to_string())
            .collect()
    } else {
        args.players.clone()
    };

    let reports = players
        .iter()
        .map(|player| stats::player_report(&rows, player, args.category, &config.trajectory))
        .collect::<Result<Vec<_>, _>>()?;

    let envelope = ReportEnvelope::new(
        ctx.run_id.clone(),
        args.input.display().to_string(),
        key.as_str(),
        reports,
    );
    println!("{}", envelope.render(global.format)?.trim_end());
    Ok(())
}

fn load_augmented(
    cache: &DatasetCache<Vec<AugmentedShot>>,
    path: &Path,
    format: ExportFormat,
    ctx: &LogContext,
) -> Result<(hh_core::cache::CacheKey, std::sync::Arc<Vec<AugmentedShot>>), Error> {
    let hits_before = cache.stats().hits;
    let (key, rows) = cache.get_or_load(path, |bytes| {
        export::read_rows(bytes, format).map_err(Error::from)
    })?;
    if cache.stats().hits > hits_before {
        log_event!(
            ctx,
            DEBUG,
            event_names::REPORT_CACHE_HIT,
            Stage::Report,
            "augmented dataset served from cache",
            key = key.short()
        );
    } else {
        log_event!(
            ctx,
            INFO,
            event_names::REPORT_CACHE_MISS,
            Stage::Report,
            "augmented dataset loaded",
            key = key.short(),
            rows = rows.len()
        );
    }
    Ok((key, rows))
}

// ============================================================================
// config
// ============================================================================

fn run_config(global: &GlobalOpts, args: &ConfigArgs, ctx: &LogContext) -> Result<(), Error> {
    match &args.command {
        ConfigCommands::Show => {
            let loaded = load_engine_config(global.config.as_deref(), ctx)?;
            let response = serde_json::json!({
                "schema_version": SUMMARY_SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "source": loaded.snapshot.source,
                "path": loaded.snapshot.path,
                "content_hash": loaded.snapshot.content_hash,
                "config": loaded.config,
            });
            match global.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Summary => println!(
                    "[{}] config: {} ({})",
                    ctx.run_id,
                    loaded.snapshot.source,
                    loaded.snapshot.short_id()
                ),
                OutputFormat::Md => {
                    println!("# Engine Configuration");
                    println!();
                    println!("Source: {}", loaded.snapshot.source);
                    if let Some(path) = &loaded.snapshot.path {
                        println!("Path: {}", path);
                    }
                    println!();
                    println!("```json");
                    println!("{}", serde_json::to_string_pretty(&loaded.config)?);
                    println!("```");
                }
            }
            Ok(())
        }
        ConfigCommands::Validate { path } => {
            let target = path.as_deref().or(global.config.as_deref());
            let loaded = load_engine_config(target, ctx)?;
            let response = serde_json::json!({
                "schema_version": SUMMARY_SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "status": "valid",
                "source": loaded.snapshot.source,
                "path": loaded.snapshot.path,
                "using_defaults": loaded.snapshot.path.is_none(),
            });
            match global.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Summary => println!("[{}] config validate: OK", ctx.run_id),
                OutputFormat::Md => {
                    println!("# Configuration Validation");
                    println!();
                    println!("Status: ✓ Valid");
                    match &loaded.snapshot.path {
                        Some(p) => println!("Engine: {}", p),
                        None => println!("Engine: using built-in defaults"),
                    }
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn load_engine_config(path: Option<&Path>, ctx: &LogContext) -> Result<LoadedConfig, Error> {
    let loaded = load_config(path).map_err(config_error)?;
    match &loaded.snapshot.path {
        Some(p) => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "engine config loaded",
            path = p.as_str(),
            source = loaded.snapshot.source.as_str(),
            snapshot = loaded.snapshot.short_id()
        ),
        None => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no engine config found; using built-in defaults"
        ),
    }
    Ok(loaded)
}

/// Bridge configuration errors into the unified error type.
fn config_error(err: ValidationError) -> Error {
    match &err {
        ValidationError::VersionMismatch { expected, actual } => Error::SchemaVersion {
            expected: expected.clone(),
            actual: actual.clone(),
        },
        ValidationError::InvalidValue { .. } => Error::InvalidConfig(err.to_string()),
        ValidationError::IoError(_) | ValidationError::ParseError(_) => {
            Error::Config(err.to_string())
        }
    }
}

/// Print an error on stderr in the requested format and pick the exit code.
fn output_error(global: &GlobalOpts, ctx: &LogContext, err: &Error) -> ExitCode {
    let exit_code = ExitCode::from(err);
    let message = err.to_string();
    if exit_code.is_internal_error() {
        log_event!(
            ctx,
            ERROR,
            event_names::INTERNAL_ERROR,
            Stage::Init,
            message.as_str(),
            code = err.code()
        );
    } else {
        log_event!(
            ctx,
            DEBUG,
            event_names::RUN_FINISHED,
            Stage::Init,
            message.as_str(),
            code = err.code()
        );
    }

    match global.format {
        OutputFormat::Json => eprintln!("{}", StructuredError::from(err).to_json()),
        OutputFormat::Md | OutputFormat::Summary => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, use_color));
        }
    }
    exit_code
}
