//! mcqforge - generate MCQ flashcards for one subject.
//!
//! Discovers the subject's lecture notes by week, runs every lecture and
//! linked concept through the generation pipeline, and writes one
//! flashcard document per week.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mcqforge::notes::{build_units, discover_week_files, parse_weeks};
use mcqforge::output::{output_file_name, render_document, write_document};
use mcqforge::throttle::{NvidiaSmiProbe, spawn_sampler};
use mcqforge::{
    BloomLevel, CacheStore, Config, Difficulty, ForgeError, GenerationClient, LoadController,
    OllamaClient, Pipeline, Preset, RunReport,
};

/// MCQ flashcard generator
#[derive(Parser)]
#[command(name = "mcqforge")]
#[command(version)]
#[command(about = "Generate multiple-choice flashcards from lecture notes")]
struct Args {
    /// Subject code, e.g. ECON1101
    #[arg(required_unless_present = "clear_only")]
    subject: Option<String>,

    /// Weeks to process: "3", "1-4,7" or "ALL" (default: configured range)
    weeks: Option<String>,

    /// Path to configuration file.
    #[arg(short, long, env = "MCQFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Vault root (overrides paths.vault_root)
    #[arg(long)]
    vault: Option<PathBuf>,

    /// Semester folder between vault root and subject
    #[arg(short, long)]
    semester: Option<String>,

    /// Generation preset: exam, review, deep or mixed
    #[arg(short, long)]
    preset: Option<Preset>,

    /// Bloom level override
    #[arg(short, long)]
    bloom: Option<BloomLevel>,

    /// Difficulty override
    #[arg(short, long)]
    difficulty: Option<Difficulty>,

    /// Model name (overrides ollama.model)
    #[arg(short, long)]
    model: Option<String>,

    /// Concurrent workers (1-16)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Linked concepts processed per week (0 = all)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Write `_dev` output files
    #[arg(long)]
    dev: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Clear cached generations for a subject, or ALL
    #[arg(long, num_args = 0..=1, default_missing_value = "ALL", value_name = "SUBJECT|ALL")]
    clear_cache: Option<String>,

    /// Exit after clearing the cache
    #[arg(long, requires = "clear_cache")]
    clear_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Load configuration and apply command-line overrides
    let mut config = Config::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let cache = Arc::new(CacheStore::with_memory(
        config.cache_dir(),
        config.cache.memory_entries,
    )?);

    if let Some(target) = args.clear_cache.as_deref() {
        let removed = if target.eq_ignore_ascii_case("all") {
            cache.clear()?
        } else {
            cache.invalidate_subject(target)?
        };
        info!(scope = target, removed, dir = %cache.dir().display(), "cache cleared");
        if args.clear_only {
            return Ok(());
        }
    }

    let Some(subject) = args.subject.as_deref() else {
        return Ok(());
    };
    let vault_root = config
        .paths
        .vault_root
        .clone()
        .ok_or_else(|| ForgeError::Configuration("paths.vault_root is not set".into()))?;
    let output_dir = config
        .output_dir()
        .ok_or_else(|| ForgeError::Configuration("no output directory configured".into()))?;
    config.check_paths()?;

    let subject_dir = match args.semester.as_deref() {
        Some(semester) => vault_root.join(semester).join(subject),
        None => vault_root.join(subject),
    };

    let weeks = match args.weeks.as_deref() {
        Some(selection) => parse_weeks(selection)?,
        None => Some((config.generation.start_week..=config.generation.end_week).collect()),
    };
    let week_files = discover_week_files(&subject_dir, weeks.as_deref())?;
    if week_files.is_empty() {
        warn!(dir = %subject_dir.display(), "no lecture notes found for the requested weeks");
        return Ok(());
    }

    // Fail fast when the endpoint is down
    let provider = OllamaClient::with_base_url(
        &config.ollama.base_url,
        config.sampling_options(),
        config.request_timeout(),
    )?;
    provider.check_connection().await?;

    let throttle = Arc::new(LoadController::new(config.throttle_config()));
    let client = GenerationClient::new(
        Arc::new(provider),
        config.retry_config(),
        Arc::clone(&throttle),
    );
    let params = Arc::new(config.params_for(subject));
    let pipeline = Pipeline::new(
        client,
        cache,
        Arc::clone(&params),
        config.pipeline_config(),
    );
    info!(
        subject = %params.subject,
        model = %params.model,
        bloom = params.bloom_label(),
        difficulty = params.difficulty_label(),
        weeks = week_files.len(),
        "mcqforge starting"
    );

    let cancel = CancellationToken::new();
    let sampler_cancel = CancellationToken::new();
    let sampler = spawn_sampler(
        Arc::clone(&throttle),
        Arc::new(NvidiaSmiProbe::new(config.probe_timeout())),
        config.probe_interval(),
        sampler_cancel.clone(),
    );
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing units in flight");
                cancel.cancel();
            }
        })
    };

    let mut result = Ok(());
    for (week, files) in &week_files {
        if cancel.is_cancelled() {
            break;
        }
        let units = build_units(
            files,
            config.paths.concept_dir.as_deref(),
            config.generation.concept_limit,
        );
        let report = pipeline.run(units, cancel.clone()).await;

        if report.sections().next().is_some() {
            let document = render_document(&params.subject, *week, report.sections());
            let path = output_dir.join(output_file_name(&params.subject, *week, &params, args.dev));
            if let Err(e) = write_document(&path, &document) {
                result = Err(e);
                break;
            }
            info!(week, path = %path.display(), "flashcards written");
        } else {
            warn!(week, "no accepted units, nothing written");
        }
        print_summary(*week, &report);
    }

    sampler_cancel.cancel();
    interrupt.abort();
    if let Err(e) = sampler.await {
        debug!(error = %e, "utilization sampler did not shut down cleanly");
    }

    result.map_err(Into::into)
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(ref vault) = args.vault {
        config.paths.vault_root = Some(vault.clone());
    }
    if let Some(ref model) = args.model {
        config.ollama.model = model.clone();
    }
    if let Some(preset) = args.preset {
        config.generation.preset = preset;
    }
    if args.bloom.is_some() {
        config.generation.bloom = args.bloom;
    }
    if args.difficulty.is_some() {
        config.generation.difficulty = args.difficulty;
    }
    if let Some(workers) = args.workers {
        config.generation.workers = workers;
    }
    if let Some(limit) = args.limit {
        config.generation.concept_limit = limit;
    }
}

fn print_summary(week: u32, report: &RunReport) {
    let stats = &report.stats;
    println!("Week {week}:");
    println!(
        "  {} units: {} cached, {} generated, {} self-corrected, {} failed",
        stats.total, stats.cache_hits, stats.generated, stats.self_corrected, stats.failed
    );
    if stats.skipped > 0 || stats.cancelled > 0 {
        println!("  skipped: {}, cancelled: {}", stats.skipped, stats.cancelled);
    }
    println!(
        "  refines: {} attempted, {} succeeded; {} generation calls",
        stats.refine_attempts, stats.refine_successes, stats.attempts
    );
    println!(
        "  elapsed: {:.1}s ({:.1} questions/min)",
        stats.elapsed.as_secs_f64(),
        stats.questions_per_minute()
    );
    for unit in report.failed_units() {
        println!("  failed: {unit}");
    }
}
