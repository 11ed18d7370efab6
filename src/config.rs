//! Configuration loading for mcqforge.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag; must exist)
//! 2. `~/.mcqforge/config.toml` (user; optional)
//! 3. Built-in defaults
//!
//! Every field has a default, so a partial file only overrides what it
//! names. [`Config::validate()`] runs before any unit is processed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::output::ensure_writable_dir;
use crate::pipeline::PipelineConfig;
use crate::providers::{RetryConfig, SamplingOptions};
use crate::throttle::ThrottleConfig;
use crate::types::{BloomLevel, Difficulty, GenerationParams, Preset};
use crate::{ForgeError, Result};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub throttle: ThrottleSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Generation endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaSection {
    /// Ollama base URL (default: http://localhost:11434).
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model name (default: llama3:8b).
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    /// Per-request timeout in seconds (default: 120).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_model(),
            temperature: 0.0,
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            context_window: default_context_window(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    crate::providers::ollama::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    "llama3:8b".to_string()
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_context_window() -> u32 {
    8192
}

fn default_request_timeout() -> u64 {
    120
}

/// Pipeline and prompt settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSection {
    /// Concurrent workers, 1-16 (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_questions")]
    pub questions_per_unit: usize,
    #[serde(default = "default_max_excerpt")]
    pub max_excerpt_chars: usize,
    #[serde(default = "default_min_excerpt")]
    pub min_excerpt_chars: usize,
    /// Refine attempts after a rejected generation, 0-3 (default: 1).
    #[serde(default = "default_refine_attempts")]
    pub refine_attempts: u32,
    #[serde(default)]
    pub preset: Preset,
    /// Overrides the preset's Bloom level.
    #[serde(default)]
    pub bloom: Option<BloomLevel>,
    /// Overrides the preset's difficulty.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Linked concepts processed per week, 0 = all (default: 0).
    #[serde(default)]
    pub concept_limit: usize,
    /// First week processed when no weeks are given (default: 1).
    #[serde(default = "default_start_week")]
    pub start_week: u32,
    /// Last week processed when no weeks are given (default: 52).
    #[serde(default = "default_end_week")]
    pub end_week: u32,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            questions_per_unit: default_questions(),
            max_excerpt_chars: default_max_excerpt(),
            min_excerpt_chars: default_min_excerpt(),
            refine_attempts: default_refine_attempts(),
            preset: Preset::default(),
            bloom: None,
            difficulty: None,
            concept_limit: 0,
            start_week: default_start_week(),
            end_week: default_end_week(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_questions() -> usize {
    2
}

fn default_max_excerpt() -> usize {
    6000
}

fn default_min_excerpt() -> usize {
    20
}

fn default_refine_attempts() -> u32 {
    1
}

fn default_start_week() -> u32 {
    1
}

fn default_end_week() -> u32 {
    52
}

/// Retry settings for transient endpoint failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_jitter() -> u64 {
    200
}

/// Load controller thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleSection {
    #[serde(default = "default_latency_target")]
    pub latency_target_ms: u64,
    #[serde(default = "default_error_threshold")]
    pub error_threshold: usize,
    #[serde(default = "default_error_window")]
    pub error_window_secs: u64,
    #[serde(default = "default_gpu_high")]
    pub gpu_high: u8,
    #[serde(default = "default_gpu_low")]
    pub gpu_low: u8,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,
    #[serde(default = "default_step_up")]
    pub step_up: f64,
    #[serde(default = "default_decay")]
    pub decay: f64,
    #[serde(default = "default_cool_decay")]
    pub cool_decay: f64,
    /// Seconds between GPU probes (default: 5).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_ms: u64,
}

impl Default for ThrottleSection {
    fn default() -> Self {
        Self {
            latency_target_ms: default_latency_target(),
            error_threshold: default_error_threshold(),
            error_window_secs: default_error_window(),
            gpu_high: default_gpu_high(),
            gpu_low: default_gpu_low(),
            window_size: default_window_size(),
            max_multiplier: default_max_multiplier(),
            step_up: default_step_up(),
            decay: default_decay(),
            cool_decay: default_cool_decay(),
            probe_interval_secs: default_probe_interval(),
            probe_timeout_ms: default_probe_timeout(),
            pacing_delay_ms: default_pacing_delay(),
        }
    }
}

fn default_latency_target() -> u64 {
    1500
}

fn default_error_threshold() -> usize {
    5
}

fn default_error_window() -> u64 {
    60
}

fn default_gpu_high() -> u8 {
    80
}

fn default_gpu_low() -> u8 {
    35
}

fn default_window_size() -> usize {
    50
}

/// Upper bound for `throttle.max_multiplier`.
const MAX_THROTTLE_MULTIPLIER: f64 = 1000.0;

fn default_max_multiplier() -> f64 {
    8.0
}

fn default_step_up() -> f64 {
    1.5
}

fn default_decay() -> f64 {
    0.85
}

fn default_cool_decay() -> f64 {
    0.7
}

fn default_probe_interval() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_pacing_delay() -> u64 {
    250
}

/// Filesystem locations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    /// Directory containing one folder per subject (optionally grouped by semester).
    #[serde(default)]
    pub vault_root: Option<PathBuf>,
    /// Cache directory (default: platform cache dir + `/mcqforge`).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Flat directory of concept notes.
    #[serde(default)]
    pub concept_dir: Option<PathBuf>,
    /// Output directory (default: `<vault_root>/Flashcards`).
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Failure logs for units that could not be generated (disabled when unset).
    #[serde(default)]
    pub error_dir: Option<PathBuf>,
}

/// In-process cache layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Hot entries kept in memory, 0 disables (default: 1000).
    #[serde(default = "default_memory_entries")]
    pub memory_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            memory_entries: default_memory_entries(),
        }
    }
}

fn default_memory_entries() -> u64 {
    1000
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; missing is an error)
    /// 2. `~/.mcqforge/config.toml`
    /// 3. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse one TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ForgeError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ForgeError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ForgeError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Ok(dirs::home_dir()
            .map(|home| home.join(".mcqforge").join("config.toml"))
            .filter(|p| p.exists()))
    }

    /// Check every range and threshold. Returns the first violation.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ForgeError::Configuration(msg));
        let g = &self.generation;
        let t = &self.throttle;

        if self.ollama.model.trim().is_empty() {
            return fail("ollama.model must not be empty".into());
        }
        if self.ollama.request_timeout_secs == 0 {
            return fail("ollama.request_timeout_secs must be at least 1".into());
        }
        if !(1..=16).contains(&g.workers) {
            return fail(format!("generation.workers must be 1-16, got {}", g.workers));
        }
        if g.refine_attempts > 3 {
            return fail(format!(
                "generation.refine_attempts must be 0-3, got {}",
                g.refine_attempts
            ));
        }
        if g.questions_per_unit == 0 {
            return fail("generation.questions_per_unit must be at least 1".into());
        }
        if g.max_excerpt_chars < g.min_excerpt_chars {
            return fail(format!(
                "generation.max_excerpt_chars ({}) is below min_excerpt_chars ({})",
                g.max_excerpt_chars, g.min_excerpt_chars
            ));
        }
        for week in [g.start_week, g.end_week] {
            if !crate::notes::WEEK_RANGE.contains(&week) {
                return fail(format!("weeks must be 1-52, got {week}"));
            }
        }
        if g.start_week > g.end_week {
            return fail(format!(
                "generation.start_week ({}) is after end_week ({})",
                g.start_week, g.end_week
            ));
        }
        if self.retry.max_attempts == 0 {
            return fail("retry.max_attempts must be at least 1".into());
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return fail("retry.initial_delay_ms exceeds retry.max_delay_ms".into());
        }
        if t.gpu_low >= t.gpu_high || t.gpu_high > 100 {
            return fail(format!(
                "throttle.gpu_low ({}) must be below gpu_high ({}) and gpu_high at most 100",
                t.gpu_low, t.gpu_high
            ));
        }
        if !(1.0..=MAX_THROTTLE_MULTIPLIER).contains(&t.max_multiplier) {
            return fail(format!(
                "throttle.max_multiplier must be 1-{MAX_THROTTLE_MULTIPLIER}, got {}",
                t.max_multiplier
            ));
        }
        if t.step_up <= 1.0 || !t.step_up.is_finite() {
            return fail("throttle.step_up must be greater than 1.0".into());
        }
        for (name, value) in [("decay", t.decay), ("cool_decay", t.cool_decay)] {
            if !(value > 0.0 && value < 1.0) {
                return fail(format!("throttle.{name} must be in (0, 1), got {value}"));
            }
        }
        if t.window_size == 0 {
            return fail("throttle.window_size must be at least 1".into());
        }
        if t.probe_interval_secs == 0 {
            return fail("throttle.probe_interval_secs must be at least 1".into());
        }
        Ok(())
    }

    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            temperature: self.ollama.temperature,
            top_p: self.ollama.top_p,
            max_tokens: self.ollama.max_tokens,
            context_window: self.ollama.context_window,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry.max_attempts)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .jitter(Duration::from_millis(self.retry.jitter_ms))
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        let t = &self.throttle;
        ThrottleConfig {
            latency_target: Duration::from_millis(t.latency_target_ms),
            error_threshold: t.error_threshold,
            error_window: Duration::from_secs(t.error_window_secs),
            gpu_high: t.gpu_high,
            gpu_low: t.gpu_low,
            window_size: t.window_size,
            max_multiplier: t.max_multiplier,
            step_up: t.step_up,
            decay: t.decay,
            cool_decay: t.cool_decay,
            pacing_delay: Duration::from_millis(t.pacing_delay_ms),
        }
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.throttle.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.throttle.probe_timeout_ms)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let g = &self.generation;
        PipelineConfig {
            workers: g.workers,
            questions_per_unit: g.questions_per_unit,
            max_excerpt_chars: g.max_excerpt_chars,
            min_excerpt_chars: g.min_excerpt_chars,
            refine_attempts: g.refine_attempts,
            error_dir: self.paths.error_dir.clone(),
        }
    }

    /// Resolve generation parameters for `subject`.
    pub fn params_for(&self, subject: &str) -> GenerationParams {
        GenerationParams::resolve(
            self.ollama.model.clone(),
            subject,
            self.generation.preset,
            self.generation.bloom,
            self.generation.difficulty,
        )
    }

    /// Cache directory, falling back to the platform cache dir.
    pub fn cache_dir(&self) -> PathBuf {
        self.paths.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mcqforge")
        })
    }

    /// Check the configured directories before any work starts.
    ///
    /// Output and failure-log directories are created if missing and must
    /// accept new files. A configured concept directory must be readable.
    pub fn check_paths(&self) -> Result<()> {
        if let Some(dir) = self.output_dir() {
            ensure_writable_dir(&dir)?;
        }
        if let Some(dir) = self.paths.error_dir.as_deref() {
            ensure_writable_dir(dir)?;
        }
        if let Some(dir) = self.paths.concept_dir.as_deref() {
            fs::read_dir(dir).map_err(|e| {
                ForgeError::Configuration(format!(
                    "paths.concept_dir {dir:?} is not a readable directory: {e}"
                ))
            })?;
        }
        Ok(())
    }

    /// Output directory, defaulting to `<vault_root>/Flashcards`.
    pub fn output_dir(&self) -> Option<PathBuf> {
        self.paths.output_dir.clone().or_else(|| {
            self.paths
                .vault_root
                .as_ref()
                .map(|root| root.join("Flashcards"))
        })
    }
}
