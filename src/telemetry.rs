//! Telemetry metric name constants.
//!
//! Centralised metric names for mcqforge operations. The binary does not
//! install a recorder; embedders may install their own `metrics` recorder
//! (e.g. prometheus, statsd). Without one, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mcqforge_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `model` - generation model name (e.g. "llama3:8b")
//! - `operation` - "generate" or "refine"
//! - `status` - request outcome "ok" | "error", or unit outcome status

/// Total generation requests sent to the endpoint (one per attempt).
///
/// Labels: `model`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "mcqforge_requests_total";

/// Generation request duration in seconds.
///
/// Labels: `model`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "mcqforge_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `model`, `operation`.
pub const RETRIES_TOTAL: &str = "mcqforge_retries_total";

/// Total cache hits.
pub const CACHE_HITS_TOTAL: &str = "mcqforge_cache_hits_total";

/// Total cache misses (including corrupt entries treated as misses).
pub const CACHE_MISSES_TOTAL: &str = "mcqforge_cache_misses_total";

/// Total cache entries written.
pub const CACHE_WRITES_TOTAL: &str = "mcqforge_cache_writes_total";

/// Total units finished.
///
/// Labels: `status` ("cache_hit" | "generated" | "self_corrected" | "failed").
pub const UNITS_TOTAL: &str = "mcqforge_units_total";

/// Current throttle delay multiplier (1.0 = baseline).
pub const THROTTLE_MULTIPLIER: &str = "mcqforge_throttle_multiplier";
