//! System limits and capacity configuration

/// Concurrency.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// Cancellation grace before a job task is aborted.
pub const DEFAULT_CANCEL_GRACE_MS: u64 = 250;

/// Output delivered per `output`/`error` event.
pub const MAX_EVENT_TEXT_BYTES: usize = 64 * 1024; // 64 KiB

/// Snippet extraction.
pub const DEFAULT_SNIPPET_MAX_LINES: usize = 200;

/// Unit conversions used by the format adapters.
pub const BOHR_TO_ANGSTROM: f64 = 0.529177;
pub const HARTREE_TO_KJ_PER_MOL: f64 = 2625.5;

/// Cube isosurface range.
pub const CUBE_RANGE_FLOOR: f64 = 0.00001;
pub const CUBE_RANGE_NEG_FLOOR: f64 = -1.0;
pub const CUBE_RANGE_CEIL: f64 = 1.0;
pub const CUBE_RANGE_FALLBACK_MAX: f64 = 0.5;
pub const CUBE_RANGE_PAD_FRACTION: f64 = 0.1;
