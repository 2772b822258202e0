//! Histogram bucket boundaries, in seconds.

/// Pacing delays are clamped to a few seconds.
pub const PACING_DELAY: [f64; 9] = [0.3, 0.5, 0.75, 1.0, 1.5, 2.0, 2.5, 3.0, 5.0];

/// Chat completions, including slow first responses.
pub const LLM_DURATION: [f64; 10] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 30.0, 60.0, 120.0];
