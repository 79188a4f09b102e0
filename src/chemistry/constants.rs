// Mass added to a suffix ("Y") fragment relative to the residues it spans.
// Historical value kept as-is so reports stay comparable with earlier runs.
pub const WATER_ADDUCT: f64 = 18.01528;

// Absorbs floating-point jitter when a value sits on a histogram bucket boundary.
pub const BUCKET_EPSILON: f64 = 1e-9;

pub const DEFAULT_MAX_E_VALUE: f64 = 1e-10;
pub const DEFAULT_ACCURACY: f64 = 1e-5;
/// Upper bound on the buckets of one densified histogram.
pub const MAX_HISTOGRAM_BUCKETS: i64 = 1_000_000;
pub const DEFAULT_HISTOGRAM_STEP: f64 = 0.01;

pub mod delimiter {
    pub const RUN_OPEN: char = '(';
    pub const RUN_CLOSE: char = ')';
    pub const SHIFT_OPEN: char = '[';
    pub const SHIFT_CLOSE: char = ']';
}
