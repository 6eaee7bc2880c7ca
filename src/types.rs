/// Engine sample rate (Hz). The transport requests this from the device
/// and warns on mismatch; there is no sample-rate conversion.
pub const SAMPLE_RATE: u32 = 44_100;

/// Number of recordable tracks.
pub const NUM_TRACKS: usize = 16;

/// Number of track groups.
pub const NUM_GROUPS: usize = 4;

/// Default per-track loop capacity in seconds.
pub const DEFAULT_LOOP_SECONDS: usize = 60;

/// Default per-track capacity in samples (60 s at 44.1 kHz).
#[allow(dead_code)]
pub const SAMPLE_LIMIT: usize = SAMPLE_RATE as usize * DEFAULT_LOOP_SECONDS;

/// Largest sample magnitude the limiter lets through unscaled.
pub const MAX_SAMPLE_VALUE: f32 = 0.9 * f32::MAX;

/// Scale applied when a summed sample exceeds `MAX_SAMPLE_VALUE`.
pub const LIMIT_SCALE: f32 = 0.9;

/// Upper bound on frames the engine handles in one cycle. The transport
/// splits larger device buffers into chunks of at most this size.
pub const MAX_BLOCK_FRAMES: usize = 4096;

/// Track reserved as the destination of diagnostic latency captures.
pub const CALIBRATION_TRACK: usize = NUM_TRACKS - 1;
