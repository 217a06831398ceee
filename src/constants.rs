pub const TICK_RATE_MS: u64 = 1000;
pub const DEFAULT_WINDOW: usize = 500;
pub const MAX_WINDOW: usize = 100_000;
pub const PROBE_TIMEOUT_MS: u64 = 5000;
// How often a running probe is checked for exit
pub const PROBE_WAIT_STEP_MS: u64 = 10;
pub const DEFAULT_PING_PROGRAM: &str = "ping";

// Auto y-axis: headroom above the window max, and the smallest ceiling shown
pub const AUTO_SCALE_HEADROOM: f64 = 1.2;
pub const AUTO_SCALE_FLOOR_MS: f64 = 10.0;

// UI redraw cadence while waiting for input
pub const UI_FRAME_MS: u64 = 100;
