//! Tuning constants for the annealer.
//!
//! The thermal values were measured empirically: CRITICAL_TEMP is the
//! temperature around which the acceptance landscape of this objective
//! changes character, and the cooling schedule slows down while passing
//! through that window (see `solver`).

/// Solver version tag written into every persisted best board.
pub const SOLVER_VERSION: &str = "1.4";

/// Temperature of the critical window center.
pub const CRITICAL_TEMP: f64 = 39.23;

/// Hard floor for the Metropolis temperature.
pub const MIN_TEMP: f64 = 0.001 * CRITICAL_TEMP;

/// Geometric cooling rate per iteration.
pub const COOLING_RATE: f64 = 0.9999994;

/// Iterations without improvement before a lineage is abandoned.
pub const RESEED_STAGNATION_THRESHOLD: u64 = 4_000_000;

/// Iterations without improvement that end a single cooling cycle.
pub const CYCLE_STAGNATION_LIMIT: u64 = 10_000_000;

/// Seconds between periodic best-board persistence opportunities.
pub const DB_SAVE_INTERVAL_SEC: u64 = 100;

/// Nominal elite pool size; the startup load requests `12 *` this many
/// boards against the store's top-100 window.
pub const ELITE_POOL_SIZE: usize = 10;

/// Probability that a reseed in modes 1/2 draws from the elite pool.
pub const POOL_RESEED_PROB: f64 = 1.0;

/// Exclusive upper bound of the basis construction range.
pub const BASIS_MAX_RANGE: usize = 13_000;

/// Zero-pad basis members to a fixed width (disabled; members keep their
/// natural decimal length, which is what makes lengths 3..=5 meaningful).
pub const BASIS_USE_PADDING: bool = false;

/// Iterations per telemetry window.
pub const PHYSICS_WINDOW: u64 = 3_000;

/// Iterations per ALNS weight-adaptation segment.
pub const ALNS_SEGMENT: u64 = 100;

/// Minutes between flushes of the buffered telemetry records.
pub const PHYSICS_FLUSH_MIN: i64 = 15;

/// Monitor capacity; threads beyond this many skip monitor writes.
pub const MONITOR_SLOTS: usize = 32;

/// Operator slots reserved in the monitor and log schema. The engine
/// currently uses 15; the tail stays zeroed.
pub const OPERATOR_SLOTS: usize = 24;

/// Default SA weight for basis members containing a twin.
pub const W_TWIN: f64 = 0.75;

/// Default SA weight for basis members containing a double twin.
pub const W_DOUBLE_TWIN: f64 = 0.25;
