//! System-wide constants for the optescrow engine.

/// Decimals of every option-note asset.
pub const NOTE_DECIMALS: u8 = 9;

/// Note minor units making up one lot at the default granularity.
pub const NOTE_UNITS_PER_LOT: u64 = 1_000_000_000;

/// Largest `note_decimals` whose power of ten still fits in a `u64`.
pub const MAX_NOTE_DECIMALS: u8 = 19;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "optescrow";
