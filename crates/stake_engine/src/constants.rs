//! Engine constants.
//!
//! Time units, basis-point precision and the defaults used when no
//! configuration overrides them. Values that the ledger owns (caps, rates)
//! are deliberately absent: they are read from the ledger at runtime.

/// Seed for deriving per-stake record addresses on the ledger program
pub const STAKE_RECORD_SEED: &[u8] = b"stake_record";

/// Number of seconds in a day
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Number of seconds in a year (365 days)
pub const SECONDS_PER_YEAR: u64 = 365 * 86_400;

/// Basis points denominator (100% = 10000 basis points)
pub const BASIS_POINTS_DENOMINATOR: u64 = 10_000;

/// Decimals of the staked token; principal and yield are in base units
pub const TOKEN_DECIMALS: u32 = 18;

/// Decimals shown by the display formatter
pub const DISPLAY_DECIMALS: u32 = 6;

/// Staking periods (in days) accepted by the ledger
pub const DEFAULT_ALLOWED_STAKING_PERIODS_DAYS: [u32; 3] = [30, 60, 90];

/// How long a registry entry is served without an upstream read (5 minutes)
pub const DEFAULT_STALENESS_WINDOW_SECS: u64 = 5 * 60;

/// Interval of the display yield recomputation
pub const DEFAULT_REFRESH_INTERVAL_MILLIS: u64 = 1_000;

/// Attempts made by the default caller-invoked retry policy
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Pause between retry attempts
pub const DEFAULT_RETRY_BACKOFF_MILLIS: u64 = 2_000;

/// Ledger custom error codes start here (Anchor's custom error offset)
pub const LEDGER_ERROR_CODE_OFFSET: u32 = 6_000;
