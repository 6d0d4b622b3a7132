use crate::constants::SECONDS_PER_YEAR;

use super::UnixTimestamp;

/// Annual percentage rate schedule, in basis points (10000 = 100%).
///
/// The schedule is ledger configuration; it is read at runtime and never
/// compiled in. Rates are unsigned, so a schedule can never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSchedule {
    /// Constant APR.
    Fixed { apr_bps: u64 },
    /// APR growing linearly from `epoch`:
    /// `base_apr_bps + growth_bps_per_year * max(t - epoch, 0) / SECONDS_PER_YEAR`.
    ///
    /// The growth term is kept as an exact rational; it is never rounded per
    /// second.
    Linear {
        epoch: UnixTimestamp,
        base_apr_bps: u64,
        growth_bps_per_year: u64,
    },
}

impl RateSchedule {
    /// APR at second `t` as the exact fraction `(numerator, denominator)` bps.
    pub fn apr_bps_at(&self, t: UnixTimestamp) -> (u128, u128) {
        let year = SECONDS_PER_YEAR as u128;
        match *self {
            RateSchedule::Fixed { apr_bps } => (apr_bps as u128, 1),
            RateSchedule::Linear {
                epoch,
                base_apr_bps,
                growth_bps_per_year,
            } => {
                let since_epoch = t.saturating_sub(epoch).max(0) as u128;
                let numerator = (base_apr_bps as u128)
                    .saturating_mul(year)
                    .saturating_add((growth_bps_per_year as u128).saturating_mul(since_epoch));
                (numerator, year)
            }
        }
    }
}
