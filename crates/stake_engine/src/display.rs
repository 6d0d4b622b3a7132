//! Display formatting.
//!
//! Everything here is for rendering only. Values that are validated or
//! submitted always stay in integer base units.

use crate::constants::{DISPLAY_DECIMALS, TOKEN_DECIMALS};
use crate::error::{EngineError, Result};
use crate::state::{Amount, RateSchedule, UnixTimestamp};

const ONE_TOKEN: Amount = 10u128.pow(TOKEN_DECIMALS);

/// Render base units as a token amount truncated to six decimals.
///
/// `410958904109589041` renders as `"0.410958"`.
pub fn format_units(amount: Amount) -> String {
    let whole = amount / ONE_TOKEN;
    let shown = (amount % ONE_TOKEN) / 10u128.pow(TOKEN_DECIMALS - DISPLAY_DECIMALS);
    format!("{}.{:0width$}", whole, shown, width = DISPLAY_DECIMALS as usize)
}

/// Parse a decimal token amount such as `"1000"` or `"12.5"` into base units.
///
/// # Errors
///
/// `InvalidAmount` when the text is not a plain non-negative decimal, has
/// more than 18 fractional digits, or does not fit in base units.
pub fn parse_units(text: &str) -> Result<Amount> {
    let invalid = || EngineError::InvalidAmount(text.to_string());
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
        || fraction.len() > TOKEN_DECIMALS as usize
    {
        return Err(invalid());
    }

    let whole: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction: Amount = if fraction.is_empty() {
        0
    } else {
        let scale = 10u128.pow(TOKEN_DECIMALS - fraction.len() as u32);
        fraction.parse::<Amount>().map_err(|_| invalid())? * scale
    };

    whole
        .checked_mul(ONE_TOKEN)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)
}

/// Render the APR in effect at `now` as a percentage with two decimals.
pub fn format_apr(schedule: &RateSchedule, now: UnixTimestamp) -> String {
    let (numerator, denominator) = schedule.apr_bps_at(now);
    // basis points to hundredths of a percent are the same unit
    let hundredths = numerator / denominator.max(1);
    format!("{}.{:02}%", hundredths / 100, hundredths % 100)
}
