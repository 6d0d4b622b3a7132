//! Wide integer helpers for exact accrual arithmetic.

#![allow(clippy::assign_op_pattern)]
#![allow(clippy::ptr_offset_with_cast)]
#![allow(clippy::manual_range_contains)]

use crate::error::{EngineError, Result};

pub use wide::U256;

// `construct_uint!` expands against `core::result::Result`, not the crate alias
mod wide {
    use uint::construct_uint;

    construct_uint! {
        /// 256-bit unsigned integer.
        pub struct U256(4);
    }
}

/// `floor(a * b / denominator)` with a 256-bit intermediate product.
pub fn mul_div_floor(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(EngineError::MathOverflow);
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(denominator);
    if quotient.bits() > 128 {
        return Err(EngineError::MathOverflow);
    }
    Ok(quotient.low_u128())
}
