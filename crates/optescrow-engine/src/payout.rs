//! Settlement arithmetic: premiums in, lots out, profit per side.
//!
//! ```text
//! premium  = lots × premium_per_lot
//! lots     = notes / units_per_lot            (notes must divide exactly)
//! CALL pnl = max(expiry − strike, 0) × lots
//! PUT  pnl = max(strike − expiry, 0) × lots
//! ```
//!
//! All arithmetic is checked `u64`; overflow is an error, never a wrap.

use optescrow_types::{Moneyness, OptescrowError, OptionSide, Result};

/// Collateral owed for a purchase of `lots`.
///
/// # Errors
/// `InvalidLotCount` for zero lots, `ArithmeticOverflow` if the product
/// does not fit in a `u64`.
pub fn premium_total(lots: u64, premium_per_lot: u64) -> Result<u64> {
    if lots == 0 {
        return Err(OptescrowError::InvalidLotCount);
    }
    lots.checked_mul(premium_per_lot)
        .ok_or(OptescrowError::ArithmeticOverflow)
}

/// Whole lots represented by a note balance. An empty balance is zero lots.
///
/// # Errors
/// `InvalidNoteAmount` if `notes` is not a multiple of `units_per_lot`.
pub fn lots_from_notes(notes: u64, units_per_lot: u64) -> Result<u64> {
    if units_per_lot == 0 || notes % units_per_lot != 0 {
        return Err(OptescrowError::InvalidNoteAmount {
            amount: notes,
            granularity: units_per_lot,
        });
    }
    Ok(notes / units_per_lot)
}

/// Where `expiry` lands against `strike` for a holder of `side`.
#[must_use]
pub fn moneyness(side: OptionSide, strike: u64, expiry: u64) -> Moneyness {
    use std::cmp::Ordering;

    let favourable = match side {
        OptionSide::Call => expiry.cmp(&strike),
        OptionSide::Put => strike.cmp(&expiry),
    };
    match favourable {
        Ordering::Greater => Moneyness::InTheMoney,
        Ordering::Equal => Moneyness::AtTheMoney,
        Ordering::Less => Moneyness::OutOfTheMoney,
    }
}

/// Profit owed on `lots` at settlement. Zero unless in the money.
///
/// # Errors
/// `ArithmeticOverflow` if the intrinsic value times `lots` overflows.
pub fn profit(side: OptionSide, strike: u64, expiry: u64, lots: u64) -> Result<u64> {
    let intrinsic = match side {
        OptionSide::Call => expiry.saturating_sub(strike),
        OptionSide::Put => strike.saturating_sub(expiry),
    };
    intrinsic
        .checked_mul(lots)
        .ok_or(OptescrowError::ArithmeticOverflow)
}
