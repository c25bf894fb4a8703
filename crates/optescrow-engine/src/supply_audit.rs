//! Per-market conservation checks and escrow coverage.
//!
//! Invariants, per market, after every engine operation:
//! ```text
//! note_supply    == Σ(premiums deposited) − Σ(notes burned)
//! escrow_balance == Σ(premiums deposited) − Σ(payouts)
//! ```
//!
//! Any flow into or out of escrow that bypassed the engine breaks the second
//! equation and is reported as a violation.
//!
//! Coverage is a separate, read-only question: can escrow pay every
//! outstanding note in the worst case? Shortfalls are legal (payouts are
//! first come, first served); [`CoverageReport`] only makes them visible.

use std::collections::HashMap;

use optescrow_types::{MarketId, MarketRecord, OptescrowError, OptionSide, Result};
use serde::{Deserialize, Serialize};

/// Running totals for one market since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketFlows {
    pub premiums_deposited: u128,
    pub notes_burned: u128,
    pub payouts: u128,
}

impl MarketFlows {
    #[must_use]
    pub fn expected_note_supply(&self) -> u128 {
        self.premiums_deposited.saturating_sub(self.notes_burned)
    }

    #[must_use]
    pub fn expected_escrow(&self) -> u128 {
        self.premiums_deposited.saturating_sub(self.payouts)
    }
}

/// Tracks premium, burn and payout totals per market.
#[derive(Debug, Default)]
pub struct SupplyAudit {
    flows: HashMap<MarketId, MarketFlows>,
}

impl SupplyAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Premium moved into escrow; the same amount of notes was minted.
    pub fn record_deposit(&mut self, market: MarketId, premium: u64) {
        self.flows.entry(market).or_default().premiums_deposited += u128::from(premium);
    }

    pub fn record_redemption(&mut self, market: MarketId, notes_burned: u64, payout: u64) {
        let flows = self.flows.entry(market).or_default();
        flows.notes_burned += u128::from(notes_burned);
        flows.payouts += u128::from(payout);
    }

    /// Totals for a market; zero for one never seen.
    #[must_use]
    pub fn flows(&self, market: MarketId) -> MarketFlows {
        self.flows.get(&market).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn tracked_markets(&self) -> Vec<MarketId> {
        self.flows.keys().copied().collect()
    }

    /// Compare observed note supply and escrow balance with the totals.
    ///
    /// # Errors
    /// Returns [`OptescrowError::SupplyInvariantViolation`] on any mismatch.
    pub fn verify(&self, market: MarketId, note_supply: u64, escrow_balance: u64) -> Result<()> {
        let flows = self.flows(market);
        if u128::from(note_supply) != flows.expected_note_supply() {
            return Err(OptescrowError::SupplyInvariantViolation {
                reason: format!(
                    "{market}: note supply {note_supply} != expected {} \
                     (premiums={}, burned={})",
                    flows.expected_note_supply(),
                    flows.premiums_deposited,
                    flows.notes_burned,
                ),
            });
        }
        if u128::from(escrow_balance) != flows.expected_escrow() {
            return Err(OptescrowError::SupplyInvariantViolation {
                reason: format!(
                    "{market}: escrow {escrow_balance} != expected {} \
                     (premiums={}, payouts={})",
                    flows.expected_escrow(),
                    flows.premiums_deposited,
                    flows.payouts,
                ),
            });
        }
        Ok(())
    }
}

/// Worst-case liability of a market against what its escrow holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub market_id: MarketId,
    pub escrow_balance: u64,
    pub outstanding_notes: u64,
    /// Whole lots redeemable from `outstanding_notes`.
    pub outstanding_lots: u64,
    /// Largest total payout still possible. `None` for an unsettled call,
    /// whose payout has no upper bound.
    pub liability: Option<u128>,
    /// `liability − escrow_balance` when positive.
    pub shortfall: Option<u128>,
}

impl CoverageReport {
    /// Assess `market` given its current escrow balance and note supply.
    #[must_use]
    pub fn assess(
        market: &MarketRecord,
        escrow_balance: u64,
        outstanding_notes: u64,
        units_per_lot: u64,
    ) -> Self {
        let outstanding_lots = outstanding_notes.checked_div(units_per_lot).unwrap_or(0);

        // Settled: the intrinsic value is fixed. Open: a put pays at most
        // strike − 1 per lot (prices are ≥ 1); a call is unbounded.
        let per_lot = match (market.settlement().price(), market.side) {
            (Some(p), OptionSide::Call) => Some(p.get().saturating_sub(market.strike_price)),
            (Some(p), OptionSide::Put) => Some(market.strike_price.saturating_sub(p.get())),
            (None, OptionSide::Put) => Some(market.strike_price.saturating_sub(1)),
            (None, OptionSide::Call) => None,
        };
        let liability = per_lot.map(|v| u128::from(v) * u128::from(outstanding_lots));
        let shortfall = liability
            .map(|l| l.saturating_sub(u128::from(escrow_balance)))
            .filter(|s| *s > 0);

        Self {
            market_id: market.id,
            escrow_balance,
            outstanding_notes,
            outstanding_lots,
            liability,
            shortfall,
        }
    }

    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.liability
            .is_some_and(|l| l <= u128::from(self.escrow_balance))
    }
}
