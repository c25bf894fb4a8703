//! # Market Record: terms and settlement state of one option market
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  record_expiry_price(p > 0)  ┌─────────────┐
//!   │ OPEN ├─────────────────────────────▶│ SETTLED(p)  │
//!   └──────┘                              └──────┬──────┘
//!                                                │ record_expiry_price(_)
//!                                                ▼
//!                                           no-op, p kept
//! ```
//!
//! The settled price is a `NonZeroU64`: a zero expiry price cannot be
//! represented, so "unsettled" never hides behind a sentinel value.

use std::{fmt, num::NonZeroU64};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AccountId, AssetId, MarketId, MarketKey, OptescrowError, Result, SettlementOutcome,
};

/// Which way the option pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    /// Profits when the expiry price ends above the strike.
    Call,
    /// Profits when the expiry price ends below the strike.
    Put,
}

impl OptionSide {
    #[must_use]
    pub fn from_is_put(is_put: bool) -> Self {
        if is_put { Self::Put } else { Self::Call }
    }

    #[must_use]
    pub fn is_put(self) -> bool {
        matches!(self, Self::Put)
    }
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Settlement latch of a market. Transitions are one-way: `Open → Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementState {
    /// No expiry price yet. Redemption is refused.
    Open,
    /// Expiry price recorded. **Immutable.**
    Settled(NonZeroU64),
}

impl SettlementState {
    #[must_use]
    pub fn price(&self) -> Option<NonZeroU64> {
        match self {
            Self::Open => None,
            Self::Settled(p) => Some(*p),
        }
    }
}

impl fmt::Display for SettlementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Settled(p) => write!(f, "SETTLED({p})"),
        }
    }
}

/// Creation inputs for a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketTerms {
    /// Underlying asset, e.g. SOL.
    pub base: AssetId,
    /// Asset premiums and payouts are denominated in, e.g. USDC.
    pub collateral: AssetId,
    /// Price the expiry price is compared against, in collateral minor units.
    pub strike_price: u64,
    /// Unix seconds. Purchases close here when the deadline gate is on.
    pub expiry_timestamp: i64,
    /// Call or put.
    pub side: OptionSide,
    /// Informational; does not drive note granularity.
    pub lot_size: u64,
    /// Collateral charged per lot, minted one-for-one as note units.
    pub premium_per_lot: u64,
}

impl MarketTerms {
    #[must_use]
    pub fn key(&self) -> MarketKey {
        MarketKey::new(self.base, self.collateral, self.expiry_timestamp)
    }

    /// # Errors
    /// Returns `InvalidMarketTerms` if base and collateral coincide, or the
    /// strike or premium is zero.
    pub fn validate(&self) -> Result<()> {
        if self.base == self.collateral {
            return Err(OptescrowError::InvalidMarketTerms {
                reason: format!("base and collateral are the same asset {}", self.base),
            });
        }
        if self.strike_price == 0 {
            return Err(OptescrowError::InvalidMarketTerms {
                reason: "strike price must be greater than zero".to_string(),
            });
        }
        if self.premium_per_lot == 0 {
            return Err(OptescrowError::InvalidMarketTerms {
                reason: "premium per lot must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Test fixtures. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl MarketTerms {
    /// Call market on fresh assets, one-hour expiry from the epoch origin.
    pub fn dummy_call(strike_price: u64, premium_per_lot: u64) -> Self {
        Self {
            base: AssetId::new(),
            collateral: AssetId::new(),
            strike_price,
            expiry_timestamp: 3_600,
            side: OptionSide::Call,
            lot_size: 1,
            premium_per_lot,
        }
    }

    /// Same as [`MarketTerms::dummy_call`], put side.
    pub fn dummy_put(strike_price: u64, premium_per_lot: u64) -> Self {
        Self {
            side: OptionSide::Put,
            ..Self::dummy_call(strike_price, premium_per_lot)
        }
    }
}

/// The persistent record of one option market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Derived from the market key.
    pub id: MarketId,
    /// Underlying asset.
    pub base_asset_id: AssetId,
    /// Asset held in escrow and paid out on redemption.
    pub collateral_asset_id: AssetId,
    /// Fungible claim unit minted by this market.
    pub note_asset_id: AssetId,
    /// Collateral account owned by the market.
    pub escrow_ref: AccountId,
    /// Copied from the terms.
    pub strike_price: u64,
    /// Copied from the terms.
    pub premium_per_lot: u64,
    /// Recorded for reference; note granularity comes from the engine config.
    pub lot_size: u64,
    /// Unix seconds.
    pub expiry_timestamp: i64,
    /// Call or put.
    pub side: OptionSide,
    /// `Open` until a price source records the expiry price.
    settlement: SettlementState,
    /// Wall-clock time the record was opened.
    pub created_at: DateTime<Utc>,
}

impl MarketRecord {
    /// Build an `Open` record from validated terms. All handles are derived
    /// from the market key.
    #[must_use]
    pub fn open(terms: &MarketTerms) -> Self {
        let id = terms.key().market_id();
        Self {
            id,
            base_asset_id: terms.base,
            collateral_asset_id: terms.collateral,
            note_asset_id: id.note_asset(),
            escrow_ref: id.escrow_account(),
            strike_price: terms.strike_price,
            premium_per_lot: terms.premium_per_lot,
            lot_size: terms.lot_size,
            expiry_timestamp: terms.expiry_timestamp,
            side: terms.side,
            settlement: SettlementState::Open,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn key(&self) -> MarketKey {
        MarketKey::new(
            self.base_asset_id,
            self.collateral_asset_id,
            self.expiry_timestamp,
        )
    }

    #[must_use]
    pub fn is_put(&self) -> bool {
        self.side.is_put()
    }

    #[must_use]
    pub fn settlement(&self) -> SettlementState {
        self.settlement
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self.settlement, SettlementState::Settled(_))
    }

    /// Recorded expiry price, `0` while the market is open.
    #[must_use]
    pub fn expiry_price(&self) -> u64 {
        self.settlement.price().map_or(0, NonZeroU64::get)
    }

    /// Latch the expiry price. The first strictly positive price wins; every
    /// later call leaves the record untouched and reports the kept price.
    ///
    /// # Errors
    /// Returns `InvalidPrice` if `price` is zero, whatever the current state.
    pub fn record_expiry_price(&mut self, price: u64) -> Result<SettlementOutcome> {
        let price = NonZeroU64::new(price).ok_or(OptescrowError::InvalidPrice { price })?;
        match self.settlement {
            SettlementState::Open => {
                self.settlement = SettlementState::Settled(price);
                Ok(SettlementOutcome::Recorded(price))
            }
            SettlementState::Settled(existing) => Ok(SettlementOutcome::AlreadySettled(existing)),
        }
    }
}
