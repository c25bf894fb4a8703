//! Receipts returned by the lifecycle operations.
//!
//! Every mutating operation hands back a record of exactly what moved, so
//! callers can reconcile against the ledger without re-reading it.

use std::{fmt, num::NonZeroU64};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetId, MarketId, MarketKey, PrincipalId};

/// Result of a settlement attempt. Repeat attempts are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// This call moved the market from OPEN to SETTLED.
    Recorded(NonZeroU64),
    /// The market was already settled; the kept price is returned.
    AlreadySettled(NonZeroU64),
}

impl SettlementOutcome {
    /// The price the market is settled at after this call.
    #[must_use]
    pub fn price(&self) -> NonZeroU64 {
        match self {
            Self::Recorded(p) | Self::AlreadySettled(p) => *p,
        }
    }

    #[must_use]
    pub fn was_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Where the expiry price landed relative to the strike, from the holder's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Moneyness {
    InTheMoney,
    AtTheMoney,
    OutOfTheMoney,
}

impl fmt::Display for Moneyness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InTheMoney => write!(f, "ITM"),
            Self::AtTheMoney => write!(f, "ATM"),
            Self::OutOfTheMoney => write!(f, "OTM"),
        }
    }
}

/// A new market and the handles it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCreated {
    pub market_id: MarketId,
    pub key: MarketKey,
    pub escrow_ref: AccountId,
    pub note_asset_id: AssetId,
    pub created_at: DateTime<Utc>,
}

/// A premium purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub market_id: MarketId,
    pub buyer: PrincipalId,
    pub lots: u64,
    /// Collateral moved from the buyer into escrow.
    pub premium_paid: u64,
    /// Note minor units minted to the buyer. Always equal to `premium_paid`.
    pub notes_minted: u64,
    pub escrow_balance_after: u64,
    pub issued_at: DateTime<Utc>,
}

/// A holder's redemption of their whole note balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub market_id: MarketId,
    pub holder: PrincipalId,
    pub expiry_price: NonZeroU64,
    pub lots: u64,
    pub moneyness: Moneyness,
    /// Collateral paid out of escrow; zero when not in the money.
    pub profit: u64,
    pub notes_burned: u64,
    pub issued_at: DateTime<Utc>,
}
