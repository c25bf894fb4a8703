//! # optescrow-engine
//!
//! **Lifecycle plane**: cash-settled European options on a token ledger.
//!
//! ## Architecture
//!
//! [`MarketEngine`] owns the collaborators from `optescrow-ledger` and runs
//! every market through the same path:
//! 1. Create: record, escrow account and note asset derived from the key
//! 2. Deposit: premium into escrow, notes minted one-for-one
//! 3. Settle: a trusted source latches the expiry price, once
//! 4. Redeem: profit out of escrow, all notes burned
//!
//! A [`SupplyAudit`] keeps running totals per market so conservation can be
//! checked at any time through [`MarketEngine::audit_market`].

pub mod clock;
pub mod engine;
pub mod payout;
pub mod supply_audit;

pub use clock::{Clock, ManualClock, PurchaseGate, SystemClock};
pub use engine::{DepositRequest, MarketEngine, RedeemRequest};
pub use supply_audit::{CoverageReport, MarketFlows, SupplyAudit};
