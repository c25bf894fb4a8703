//! Error types for the optescrow settlement engine.
//!
//! All errors use the `OE_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Market registry errors
//! - 2xx: Balance / escrow errors
//! - 3xx: Settlement lifecycle errors
//! - 4xx: Note / lot errors
//! - 5xx: Arithmetic errors
//! - 6xx: Authorization errors
//! - 7xx: Invariant violations
//! - 9xx: General / configuration errors

use thiserror::Error;

use crate::{AccountId, AssetId, MarketKey, PrincipalId};

/// Central error enum for all optescrow operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptescrowError {
    // =================================================================
    // Market Registry Errors (1xx)
    // =================================================================
    /// A market already exists for this (base, collateral, expiry) key.
    #[error("OE_ERR_100: Market already exists: {0}")]
    DuplicateMarket(MarketKey),

    /// No market is registered under this key.
    #[error("OE_ERR_101: Market not found: {0}")]
    MarketNotFound(MarketKey),

    /// The creation terms are unusable.
    #[error("OE_ERR_102: Invalid market terms: {reason}")]
    InvalidMarketTerms { reason: String },

    // =================================================================
    // Balance / Escrow Errors (2xx)
    // =================================================================
    /// The debited account holds less than the requested amount.
    #[error("OE_ERR_200: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    /// The market escrow cannot cover a computed payout.
    #[error("OE_ERR_201: Escrow underfunded: payout {needed}, escrow holds {available}")]
    EscrowUnderfunded { needed: u64, available: u64 },

    /// An account holds a different asset than the operation requires.
    #[error("OE_ERR_202: Asset mismatch: expected {expected}, got {actual}")]
    AssetMismatch { expected: AssetId, actual: AssetId },

    /// The referenced token account does not exist.
    #[error("OE_ERR_203: Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The asset has no registered mint authority in the ledger.
    #[error("OE_ERR_204: Asset not registered: {0}")]
    AssetNotFound(AssetId),

    /// An account with this id already exists.
    #[error("OE_ERR_205: Account already exists: {0}")]
    DuplicateAccount(AccountId),

    // =================================================================
    // Settlement Lifecycle Errors (3xx)
    // =================================================================
    /// Proposed expiry price is not strictly positive.
    #[error("OE_ERR_300: Invalid settlement price: {price}")]
    InvalidPrice { price: u64 },

    /// Redemption attempted before the expiry price was recorded.
    #[error("OE_ERR_301: Market not settled")]
    NotSettled,

    /// Purchase attempted at or after expiry (or after settlement).
    #[error("OE_ERR_302: Market expired at {expiry}, now {now}")]
    MarketExpired { expiry: i64, now: i64 },

    // =================================================================
    // Note / Lot Errors (4xx)
    // =================================================================
    /// Note balance is not a whole number of lots.
    #[error("OE_ERR_400: Invalid note amount {amount}: must be a whole multiple of {granularity}")]
    InvalidNoteAmount { amount: u64, granularity: u64 },

    /// A purchase must be for at least one lot.
    #[error("OE_ERR_401: Lot count must be greater than zero")]
    InvalidLotCount,

    // =================================================================
    // Arithmetic Errors (5xx)
    // =================================================================
    /// A checked u64 operation overflowed.
    #[error("OE_ERR_500: Arithmetic overflow")]
    ArithmeticOverflow,

    // =================================================================
    // Authorization Errors (6xx)
    // =================================================================
    /// The principal did not sign, or lacks authority over the resource.
    #[error("OE_ERR_600: Unauthorized principal: {principal}")]
    Unauthorized { principal: PrincipalId },

    // =================================================================
    // Invariant Violations (7xx)
    // =================================================================
    /// Note supply or escrow balance disagrees with the recorded flows.
    #[error("OE_ERR_700: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OE_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OE_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, out-of-range values, etc.).
    #[error("OE_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, OptescrowError>;

impl From<serde_json::Error> for OptescrowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
