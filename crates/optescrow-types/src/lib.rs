//! # optescrow-types
//!
//! Shared types, errors, and configuration for the **optescrow** option
//! settlement engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AssetId`], [`AccountId`], [`PrincipalId`], [`MarketKey`], [`MarketId`]
//! - **Market model**: [`MarketTerms`], [`MarketRecord`], [`OptionSide`], [`SettlementState`]
//! - **Receipts**: [`MarketCreated`], [`DepositReceipt`], [`SettlementOutcome`], [`RedemptionReceipt`], [`Moneyness`]
//! - **Balances**: [`TokenAccount`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`OptescrowError`] with `OE_ERR_` prefix codes
//! - **Constants**: note granularity and engine metadata

pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod market;
pub mod receipt;

pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use market::*;
pub use receipt::*;

// Constants are accessed via `optescrow_types::constants::FOO`
// (not re-exported to avoid name collisions).
