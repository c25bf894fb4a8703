//! # optescrow-ledger
//!
//! **Collaborator seams** consumed by the lifecycle engine: market record
//! storage, token movement, and signer verification.
//!
//! ## Architecture
//!
//! The engine only ever talks to these three traits:
//! 1. **AccountStore**: one [`MarketRecord`](optescrow_types::MarketRecord) per market key
//! 2. **TokenLedger**: accounts, mint authorities, transfer / mint / burn
//! 3. **SignerVerifier**: who signed this transaction, who may report prices
//!
//! In-memory implementations ship alongside each trait so the engine can be
//! driven end to end without an external chain or database.
//!
//! ```text
//! caller → SignerVerifier.require_signature() → engine op
//!        → AccountStore.get_mut()  → TokenLedger.transfer/mint/burn
//! ```

pub mod account_store;
pub mod signer;
pub mod token_ledger;

pub use account_store::{AccountStore, InMemoryAccountStore};
pub use signer::{PriceSourceGrant, SignerVerifier, TransactionSigners};
pub use token_ledger::{InMemoryTokenLedger, TokenLedger};
