//! Identifiers used throughout optescrow.
//!
//! Assets, accounts and principals are UUIDv7 newtypes. Everything a market
//! owns (its id, escrow account, note asset, signing authority) is derived
//! deterministically from the [`MarketKey`] with domain-separated SHA-256,
//! so the same key always resolves to the same handles.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash `domain || parts...` and take the first 16 bytes as a UUID.
fn derive_uuid(domain: &[u8], parts: &[&[u8]]) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    let hash = hasher.finalize();
    let bytes: [u8; 16] = hash[..16].try_into().expect("SHA-256 produces 32 bytes");
    Uuid::from_bytes(bytes)
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Identity of a token asset (underlying, collateral or option note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl AssetId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A token account: one balance of one asset, held by one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PrincipalId
// ---------------------------------------------------------------------------

/// A party able to sign or authorize ledger operations: a user, a price
/// source, or a market's own signing authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MarketKey
// ---------------------------------------------------------------------------

/// The uniqueness key of an option market: at most one market exists per
/// (underlying, collateral, expiry) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarketKey {
    pub base: AssetId,
    pub collateral: AssetId,
    /// Unix seconds.
    pub expiry_timestamp: i64,
}

impl MarketKey {
    #[must_use]
    pub fn new(base: AssetId, collateral: AssetId, expiry_timestamp: i64) -> Self {
        Self {
            base,
            collateral,
            expiry_timestamp,
        }
    }

    /// The market id this key resolves to.
    #[must_use]
    pub fn market_id(&self) -> MarketId {
        MarketId::derive(self)
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.base.0, self.collateral.0, self.expiry_timestamp
        )
    }
}

// ---------------------------------------------------------------------------
// MarketId
// ---------------------------------------------------------------------------

/// Deterministic market identifier derived from its [`MarketKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarketId(pub Uuid);

impl MarketId {
    /// `SHA-256("optescrow:market:v1:" || base || collateral || expiry_le)[..16]`
    #[must_use]
    pub fn derive(key: &MarketKey) -> Self {
        Self(derive_uuid(
            b"optescrow:market:v1:",
            &[
                key.base.0.as_bytes(),
                key.collateral.0.as_bytes(),
                &key.expiry_timestamp.to_le_bytes(),
            ],
        ))
    }

    /// The collateral escrow account owned by this market.
    #[must_use]
    pub fn escrow_account(&self) -> AccountId {
        AccountId(derive_uuid(b"optescrow:vault:v1:", &[self.0.as_bytes()]))
    }

    /// The option-note asset minted by this market.
    #[must_use]
    pub fn note_asset(&self) -> AssetId {
        AssetId(derive_uuid(
            b"optescrow:option_note_mint:v1:",
            &[self.0.as_bytes()],
        ))
    }

    /// The market's own signing authority: owner of the escrow and mint
    /// authority of the note asset. No external party holds it.
    #[must_use]
    pub fn authority(&self) -> PrincipalId {
        PrincipalId(derive_uuid(b"optescrow:authority:v1:", &[self.0.as_bytes()]))
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0.as_bytes()[..4])
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market:{}", hex::encode(&self.0.as_bytes()[..8]))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
