//! Signer verification and the trusted price-source boundary.
//!
//! Every entry point asks the [`SignerVerifier`] whether the acting
//! principal signed the current transaction. Settlement additionally needs a
//! [`PriceSourceGrant`], which can only be obtained through
//! [`SignerVerifier::authorize_price_source`]: the grant's constructor is
//! private to this module, so holding one proves the check ran.

use std::collections::HashSet;

use optescrow_types::{OptescrowError, PrincipalId, Result};

/// Capability to report one expiry price. Not constructible outside this
/// crate, and not `Clone`: settling consumes it.
///
/// ```compile_fail
/// use optescrow_ledger::{PriceSourceGrant, SignerVerifier, TransactionSigners};
/// use optescrow_types::PrincipalId;
///
/// fn settle(_: PriceSourceGrant) {}
///
/// let oracle = PrincipalId::new();
/// let signers = TransactionSigners::new([oracle]).with_signer(oracle);
/// let grant = signers.authorize_price_source(oracle).unwrap();
/// settle(grant);
/// settle(grant);
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct PriceSourceGrant {
    principal: PrincipalId,
}

impl PriceSourceGrant {
    /// The price source this grant was issued to.
    #[must_use]
    pub fn principal(&self) -> PrincipalId {
        self.principal
    }
}

/// Signature check seam, run before each operation.
pub trait SignerVerifier {
    /// # Errors
    /// Returns `Unauthorized` if `principal` did not sign.
    fn require_signature(&self, principal: PrincipalId) -> Result<()>;

    /// Whether `principal` is trusted to report expiry prices.
    fn is_price_source(&self, principal: PrincipalId) -> bool;

    /// Issue a settlement capability to a signed, trusted price source.
    ///
    /// # Errors
    /// Returns `Unauthorized` if the principal did not sign or is not a
    /// configured price source.
    fn authorize_price_source(&self, principal: PrincipalId) -> Result<PriceSourceGrant> {
        self.require_signature(principal)?;
        if !self.is_price_source(principal) {
            tracing::warn!(%principal, "Price report refused: not a trusted source");
            return Err(OptescrowError::Unauthorized { principal });
        }
        Ok(PriceSourceGrant { principal })
    }
}

/// The signer set of the transaction being applied, plus the trusted price
/// sources.
#[derive(Debug, Clone, Default)]
pub struct TransactionSigners {
    signers: HashSet<PrincipalId>,
    price_sources: HashSet<PrincipalId>,
}

impl TransactionSigners {
    #[must_use]
    pub fn new(price_sources: impl IntoIterator<Item = PrincipalId>) -> Self {
        Self {
            signers: HashSet::new(),
            price_sources: price_sources.into_iter().collect(),
        }
    }

    /// Record that `principal` signed the current transaction.
    pub fn sign(&mut self, principal: PrincipalId) {
        self.signers.insert(principal);
    }

    #[must_use]
    pub fn with_signer(mut self, principal: PrincipalId) -> Self {
        self.sign(principal);
        self
    }

    /// Drop all signatures, e.g. between transactions.
    pub fn clear(&mut self) {
        self.signers.clear();
    }

    pub fn add_price_source(&mut self, principal: PrincipalId) {
        self.price_sources.insert(principal);
    }
}

impl SignerVerifier for TransactionSigners {
    fn require_signature(&self, principal: PrincipalId) -> Result<()> {
        if self.signers.contains(&principal) {
            Ok(())
        } else {
            Err(OptescrowError::Unauthorized { principal })
        }
    }

    fn is_price_source(&self, principal: PrincipalId) -> bool {
        self.price_sources.contains(&principal)
    }
}
