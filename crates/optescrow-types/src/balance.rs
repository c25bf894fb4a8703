//! Token account type for the escrow model.
//!
//! Every account holds a single asset for a single owner. The owner is the
//! only principal allowed to debit it.

use serde::{Deserialize, Serialize};

use crate::{AssetId, OptescrowError, PrincipalId, Result};

/// One balance of one asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenAccount {
    pub asset: AssetId,
    /// Principal allowed to move funds out of this account.
    pub owner: PrincipalId,
    pub amount: u64,
}

impl TokenAccount {
    /// Create an empty account.
    #[must_use]
    pub fn new(asset: AssetId, owner: PrincipalId) -> Self {
        Self {
            asset,
            owner,
            amount: 0,
        }
    }

    /// # Errors
    /// Returns `InsufficientBalance` if `amount` exceeds the balance.
    pub fn debit(&mut self, amount: u64) -> Result<()> {
        self.amount = self
            .amount
            .checked_sub(amount)
            .ok_or(OptescrowError::InsufficientBalance {
                needed: amount,
                available: self.amount,
            })?;
        Ok(())
    }

    /// # Errors
    /// Returns `ArithmeticOverflow` if the balance would exceed `u64::MAX`.
    pub fn credit(&mut self, amount: u64) -> Result<()> {
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(OptescrowError::ArithmeticOverflow)?;
        Ok(())
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}
