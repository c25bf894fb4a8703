//! Token ledger: balances, mint authorities and supply per asset.
//!
//! The lifecycle engine never touches balances directly: it moves
//! collateral and notes through the [`TokenLedger`] seam. Every mutation is
//! validated in full before anything is written, so a failed call leaves
//! the ledger unchanged.

use std::collections::HashMap;

use optescrow_types::{
    AccountId, AssetId, OptescrowError, PrincipalId, Result, TokenAccount,
};

/// Transfer / mint / burn primitives the engine consumes.
pub trait TokenLedger {
    /// Register an asset and the principal allowed to mint and burn it.
    fn register_asset(&mut self, asset: AssetId, mint_authority: PrincipalId) -> Result<()>;

    /// Open an empty account under a caller-chosen id.
    fn open_account(&mut self, id: AccountId, asset: AssetId, owner: PrincipalId) -> Result<()>;

    /// Snapshot of an account.
    fn account(&self, id: AccountId) -> Result<TokenAccount>;

    /// Outstanding supply of a registered asset; zero if unknown.
    fn supply(&self, asset: AssetId) -> u64;

    fn is_registered(&self, asset: AssetId) -> bool;

    /// Move `amount` between two accounts of the same asset. `authority`
    /// must own `from`.
    fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: u64,
        authority: PrincipalId,
    ) -> Result<()>;

    /// Create `amount` new units of `asset` in `to`. `authority` must be the
    /// asset's mint authority.
    fn mint(
        &mut self,
        asset: AssetId,
        to: AccountId,
        amount: u64,
        authority: PrincipalId,
    ) -> Result<()>;

    /// Destroy `amount` units of `asset` held in `from`. `authority` must be
    /// the asset's mint authority or the account owner.
    fn burn(
        &mut self,
        asset: AssetId,
        from: AccountId,
        amount: u64,
        authority: PrincipalId,
    ) -> Result<()>;

    /// Balance of an account.
    fn balance(&self, id: AccountId) -> Result<u64> {
        Ok(self.account(id)?.amount)
    }
}

/// Per-asset registry entry.
#[derive(Debug, Clone, Copy)]
struct AssetEntry {
    mint_authority: PrincipalId,
    supply: u64,
}

/// HashMap-backed [`TokenLedger`].
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    accounts: HashMap<AccountId, TokenAccount>,
    assets: HashMap<AssetId, AssetEntry>,
}

impl InMemoryTokenLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: open an account under a fresh id.
    pub fn open_new_account(&mut self, asset: AssetId, owner: PrincipalId) -> Result<AccountId> {
        let id = AccountId::new();
        self.open_account(id, asset, owner)?;
        Ok(id)
    }

    /// Sum of every account balance of `asset`. Always equals `supply` for
    /// registered assets.
    #[must_use]
    pub fn circulating(&self, asset: AssetId) -> u64 {
        self.accounts
            .values()
            .filter(|a| a.asset == asset)
            .map(|a| a.amount)
            .sum()
    }

    /// Number of open accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn asset_entry(&self, asset: AssetId) -> Result<AssetEntry> {
        self.assets
            .get(&asset)
            .copied()
            .ok_or(OptescrowError::AssetNotFound(asset))
    }

    fn expect_asset(account: &TokenAccount, asset: AssetId) -> Result<()> {
        if account.asset == asset {
            Ok(())
        } else {
            Err(OptescrowError::AssetMismatch {
                expected: asset,
                actual: account.asset,
            })
        }
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn register_asset(&mut self, asset: AssetId, mint_authority: PrincipalId) -> Result<()> {
        if self.assets.contains_key(&asset) {
            return Err(OptescrowError::Internal(format!(
                "asset {asset} already registered"
            )));
        }
        self.assets.insert(
            asset,
            AssetEntry {
                mint_authority,
                supply: 0,
            },
        );
        Ok(())
    }

    fn open_account(&mut self, id: AccountId, asset: AssetId, owner: PrincipalId) -> Result<()> {
        if self.accounts.contains_key(&id) {
            return Err(OptescrowError::DuplicateAccount(id));
        }
        self.accounts.insert(id, TokenAccount::new(asset, owner));
        Ok(())
    }

    fn account(&self, id: AccountId) -> Result<TokenAccount> {
        self.accounts
            .get(&id)
            .copied()
            .ok_or(OptescrowError::AccountNotFound(id))
    }

    fn supply(&self, asset: AssetId) -> u64 {
        self.assets.get(&asset).map_or(0, |e| e.supply)
    }

    fn is_registered(&self, asset: AssetId) -> bool {
        self.assets.contains_key(&asset)
    }

    fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: u64,
        authority: PrincipalId,
    ) -> Result<()> {
        let mut src = self.account(from)?;
        let mut dst = self.account(to)?;

        if src.owner != authority {
            return Err(OptescrowError::Unauthorized {
                principal: authority,
            });
        }
        Self::expect_asset(&dst, src.asset)?;

        src.debit(amount)?;
        if from == to {
            // Self-transfer: balance was checked, nothing moves.
            return Ok(());
        }
        dst.credit(amount)?;

        self.accounts.insert(from, src);
        self.accounts.insert(to, dst);
        tracing::trace!(%from, %to, amount, "Transfer applied");
        Ok(())
    }

    fn mint(
        &mut self,
        asset: AssetId,
        to: AccountId,
        amount: u64,
        authority: PrincipalId,
    ) -> Result<()> {
        let mut entry = self.asset_entry(asset)?;
        if entry.mint_authority != authority {
            return Err(OptescrowError::Unauthorized {
                principal: authority,
            });
        }
        let mut dst = self.account(to)?;
        Self::expect_asset(&dst, asset)?;

        entry.supply = entry
            .supply
            .checked_add(amount)
            .ok_or(OptescrowError::ArithmeticOverflow)?;
        dst.credit(amount)?;

        self.assets.insert(asset, entry);
        self.accounts.insert(to, dst);
        tracing::trace!(%asset, %to, amount, supply = entry.supply, "Mint applied");
        Ok(())
    }

    fn burn(
        &mut self,
        asset: AssetId,
        from: AccountId,
        amount: u64,
        authority: PrincipalId,
    ) -> Result<()> {
        let mut entry = self.asset_entry(asset)?;
        let mut src = self.account(from)?;
        Self::expect_asset(&src, asset)?;
        if authority != entry.mint_authority && authority != src.owner {
            return Err(OptescrowError::Unauthorized {
                principal: authority,
            });
        }

        src.debit(amount)?;
        entry.supply = entry
            .supply
            .checked_sub(amount)
            .ok_or_else(|| OptescrowError::SupplyInvariantViolation {
                reason: format!("burn of {amount} exceeds supply {} of {asset}", entry.supply),
            })?;

        self.assets.insert(asset, entry);
        self.accounts.insert(from, src);
        tracing::trace!(%asset, %from, amount, supply = entry.supply, "Burn applied");
        Ok(())
    }
}
