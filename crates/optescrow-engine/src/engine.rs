//! Option market lifecycle engine.
//!
//! Four mutating operations drive a market from creation to payout:
//! 1. `create_market`: allocate the record, escrow account and note asset
//! 2. `deposit_and_mint`: buyer pays premium into escrow, receives notes
//! 3. `record_settlement_price`: trusted source latches the expiry price once
//! 4. `redeem`: holder burns every note, receives profit if in the money
//!
//! Each operation checks every precondition before its first ledger write,
//! so a failing call leaves store, ledger and audit exactly as they were.

use optescrow_ledger::{
    AccountStore, InMemoryAccountStore, InMemoryTokenLedger, PriceSourceGrant, SignerVerifier,
    TokenLedger, TransactionSigners,
};
use optescrow_types::{
    AccountId, AssetId, DepositReceipt, EngineConfig, MarketCreated, MarketKey, MarketRecord,
    MarketTerms, OptescrowError, PrincipalId, RedemptionReceipt, Result, SettlementOutcome,
    TokenAccount, constants,
};

use crate::clock::{Clock, PurchaseGate, SystemClock};
use crate::payout;
use crate::supply_audit::{CoverageReport, SupplyAudit};

/// A buyer's premium purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRequest {
    pub market: MarketKey,
    pub buyer: PrincipalId,
    pub lots: u64,
    /// Buyer-owned collateral account the premium is taken from.
    pub collateral_source: AccountId,
    /// Note account credited with the minted notes.
    pub note_destination: AccountId,
}

/// A holder's redemption of their entire note balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemRequest {
    pub market: MarketKey,
    pub holder: PrincipalId,
    /// Holder-owned note account; its whole balance is burned.
    pub note_account: AccountId,
    /// Collateral account receiving the profit.
    pub payout_destination: AccountId,
}

/// Lifecycle engine over pluggable store, ledger, verifier and clock.
pub struct MarketEngine<
    S = InMemoryAccountStore,
    L = InMemoryTokenLedger,
    V = TransactionSigners,
    C = SystemClock,
> {
    config: EngineConfig,
    store: S,
    ledger: L,
    verifier: V,
    clock: C,
    gate: PurchaseGate,
    audit: SupplyAudit,
}

impl MarketEngine {
    /// In-memory engine on the wall clock.
    ///
    /// # Errors
    /// Returns `Configuration` if the config does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::in_memory(config, SystemClock)
    }
}

impl<C: Clock> MarketEngine<InMemoryAccountStore, InMemoryTokenLedger, TransactionSigners, C> {
    /// In-memory collaborators, trusting `config.price_sources`.
    ///
    /// # Errors
    /// Returns `Configuration` if the config does not validate.
    pub fn in_memory(config: EngineConfig, clock: C) -> Result<Self> {
        let verifier = TransactionSigners::new(config.price_sources.iter().copied());
        Self::with_parts(
            config,
            InMemoryAccountStore::new(),
            InMemoryTokenLedger::new(),
            verifier,
            clock,
        )
    }
}

impl<S, L, V, C> MarketEngine<S, L, V, C>
where
    S: AccountStore,
    L: TokenLedger,
    V: SignerVerifier,
    C: Clock,
{
    /// # Errors
    /// Returns `Configuration` if the config does not validate.
    pub fn with_parts(config: EngineConfig, store: S, ledger: L, verifier: V, clock: C) -> Result<Self> {
        config.validate()?;
        let gate = PurchaseGate::new(config.enforce_purchase_deadline);
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            note_decimals = config.note_decimals,
            purchase_deadline = gate.is_enforced(),
            price_sources = config.price_sources.len(),
            "Market engine initialized"
        );
        Ok(Self {
            config,
            store,
            ledger,
            verifier,
            clock,
            gate,
            audit: SupplyAudit::new(),
        })
    }

    // ------------------------------------------------------------------
    // Mutating operations
    // ------------------------------------------------------------------

    /// Create a market for `(base, collateral, expiry)`.
    ///
    /// The escrow account and note asset are derived from the market key and
    /// owned by the market's authority; nobody else can move escrow funds or
    /// mint notes.
    ///
    /// # Errors
    /// - `Unauthorized` if `payer` did not sign
    /// - `InvalidMarketTerms` for bad terms
    /// - `DuplicateMarket` if the key already exists
    pub fn create_market(&mut self, payer: PrincipalId, terms: &MarketTerms) -> Result<MarketCreated> {
        self.verifier.require_signature(payer)?;
        terms.validate()?;

        let key = terms.key();
        if self.store.contains(&key) {
            return Err(OptescrowError::DuplicateMarket(key));
        }

        let record = MarketRecord::open(terms);
        let authority = record.id.authority();
        if self.ledger.is_registered(record.note_asset_id) {
            return Err(OptescrowError::Internal(format!(
                "note asset {} of {key} already registered",
                record.note_asset_id
            )));
        }
        if self.ledger.account(record.escrow_ref).is_ok() {
            return Err(OptescrowError::DuplicateAccount(record.escrow_ref));
        }

        self.ledger.register_asset(record.note_asset_id, authority)?;
        self.ledger
            .open_account(record.escrow_ref, record.collateral_asset_id, authority)?;

        let created = MarketCreated {
            market_id: record.id,
            key,
            escrow_ref: record.escrow_ref,
            note_asset_id: record.note_asset_id,
            created_at: record.created_at,
        };
        self.store.create(record)?;

        tracing::info!(
            market = %created.market_id,
            %key,
            side = %terms.side,
            strike = terms.strike_price,
            premium_per_lot = terms.premium_per_lot,
            "Market created"
        );
        Ok(created)
    }

    /// Buy `lots` options: move `lots × premium_per_lot` collateral into
    /// escrow and mint the same number of note minor units to the buyer.
    ///
    /// # Errors
    /// - `Unauthorized` if the buyer did not sign or does not own the source
    /// - `MarketNotFound`, `MarketExpired` (deadline gate)
    /// - `InvalidLotCount` for zero lots, `ArithmeticOverflow`
    /// - `AssetMismatch` for accounts of the wrong asset
    /// - `InsufficientBalance` if the source cannot cover the premium
    pub fn deposit_and_mint(&mut self, req: DepositRequest) -> Result<DepositReceipt> {
        self.verifier.require_signature(req.buyer)?;
        let record = self.record(&req.market)?.clone();
        self.gate.check(&record, self.clock.now())?;

        let total = payout::premium_total(req.lots, record.premium_per_lot)?;

        let source = self.ledger.account(req.collateral_source)?;
        if source.owner != req.buyer {
            return Err(OptescrowError::Unauthorized { principal: req.buyer });
        }
        expect_asset(&source, record.collateral_asset_id)?;
        if source.amount < total {
            return Err(OptescrowError::InsufficientBalance {
                needed: total,
                available: source.amount,
            });
        }
        let escrow = self.ledger.account(record.escrow_ref)?;
        escrow
            .amount
            .checked_add(total)
            .ok_or(OptescrowError::ArithmeticOverflow)?;
        let destination = self.ledger.account(req.note_destination)?;
        expect_asset(&destination, record.note_asset_id)?;
        destination
            .amount
            .checked_add(total)
            .ok_or(OptescrowError::ArithmeticOverflow)?;
        self.ledger
            .supply(record.note_asset_id)
            .checked_add(total)
            .ok_or(OptescrowError::ArithmeticOverflow)?;

        self.ledger
            .transfer(req.collateral_source, record.escrow_ref, total, req.buyer)?;
        self.ledger.mint(
            record.note_asset_id,
            req.note_destination,
            total,
            record.id.authority(),
        )?;
        self.audit.record_deposit(record.id, total);

        let escrow_balance_after = self.ledger.balance(record.escrow_ref)?;
        tracing::debug!(
            market = %record.id,
            buyer = %req.buyer,
            lots = req.lots,
            premium = total,
            escrow = escrow_balance_after,
            "Premium deposited, notes minted"
        );
        Ok(DepositReceipt {
            market_id: record.id,
            buyer: req.buyer,
            lots: req.lots,
            premium_paid: total,
            notes_minted: total,
            escrow_balance_after,
            issued_at: chrono::Utc::now(),
        })
    }

    /// Latch the expiry price of a market. The first strictly positive
    /// price wins; later calls are no-ops that report the kept price.
    /// The grant is consumed, so every report needs a fresh authorization.
    ///
    /// # Errors
    /// - `MarketNotFound`
    /// - `InvalidPrice` for a zero price
    #[allow(clippy::needless_pass_by_value)]
    pub fn record_settlement_price(
        &mut self,
        grant: PriceSourceGrant,
        market: &MarketKey,
        price: u64,
    ) -> Result<SettlementOutcome> {
        let record = self
            .store
            .get_mut(market)
            .ok_or(OptescrowError::MarketNotFound(*market))?;
        let outcome = record.record_expiry_price(price)?;

        if outcome.was_recorded() {
            tracing::info!(
                market = %record.id,
                source = %grant.principal(),
                price = outcome.price().get(),
                "Expiry price recorded"
            );
        } else {
            tracing::warn!(
                market = %record.id,
                source = %grant.principal(),
                proposed = price,
                kept = outcome.price().get(),
                "Repeat settlement ignored"
            );
        }
        Ok(outcome)
    }

    /// Authorize `source` through the verifier, then settle.
    ///
    /// # Errors
    /// `Unauthorized` if `source` is not a signed, trusted price source,
    /// plus everything [`Self::record_settlement_price`] returns.
    pub fn settle_as(
        &mut self,
        source: PrincipalId,
        market: &MarketKey,
        price: u64,
    ) -> Result<SettlementOutcome> {
        let grant = self.verifier.authorize_price_source(source)?;
        self.record_settlement_price(grant, market, price)
    }

    /// Redeem the holder's whole note balance: pay any profit out of escrow,
    /// then burn every note.
    ///
    /// # Errors
    /// - `Unauthorized` if the holder did not sign or does not own the notes
    /// - `MarketNotFound`, `AssetMismatch`
    /// - `InvalidNoteAmount` for a fractional-lot balance
    /// - `NotSettled` before settlement
    /// - `ArithmeticOverflow`
    /// - `EscrowUnderfunded` if escrow cannot pay the profit
    pub fn redeem(&mut self, req: RedeemRequest) -> Result<RedemptionReceipt> {
        self.verifier.require_signature(req.holder)?;
        let record = self.record(&req.market)?.clone();

        let notes = self.ledger.account(req.note_account)?;
        expect_asset(&notes, record.note_asset_id)?;
        if notes.owner != req.holder {
            return Err(OptescrowError::Unauthorized { principal: req.holder });
        }

        let lots = payout::lots_from_notes(notes.amount, self.config.note_units_per_lot())?;
        let expiry_price = record.settlement().price().ok_or(OptescrowError::NotSettled)?;

        let profit = payout::profit(record.side, record.strike_price, expiry_price.get(), lots)?;
        let moneyness = payout::moneyness(record.side, record.strike_price, expiry_price.get());

        if req.payout_destination == record.escrow_ref {
            return Err(OptescrowError::Unauthorized { principal: req.holder });
        }
        let destination = self.ledger.account(req.payout_destination)?;
        expect_asset(&destination, record.collateral_asset_id)?;
        if profit > 0 {
            let escrow = self.ledger.balance(record.escrow_ref)?;
            if escrow < profit {
                tracing::warn!(
                    market = %record.id,
                    holder = %req.holder,
                    profit,
                    escrow,
                    "Redemption refused: escrow underfunded"
                );
                return Err(OptescrowError::EscrowUnderfunded {
                    needed: profit,
                    available: escrow,
                });
            }
            destination
                .amount
                .checked_add(profit)
                .ok_or(OptescrowError::ArithmeticOverflow)?;
        }

        let authority = record.id.authority();
        if profit > 0 {
            self.ledger
                .transfer(record.escrow_ref, req.payout_destination, profit, authority)?;
        }
        self.ledger
            .burn(record.note_asset_id, req.note_account, notes.amount, authority)?;
        self.audit.record_redemption(record.id, notes.amount, profit);

        tracing::info!(
            market = %record.id,
            holder = %req.holder,
            lots,
            %moneyness,
            profit,
            burned = notes.amount,
            "Notes redeemed"
        );
        Ok(RedemptionReceipt {
            market_id: record.id,
            holder: req.holder,
            expiry_price,
            lots,
            moneyness,
            profit,
            notes_burned: notes.amount,
            issued_at: chrono::Utc::now(),
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[must_use]
    pub fn market(&self, key: &MarketKey) -> Option<&MarketRecord> {
        self.store.get(key)
    }

    /// Every market, in key order.
    #[must_use]
    pub fn markets(&self) -> Vec<&MarketRecord> {
        self.store
            .keys()
            .iter()
            .filter_map(|k| self.store.get(k))
            .collect()
    }

    /// # Errors
    /// `MarketNotFound`, or the ledger's error if the escrow account is gone.
    pub fn escrow_balance(&self, key: &MarketKey) -> Result<u64> {
        self.ledger.balance(self.record(key)?.escrow_ref)
    }

    /// # Errors
    /// `MarketNotFound`.
    pub fn note_supply(&self, key: &MarketKey) -> Result<u64> {
        Ok(self.ledger.supply(self.record(key)?.note_asset_id))
    }

    /// Check the market's conservation equations, then report how well
    /// escrow covers outstanding notes.
    ///
    /// # Errors
    /// `MarketNotFound`, or `SupplyInvariantViolation` if ledger state
    /// disagrees with the engine's running totals.
    pub fn audit_market(&self, key: &MarketKey) -> Result<CoverageReport> {
        let record = self.record(key)?;
        let escrow = self.ledger.balance(record.escrow_ref)?;
        let supply = self.ledger.supply(record.note_asset_id);
        self.audit.verify(record.id, supply, escrow)?;
        Ok(CoverageReport::assess(
            record,
            escrow,
            supply,
            self.config.note_units_per_lot(),
        ))
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Direct ledger access, e.g. to fund buyers or open accounts.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    #[must_use]
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn verifier_mut(&mut self) -> &mut V {
        &mut self.verifier
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    #[must_use]
    pub fn audit(&self) -> &SupplyAudit {
        &self.audit
    }

    fn record(&self, key: &MarketKey) -> Result<&MarketRecord> {
        self.store
            .get(key)
            .ok_or(OptescrowError::MarketNotFound(*key))
    }
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
