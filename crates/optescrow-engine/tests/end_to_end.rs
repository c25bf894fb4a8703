//! End-to-end tests across the full market lifecycle:
//! create -> deposit/mint -> settle -> redeem
//!
//! They drive the engine through the in-memory ledger, store and signer set
//! and check balances, note supply and the per-market audit after each step.

use std::sync::{Arc, Mutex};
use std::thread;

use optescrow_engine::{DepositRequest, ManualClock, MarketEngine, RedeemRequest};
use optescrow_ledger::{InMemoryAccountStore, InMemoryTokenLedger, TokenLedger, TransactionSigners};
use optescrow_types::constants::NOTE_UNITS_PER_LOT;
use optescrow_types::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

type Engine =
    MarketEngine<InMemoryAccountStore, InMemoryTokenLedger, TransactionSigners, ManualClock>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A buyer's two accounts on one market.
#[derive(Clone, Copy)]
struct Wallet {
    owner: PrincipalId,
    cash: AccountId,
    notes: AccountId,
}

/// Helper: one engine, one collateral asset, one trusted oracle.
struct Desk {
    engine: Engine,
    usdc: AssetId,
    treasury: PrincipalId,
    creator: PrincipalId,
    oracle: PrincipalId,
}

impl Desk {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let oracle = PrincipalId::new();
        let mut engine =
            MarketEngine::in_memory(config.with_price_source(oracle), ManualClock::at(0))
                .expect("valid config");
        let usdc = AssetId::new();
        let treasury = PrincipalId::new();
        let creator = PrincipalId::new();
        engine
            .ledger_mut()
            .register_asset(usdc, treasury)
            .expect("register collateral");
        engine.verifier_mut().sign(creator);
        engine.verifier_mut().sign(oracle);
        Self {
            engine,
            usdc,
            treasury,
            creator,
            oracle,
        }
    }

    fn create(&mut self, mut terms: MarketTerms) -> MarketKey {
        terms.collateral = self.usdc;
        self.engine
            .create_market(self.creator, &terms)
            .expect("market creation should succeed");
        terms.key()
    }

    fn wallet(&mut self, key: &MarketKey, funds: u64) -> Wallet {
        let owner = PrincipalId::new();
        let note_asset = self.engine.market(key).expect("market exists").note_asset_id;
        let ledger = self.engine.ledger_mut();
        let cash = ledger.open_new_account(self.usdc, owner).unwrap();
        let notes = ledger.open_new_account(note_asset, owner).unwrap();
        if funds > 0 {
            ledger.mint(self.usdc, cash, funds, self.treasury).unwrap();
        }
        self.engine.verifier_mut().sign(owner);
        Wallet { owner, cash, notes }
    }

    fn buy(&mut self, key: &MarketKey, w: Wallet, lots: u64) -> Result<DepositReceipt> {
        self.engine.deposit_and_mint(DepositRequest {
            market: *key,
            buyer: w.owner,
            lots,
            collateral_source: w.cash,
            note_destination: w.notes,
        })
    }

    fn redeem(&mut self, key: &MarketKey, w: Wallet) -> Result<RedemptionReceipt> {
        self.engine.redeem(RedeemRequest {
            market: *key,
            holder: w.owner,
            note_account: w.notes,
            payout_destination: w.cash,
        })
    }

    fn balance(&self, account: AccountId) -> u64 {
        self.engine.ledger().balance(account).unwrap()
    }
}

// =========================================================================
// Creation
// =========================================================================

#[test]
fn e2e_duplicate_market_keeps_first() {
    let mut desk = Desk::new();
    let terms = MarketTerms::dummy_call(100, NOTE_UNITS_PER_LOT);
    let key = desk.create(terms.clone());

    let mut clash = terms;
    clash.collateral = desk.usdc;
    clash.strike_price = 999;
    clash.side = OptionSide::Put;
    let err = desk.engine.create_market(desk.creator, &clash).unwrap_err();

    assert_eq!(err, OptescrowError::DuplicateMarket(key));
    let rec = desk.engine.market(&key).unwrap();
    assert_eq!(rec.strike_price, 100, "first record must be untouched");
    assert_eq!(rec.side, OptionSide::Call);
    assert_eq!(desk.engine.markets().len(), 1);
}

#[test]
fn e2e_invalid_terms_rejected() {
    let mut desk = Desk::new();
    let mut terms = MarketTerms::dummy_call(100, 1);
    terms.base = desk.usdc;
    terms.collateral = desk.usdc;
    let err = desk.engine.create_market(desk.creator, &terms).unwrap_err();
    assert!(matches!(err, OptescrowError::InvalidMarketTerms { .. }));
    assert!(desk.engine.markets().is_empty());
}

// =========================================================================
// Deposit
// =========================================================================

#[test]
fn e2e_deposit_credits_escrow_and_mints() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_put(100, 250));
    let alice = desk.wallet(&key, 10_000);
    let bob = desk.wallet(&key, 10_000);

    desk.buy(&key, alice, 4).unwrap();
    let receipt = desk.buy(&key, bob, 2).unwrap();

    assert_eq!(receipt.premium_paid, 500);
    assert_eq!(receipt.escrow_balance_after, 1_500);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), 1_500);
    assert_eq!(desk.engine.note_supply(&key).unwrap(), 1_500);
    assert_eq!(desk.balance(alice.notes), 1_000);
    assert_eq!(desk.balance(bob.notes), 500);
    assert_eq!(desk.balance(alice.cash), 9_000);

    let rec = desk.engine.market(&key).unwrap();
    assert_eq!(rec.settlement(), SettlementState::Open, "deposit never touches the record");
}

#[test]
fn e2e_insufficient_balance_mutates_nothing() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 300));
    let poor = desk.wallet(&key, 599);

    let err = desk.buy(&key, poor, 2).unwrap_err();

    assert_eq!(
        err,
        OptescrowError::InsufficientBalance {
            needed: 600,
            available: 599
        }
    );
    assert_eq!(desk.balance(poor.cash), 599);
    assert_eq!(desk.balance(poor.notes), 0);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), 0);
    assert_eq!(desk.engine.note_supply(&key).unwrap(), 0);
}

#[test]
fn e2e_premium_overflow() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, u64::MAX / 2 + 1));
    let w = desk.wallet(&key, u64::MAX);
    assert_eq!(desk.buy(&key, w, 2).unwrap_err(), OptescrowError::ArithmeticOverflow);
    assert_eq!(desk.balance(w.cash), u64::MAX);
}

#[test]
fn e2e_deposit_after_expiry_gated() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 10));
    let w = desk.wallet(&key, 1_000);

    desk.engine.clock_mut().set(3_599);
    desk.buy(&key, w, 1).unwrap();

    desk.engine.clock_mut().set(3_600);
    assert_eq!(
        desk.buy(&key, w, 1).unwrap_err(),
        OptescrowError::MarketExpired {
            expiry: 3_600,
            now: 3_600
        }
    );
    assert_eq!(desk.balance(w.cash), 990);
}

#[test]
fn e2e_deposit_after_settlement_gated() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 10));
    let w = desk.wallet(&key, 1_000);
    desk.engine.settle_as(desk.oracle, &key, 120).unwrap();

    assert!(matches!(
        desk.buy(&key, w, 1),
        Err(OptescrowError::MarketExpired { .. })
    ));
}

#[test]
fn e2e_ungated_deposits_any_time() {
    let config = EngineConfig {
        enforce_purchase_deadline: false,
        ..EngineConfig::default()
    };
    let mut desk = Desk::with_config(config);
    let key = desk.create(MarketTerms::dummy_call(100, 10));
    let w = desk.wallet(&key, 1_000);

    desk.engine.clock_mut().set(1_000_000);
    desk.buy(&key, w, 1).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 120).unwrap();
    desk.buy(&key, w, 1).unwrap();

    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), 20);
}

// =========================================================================
// Settlement
// =========================================================================

#[test]
fn e2e_settlement_is_one_shot() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 1));

    let first = desk.engine.settle_as(desk.oracle, &key, 150).unwrap();
    let second = desk.engine.settle_as(desk.oracle, &key, 90).unwrap();

    assert!(first.was_recorded());
    assert!(!second.was_recorded(), "repeat settlement is a silent no-op");
    assert_eq!(second.price().get(), 150);
    assert_eq!(desk.engine.market(&key).unwrap().expiry_price(), 150);
}

#[test]
fn e2e_zero_price_rejected() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_put(100, 1));
    assert_eq!(
        desk.engine.settle_as(desk.oracle, &key, 0),
        Err(OptescrowError::InvalidPrice { price: 0 })
    );
    assert!(!desk.engine.market(&key).unwrap().is_settled());
}

#[test]
fn e2e_untrusted_price_source_refused() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 1));

    let impostor = PrincipalId::new();
    desk.engine.verifier_mut().sign(impostor);
    assert_eq!(
        desk.engine.settle_as(impostor, &key, 150),
        Err(OptescrowError::Unauthorized { principal: impostor })
    );

    // Trusted but not signed in this transaction.
    desk.engine.verifier_mut().clear();
    assert!(desk.engine.settle_as(desk.oracle, &key, 150).is_err());
    assert!(!desk.engine.market(&key).unwrap().is_settled());
}

#[test]
fn e2e_concurrent_settlement_records_once() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 1));
    let oracle = desk.oracle;
    let engine = Arc::new(Mutex::new(desk.engine));

    let handles: Vec<_> = (1..=8u64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut engine = engine.lock().unwrap();
                engine.settle_as(oracle, &key, 100 + i).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<SettlementOutcome> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let recorded: Vec<_> = outcomes.iter().filter(|o| o.was_recorded()).collect();
    assert_eq!(recorded.len(), 1, "exactly one price must win");
    let winner = recorded[0].price();
    assert!(outcomes.iter().all(|o| o.price() == winner));
    assert_eq!(
        engine.lock().unwrap().market(&key).unwrap().expiry_price(),
        winner.get()
    );
}

// =========================================================================
// Redemption
// =========================================================================

#[test]
fn e2e_call_in_the_money() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, NOTE_UNITS_PER_LOT));
    let w = desk.wallet(&key, 2 * NOTE_UNITS_PER_LOT);
    desk.buy(&key, w, 2).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 150).unwrap();

    let receipt = desk.redeem(&key, w).unwrap();

    assert_eq!(receipt.profit, 100);
    assert_eq!(receipt.lots, 2);
    assert_eq!(receipt.notes_burned, 2 * NOTE_UNITS_PER_LOT);
    assert_eq!(desk.balance(w.notes), 0);
    assert_eq!(desk.balance(w.cash), 100);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), 2 * NOTE_UNITS_PER_LOT - 100);
    assert_eq!(desk.engine.note_supply(&key).unwrap(), 0);
}

#[test]
fn e2e_put_out_of_the_money_burns_notes() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_put(100, NOTE_UNITS_PER_LOT));
    let w = desk.wallet(&key, 3 * NOTE_UNITS_PER_LOT);
    desk.buy(&key, w, 3).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 150).unwrap();

    let receipt = desk.redeem(&key, w).unwrap();

    assert_eq!(receipt.profit, 0);
    assert_eq!(receipt.moneyness, Moneyness::OutOfTheMoney);
    assert_eq!(desk.balance(w.notes), 0, "notes burn even with no payout");
    assert_eq!(desk.balance(w.cash), 0);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), 3 * NOTE_UNITS_PER_LOT);
}

#[test]
fn e2e_redeem_before_settlement() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, NOTE_UNITS_PER_LOT));
    let w = desk.wallet(&key, NOTE_UNITS_PER_LOT);
    desk.buy(&key, w, 1).unwrap();

    assert_eq!(desk.redeem(&key, w).unwrap_err(), OptescrowError::NotSettled);
    assert_eq!(desk.balance(w.notes), NOTE_UNITS_PER_LOT);
}

#[test]
fn e2e_fractional_lot_balance_rejected() {
    let mut desk = Desk::new();
    // 1.5 lots of premium plus one minor unit of note.
    let key = desk.create(MarketTerms::dummy_call(100, 1_500_000_001));
    let w = desk.wallet(&key, 1_500_000_001);
    desk.buy(&key, w, 1).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 150).unwrap();

    let err = desk.redeem(&key, w).unwrap_err();
    assert_eq!(
        err,
        OptescrowError::InvalidNoteAmount {
            amount: 1_500_000_001,
            granularity: NOTE_UNITS_PER_LOT
        }
    );
    assert_eq!(desk.balance(w.notes), 1_500_000_001);
}

#[test]
fn e2e_amount_checked_before_settlement() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 7));
    let w = desk.wallet(&key, 7);
    desk.buy(&key, w, 1).unwrap();

    assert!(matches!(
        desk.redeem(&key, w),
        Err(OptescrowError::InvalidNoteAmount { .. })
    ));
}

#[test]
fn e2e_empty_note_account_redeems_nothing() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 7));
    let w = desk.wallet(&key, 0);

    assert_eq!(
        desk.redeem(&key, w).unwrap_err(),
        OptescrowError::NotSettled,
        "an open market refuses every redemption"
    );

    desk.engine.settle_as(desk.oracle, &key, 150).unwrap();
    let receipt = desk.redeem(&key, w).unwrap();
    assert_eq!(receipt.lots, 0);
    assert_eq!(receipt.profit, 0);
    assert_eq!(receipt.notes_burned, 0);
    assert_eq!(desk.balance(w.cash), 0);
    assert!(desk.engine.audit_market(&key).is_ok());
}

#[test]
fn e2e_second_redemption_pays_nothing() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, NOTE_UNITS_PER_LOT));
    let w = desk.wallet(&key, 2 * NOTE_UNITS_PER_LOT);
    desk.buy(&key, w, 2).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 150).unwrap();

    let first = desk.redeem(&key, w).unwrap();
    assert_eq!(first.profit, 100);
    let escrow_after_first = desk.engine.escrow_balance(&key).unwrap();

    let second = desk.redeem(&key, w).unwrap();
    assert_eq!(second.profit, 0, "burned notes cannot be redeemed again");
    assert_eq!(second.notes_burned, 0);
    assert_eq!(desk.balance(w.notes), 0);
    assert_eq!(desk.balance(w.cash), 100);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), escrow_after_first);
    assert!(desk.engine.audit_market(&key).is_ok());
}

#[test]
fn e2e_concurrent_redemptions_pay_once() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_put(100, NOTE_UNITS_PER_LOT));
    let w = desk.wallet(&key, 3 * NOTE_UNITS_PER_LOT);
    desk.buy(&key, w, 3).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 40).unwrap();
    let engine = Arc::new(Mutex::new(desk.engine));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut engine = engine.lock().unwrap();
                engine
                    .redeem(RedeemRequest {
                        market: key,
                        holder: w.owner,
                        note_account: w.notes,
                        payout_destination: w.cash,
                    })
                    .unwrap()
            })
        })
        .collect();
    let receipts: Vec<RedemptionReceipt> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let paying: Vec<_> = receipts.iter().filter(|r| r.profit > 0).collect();
    assert_eq!(paying.len(), 1, "exactly one redemption may pay");
    assert_eq!(paying[0].profit, 180);

    let engine = engine.lock().unwrap();
    assert_eq!(engine.ledger().balance(w.cash).unwrap(), 180);
    assert_eq!(
        engine.escrow_balance(&key).unwrap(),
        3 * NOTE_UNITS_PER_LOT - 180
    );
    assert!(engine.audit_market(&key).is_ok());
}

#[test]
fn e2e_underfunded_escrow_first_come_first_served() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, NOTE_UNITS_PER_LOT));
    let early = desk.wallet(&key, NOTE_UNITS_PER_LOT);
    let late = desk.wallet(&key, NOTE_UNITS_PER_LOT);
    desk.buy(&key, early, 1).unwrap();
    desk.buy(&key, late, 1).unwrap();

    // Profit per lot is 1.5 lots of premium: escrow covers only one holder.
    let price = 100 + NOTE_UNITS_PER_LOT + NOTE_UNITS_PER_LOT / 2;
    desk.engine.settle_as(desk.oracle, &key, price).unwrap();

    let report = desk.engine.audit_market(&key).unwrap();
    assert!(!report.is_fully_covered());
    assert_eq!(report.shortfall, Some(u128::from(NOTE_UNITS_PER_LOT)));

    let paid = desk.redeem(&key, early).unwrap();
    assert_eq!(paid.profit, NOTE_UNITS_PER_LOT + NOTE_UNITS_PER_LOT / 2);

    let err = desk.redeem(&key, late).unwrap_err();
    assert_eq!(
        err,
        OptescrowError::EscrowUnderfunded {
            needed: NOTE_UNITS_PER_LOT + NOTE_UNITS_PER_LOT / 2,
            available: NOTE_UNITS_PER_LOT / 2
        }
    );
    assert_eq!(desk.balance(late.notes), NOTE_UNITS_PER_LOT, "late notes untouched");
    assert_eq!(desk.balance(late.cash), 0);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), NOTE_UNITS_PER_LOT / 2);
    assert!(desk.engine.audit_market(&key).is_ok());
}

#[test]
fn e2e_custom_note_decimals() {
    let config = EngineConfig {
        note_decimals: 2,
        ..EngineConfig::default()
    };
    let mut desk = Desk::with_config(config);
    let key = desk.create(MarketTerms::dummy_put(500, 100));
    let w = desk.wallet(&key, 300);
    desk.buy(&key, w, 3).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 440).unwrap();

    let receipt = desk.redeem(&key, w).unwrap();
    assert_eq!(receipt.lots, 3);
    assert_eq!(receipt.profit, 180);
}

// =========================================================================
// Supply audit
// =========================================================================

#[test]
fn e2e_random_flows_conserve_supply() {
    let mut rng = StdRng::seed_from_u64(0x5EA0);
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_put(1_000, NOTE_UNITS_PER_LOT));

    let mut wallets = Vec::new();
    let mut premiums = 0u64;
    for _ in 0..12 {
        let w = desk.wallet(&key, 20 * NOTE_UNITS_PER_LOT);
        for _ in 0..rng.gen_range(1..=3) {
            let lots = rng.gen_range(1..=5u64);
            let receipt = desk.buy(&key, w, lots).unwrap();
            premiums += receipt.premium_paid;
            desk.engine.audit_market(&key).expect("audit after deposit");
        }
        wallets.push(w);
    }
    assert_eq!(desk.engine.note_supply(&key).unwrap(), premiums);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), premiums);

    let price = rng.gen_range(1..1_000u64);
    desk.engine.settle_as(desk.oracle, &key, price).unwrap();

    let mut payouts = 0u64;
    let mut burned = 0u64;
    for w in wallets.iter().filter(|_| rng.gen_bool(0.7)) {
        let receipt = desk.redeem(&key, *w).unwrap();
        payouts += receipt.profit;
        burned += receipt.notes_burned;
        desk.engine.audit_market(&key).expect("audit after redemption");
    }

    let flows = desk.engine.audit().flows(desk.engine.market(&key).unwrap().id);
    assert_eq!(flows.premiums_deposited, u128::from(premiums));
    assert_eq!(flows.payouts, u128::from(payouts));
    assert_eq!(desk.engine.note_supply(&key).unwrap(), premiums - burned);
    assert_eq!(desk.engine.escrow_balance(&key).unwrap(), premiums - payouts);
}

#[test]
fn e2e_escrow_inflow_outside_engine_detected() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, 10));
    let w = desk.wallet(&key, 1_000);
    desk.buy(&key, w, 1).unwrap();

    let escrow = desk.engine.market(&key).unwrap().escrow_ref;
    desk.engine
        .ledger_mut()
        .transfer(w.cash, escrow, 5, w.owner)
        .unwrap();

    assert!(matches!(
        desk.engine.audit_market(&key),
        Err(OptescrowError::SupplyInvariantViolation { .. })
    ));
}

#[test]
fn e2e_receipts_serialize() {
    let mut desk = Desk::new();
    let key = desk.create(MarketTerms::dummy_call(100, NOTE_UNITS_PER_LOT));
    let w = desk.wallet(&key, NOTE_UNITS_PER_LOT);
    let deposit = desk.buy(&key, w, 1).unwrap();
    desk.engine.settle_as(desk.oracle, &key, 101).unwrap();
    let redemption = desk.redeem(&key, w).unwrap();

    let json = serde_json::to_value(&deposit).unwrap();
    assert_eq!(json["lots"], 1);
    let json = serde_json::to_value(&redemption).unwrap();
    assert_eq!(json["profit"], 1);
    assert_eq!(json["expiry_price"], 101);

    let report = desk.engine.audit_market(&key).unwrap();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"outstanding_lots\":0"));
}
