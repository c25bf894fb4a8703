//! Time source and the purchase deadline gate.
//!
//! Premium purchases are refused once a market reaches its expiry timestamp
//! or has been settled. The gate can be switched off through
//! [`EngineConfig::enforce_purchase_deadline`](optescrow_types::EngineConfig),
//! in which case deposits are accepted at any time.

use optescrow_types::{MarketRecord, OptescrowError, Result};

/// Unix-seconds time source injected into the engine.
pub trait Clock {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualClock {
    now: i64,
}

impl ManualClock {
    #[must_use]
    pub fn at(now: i64) -> Self {
        Self { now }
    }

    pub fn set(&mut self, now: i64) {
        self.now = now;
    }

    pub fn advance(&mut self, secs: i64) {
        self.now = self.now.saturating_add(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now
    }
}

/// Deadline gate applied to every premium purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseGate {
    enforce: bool,
}

impl PurchaseGate {
    #[must_use]
    pub fn new(enforce: bool) -> Self {
        Self { enforce }
    }

    #[must_use]
    pub fn is_enforced(&self) -> bool {
        self.enforce
    }

    /// Whether `market` still sells notes at `now`.
    #[must_use]
    pub fn purchases_allowed(&self, market: &MarketRecord, now: i64) -> bool {
        !self.enforce || (now < market.expiry_timestamp && !market.is_settled())
    }

    /// Guard a purchase attempt.
    ///
    /// # Errors
    /// [`OptescrowError::MarketExpired`] when the gate is enforced and the
    /// market has reached expiry or is already settled.
    pub fn check(&self, market: &MarketRecord, now: i64) -> Result<()> {
        if self.purchases_allowed(market, now) {
            Ok(())
        } else {
            Err(OptescrowError::MarketExpired {
                expiry: market.expiry_timestamp,
                now,
            })
        }
    }
}

impl Default for PurchaseGate {
    fn default() -> Self {
        Self::new(true)
    }
}
