//! Configuration for the market engine.

use serde::{Deserialize, Serialize};

use crate::{OptescrowError, PrincipalId, Result, constants};

/// Engine-wide settings shared by every market it manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Decimals of the option-note asset. One lot is `10^note_decimals`
    /// note minor units.
    pub note_decimals: u8,
    /// Refuse purchases at or after `expiry_timestamp`, and into settled
    /// markets.
    pub enforce_purchase_deadline: bool,
    /// Principals trusted to report expiry prices.
    pub price_sources: Vec<PrincipalId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            note_decimals: constants::NOTE_DECIMALS,
            enforce_purchase_deadline: true,
            price_sources: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config and validate it.
    ///
    /// # Errors
    /// `Serialization` for malformed JSON, `Configuration` for bad values.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `Configuration` if `note_decimals` exceeds
    /// [`constants::MAX_NOTE_DECIMALS`].
    pub fn validate(&self) -> Result<()> {
        if self.note_decimals > constants::MAX_NOTE_DECIMALS {
            return Err(OptescrowError::Configuration(format!(
                "note_decimals {} exceeds maximum {}",
                self.note_decimals,
                constants::MAX_NOTE_DECIMALS
            )));
        }
        Ok(())
    }

    /// Note minor units per lot. Saturates for out-of-range decimals;
    /// call [`EngineConfig::validate`] first.
    #[must_use]
    pub fn note_units_per_lot(&self) -> u64 {
        10u64
            .checked_pow(u32::from(self.note_decimals))
            .unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn with_price_source(mut self, source: PrincipalId) -> Self {
        self.price_sources.push(source);
        self
    }
}
