//! # Position Netting Coordinator
//!
//! Aggregates signed put-leg volumes across every strike of one underlying
//! into a single net target for the shared future leg.
//!
//! ## Invariant
//! After every applied signal, the future leg's target volume equals
//! `sum(put-leg volumes) / option_multiplier` exactly. The future target is
//! never set independently of the ledger; callers hold the per-underlying
//! lock across the whole ledger-update-and-recompute step.

use std::collections::HashMap;

use crate::signals::{ConfigError, Signal};

/// Target volumes for the three legs of one strike's position group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegTargets {
    pub call: i64,
    pub put: i64,
    /// Net target for the shared future leg across all strikes.
    pub future: i64,
}

/// Strike -> signed put-leg volume ledger for one underlying.
///
/// Strikes come from a single resolved ladder, so keying on the exact f64
/// bit pattern is stable.
#[derive(Debug)]
pub struct NettingBook {
    multiplier: i64,
    put_vols: HashMap<u64, i64>,
}

impl NettingBook {
    /// `multiplier` is the option-to-future lot-size ratio (e.g. 3 for an
    /// IO/IF pair). Must be positive.
    pub fn new(multiplier: i64) -> Result<Self, ConfigError> {
        if multiplier <= 0 {
            return Err(ConfigError::NonPositiveMultiplier(multiplier));
        }
        Ok(Self { multiplier, put_vols: HashMap::new() })
    }

    /// Record a pre-existing put-leg position at session start.
    pub fn seed(&mut self, strike: f64, put_volume: i64) {
        self.put_vols.insert(strike.to_bits(), put_volume);
    }

    /// Current put-leg volume recorded for a strike.
    pub fn put_volume(&self, strike: f64) -> i64 {
        self.put_vols.get(&strike.to_bits()).copied().unwrap_or(0)
    }

    /// Net future-leg target implied by the current ledger.
    pub fn future_target(&self) -> i64 {
        self.put_vols.values().sum::<i64>() / self.multiplier
    }

    /// Apply a non-Hold signal for one strike and return the three leg
    /// targets. Hold returns `None`: no change is issued for that strike.
    pub fn apply(&mut self, strike: f64, signal: Signal) -> Option<LegTargets> {
        let s = signal.value();
        if s == 0 {
            return None;
        }
        let call = s * self.multiplier;
        let put = -s * self.multiplier;
        self.put_vols.insert(strike.to_bits(), put);
        Some(LegTargets { call, put, future: self.future_target() })
    }
}
