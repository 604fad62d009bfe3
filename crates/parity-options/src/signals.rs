//! # Decision Engine
//!
//! Turns one [`ParityResult`] into a discrete per-strike trade signal.
//!
//! ## Description
//! Stateless per evaluation: the signal depends only on the latest parity
//! snapshot and the configured thresholds, with no hysteresis. A later tick
//! can flip the signal immediately.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parity::ParityResult;

/// Per-strike trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Buy call, sell put, sell future.
    LongCall,
    /// Buy put, sell call, buy future.
    LongPut,
    /// No position change.
    Hold,
}

impl Signal {
    /// Signed direction: +1, -1, or 0.
    pub fn value(&self) -> i64 {
        match self {
            Signal::LongCall => 1,
            Signal::LongPut => -1,
            Signal::Hold => 0,
        }
    }
}

/// Invalid configuration detected at session setup. Fatal to that setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold `{0}` must be finite, got {1}")]
    NonFiniteThreshold(&'static str, f64),
    #[error("max_margin must be positive, got {0}")]
    NonPositiveMaxMargin(f64),
    #[error("option multiplier must be positive, got {0}")]
    NonPositiveMultiplier(i64),
    #[error("risk-free rate must be finite, got {0}")]
    NonFiniteRiskFree(f64),
}

/// Entry thresholds for the two directional strategies.
///
/// # Fields
/// * `long_call_threshold` - Enter long-call when `premium_call` drops below.
/// * `long_put_threshold` - Enter long-put when `premium_put` drops below.
/// * `return_threshold` - Alternative entry on annualized return.
/// * `max_margin` - Optional cost cap on the return-based entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    pub long_call_threshold: f64,
    pub long_put_threshold: f64,
    pub return_threshold: f64,
    #[serde(default)]
    pub max_margin: Option<f64>,
}

impl DecisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in [
            ("long_call_threshold", self.long_call_threshold),
            ("long_put_threshold", self.long_put_threshold),
            ("return_threshold", self.return_threshold),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::NonFiniteThreshold(name, v));
            }
        }
        if let Some(m) = self.max_margin {
            if !(m > 0.0) {
                return Err(ConfigError::NonPositiveMaxMargin(m));
            }
        }
        Ok(())
    }

    /// Evaluate the transition rule against one parity snapshot.
    ///
    /// The two entry conditions per side are ORed, and the `max_margin` cap
    /// gates only the return-based condition, not the premium-threshold
    /// one. Call side wins when both sides would fire. NaN inputs compare
    /// false and therefore never trigger an entry.
    pub fn decide(&self, res: &ParityResult) -> Signal {
        let call_margin_ok = self.max_margin.map_or(true, |m| res.long_call_cost < m);
        if res.premium_call < self.long_call_threshold
            || (res.long_call_return > self.return_threshold && call_margin_ok)
        {
            return Signal::LongCall;
        }
        let put_margin_ok = self.max_margin.map_or(true, |m| res.long_put_cost < m);
        if res.premium_put < self.long_put_threshold
            || (res.long_put_return > self.return_threshold && put_margin_ok)
        {
            return Signal::LongPut;
        }
        Signal::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quiet_result() -> ParityResult {
        ParityResult {
            ts: Utc::now(),
            strike: 100.0,
            premium_last: 0.5,
            premium_mid: 0.4,
            premium_call: 1.0,
            premium_put: 1.2,
            long_call_cost: 5000.0,
            long_call_return: 0.01,
            long_put_cost: 5000.0,
            long_put_return: 0.01,
            ttm: 0.2,
            risk_free: 0.0208,
        }
    }

    fn config() -> DecisionConfig {
        DecisionConfig {
            long_call_threshold: -100.0,
            long_put_threshold: -100.0,
            return_threshold: 0.1,
            max_margin: Some(4000.0),
        }
    }

    #[test]
    fn test_premium_entry_ignores_margin_cap() {
        // premium_call = -200 < -100 fires even though cost breaches the
        // cap and the return is tiny: the cap gates only the return branch.
        let mut res = quiet_result();
        res.premium_call = -200.0;
        res.long_call_cost = 1_000_000.0;
        res.long_call_return = 0.0;
        assert_eq!(config().decide(&res), Signal::LongCall);
    }

    #[test]
    fn test_return_entry_respects_margin_cap() {
        let mut res = quiet_result();
        res.long_call_return = 0.5;
        res.long_call_cost = 4500.0; // above cap
        assert_eq!(config().decide(&res), Signal::Hold);

        res.long_call_cost = 3500.0; // under cap
        assert_eq!(config().decide(&res), Signal::LongCall);

        // Unset cap admits any cost.
        let mut cfg = config();
        cfg.max_margin = None;
        res.long_call_cost = 1_000_000.0;
        assert_eq!(cfg.decide(&res), Signal::LongCall);
    }

    #[test]
    fn test_quiet_market_holds() {
        assert_eq!(config().decide(&quiet_result()), Signal::Hold);
    }

    #[test]
    fn test_put_side_mirror() {
        let mut res = quiet_result();
        res.premium_put = -150.0;
        assert_eq!(config().decide(&res), Signal::LongPut);

        let mut res = quiet_result();
        res.long_put_return = 0.5;
        res.long_put_cost = 3000.0;
        assert_eq!(config().decide(&res), Signal::LongPut);
    }

    #[test]
    fn test_call_side_wins_over_put() {
        let mut res = quiet_result();
        res.premium_call = -200.0;
        res.premium_put = -200.0;
        assert_eq!(config().decide(&res), Signal::LongCall);
    }

    #[test]
    fn test_nan_never_triggers() {
        let mut res = quiet_result();
        res.premium_call = f64::NAN;
        res.premium_put = f64::NAN;
        res.long_call_return = f64::NAN;
        res.long_put_return = f64::NAN;
        assert_eq!(config().decide(&res), Signal::Hold);
    }

    #[test]
    fn test_config_validation() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());
        cfg.return_threshold = f64::NAN;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonFiniteThreshold("return_threshold", _))
        ));
        let mut cfg = config();
        cfg.max_margin = Some(0.0);
        assert!(matches!(cfg.validate(), Err(ConfigError::NonPositiveMaxMargin(_))));
    }
}
