//! # Option Margin Model
//!
//! Per-contract margin requirement under the two exchange margining regimes.
//!
//! ## Description
//! Pure, stateless formulas plus a lazy [`MarginCache`]. Index options
//! (CFFEX style) and future options (commodity style) are margined
//! differently; both formulas are reproduced exactly at double precision,
//! including the reference-price asymmetry of the index regime.
//!
//! ## NaN Semantics
//! An undecidable margin (missing prior settlement, unknown regime) is NaN,
//! never an error. Callers must check before comparing against limits.

use std::collections::HashMap;

use parity_models::{InsClass, InstrumentQuote, OptionClass};
use tracing::debug;

/// Exchange margin adjustment factor for index options.
pub const DEFAULT_ADJ_FACTOR: f64 = 0.1;
/// Minimum risk coverage factor for index options.
pub const DEFAULT_MIN_RISK_FACTOR: f64 = 0.5;

/// Per-contract margin for an index option (CFFEX-style).
///
/// Out-of-the-money amount is `max(strike - pre_close, 0)` for a call and
/// `max(pre_close - strike, 0)` for a put. The minimum-risk floor references
/// `pre_close` for calls but `strike` for puts; the asymmetry is the
/// exchange's published rule and is kept as-is.
pub fn index_option_margin(
    side: OptionClass,
    strike: f64,
    pre_settle: f64,
    pre_close: f64,
    multiplier: f64,
    adj_factor: f64,
    min_risk_factor: f64,
) -> f64 {
    match side {
        OptionClass::Call => {
            let otm = (strike - pre_close).max(0.0);
            multiplier
                * (pre_settle
                    + (pre_close * adj_factor - otm).max(min_risk_factor * pre_close * adj_factor))
        }
        OptionClass::Put => {
            let otm = (pre_close - strike).max(0.0);
            multiplier
                * (pre_settle
                    + (pre_close * adj_factor - otm).max(min_risk_factor * strike * adj_factor))
        }
        OptionClass::None => f64::NAN,
    }
}

/// Per-contract margin for a commodity future option.
///
/// Short-option margin is the larger of:
/// 1. settlement x multiplier + future margin - 0.5 x OTM amount
/// 2. settlement x multiplier + 0.5 x future margin
///
/// Returns NaN when the prior settlement is zero or NaN; the value is
/// undecidable until the venue publishes a settlement.
pub fn future_option_margin(
    side: OptionClass,
    strike: f64,
    pre_settle: f64,
    multiplier: f64,
    future_margin: f64,
) -> f64 {
    if pre_settle == 0.0 || pre_settle.is_nan() {
        return f64::NAN;
    }
    let otm = match side {
        OptionClass::Call => (strike - pre_settle).max(0.0) * multiplier,
        OptionClass::Put => (pre_settle - strike).max(0.0) * multiplier,
        OptionClass::None => return f64::NAN,
    };
    pre_settle * multiplier + (future_margin - 0.5 * otm).max(0.5 * future_margin)
}

/// Lazily populated instrument-id -> margin map.
///
/// Resolution order per lookup:
/// 1. a previously cached positive rate,
/// 2. the quote's own `margin` field when present and positive,
/// 3. the index-option formula for products margined under that regime,
/// 4. the future-option formula for `FutureOption` instruments (needs the
///    underlying future's margin, supplied by the caller),
/// 5. otherwise the quote's margin field or NaN.
///
/// Once a positive rate is cached, later lookups never recompute it, even
/// if the prices that produced it have moved.
#[derive(Debug, Default)]
pub struct MarginCache {
    /// Product ids margined under the index-option regime (e.g. "IO_o").
    index_products: Vec<String>,
    rates: HashMap<String, f64>,
}

impl MarginCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that applies the index-option regime to the given product ids.
    pub fn with_index_products<I, S>(products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index_products: products.into_iter().map(Into::into).collect(),
            rates: HashMap::new(),
        }
    }

    /// Margin for one instrument. `underlying_margin` is the margin of the
    /// underlying future and is only consulted for future options.
    pub fn lookup(&mut self, quote: &InstrumentQuote, underlying_margin: Option<f64>) -> f64 {
        if let Some(rate) = self.rates.get(&quote.instrument_id) {
            if *rate > 0.0 {
                return *rate;
            }
        }
        if let Some(m) = quote.margin {
            if m > 0.0 {
                self.rates.insert(quote.instrument_id.clone(), m);
                return m;
            }
        }
        if self.index_products.contains(&quote.product_id) {
            let rate = index_option_margin(
                quote.option_class,
                quote.strike_price,
                quote.pre_settlement,
                quote.pre_close,
                quote.volume_multiple,
                DEFAULT_ADJ_FACTOR,
                DEFAULT_MIN_RISK_FACTOR,
            );
            self.store(&quote.instrument_id, rate);
            return rate;
        }
        if quote.ins_class == InsClass::FutureOption {
            let rate = future_option_margin(
                quote.option_class,
                quote.strike_price,
                quote.pre_settlement,
                quote.volume_multiple,
                underlying_margin.unwrap_or(f64::NAN),
            );
            self.store(&quote.instrument_id, rate);
            return rate;
        }
        debug!(instrument = %quote.instrument_id, "no margin regime for instrument");
        quote.margin.unwrap_or(f64::NAN)
    }

    /// Only positive rates are pinned; NaN results stay recomputable.
    fn store(&mut self, instrument_id: &str, rate: f64) {
        if rate > 0.0 {
            self.rates.insert(instrument_id.to_string(), rate);
        }
    }
}
