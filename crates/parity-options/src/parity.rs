//! # Parity Pricer
//!
//! Put-call parity residuals and implied risk-free rates for one
//! (future, strike, call, put) tuple.
//!
//! ## Description
//! The theoretical forward-parity spread is
//! `(F - K) * exp(-ttm * r)`; each residual is the observed call-put price
//! difference minus that spread, under four price bases:
//!
//! - `last`  - last-trade prices on all three legs
//! - `mid`   - bid/ask midpoints
//! - `call`  - aggressive long-call crossing (call ask, put bid, future bid)
//! - `put`   - aggressive long-put crossing, sign-mirrored
//!
//! ## NaN Semantics
//! Every computation is plain f64 arithmetic; an unquoted input surfaces as
//! NaN in the output, never as an error. The decision layer guards all
//! comparisons.

use chrono::{DateTime, Utc};
use parity_models::InstrumentQuote;
use serde::{Deserialize, Serialize};

/// Default risk-free rate used when none is configured.
pub const DEFAULT_RISK_FREE: f64 = 0.0208;

/// Margin inputs for the two directional strategies, resolved by the caller
/// through the [`crate::margin::MarginCache`].
#[derive(Debug, Clone, Copy)]
pub struct LegMargins {
    pub future: f64,
    pub call: f64,
    pub put: f64,
}

/// One parity evaluation snapshot.
///
/// `premium_call < 0` marks a theoretical edge for the long-call /
/// short-put / short-future combination; `premium_put < 0` marks the
/// mirror. Returns are annualized against the margin-based cost and floored
/// at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParityResult {
    /// Observation instant (the future quote's tick timestamp).
    pub ts: DateTime<Utc>,
    pub strike: f64,
    pub premium_last: f64,
    pub premium_mid: f64,
    pub premium_call: f64,
    pub premium_put: f64,
    pub long_call_cost: f64,
    pub long_call_return: f64,
    pub long_put_cost: f64,
    pub long_put_return: f64,
    /// Time to maturity in years (calendar days / 365).
    pub ttm: f64,
    pub risk_free: f64,
}

/// Implied risk-free rates solved from the parity equation under the four
/// price bases. NaN where the log argument is non-positive ("no implied
/// rate available").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImpliedRates {
    pub last: f64,
    pub mid: f64,
    pub long_call: f64,
    pub short_call: f64,
}

/// Compute the four parity residuals and the two directional
/// cost/return figures.
pub fn parity_residual(
    future: &InstrumentQuote,
    strike: f64,
    call: &InstrumentQuote,
    put: &InstrumentQuote,
    risk_free: f64,
    margins: &LegMargins,
) -> ParityResult {
    let ttm = (future.expire_datetime - future.datetime).num_days() as f64 / 365.0;
    let disc = (-ttm * risk_free).exp();

    let premium_last =
        call.last_price - put.last_price - (future.last_price - strike) * disc;
    let premium_mid = call.mid() - put.mid() - (future.mid() - strike) * disc;

    let premium_call =
        call.ask_price - put.bid_price - (future.bid_price - strike) * disc;
    let long_call_cost =
        call.bid_price * call.volume_multiple + margins.put + margins.future;
    let long_call_return =
        (-premium_call * call.volume_multiple / long_call_cost).max(0.0) / ttm;

    let premium_put =
        -(call.bid_price - put.ask_price - (future.ask_price - strike) * disc);
    let long_put_cost =
        put.bid_price * put.volume_multiple + margins.call + margins.future;
    let long_put_return =
        (-premium_put * put.volume_multiple / long_put_cost).max(0.0) / ttm;

    ParityResult {
        ts: future.datetime,
        strike,
        premium_last,
        premium_mid,
        premium_call,
        premium_put,
        long_call_cost,
        long_call_return,
        long_put_cost,
        long_put_return,
        ttm,
        risk_free,
    }
}

/// Solve the parity equation for the rate instead of the residual.
///
/// Closed form per basis: `r = -ln(diff / (fwd - strike)) * 365 / days`,
/// with `days` counted from the option expiry against the future quote's
/// tick timestamp. Diagnostic only; never gates trading.
pub fn implied_risk_free(
    future: &InstrumentQuote,
    strike: f64,
    call: &InstrumentQuote,
    put: &InstrumentQuote,
) -> ImpliedRates {
    let days = (call.expire_datetime - future.datetime).num_days() as f64;
    let solve = |diff: f64, fwd: f64| -> f64 {
        let arg = diff / (fwd - strike);
        if arg > 0.0 {
            -arg.ln() * 365.0 / days
        } else {
            f64::NAN
        }
    };
    ImpliedRates {
        last: solve(call.last_price - put.last_price, future.last_price),
        mid: solve(call.mid() - put.mid(), future.mid()),
        long_call: solve(call.ask_price - put.bid_price, future.bid_price),
        short_call: solve(call.bid_price - put.ask_price, future.ask_price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parity_models::{InsClass, OptionClass};

    const TOL: f64 = 1e-9;

    fn fixture(days_out: i64) -> (InstrumentQuote, InstrumentQuote, InstrumentQuote) {
        let now = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();
        let expiry = now + chrono::Duration::days(days_out);

        let mut future = InstrumentQuote::blank("SIM.F1", "F", InsClass::Future);
        future.datetime = now;
        future.expire_datetime = expiry;
        future.volume_multiple = 1.0;

        let mut call = InstrumentQuote::blank("SIM.F1C100", "F_o", InsClass::FutureOption);
        call.option_class = OptionClass::Call;
        call.strike_price = 100.0;
        call.datetime = now;
        call.expire_datetime = expiry;
        call.volume_multiple = 1.0;

        let mut put = call.clone();
        put.instrument_id = "SIM.F1P100".to_string();
        put.option_class = OptionClass::Put;

        (future, call, put)
    }

    fn flat_margins() -> LegMargins {
        LegMargins { future: 500.0, call: 300.0, put: 300.0 }
    }

    #[test]
    fn test_residual_zero_on_synthetic_parity() {
        let (mut future, mut call, mut put) = fixture(73);
        let rf: f64 = 0.02;
        let ttm: f64 = 73.0 / 365.0;
        let disc = (-ttm * rf).exp();

        // Choose prices that satisfy parity exactly on every basis.
        future.last_price = 105.0;
        future.bid_price = 105.0;
        future.ask_price = 105.0;
        call.last_price = 8.0;
        call.bid_price = 8.0;
        call.ask_price = 8.0;
        let put_px = 8.0 - (105.0 - 100.0) * disc;
        put.last_price = put_px;
        put.bid_price = put_px;
        put.ask_price = put_px;

        let res = parity_residual(&future, 100.0, &call, &put, rf, &flat_margins());
        assert!(res.premium_last.abs() < TOL);
        assert!(res.premium_mid.abs() < TOL);
        assert!(res.premium_call.abs() < TOL);
        assert!(res.premium_put.abs() < TOL);
        // No edge on either side means both returns floor at zero.
        assert_eq!(res.long_call_return, 0.0);
        assert_eq!(res.long_put_return, 0.0);
    }

    #[test]
    fn test_implied_rate_round_trips() {
        let (mut future, mut call, mut put) = fixture(73);
        future.last_price = 105.0;
        future.bid_price = 104.0;
        future.ask_price = 106.0;
        call.last_price = 8.0;
        call.bid_price = 7.5;
        call.ask_price = 8.5;
        put.last_price = 3.5;
        put.bid_price = 3.0;
        put.ask_price = 4.0;

        let rates = implied_risk_free(&future, 100.0, &call, &put);
        assert!(rates.last.is_finite());

        // Feeding the solved rate back zeroes the matching residual.
        let res = parity_residual(
            &future,
            100.0,
            &call,
            &put,
            rates.last,
            &flat_margins(),
        );
        assert!(res.premium_last.abs() < TOL, "residual {}", res.premium_last);
    }

    #[test]
    fn test_implied_rate_undefined_on_nonpositive_log() {
        let (mut future, mut call, mut put) = fixture(73);
        // call - put negative while forward spread positive.
        future.last_price = 105.0;
        call.last_price = 2.0;
        put.last_price = 6.0;
        let rates = implied_risk_free(&future, 100.0, &call, &put);
        assert!(rates.last.is_nan());
    }

    #[test]
    fn test_unquoted_leg_propagates_nan_with_zero_floor() {
        let (mut future, call, mut put) = fixture(73);
        // Future quoted, options never traded today.
        future.last_price = 105.0;
        future.bid_price = 104.0;
        future.ask_price = 106.0;
        put.ask_price = 4.0;

        let res = parity_residual(&future, 100.0, &call, &put, 0.02, &flat_margins());
        assert!(res.premium_call.is_nan());
        assert!(res.premium_last.is_nan());
        // NaN edge must not manufacture a positive return.
        assert_eq!(res.long_call_return, 0.0);
    }

    #[test]
    fn test_positive_call_edge_yields_positive_return() {
        let (mut future, mut call, mut put) = fixture(73);
        future.bid_price = 105.0;
        future.ask_price = 105.5;
        future.last_price = 105.2;
        // Call ask far below parity: premium_call strongly negative.
        call.bid_price = 3.0;
        call.ask_price = 3.2;
        call.last_price = 3.1;
        put.bid_price = 3.0;
        put.ask_price = 3.2;
        put.last_price = 3.1;

        let res = parity_residual(&future, 100.0, &call, &put, 0.02, &flat_margins());
        assert!(res.premium_call < 0.0);
        assert!(res.long_call_return > 0.0);
        assert_eq!(
            res.long_call_cost,
            3.0 * 1.0 + flat_margins().put + flat_margins().future
        );
    }
}
