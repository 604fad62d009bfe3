//! # Instrument Chain Resolver
//!
//! Maps one underlying future onto its option strike ladders.
//!
//! ## Description
//! Built once at session setup from a bulk quote listing. Computes the set
//! of expiry dates shared by the future and its options, and resolves
//! (expiry, strike) -> {future id, call id, put id} triples. Resolution of
//! an empty chain is a hard error; the caller must never trade a ladder it
//! could not fully resolve.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use parity_models::{InsClass, InstrumentQuote};
use thiserror::Error;
use tracing::debug;

/// Chain resolution failures. Fatal to the setup call that hit them.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Zero option quotes matched the product/expiry filter.
    #[error("no option quotes match filter: {0}")]
    NoMatchingOptions(String),
    /// No future delivers on the requested expiry and no option carried an
    /// underlying symbol.
    #[error("no future delivers on {0}")]
    NoMatchingFuture(DateTime<Utc>),
    /// A strike is missing its call or put side.
    #[error("strike {strike} has no {side} quote")]
    IncompleteStrike { strike: f64, side: &'static str },
}

/// How to pick the expiry when resolving a strike ladder.
#[derive(Debug, Clone, Copy)]
pub enum ExpirySelector {
    /// Exact expiry timestamp.
    Date(DateTime<Utc>),
    /// Delivery year and month, when the exact timestamp is not known.
    YearMonth { year: i32, month: u32 },
}

/// One rung of a strike ladder: the ids of the matched call and put.
#[derive(Debug, Clone)]
pub struct StrikePair {
    pub strike: f64,
    pub call_id: String,
    pub put_id: String,
}

/// Resolved ladder for one expiry: the underlying future id plus the
/// ascending strike rungs.
#[derive(Debug, Clone)]
pub struct StrikeLadder {
    pub future_id: String,
    pub pairs: Vec<StrikePair>,
}

/// Matched future/option universe for one underlying.
///
/// Immutable after construction; rebuild explicitly if the listing changes.
#[derive(Debug)]
pub struct InstrumentChain {
    futures: Vec<InstrumentQuote>,
    options: Vec<InstrumentQuote>,
    /// Expiry dates present on both the future and the option side, ascending.
    pub matched_dates: Vec<DateTime<Utc>>,
    /// All option expiry dates, ascending.
    pub option_expiries: Vec<DateTime<Utc>>,
}

impl InstrumentChain {
    /// Resolve by product ids: all non-expired futures of
    /// `future_product_id` against all non-expired options of
    /// `option_product_id` (including the venue's derived `{id}C` / `{id}P`
    /// call/put product listings).
    ///
    /// `now` is the evaluation instant supplied by the gateway; quotes whose
    /// expiry is not strictly after it are discarded.
    pub fn from_products(
        quotes: &[InstrumentQuote],
        now: DateTime<Utc>,
        future_product_id: &str,
        option_product_id: &str,
    ) -> Result<Self, ChainError> {
        let opt_products = [
            option_product_id.to_string(),
            format!("{option_product_id}C"),
            format!("{option_product_id}P"),
        ];
        let futures: Vec<InstrumentQuote> = quotes
            .iter()
            .filter(|q| live(q, now) && q.product_id == future_product_id && !q.is_option())
            .cloned()
            .collect();
        let options: Vec<InstrumentQuote> = quotes
            .iter()
            .filter(|q| live(q, now) && opt_products.contains(&q.product_id) && q.is_option())
            .cloned()
            .collect();
        Self::build(futures, options, option_product_id)
    }

    /// Resolve by an explicit underlying future id: the single future quote
    /// against every future option written on it.
    pub fn from_underlying(
        quotes: &[InstrumentQuote],
        future: InstrumentQuote,
        underlying_future_id: &str,
    ) -> Result<Self, ChainError> {
        let options: Vec<InstrumentQuote> = quotes
            .iter()
            .filter(|q| {
                q.ins_class == InsClass::FutureOption
                    && q.underlying_symbol.as_deref() == Some(underlying_future_id)
            })
            .cloned()
            .collect();
        Self::build(vec![future], options, underlying_future_id)
    }

    fn build(
        futures: Vec<InstrumentQuote>,
        options: Vec<InstrumentQuote>,
        filter_label: &str,
    ) -> Result<Self, ChainError> {
        if options.is_empty() {
            return Err(ChainError::NoMatchingOptions(filter_label.to_string()));
        }
        let delivery: BTreeSet<DateTime<Utc>> =
            futures.iter().map(|q| q.expire_datetime).collect();
        let expiries: BTreeSet<DateTime<Utc>> =
            options.iter().map(|q| q.expire_datetime).collect();
        let matched: Vec<DateTime<Utc>> =
            delivery.intersection(&expiries).copied().collect();
        debug!(
            futures = futures.len(),
            options = options.len(),
            matched = matched.len(),
            "instrument chain resolved"
        );
        Ok(Self {
            futures,
            options,
            matched_dates: matched,
            option_expiries: expiries.into_iter().collect(),
        })
    }

    /// Option instrument ids expiring at `expiry`.
    pub fn opt_symbols(&self, expiry: DateTime<Utc>) -> Vec<String> {
        self.options
            .iter()
            .filter(|q| q.expire_datetime == expiry)
            .map(|q| q.instrument_id.clone())
            .collect()
    }

    /// Resolve the strike ladder for one expiry, optionally restricted to a
    /// `[min_strike, max_strike]` band.
    ///
    /// The underlying future id is taken from the options' own
    /// `underlying_symbol`; when the venue leaves that blank, it falls back
    /// to the future whose delivery date equals the requested expiry.
    pub fn future_opt_symbols(
        &self,
        selector: ExpirySelector,
        min_strike: Option<f64>,
        max_strike: Option<f64>,
    ) -> Result<StrikeLadder, ChainError> {
        let selected: Vec<&InstrumentQuote> = self
            .options
            .iter()
            .filter(|q| match selector {
                ExpirySelector::Date(d) => q.expire_datetime == d,
                ExpirySelector::YearMonth { year, month } => {
                    q.delivery_year == year && q.delivery_month == month
                }
            })
            .collect();
        if selected.is_empty() {
            return Err(ChainError::NoMatchingOptions(format!("{selector:?}")));
        }

        let mut strikes: Vec<f64> = selected.iter().map(|q| q.strike_price).collect();
        strikes.sort_by(|a, b| a.total_cmp(b));
        strikes.dedup();
        if let Some(lo) = min_strike {
            strikes.retain(|k| *k >= lo);
        }
        if let Some(hi) = max_strike {
            strikes.retain(|k| *k <= hi);
        }

        let future_id = self.resolve_future_id(&selected)?;
        let mut pairs = Vec::with_capacity(strikes.len());
        for strike in strikes {
            let side = |want: parity_models::OptionClass| {
                selected
                    .iter()
                    .find(|q| q.strike_price == strike && q.option_class == want)
                    .map(|q| q.instrument_id.clone())
            };
            let call_id = side(parity_models::OptionClass::Call)
                .ok_or(ChainError::IncompleteStrike { strike, side: "call" })?;
            let put_id = side(parity_models::OptionClass::Put)
                .ok_or(ChainError::IncompleteStrike { strike, side: "put" })?;
            pairs.push(StrikePair { strike, call_id, put_id });
        }
        Ok(StrikeLadder { future_id, pairs })
    }

    fn resolve_future_id(&self, selected: &[&InstrumentQuote]) -> Result<String, ChainError> {
        let first = selected[0];
        if let Some(sym) = first.underlying_symbol.as_deref() {
            if !sym.is_empty() {
                return Ok(sym.to_string());
            }
        }
        self.futures
            .iter()
            .find(|f| f.expire_datetime == first.expire_datetime)
            .map(|f| f.instrument_id.clone())
            .ok_or(ChainError::NoMatchingFuture(first.expire_datetime))
    }
}

fn live(q: &InstrumentQuote, now: DateTime<Utc>) -> bool {
    !q.expired && q.expire_datetime > now
}
