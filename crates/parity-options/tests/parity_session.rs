//! End-to-end session tests over the simulated gateway: chain resolution,
//! quote-reaction, decision, and hedge netting across strikes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parity_models::{InsClass, InstrumentQuote, OptionClass};
use parity_options::{
    DecisionConfig, ExpirySelector, MarketGateway, SessionConfig, SessionSpec, SimGateway,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, 1, 9, 30, 0).unwrap()
}

fn expiry() -> DateTime<Utc> {
    t0() + chrono::Duration::days(37)
}

fn future(id: &str) -> InstrumentQuote {
    let mut q = InstrumentQuote::blank(id, "SR", InsClass::Future);
    q.expire_datetime = expiry();
    q.delivery_year = 2021;
    q.delivery_month = 4;
    q.volume_multiple = 1.0;
    q.margin = Some(500.0);
    q
}

fn option(id: &str, strike: f64, class: OptionClass, underlying: &str) -> InstrumentQuote {
    let mut q = InstrumentQuote::blank(id, "SR", InsClass::FutureOption);
    q.expire_datetime = expiry();
    q.delivery_year = 2021;
    q.delivery_month = 4;
    q.strike_price = strike;
    q.option_class = class;
    q.underlying_symbol = Some(underlying.to_string());
    q.volume_multiple = 1.0;
    q.margin = Some(300.0);
    q
}

fn with_prices(mut q: InstrumentQuote, ts: DateTime<Utc>, last: f64, bid: f64, ask: f64) -> InstrumentQuote {
    q.datetime = ts;
    q.last_price = last;
    q.bid_price = bid;
    q.ask_price = ask;
    q
}

fn universe(future_id: &str, strikes: &[f64]) -> Vec<InstrumentQuote> {
    let mut v = vec![future(future_id)];
    for k in strikes {
        v.push(option(&format!("{future_id}C{k}"), *k, OptionClass::Call, future_id));
        v.push(option(&format!("{future_id}P{k}"), *k, OptionClass::Put, future_id));
    }
    v
}

fn spec(product: &str) -> SessionSpec {
    SessionSpec {
        product_id: product.to_string(),
        future_product_id: "SR".to_string(),
        option_product_id: "SR".to_string(),
        underlying_future_id: None,
        selector: ExpirySelector::Date(expiry()),
        min_strike: None,
        max_strike: None,
    }
}

fn config(multiplier: i64, can_trade: bool) -> SessionConfig {
    SessionConfig {
        option_multiplier: multiplier,
        can_trade,
        capture: true,
        risk_free: 0.02,
        decision: DecisionConfig {
            long_call_threshold: -1.0,
            long_put_threshold: -1.0,
            return_threshold: 10.0,
            max_margin: None,
        },
        index_margin_products: Vec::new(),
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fair_market_issues_no_targets() {
    let gw = SimGateway::new(t0());
    gw.load(universe("CZCE.SR105", &[100.0]));
    let gateway: Arc<dyn MarketGateway> = Arc::new(gw.clone());

    let session = parity_options::ArbSession::start(gateway, spec("SR"), config(1, true))
        .await
        .unwrap();
    assert_eq!(session.future_id, "CZCE.SR105");
    settle().await;

    // Future 99/101, call 3/4, put 2/3 at strike 100: the long-call
    // residual is ~+3, so nothing fires on either side.
    let ts = t0() + chrono::Duration::seconds(1);
    gw.push_quote(with_prices(future("CZCE.SR105"), ts, 100.0, 99.0, 101.0));
    gw.push_quote(with_prices(
        option("CZCE.SR105C100", 100.0, OptionClass::Call, "CZCE.SR105"),
        ts,
        3.5,
        3.0,
        4.0,
    ));
    gw.push_quote(with_prices(
        option("CZCE.SR105P100", 100.0, OptionClass::Put, "CZCE.SR105"),
        ts,
        2.5,
        2.0,
        3.0,
    ));
    settle().await;

    for id in ["CZCE.SR105", "CZCE.SR105C100", "CZCE.SR105P100"] {
        assert!(
            gw.recording_leg(id).history().is_empty(),
            "unexpected targets for {id}"
        );
    }
    // Evaluations were still captured for offline analysis.
    assert!(!session.parity_log().is_empty());
    let rows = session.parity_log().snapshot();
    let last = rows.last().unwrap();
    assert!(last.premium_call.unwrap() > 0.0);

    session.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_signals_net_into_shared_future_leg() {
    let gw = SimGateway::new(t0());
    gw.load(universe("CZCE.SR105", &[5200.0, 5300.0]));
    let gateway: Arc<dyn MarketGateway> = Arc::new(gw.clone());

    let session = parity_options::ArbSession::start(gateway, spec("SR"), config(3, true))
        .await
        .unwrap();
    assert_eq!(session.strikes(), &[5200.0, 5300.0]);
    settle().await;

    let ts = t0() + chrono::Duration::seconds(1);
    gw.push_quote(with_prices(future("CZCE.SR105"), ts, 5250.5, 5250.0, 5251.0));
    // Strike 5200: call ask far below parity -> long-call entry.
    gw.push_quote(with_prices(
        option("CZCE.SR105C5200", 5200.0, OptionClass::Call, "CZCE.SR105"),
        ts,
        39.8,
        39.5,
        40.0,
    ));
    gw.push_quote(with_prices(
        option("CZCE.SR105P5200", 5200.0, OptionClass::Put, "CZCE.SR105"),
        ts,
        0.6,
        0.5,
        0.7,
    ));
    // Strike 5300: put ask far below parity -> long-put entry.
    gw.push_quote(with_prices(
        option("CZCE.SR105C5300", 5300.0, OptionClass::Call, "CZCE.SR105"),
        ts,
        2.2,
        2.0,
        2.5,
    ));
    gw.push_quote(with_prices(
        option("CZCE.SR105P5300", 5300.0, OptionClass::Put, "CZCE.SR105"),
        ts,
        44.5,
        44.0,
        45.0,
    ));
    settle().await;

    assert_eq!(gw.recording_leg("CZCE.SR105C5200").last_target(), Some(3));
    assert_eq!(gw.recording_leg("CZCE.SR105P5200").last_target(), Some(-3));
    assert_eq!(gw.recording_leg("CZCE.SR105C5300").last_target(), Some(-3));
    assert_eq!(gw.recording_leg("CZCE.SR105P5300").last_target(), Some(3));
    // Put legs -3 and +3 net to zero future exposure.
    assert_eq!(gw.recording_leg("CZCE.SR105").last_target(), Some(0));
    assert_eq!(session.future_target(), 0);

    // Replaying the same ticks leaves every target unchanged.
    let ts2 = ts + chrono::Duration::seconds(1);
    gw.push_quote(with_prices(future("CZCE.SR105"), ts2, 5250.5, 5250.0, 5251.0));
    settle().await;
    assert_eq!(gw.recording_leg("CZCE.SR105").last_target(), Some(0));
    assert_eq!(session.future_target(), 0);

    session.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_observation_only_when_trading_disabled() {
    let gw = SimGateway::new(t0());
    gw.load(universe("CZCE.SR105", &[5200.0]));
    let gateway: Arc<dyn MarketGateway> = Arc::new(gw.clone());

    let session = parity_options::ArbSession::start(gateway, spec("SR"), config(3, false))
        .await
        .unwrap();
    settle().await;

    let ts = t0() + chrono::Duration::seconds(1);
    gw.push_quote(with_prices(future("CZCE.SR105"), ts, 5250.5, 5250.0, 5251.0));
    gw.push_quote(with_prices(
        option("CZCE.SR105C5200", 5200.0, OptionClass::Call, "CZCE.SR105"),
        ts,
        39.8,
        39.5,
        40.0,
    ));
    gw.push_quote(with_prices(
        option("CZCE.SR105P5200", 5200.0, OptionClass::Put, "CZCE.SR105"),
        ts,
        0.6,
        0.5,
        0.7,
    ));
    settle().await;

    // Signal fires but is observational: no leg ever receives a target.
    assert!(gw.recording_leg("CZCE.SR105C5200").history().is_empty());
    assert!(gw.recording_leg("CZCE.SR105").history().is_empty());
    assert!(!session.parity_log().is_empty());

    session.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_existing_put_position_seeds_future_target() {
    let gw = SimGateway::new(t0());
    gw.load(universe("CZCE.SR105", &[5200.0, 5300.0]));
    gw.set_position("CZCE.SR105P5200", -3);
    let gateway: Arc<dyn MarketGateway> = Arc::new(gw.clone());

    let session = parity_options::ArbSession::start(gateway, spec("SR"), config(3, true))
        .await
        .unwrap();
    // Pre-existing short put at 5200 implies a -1 future hedge before any
    // tick arrives.
    assert_eq!(session.future_target(), -1);

    session.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_setup_fails_on_empty_chain() {
    let gw = SimGateway::new(t0());
    gw.load(vec![future("CZCE.SR105")]); // no options listed
    let gateway: Arc<dyn MarketGateway> = Arc::new(gw);

    let err = parity_options::ArbSession::start(gateway, spec("SR"), config(1, true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        parity_options::SessionError::Chain(parity_options::ChainError::NoMatchingOptions(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_setup_fails_on_invalid_config() {
    let gw = SimGateway::new(t0());
    gw.load(universe("CZCE.SR105", &[5200.0]));
    let gateway: Arc<dyn MarketGateway> = Arc::new(gw);

    let mut cfg = config(1, true);
    cfg.option_multiplier = 0;
    let err = parity_options::ArbSession::start(gateway, spec("SR"), cfg)
        .await
        .unwrap_err();
    assert!(matches!(err, parity_options::SessionError::Config(_)));
}
