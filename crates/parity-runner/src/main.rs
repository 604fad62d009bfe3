//! # Parity Monitor Runner
//!
//! Headless entry point for the put-call parity arbitrage monitor.
//!
//! ## Description
//! Reads a TOML configuration listing the underlyings to watch, builds the
//! market gateway, starts one arbitrage session per watch entry through the
//! session registry, and periodically exports captured parity evaluations
//! as JSON lines. The bundled demo feed drives the simulated gateway with a
//! random-walk future and parity-consistent option quotes, with occasional
//! injected dislocations so the monitor has something to flag.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Parser;
use parity_models::{InsClass, InstrumentQuote, OptionClass};
use parity_options::{
    ArbSession, ExpirySelector, MarketGateway, SessionConfig, SessionRegistry, SessionSpec,
    SimGateway,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Put-call parity arbitrage monitor.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the runner configuration file
    #[arg(long, default_value = "configs/demo.toml")]
    config: String,

    /// Directory for exported parity capture logs
    #[arg(long, default_value = "captures")]
    export_dir: PathBuf,

    /// Seconds between periodic capture exports
    #[arg(long, default_value = "60")]
    export_interval_secs: u64,
}

/// Root configuration schema for the monitor runner.
#[derive(Debug, Deserialize)]
struct RunnerConfig {
    /// Simulated feed settings; required until a live gateway lands.
    demo: DemoInfo,
    watch: Vec<WatchInfo>,
}

/// One underlying to monitor.
#[derive(Debug, Deserialize)]
struct WatchInfo {
    product_id: String,
    future_product_id: String,
    option_product_id: String,
    underlying_future_id: Option<String>,
    /// Expiry selection when the demo feed is not fixing the date.
    delivery_year: Option<i32>,
    delivery_month: Option<u32>,
    min_strike: Option<f64>,
    max_strike: Option<f64>,
    session: SessionConfig,
}

/// Synthetic universe and tick-generator settings.
#[derive(Debug, Deserialize)]
struct DemoInfo {
    future_id: String,
    product_id: String,
    base_price: f64,
    strike_step: f64,
    strike_count: usize,
    volume_multiple: f64,
    expiry_days: i64,
    tick_interval_ms: u64,
    /// Probability per tick of mispricing one option leg.
    #[serde(default = "default_dislocation")]
    dislocation_prob: f64,
}

fn default_dislocation() -> f64 {
    0.02
}

impl DemoInfo {
    fn strikes(&self) -> Vec<f64> {
        let first = self.base_price - self.strike_step * (self.strike_count as f64 / 2.0).floor();
        (0..self.strike_count)
            .map(|i| first + self.strike_step * i as f64)
            .collect()
    }

    /// Static instrument listing: one future plus a call and put per strike.
    fn universe(&self, now: DateTime<Utc>) -> Vec<InstrumentQuote> {
        let expiry = now + chrono::Duration::days(self.expiry_days);
        let mut fut = InstrumentQuote::blank(&self.future_id, &self.product_id, InsClass::Future);
        fut.expire_datetime = expiry;
        fut.volume_multiple = self.volume_multiple;
        fut.pre_settlement = self.base_price;
        fut.margin = Some(self.base_price * self.volume_multiple * 0.1);

        let mut quotes = vec![fut];
        for strike in self.strikes() {
            for class in [OptionClass::Call, OptionClass::Put] {
                let tag = if class == OptionClass::Call { "C" } else { "P" };
                let id = format!("{}{}{}", self.future_id, tag, strike);
                let mut q = InstrumentQuote::blank(&id, &self.product_id, InsClass::FutureOption);
                q.expire_datetime = expiry;
                q.strike_price = strike;
                q.option_class = class;
                q.underlying_symbol = Some(self.future_id.clone());
                q.volume_multiple = self.volume_multiple;
                // Settlement seeds the future-option margin formula.
                q.pre_settlement = intrinsic(class, self.base_price, strike).max(self.strike_step * 0.2);
                quotes.push(q);
            }
        }
        quotes
    }
}

fn intrinsic(class: OptionClass, future: f64, strike: f64) -> f64 {
    match class {
        OptionClass::Call => (future - strike).max(0.0),
        OptionClass::Put => (strike - future).max(0.0),
        OptionClass::None => 0.0,
    }
}

/// Random-walk tick generator over the demo universe.
async fn demo_feed(gateway: SimGateway, demo: DemoInfo) {
    let mut rng = StdRng::from_entropy();
    let strikes = demo.strikes();
    let mut price = demo.base_price;
    let spread = demo.strike_step * 0.02;
    let mut interval = tokio::time::interval(Duration::from_millis(demo.tick_interval_ms));
    info!(
        future = %demo.future_id,
        strikes = strikes.len(),
        "demo feed started"
    );
    loop {
        interval.tick().await;
        let ts = Utc::now();
        price += rng.gen_range(-1.0..1.0) * demo.strike_step * 0.05;

        let Some(mut fut) = gateway.quote(&demo.future_id).await else { return };
        fut.datetime = ts;
        fut.last_price = price;
        fut.bid_price = price - spread;
        fut.ask_price = price + spread;
        gateway.push_quote(fut);

        // A time-value haircut keeps the book parity-consistent, so the
        // monitor stays quiet between injected dislocations.
        let time_value = demo.strike_step * 0.3;
        let shock = rng.gen_bool(demo.dislocation_prob);
        let shocked = strikes[rng.gen_range(0..strikes.len())];
        for strike in &strikes {
            for class in [OptionClass::Call, OptionClass::Put] {
                let tag = if class == OptionClass::Call { "C" } else { "P" };
                let id = format!("{}{}{}", demo.future_id, tag, strike);
                let Some(mut q) = gateway.quote(&id).await else { continue };
                let mut fair = intrinsic(class, price, *strike) + time_value;
                if shock && *strike == shocked && class == OptionClass::Call {
                    fair *= 0.5;
                }
                q.datetime = ts;
                q.last_price = fair;
                q.bid_price = (fair - spread).max(0.0);
                q.ask_price = fair + spread;
                gateway.push_quote(q);
            }
        }
    }
}

async fn start_sessions(
    gateway: &Arc<dyn MarketGateway>,
    config: &RunnerConfig,
    demo_expiry: DateTime<Utc>,
    registry: &SessionRegistry,
) -> anyhow::Result<usize> {
    let mut started = 0;
    for watch in &config.watch {
        let selector = match (watch.delivery_year, watch.delivery_month) {
            (Some(year), Some(month)) => ExpirySelector::YearMonth { year, month },
            (None, None) => ExpirySelector::Date(demo_expiry),
            _ => bail!(
                "watch entry {}: delivery_year and delivery_month must be set together",
                watch.product_id
            ),
        };
        let spec = SessionSpec {
            product_id: watch.product_id.clone(),
            future_product_id: watch.future_product_id.clone(),
            option_product_id: watch.option_product_id.clone(),
            underlying_future_id: watch.underlying_future_id.clone(),
            selector,
            min_strike: watch.min_strike,
            max_strike: watch.max_strike,
        };
        match ArbSession::start(gateway.clone(), spec, watch.session.clone()).await {
            Ok(session) => {
                registry.insert(session);
                started += 1;
            }
            // One bad entry must not take the other watches down.
            Err(e) => error!(product = %watch.product_id, error = %e, "session failed to start"),
        }
    }
    Ok(started)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config_str = fs::read_to_string(&args.config)
        .with_context(|| format!("could not read config file {}", args.config))?;
    let config: RunnerConfig =
        toml::from_str(&config_str).with_context(|| format!("invalid config {}", args.config))?;
    for watch in &config.watch {
        watch
            .session
            .validate()
            .with_context(|| format!("watch entry {}", watch.product_id))?;
    }

    let now = Utc::now();
    let demo_expiry = now + chrono::Duration::days(config.demo.expiry_days);
    let sim = SimGateway::new(now);
    sim.load(config.demo.universe(now));
    let gateway: Arc<dyn MarketGateway> = Arc::new(sim.clone());

    let registry = SessionRegistry::new();
    let started = start_sessions(&gateway, &config, demo_expiry, &registry).await?;
    if started == 0 {
        bail!("no session started; nothing to monitor");
    }
    info!(sessions = started, "parity monitor running");

    let feed = tokio::spawn(demo_feed(sim, config.demo));

    let mut export = tokio::time::interval(Duration::from_secs(args.export_interval_secs.max(1)));
    export.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            _ = export.tick() => {
                match registry.export_all(&args.export_dir) {
                    Ok(rows) if rows > 0 => info!(rows, dir = %args.export_dir.display(), "capture export"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "capture export failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    feed.abort();
    registry.shutdown_all();
    if let Err(e) = registry.export_all(&args.export_dir) {
        warn!(error = %e, "final capture export failed");
    }
    Ok(())
}
