//! # Market Gateway Interface
//!
//! The narrow contract the core consumes from the market-data-and-execution
//! layer.
//!
//! ## Description
//! Quote delivery, order execution, fill tracking, and the evaluation clock
//! all live behind these traits. The core never talks to a venue directly
//! and never reads the wall clock: backtest and live gateways differ only
//! in what they return from [`MarketGateway::now`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parity_models::InstrumentQuote;
use tokio::sync::broadcast;

/// Notification that a watched instrument's quote timestamp advanced.
#[derive(Debug, Clone)]
pub struct QuoteUpdate {
    pub instrument_id: String,
    pub datetime: DateTime<Utc>,
}

/// Subscription handle yielded by [`MarketGateway::register_update_notify`].
/// Dropping the receiver releases the subscription.
pub type QuoteUpdates = broadcast::Receiver<QuoteUpdate>;

/// Target-volume controller for a single leg. The gateway owns volume
/// tracking and order placement; the core only states the desired net
/// position.
pub trait LegController: Send + Sync {
    fn instrument_id(&self) -> &str;
    /// Desired signed net position for this instrument. The gateway works
    /// the order book until the live position converges.
    fn set_target_volume(&self, volume: i64);
}

/// Market-data-and-execution gateway consumed by the core.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Latest snapshot for one instrument, if listed.
    async fn quote(&self, instrument_id: &str) -> Option<InstrumentQuote>;

    /// Bulk listing used for chain resolution.
    async fn list_quotes(&self) -> Vec<InstrumentQuote>;

    /// Signed net position currently held in one instrument.
    async fn position(&self, instrument_id: &str) -> i64;

    /// Subscribe to quote-update notifications. The stream is hub-wide;
    /// subscribers filter on the instrument ids they watch.
    fn register_update_notify(&self, instrument_ids: &[String]) -> QuoteUpdates;

    /// Leg controller for one instrument.
    fn leg_controller(&self, instrument_id: &str) -> Arc<dyn LegController>;

    /// Current evaluation instant (wall clock live, simulated in backtest).
    fn now(&self) -> DateTime<Utc>;
}
