//! # Simulated Gateway
//!
//! In-process [`MarketGateway`] over a hand-fed quote store.
//!
//! ## Description
//! Drives unit and integration tests and the runner's demo mode: quotes are
//! pushed by the test or feed task, each push advances the simulated clock
//! and fans a [`QuoteUpdate`] out to subscribers. Leg controllers record
//! the full target-volume history so tests can assert on issued hedges.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parity_models::InstrumentQuote;
use tokio::sync::broadcast;
use tracing::trace;

use crate::gateway::{LegController, MarketGateway, QuoteUpdate, QuoteUpdates};

/// Leg controller that records every issued target volume.
#[derive(Debug)]
pub struct RecordingLeg {
    instrument_id: String,
    targets: Mutex<Vec<i64>>,
}

impl RecordingLeg {
    fn new(instrument_id: &str) -> Self {
        Self { instrument_id: instrument_id.to_string(), targets: Mutex::new(Vec::new()) }
    }

    /// Full history of issued targets, oldest first.
    pub fn history(&self) -> Vec<i64> {
        self.targets.lock().expect("leg history lock").clone()
    }

    /// Most recent target, or None if none was ever issued.
    pub fn last_target(&self) -> Option<i64> {
        self.targets.lock().expect("leg history lock").last().copied()
    }
}

impl LegController for RecordingLeg {
    fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    fn set_target_volume(&self, volume: i64) {
        trace!(instrument = %self.instrument_id, volume, "target volume");
        self.targets.lock().expect("leg history lock").push(volume);
    }
}

struct SimState {
    quotes: Mutex<HashMap<String, InstrumentQuote>>,
    positions: Mutex<HashMap<String, i64>>,
    legs: Mutex<HashMap<String, Arc<RecordingLeg>>>,
    now: Mutex<DateTime<Utc>>,
    hub: broadcast::Sender<QuoteUpdate>,
}

/// Cloneable handle to the simulated gateway state.
#[derive(Clone)]
pub struct SimGateway {
    state: Arc<SimState>,
}

impl SimGateway {
    pub fn new(start: DateTime<Utc>) -> Self {
        let (hub, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(SimState {
                quotes: Mutex::new(HashMap::new()),
                positions: Mutex::new(HashMap::new()),
                legs: Mutex::new(HashMap::new()),
                now: Mutex::new(start),
                hub,
            }),
        }
    }

    /// Insert or replace instrument listings without notifying subscribers.
    /// Used to seed the static universe before sessions start.
    pub fn load(&self, quotes: impl IntoIterator<Item = InstrumentQuote>) {
        let mut map = self.state.quotes.lock().expect("quote store lock");
        for q in quotes {
            map.insert(q.instrument_id.clone(), q);
        }
    }

    /// Publish a fresh tick: replaces the stored snapshot, advances the
    /// simulated clock to the tick timestamp, and notifies subscribers.
    pub fn push_quote(&self, quote: InstrumentQuote) {
        let update = QuoteUpdate {
            instrument_id: quote.instrument_id.clone(),
            datetime: quote.datetime,
        };
        {
            let mut now = self.state.now.lock().expect("sim clock lock");
            if quote.datetime > *now {
                *now = quote.datetime;
            }
        }
        self.state
            .quotes
            .lock()
            .expect("quote store lock")
            .insert(quote.instrument_id.clone(), quote);
        // Send fails only when no subscriber exists yet; ticks before the
        // first subscription are simply unobserved.
        let _ = self.state.hub.send(update);
    }

    /// Seed a pre-existing signed position.
    pub fn set_position(&self, instrument_id: &str, pos: i64) {
        self.state
            .positions
            .lock()
            .expect("position store lock")
            .insert(instrument_id.to_string(), pos);
    }

    /// The recording controller for an instrument, creating it on first use.
    pub fn recording_leg(&self, instrument_id: &str) -> Arc<RecordingLeg> {
        self.state
            .legs
            .lock()
            .expect("leg store lock")
            .entry(instrument_id.to_string())
            .or_insert_with(|| Arc::new(RecordingLeg::new(instrument_id)))
            .clone()
    }
}

#[async_trait]
impl MarketGateway for SimGateway {
    async fn quote(&self, instrument_id: &str) -> Option<InstrumentQuote> {
        self.state
            .quotes
            .lock()
            .expect("quote store lock")
            .get(instrument_id)
            .cloned()
    }

    async fn list_quotes(&self) -> Vec<InstrumentQuote> {
        self.state
            .quotes
            .lock()
            .expect("quote store lock")
            .values()
            .cloned()
            .collect()
    }

    async fn position(&self, instrument_id: &str) -> i64 {
        self.state
            .positions
            .lock()
            .expect("position store lock")
            .get(instrument_id)
            .copied()
            .unwrap_or(0)
    }

    fn register_update_notify(&self, _instrument_ids: &[String]) -> QuoteUpdates {
        self.state.hub.subscribe()
    }

    fn leg_controller(&self, instrument_id: &str) -> Arc<dyn LegController> {
        self.recording_leg(instrument_id)
    }

    fn now(&self) -> DateTime<Utc> {
        *self.state.now.lock().expect("sim clock lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parity_models::InsClass;

    #[tokio::test]
    async fn test_push_notifies_and_advances_clock() {
        let start = Utc.with_ymd_and_hms(2021, 3, 1, 9, 0, 0).unwrap();
        let gw = SimGateway::new(start);
        let mut sub = gw.register_update_notify(&[]);

        let mut q = InstrumentQuote::blank("SIM.F1", "F", InsClass::Future);
        q.datetime = start + chrono::Duration::seconds(30);
        q.last_price = 100.0;
        gw.push_quote(q);

        let update = sub.recv().await.unwrap();
        assert_eq!(update.instrument_id, "SIM.F1");
        assert_eq!(gw.now(), start + chrono::Duration::seconds(30));
        assert_eq!(gw.quote("SIM.F1").await.unwrap().last_price, 100.0);
    }

    #[tokio::test]
    async fn test_recording_leg_history() {
        let gw = SimGateway::new(Utc::now());
        let leg = gw.leg_controller("SIM.F1");
        leg.set_target_volume(2);
        leg.set_target_volume(-1);
        let rec = gw.recording_leg("SIM.F1");
        assert_eq!(rec.history(), vec![2, -1]);
        assert_eq!(rec.last_target(), Some(-1));
    }
}
