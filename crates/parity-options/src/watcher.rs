//! # Quote-Reaction Loop
//!
//! One reactive task per (underlying, strike) pair.
//!
//! ## Description
//! Each watcher subscribes to its three legs (future, call, put) and
//! re-runs the margin -> parity -> decision pipeline whenever any leg's
//! quote timestamp advances. When trading is enabled and a signal fires,
//! the ledger update and the three target-volume pushes happen inside one
//! critical section on the per-underlying netting book, so the shared
//! future leg can never observe a half-applied hedge.
//!
//! The task terminates when the gateway closes the update stream (session
//! teardown); a pipeline step is the unit of cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use parity_models::InstrumentQuote;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::export::{ParityLog, ParityRecord};
use crate::gateway::{LegController, MarketGateway};
use crate::margin::MarginCache;
use crate::netting::NettingBook;
use crate::parity::{parity_residual, LegMargins};
use crate::session::SessionConfig;
use crate::signals::Signal;

/// The three leg controllers owned by one strike's watcher.
pub(crate) struct StrikeLegs {
    pub future: Arc<dyn LegController>,
    pub call: Arc<dyn LegController>,
    pub put: Arc<dyn LegController>,
}

pub(crate) struct StrikeWatcher {
    pub gateway: Arc<dyn MarketGateway>,
    pub future_id: String,
    pub call_id: String,
    pub put_id: String,
    pub strike: f64,
    pub config: Arc<SessionConfig>,
    pub margins: Arc<Mutex<MarginCache>>,
    pub book: Arc<Mutex<NettingBook>>,
    pub log: Arc<ParityLog>,
    pub legs: StrikeLegs,
}

impl StrikeWatcher {
    pub(crate) async fn run(self) {
        let ids = [
            self.future_id.clone(),
            self.call_id.clone(),
            self.put_id.clone(),
        ];
        let mut updates = self.gateway.register_update_notify(&ids);
        let mut last_seen: HashMap<String, DateTime<Utc>> = HashMap::new();
        debug!(
            future = %self.future_id,
            strike = self.strike,
            "strike watcher subscribed"
        );
        loop {
            match updates.recv().await {
                Ok(update) => {
                    if !ids.contains(&update.instrument_id) {
                        continue;
                    }
                    // Re-evaluate only when the leg's tick timestamp moved.
                    if last_seen.get(&update.instrument_id) == Some(&update.datetime) {
                        continue;
                    }
                    last_seen.insert(update.instrument_id, update.datetime);
                    self.evaluate().await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        strike = self.strike,
                        skipped, "update stream lagged; re-evaluating"
                    );
                    self.evaluate().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(strike = self.strike, "strike watcher stopped");
    }

    /// One full pipeline pass for this strike.
    async fn evaluate(&self) {
        let Some(future) = self.gateway.quote(&self.future_id).await else {
            warn!(instrument = %self.future_id, "future quote unavailable");
            return;
        };
        let Some(call) = self.gateway.quote(&self.call_id).await else {
            warn!(instrument = %self.call_id, "call quote unavailable");
            return;
        };
        let Some(put) = self.gateway.quote(&self.put_id).await else {
            warn!(instrument = %self.put_id, "put quote unavailable");
            return;
        };

        let margins = self.leg_margins(&future, &call, &put);
        let res = parity_residual(
            &future,
            self.strike,
            &call,
            &put,
            self.config.risk_free,
            &margins,
        );

        let threshold = self.config.decision.return_threshold;
        if res.long_call_return > threshold || res.long_put_return > threshold {
            info!(
                future = %self.future_id,
                strike = self.strike,
                long_call_return = res.long_call_return,
                long_put_return = res.long_put_return,
                premium_call = res.premium_call,
                premium_put = res.premium_put,
                "annualized parity return above threshold"
            );
        }
        if self.config.capture {
            self.log.append(ParityRecord::capture(&res, &future, &call, &put));
        }

        let signal = self.config.decision.decide(&res);
        if !self.config.can_trade || signal == Signal::Hold {
            return;
        }
        // Ledger write and all three target pushes form one atomic step.
        let book = &mut *self.book.lock().expect("netting book lock");
        if let Some(targets) = book.apply(self.strike, signal) {
            info!(
                strike = self.strike,
                ?signal,
                call = targets.call,
                put = targets.put,
                future = targets.future,
                "issuing leg targets"
            );
            self.legs.call.set_target_volume(targets.call);
            self.legs.put.set_target_volume(targets.put);
            self.legs.future.set_target_volume(targets.future);
        }
    }

    fn leg_margins(
        &self,
        future: &InstrumentQuote,
        call: &InstrumentQuote,
        put: &InstrumentQuote,
    ) -> LegMargins {
        let cache = &mut *self.margins.lock().expect("margin cache lock");
        LegMargins {
            future: cache.lookup(future, None),
            call: cache.lookup(call, future.margin),
            put: cache.lookup(put, future.margin),
        }
    }
}
