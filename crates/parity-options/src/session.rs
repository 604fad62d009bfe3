//! # Arbitrage Session & Registry
//!
//! Per-underlying orchestration: chain resolution, ledger seeding, watcher
//! spawning, and the explicit cross-session registry.
//!
//! ## Description
//! A session owns everything tied to one underlying future: the validated
//! configuration, the shared netting book and margin cache, the capture
//! log, and one watcher task per strike. The registry replaces any ambient
//! process-wide session map: the orchestrator owns it and passes it by
//! reference to whoever needs cross-session enumeration.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chain::{ChainError, ExpirySelector, InstrumentChain, StrikeLadder};
use crate::export::ParityLog;
use crate::gateway::MarketGateway;
use crate::margin::MarginCache;
use crate::netting::NettingBook;
use crate::parity::DEFAULT_RISK_FREE;
use crate::signals::{ConfigError, DecisionConfig};
use crate::watcher::{StrikeLegs, StrikeWatcher};

/// Session setup failures. Fatal to this session only; other sessions and
/// the process keep running.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("quote not listed on gateway: {0}")]
    MissingQuote(String),
}

/// Validated-once session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Option-to-future lot-size ratio (e.g. 3 for an IO/IF pair).
    pub option_multiplier: i64,
    /// When false, evaluations are observational only.
    pub can_trade: bool,
    /// When true, every evaluation is appended to the parity log.
    pub capture: bool,
    #[serde(default = "default_risk_free")]
    pub risk_free: f64,
    pub decision: DecisionConfig,
    /// Product ids margined under the index-option regime.
    #[serde(default)]
    pub index_margin_products: Vec<String>,
}

fn default_risk_free() -> f64 {
    DEFAULT_RISK_FREE
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.option_multiplier <= 0 {
            return Err(ConfigError::NonPositiveMultiplier(self.option_multiplier));
        }
        if !self.risk_free.is_finite() {
            return Err(ConfigError::NonFiniteRiskFree(self.risk_free));
        }
        self.decision.validate()
    }
}

/// What to monitor: the instrument universe and the expiry/strike slice.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Registry key, conventionally the future's product id.
    pub product_id: String,
    /// Product-id based universe (future product + option product)...
    pub future_product_id: String,
    pub option_product_id: String,
    /// ...or an explicit underlying future id, which takes precedence.
    pub underlying_future_id: Option<String>,
    pub selector: ExpirySelector,
    pub min_strike: Option<f64>,
    pub max_strike: Option<f64>,
}

/// One underlying's live monitoring session.
#[derive(Debug)]
pub struct ArbSession {
    pub product_id: String,
    pub future_id: String,
    config: Arc<SessionConfig>,
    book: Arc<Mutex<NettingBook>>,
    log: Arc<ParityLog>,
    strikes: Vec<f64>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ArbSession {
    /// Resolve the chain, seed the ledger from existing put positions, and
    /// spawn one watcher per strike.
    pub async fn start(
        gateway: Arc<dyn MarketGateway>,
        spec: SessionSpec,
        config: SessionConfig,
    ) -> Result<Arc<Self>, SessionError> {
        config.validate()?;
        let ladder = Self::resolve_ladder(&gateway, &spec).await?;
        info!(
            product = %spec.product_id,
            future = %ladder.future_id,
            strikes = ladder.pairs.len(),
            can_trade = config.can_trade,
            "starting parity session"
        );

        let config = Arc::new(config);
        let mut book = NettingBook::new(config.option_multiplier)?;
        for pair in &ladder.pairs {
            let pos = gateway.position(&pair.put_id).await;
            if pos != 0 {
                info!(put = %pair.put_id, pos, "seeding ledger from existing position");
            }
            book.seed(pair.strike, pos);
        }
        let book = Arc::new(Mutex::new(book));
        let log = Arc::new(ParityLog::new());
        let margins = Arc::new(Mutex::new(MarginCache::with_index_products(
            config.index_margin_products.clone(),
        )));

        let mut tasks = Vec::with_capacity(ladder.pairs.len());
        let future_leg = gateway.leg_controller(&ladder.future_id);
        for pair in &ladder.pairs {
            let watcher = StrikeWatcher {
                gateway: gateway.clone(),
                future_id: ladder.future_id.clone(),
                call_id: pair.call_id.clone(),
                put_id: pair.put_id.clone(),
                strike: pair.strike,
                config: config.clone(),
                margins: margins.clone(),
                book: book.clone(),
                log: log.clone(),
                legs: StrikeLegs {
                    future: future_leg.clone(),
                    call: gateway.leg_controller(&pair.call_id),
                    put: gateway.leg_controller(&pair.put_id),
                },
            };
            tasks.push(tokio::spawn(watcher.run()));
        }

        Ok(Arc::new(Self {
            product_id: spec.product_id,
            future_id: ladder.future_id,
            config,
            book,
            log,
            strikes: ladder.pairs.iter().map(|p| p.strike).collect(),
            tasks: Mutex::new(tasks),
        }))
    }

    async fn resolve_ladder(
        gateway: &Arc<dyn MarketGateway>,
        spec: &SessionSpec,
    ) -> Result<StrikeLadder, SessionError> {
        let quotes = gateway.list_quotes().await;
        let chain = match &spec.underlying_future_id {
            Some(id) => {
                let future = gateway
                    .quote(id)
                    .await
                    .ok_or_else(|| SessionError::MissingQuote(id.clone()))?;
                InstrumentChain::from_underlying(&quotes, future, id)?
            }
            None => InstrumentChain::from_products(
                &quotes,
                gateway.now(),
                &spec.future_product_id,
                &spec.option_product_id,
            )?,
        };
        Ok(chain.future_opt_symbols(spec.selector, spec.min_strike, spec.max_strike)?)
    }

    /// Strikes monitored by this session, ascending.
    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    /// Current net future-leg target implied by the ledger.
    pub fn future_target(&self) -> i64 {
        self.book.lock().expect("netting book lock").future_target()
    }

    pub fn capture_enabled(&self) -> bool {
        self.config.capture
    }

    pub fn parity_log(&self) -> Arc<ParityLog> {
        self.log.clone()
    }

    /// Abort all watcher tasks. Evaluations in flight complete their
    /// pipeline step first (the netting lock is never held across awaits).
    pub fn shutdown(&self) {
        let tasks = self.tasks.lock().expect("session task lock");
        for task in tasks.iter() {
            task.abort();
        }
        info!(product = %self.product_id, "parity session stopped");
    }
}

/// Explicit registry of active sessions, keyed by product id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<ArbSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<ArbSession>) {
        let mut map = self.sessions.lock().expect("registry lock");
        if let Some(old) = map.insert(session.product_id.clone(), session) {
            warn!(product = %old.product_id, "replacing session already registered");
            old.shutdown();
        }
    }

    pub fn get(&self, product_id: &str) -> Option<Arc<ArbSession>> {
        self.sessions.lock().expect("registry lock").get(product_id).cloned()
    }

    /// Snapshot of all registered sessions.
    pub fn sessions(&self) -> Vec<Arc<ArbSession>> {
        self.sessions.lock().expect("registry lock").values().cloned().collect()
    }

    /// Write every capturing session's log to `dir/{product_id}.jsonl`.
    pub fn export_all(&self, dir: &Path) -> std::io::Result<usize> {
        std::fs::create_dir_all(dir)?;
        let mut rows = 0;
        for session in self.sessions() {
            if !session.capture_enabled() || session.parity_log().is_empty() {
                continue;
            }
            let path = dir.join(format!("{}.jsonl", session.product_id));
            rows += session.parity_log().write_jsonl(&path)?;
            info!(product = %session.product_id, path = %path.display(), "parity log exported");
        }
        Ok(rows)
    }

    pub fn shutdown_all(&self) {
        for session in self.sessions() {
            session.shutdown();
        }
    }
}
