//! # Put-Call Parity Arbitrage Engine
//!
//! Continuous monitoring of option-future chains for put-call parity
//! violations, with per-strike entry decisions and delta-neutral hedge
//! netting.
//!
//! ## Description
//! The crate covers the quantitative and coordination core of the monitor:
//! chain resolution, margin-rate computation, parity-residual pricing, the
//! per-strike decision rule, and the netting of every strike's put leg into
//! one shared future hedge. Quote delivery, order execution, and the
//! evaluation clock are consumed through the [`gateway`] traits; a
//! simulated gateway backs tests and demos.
//!
//! ### Core Subsystems
//! - **Margin**: index-option and future-option margining regimes with a
//!   lazy per-instrument cache.
//! - **Chain**: matched future/option expiry dates and strike ladders.
//! - **Parity**: residuals under four price bases, implied risk-free
//!   rates, margin-based annualized returns.
//! - **Signals**: threshold rules turning a parity snapshot into a
//!   long-call-leg / long-put-leg / hold signal.
//! - **Netting**: per-underlying ledger keeping the shared future leg
//!   sized to the sum of all live put legs.
//! - **Watcher / Session**: one reactive task per strike, grouped into
//!   per-underlying sessions behind an explicit registry.

pub mod chain;
pub mod export;
pub mod gateway;
pub mod margin;
pub mod netting;
pub mod parity;
pub mod session;
pub mod sim;
pub mod signals;
mod watcher;

pub use chain::{ChainError, ExpirySelector, InstrumentChain, StrikeLadder, StrikePair};
pub use export::{ParityLog, ParityRecord};
pub use gateway::{LegController, MarketGateway, QuoteUpdate, QuoteUpdates};
pub use margin::{future_option_margin, index_option_margin, MarginCache};
pub use netting::{LegTargets, NettingBook};
pub use parity::{
    implied_risk_free, parity_residual, ImpliedRates, LegMargins, ParityResult,
    DEFAULT_RISK_FREE,
};
pub use session::{ArbSession, SessionConfig, SessionError, SessionRegistry, SessionSpec};
pub use signals::{ConfigError, DecisionConfig, Signal};
pub use sim::SimGateway;
