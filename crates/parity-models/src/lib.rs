//! # Instrument & Quote Data Model
//!
//! Shared market-data types for the QuantParity monitor.
//!
//! ## Description
//! Defines the fixed-shape [`InstrumentQuote`] snapshot consumed by every
//! downstream component. The gateway owns quote production; the core only
//! ever reads these records.
//!
//! ## NaN Convention
//! Dynamic market fields (`last_price`, `bid_price`, `ask_price`,
//! `pre_settlement`, `pre_close`) are plain `f64` and may legitimately be
//! NaN when the venue has not published them. NaN flows through arithmetic
//! unchanged; decision code must guard comparisons explicitly. Fields that
//! are structurally optional rather than merely unquoted (`margin`,
//! `underlying_symbol`) are `Option`s.

mod quote;

pub use quote::{InsClass, InstrumentQuote, OptionClass};
