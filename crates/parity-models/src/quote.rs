//! Immutable-per-tick quote snapshot of one tradable instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instrument classification as published by the venue metadata feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsClass {
    /// Outright future.
    Future,
    /// Exchange-traded option on an index or equity.
    Option,
    /// Option whose underlying is a future contract.
    FutureOption,
}

/// Option right, or `None` for non-option instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptionClass {
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "PUT")]
    Put,
    /// The instrument is not an option (venues publish an empty string).
    #[default]
    #[serde(rename = "")]
    None,
}

impl OptionClass {
    /// True for `Call` and `Put`; distinguishes options from their
    /// underlying future inside a mixed product listing.
    pub fn is_option(&self) -> bool {
        !matches!(self, OptionClass::None)
    }
}

/// Snapshot of one instrument at one tick.
///
/// # Fields
/// * `instrument_id` - Venue-unique contract id (e.g., "CZCE.SR105C5200").
/// * `underlying_symbol` - Underlying future id for future options; absent
///   for index options on some venues.
/// * `product_id` - Product family the contract belongs to.
/// * `datetime` - Timestamp of the latest tick for this instrument.
/// * `margin` - Per-contract margin requirement when the venue quotes one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentQuote {
    pub instrument_id: String,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_symbol: Option<String>,
    pub ins_class: InsClass,
    #[serde(default)]
    pub option_class: OptionClass,

    // Static contract terms.
    pub strike_price: f64,
    pub volume_multiple: f64,
    pub expire_datetime: DateTime<Utc>,
    pub delivery_year: i32,
    pub delivery_month: u32,
    pub expired: bool,

    // Dynamic market fields. Any may be NaN.
    pub datetime: DateTime<Utc>,
    pub last_price: f64,
    pub bid_price: f64,
    pub ask_price: f64,
    pub pre_settlement: f64,
    pub pre_close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
}

impl InstrumentQuote {
    /// Blank snapshot with all market fields unset (NaN) and epoch
    /// timestamps. Intended for gateway implementations and tests that
    /// fill fields incrementally.
    pub fn blank(instrument_id: &str, product_id: &str, ins_class: InsClass) -> Self {
        Self {
            instrument_id: instrument_id.to_string(),
            product_id: product_id.to_string(),
            underlying_symbol: None,
            ins_class,
            option_class: OptionClass::None,
            strike_price: f64::NAN,
            volume_multiple: 1.0,
            expire_datetime: DateTime::<Utc>::UNIX_EPOCH,
            delivery_year: 1970,
            delivery_month: 1,
            expired: false,
            datetime: DateTime::<Utc>::UNIX_EPOCH,
            last_price: f64::NAN,
            bid_price: f64::NAN,
            ask_price: f64::NAN,
            pre_settlement: f64::NAN,
            pre_close: f64::NAN,
            margin: None,
        }
    }

    /// Midpoint of the current bid/ask. NaN when either side is unquoted.
    pub fn mid(&self) -> f64 {
        (self.ask_price + self.bid_price) / 2.0
    }

    /// True when this record is an option leg rather than a future.
    pub fn is_option(&self) -> bool {
        self.option_class.is_option()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_class_roundtrip() {
        let json = serde_json::to_string(&OptionClass::Call).unwrap();
        assert_eq!(json, "\"CALL\"");
        let none: OptionClass = serde_json::from_str("\"\"").unwrap();
        assert_eq!(none, OptionClass::None);
        assert!(!none.is_option());
    }

    #[test]
    fn test_mid_propagates_nan() {
        let mut q = InstrumentQuote::blank("TEST.F1", "F", InsClass::Future);
        assert!(q.mid().is_nan());
        q.bid_price = 99.0;
        q.ask_price = 101.0;
        assert_eq!(q.mid(), 100.0);
    }
}
