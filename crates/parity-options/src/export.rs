//! # Parity Capture Log
//!
//! Append-only store of parity evaluations for offline analysis.
//!
//! ## Description
//! When a session runs with capture enabled, every evaluation appends one
//! [`ParityRecord`] row: the parity figures plus the raw per-leg quote
//! snapshot that produced them. Rows export as JSON lines. Correctness of
//! the trading pipeline never depends on this log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use parity_models::InstrumentQuote;
use serde::{Deserialize, Serialize};

use crate::parity::ParityResult;

/// NaN-safe field copy: sentinel NaN becomes an absent column.
fn opt(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

/// One captured evaluation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParityRecord {
    pub ts: DateTime<Utc>,
    pub future_id: String,
    pub call_id: String,
    pub put_id: String,
    pub strike: f64,
    pub ttm: f64,
    pub risk_free: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_last: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_mid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_call: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_put: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_call_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_call_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_put_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_put_return: Option<f64>,

    pub future_dt: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub future_last: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub future_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub future_ask: Option<f64>,
    pub call_dt: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_last: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_ask: Option<f64>,
    pub put_dt: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_last: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_ask: Option<f64>,
}

impl ParityRecord {
    /// Build a row from one evaluation and the three quotes that fed it.
    pub fn capture(
        res: &ParityResult,
        future: &InstrumentQuote,
        call: &InstrumentQuote,
        put: &InstrumentQuote,
    ) -> Self {
        Self {
            ts: res.ts,
            future_id: future.instrument_id.clone(),
            call_id: call.instrument_id.clone(),
            put_id: put.instrument_id.clone(),
            strike: res.strike,
            ttm: res.ttm,
            risk_free: res.risk_free,
            premium_last: opt(res.premium_last),
            premium_mid: opt(res.premium_mid),
            premium_call: opt(res.premium_call),
            premium_put: opt(res.premium_put),
            long_call_cost: opt(res.long_call_cost),
            long_call_return: opt(res.long_call_return),
            long_put_cost: opt(res.long_put_cost),
            long_put_return: opt(res.long_put_return),
            future_dt: future.datetime,
            future_last: opt(future.last_price),
            future_bid: opt(future.bid_price),
            future_ask: opt(future.ask_price),
            call_dt: call.datetime,
            call_last: opt(call.last_price),
            call_bid: opt(call.bid_price),
            call_ask: opt(call.ask_price),
            put_dt: put.datetime,
            put_last: opt(put.last_price),
            put_bid: opt(put.bid_price),
            put_ask: opt(put.ask_price),
        }
    }
}

/// Shared append-only parity log for one session.
#[derive(Debug, Default)]
pub struct ParityLog {
    rows: Mutex<Vec<ParityRecord>>,
}

impl ParityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ParityRecord) {
        self.rows.lock().expect("parity log lock").push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("parity log lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all rows captured so far.
    pub fn snapshot(&self) -> Vec<ParityRecord> {
        self.rows.lock().expect("parity log lock").clone()
    }

    /// Write all rows as JSON lines. Returns the number of rows written.
    pub fn write_jsonl(&self, path: &Path) -> std::io::Result<usize> {
        let rows = self.snapshot();
        let mut w = BufWriter::new(File::create(path)?);
        let mut written = 0;
        for row in &rows {
            // A row that fails to serialize is dropped, not fatal.
            if let Ok(line) = serde_json::to_string(row) {
                writeln!(w, "{line}")?;
                written += 1;
            }
        }
        w.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parity_models::InsClass;

    fn record() -> ParityRecord {
        let ts = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();
        let res = ParityResult {
            ts,
            strike: 100.0,
            premium_last: f64::NAN,
            premium_mid: 0.5,
            premium_call: 1.0,
            premium_put: -0.5,
            long_call_cost: 800.0,
            long_call_return: 0.0,
            long_put_cost: 800.0,
            long_put_return: 0.04,
            ttm: 0.2,
            risk_free: 0.0208,
        };
        let mut f = InstrumentQuote::blank("SIM.F1", "F", InsClass::Future);
        f.datetime = ts;
        let c = InstrumentQuote::blank("SIM.F1C100", "F_o", InsClass::FutureOption);
        let p = InstrumentQuote::blank("SIM.F1P100", "F_o", InsClass::FutureOption);
        ParityRecord::capture(&res, &f, &c, &p)
    }

    #[test]
    fn test_nan_fields_become_absent_columns() {
        let row = record();
        assert_eq!(row.premium_last, None);
        assert_eq!(row.premium_mid, Some(0.5));
        let json = serde_json::to_string(&row).unwrap();
        assert!(!json.contains("premium_last"));
        assert!(json.contains("premium_mid"));
    }

    #[test]
    fn test_jsonl_round_trip() {
        let log = ParityLog::new();
        log.append(record());
        log.append(record());
        assert_eq!(log.len(), 2);

        let dir = std::env::temp_dir().join("parity_log_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.jsonl");
        let written = log.write_jsonl(&path).unwrap();
        assert_eq!(written, 2);

        let body = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<ParityRecord> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].future_id, "SIM.F1");
    }
}
