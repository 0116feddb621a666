//! Historical price data models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::errors::HistoryError;

/// One row of the historical-data payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Close")]
    pub close: Option<f64>,
    #[serde(rename = "Daily_Return", default)]
    pub daily_return: Option<f64>,
}

/// Body of `/api/historical-data`, discriminated before any field access.
///
/// Anything that is neither an array of records nor an object with an
/// `error` string fails to deserialize and is reported as a parse error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HistoryResponse {
    Records(Vec<PriceRecord>),
    Failure { error: String },
}

/// Raw values as the user typed them
#[derive(Debug, Clone, Default)]
pub struct HistoryInputs {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
}

/// Validated query parameters for a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
}

impl HistoryInputs {
    /// Build inputs from positional command arguments: `<symbol> <start> [end]`
    pub fn from_args(args: &[&str]) -> Self {
        let field = |i: usize| args.get(i).map(|s| s.to_string()).unwrap_or_default();
        Self {
            symbol: field(0),
            start_date: field(1),
            end_date: field(2),
        }
    }

    /// Presence checks only; a blank end date becomes `today`.
    pub fn into_query(self, today: NaiveDate) -> Result<HistoryQuery, HistoryError> {
        let symbol = self.symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(HistoryError::MissingSymbol);
        }

        let start_date = self.start_date.trim().to_string();
        if start_date.is_empty() {
            return Err(HistoryError::MissingStartDate);
        }

        let end_date = match self.end_date.trim() {
            "" => today.format("%Y-%m-%d").to_string(),
            end => end.to_string(),
        };

        Ok(HistoryQuery {
            symbol,
            start_date,
            end_date,
        })
    }
}

/// Headline numbers posted next to a refreshed chart
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub points: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub last_close: Option<f64>,
    /// Percent change from the first to the last non-null close
    pub change_pct: Option<f64>,
    /// Mean of the backend's `Daily_Return` column, as a percentage
    pub avg_daily_return_pct: Option<f64>,
}

impl HistorySummary {
    pub fn from_records(records: &[PriceRecord]) -> Option<Self> {
        let first_date = records.iter().map(|r| r.date).min()?;
        let last_date = records.iter().map(|r| r.date).max()?;

        let mut closes = records.iter().filter_map(|r| r.close);
        let first_close = closes.next();
        let last_close = closes.last().or(first_close);

        let change_pct = match (first_close, last_close) {
            (Some(first), Some(last)) if first != 0.0 => Some((last - first) / first * 100.0),
            _ => None,
        };

        let returns: Vec<f64> = records
            .iter()
            .filter_map(|r| r.daily_return)
            .filter(|r| r.is_finite())
            .collect();
        let avg_daily_return_pct = if returns.is_empty() {
            None
        } else {
            Some(returns.iter().sum::<f64>() / returns.len() as f64 * 100.0)
        };

        Some(Self {
            points: records.len(),
            first_date,
            last_date,
            last_close,
            change_pct,
            avg_daily_return_pct,
        })
    }
}
