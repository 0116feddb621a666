//! Chart state models

use chrono::{Datelike, NaiveDate};

/// A single data point on a price chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub x: NaiveDate,
    pub y: Option<f64>,
}

/// Value range pinned on an axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBounds<T> {
    pub min: T,
    pub max: T,
}

/// How x-axis ticks are labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Only January 1st is labelled, with the year
    Yearly,
    /// Every tick gets `<Mon> <Day>`
    Daily,
}

/// Time-scaled x-axis configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub mode: TickMode,
    /// Pinned range; `None` lets the renderer pick from the data
    pub bounds: Option<AxisBounds<NaiveDate>>,
    /// Year-start ticks drawn as major grid lines (yearly mode only)
    pub major_ticks: Vec<NaiveDate>,
}

impl Default for TimeAxis {
    fn default() -> Self {
        Self {
            mode: TickMode::Daily,
            bounds: None,
            major_ticks: Vec::new(),
        }
    }
}

impl TimeAxis {
    /// Label for a tick at `date`
    pub fn tick_label(&self, date: &NaiveDate) -> String {
        match self.mode {
            TickMode::Yearly if date.month() == 1 && date.day() == 1 => {
                date.format("%Y").to_string()
            }
            TickMode::Yearly => String::new(),
            TickMode::Daily => date.format("%b %-d").to_string(),
        }
    }
}

/// Everything the canvas needs to draw one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ChartState {
    pub label: String,
    pub dataset: Vec<ChartPoint>,
    /// `None` until data with at least one close arrives
    pub y_bounds: Option<AxisBounds<f64>>,
    pub x_axis: TimeAxis,
}

impl Default for ChartState {
    fn default() -> Self {
        Self {
            label: "Stock Price".to_string(),
            dataset: Vec::new(),
            y_bounds: None,
            x_axis: TimeAxis::default(),
        }
    }
}

impl ChartState {
    /// Earliest and latest dates in the dataset
    pub fn date_range(&self) -> Option<AxisBounds<NaiveDate>> {
        let min = self.dataset.iter().map(|p| p.x).min()?;
        let max = self.dataset.iter().map(|p| p.x).max()?;
        Some(AxisBounds { min, max })
    }
}
