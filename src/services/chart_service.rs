use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use plotters::coord::ranged1d::Ranged;
use plotters::coord::types::RangedCoordi32;
use plotters::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::chart::{AxisBounds, ChartPoint, ChartState, TickMode, TimeAxis};
use crate::models::history::PriceRecord;
use crate::utils::errors::ChartError;

/// Spans longer than this switch the x-axis to yearly labels
const YEARLY_SPAN_YEARS: f64 = 2.0;
/// Share of the close range added above and below the data
const Y_PADDING_RATIO: f64 = 0.1;
/// Tick count hint for daily mode
const DAILY_TICK_HINT: usize = 10;
const LINE_COLOR: RGBColor = RGBColor(75, 192, 192);

/// Something a chart can be drawn onto
pub trait ChartCanvas {
    fn draw(&mut self, state: &ChartState) -> Result<(), ChartError>;
}

/// Off-screen canvas that keeps the last frame as PNG bytes
pub struct PngCanvas {
    width: u32,
    height: u32,
    frame: Option<Vec<u8>>,
}

impl PngCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: None,
        }
    }

    /// Last rendered frame, if any
    pub fn frame(&self) -> Option<&[u8]> {
        self.frame.as_deref()
    }
}

impl ChartCanvas for PngCanvas {
    fn draw(&mut self, state: &ChartState) -> Result<(), ChartError> {
        let png = render_png(state, self.width, self.height)?;
        debug!("Rendered {}x{} chart frame: {} bytes", self.width, self.height, png.len());
        self.frame = Some(png);
        Ok(())
    }
}

/// Owns one chart and everything drawn on it
pub struct ChartController<C: ChartCanvas = PngCanvas> {
    state: ChartState,
    canvas: C,
}

impl<C: ChartCanvas> ChartController<C> {
    /// Empty line chart: one unlabelled dataset, daily x-axis, free y-axis
    pub fn create_chart(canvas: C) -> Self {
        info!("Creating chart");
        Self {
            state: ChartState::default(),
            canvas,
        }
    }

    pub fn state(&self) -> &ChartState {
        &self.state
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    /// Replace the dataset, rescale both axes and redraw.
    ///
    /// Nothing changes if there is no close to scale against or the draw fails.
    pub fn update_chart(&mut self, records: &[PriceRecord], symbol: &str) -> Result<(), ChartError> {
        let y_bounds = price_bounds(records).ok_or(ChartError::NoPriceData)?;

        let mut next = ChartState {
            label: format!("{} Stock Price", symbol),
            dataset: records
                .iter()
                .map(|r| ChartPoint { x: r.date, y: r.close })
                .collect(),
            y_bounds: Some(y_bounds),
            x_axis: TimeAxis::default(),
        };
        if let Some(range) = next.date_range() {
            next.x_axis = time_axis_for(range);
        }

        debug!(
            "Updating chart '{}': {} points, y {:.4}..{:.4}, {:?} ticks",
            next.label,
            next.dataset.len(),
            y_bounds.min,
            y_bounds.max,
            next.x_axis.mode
        );

        self.canvas.draw(&next)?;
        self.state = next;
        Ok(())
    }
}

/// Close range padded by 10% on each side; `None` if every close is null
pub fn price_bounds(records: &[PriceRecord]) -> Option<AxisBounds<f64>> {
    let mut closes = records.iter().filter_map(|r| r.close).filter(|c| c.is_finite());
    let first = closes.next()?;
    let (min_close, max_close) = closes.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c)));

    let padding = (max_close - min_close) * Y_PADDING_RATIO;
    Some(AxisBounds {
        min: min_close - padding,
        max: max_close + padding,
    })
}

/// Years between two dates
pub fn span_years(range: AxisBounds<NaiveDate>) -> f64 {
    (range.max - range.min).num_days() as f64 / 365.25
}

/// Every January 1st inside `[min, max]`
pub fn year_starts(range: AxisBounds<NaiveDate>) -> Vec<NaiveDate> {
    (range.min.year()..=range.max.year())
        .filter_map(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        .filter(|d| *d >= range.min && *d <= range.max)
        .collect()
}

/// Pick yearly or daily labelling for the data's date range
pub fn time_axis_for(range: AxisBounds<NaiveDate>) -> TimeAxis {
    if span_years(range) > YEARLY_SPAN_YEARS {
        TimeAxis {
            mode: TickMode::Yearly,
            bounds: Some(range),
            major_ticks: year_starts(range),
        }
    } else {
        TimeAxis {
            mode: TickMode::Daily,
            bounds: None,
            major_ticks: Vec::new(),
        }
    }
}

fn render_err(e: impl std::fmt::Display) -> ChartError {
    ChartError::Render(e.to_string())
}

/// Consecutive non-null points; a null close breaks the line
fn line_segments(dataset: &[ChartPoint]) -> Vec<Vec<(i32, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for point in dataset {
        match point.y.filter(|y| y.is_finite()) {
            Some(y) => current.push((point.x.num_days_from_ce(), y)),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Removes the bitmap file on every exit path, including failed draws
struct TempChartFile(PathBuf);

impl TempChartFile {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("price_chart_{}.png", Uuid::new_v4())))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempChartFile {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_file(&self.0) {
                debug!("Failed to remove temporary chart file {}: {}", self.0.display(), e);
            }
        }
    }
}

/// Render a frame as PNG bytes
fn render_png(state: &ChartState, width: u32, height: u32) -> Result<Vec<u8>, ChartError> {
    // The bitmap encoder only writes to paths
    let temp_file = TempChartFile::new();

    let (x_min, x_max) = match state.x_axis.bounds.or_else(|| state.date_range()) {
        Some(range) => (range.min.num_days_from_ce(), range.max.num_days_from_ce()),
        None => {
            let today = chrono::Utc::now().date_naive().num_days_from_ce();
            (today, today)
        }
    };
    let x_max = x_max.max(x_min + 1);

    let (y_min, y_max) = match state.y_bounds {
        Some(b) if b.max > b.min => (b.min, b.max),
        Some(b) => (b.min - 1.0, b.max + 1.0),
        None => (0.0, 1.0),
    };

    let key_points: Vec<i32> = match state.x_axis.mode {
        TickMode::Yearly => state
            .x_axis
            .major_ticks
            .iter()
            .map(|d| d.num_days_from_ce())
            .collect(),
        TickMode::Daily => RangedCoordi32::from(x_min..x_max).key_points(DAILY_TICK_HINT),
    };

    {
        let root = BitMapBackend::new(temp_file.path(), (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let label_count = key_points.len().max(1);
        let mut chart = ChartBuilder::on(&root)
            .caption(&state.label, ("sans-serif", 32.0).into_font())
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d((x_min..x_max).with_key_points(key_points), y_min..y_max)
            .map_err(render_err)?;

        let axis = &state.x_axis;
        chart
            .configure_mesh()
            .x_labels(label_count)
            .x_label_formatter(&|day| {
                NaiveDate::from_num_days_from_ce_opt(*day)
                    .map(|date| axis.tick_label(&date))
                    .unwrap_or_default()
            })
            .y_label_formatter(&|price| format!("{:.2}", price))
            .bold_line_style(BLACK.mix(0.25))
            .light_line_style(WHITE.mix(0.0))
            .draw()
            .map_err(render_err)?;

        for segment in line_segments(&state.dataset) {
            chart
                .draw_series(LineSeries::new(segment, LINE_COLOR.stroke_width(2)))
                .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
    }

    let image_data = fs::read(temp_file.path()).map_err(render_err)?;
    Ok(image_data)
}
