//! SVG chart generation for parsed benchmark tests
//!
//! Each panel plots total time against thread count on a log-scaled y axis,
//! one line per category, with the overlay category drawn last.

use crate::data::{CategoryTable, Series, TestRecord};
use crate::error::{Error, Result};
use crate::sink::{ArtifactNames, ChartSink};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Smallest y-axis upper bound, in seconds
pub const MIN_UPPER_BOUND: f64 = 0.01;

const SINGLE_TITLE_FONT_SIZE: u32 = 20;
const COMPOSITE_TITLE_FONT_SIZE: u32 = 17;
const AXIS_LABEL_FONT_SIZE: u32 = 14;
const TICK_LABEL_FONT_SIZE: u32 = 12;
const LEGEND_FONT_SIZE: u32 = 12;

const GRID_COLOR: RGBColor = RGBColor(176, 176, 176);
const PLACEHOLDER_COLOR: RGBColor = RGBColor(110, 118, 129);
const UNKNOWN_COLOR: RGBColor = RGBColor(127, 127, 127);

/// Upper limit on x tick candidates handed to plotters
const MAX_X_LABELS: usize = 64;

/// Chart layout configuration
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Width of every chart in pixels
    pub width: u32,
    /// Height of a single-test chart
    pub panel_height: u32,
    /// Height of each panel on the composite page
    pub composite_panel_height: u32,
    /// Line colors, indexed by category table position
    pub palette: Vec<RGBColor>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            panel_height: 600,
            composite_panel_height: 400,
            palette: vec![
                RGBColor(31, 119, 180),
                RGBColor(255, 127, 14),
                RGBColor(44, 160, 44),
                RGBColor(214, 39, 40),
                RGBColor(148, 103, 189),
                RGBColor(140, 86, 75),
            ],
        }
    }
}

/// Smallest exponent `e` with `10^e >= x`
fn decade_ceil(x: f64) -> i32 {
    let mut exp = x.log10().ceil() as i32;
    while 10f64.powi(exp) < x {
        exp += 1;
    }
    while 10f64.powi(exp - 1) >= x {
        exp -= 1;
    }
    exp
}

/// Largest exponent `e` with `10^e <= x`
fn decade_floor(x: f64) -> i32 {
    let mut exp = x.log10().floor() as i32;
    while 10f64.powi(exp) > x {
        exp -= 1;
    }
    while 10f64.powi(exp + 1) <= x {
        exp += 1;
    }
    exp
}

/// Smallest power of ten at or above `max_seconds`, never below 0.01
pub fn upper_bound_for(max_seconds: f64) -> f64 {
    10f64.powi(decade_ceil(max_seconds.max(MIN_UPPER_BOUND)))
}

/// Y-axis upper bound for a record, over the categories that get drawn
pub fn y_upper_bound(record: &TestRecord, categories: &CategoryTable) -> f64 {
    upper_bound_for(record.max_seconds(categories).unwrap_or(0.0))
}

/// Decade exponents `(low, high)` spanned by the y axis of a record.
///
/// The low end is 0.01, pushed down to fit smaller positive durations, and
/// always at least one decade below the high end.
fn y_decades(record: &TestRecord, categories: &CategoryTable) -> (i32, i32) {
    let high = decade_ceil(y_upper_bound(record, categories));
    let mut low = decade_floor(MIN_UPPER_BOUND);
    if let Some(min) = record.min_positive_seconds(categories) {
        low = low.min(decade_floor(min));
    }
    if low >= high {
        low = high - 1;
    }
    (low, high)
}

/// Y-axis range `(lower, upper)` in seconds
pub fn y_axis_range(record: &TestRecord, categories: &CategoryTable) -> (f64, f64) {
    let (low, high) = y_decades(record, categories);
    (10f64.powi(low), 10f64.powi(high))
}

fn format_decade(exp: i32) -> String {
    if exp >= 0 {
        format!("{}", 10f64.powi(exp))
    } else {
        format!("{:.*}", exp.unsigned_abs() as usize, 10f64.powi(exp))
    }
}

/// Y tick label: powers of ten only
fn decade_label(seconds: f64) -> String {
    if seconds <= 0.0 {
        return String::new();
    }
    let log10 = seconds.log10();
    let nearest = log10.round();
    if (log10 - nearest).abs() < 1e-6 {
        format_decade(nearest as i32)
    } else {
        String::new()
    }
}

/// X tick label: only thread counts present in the data
fn thread_label(x: f64, threads: &[u32]) -> String {
    let nearest = x.round();
    if (x - nearest).abs() > 1e-6 || nearest < 0.0 {
        return String::new();
    }
    match threads.iter().find(|t| f64::from(**t) == nearest) {
        Some(t) => t.to_string(),
        None => String::new(),
    }
}

/// Points of one series in chart coordinates. Durations below the axis
/// floor, zero included, are drawn on the floor.
fn panel_points(series: &Series, floor: f64) -> Vec<(f64, f64)> {
    series
        .points()
        .map(|(threads, seconds)| (f64::from(threads), seconds.max(floor)))
        .collect()
}

fn draw_err(e: impl std::fmt::Display) -> Error {
    Error::DrawError(e.to_string())
}

/// Axis extents of one panel. Only exists for records with samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelAxes {
    pub threads: Vec<u32>,
    pub x_range: (f64, f64),
    pub decades: (i32, i32),
}

impl PanelAxes {
    pub fn for_record(record: &TestRecord, categories: &CategoryTable) -> Option<Self> {
        let threads = record.thread_domain(categories);
        let (first, last) = (*threads.first()?, *threads.last()?);

        let x_range = if first == last {
            (f64::from(first) - 1.0, f64::from(last) + 1.0)
        } else {
            (f64::from(first), f64::from(last))
        };

        Some(Self {
            threads,
            x_range,
            decades: y_decades(record, categories),
        })
    }

    pub fn y_range(&self) -> (f64, f64) {
        (10f64.powi(self.decades.0), 10f64.powi(self.decades.1))
    }

    /// Tick candidates for plotters, fine enough to land on every integer
    fn x_label_count(&self) -> usize {
        let span = (self.x_range.1 - self.x_range.0).ceil() as usize;
        (span + 1).clamp(2, MAX_X_LABELS)
    }
}

/// What a written artifact holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Single chart for the record at this 1-based index
    Record(usize),
    Composite,
    /// Parsed records exported as JSON
    Records,
}

#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SkippedArtifact {
    pub kind: ArtifactKind,
    pub reason: String,
}

/// Outcome of rendering a whole record set
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub written: Vec<WrittenArtifact>,
    pub skipped: Vec<SkippedArtifact>,
}

impl RenderReport {
    /// Write one artifact to `sink`. A failed write is logged and recorded
    /// as skipped, never returned.
    pub fn deliver(
        &mut self,
        sink: &mut dyn ChartSink,
        kind: ArtifactKind,
        name: &str,
        contents: &str,
    ) {
        match sink.write_artifact(name, contents) {
            Ok(path) => {
                info!("Wrote {}", path.display());
                self.written.push(WrittenArtifact { kind, path });
            }
            Err(e) => {
                warn!("Failed to write {}: {}", name, e);
                self.skip(kind, &e);
            }
        }
    }

    pub fn skip(&mut self, kind: ArtifactKind, reason: &Error) {
        self.skipped.push(SkippedArtifact {
            kind,
            reason: reason.to_string(),
        });
    }

    pub fn path_of(&self, kind: &ArtifactKind) -> Option<&PathBuf> {
        self.written
            .iter()
            .find(|artifact| &artifact.kind == kind)
            .map(|artifact| &artifact.path)
    }
}

/// Renders test records into SVG charts
pub struct ChartRenderer {
    config: ChartConfig,
    categories: CategoryTable,
}

impl ChartRenderer {
    pub fn new(config: ChartConfig, categories: CategoryTable) -> Self {
        Self { config, categories }
    }

    /// Single-panel chart for one record.
    ///
    /// Fails with [`Error::EmptyRecord`] when the record has no samples.
    pub fn render_record(&self, record: &TestRecord) -> Result<String> {
        if PanelAxes::for_record(record, &self.categories).is_none() {
            return Err(Error::EmptyRecord {
                title: record.title(),
            });
        }

        let size = (self.config.width, self.config.panel_height);
        render_svg(size, |root| self.draw_panel(root, record, SINGLE_TITLE_FONT_SIZE))
    }

    /// All records stacked vertically in input order, `None` for no records.
    ///
    /// Records without samples get a titled placeholder panel.
    pub fn render_composite(&self, records: &[TestRecord]) -> Result<Option<String>> {
        if records.is_empty() {
            return Ok(None);
        }

        let height = self
            .config
            .composite_panel_height
            .saturating_mul(records.len() as u32);
        let svg = render_svg((self.config.width, height), |root| {
            let panels = root.split_evenly((records.len(), 1));
            for (panel, record) in panels.iter().zip(records) {
                self.draw_panel(panel, record, COMPOSITE_TITLE_FONT_SIZE)?;
            }
            Ok(())
        })?;

        Ok(Some(svg))
    }

    /// Render the composite page and every record chart into `sink`.
    ///
    /// A record that cannot be rendered or written is skipped and reported;
    /// the remaining artifacts are still produced.
    pub fn render_all(
        &self,
        records: &[TestRecord],
        names: &ArtifactNames,
        sink: &mut dyn ChartSink,
    ) -> RenderReport {
        let mut report = RenderReport::default();

        match self.render_composite(records) {
            Ok(Some(svg)) => {
                report.deliver(sink, ArtifactKind::Composite, &names.composite(), &svg)
            }
            Ok(None) => debug!("No test records, composite chart omitted"),
            Err(e) => {
                warn!("Failed to render composite chart: {}", e);
                report.skip(ArtifactKind::Composite, &e);
            }
        }

        for (i, record) in records.iter().enumerate() {
            let index = i + 1;
            let kind = ArtifactKind::Record(index);

            match self.render_record(record) {
                Ok(svg) => report.deliver(sink, kind, &names.record(index), &svg),
                Err(e) => {
                    warn!("Skipping chart for test {}: {}", index, e);
                    report.skip(kind, &e);
                }
            }
        }

        report
    }

    fn color_for(&self, category: &str) -> RGBColor {
        let palette = &self.config.palette;
        match (self.categories.index_of(category), palette.is_empty()) {
            (Some(i), false) => palette[i % palette.len()],
            _ => UNKNOWN_COLOR,
        }
    }

    fn draw_panel(
        &self,
        area: &DrawingArea<SVGBackend<'_>, Shift>,
        record: &TestRecord,
        title_size: u32,
    ) -> Result<()> {
        let title = record.title();
        let Some(axes) = PanelAxes::for_record(record, &self.categories) else {
            debug!("Test '{}' has no samples, drawing placeholder", title);
            return draw_placeholder(area, &title, title_size);
        };

        let (x_lo, x_hi) = axes.x_range;
        let (y_lo, y_hi) = axes.y_range();

        let mut chart = ChartBuilder::on(area)
            .caption(&title, ("sans-serif", title_size))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(x_lo..x_hi, (y_lo..y_hi).log_scale())
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_labels(axes.x_label_count())
            .x_label_formatter(&|x| thread_label(*x, &axes.threads))
            .y_labels(16)
            .y_label_formatter(&|y| decade_label(*y))
            .x_desc("Threads")
            .y_desc("Total Time (s)")
            .label_style(("sans-serif", TICK_LABEL_FONT_SIZE))
            .axis_desc_style(("sans-serif", AXIS_LABEL_FONT_SIZE))
            .draw()
            .map_err(draw_err)?;

        let grid = GRID_COLOR.mix(0.5).stroke_width(1);
        let (low, high) = axes.decades;
        for exp in low..=high {
            let y = 10f64.powi(exp);
            chart
                .draw_series(DashedLineSeries::new(vec![(x_lo, y), (x_hi, y)], 4, 4, grid))
                .map_err(draw_err)?;
        }
        for threads in &axes.threads {
            let x = f64::from(*threads);
            chart
                .draw_series(DashedLineSeries::new(vec![(x, y_lo), (x, y_hi)], 4, 4, grid))
                .map_err(draw_err)?;
        }

        for category in self.categories.draw_order() {
            let Some(series) = record.series(&category.name).filter(|s| !s.is_empty()) else {
                continue;
            };

            let color = self.color_for(&category.name);
            let points = panel_points(series, y_lo);

            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
                .map_err(draw_err)?
                .label(category.name.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart
                .draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))
                .map_err(draw_err)?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(("sans-serif", LEGEND_FONT_SIZE))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(draw_err)?;

        Ok(())
    }
}

/// Draw onto a fresh in-memory SVG page and return the document
fn render_svg<F>(size: (u32, u32), draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        draw(&root)?;
        root.present().map_err(draw_err)?;
    }
    Ok(svg)
}

fn draw_placeholder(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    title: &str,
    title_size: u32,
) -> Result<()> {
    let body = area
        .titled(title, ("sans-serif", title_size))
        .map_err(draw_err)?;
    let (width, height) = body.dim_in_pixel();
    let style = ("sans-serif", AXIS_LABEL_FONT_SIZE)
        .into_font()
        .color(&PLACEHOLDER_COLOR)
        .pos(Pos::new(HPos::Center, VPos::Center));

    body.draw(&Text::new(
        "no samples",
        (width as i32 / 2, height as i32 / 2),
        style,
    ))
    .map_err(draw_err)
}
