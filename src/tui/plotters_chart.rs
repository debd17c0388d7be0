//! Plotters-powered time-series chart widget for Ratatui.
//!
//! Why Plotters instead of Ratatui's built-in `Chart` widget?
//! - nicer axis + mesh rendering
//! - less manual work for ticks/labels
//! - easy to extend later (legend, annotations, exportable PNG/SVG backends, etc.)
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use chrono::NaiveDate;
use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// RGB palette shared between Plotters series and Ratatui accents, one color
/// per selected city (cycled when the filter is larger).
pub const SERIES_PALETTE: [(u8, u8, u8); 6] = [
    (0, 255, 255),
    (255, 165, 0),
    (0, 255, 0),
    (255, 0, 255),
    (255, 255, 0),
    (135, 135, 255),
];

pub fn palette_rgb(i: usize) -> (u8, u8, u8) {
    SERIES_PALETTE[i % SERIES_PALETTE.len()]
}

pub fn palette_ratatui(i: usize) -> Color {
    let (r, g, b) = palette_rgb(i);
    Color::Rgb(r, g, b)
}

/// A lightweight, render-only chart description.
///
/// The widget is intentionally data-driven: all series and bounds are computed
/// outside the render call. X values are day offsets from `x_base`, which the
/// axis formatter maps back to calendar dates.
pub struct SeriesChart<'a> {
    /// One named line series per city (or a single unnamed county series).
    pub series: &'a [(String, Vec<(f64, f64)>)],
    /// Date at x = 0.
    pub x_base: NaiveDate,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub y_label: &'a str,
    /// Also mark each sample with a point (useful for sparse daily series).
    pub draw_points: bool,
}

impl Widget for SeriesChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        // In that case, we render a small hint rather than panicking.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.x_bounds[0];
        let x1 = self.x_bounds[1];
        let y0 = self.y_bounds[0];
        let y1 = self.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite())
            || x1 <= x0
            || y1 <= y0
        {
            return;
        }

        let x_base = self.x_base;

        // `plotters-ratatui-backend` draws Plotters primitives via Ratatui's
        // `Canvas` widget, which ultimately writes to the terminal buffer.
        //
        // We delegate rendering to the crate-provided widget helper to avoid
        // coupling our code to its internal backend types.
        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                // Small margins keep the chart readable without wasting space.
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Axes + tick labels.
            //
            // We disable the mesh lines to reduce visual clutter in low-resolution
            // terminal rendering; the axes + labels are usually enough here.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("date")
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| fmt_axis_date(x_base, *v))
                .y_label_formatter(&|v| format!("{v:.0}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            for (i, (_, points)) in self.series.iter().enumerate() {
                let (r, g, b) = palette_rgb(i);
                let color = RGBColor(r, g, b);
                chart.draw_series(LineSeries::new(points.iter().copied(), &color))?;

                // A colored `Pixel` gives a clean "dot" marker that looks good
                // in terminals and reliably overrides the line underneath.
                if self.draw_points {
                    chart.draw_series(
                        points.iter().map(|&(x, y)| Pixel::new((x, y), color)),
                    )?;
                }
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

fn fmt_axis_date(base: NaiveDate, offset: f64) -> String {
    let date = base + chrono::Duration::days(offset.round() as i64);
    date.format("%m/%d").to_string()
}
