//! Overlay chart of actual vs predicted closes.
//!
//! [`ChartSpec`] holds everything needed to draw the chart (series, bounds,
//! labels) and is independent of the terminal; [`ForecastChart`] renders it.

use chrono::{Datelike, NaiveDate};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::Line,
    widgets::{
        Axis, Block, Borders, Chart, Dataset, GraphType, LegendPosition, Paragraph, Widget,
    },
};

use crate::pipeline::Forecast;

pub const ACTUAL_LABEL: &str = "Actual";
pub const PREDICTED_LABEL: &str = "Predicted";
pub const X_AXIS_LABEL: &str = "Date";
pub const Y_AXIS_LABEL: &str = "Price";

const ACTUAL_COLOR: Color = Color::Rgb(255, 165, 0);
const PREDICTED_COLOR: Color = Color::Green;
const EMPTY_MESSAGE: &str = "No data in selected range";

/// One plotted line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: &'static str,
    pub color: Color,
    /// `(x, y)` with x in days since the common era
    pub points: Vec<(f64, f64)>,
}

/// Fully resolved chart contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub actual: Series,
    pub predicted: Series,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
}

fn date_x(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn x_date(x: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
}

impl ChartSpec {
    /// Build the chart for an (already filtered) forecast.
    pub fn from_forecast(forecast: &Forecast) -> Self {
        let actual: Vec<(f64, f64)> = forecast
            .points()
            .iter()
            .map(|p| (date_x(p.date), p.actual))
            .collect();
        let predicted: Vec<(f64, f64)> = forecast
            .points()
            .iter()
            .map(|p| (date_x(p.date), p.predicted))
            .collect();

        let x_bounds = match (actual.first(), actual.last()) {
            (Some(first), Some(last)) if last.0 > first.0 => [first.0, last.0],
            (Some(only), _) => [only.0 - 1.0, only.0 + 1.0],
            _ => [0.0, 1.0],
        };
        let y_bounds = y_bounds(actual.iter().chain(predicted.iter()).map(|&(_, y)| y));

        let mid_x = (x_bounds[0] + x_bounds[1]) / 2.0;
        let x_labels = if actual.is_empty() {
            Vec::new()
        } else {
            [x_bounds[0], mid_x, x_bounds[1]]
                .iter()
                .filter_map(|&x| x_date(x))
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect()
        };
        let y_labels = [y_bounds[0], (y_bounds[0] + y_bounds[1]) / 2.0, y_bounds[1]]
            .iter()
            .map(|y| format!("{y:.2}"))
            .collect();

        Self {
            title: format!("{} Price Prediction", forecast.instrument()),
            actual: Series {
                label: ACTUAL_LABEL,
                color: ACTUAL_COLOR,
                points: actual,
            },
            predicted: Series {
                label: PREDICTED_LABEL,
                color: PREDICTED_COLOR,
                points: predicted,
            },
            x_bounds,
            y_bounds,
            x_labels,
            y_labels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actual.points.is_empty() && self.predicted.points.is_empty()
    }
}

/// Padded y range over finite values.
///
/// Keeps at least 2% of the mid price (or 2.0) so flat series stay readable.
fn y_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return [0.0, 1.0];
    }

    let mid = (min + max) / 2.0;
    let min_range = (mid.abs() * 0.02).max(2.0);
    if max - min < min_range {
        let half = min_range / 2.0;
        [mid - half, mid + half]
    } else {
        let pad = (max - min) * 0.05;
        [min - pad, max + pad]
    }
}

/// Widget drawing a [`ChartSpec`].
pub struct ForecastChart<'a> {
    spec: &'a ChartSpec,
}

impl<'a> ForecastChart<'a> {
    pub fn new(spec: &'a ChartSpec) -> Self {
        Self { spec }
    }
}

impl Widget for ForecastChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(self.spec.title.clone())
            .borders(Borders::ALL);

        if self.spec.is_empty() {
            Paragraph::new(EMPTY_MESSAGE)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(block.border_style(Style::default().fg(Color::DarkGray)))
                .render(area, buf);
            return;
        }

        let datasets = [&self.spec.actual, &self.spec.predicted]
            .into_iter()
            .map(|series| {
                Dataset::default()
                    .name(series.label)
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(series.color))
                    .data(&series.points)
            })
            .collect::<Vec<_>>();

        let x_labels: Vec<Line> = self.spec.x_labels.iter().map(|l| Line::from(l.as_str())).collect();
        let y_labels: Vec<Line> = self.spec.y_labels.iter().map(|l| Line::from(l.as_str())).collect();

        Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .title(X_AXIS_LABEL)
                    .style(Style::default().fg(Color::Gray))
                    .bounds(self.spec.x_bounds)
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title(Y_AXIS_LABEL)
                    .style(Style::default().fg(Color::Gray))
                    .bounds(self.spec.y_bounds)
                    .labels(y_labels),
            )
            .legend_position(Some(LegendPosition::TopLeft))
            .hidden_legend_constraints((Constraint::Ratio(1, 1), Constraint::Ratio(1, 1)))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Instrument;
    use crate::pipeline::{DateRange, ForecastPoint};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    fn empty_forecast() -> Forecast {
        Forecast::empty(Instrument::Mastercard)
    }

    #[test]
    fn test_y_bounds_padding() {
        let [lo, hi] = y_bounds([100.0, 200.0].into_iter());
        assert!((lo - 95.0).abs() < 1e-9);
        assert!((hi - 205.0).abs() < 1e-9);
    }

    #[test]
    fn test_y_bounds_flat_series() {
        let [lo, hi] = y_bounds([400.0, 400.0].into_iter());
        assert!(lo < 400.0 && hi > 400.0);
        assert!((hi - lo - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_y_bounds_ignores_non_finite() {
        assert_eq!(y_bounds([f64::NAN].into_iter()), [0.0, 1.0]);
    }

    #[test]
    fn test_empty_spec() {
        let spec = ChartSpec::from_forecast(&empty_forecast());
        assert!(spec.is_empty());
        assert_eq!(spec.title, "Mastercard Price Prediction");
        assert!(spec.x_labels.is_empty());
    }

    #[test]
    fn test_empty_chart_renders_message() {
        let spec = ChartSpec::from_forecast(&empty_forecast());
        let area = Rect::new(0, 0, 60, 10);
        let mut buf = Buffer::empty(area);
        ForecastChart::new(&spec).render(area, &mut buf);
        let text = buffer_text(&buf);
        assert!(text.contains(EMPTY_MESSAGE));
        assert!(text.contains("Mastercard Price Prediction"));
    }

    #[test]
    fn test_render_with_data() {
        let dates = [date(2023, 1, 3), date(2023, 1, 4), date(2023, 1, 5)];
        let points: Vec<ForecastPoint> = dates
            .iter()
            .enumerate()
            .map(|(i, &d)| ForecastPoint {
                date: d,
                offset: 60 + i,
                actual: 350.0 + i as f64,
                predicted: 351.0 + i as f64,
            })
            .collect();
        let forecast = Forecast::from_points(Instrument::Visa, points);
        let forecast = forecast.filter(&DateRange::new(dates[0], dates[2]));

        let spec = ChartSpec::from_forecast(&forecast);
        assert_eq!(spec.actual.points.len(), 3);
        assert_eq!(spec.predicted.points[0].1, 351.0);
        assert_eq!(spec.x_labels.first().map(String::as_str), Some("2023-01-03"));
        assert_eq!(spec.x_labels.last().map(String::as_str), Some("2023-01-05"));

        let area = Rect::new(0, 0, 80, 20);
        let mut buf = Buffer::empty(area);
        ForecastChart::new(&spec).render(area, &mut buf);
        let text = buffer_text(&buf);
        assert!(text.contains("Visa Price Prediction"));
        assert!(text.contains(ACTUAL_LABEL));
        assert!(text.contains(PREDICTED_LABEL));
        assert!(!text.contains(EMPTY_MESSAGE));
    }

    #[test]
    fn test_single_point_bounds() {
        let point = ForecastPoint {
            date: date(2023, 6, 1),
            offset: 60,
            actual: 10.0,
            predicted: 11.0,
        };
        let forecast = Forecast::from_points(Instrument::Visa, vec![point]);
        let spec = ChartSpec::from_forecast(&forecast);
        let x = date_x(point.date);
        assert_eq!(spec.x_bounds, [x - 1.0, x + 1.0]);
    }
}
