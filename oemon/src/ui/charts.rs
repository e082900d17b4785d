//! Line charts over aggregator series, plus the long-window statistics panel.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};

use crate::history::{Aggregator, Millis, Series, SeriesKind};
use crate::key::SeriesKey;
use crate::ui::theme::{line_color, MUTED};
use crate::ui::util::count;

/// Visible time span and the instant at its right edge.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub now: Millis,
    pub span_ms: f64,
}

fn label(key: &SeriesKey) -> String {
    match key.entity_id() {
        Some(id) => format!("{}/{}", id.agent, id.session),
        None => key.metric().to_string(),
    }
}

pub fn draw_chart(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    series: &[Series],
    window: Window,
    fmt_y: fn(f64) -> String,
) {
    let span_s = (window.span_ms / 1000.0).max(1.0);
    // x is seconds relative to `now`, so the right edge is 0
    let data: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|s| {
            s.points
                .iter()
                .map(|p| ((p.at - window.now) as f64 / 1000.0, p.value))
                .filter(|(x, _)| *x >= -span_s)
                .collect()
        })
        .collect();
    let y_max = data
        .iter()
        .flatten()
        .map(|(_, y)| *y)
        .fold(0.0, f64::max)
        .max(1.0)
        * 1.1;

    let datasets: Vec<Dataset<'_>> = series
        .iter()
        .zip(&data)
        .enumerate()
        .map(|(i, (s, pts))| {
            Dataset::default()
                .name(label(&s.key))
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(line_color(i)))
                .data(pts)
        })
        .collect();

    let title = match series {
        [one] => format!("{title} (now: {})", one.last_value().map(fmt_y).unwrap_or_default()),
        _ => title.to_string(),
    };
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .bounds([-span_s, 0.0])
                .style(Style::default().fg(MUTED))
                .labels(vec![Span::raw(format!("-{span_s:.0}s")), Span::raw("now")]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .style(Style::default().fg(MUTED))
                .labels(vec![Span::raw("0"), Span::raw(fmt_y(y_max))]),
        )
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));
    f.render_widget(chart, area);
}

/// Counter totals with their latest and peak per-tick deltas over the whole
/// statistics window.
pub fn draw_stats(f: &mut ratatui::Frame<'_>, area: Rect, stats: &Aggregator, keys: &[SeriesKey]) {
    let mut lines = vec![Line::from(Span::styled(
        format!("{:<30}{:>10}{:>10}{:>10}", "counter", "total", "last Δ", "peak Δ"),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for (gauge, rate) in stats
        .series(SeriesKind::Gauge, keys)
        .into_iter()
        .zip(stats.series(SeriesKind::Rate, keys))
    {
        lines.push(Line::from(format!(
            "{:<30}{:>10}{:>10}{:>10}",
            gauge.key.metric(),
            gauge.last_value().map(count).unwrap_or_default(),
            rate.last_value().map(count).unwrap_or_default(),
            count(rate.max_value()),
        )));
    }
    let title = format!("Statistics (last {} polls)", stats.capacity());
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}
