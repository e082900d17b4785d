//! Shared UI theme constants.

use ratatui::style::Color;

pub const SELECTED: Color = Color::Rgb(60, 60, 80);
pub const MUTED: Color = Color::Rgb(170, 170, 180);
pub const ERROR: Color = Color::Red;

// Cycled for one line per session on multi-series charts
const LINES: [Color; 8] = [
    Color::Cyan,
    Color::Magenta,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::LightRed,
    Color::LightGreen,
    Color::LightCyan,
];

pub fn line_color(i: usize) -> Color {
    LINES[i % LINES.len()]
}
