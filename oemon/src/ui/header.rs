//! Top header with server, scope and application switcher.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::poller::Scope;
use crate::ui::theme::MUTED;

pub fn draw_header(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    server: &str,
    scope: &Scope,
    applications: &[String],
) {
    let mut spans = vec![Span::styled(
        format!("oemon — {server} | "),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    for name in applications {
        let style = if *name == scope.application {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default().fg(MUTED)
        };
        spans.push(Span::styled(format!(" {name} "), style));
    }
    if let Some(agent) = &scope.agent {
        spans.push(Span::raw(format!(" | agent {agent}")));
    }
    spans.push(Span::styled(
        "  (←/→ app, Enter agent scope, q quit)",
        Style::default().fg(MUTED),
    ));
    f.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::BOTTOM)),
        area,
    );
}

pub fn draw_status(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    status: Option<&str>,
    error: Option<&str>,
) {
    let line = match (error, status) {
        (Some(e), _) => Line::from(Span::styled(
            format!("poll failed: {e}"),
            Style::default().fg(crate::ui::theme::ERROR),
        )),
        (None, Some(s)) => Line::from(s.to_string()),
        (None, None) => Line::from(Span::styled(
            concat!(
                "a add agent  s stop agent  t trim  k kill session  ",
                "c cancel request  r reset stats  o tracking  R reset view"
            ),
            Style::default().fg(MUTED),
        )),
    };
    f.render_widget(Paragraph::new(line), area);
}
