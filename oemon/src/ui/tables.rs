//! Agents, sessions and in-flight requests tables.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
};

use crate::poller::{AgentSnapshot, Snapshot};
use crate::types::{AgentState, SessionState};
use crate::ui::theme::{MUTED, SELECTED};
use crate::ui::util::{count, human, truncate_middle};

fn block(title: String, focused: bool) -> Block<'static> {
    let b = Block::default().borders(Borders::ALL).title(title);
    if focused {
        b.border_style(Style::default().fg(Color::Cyan))
    } else {
        b
    }
}

fn render(f: &mut ratatui::Frame<'_>, area: Rect, table: Table<'_>, selected: Option<usize>) {
    let mut state = TableState::default();
    state.select(selected);
    f.render_stateful_widget(
        table
            .highlight_style(Style::default().bg(SELECTED).add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ "),
        area,
        &mut state,
    );
}

pub fn draw_agents(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    snap: Option<&Snapshot>,
    selected: usize,
    tracking: &std::collections::HashMap<String, bool>,
    focused: bool,
) {
    let agents = snap.map(|s| s.agents.as_slice()).unwrap_or_default();
    let id_w = area.width.saturating_sub(36).max(8) as usize;
    let rows = agents.iter().map(|a| {
        let color = match a.agent.agent_state() {
            AgentState::Available => Color::Green,
            AgentState::Stopping => Color::Yellow,
            AgentState::Stopped => Color::Red,
            AgentState::Other => MUTED,
        };
        let tracked = tracking.get(&a.agent.agent_id).copied().unwrap_or(false);
        Row::new(vec![
            Cell::from(truncate_middle(&a.agent.agent_id, id_w)),
            Cell::from(a.agent.pid.clone().unwrap_or_default()),
            Cell::from(a.agent.state.clone()).style(Style::default().fg(color)),
            Cell::from(a.sessions.len().to_string()),
            Cell::from(if tracked { "on" } else { "" }),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Min(8),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(4),
        ],
    )
    .header(
        Row::new(vec!["Agent", "PID", "State", "Sessions", "Obj"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(block(format!("Agents ({})", agents.len()), focused));
    render(f, area, table, (!agents.is_empty()).then_some(selected));
}

pub fn draw_sessions(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    agent: Option<&AgentSnapshot>,
    selected: usize,
    focused: bool,
) {
    let sessions = agent.map(|a| a.sessions.as_slice()).unwrap_or_default();
    let num = |v: &Option<serde_json::Value>| v.as_ref().and_then(|x| x.as_f64());
    let rows = sessions.iter().map(|s| {
        let color = match s.session_state() {
            SessionState::Idle => Color::Green,
            SessionState::Busy => Color::Yellow,
            SessionState::Other => MUTED,
        };
        Row::new(vec![
            Cell::from(s.session_id.clone()),
            Cell::from(s.state.clone()).style(Style::default().fg(color)),
            Cell::from(num(&s.memory).map(|m| human(m as u64)).unwrap_or_default()),
            Cell::from(num(&s.completed_requests).map(count).unwrap_or_default()),
            Cell::from(num(&s.failed_requests).map(count).unwrap_or_default()),
        ])
    });
    let title = match agent {
        Some(a) => format!("Sessions of {} ({})", a.agent.agent_id, sessions.len()),
        None => "Sessions".into(),
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["Id", "State", "Memory", "Completed", "Failed"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(block(title, focused));
    render(f, area, table, (!sessions.is_empty()).then_some(selected));
}

pub fn draw_requests(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    agent: Option<&AgentSnapshot>,
    selected: usize,
    focused: bool,
) {
    let requests = agent.map(|a| a.requests.as_slice()).unwrap_or_default();
    let rows = requests.iter().map(|r| {
        Row::new(vec![
            Cell::from(r.request_id.clone()),
            Cell::from(r.session_id.clone().unwrap_or_default()),
            Cell::from(r.proc_name.clone().unwrap_or_default()),
            Cell::from(r.start_time.clone().unwrap_or_default()),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(8),
            Constraint::Min(12),
            Constraint::Length(24),
        ],
    )
    .header(
        Row::new(vec!["Request", "Session", "Procedure", "Started"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(block(format!("In-flight requests ({})", requests.len()), focused));
    render(f, area, table, (!requests.is_empty()).then_some(selected));
}
