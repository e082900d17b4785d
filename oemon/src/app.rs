//! App state and main loop: input handling, poll results, control actions, and drawing.

use std::{collections::HashMap, future::Future, io, time::Duration};

use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::client::{ClientError, OeClient};
use crate::config::Settings;
use crate::history::{Aggregator, SeriesKind};
use crate::key::SeriesKey;
use crate::poller::{
    build_sample, spawn_poller, AgentSnapshot, PollEvent, Scope, Snapshot, MEMORY_USED, REQUESTS,
    SESSIONS_BUSY, SESSIONS_IDLE, SESSION_MANAGER_METRICS, SESSION_MEMORY,
};
use crate::ui::{
    charts::{draw_chart, draw_stats, Window},
    header::{draw_header, draw_status},
    tables::{draw_agents, draw_requests, draw_sessions},
    util::{count, human},
};

#[derive(Debug)]
pub enum AppEvent {
    Poll(PollEvent),
    Action {
        label: String,
        outcome: Result<(), ClientError>,
        /// Object-tracking state to record once the server has accepted it.
        tracking: Option<(String, bool)>,
    },
}

impl From<PollEvent> for AppEvent {
    fn from(e: PollEvent) -> Self {
        AppEvent::Poll(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Agents,
    Sessions,
    Requests,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Agents => Focus::Sessions,
            Focus::Sessions => Focus::Requests,
            Focus::Requests => Focus::Agents,
        }
    }
}

pub struct App {
    client: OeClient,
    settings: Settings,

    applications: Vec<String>,
    scope: Scope,
    // Bumped on every scope switch; poll results from older epochs are dropped
    epoch: u64,
    poller: Option<JoinHandle<()>>,
    tx: mpsc::Sender<AppEvent>,
    rx: mpsc::Receiver<AppEvent>,

    // Short live charts and the long statistics window
    charts: Aggregator,
    stats: Aggregator,

    last: Option<Snapshot>,
    last_error: Option<String>,
    status: Option<String>,

    focus: Focus,
    agent_sel: usize,
    session_sel: usize,
    request_sel: usize,
    tracking: HashMap<String, bool>,

    should_quit: bool,
}

impl App {
    pub fn new(
        client: OeClient,
        settings: Settings,
        applications: Vec<String>,
        scope: Scope,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let mut charts = Aggregator::new(settings.chart_capacity);
        let mut stats = Aggregator::new(settings.stats_capacity);
        charts.reset(scope.to_string());
        stats.reset(scope.to_string());
        Self {
            client,
            settings,
            applications,
            scope,
            epoch: 0,
            poller: None,
            tx,
            rx,
            charts,
            stats,
            last: None,
            last_error: None,
            status: None,
            focus: Focus::Agents,
            agent_sel: 0,
            session_sel: 0,
            request_sel: 0,
            tracking: HashMap::new(),
            should_quit: false,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn charts(&self) -> &Aggregator {
        &self.charts
    }

    pub fn stats(&self) -> &Aggregator {
        &self.stats
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        self.start_poller();
        let res = self.event_loop(&mut terminal).await;
        self.stop_poller();

        // Teardown
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> anyhow::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10)).context("polling terminal events")? {
                if let Event::Key(k) = event::read()? {
                    self.handle_key(k);
                }
            }
            if self.should_quit {
                break;
            }

            // Poll results and action outcomes
            while let Ok(ev) = self.rx.try_recv() {
                self.handle_event(ev);
            }

            terminal.draw(|f| self.draw(f))?;

            // Tick rate
            sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    fn start_poller(&mut self) {
        self.stop_poller();
        info!(scope = %self.scope, epoch = self.epoch, "polling");
        self.poller = Some(spawn_poller(
            self.client.clone(),
            self.scope.clone(),
            self.epoch,
            self.settings.poll_interval(),
            self.tx.clone(),
        ));
    }

    fn stop_poller(&mut self) {
        if let Some(h) = self.poller.take() {
            h.abort();
        }
    }

    /// Move to a different monitored target. All history is discarded.
    pub fn switch_scope(&mut self, scope: Scope) {
        if scope == self.scope {
            return;
        }
        self.scope = scope;
        self.epoch += 1;
        self.charts.reset(self.scope.to_string());
        self.stats.reset(self.scope.to_string());
        self.last = None;
        self.last_error = None;
        self.tracking.clear();
        self.agent_sel = 0;
        self.session_sel = 0;
        self.request_sel = 0;
        self.start_poller();
    }

    pub fn handle_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::Poll(p) if p.epoch != self.epoch => {
                debug!(stale = p.epoch, current = self.epoch, "dropping poll result");
            }
            AppEvent::Poll(PollEvent { outcome: Ok(snap), .. }) => {
                let sample = build_sample(&snap);
                self.charts.ingest(&sample);
                self.stats.ingest(&sample);
                self.last = Some(snap);
                self.last_error = None;
                self.clamp_selection();
            }
            AppEvent::Poll(PollEvent { outcome: Err(e), .. }) => {
                self.last_error = Some(e.to_string());
            }
            AppEvent::Action {
                label,
                outcome,
                tracking,
            } => {
                self.status = Some(match outcome {
                    Ok(()) => {
                        info!(%label, "action succeeded");
                        if let Some((agent, enable)) = tracking {
                            self.tracking.insert(agent, enable);
                        }
                        format!("{label}: done")
                    }
                    Err(e) => {
                        warn!(%label, "action failed: {e}");
                        format!("{label}: failed ({e})")
                    }
                });
            }
        }
    }

    fn selected_agent(&self) -> Option<&AgentSnapshot> {
        self.last.as_ref().and_then(|s| s.agents.get(self.agent_sel))
    }

    fn clamp_selection(&mut self) {
        let clamp = |sel: &mut usize, len: usize| *sel = (*sel).min(len.saturating_sub(1));
        let agents = self.last.as_ref().map(|s| s.agents.len()).unwrap_or(0);
        clamp(&mut self.agent_sel, agents);
        let (sessions, requests) = self
            .selected_agent()
            .map(|a| (a.sessions.len(), a.requests.len()))
            .unwrap_or((0, 0));
        clamp(&mut self.session_sel, sessions);
        clamp(&mut self.request_sel, requests);
    }

    fn move_selection(&mut self, down: bool) {
        let step = |sel: &mut usize| {
            *sel = if down { sel.saturating_add(1) } else { sel.saturating_sub(1) };
        };
        match self.focus {
            Focus::Agents => {
                step(&mut self.agent_sel);
                self.session_sel = 0;
                self.request_sel = 0;
            }
            Focus::Sessions => step(&mut self.session_sel),
            Focus::Requests => step(&mut self.request_sel),
        }
        self.clamp_selection();
    }

    fn cycle_application(&mut self, forward: bool) {
        if self.applications.is_empty() {
            return;
        }
        let n = self.applications.len();
        let cur = self
            .applications
            .iter()
            .position(|a| *a == self.scope.application)
            .unwrap_or(0);
        let next = if forward { (cur + 1) % n } else { (cur + n - 1) % n };
        self.switch_scope(Scope::application(self.applications[next].clone()));
    }

    fn spawn_action<F, Fut>(&mut self, label: String, f: F)
    where
        F: FnOnce(OeClient) -> Fut,
        Fut: Future<Output = Result<Value, ClientError>> + Send + 'static,
    {
        self.spawn_tracked_action(label, None, f);
    }

    fn spawn_tracked_action<F, Fut>(
        &mut self,
        label: String,
        tracking: Option<(String, bool)>,
        f: F,
    ) where
        F: FnOnce(OeClient) -> Fut,
        Fut: Future<Output = Result<Value, ClientError>> + Send + 'static,
    {
        info!(%label, "control action");
        let fut = f(self.client.clone());
        let tx = self.tx.clone();
        self.status = Some(format!("{label}..."));
        tokio::spawn(async move {
            let outcome = fut.await.map(|_| ());
            let _ = tx
                .send(AppEvent::Action {
                    label,
                    outcome,
                    tracking,
                })
                .await;
        });
    }

    pub fn handle_key(&mut self, k: KeyEvent) {
        if k.kind != KeyEventKind::Press {
            return;
        }
        let app = self.scope.application.clone();
        let agent = self.selected_agent().map(|a| a.agent.agent_id.clone());
        let session = self
            .selected_agent()
            .and_then(|a| a.sessions.get(self.session_sel))
            .map(|s| s.session_id.clone());
        let request = self
            .selected_agent()
            .and_then(|a| a.requests.get(self.request_sel))
            .map(|r| r.request_id.clone());

        match k.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Up => self.move_selection(false),
            KeyCode::Down => self.move_selection(true),
            KeyCode::Left => self.cycle_application(false),
            KeyCode::Right => self.cycle_application(true),
            KeyCode::Enter => {
                let next = match (&self.scope.agent, agent) {
                    (Some(_), _) => Some(self.scope.with_agent(None)),
                    (None, Some(id)) => Some(self.scope.with_agent(Some(id))),
                    (None, None) => None,
                };
                if let Some(s) = next {
                    self.switch_scope(s);
                }
            }
            KeyCode::Char('R') => {
                info!(scope = %self.scope, "view reset");
                self.charts.reset(self.scope.to_string());
                self.stats.reset(self.scope.to_string());
                self.status = Some("view reset".into());
            }
            KeyCode::Char('a') => {
                self.spawn_action(format!("add agent to {app}"), move |c| async move {
                    c.add_agent(&app).await
                });
            }
            KeyCode::Char('s') => {
                let Some(agent) = agent else { return };
                let finish = self.settings.wait_to_finish_ms;
                let after = self.settings.wait_after_stop_ms;
                self.spawn_action(format!("stop agent {agent}"), move |c| async move {
                    c.stop_agent(&app, &agent, finish, after).await
                });
            }
            KeyCode::Char('t') => {
                let Some(agent) = agent else { return };
                self.spawn_action(format!("trim idle sessions on {agent}"), move |c| async move {
                    c.trim_sessions(&app, &agent).await
                });
            }
            KeyCode::Char('k') => {
                let (Some(agent), Some(session)) = (agent, session) else { return };
                self.spawn_action(format!("terminate session {session}"), move |c| async move {
                    c.terminate_session(&app, &agent, &session).await
                });
            }
            KeyCode::Char('c') => {
                let Some(request) = request else { return };
                self.spawn_action(format!("cancel request {request}"), move |c| async move {
                    c.cancel_request(&app, &request).await
                });
            }
            KeyCode::Char('r') => {
                let Some(agent) = agent else { return };
                self.spawn_action(format!("reset statistics of {agent}"), move |c| async move {
                    c.reset_stat_data(&app, &agent).await
                });
            }
            KeyCode::Char('o') => {
                let Some(agent) = agent else { return };
                let enable = !self.tracking.get(&agent).copied().unwrap_or(false);
                let label = format!(
                    "{} ABL object tracking on {agent}",
                    if enable { "enable" } else { "disable" }
                );
                let change = Some((agent.clone(), enable));
                self.spawn_tracked_action(label, change, move |c| async move {
                    c.set_object_tracking(&app, &agent, enable).await
                });
            }
            _ => {}
        }
    }

    fn is_live_session(&self, key: &SeriesKey) -> bool {
        let (Some(id), Some(snap)) = (key.entity_id(), self.last.as_ref()) else {
            return false;
        };
        snap.agents.iter().any(|a| {
            a.agent.agent_id == id.agent && a.sessions.iter().any(|s| s.session_id == id.session)
        })
    }

    fn stats_keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = SESSION_MANAGER_METRICS
            .iter()
            .map(|m| SeriesKey::scalar(*m))
            .collect();
        if let Some(snap) = &self.last {
            keys.extend(snap.agent_metric_keys());
        }
        keys
    }

    fn window(&self, key: &SeriesKey) -> Window {
        let interval = self
            .charts
            .inferred_interval_millis(key, self.settings.poll_interval_ms as f64);
        Window {
            now: chrono::Utc::now().timestamp_millis(),
            span_ms: interval * self.charts.capacity() as f64,
        }
    }

    pub fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let area = f.area();

        // Root rows: header, charts, tables, requests + stats, status
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Ratio(1, 3),
                Constraint::Min(8),
                Constraint::Length(12),
                Constraint::Length(1),
            ])
            .split(area);

        draw_header(
            f,
            rows[0],
            self.client.base_url().as_str(),
            &self.scope,
            &self.applications,
        );

        let chart_cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(40),
                Constraint::Percentage(30),
                Constraint::Percentage(30),
            ])
            .split(rows[1]);

        let memory_key = SeriesKey::scalar(MEMORY_USED);
        // ended sessions keep their history but drop out of the legend
        let per_session: Vec<SeriesKey> = self
            .charts
            .keys_for_metric(SESSION_MEMORY)
            .filter(|k| self.is_live_session(k))
            .cloned()
            .collect();
        let memory_series = if per_session.is_empty() {
            self.charts.series(SeriesKind::Gauge, [&memory_key])
        } else {
            self.charts.series(SeriesKind::Gauge, &per_session)
        };
        draw_chart(
            f,
            chart_cols[0],
            "Session memory",
            &memory_series,
            self.window(&memory_key),
            |v| human(v as u64),
        );

        let requests_key = SeriesKey::scalar(REQUESTS);
        draw_chart(
            f,
            chart_cols[1],
            "Requests / poll",
            &self.charts.series(SeriesKind::Rate, [&requests_key]),
            self.window(&requests_key),
            count,
        );

        let state_keys = [SeriesKey::scalar(SESSIONS_BUSY), SeriesKey::scalar(SESSIONS_IDLE)];
        draw_chart(
            f,
            chart_cols[2],
            "Sessions busy / idle",
            &self.charts.series(SeriesKind::Gauge, &state_keys),
            self.window(&state_keys[0]),
            count,
        );

        let table_cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[2]);
        draw_agents(
            f,
            table_cols[0],
            self.last.as_ref(),
            self.agent_sel,
            &self.tracking,
            self.focus == Focus::Agents,
        );
        draw_sessions(
            f,
            table_cols[1],
            self.selected_agent(),
            self.session_sel,
            self.focus == Focus::Sessions,
        );

        let bottom_cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[3]);
        draw_requests(
            f,
            bottom_cols[0],
            self.selected_agent(),
            self.request_sel,
            self.focus == Focus::Requests,
        );
        draw_stats(f, bottom_cols[1], &self.stats, &self.stats_keys());

        draw_status(f, rows[4], self.status.as_deref(), self.last_error.as_deref());
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.stop_poller();
    }
}
