//! Live observability dashboard.

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use redcrawl_client::api::{OutboxEntry, Run};
use redcrawl_client::{ApiClient, ConnectionState, LiveStream, LiveView};
use std::io;
use std::time::{Duration, Instant};

use crate::output;

pub async fn run_dashboard(client: &ApiClient) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(LiveStream::from_client(client));
    let res = run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{:?}", err)
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Outbox,
    Runs,
}

struct App {
    stream: LiveStream,
    view: LiveView,
    focus: Focus,
    outbox_state: TableState,
    runs_state: TableState,
}

impl App {
    fn new(stream: LiveStream) -> App {
        let view = stream.view();
        App {
            stream,
            view,
            focus: Focus::Outbox,
            outbox_state: TableState::default(),
            runs_state: TableState::default(),
        }
    }

    fn refresh(&mut self) {
        self.view = self.stream.view();
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Outbox => Focus::Runs,
            Focus::Runs => Focus::Outbox,
        };
    }

    fn focused(&mut self) -> (&mut TableState, usize) {
        match self.focus {
            Focus::Outbox => (&mut self.outbox_state, self.view.snapshot.outbox.len()),
            Focus::Runs => (&mut self.runs_state, self.view.snapshot.runs.len()),
        }
    }

    fn next(&mut self) {
        let (state, len) = self.focused();
        if len == 0 {
            state.select(None);
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    fn previous(&mut self) {
        let (state, len) = self.focused();
        if len == 0 {
            state.select(None);
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i.min(len) - 1,
        };
        state.select(Some(i));
    }
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        app.stream.close();
                        return Ok(());
                    }
                    KeyCode::Tab => app.toggle_focus(),
                    KeyCode::Down | KeyCode::Char('j') => app.next(),
                    KeyCode::Up | KeyCode::Char('k') => app.previous(),
                    _ => {}
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            app.refresh();
            last_tick = Instant::now();
        }
        // Let the stream reader make progress between frames.
        tokio::task::yield_now().await;
    }
}

fn badge(state: ConnectionState) -> (&'static str, Color) {
    match state {
        ConnectionState::Connected => ("● Live", Color::Green),
        ConnectionState::Connecting => ("● Connecting", Color::Yellow),
        ConnectionState::Disconnected => ("● Disconnected", Color::Red),
    }
}

fn status_color(status: &str) -> Color {
    match status.to_ascii_uppercase().as_str() {
        "PENDING" => Color::Yellow,
        "RUNNING" => Color::Blue,
        "PUBLISHED" | "COMPLETED" => Color::Green,
        "FAILED" => Color::Red,
        _ => Color::Gray,
    }
}

fn outbox_row(entry: &OutboxEntry) -> [String; 5] {
    [
        entry.id.to_string(),
        output::truncate(&entry.event_type, 40),
        entry.status.clone(),
        output::timestamp(entry.created_at.as_deref()),
        entry.attempts.to_string(),
    ]
}

fn run_row(run: &Run) -> [String; 6] {
    [
        run.id.to_string(),
        run.run_kind.clone(),
        run.status.clone(),
        output::optional(run.subscription_id),
        output::timestamp(run.started_at.as_deref()),
        output::timestamp(run.ended_at.as_deref()),
    ]
}

fn status_cell(status: String) -> Cell<'static> {
    let color = status_color(&status);
    Cell::from(status).style(Style::default().fg(color))
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.iter().map(|t| Cell::from(*t)))
        .style(Style::default().add_modifier(Modifier::BOLD))
}

fn table_block(title: &'static str, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn render_empty(f: &mut Frame, area: Rect, title: &'static str, message: &'static str, focused: bool) {
    let paragraph = Paragraph::new(message)
        .style(Style::default().fg(Color::DarkGray))
        .block(table_block(title, focused));
    f.render_widget(paragraph, area);
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Percentage(50),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let (label, color) = badge(app.view.status);
    let mut header = vec![
        Span::styled("Redcrawl Observability  ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(label, Style::default().fg(color)),
    ];
    if let Some(error) = &app.view.snapshot.error {
        header.push(Span::styled(
            format!("  server error: {}", error),
            Style::default().fg(Color::Red),
        ));
    }
    if app.view.malformed > 0 {
        header.push(Span::styled(
            format!("  {} malformed update(s) dropped", app.view.malformed),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let header = Paragraph::new(Line::from(header))
        .block(Block::default().borders(Borders::ALL).title("Live"));
    f.render_widget(header, chunks[0]);

    let outbox_focused = app.focus == Focus::Outbox;
    if app.view.snapshot.outbox.is_empty() {
        render_empty(f, chunks[1], "Outbox", "No outbox entries", outbox_focused);
    } else {
        let rows = app.view.snapshot.outbox.iter().map(|entry| {
            let [id, event_type, status, created, attempts] = outbox_row(entry);
            Row::new(vec![
                Cell::from(id),
                Cell::from(event_type),
                status_cell(status),
                Cell::from(created),
                Cell::from(attempts),
            ])
        });
        let widths = [
            Constraint::Length(8),
            Constraint::Min(20),
            Constraint::Length(12),
            Constraint::Length(20),
            Constraint::Length(9),
        ];
        let table = Table::new(rows, widths)
            .header(header_row(&["ID", "EVENT TYPE", "STATUS", "CREATED AT", "ATTEMPTS"]))
            .block(table_block("Outbox", outbox_focused))
            .highlight_symbol(">> ");
        f.render_stateful_widget(table, chunks[1], &mut app.outbox_state);
    }

    if app.view.snapshot.runs.is_empty() {
        render_empty(f, chunks[2], "Runs", "No runs", !outbox_focused);
    } else {
        let rows = app.view.snapshot.runs.iter().map(|run| {
            let [id, kind, status, subscription, started, ended] = run_row(run);
            Row::new(vec![
                Cell::from(id),
                Cell::from(kind),
                status_cell(status),
                Cell::from(subscription),
                Cell::from(started),
                Cell::from(ended),
            ])
        });
        let widths = [
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(13),
            Constraint::Length(20),
            Constraint::Length(20),
        ];
        let table = Table::new(rows, widths)
            .header(header_row(&["ID", "RUN KIND", "STATUS", "SUBSCRIPTION", "STARTED", "ENDED"]))
            .block(table_block("Runs", !outbox_focused))
            .highlight_symbol(">> ");
        f.render_stateful_widget(table, chunks[2], &mut app.runs_state);
    }

    let footer = Paragraph::new("q: Quit | Tab: Switch table | ↑/↓: Navigate")
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(footer, chunks[3]);
}
