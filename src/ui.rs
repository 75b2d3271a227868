use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use playzone::reports::{daily_report, local_date, DailyReport};
use playzone::{
    format_currency, format_duration, render_invoice, AppConfig, CarStatus, PaymentMethod,
    PosError, Store, Venue,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

const TICK_RATE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Inventory,
    Reports,
    Settings,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Dashboard => Page::Inventory,
            Page::Inventory => Page::Reports,
            Page::Reports => Page::Settings,
            Page::Settings => Page::Dashboard,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Dashboard => Page::Settings,
            Page::Inventory => Page::Dashboard,
            Page::Reports => Page::Inventory,
            Page::Settings => Page::Reports,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Inventory => "Inventory",
            Page::Reports => "Reports",
            Page::Settings => "Settings",
        }
    }
}

/// Last action result shown in the status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

pub struct App {
    pub config: AppConfig,
    pub current_page: Page,
    pub sessions_state: TableState,
    pub cars_state: TableState,
    pub report_state: TableState,
    pub menu_state: TableState,
    pub show_detail: bool,
    pub payment_method: PaymentMethod,
    pub notice: Option<Notice>,
    /// Clock used for every live figure on screen
    pub now: DateTime<Utc>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            current_page: Page::Dashboard,
            sessions_state: TableState::default(),
            cars_state: TableState::default(),
            report_state: TableState::default(),
            menu_state: TableState::default(),
            show_detail: false,
            payment_method: PaymentMethod::Cash,
            notice: None,
            now: Utc::now(),
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.show_detail = false;
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.show_detail = false;
    }

    pub fn today<S: Store>(&self, venue: &Venue<S>) -> DailyReport {
        let offset = self.config.offset();
        daily_report(venue.transactions(), local_date(self.now, offset), offset)
    }

    fn page_state(&mut self) -> &mut TableState {
        match self.current_page {
            Page::Dashboard => &mut self.sessions_state,
            Page::Inventory => &mut self.cars_state,
            Page::Reports => &mut self.report_state,
            Page::Settings => &mut self.menu_state,
        }
    }

    fn page_len<S: Store>(&self, venue: &Venue<S>) -> usize {
        match self.current_page {
            Page::Dashboard => venue.active_sessions().len(),
            Page::Inventory => venue.cars().len(),
            Page::Reports => self.today(venue).transactions.len(),
            Page::Settings => venue.menu().len(),
        }
    }

    pub fn next<S: Store>(&mut self, venue: &Venue<S>) {
        let len = self.page_len(venue);
        if len == 0 {
            return;
        }
        let state = self.page_state();
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous<S: Store>(&mut self, venue: &Venue<S>) {
        let len = self.page_len(venue);
        if len == 0 {
            return;
        }
        let state = self.page_state();
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    /// Keep every selection inside its (possibly shrunk) list
    pub fn clamp_selections<S: Store>(&mut self, venue: &Venue<S>) {
        let report_len = self.today(venue).transactions.len();
        clamp(&mut self.sessions_state, venue.active_sessions().len());
        clamp(&mut self.cars_state, venue.cars().len());
        clamp(&mut self.report_state, report_len);
        clamp(&mut self.menu_state, venue.menu().len());
    }

    pub fn selected_session_id<S: Store>(&self, venue: &Venue<S>) -> Option<String> {
        self.sessions_state
            .selected()
            .and_then(|i| venue.active_sessions().get(i))
            .map(|s| s.id.clone())
    }

    pub fn selected_car_id<S: Store>(&self, venue: &Venue<S>) -> Option<String> {
        self.cars_state
            .selected()
            .and_then(|i| venue.cars().get(i))
            .map(|c| c.id.clone())
    }

    pub fn cycle_payment(&mut self) {
        let all = PaymentMethod::all();
        let index = all.iter().position(|m| *m == self.payment_method).unwrap_or(0);
        self.payment_method = all[(index + 1) % all.len()];
    }

    fn report_result<T>(&mut self, result: Result<T, PosError>, success: impl FnOnce(T) -> String) {
        self.notice = Some(match result {
            Ok(value) => Notice::Info(success(value)),
            Err(e) => match e.hint() {
                Some(hint) => Notice::Error(format!("{} ({})", e, hint)),
                None => Notice::Error(e.to_string()),
            },
        });
    }

    fn checkout_selected<S: Store>(&mut self, venue: &mut Venue<S>) {
        let Some(id) = self.selected_session_id(venue) else {
            self.notice = Some(Notice::Error("No session selected".into()));
            return;
        };
        let result = venue.checkout(&id, self.payment_method, self.now);
        self.report_result(result, |txn| {
            format!("Checked out {} for {}", txn.zone, format_currency(txn.total_cost))
        });
        self.show_detail = false;
    }

    fn set_selected_car_status<S: Store>(&mut self, venue: &mut Venue<S>, status: CarStatus) {
        let Some(id) = self.selected_car_id(venue) else {
            self.notice = Some(Notice::Error("No car selected".into()));
            return;
        };
        let result = venue.set_car_status(&id, status);
        self.report_result(result, |_| format!("Car {} set to {}", id, status));
    }

    /// Apply one key press. Returns true when the UI should close.
    pub fn handle_key<S: Store>(&mut self, key: KeyEvent, venue: &mut Venue<S>) -> bool {
        // Key presses act at the instant they arrive, not at the last tick
        self.now = Utc::now();

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_page();
                } else {
                    self.next_page();
                }
            }
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Down | KeyCode::Char('j') => self.next(venue),
            KeyCode::Up | KeyCode::Char('k') => self.previous(venue),
            KeyCode::Char('g') => {
                let result = venue.reload();
                self.report_result(result, |_| "Reloaded from store".to_string());
            }
            KeyCode::Enter if self.current_page == Page::Dashboard => self.toggle_detail(),
            KeyCode::Char('p') if self.current_page == Page::Dashboard => self.cycle_payment(),
            KeyCode::Char('x') if self.current_page == Page::Dashboard => {
                self.checkout_selected(venue)
            }
            KeyCode::Char('r') if self.current_page == Page::Inventory => {
                self.set_selected_car_status(venue, CarStatus::Ready)
            }
            KeyCode::Char('c') if self.current_page == Page::Inventory => {
                self.set_selected_car_status(venue, CarStatus::Charging)
            }
            KeyCode::Char('m') if self.current_page == Page::Inventory => {
                self.set_selected_car_status(venue, CarStatus::Maintenance)
            }
            _ => {}
        }
        self.clamp_selections(venue);
        false
    }
}

fn clamp(state: &mut TableState, len: usize) {
    match state.selected() {
        _ if len == 0 => state.select(None),
        Some(i) if i >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

pub fn run_ui<S: Store>(app: &mut App, venue: &mut Venue<S>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app, venue);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: Store>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    venue: &mut Venue<S>,
) -> io::Result<()> {
    app.clamp_selections(venue);
    let mut last_tick = Instant::now();

    loop {
        app.now = Utc::now();
        terminal.draw(|f| ui(f, app, venue))?;

        // Redraw at least once per tick so running timers move
        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key, venue) {
                    return Ok(());
                }
            }
        }
        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }
}

fn ui<S: Store>(f: &mut Frame, app: &mut App, venue: &Venue<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app, venue);

    if app.show_detail && app.current_page == Page::Dashboard {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(chunks[1]);

        render_sessions(f, content_chunks[0], app, venue);
        render_invoice_preview(f, content_chunks[1], app, venue);
    } else {
        match app.current_page {
            Page::Dashboard => render_sessions(f, chunks[1], app, venue),
            Page::Inventory => render_inventory(f, chunks[1], app, venue),
            Page::Reports => render_reports(f, chunks[1], app, venue),
            Page::Settings => render_settings(f, chunks[1], app, venue),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn table_header(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.iter().map(|h| Cell::from(*h).style(header_style())))
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn bordered(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn render_header<S: Store>(f: &mut Frame, area: Rect, app: &App, venue: &Venue<S>) {
    let pages = [Page::Dashboard, Page::Inventory, Page::Reports, Page::Settings];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Active: {}", venue.active_sessions().len()),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Free zones: {}", venue.available_zones().len()),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Ready cars: {}", venue.ready_cars().len()),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", app.config.venue_name)),
    );

    f.render_widget(header, area);
}

fn render_sessions<S: Store>(f: &mut Frame, area: Rect, app: &mut App, venue: &Venue<S>) {
    let now = app.now;
    let rows = venue.active_sessions().iter().map(|session| {
        let bill = session.bill(now, venue.billing_config(), venue.menu());
        let timer_color = if bill.chargeable_minutes > 0 {
            Color::Red
        } else {
            Color::Green
        };

        Row::new(vec![
            Cell::from(session.zone.clone()),
            Cell::from(truncate(&session.car_ids.join(", "), 18)),
            Cell::from(format_duration(bill.elapsed_seconds * 1000))
                .style(Style::default().fg(timer_color)),
            Cell::from(format_currency(bill.play_cost)),
            Cell::from(format_currency(bill.order_cost)),
            Cell::from(format_currency(bill.total_cost)).style(Style::default().fg(Color::Cyan)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(20),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(14),
        ],
    )
    .header(table_header(&["Zone", "Cars", "Time", "Play", "Café", "Total"]))
    .block(bordered(format!(
        " Active Sessions ({} free: {}) ",
        venue.available_zones().len(),
        venue.available_zones().join(", ")
    )))
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.sessions_state);
}

fn render_invoice_preview<S: Store>(f: &mut Frame, area: Rect, app: &App, venue: &Venue<S>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Checkout preview · {} ", app.payment_method));

    let text = match app.selected_session_id(venue) {
        Some(id) => match venue.preview_checkout(&id, app.payment_method, app.now) {
            Ok(txn) => render_invoice(&app.config.venue_name, &txn, app.config.offset()),
            Err(e) => e.to_string(),
        },
        None => "No session selected".to_string(),
    };

    let mut lines: Vec<Line> = text.lines().map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  p: payment method · x: checkout · Enter: close",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn status_color(status: CarStatus) -> Color {
    match status {
        CarStatus::Ready => Color::Green,
        CarStatus::InUse => Color::Red,
        CarStatus::Charging => Color::Yellow,
        CarStatus::Maintenance => Color::Magenta,
    }
}

fn render_inventory<S: Store>(f: &mut Frame, area: Rect, app: &mut App, venue: &Venue<S>) {
    let rows = venue.cars().iter().map(|car| {
        Row::new(vec![
            Cell::from(car.id.clone()),
            Cell::from(truncate(&car.name, 22)),
            Cell::from(car.kind.as_str()),
            Cell::from(car.status.as_str()).style(Style::default().fg(status_color(car.status))),
            Cell::from(format_currency(car.purchase_price)),
            Cell::from(car.purchase_date.to_string()),
            Cell::from(format!("{} mo", car.lifespan_months)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(24),
            Constraint::Length(14),
            Constraint::Length(13),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(8),
        ],
    )
    .header(table_header(&[
        "Id", "Name", "Kind", "Status", "Price", "Bought", "Lifespan",
    ]))
    .block(bordered(format!(" Cars ({}) ", venue.cars().len())))
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.cars_state);
}

fn render_reports<S: Store>(f: &mut Frame, area: Rect, app: &mut App, venue: &Venue<S>) {
    let report = app.today(venue);
    let offset = app.config.offset();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut payment_spans = vec![Span::styled("  By payment: ", label)];
    for total in &report.by_payment {
        payment_spans.push(Span::raw(format!(
            "{} {}   ",
            total.method,
            format_currency(total.amount)
        )));
    }

    let summary = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("  Total revenue: ", label),
            Span::styled(
                format_currency(report.total_revenue),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled("   RC: ", label),
            Span::raw(format_currency(report.play_revenue)),
            Span::styled("   Café: ", label),
            Span::raw(format_currency(report.cafe_revenue)),
        ]),
        Line::from(""),
        Line::from(payment_spans),
    ])
    .block(bordered(format!(" Daily revenue ({}) ", report.date)));
    f.render_widget(summary, chunks[0]);

    let rows = report.transactions.iter().map(|t| {
        Row::new(vec![
            Cell::from(t.completed_at.with_timezone(&offset).format("%H:%M:%S").to_string()),
            Cell::from(t.zone.clone()),
            Cell::from(truncate(&t.car_ids.join(", "), 18)),
            Cell::from(format_currency(t.play_cost)),
            Cell::from(format_currency(t.order_cost)),
            Cell::from(format_currency(t.total_cost)).style(Style::default().fg(Color::Cyan)),
            Cell::from(t.payment_method.as_str()),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(20),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(13),
        ],
    )
    .header(table_header(&[
        "Time", "Zone", "Cars", "Play", "Café", "Total", "Payment",
    ]))
    .block(bordered(" Today's transactions ".to_string()))
    .highlight_style(Style::default().bg(Color::DarkGray))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.report_state);
}

fn render_settings<S: Store>(f: &mut Frame, area: Rect, app: &mut App, venue: &Venue<S>) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let config = venue.billing_config();
    let settings = Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Rate per minute: ", label),
            Span::raw(format_currency(config.play_rate_per_minute)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Free minutes: ", label),
            Span::raw(config.free_play_minutes.to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Database: ", label),
            Span::raw(app.config.db_path.display().to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Expenses on file: ", label),
            Span::raw(venue.expenses().len().to_string()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  Edit with: playzone config set / playzone menu ...",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
    ])
    .block(bordered(" Billing ".to_string()));
    f.render_widget(settings, chunks[0]);

    let rows = venue.menu().iter().map(|item| {
        Row::new(vec![
            Cell::from(item.id.to_string()),
            Cell::from(truncate(&item.name, 26)),
            Cell::from(format_currency(item.price)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(28),
            Constraint::Length(14),
        ],
    )
    .header(table_header(&["Id", "Item", "Price"]))
    .block(bordered(format!(" Menu ({}) ", venue.menu().len())))
    .highlight_style(Style::default().bg(Color::DarkGray))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.menu_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    match &app.notice {
        Some(Notice::Info(text)) => {
            status_spans.push(Span::styled(format!(" ✓ {} ", text), Style::default().fg(Color::Green)));
            status_spans.push(Span::raw("|"));
        }
        Some(Notice::Error(text)) => {
            status_spans.push(Span::styled(format!(" ✗ {} ", text), Style::default().fg(Color::Red)));
            status_spans.push(Span::raw("|"));
        }
        None => {}
    }

    let keys: &[(&str, &str)] = match app.current_page {
        Page::Dashboard => &[("Enter", "Preview"), ("p", "Payment"), ("x", "Checkout")],
        Page::Inventory => &[("r", "Ready"), ("c", "Charging"), ("m", "Maintenance")],
        Page::Reports | Page::Settings => &[],
    };
    for (key, label) in keys {
        status_spans.push(Span::styled(format!(" {}", key), Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(format!(" {} |", label)));
    }

    status_spans.push(Span::styled(" Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("g", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Reload | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
