//! Terminal UI for the powchain node.
use std::{
    io,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use powchain_core::{constants::DEFAULT_DIFFICULTY, pow, Block as ChainBlock};
use ratatui::{
    layout::{Constraint, Direction, Flex, Layout, Rect},
    prelude::*,
    widgets::*,
    Frame,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug, Clone)]
struct Args {
    /// Base URL of the running powchain-node (e.g. http://127.0.0.1:8000)
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    node: String,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    #[default]
    Dashboard,
    Chain,
    Mine,
    Wallet,
    HashDemo,
}

impl Tab {
    /// Tabs with a text field swallow printable keys.
    fn takes_text(self) -> bool {
        matches!(self, Tab::Mine | Tab::Wallet | Tab::HashDemo)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Violation {
    index: u64,
    kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Validation {
    valid: bool,
    strict_valid: bool,
    length: usize,
    difficulty: u32,
    violation: Option<Violation>,
}

#[derive(Debug, Clone, Deserialize)]
struct Message {
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletInfo {
    label: Option<String>,
    network: String,
    public_key_compressed_hex: String,
    #[serde(rename = "addressP2PKH")]
    address_p2pkh: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Signed {
    signature_hex: String,
}

#[derive(Debug)]
struct App {
    args: Args,
    http: Client,
    tab: Tab,
    // dashboard
    validation: Option<Validation>,
    dashboard_status: Option<String>,
    last_refresh: Instant,
    // chain list, newest first
    chain_rows: Vec<ChainBlock>,
    chain_cursor: usize,
    chain_state: TableState,
    chain_scroll: ScrollbarState,
    chain_status: Option<String>,
    chain_popup: bool,
    // mining
    mine_data: String,
    mine_status: Option<String>,
    // wallet
    wallet: Option<WalletInfo>,
    wallet_testnet: bool,
    sign_message: String,
    wallet_status: Option<String>,
    // hash demo
    hash_input: String,
    hash_output: String,
    hash_zero_nibbles: u32,
}

// Each item in the chain table is 1 row high
const ITEM_HEIGHT: usize = 1;

impl App {
    fn new(args: Args) -> Self {
        Self {
            args,
            http: Client::new(),
            tab: Tab::Dashboard,
            validation: None,
            dashboard_status: None,
            last_refresh: Instant::now(),
            chain_rows: Vec::new(),
            chain_cursor: 0,
            chain_state: TableState::default(),
            chain_scroll: ScrollbarState::default(),
            chain_status: None,
            chain_popup: false,
            mine_data: String::new(),
            mine_status: None,
            wallet: None,
            wallet_testnet: false,
            sign_message: String::new(),
            wallet_status: None,
            hash_input: String::new(),
            hash_output: String::new(),
            hash_zero_nibbles: 0,
        }
    }

    fn base(&self) -> &str {
        self.args.node.trim_end_matches('/')
    }

    async fn refresh_dashboard(&mut self) {
        let url = format!("{}/chain/validate", self.base());
        match self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(resp) => match resp.json::<Validation>().await {
                Ok(v) => {
                    self.validation = Some(v);
                    self.dashboard_status = None;
                }
                Err(e) => self.dashboard_status = Some(format!("Decode /chain/validate failed: {e}")),
            },
            Err(e) => self.dashboard_status = Some(format!("Node unreachable: {e}")),
        }
        self.last_refresh = Instant::now();
    }

    async fn load_chain(&mut self) {
        let url = format!("{}/chain", self.base());
        match self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(resp) => match resp.json::<Vec<ChainBlock>>().await {
                Ok(mut rows) => {
                    rows.reverse();
                    self.chain_rows = rows;
                    self.chain_cursor = 0;
                    self.chain_status = None;
                }
                Err(e) => {
                    self.chain_rows.clear();
                    self.chain_status = Some(format!("Failed to decode blocks: {e}"));
                }
            },
            Err(e) => {
                self.chain_rows.clear();
                self.chain_cursor = 0;
                self.chain_status = Some(format!("Failed to load blocks: {e}"));
            }
        }
    }

    fn next_row(&mut self) {
        if self.tab != Tab::Chain || self.chain_rows.is_empty() {
            return;
        }
        let i = match self.chain_state.selected() {
            Some(i) if i + 1 < self.chain_rows.len() => i + 1,
            Some(_) => 0,
            None => 0,
        };
        self.select_row(i);
    }

    fn previous_row(&mut self) {
        if self.tab != Tab::Chain || self.chain_rows.is_empty() {
            return;
        }
        let i = match self.chain_state.selected() {
            Some(0) => self.chain_rows.len() - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.select_row(i);
    }

    fn select_row(&mut self, i: usize) {
        self.chain_cursor = i;
        self.chain_state.select(Some(i));
        self.chain_scroll = self.chain_scroll.position(i * ITEM_HEIGHT);
    }

    /// Empty input mines the placeholder block via `/mine`.
    async fn mine(&mut self) {
        let base = self.base().to_string();
        let request = if self.mine_data.is_empty() {
            self.http.post(format!("{base}/mine"))
        } else {
            self.http
                .post(format!("{base}/add-data"))
                .json(&json!({ "data": self.mine_data }))
        };
        self.mine_status = Some("Mining...".into());
        match request.send().await {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                match serde_json::from_str::<Message>(&body) {
                    Ok(m) if status.is_success() => {
                        self.mine_status = Some(format!("✅ {}", m.message));
                        self.mine_data.clear();
                        self.refresh_dashboard().await;
                        self.load_chain().await;
                    }
                    _ => self.mine_status = Some(format!("❌ {status} {body}")),
                }
            }
            Err(e) => self.mine_status = Some(format!("Mining request failed: {e}")),
        }
    }

    async fn create_wallet(&mut self) {
        let network = if self.wallet_testnet { "testnet" } else { "mainnet" };
        let url = format!("{}/wallet/new", self.base());
        match self
            .http
            .post(url)
            .json(&json!({ "network": network }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(resp) => match resp.json::<WalletInfo>().await {
                Ok(w) => {
                    self.wallet_status = Some(format!("Wallet created: {}", w.address_p2pkh));
                    self.wallet = Some(w);
                }
                Err(e) => self.wallet_status = Some(format!("Decode /wallet/new failed: {e}")),
            },
            Err(e) => self.wallet_status = Some(format!("POST /wallet/new failed: {e}")),
        }
    }

    async fn sign(&mut self) {
        let url = format!("{}/wallet/sign", self.base());
        match self
            .http
            .post(url)
            .json(&json!({ "message": self.sign_message }))
            .send()
            .await
        {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                self.wallet_status = Some(match serde_json::from_str::<Signed>(&body) {
                    Ok(s) if status.is_success() => format!("signature: {}", s.signature_hex),
                    _ => format!("POST /wallet/sign -> {status} {body}"),
                });
            }
            Err(e) => self.wallet_status = Some(format!("POST /wallet/sign failed: {e}")),
        }
    }

    fn update_hash_demo(&mut self) {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.hash_input.as_bytes());
        self.hash_output = hex::encode(digest);
        self.hash_zero_nibbles = pow::leading_zero_nibbles(&digest);
    }
}

fn data_preview(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // tracing
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    // terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(args);
    app.refresh_dashboard().await;
    app.load_chain().await;
    app.update_hash_demo();

    let res = run_app(&mut terminal, &mut app).await;

    // restore
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if crossterm::event::poll(Duration::from_millis(200))? {
            if let CEvent::Key(key) = event::read()? {
                if handle_key(app, key).await? {
                    break;
                }
            }
        }

        if app.last_refresh.elapsed() >= Duration::from_secs(2) {
            app.refresh_dashboard().await;
        }
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return Ok(true),
        KeyCode::Esc => return Ok(true),
        KeyCode::Tab => {
            app.tab = match app.tab {
                Tab::Dashboard => Tab::Chain,
                Tab::Chain => Tab::Mine,
                Tab::Mine => Tab::Wallet,
                Tab::Wallet => Tab::HashDemo,
                Tab::HashDemo => Tab::Dashboard,
            };
        }
        KeyCode::BackTab => {
            app.tab = match app.tab {
                Tab::Dashboard => Tab::HashDemo,
                Tab::Chain => Tab::Dashboard,
                Tab::Mine => Tab::Chain,
                Tab::Wallet => Tab::Mine,
                Tab::HashDemo => Tab::Wallet,
            };
        }
        KeyCode::Char('q') if !app.tab.takes_text() => return Ok(true),
        KeyCode::Char('r') if !app.tab.takes_text() => {
            app.refresh_dashboard().await;
            app.load_chain().await;
        }
        KeyCode::Down => app.next_row(),
        KeyCode::Up => app.previous_row(),
        KeyCode::Char('p') if app.tab == Tab::Chain => {
            app.chain_popup = !app.chain_popup;
        }
        _ => match app.tab {
            Tab::Mine => match key.code {
                KeyCode::Char(c) if !c.is_control() => app.mine_data.push(c),
                KeyCode::Backspace => {
                    app.mine_data.pop();
                }
                KeyCode::Enter => app.mine().await,
                _ => {}
            },
            Tab::Wallet => match key.code {
                KeyCode::Char('n') if ctrl => app.create_wallet().await,
                KeyCode::Char('t') if ctrl => app.wallet_testnet = !app.wallet_testnet,
                KeyCode::Char(c) if !c.is_control() => app.sign_message.push(c),
                KeyCode::Backspace => {
                    app.sign_message.pop();
                }
                KeyCode::Enter => app.sign().await,
                _ => {}
            },
            Tab::HashDemo => match key.code {
                KeyCode::Char(c) if !c.is_control() => {
                    app.hash_input.push(c);
                    app.update_hash_demo();
                }
                KeyCode::Backspace => {
                    app.hash_input.pop();
                    app.update_hash_demo();
                }
                _ => {}
            },
            _ => {}
        },
    }
    Ok(false)
}

fn ui(f: &mut Frame, app: &mut App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);

    let titles = ["Dashboard", "Chain", "Mine", "Wallet", "HashDemo"]
        .iter()
        .map(|t| Line::from(*t))
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .select(app.tab as usize)
        .block(Block::default().borders(Borders::ALL).title("powchain-tui"))
        .style(Style::default().fg(Color::Green))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match app.tab {
        Tab::Dashboard => render_dashboard(f, chunks[1], app),
        Tab::Chain => render_chain(f, chunks[1], app),
        Tab::Mine => render_mine(f, chunks[1], app),
        Tab::Wallet => render_wallet(f, chunks[1], app),
        Tab::HashDemo => render_hashdemo(f, chunks[1], app),
    }

    let help = Paragraph::new(
        "ESC quit • TAB prev/next tab • r refresh • Chain: ↑/↓, p details • Mine: Enter mines • Wallet: Ctrl-N new, Ctrl-T network, Enter sign",
    )
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().borders(Borders::ALL).title("help"));
    f.render_widget(help, chunks[2]);
}

fn render_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut lines = Vec::new();
    if let Some(v) = &app.validation {
        lines.push(Line::from(format!("Height      : {}", v.length.saturating_sub(1))));
        lines.push(Line::from(format!("Difficulty  : {}", v.difficulty)));
        lines.push(Line::from(format!("Linkage     : {}", if v.valid { "ok" } else { "BROKEN" })));
        lines.push(Line::from(format!(
            "Strict      : {}",
            if v.strict_valid { "ok" } else { "FAILED" }
        )));
        if let Some(violation) = &v.violation {
            lines.push(Line::from(format!(
                "First issue : block {} ({})",
                violation.index, violation.kind
            )));
        }
    }
    if let Some(tip) = app.chain_rows.first() {
        lines.push(Line::from(format!("Tip hash    : {}", tip.hash)));
    }
    if let Some(status) = &app.dashboard_status {
        lines.push(Line::from(status.clone()).style(Style::default().fg(Color::Red)));
    }
    let dash =
        Paragraph::new(lines).block(Block::default().title("Overview").borders(Borders::ALL));
    f.render_widget(dash, chunks[0]);

    let about = Paragraph::new(vec![
        Line::from("powchain-tui"),
        Line::from("• Reads /chain and /chain/validate"),
        Line::from("• Mines via /mine and /add-data"),
        Line::from("• Creates a wallet and signs messages"),
        Line::from("• Live SHA-256 hash demo"),
    ])
    .block(Block::default().title("About").borders(Borders::ALL));
    f.render_widget(about, chunks[1]);
}

fn render_chain(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.chain_rows.iter().enumerate().map(|(i, b)| {
        Row::new(vec![
            Cell::from(b.index.to_string()),
            Cell::from(b.timestamp.to_string()),
            Cell::from(b.nonce.to_string()),
            Cell::from(b.hash.clone()),
            Cell::from(b.previous_hash.clone()),
            Cell::from(data_preview(&b.data)),
        ])
        .style(if i == app.chain_cursor {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        })
    });
    let title = match &app.chain_status {
        Some(status) => format!("Chain blocks ({status})"),
        None => "Chain blocks".to_string(),
    };
    let table = Table::new(
        rows,
        vec![
            Constraint::Length(6),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(66),
            Constraint::Length(66),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["idx", "ts", "nonce", "hash", "prev", "data"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_stateful_widget(table, area, &mut app.chain_state);

    if app.chain_popup {
        let popup = Block::bordered()
            .style(Style::default().bg(Color::Black).fg(Color::Yellow))
            .title("Block details")
            .title_style(Style::new().yellow().bold())
            .border_style(Style::new().red().bold());
        let items = match app.chain_rows.get(app.chain_cursor) {
            None => vec!["No block selected".to_string()],
            Some(b) => vec![
                format!(" Index     : {}", b.index),
                format!(" Timestamp : {}", b.timestamp),
                format!(" Nonce     : {}", b.nonce),
                format!(" Hash      : {}", b.hash),
                format!(" Prev hash : {}", b.previous_hash),
                format!(" Data      : {}", data_preview(&b.data)),
            ],
        };
        let list = List::new(items).block(popup.clone());
        let popup_area = centered_area(area, 60, 25);
        // clears out any background in the area before rendering the popup
        f.render_widget(Clear, popup_area);
        f.render_widget(popup, popup_area);
        f.render_widget(list, popup_area);
    }
}

fn render_mine(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(0),
        ])
        .split(area);

    let difficulty = app
        .validation
        .as_ref()
        .map_or(DEFAULT_DIFFICULTY, |v| v.difficulty);
    let top = Paragraph::new(format!("Node difficulty: {difficulty} leading zero hex digits"))
        .block(Block::default().borders(Borders::ALL).title("Target"));
    f.render_widget(top, chunks[0]);

    let data = Paragraph::new(app.mine_data.clone()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Block data (type, Backspace, Enter to mine; empty mines placeholder)"),
    );
    f.render_widget(data, chunks[1]);

    let status = Paragraph::new(app.mine_status.clone().unwrap_or_default())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}

fn render_wallet(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let network = if app.wallet_testnet { "testnet" } else { "mainnet" };
    let mut lines = vec![Line::from(format!("New wallet network : {network}"))];
    match &app.wallet {
        Some(w) => {
            lines.push(Line::from(format!(
                "Address            : {} ({})",
                w.address_p2pkh, w.network
            )));
            lines.push(Line::from(format!("Public key         : {}", w.public_key_compressed_hex)));
            if let Some(label) = &w.label {
                lines.push(Line::from(format!("Label              : {label}")));
            }
        }
        None => lines.push(Line::from("No wallet yet. Press Ctrl-N to create one.")),
    }
    let info = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(info, chunks[0]);

    let message = Paragraph::new(app.sign_message.clone())
        .block(Block::default().borders(Borders::ALL).title("Message (Enter to sign)"));
    f.render_widget(message, chunks[1]);

    let status = Paragraph::new(app.wallet_status.clone().unwrap_or_default())
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}

fn render_hashdemo(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(area);

    let input = Paragraph::new(app.hash_input.clone())
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Input"));
    f.render_widget(input, chunks[0]);

    let out = Paragraph::new(format!(
        "sha256: {}\nleading zero hex digits: {}",
        app.hash_output, app.hash_zero_nibbles
    ))
    .block(Block::default().borders(Borders::ALL).title("Output"));
    f.render_widget(out, chunks[1]);

    let help = Paragraph::new(
        "Type to update the hash. A block qualifies when its leading zero hex digits reach the difficulty.",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[2]);
}

/// Create a centered rect using the given percentage of the available rect
fn centered_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let [area] = vertical.areas(area);

    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = horizontal.areas(area);

    area
}
