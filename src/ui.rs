use blockopoly_client::{
    board::{
        self,
        BOARD,
        BOARD_SIZE,
        Square,
        SquareKind,
    },
    dispatch::{
        DispatchState,
        GameAction,
        Modal,
    },
    reconcile::GameSnapshot,
    types::{
        Address,
        TradeInputs,
        TradeKind,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Roll,
    Retry,
    CloseCard,
    Visibility(bool),
    Action(GameAction),
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Reads terminal events on a dedicated thread; `event::read` blocks.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let event = event::read();
            let failed = event.is_err();
            if tx.send(event).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(input: &mut InputEventReceiver) -> Result<Event> {
    match input.recv().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input reader stopped")),
    }
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    selected: u8,
    actor: Option<Address>,
    snapshot: Option<GameSnapshot>,
    card_open: bool,
    /// A drawn card still waits for `process_card`, even with its popup closed.
    card_pending: bool,
    sync_error: Option<String>,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl std::fmt::Debug for UiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiState")
            .field("mode", &self.mode)
            .field("selected", &self.selected)
            .finish()
    }
}

impl UiState {
    pub fn new(actor: Address) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    /// Last background refresh failure, cleared by the next good snapshot.
    pub fn set_sync_error(&mut self, error: Option<String>) {
        self.sync_error = error;
    }

    fn other_players(&self) -> Vec<(Address, String)> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        snapshot
            .players
            .iter()
            .filter(|p| Some(&p.address) != self.actor.as_ref())
            .map(|p| (p.address.clone(), p.display_name.clone()))
            .collect()
    }

    fn owned_by(&self, address: Option<&Address>) -> Vec<u8> {
        match (&self.snapshot, address) {
            (Some(snapshot), Some(address)) => snapshot
                .ownership
                .iter()
                .filter(|(_, entry)| &entry.owner == address)
                .map(|(id, _)| *id)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
    Trade(TradeForm),
    TradeId(TradeIdForm),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum TradeFocus {
    #[default]
    Counterparty,
    Offer,
    Request,
    OfferCash,
    RequestCash,
}

impl TradeFocus {
    fn next(self) -> Self {
        match self {
            TradeFocus::Counterparty => TradeFocus::Offer,
            TradeFocus::Offer => TradeFocus::Request,
            TradeFocus::Request => TradeFocus::OfferCash,
            TradeFocus::OfferCash => TradeFocus::RequestCash,
            TradeFocus::RequestCash => TradeFocus::Counterparty,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct TradeForm {
    counter_of: Option<u64>,
    focus: TradeFocus,
    counterparty_idx: usize,
    cursor: usize,
    offered: Vec<u8>,
    requested: Vec<u8>,
    offered_cash: u64,
    requested_cash: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TradeResponse {
    Accept,
    Reject,
    Counter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct TradeIdForm {
    response: TradeResponse,
    value: u64,
}

fn trade_kind(form: &TradeForm) -> TradeKind {
    let gives_property = !form.offered.is_empty();
    let gets_property = !form.requested.is_empty();
    let cash = form.offered_cash > 0 || form.requested_cash > 0;
    match (gives_property, gets_property, cash) {
        (true, true, false) => TradeKind::PropertyForProperty,
        (true, false, _) => TradeKind::PropertyForCash,
        (false, true, _) => TradeKind::CashForProperty,
        _ => TradeKind::Mixed,
    }
}

fn toggle(list: &mut Vec<u8>, id: u8) {
    if let Some(pos) = list.iter().position(|x| *x == id) {
        list.remove(pos);
    } else {
        list.push(id);
    }
}

fn edit_amount(value: &mut u64, code: KeyCode) -> bool {
    match code {
        KeyCode::Backspace => *value /= 10,
        KeyCode::Char(c) if c.is_ascii_digit() => {
            let digit = u64::from(c as u8 - b'0');
            *value = value.saturating_mul(10).saturating_add(digit);
        }
        KeyCode::Up | KeyCode::Char('+') => *value = value.saturating_add(1),
        KeyCode::Down | KeyCode::Char('-') => *value = value.saturating_sub(1),
        _ => return false,
    }
    true
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout());
    state.terminal = Some(Terminal::new(backend)?);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        stdout(),
        crossterm::event::DisableFocusChange,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(
    state: &mut UiState,
    snapshot: Option<&GameSnapshot>,
    dispatch: &DispatchState,
) -> Result<()> {
    if let Some(snapshot) = snapshot {
        state.snapshot = Some(snapshot.clone());
    }
    state.card_open = matches!(dispatch.modal, Some(Modal::Card(_)));
    state.card_pending = dispatch.pending_card.is_some();
    if let Some(mut term) = state.terminal.take() {
        let drawn = term.draw(|f| ui(f, state, dispatch)).map(|_| ());
        state.terminal = Some(term);
        drawn?;
    }
    Ok(())
}

/// Maps a terminal event onto a user intent, updating local UI state.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        Event::FocusGained => return Some(UserEvent::Visibility(true)),
        Event::FocusLost => return Some(UserEvent::Visibility(false)),
        _ => return None,
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }

    let mode = std::mem::take(&mut state.mode);
    let (mode, event) = match mode {
        Mode::Normal => return interpret_normal(state, key),
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => (Mode::Normal, Some(UserEvent::Quit)),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                (Mode::Normal, Some(UserEvent::Redraw))
            }
            _ => (Mode::QuitModal, None),
        },
        Mode::TradeId(form) => interpret_trade_id(form, key),
        Mode::Trade(form) => interpret_trade(state, form, key),
    };
    state.mode = mode;
    event
}

fn interpret_normal(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    if state.card_open {
        return match key.code {
            KeyCode::Enter | KeyCode::Char('c') => Some(UserEvent::Action(GameAction::ResolveCard)),
            KeyCode::Esc => Some(UserEvent::CloseCard),
            _ => None,
        };
    }
    let property_id = state.selected;
    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            return Some(UserEvent::Redraw);
        }
        KeyCode::Right | KeyCode::Char('l') => {
            state.selected = board::advance(state.selected, 1);
            return Some(UserEvent::Redraw);
        }
        KeyCode::Left | KeyCode::Char('h') => {
            state.selected = board::advance(state.selected, BOARD_SIZE - 1);
            return Some(UserEvent::Redraw);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.selected = board::advance(state.selected, 10);
            return Some(UserEvent::Redraw);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.selected = board::advance(state.selected, BOARD_SIZE - 10);
            return Some(UserEvent::Redraw);
        }
        KeyCode::Char('.') => {
            let position = state
                .snapshot
                .as_ref()
                .zip(state.actor.as_ref())
                .and_then(|(snapshot, actor)| snapshot.player(actor))
                .map(|player| player.position);
            if let Some(position) = position {
                state.selected = position;
            }
            return Some(UserEvent::Redraw);
        }
        KeyCode::Char('r') => return Some(UserEvent::Roll),
        KeyCode::Char('x') => return Some(UserEvent::Retry),
        KeyCode::Char('c') if state.card_pending => GameAction::ResolveCard,
        KeyCode::Char('t') => {
            state.mode = Mode::Trade(TradeForm::default());
            return Some(UserEvent::Redraw);
        }
        KeyCode::Char('A') | KeyCode::Char('R') | KeyCode::Char('C') => {
            let response = match key.code {
                KeyCode::Char('A') => TradeResponse::Accept,
                KeyCode::Char('R') => TradeResponse::Reject,
                _ => TradeResponse::Counter,
            };
            state.mode = Mode::TradeId(TradeIdForm { response, value: 0 });
            return Some(UserEvent::Redraw);
        }
        KeyCode::Char('b') => GameAction::BuyProperty { property_id },
        KeyCode::Char('p') => GameAction::PayRent { property_id },
        KeyCode::Char('u') => GameAction::BuyHouse { property_id },
        KeyCode::Char('d') => GameAction::SellHouse { property_id },
        KeyCode::Char('m') => GameAction::Mortgage { property_id },
        KeyCode::Char('n') => GameAction::Unmortgage { property_id },
        KeyCode::Char('f') => GameAction::FinishTurn,
        KeyCode::Char('s') => GameAction::StartGame,
        KeyCode::Char('e') => GameAction::EndGame,
        _ => return None,
    };
    Some(UserEvent::Action(action))
}

fn interpret_trade_id(mut form: TradeIdForm, key: KeyEvent) -> (Mode, Option<UserEvent>) {
    match key.code {
        KeyCode::Esc => (Mode::Normal, Some(UserEvent::Redraw)),
        KeyCode::Enter => {
            let trade_id = form.value;
            match form.response {
                TradeResponse::Accept => (
                    Mode::Normal,
                    Some(UserEvent::Action(GameAction::AcceptTrade { trade_id })),
                ),
                TradeResponse::Reject => (
                    Mode::Normal,
                    Some(UserEvent::Action(GameAction::RejectTrade { trade_id })),
                ),
                TradeResponse::Counter => (
                    Mode::Trade(TradeForm {
                        counter_of: Some(trade_id),
                        ..TradeForm::default()
                    }),
                    Some(UserEvent::Redraw),
                ),
            }
        }
        code => {
            let changed = edit_amount(&mut form.value, code);
            (Mode::TradeId(form), changed.then_some(UserEvent::Redraw))
        }
    }
}

fn interpret_trade(
    state: &UiState,
    mut form: TradeForm,
    key: KeyEvent,
) -> (Mode, Option<UserEvent>) {
    let others = state.other_players();
    let counterparty = others.get(form.counterparty_idx).map(|(a, _)| a.clone());
    let list = match form.focus {
        TradeFocus::Offer => state.owned_by(state.actor.as_ref()),
        TradeFocus::Request => state.owned_by(counterparty.as_ref()),
        _ => Vec::new(),
    };
    match key.code {
        KeyCode::Esc => return (Mode::Normal, Some(UserEvent::Redraw)),
        KeyCode::Tab => {
            form.focus = form.focus.next();
            form.cursor = 0;
        }
        KeyCode::Enter => {
            let trade = TradeInputs {
                counterparty,
                offered_properties: form.offered.clone(),
                requested_properties: form.requested.clone(),
                offered_cash: form.offered_cash,
                requested_cash: form.requested_cash,
                kind: trade_kind(&form),
            };
            let action = match form.counter_of {
                Some(trade_id) => GameAction::CounterTrade { trade_id, trade },
                None => GameAction::OfferTrade(trade),
            };
            return (Mode::Normal, Some(UserEvent::Action(action)));
        }
        code => match form.focus {
            TradeFocus::Counterparty => match code {
                KeyCode::Up | KeyCode::Char('k') => {
                    form.counterparty_idx = form.counterparty_idx.saturating_sub(1);
                    form.requested.clear();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    let max = others.len().saturating_sub(1);
                    form.counterparty_idx = (form.counterparty_idx + 1).min(max);
                    form.requested.clear();
                }
                _ => return (Mode::Trade(form), None),
            },
            TradeFocus::Offer | TradeFocus::Request => match code {
                KeyCode::Up | KeyCode::Char('k') => form.cursor = form.cursor.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => {
                    form.cursor = (form.cursor + 1).min(list.len().saturating_sub(1));
                }
                KeyCode::Char(' ') => {
                    if let Some(id) = list.get(form.cursor) {
                        let target = if form.focus == TradeFocus::Offer {
                            &mut form.offered
                        } else {
                            &mut form.requested
                        };
                        toggle(target, *id);
                    }
                }
                _ => return (Mode::Trade(form), None),
            },
            TradeFocus::OfferCash => {
                if !edit_amount(&mut form.offered_cash, code) {
                    return (Mode::Trade(form), None);
                }
            }
            TradeFocus::RequestCash => {
                if !edit_amount(&mut form.requested_cash, code) {
                    return (Mode::Trade(form), None);
                }
            }
        },
    }
    (Mode::Trade(form), Some(UserEvent::Redraw))
}

fn ui(f: &mut Frame, state: &UiState, dispatch: &DispatchState) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(12),
            Constraint::Length(6),
        ])
        .split(f.area());

    let Some(snapshot) = &state.snapshot else {
        let waiting = Paragraph::new("Loading game state...")
            .block(Block::default().borders(Borders::ALL).title("Blockopoly"));
        f.render_widget(waiting, chunks[1]);
        draw_bottom(f, chunks[2], state, dispatch);
        return;
    };

    draw_header(f, chunks[0], state, snapshot);
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    draw_board(f, middle[0], state, snapshot);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(9)])
        .split(middle[1]);
    draw_players(f, right[0], snapshot);
    draw_selected(f, right[1], state, snapshot);
    draw_bottom(f, chunks[2], state, dispatch);
    draw_modals(f, state, dispatch);
}

fn draw_header(f: &mut Frame, area: Rect, state: &UiState, snapshot: &GameSnapshot) {
    let game = &snapshot.game;
    let next = snapshot
        .next_player()
        .map(|p| p.display_name.clone())
        .unwrap_or_else(|| "-".to_string());
    let me = state.actor.as_ref().and_then(|actor| snapshot.player(actor));
    let balance = me
        .map(|p| format!("${}", p.balance))
        .unwrap_or_else(|| "spectating".to_string());
    let lines = vec![
        Line::from(format!(
            "Game #{}  [{}]  players {}/{}  next: {}",
            game.id, game.status, game.joined_players, game.max_players, next
        )),
        Line::from(format!(
            "You: {}  balance: {}",
            state
                .actor
                .as_ref()
                .map(Address::short)
                .unwrap_or_default(),
            balance
        )),
    ];
    let header = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn square_kind_label(square: &Square) -> &'static str {
    match square.kind {
        SquareKind::Go => "go",
        SquareKind::Street(_) => "street",
        SquareKind::Railroad => "railroad",
        SquareKind::Utility => "utility",
        SquareKind::CommunityChest => "chest",
        SquareKind::Chance => "chance",
        SquareKind::Tax(_) => "tax",
        SquareKind::Jail => "jail",
        SquareKind::FreeParking => "parking",
        SquareKind::GoToJail => "to jail",
    }
}

fn development_label(development: u8) -> String {
    match development {
        0 => String::new(),
        board::MAX_DEVELOPMENT => "hotel".to_string(),
        n => format!("{n}h"),
    }
}

fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + 1 >= width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

fn draw_board(f: &mut Frame, area: Rect, state: &UiState, snapshot: &GameSnapshot) {
    let rows = BOARD.iter().map(|square| {
        let tokens: String = snapshot
            .players
            .iter()
            .filter(|p| p.position == square.id)
            .map(|p| p.token.map(|t| t.name()).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(",");
        let (owner, development, rent) = match snapshot.owner_of(square.id) {
            Some(entry) => (
                fit(&entry.owner_name, 14),
                if entry.mortgaged {
                    "mortgaged".to_string()
                } else {
                    development_label(entry.development)
                },
                entry.current_rent.to_string(),
            ),
            None if square.is_purchasable() => {
                (format!("${}", square.price), String::new(), square.base_rent().to_string())
            }
            None => (String::new(), String::new(), String::new()),
        };
        Row::new(vec![
            Cell::from(square.id.to_string()),
            Cell::from(fit(square.name, 22)),
            Cell::from(square_kind_label(square)),
            Cell::from(owner),
            Cell::from(development),
            Cell::from(rent),
            Cell::from(tokens),
        ])
    });
    let widths = [
        Constraint::Length(3),
        Constraint::Length(22),
        Constraint::Length(8),
        Constraint::Length(14),
        Constraint::Length(9),
        Constraint::Length(5),
        Constraint::Min(6),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["#", "Square", "Kind", "Owner", "Built", "Rent", "Tokens"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title("Board"))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut table_state = TableState::default().with_selected(Some(usize::from(state.selected)));
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_players(f: &mut Frame, area: Rect, snapshot: &GameSnapshot) {
    let items: Vec<ListItem> = snapshot
        .players
        .iter()
        .map(|player| {
            let marker = if player.is_next { "▶" } else { " " };
            let token = player.token.map(|t| t.name()).unwrap_or("-");
            let square = board::square(player.position)
                .map(|s| s.name)
                .unwrap_or("?");
            let jailed = if player.jailed { " (jailed)" } else { "" };
            ListItem::new(format!(
                "{marker} {} [{token}] ${} @ {}{jailed}  props: {}",
                fit(&player.display_name, 16),
                player.balance,
                square,
                player.owned_properties.len()
            ))
        })
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Players"));
    f.render_widget(list, area);
}

fn draw_selected(f: &mut Frame, area: Rect, state: &UiState, snapshot: &GameSnapshot) {
    let Some(current) = blockopoly_client::reconcile::resolve_square(
        state.selected,
        &snapshot.ownership,
    ) else {
        return;
    };
    let square = current.square;
    let mut lines = vec![Line::from(format!(
        "{} ({})",
        square.name,
        square_kind_label(square)
    ))];
    if square.is_purchasable() {
        lines.push(Line::from(format!("Price: ${}", square.price)));
        match &current.ownership {
            Some(entry) => {
                lines.push(Line::from(format!("Owner: {}", entry.owner_name)));
                lines.push(Line::from(format!(
                    "Development: {}{}",
                    entry.development,
                    if entry.mortgaged { " (mortgaged)" } else { "" }
                )));
            }
            None => lines.push(Line::from("Unowned")),
        }
        lines.push(Line::from(format!("Rent now: ${}", current.rent)));
    } else if let SquareKind::Tax(amount) = square.kind {
        lines.push(Line::from(format!("Pay ${amount}")));
    }
    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Selected"))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, state: &UiState, dispatch: &DispatchState) {
    let mut lines = Vec::new();
    if dispatch.loading {
        lines.push(Line::from(Span::styled(
            "Submitting...",
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(status) = &dispatch.status {
        lines.push(Line::from(status.clone()));
    }
    if dispatch.pending_card.is_some() && !state.card_open {
        lines.push(Line::from(Span::styled(
            "A drawn card is waiting: c to resolve it",
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(error) = &dispatch.error {
        lines.push(Line::from(Span::styled(
            format!("{error}  (x to retry)"),
            Style::default().fg(Color::Red),
        )));
    } else if let Some(error) = &state.sync_error {
        lines.push(Line::from(Span::styled(
            format!("refresh failed, retrying: {error}"),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(
        "h/l/j/k move  . me  r roll  b buy  p rent  u/d house  m/n mortgage  f finish",
    ));
    lines.push(Line::from(
        "t trade  A/R/C accept/reject/counter  s start  e end  x retry  q quit",
    ));
    let bottom = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(bottom, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, dispatch: &DispatchState) {
    if let Some(Modal::Card(card)) = &dispatch.modal {
        let deck = match card.deck {
            board::CardDeck::Chance => "Chance",
            board::CardDeck::CommunityChest => "Community Chest",
        };
        draw_popup(
            f,
            deck,
            vec![
                Line::from(card.text()),
                Line::from(""),
                Line::from("Enter resolve  Esc later, then c"),
            ],
        );
        return;
    }
    match &state.mode {
        Mode::Normal => {}
        Mode::QuitModal => draw_popup(f, "Quit", vec![Line::from("Leave the game view? (y/n)")]),
        Mode::TradeId(form) => {
            let verb = match form.response {
                TradeResponse::Accept => "Accept",
                TradeResponse::Reject => "Reject",
                TradeResponse::Counter => "Counter",
            };
            draw_popup(
                f,
                &format!("{verb} trade"),
                vec![
                    Line::from(format!("Trade id: {}", form.value)),
                    Line::from("digits edit  Enter confirm  Esc cancel"),
                ],
            );
        }
        Mode::Trade(form) => draw_trade_modal(f, state, form),
    }
}

fn draw_trade_modal(f: &mut Frame, state: &UiState, form: &TradeForm) {
    let others = state.other_players();
    let counterparty = others.get(form.counterparty_idx);
    let focus_style = |focus: TradeFocus| {
        if form.focus == focus {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    let property_lines = |ids: Vec<u8>, chosen: &[u8], focus: TradeFocus| {
        ids.into_iter()
            .enumerate()
            .map(|(i, id)| {
                let mark = if chosen.contains(&id) { "[x]" } else { "[ ]" };
                let cursor = if form.focus == focus && form.cursor == i {
                    ">"
                } else {
                    " "
                };
                let name = board::square(id).map(|s| s.name).unwrap_or("?");
                Line::from(format!("{cursor}{mark} {name}"))
            })
            .collect::<Vec<_>>()
    };

    let mut lines = vec![Line::from(Span::styled(
        format!(
            "With: {}",
            counterparty
                .map(|(_, name)| name.as_str())
                .unwrap_or("no other players")
        ),
        focus_style(TradeFocus::Counterparty),
    ))];
    lines.push(Line::from(Span::styled("You give:", focus_style(TradeFocus::Offer))));
    lines.extend(property_lines(
        state.owned_by(state.actor.as_ref()),
        &form.offered,
        TradeFocus::Offer,
    ));
    lines.push(Line::from(Span::styled(
        "You get:",
        focus_style(TradeFocus::Request),
    )));
    lines.extend(property_lines(
        state.owned_by(counterparty.map(|(address, _)| address)),
        &form.requested,
        TradeFocus::Request,
    ));
    lines.push(Line::from(Span::styled(
        format!("Cash given: ${}", form.offered_cash),
        focus_style(TradeFocus::OfferCash),
    )));
    lines.push(Line::from(Span::styled(
        format!("Cash asked: ${}", form.requested_cash),
        focus_style(TradeFocus::RequestCash),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from("Tab field  j/k move  space toggle  Enter send  Esc cancel"));
    let title = match form.counter_of {
        Some(id) => format!("Counter trade #{id}"),
        None => "Offer trade".to_string(),
    };
    draw_popup(f, &title, lines);
}

fn draw_popup(f: &mut Frame, title: &str, lines: Vec<Line<'_>>) {
    let area = centered_rect(60, 50, f.area());
    f.render_widget(Clear, area);
    let popup = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: true });
    f.render_widget(popup, area);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use blockopoly_client::board::{
        CardDeck,
        DrawnCard,
    };
    use blockopoly_client::types::{
        GameStatus,
        GameView,
        OwnershipEntry,
        PlayerView,
        PropertyOwnershipView,
        TokenAssignment,
    };

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn state_with_game() -> UiState {
        let me = Address::new("0xaaaa");
        let you = Address::new("0xbbbb");
        let player = |address: &Address, name: &str| PlayerView {
            address: address.clone(),
            display_name: name.to_string(),
            position: 0,
            balance: 1500,
            jailed: false,
            owned_properties: Vec::new(),
            token: None,
            is_next: false,
        };
        let mut ownership = PropertyOwnershipView::new();
        ownership.insert(
            3,
            OwnershipEntry {
                owner: you.clone(),
                owner_name: "bob".to_string(),
                development: 0,
                mortgaged: false,
                current_rent: 4,
            },
        );
        ownership.insert(
            1,
            OwnershipEntry {
                owner: me.clone(),
                owner_name: "me".to_string(),
                development: 0,
                mortgaged: false,
                current_rent: 2,
            },
        );
        let mut state = UiState::new(me.clone());
        state.snapshot = Some(GameSnapshot {
            game: GameView {
                id: 1,
                creator: me.clone(),
                status: GameStatus::Ongoing,
                max_players: 4,
                joined_players: 2,
                is_initialised: true,
                next_player: None,
                participants: vec![me.clone(), you.clone()],
            },
            players: vec![player(&me, "me"), player(&you, "bob")],
            tokens: TokenAssignment::new(),
            ownership,
        });
        state
    }

    #[test]
    fn interpret_event__property_keys_target_selected_square() {
        // given
        let mut state = state_with_game();
        interpret_event(&mut state, press(KeyCode::Char('l')));
        interpret_event(&mut state, press(KeyCode::Char('l')));
        interpret_event(&mut state, press(KeyCode::Char('l')));

        // when
        let event = interpret_event(&mut state, press(KeyCode::Char('u')));

        // then
        assert_eq!(
            event,
            Some(UserEvent::Action(GameAction::BuyHouse { property_id: 3 }))
        );
    }

    #[test]
    fn interpret_event__cursor_wraps_backwards_past_go() {
        let mut state = state_with_game();
        interpret_event(&mut state, press(KeyCode::Char('h')));
        assert_eq!(state.selected, 39);
    }

    #[test]
    fn interpret_event__quit_requires_confirmation() {
        let mut state = state_with_game();
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Char('q'))),
            Some(UserEvent::Redraw)
        );
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Char('y'))),
            Some(UserEvent::Quit)
        );
    }

    #[test]
    fn interpret_event__trade_form_builds_offer() {
        // given
        let mut state = state_with_game();
        interpret_event(&mut state, press(KeyCode::Char('t')));

        // when: pick our property, then theirs
        interpret_event(&mut state, press(KeyCode::Tab));
        interpret_event(&mut state, press(KeyCode::Char(' ')));
        interpret_event(&mut state, press(KeyCode::Tab));
        interpret_event(&mut state, press(KeyCode::Char(' ')));
        let event = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        let Some(UserEvent::Action(GameAction::OfferTrade(trade))) = event else {
            panic!("expected trade offer, got {event:?}");
        };
        assert_eq!(trade.counterparty, Some(Address::new("0xbbbb")));
        assert_eq!(trade.offered_properties, vec![1]);
        assert_eq!(trade.requested_properties, vec![3]);
        assert_eq!(trade.kind, TradeKind::PropertyForProperty);
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__counter_opens_prefilled_trade_form() {
        let mut state = state_with_game();
        interpret_event(&mut state, press(KeyCode::Char('C')));
        interpret_event(&mut state, press(KeyCode::Char('4')));
        interpret_event(&mut state, press(KeyCode::Char('2')));
        interpret_event(&mut state, press(KeyCode::Enter));

        let Mode::Trade(form) = &state.mode else {
            panic!("expected trade form");
        };
        assert_eq!(form.counter_of, Some(42));
    }

    #[test]
    fn interpret_event__focus_changes_toggle_visibility() {
        let mut state = state_with_game();
        assert_eq!(
            interpret_event(&mut state, Event::FocusLost),
            Some(UserEvent::Visibility(false))
        );
        assert_eq!(
            interpret_event(&mut state, Event::FocusGained),
            Some(UserEvent::Visibility(true))
        );
    }

    #[test]
    fn interpret_event__closed_card_can_still_be_resolved() {
        // given
        let mut state = state_with_game();
        let card = DrawnCard {
            deck: CardDeck::Chance,
            index: 0,
        };
        let mut dispatch = DispatchState {
            pending_card: Some(card),
            modal: Some(Modal::Card(card)),
            ..DispatchState::default()
        };
        draw(&mut state, None, &dispatch).unwrap();
        assert_eq!(
            interpret_event(&mut state, press(KeyCode::Esc)),
            Some(UserEvent::CloseCard)
        );
        dispatch.modal = None;
        draw(&mut state, None, &dispatch).unwrap();

        // when
        let event = interpret_event(&mut state, press(KeyCode::Char('c')));

        // then
        assert_eq!(event, Some(UserEvent::Action(GameAction::ResolveCard)));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__c_does_nothing_without_a_drawn_card() {
        let mut state = state_with_game();
        assert_eq!(interpret_event(&mut state, press(KeyCode::Char('c'))), None);
    }

    #[test]
    fn fit__truncates_wide_text() {
        assert_eq!(fit("Boardwalk", 20), "Boardwalk");
        assert_eq!(fit("North Carolina Avenue", 8), "North C…");
    }
}
