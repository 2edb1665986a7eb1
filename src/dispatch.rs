//! Client-side action handling.
//!
//! Every state-changing action is described once in [`ACTIONS`]: a guard run
//! against the current snapshot, and the refresh to perform after the write
//! lands. [`Dispatcher::dispatch`] is the only code path that submits writes.

use crate::{
    board::{
        self,
        DrawnCard,
        MAX_DEVELOPMENT,
    },
    error::{
        Error,
        Result,
    },
    poll::{
        PollConfig,
        poll_until,
    },
    reconcile::{
        GameSnapshot,
        Reconciler,
    },
    remote::{
        RemoteResult,
        RemoteStateClient,
    },
    sync::SharedView,
    types::{
        Address,
        GameStatus,
        TradeInputs,
        TxReceipt,
    },
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::{
    fmt,
    sync::Arc,
};
use tracing::{
    error,
    info,
    warn,
};

pub const MIN_PLAYERS_TO_START: u8 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameAction {
    RollAndMove { steps: u8 },
    BuyProperty { property_id: u8 },
    PayRent { property_id: u8 },
    BuyHouse { property_id: u8 },
    SellHouse { property_id: u8 },
    Mortgage { property_id: u8 },
    Unmortgage { property_id: u8 },
    ResolveCard,
    FinishTurn,
    OfferTrade(TradeInputs),
    AcceptTrade { trade_id: u64 },
    RejectTrade { trade_id: u64 },
    CounterTrade { trade_id: u64, trade: TradeInputs },
    StartGame,
    EndGame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    RollAndMove,
    BuyProperty,
    PayRent,
    BuyHouse,
    SellHouse,
    Mortgage,
    Unmortgage,
    ResolveCard,
    FinishTurn,
    OfferTrade,
    AcceptTrade,
    RejectTrade,
    CounterTrade,
    StartGame,
    EndGame,
}

impl GameAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            GameAction::RollAndMove { .. } => ActionKind::RollAndMove,
            GameAction::BuyProperty { .. } => ActionKind::BuyProperty,
            GameAction::PayRent { .. } => ActionKind::PayRent,
            GameAction::BuyHouse { .. } => ActionKind::BuyHouse,
            GameAction::SellHouse { .. } => ActionKind::SellHouse,
            GameAction::Mortgage { .. } => ActionKind::Mortgage,
            GameAction::Unmortgage { .. } => ActionKind::Unmortgage,
            GameAction::ResolveCard => ActionKind::ResolveCard,
            GameAction::FinishTurn => ActionKind::FinishTurn,
            GameAction::OfferTrade(_) => ActionKind::OfferTrade,
            GameAction::AcceptTrade { .. } => ActionKind::AcceptTrade,
            GameAction::RejectTrade { .. } => ActionKind::RejectTrade,
            GameAction::CounterTrade { .. } => ActionKind::CounterTrade,
            GameAction::StartGame => ActionKind::StartGame,
            GameAction::EndGame => ActionKind::EndGame,
        }
    }

    pub fn property_id(&self) -> Option<u8> {
        match self {
            GameAction::BuyProperty { property_id }
            | GameAction::PayRent { property_id }
            | GameAction::BuyHouse { property_id }
            | GameAction::SellHouse { property_id }
            | GameAction::Mortgage { property_id }
            | GameAction::Unmortgage { property_id } => Some(*property_id),
            _ => None,
        }
    }

    fn trade(&self) -> Option<&TradeInputs> {
        match self {
            GameAction::OfferTrade(trade) | GameAction::CounterTrade { trade, .. } => {
                Some(trade)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("another action is still being submitted")]
    Busy,
    #[error("game state has not loaded yet")]
    NoSnapshot,
    #[error("no property selected")]
    NoProperty,
    #[error("square {0} is not a property that can be bought")]
    NotPurchasable(u8),
    #[error("{0} already has an owner")]
    AlreadyOwned(&'static str),
    #[error("{0} has no owner to pay")]
    Unowned(&'static str),
    #[error("you own {0}; no rent is due")]
    OwnProperty(&'static str),
    #[error("you do not own {0}")]
    NotOwner(&'static str),
    #[error("{0} cannot take houses or hotels")]
    NotDevelopable(&'static str),
    #[error("{0} already has a hotel")]
    FullyDeveloped(&'static str),
    #[error("{0} has no houses to sell")]
    Undeveloped(&'static str),
    #[error("{0} is mortgaged")]
    Mortgaged(&'static str),
    #[error("{0} is not mortgaged")]
    NotMortgaged(&'static str),
    #[error("sell the buildings on {0} before mortgaging it")]
    HasBuildings(&'static str),
    #[error("roll must be between 2 and 12, got {0}")]
    InvalidRoll(u8),
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("resolve the drawn card first")]
    CardPending,
    #[error("there is no drawn card to resolve")]
    NoCardPending,
    #[error("you are not a player in this game")]
    NotAPlayer,
    #[error("pick another player in this game to trade with")]
    InvalidCounterparty,
    #[error("a trade must offer or request something")]
    EmptyTrade,
    #[error("only the game creator can start the game")]
    NotCreator,
    #[error("game is {actual}, expected {expected}")]
    WrongStatus {
        expected: GameStatus,
        actual: GameStatus,
    },
    #[error("at least {0} players must join before starting")]
    NotEnoughPlayers(u8),
}

/// What a guard may look at.
pub struct GuardContext<'a> {
    pub actor: &'a Address,
    pub snapshot: &'a GameSnapshot,
    pub pending_card: Option<DrawnCard>,
}

pub type Guard = fn(&GameAction, &GuardContext<'_>) -> Result<(), GuardError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    /// One full reconciliation.
    Reconcile,
    /// Poll until the game reports the status, then reconcile.
    AwaitStatus(GameStatus),
}

pub struct ActionSpec {
    pub kind: ActionKind,
    pub name: &'static str,
    pub guard: Guard,
    pub refresh: Refresh,
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("refresh", &self.refresh)
            .finish()
    }
}

pub static ACTIONS: [ActionSpec; 15] = [
    ActionSpec {
        kind: ActionKind::RollAndMove,
        name: "roll and move",
        guard: guard_roll,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::BuyProperty,
        name: "buy property",
        guard: guard_buy_property,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::PayRent,
        name: "pay rent",
        guard: guard_pay_rent,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::BuyHouse,
        name: "buy house",
        guard: guard_buy_house,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::SellHouse,
        name: "sell house",
        guard: guard_sell_house,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::Mortgage,
        name: "mortgage",
        guard: guard_mortgage,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::Unmortgage,
        name: "unmortgage",
        guard: guard_unmortgage,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::ResolveCard,
        name: "resolve card",
        guard: guard_resolve_card,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::FinishTurn,
        name: "finish turn",
        guard: guard_finish_turn,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::OfferTrade,
        name: "offer trade",
        guard: guard_trade_proposal,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::AcceptTrade,
        name: "accept trade",
        guard: guard_is_player,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::RejectTrade,
        name: "reject trade",
        guard: guard_is_player,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::CounterTrade,
        name: "counter trade",
        guard: guard_trade_proposal,
        refresh: Refresh::Reconcile,
    },
    ActionSpec {
        kind: ActionKind::StartGame,
        name: "start game",
        guard: guard_start_game,
        refresh: Refresh::AwaitStatus(GameStatus::Ongoing),
    },
    ActionSpec {
        kind: ActionKind::EndGame,
        name: "end game",
        guard: guard_end_game,
        refresh: Refresh::AwaitStatus(GameStatus::Ended),
    },
];

pub fn spec_for(kind: ActionKind) -> &'static ActionSpec {
    ACTIONS
        .iter()
        .find(|spec| spec.kind == kind)
        .unwrap_or_else(|| unreachable!("every action kind has a table entry"))
}

// guards

fn target(action: &GameAction) -> Result<(u8, &'static board::Square), GuardError> {
    let id = action.property_id().ok_or(GuardError::NoProperty)?;
    let square = board::square(id).ok_or(GuardError::NotPurchasable(id))?;
    if !square.is_purchasable() {
        return Err(GuardError::NotPurchasable(id));
    }
    Ok((id, square))
}

fn owned_by_actor(
    action: &GameAction,
    ctx: &GuardContext<'_>,
) -> Result<(&'static board::Square, u8, bool), GuardError> {
    let (id, square) = target(action)?;
    match ctx.snapshot.owner_of(id) {
        Some(entry) if &entry.owner == ctx.actor => {
            Ok((square, entry.development, entry.mortgaged))
        }
        _ => Err(GuardError::NotOwner(square.name)),
    }
}

fn guard_is_player(_: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    if ctx.snapshot.is_player(ctx.actor) {
        Ok(())
    } else {
        Err(GuardError::NotAPlayer)
    }
}

fn guard_roll(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    if let GameAction::RollAndMove { steps } = action
        && !(2..=12).contains(steps)
    {
        return Err(GuardError::InvalidRoll(*steps));
    }
    guard_is_player(action, ctx)?;
    if ctx.pending_card.is_some() {
        return Err(GuardError::CardPending);
    }
    match ctx.snapshot.player(ctx.actor) {
        Some(player) if player.is_next => Ok(()),
        _ => Err(GuardError::NotYourTurn),
    }
}

fn guard_buy_property(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let (id, square) = target(action)?;
    if ctx.snapshot.owner_of(id).is_some() {
        return Err(GuardError::AlreadyOwned(square.name));
    }
    guard_is_player(action, ctx)
}

fn guard_pay_rent(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let (id, square) = target(action)?;
    match ctx.snapshot.owner_of(id) {
        None => Err(GuardError::Unowned(square.name)),
        Some(entry) if &entry.owner == ctx.actor => Err(GuardError::OwnProperty(square.name)),
        Some(_) => Ok(()),
    }
}

fn guard_buy_house(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let (square, development, mortgaged) = owned_by_actor(action, ctx)?;
    if !square.is_developable() {
        return Err(GuardError::NotDevelopable(square.name));
    }
    if mortgaged {
        return Err(GuardError::Mortgaged(square.name));
    }
    if development >= MAX_DEVELOPMENT {
        return Err(GuardError::FullyDeveloped(square.name));
    }
    Ok(())
}

fn guard_sell_house(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let (square, development, _) = owned_by_actor(action, ctx)?;
    if development == 0 {
        return Err(GuardError::Undeveloped(square.name));
    }
    Ok(())
}

fn guard_mortgage(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let (square, development, mortgaged) = owned_by_actor(action, ctx)?;
    if mortgaged {
        return Err(GuardError::Mortgaged(square.name));
    }
    if development > 0 {
        return Err(GuardError::HasBuildings(square.name));
    }
    Ok(())
}

fn guard_unmortgage(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let (square, _, mortgaged) = owned_by_actor(action, ctx)?;
    if !mortgaged {
        return Err(GuardError::NotMortgaged(square.name));
    }
    Ok(())
}

fn guard_resolve_card(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    guard_is_player(action, ctx)?;
    if ctx.pending_card.is_none() {
        return Err(GuardError::NoCardPending);
    }
    Ok(())
}

fn guard_finish_turn(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    guard_is_player(action, ctx)?;
    if ctx.pending_card.is_some() {
        return Err(GuardError::CardPending);
    }
    Ok(())
}

fn guard_trade_proposal(
    action: &GameAction,
    ctx: &GuardContext<'_>,
) -> Result<(), GuardError> {
    guard_is_player(action, ctx)?;
    let trade = action.trade().ok_or(GuardError::EmptyTrade)?;
    let counterparty = trade
        .counterparty
        .as_ref()
        .filter(|c| *c != ctx.actor && ctx.snapshot.is_player(c))
        .ok_or(GuardError::InvalidCounterparty)?;
    if trade.is_empty() {
        return Err(GuardError::EmptyTrade);
    }
    for id in &trade.offered_properties {
        match ctx.snapshot.owner_of(*id) {
            Some(entry) if &entry.owner == ctx.actor => {}
            _ => return Err(GuardError::NotOwner(square_name(*id))),
        }
    }
    for id in &trade.requested_properties {
        match ctx.snapshot.owner_of(*id) {
            Some(entry) if &entry.owner == counterparty => {}
            _ => return Err(GuardError::InvalidCounterparty),
        }
    }
    Ok(())
}

fn guard_start_game(_: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let game = &ctx.snapshot.game;
    if &game.creator != ctx.actor {
        return Err(GuardError::NotCreator);
    }
    if game.status != GameStatus::Pending {
        return Err(GuardError::WrongStatus {
            expected: GameStatus::Pending,
            actual: game.status,
        });
    }
    if game.joined_players < MIN_PLAYERS_TO_START {
        return Err(GuardError::NotEnoughPlayers(MIN_PLAYERS_TO_START));
    }
    Ok(())
}

fn guard_end_game(action: &GameAction, ctx: &GuardContext<'_>) -> Result<(), GuardError> {
    let status = ctx.snapshot.game.status;
    if status != GameStatus::Ongoing {
        return Err(GuardError::WrongStatus {
            expected: GameStatus::Ongoing,
            actual: status,
        });
    }
    guard_is_player(action, ctx)
}

fn square_name(id: u8) -> &'static str {
    board::square(id).map(|s| s.name).unwrap_or("unknown square")
}

// submission

async fn submit<C: RemoteStateClient>(
    client: &C,
    game_id: u64,
    actor: &Address,
    action: &GameAction,
    pending_card: Option<DrawnCard>,
) -> RemoteResult<TxReceipt> {
    match action {
        GameAction::RollAndMove { steps } => client.move_player(game_id, actor, *steps).await,
        GameAction::BuyProperty { property_id } => {
            client.buy_property(game_id, actor, *property_id).await
        }
        GameAction::PayRent { property_id } => {
            client.pay_rent(game_id, actor, *property_id).await
        }
        GameAction::BuyHouse { property_id } => {
            client.buy_house_or_hotel(game_id, actor, *property_id).await
        }
        GameAction::SellHouse { property_id } => {
            client.sell_house_or_hotel(game_id, actor, *property_id).await
        }
        GameAction::Mortgage { property_id } => {
            client.mortgage_property(game_id, actor, *property_id).await
        }
        GameAction::Unmortgage { property_id } => {
            client.unmortgage_property(game_id, actor, *property_id).await
        }
        GameAction::ResolveCard => match pending_card {
            Some(card) => client.process_card(game_id, actor, card).await,
            None => Err(crate::remote::RemoteError::new("no drawn card to resolve")),
        },
        GameAction::FinishTurn => client.finish_turn(game_id, actor).await,
        GameAction::OfferTrade(trade) => client.offer_trade(game_id, actor, trade).await,
        GameAction::AcceptTrade { trade_id } => {
            client.accept_trade(game_id, actor, *trade_id).await
        }
        GameAction::RejectTrade { trade_id } => {
            client.reject_trade(game_id, actor, *trade_id).await
        }
        GameAction::CounterTrade { trade_id, trade } => {
            client.counter_trade(game_id, actor, *trade_id, trade).await
        }
        GameAction::StartGame => client.start_game(game_id, actor).await,
        GameAction::EndGame => client.end_game(game_id, actor).await,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modal {
    Card(DrawnCard),
    Trade(TradeInputs),
}

/// UI-facing flags around dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchState {
    /// Set while a submission is in flight. A dispatch future dropped before
    /// it finishes leaves this set, since its write may still land; further
    /// actions are refused until [`Dispatcher::retry`] re-reads the board.
    pub loading: bool,
    pub error: Option<String>,
    pub status: Option<String>,
    pub pending_card: Option<DrawnCard>,
    pub modal: Option<Modal>,
}

pub struct Dispatcher<C> {
    reconciler: Reconciler<C>,
    view: SharedView,
    game_id: u64,
    actor: Address,
    status_poll: PollConfig,
    state: DispatchState,
    rng: StdRng,
}

impl<C: RemoteStateClient> Dispatcher<C> {
    pub fn new(client: Arc<C>, view: SharedView, game_id: u64, actor: Address) -> Self {
        Self {
            reconciler: Reconciler::new(client),
            view,
            game_id,
            actor,
            status_poll: PollConfig::status(),
            state: DispatchState::default(),
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_status_poll(mut self, config: PollConfig) -> Self {
        self.status_poll = config;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn actor(&self) -> &Address {
        &self.actor
    }

    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn dismiss_error(&mut self) {
        self.state.error = None;
    }

    pub fn open_modal(&mut self, modal: Modal) {
        self.state.modal = Some(modal);
    }

    pub fn close_modal(&mut self) {
        self.state.modal = None;
    }

    /// Checks the action's guard against the latest committed snapshot.
    pub fn check(&self, action: &GameAction) -> Result<(), GuardError> {
        if self.state.loading {
            return Err(GuardError::Busy);
        }
        let snapshot = self.view.snapshot().ok_or(GuardError::NoSnapshot)?;
        let ctx = GuardContext {
            actor: &self.actor,
            snapshot: &snapshot,
            pending_card: self.state.pending_card,
        };
        (spec_for(action.kind()).guard)(action, &ctx)
    }

    /// Guards, submits and refreshes one action.
    ///
    /// A failed guard or write leaves the snapshot and pending card untouched
    /// and records a message in [`DispatchState::error`]. A failed refresh
    /// after a successful write is recorded the same way but does not fail the
    /// call, since the write itself went through.
    pub async fn dispatch(&mut self, action: GameAction) -> Result<TxReceipt> {
        let spec = spec_for(action.kind());
        if let Err(err) = self.check(&action) {
            warn!(action = spec.name, %err, "action rejected before submission");
            self.state.error = Some(err.to_string());
            return Err(err.into());
        }

        self.state.loading = true;
        self.state.error = None;
        let submitted = submit(
            self.reconciler.client().as_ref(),
            self.game_id,
            &self.actor,
            &action,
            self.state.pending_card,
        )
        .await;
        let receipt = match submitted {
            Ok(receipt) => receipt,
            Err(err) => {
                error!(action = spec.name, error = %err, "action failed");
                self.state.loading = false;
                self.state.error = Some(format!("{} failed: {}", spec.name, err));
                return Err(err.into());
            }
        };
        info!(action = spec.name, tx_id = %receipt.tx_id, "action submitted");

        let refreshed = self.run_refresh(spec.refresh).await;
        self.state.loading = false;
        self.state.pending_card = None;
        self.state.modal = None;
        self.state.status = Some(format!("{} confirmed ({})", spec.name, receipt.tx_id));
        match refreshed {
            Ok(snapshot) => {
                if action.kind() == ActionKind::RollAndMove {
                    self.draw_card_if_landed(&snapshot);
                }
            }
            Err(err) => {
                warn!(action = spec.name, error = %err, "refresh after action failed");
                self.state.error = Some(format!(
                    "{} went through but the board could not be refreshed: {}",
                    spec.name, err
                ));
            }
        }
        Ok(receipt)
    }

    /// Re-runs a full reconciliation; backs the Retry control. A successful
    /// refresh also releases the lock left by an abandoned submission.
    pub async fn retry(&mut self) -> Result<GameSnapshot> {
        self.state.error = None;
        let refreshed = self.reconcile_now().await;
        match &refreshed {
            Ok(_) => {
                if self.state.loading {
                    warn!("clearing in-flight lock of an abandoned submission");
                }
                self.state.loading = false;
            }
            Err(err) => self.state.error = Some(format!("refresh failed: {err}")),
        }
        refreshed
    }

    async fn run_refresh(&self, refresh: Refresh) -> Result<GameSnapshot> {
        if let Refresh::AwaitStatus(expected) = refresh {
            let client = self.reconciler.client().as_ref();
            let game_id = self.game_id;
            let outcome = poll_until(
                self.status_poll,
                "game status",
                || client.get_game(game_id),
                |game| game.status == expected,
            )
            .await;
            if outcome.value.is_none() {
                return Err(Error::confirmation_timeout(
                    format!("game {game_id} to become {expected}"),
                    outcome.attempts,
                ));
            }
        }
        self.reconcile_now().await
    }

    async fn reconcile_now(&self) -> Result<GameSnapshot> {
        let ticket = self.view.issue();
        let snapshot = self.reconciler.refresh(self.game_id).await?;
        self.view.commit(ticket, snapshot.clone());
        Ok(snapshot)
    }

    fn draw_card_if_landed(&mut self, snapshot: &GameSnapshot) {
        let Some(deck) = snapshot
            .current_square(&self.actor)
            .and_then(|current| current.square.card_deck())
        else {
            return;
        };
        let card = deck.draw(&mut self.rng);
        info!(?deck, card = card.text(), "drew card");
        self.state.pending_card = Some(card);
        self.state.modal = Some(Modal::Card(card));
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::types::{
        GameView,
        OwnershipEntry,
        PlayerView,
        PropertyOwnershipView,
        TokenAssignment,
    };

    const ME: &str = "0xaaaa";
    const YOU: &str = "0xbbbb";

    fn player(address: &str, is_next: bool) -> PlayerView {
        PlayerView {
            address: Address::new(address),
            display_name: address.to_string(),
            position: 0,
            balance: 1500,
            jailed: false,
            owned_properties: Vec::new(),
            token: None,
            is_next,
        }
    }

    fn entry(owner: &str, development: u8, mortgaged: bool) -> OwnershipEntry {
        OwnershipEntry {
            owner: Address::new(owner),
            owner_name: owner.to_string(),
            development,
            mortgaged,
            current_rent: 0,
        }
    }

    fn snapshot(status: GameStatus, ownership: PropertyOwnershipView) -> GameSnapshot {
        GameSnapshot {
            game: GameView {
                id: 1,
                creator: Address::new(ME),
                status,
                max_players: 4,
                joined_players: 2,
                is_initialised: true,
                next_player: Some(Address::new(ME)),
                participants: vec![Address::new(ME), Address::new(YOU)],
            },
            players: vec![player(ME, true), player(YOU, false)],
            tokens: TokenAssignment::new(),
            ownership,
        }
    }

    fn check(action: GameAction, snapshot: &GameSnapshot) -> Result<(), GuardError> {
        check_with_card(action, snapshot, None)
    }

    fn check_with_card(
        action: GameAction,
        snapshot: &GameSnapshot,
        pending_card: Option<DrawnCard>,
    ) -> Result<(), GuardError> {
        let actor = Address::new(ME);
        let ctx = GuardContext {
            actor: &actor,
            snapshot,
            pending_card,
        };
        (spec_for(action.kind()).guard)(&action, &ctx)
    }

    #[test]
    fn actions__every_kind_has_exactly_one_entry() {
        for spec in &ACTIONS {
            let count = ACTIONS.iter().filter(|s| s.kind == spec.kind).count();
            assert_eq!(count, 1, "{}", spec.name);
        }
    }

    #[test]
    fn guard_buy_property__rejects_owned_and_non_property_squares() {
        let mut ownership = PropertyOwnershipView::new();
        ownership.insert(3, entry(YOU, 0, false));
        let snap = snapshot(GameStatus::Ongoing, ownership);

        assert_eq!(
            check(GameAction::BuyProperty { property_id: 3 }, &snap),
            Err(GuardError::AlreadyOwned("Baltic Avenue"))
        );
        assert_eq!(
            check(GameAction::BuyProperty { property_id: 7 }, &snap),
            Err(GuardError::NotPurchasable(7))
        );
        assert_eq!(check(GameAction::BuyProperty { property_id: 1 }, &snap), Ok(()));
    }

    #[test]
    fn guard_pay_rent__requires_another_owner() {
        let mut ownership = PropertyOwnershipView::new();
        ownership.insert(1, entry(ME, 0, false));
        ownership.insert(3, entry(YOU, 0, false));
        let snap = snapshot(GameStatus::Ongoing, ownership);

        assert!(matches!(
            check(GameAction::PayRent { property_id: 6 }, &snap),
            Err(GuardError::Unowned(_))
        ));
        assert!(matches!(
            check(GameAction::PayRent { property_id: 1 }, &snap),
            Err(GuardError::OwnProperty(_))
        ));
        assert_eq!(check(GameAction::PayRent { property_id: 3 }, &snap), Ok(()));
    }

    #[test]
    fn guard_buy_house__requires_ownership_and_room_to_build() {
        let mut ownership = PropertyOwnershipView::new();
        ownership.insert(1, entry(ME, 5, false));
        ownership.insert(3, entry(YOU, 0, false));
        ownership.insert(5, entry(ME, 0, false));
        ownership.insert(6, entry(ME, 2, false));
        let snap = snapshot(GameStatus::Ongoing, ownership);

        assert!(matches!(
            check(GameAction::BuyHouse { property_id: 1 }, &snap),
            Err(GuardError::FullyDeveloped(_))
        ));
        assert!(matches!(
            check(GameAction::BuyHouse { property_id: 3 }, &snap),
            Err(GuardError::NotOwner(_))
        ));
        assert!(matches!(
            check(GameAction::BuyHouse { property_id: 5 }, &snap),
            Err(GuardError::NotDevelopable(_))
        ));
        assert_eq!(check(GameAction::BuyHouse { property_id: 6 }, &snap), Ok(()));
    }

    #[test]
    fn guard_mortgage__requires_undeveloped_unmortgaged_property() {
        let mut ownership = PropertyOwnershipView::new();
        ownership.insert(1, entry(ME, 1, false));
        ownership.insert(3, entry(ME, 0, true));
        ownership.insert(6, entry(ME, 0, false));
        let snap = snapshot(GameStatus::Ongoing, ownership);

        assert!(matches!(
            check(GameAction::Mortgage { property_id: 1 }, &snap),
            Err(GuardError::HasBuildings(_))
        ));
        assert!(matches!(
            check(GameAction::Mortgage { property_id: 3 }, &snap),
            Err(GuardError::Mortgaged(_))
        ));
        assert_eq!(check(GameAction::Mortgage { property_id: 6 }, &snap), Ok(()));
        assert_eq!(check(GameAction::Unmortgage { property_id: 3 }, &snap), Ok(()));
        assert!(matches!(
            check(GameAction::Unmortgage { property_id: 6 }, &snap),
            Err(GuardError::NotMortgaged(_))
        ));
    }

    #[test]
    fn guard_finish_turn__blocks_while_card_pending() {
        let snap = snapshot(GameStatus::Ongoing, PropertyOwnershipView::new());
        let card = DrawnCard {
            deck: board::CardDeck::Chance,
            index: 0,
        };

        assert_eq!(
            check_with_card(GameAction::FinishTurn, &snap, Some(card)),
            Err(GuardError::CardPending)
        );
        assert_eq!(check_with_card(GameAction::FinishTurn, &snap, None), Ok(()));
        assert_eq!(
            check_with_card(GameAction::ResolveCard, &snap, None),
            Err(GuardError::NoCardPending)
        );
    }

    #[test]
    fn guard_roll__requires_turn_and_valid_steps() {
        let mut snap = snapshot(GameStatus::Ongoing, PropertyOwnershipView::new());
        assert_eq!(check(GameAction::RollAndMove { steps: 7 }, &snap), Ok(()));
        assert_eq!(
            check(GameAction::RollAndMove { steps: 13 }, &snap),
            Err(GuardError::InvalidRoll(13))
        );
        snap.players[0].is_next = false;
        assert_eq!(
            check(GameAction::RollAndMove { steps: 7 }, &snap),
            Err(GuardError::NotYourTurn)
        );
    }

    #[test]
    fn guard_trade_proposal__validates_counterparty_and_ownership() {
        let mut ownership = PropertyOwnershipView::new();
        ownership.insert(1, entry(ME, 0, false));
        ownership.insert(3, entry(YOU, 0, false));
        let snap = snapshot(GameStatus::Ongoing, ownership);
        let valid = TradeInputs {
            counterparty: Some(Address::new(YOU)),
            offered_properties: vec![1],
            requested_properties: vec![3],
            ..TradeInputs::default()
        };

        assert_eq!(check(GameAction::OfferTrade(valid.clone()), &snap), Ok(()));

        let to_self = TradeInputs {
            counterparty: Some(Address::new(ME)),
            ..valid.clone()
        };
        assert_eq!(
            check(GameAction::OfferTrade(to_self), &snap),
            Err(GuardError::InvalidCounterparty)
        );

        let empty = TradeInputs {
            counterparty: Some(Address::new(YOU)),
            ..TradeInputs::default()
        };
        assert_eq!(
            check(GameAction::OfferTrade(empty), &snap),
            Err(GuardError::EmptyTrade)
        );

        let not_mine = TradeInputs {
            offered_properties: vec![3],
            ..valid
        };
        assert!(matches!(
            check(GameAction::OfferTrade(not_mine), &snap),
            Err(GuardError::NotOwner(_))
        ));
    }

    #[test]
    fn guard_start_game__requires_pending_game_and_creator() {
        let pending = snapshot(GameStatus::Pending, PropertyOwnershipView::new());
        assert_eq!(check(GameAction::StartGame, &pending), Ok(()));

        let ongoing = snapshot(GameStatus::Ongoing, PropertyOwnershipView::new());
        assert_eq!(
            check(GameAction::StartGame, &ongoing),
            Err(GuardError::WrongStatus {
                expected: GameStatus::Pending,
                actual: GameStatus::Ongoing,
            })
        );

        let mut lonely = snapshot(GameStatus::Pending, PropertyOwnershipView::new());
        lonely.game.joined_players = 1;
        assert_eq!(
            check(GameAction::StartGame, &lonely),
            Err(GuardError::NotEnoughPlayers(2))
        );
    }
}
