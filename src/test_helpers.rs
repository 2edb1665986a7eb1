//! In-memory remote used by unit and integration tests.

use crate::{
    board::{
        self,
        DrawnCard,
    },
    remote::{
        NewGame,
        RemoteError,
        RemoteResult,
        RemoteStateClient,
    },
    types::{
        Address,
        GameRecord,
        GameStatus,
        PlayerRecord,
        PropertyRecord,
        RentTable,
        Token,
        TradeInputs,
        TxReceipt,
    },
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Mutex,
        MutexGuard,
    },
};

pub const STARTING_BALANCE: u64 = 1500;

pub fn game_record(id: u64, players: &[&str]) -> GameRecord {
    let players: Vec<Address> = players.iter().map(Address::new).collect();
    GameRecord {
        id,
        creator: players.first().cloned().unwrap_or_else(|| Address::new("0x00")),
        status: GameStatus::Pending,
        max_players: 4,
        joined_players: players.len() as u8,
        is_initialised: true,
        next_player: None,
        players,
    }
}

pub fn player_record(address: &str, position: u8) -> PlayerRecord {
    PlayerRecord {
        address: Address::new(address),
        username: None,
        position,
        balance: STARTING_BALANCE,
        jailed: false,
        symbol: None,
    }
}

pub fn property_record(id: u8, owner: Option<&str>, development: u8) -> PropertyRecord {
    PropertyRecord {
        id,
        owner: owner.map(Address::new),
        development,
        mortgaged: false,
        rent: board::square(id)
            .map(|square| square.rent)
            .unwrap_or_else(RentTable::default),
    }
}

#[derive(Default)]
struct FakeState {
    game_count: u64,
    games: HashMap<u64, GameRecord>,
    scripted_games: HashMap<u64, VecDeque<RemoteResult<GameRecord>>>,
    initialise_after: Option<u32>,
    uninitialised_reads: HashMap<u64, u32>,
    players: HashMap<(u64, Address), PlayerRecord>,
    properties: HashMap<(u64, u8), PropertyRecord>,
    failing_players: Vec<Address>,
    usernames: HashMap<Address, String>,
    write_failure: Option<String>,
    calls: HashMap<&'static str, u32>,
    next_tx: u64,
}

/// Scripted [`RemoteStateClient`] that applies writes to in-memory records
/// and counts calls per method.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_game(self, game: GameRecord) -> Self {
        self.set_game(game);
        self
    }

    pub fn with_player(self, game_id: u64, record: PlayerRecord) -> Self {
        self.set_player(game_id, record);
        self
    }

    pub fn with_property(self, game_id: u64, record: PropertyRecord) -> Self {
        self.set_property(game_id, record);
        self
    }

    pub fn set_game(&self, game: GameRecord) {
        let mut state = self.lock();
        state.game_count = state.game_count.max(game.id);
        state.games.insert(game.id, game);
    }

    pub fn set_player(&self, game_id: u64, record: PlayerRecord) {
        self.lock()
            .players
            .insert((game_id, record.address.clone()), record);
    }

    pub fn set_property(&self, game_id: u64, record: PropertyRecord) {
        self.lock().properties.insert((game_id, record.id), record);
    }

    pub fn set_username(&self, address: &str, username: &str) {
        self.lock()
            .usernames
            .insert(Address::new(address), username.to_string());
    }

    /// Responses returned by `get_game(game_id)` before falling back to the
    /// stored record.
    pub fn script_game_reads(&self, game_id: u64, reads: Vec<RemoteResult<GameRecord>>) {
        self.lock()
            .scripted_games
            .entry(game_id)
            .or_default()
            .extend(reads);
    }

    /// Games created from now on report `is_initialised = false` for the
    /// first `reads` reads.
    pub fn initialise_after(&self, reads: u32) {
        self.lock().initialise_after = Some(reads);
    }

    pub fn fail_player_reads(&self, address: &str) {
        self.lock().failing_players.push(Address::new(address));
    }

    pub fn fail_writes(&self, message: &str) {
        self.lock().write_failure = Some(message.to_string());
    }

    pub fn game(&self, game_id: u64) -> Option<GameRecord> {
        self.lock().games.get(&game_id).cloned()
    }

    pub fn player(&self, game_id: u64, address: &str) -> Option<PlayerRecord> {
        self.lock()
            .players
            .get(&(game_id, Address::new(address)))
            .cloned()
    }

    pub fn property(&self, game_id: u64, property_id: u8) -> Option<PropertyRecord> {
        self.lock().properties.get(&(game_id, property_id)).cloned()
    }

    pub fn calls(&self, method: &str) -> u32 {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.lock().calls.values().sum()
    }

    fn read(&self, method: &'static str) -> MutexGuard<'_, FakeState> {
        let mut state = self.lock();
        *state.calls.entry(method).or_default() += 1;
        state
    }

    fn write(
        &self,
        method: &'static str,
        apply: impl FnOnce(&mut FakeState) -> RemoteResult<()>,
    ) -> RemoteResult<TxReceipt> {
        let mut state = self.read(method);
        if let Some(message) = &state.write_failure {
            return Err(RemoteError::new(message.clone()));
        }
        apply(&mut state)?;
        state.next_tx += 1;
        Ok(TxReceipt {
            tx_id: format!("0xtx{:04}", state.next_tx),
        })
    }
}

fn game_mut(state: &mut FakeState, game_id: u64) -> RemoteResult<&mut GameRecord> {
    state
        .games
        .get_mut(&game_id)
        .ok_or_else(|| RemoteError::not_found(format!("game {game_id} not found")))
}

fn owned_property<'a>(
    state: &'a mut FakeState,
    game_id: u64,
    actor: &Address,
    property_id: u8,
) -> RemoteResult<&'a mut PropertyRecord> {
    match state.properties.get_mut(&(game_id, property_id)) {
        Some(record) if record.owner.as_ref() == Some(actor) => Ok(record),
        _ => Err(RemoteError::new(format!(
            "caller does not own property {property_id}"
        ))),
    }
}

impl RemoteStateClient for FakeRemote {
    async fn game_count(&self) -> RemoteResult<u64> {
        Ok(self.read("game_count").game_count)
    }

    async fn get_game(&self, game_id: u64) -> RemoteResult<GameRecord> {
        let mut state = self.read("get_game");
        if let Some(scripted) = state
            .scripted_games
            .get_mut(&game_id)
            .and_then(VecDeque::pop_front)
        {
            return scripted;
        }
        let mut game = state
            .games
            .get(&game_id)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("game {game_id} not found")))?;
        if let Some(remaining) = state.uninitialised_reads.get_mut(&game_id)
            && *remaining > 0
        {
            *remaining -= 1;
            game.is_initialised = false;
        }
        Ok(game)
    }

    async fn get_player(&self, game_id: u64, address: &Address) -> RemoteResult<PlayerRecord> {
        let state = self.read("get_player");
        if state.failing_players.contains(address) {
            return Err(RemoteError::new(format!("player {address} unavailable")));
        }
        state
            .players
            .get(&(game_id, address.clone()))
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("player {address} not found")))
    }

    async fn get_property(&self, game_id: u64, property_id: u8) -> RemoteResult<PropertyRecord> {
        self.read("get_property")
            .properties
            .get(&(game_id, property_id))
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("property {property_id} not found")))
    }

    async fn username_by_address(&self, address: &Address) -> RemoteResult<Option<String>> {
        Ok(self.read("username_by_address").usernames.get(address).cloned())
    }

    async fn register_player(&self, actor: &Address, username: &str) -> RemoteResult<TxReceipt> {
        self.write("register_player", |state| {
            state.usernames.insert(actor.clone(), username.to_string());
            Ok(())
        })
    }

    async fn create_game(&self, game: &NewGame) -> RemoteResult<TxReceipt> {
        self.write("create_game", |state| {
            state.game_count += 1;
            let id = state.game_count;
            state.games.insert(
                id,
                GameRecord {
                    id,
                    creator: game.creator.clone(),
                    status: GameStatus::Pending,
                    max_players: game.max_players,
                    joined_players: 1,
                    is_initialised: true,
                    next_player: None,
                    players: vec![game.creator.clone()],
                },
            );
            if let Some(reads) = state.initialise_after {
                state.uninitialised_reads.insert(id, reads);
            }
            state.players.insert(
                (id, game.creator.clone()),
                PlayerRecord {
                    symbol: game.symbol,
                    ..player_record(game.creator.as_str(), 0)
                },
            );
            Ok(())
        })
    }

    async fn join_game(
        &self,
        game_id: u64,
        actor: &Address,
        symbol: Option<Token>,
    ) -> RemoteResult<TxReceipt> {
        self.write("join_game", |state| {
            let game = game_mut(state, game_id)?;
            if game.joined_players >= game.max_players {
                return Err(RemoteError::new("game is full"));
            }
            game.players.push(actor.clone());
            game.joined_players += 1;
            state.players.insert(
                (game_id, actor.clone()),
                PlayerRecord {
                    symbol,
                    ..player_record(actor.as_str(), 0)
                },
            );
            Ok(())
        })
    }

    async fn start_game(&self, game_id: u64, _actor: &Address) -> RemoteResult<TxReceipt> {
        self.write("start_game", |state| {
            let game = game_mut(state, game_id)?;
            game.status = GameStatus::Ongoing;
            game.next_player = game.players.first().cloned();
            Ok(())
        })
    }

    async fn end_game(&self, game_id: u64, _actor: &Address) -> RemoteResult<TxReceipt> {
        self.write("end_game", |state| {
            game_mut(state, game_id)?.status = GameStatus::Ended;
            Ok(())
        })
    }

    async fn move_player(
        &self,
        game_id: u64,
        actor: &Address,
        steps: u8,
    ) -> RemoteResult<TxReceipt> {
        self.write("move_player", |state| {
            let player = state
                .players
                .get_mut(&(game_id, actor.clone()))
                .ok_or_else(|| RemoteError::not_found("player not found"))?;
            player.position = board::advance(player.position, steps);
            Ok(())
        })
    }

    async fn buy_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.write("buy_property", |state| {
            let mut record = property_record(property_id, None, 0);
            record.owner = Some(actor.clone());
            state.properties.insert((game_id, property_id), record);
            Ok(())
        })
    }

    async fn pay_rent(
        &self,
        _game_id: u64,
        _actor: &Address,
        _property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.write("pay_rent", |_| Ok(()))
    }

    async fn buy_house_or_hotel(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.write("buy_house_or_hotel", |state| {
            owned_property(state, game_id, actor, property_id)?.development += 1;
            Ok(())
        })
    }

    async fn sell_house_or_hotel(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.write("sell_house_or_hotel", |state| {
            let record = owned_property(state, game_id, actor, property_id)?;
            record.development = record.development.saturating_sub(1);
            Ok(())
        })
    }

    async fn mortgage_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.write("mortgage_property", |state| {
            owned_property(state, game_id, actor, property_id)?.mortgaged = true;
            Ok(())
        })
    }

    async fn unmortgage_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.write("unmortgage_property", |state| {
            owned_property(state, game_id, actor, property_id)?.mortgaged = false;
            Ok(())
        })
    }

    async fn process_card(
        &self,
        _game_id: u64,
        _actor: &Address,
        _card: DrawnCard,
    ) -> RemoteResult<TxReceipt> {
        self.write("process_card", |_| Ok(()))
    }

    async fn finish_turn(&self, game_id: u64, actor: &Address) -> RemoteResult<TxReceipt> {
        self.write("finish_turn", |state| {
            let game = game_mut(state, game_id)?;
            if let Some(index) = game.players.iter().position(|p| p == actor) {
                game.next_player = game.players.get((index + 1) % game.players.len()).cloned();
            }
            Ok(())
        })
    }

    async fn offer_trade(
        &self,
        _game_id: u64,
        _actor: &Address,
        _trade: &TradeInputs,
    ) -> RemoteResult<TxReceipt> {
        self.write("offer_trade", |_| Ok(()))
    }

    async fn accept_trade(
        &self,
        _game_id: u64,
        _actor: &Address,
        _trade_id: u64,
    ) -> RemoteResult<TxReceipt> {
        self.write("accept_trade", |_| Ok(()))
    }

    async fn reject_trade(
        &self,
        _game_id: u64,
        _actor: &Address,
        _trade_id: u64,
    ) -> RemoteResult<TxReceipt> {
        self.write("reject_trade", |_| Ok(()))
    }

    async fn counter_trade(
        &self,
        _game_id: u64,
        _actor: &Address,
        _trade_id: u64,
        _trade: &TradeInputs,
    ) -> RemoteResult<TxReceipt> {
        self.write("counter_trade", |_| Ok(()))
    }
}
