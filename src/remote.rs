use crate::{
    board::DrawnCard,
    types::{
        Address,
        GameRecord,
        PlayerRecord,
        PropertyRecord,
        Token,
        TradeInputs,
        TxReceipt,
    },
};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteError {
    message: String,
    not_found: bool,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            not_found: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            not_found: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.not_found
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGame {
    pub creator: Address,
    pub max_players: u8,
    pub symbol: Option<Token>,
}

/// Request/response surface of the external game system.
///
/// Writes are signed for `actor` by whatever wallet backs the implementation;
/// the client never sees keys.
pub trait RemoteStateClient {
    // reads

    fn game_count(&self) -> impl Future<Output = RemoteResult<u64>> + Send;

    fn get_game(&self, game_id: u64) -> impl Future<Output = RemoteResult<GameRecord>> + Send;

    fn get_player(
        &self,
        game_id: u64,
        address: &Address,
    ) -> impl Future<Output = RemoteResult<PlayerRecord>> + Send;

    fn get_property(
        &self,
        game_id: u64,
        property_id: u8,
    ) -> impl Future<Output = RemoteResult<PropertyRecord>> + Send;

    fn username_by_address(
        &self,
        address: &Address,
    ) -> impl Future<Output = RemoteResult<Option<String>>> + Send;

    // lifecycle

    fn register_player(
        &self,
        actor: &Address,
        username: &str,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn create_game(&self, game: &NewGame) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn join_game(
        &self,
        game_id: u64,
        actor: &Address,
        symbol: Option<Token>,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn start_game(
        &self,
        game_id: u64,
        actor: &Address,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn end_game(
        &self,
        game_id: u64,
        actor: &Address,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    // turn actions

    fn move_player(
        &self,
        game_id: u64,
        actor: &Address,
        steps: u8,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn buy_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn pay_rent(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn buy_house_or_hotel(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn sell_house_or_hotel(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn mortgage_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn unmortgage_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn process_card(
        &self,
        game_id: u64,
        actor: &Address,
        card: DrawnCard,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn finish_turn(
        &self,
        game_id: u64,
        actor: &Address,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    // trades

    fn offer_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade: &TradeInputs,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn accept_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade_id: u64,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn reject_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade_id: u64,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;

    fn counter_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade_id: u64,
        trade: &TradeInputs,
    ) -> impl Future<Output = RemoteResult<TxReceipt>> + Send;
}
