//! JSON-over-HTTP binding to the game indexer gateway.
//!
//! Reads are plain `GET`s under `/games`; every write is a `POST /tx` whose
//! body names the contract call in its `action` field. The gateway signs and
//! relays writes for the caller address.

use crate::{
    board::DrawnCard,
    error::{
        Error,
        Result,
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
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Clone, Debug)]
pub struct GatewayClient {
    base_url: Url,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| Error::Config(format!("invalid gateway url '{base_url}': {err}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| Error::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> RemoteResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| RemoteError::new(format!("invalid gateway path '{path}': {err}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        let url = self.url(path)?;
        debug!(%url, "gateway read");
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| RemoteError::new(format!("gateway request failed: {err}")))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|err| RemoteError::new(format!("failed to read gateway response: {err}")))?;
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::not_found(format!("{path} not found")));
        }
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(RemoteError::new(format!(
                "gateway responded with {status} for {path}: {body}"
            )));
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| RemoteError::new(format!("invalid gateway payload for {path}: {err}")))
    }

    async fn submit(&self, call: &TxCall<'_>) -> RemoteResult<TxReceipt> {
        let url = self.url("tx")?;
        let res = self
            .http
            .post(url)
            .json(call)
            .send()
            .await
            .map_err(|err| RemoteError::new(format!("gateway request failed: {err}")))?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(RemoteError::new(format!(
                "transaction rejected with {status}: {body}"
            )));
        }
        let dto: TxReceiptDto = res
            .json()
            .await
            .map_err(|err| RemoteError::new(format!("invalid transaction receipt: {err}")))?;
        debug!(tx_id = %dto.tx_hash, "transaction accepted");
        Ok(TxReceipt {
            tx_id: dto.tx_hash,
        })
    }
}

impl RemoteStateClient for GatewayClient {
    async fn game_count(&self) -> RemoteResult<u64> {
        let dto: CountDto = self.get_json("games/count").await?;
        Ok(dto.count)
    }

    async fn get_game(&self, game_id: u64) -> RemoteResult<GameRecord> {
        let dto: GameDto = self.get_json(&format!("games/{game_id}")).await?;
        dto.try_into()
    }

    async fn get_player(&self, game_id: u64, address: &Address) -> RemoteResult<PlayerRecord> {
        let dto: PlayerDto = self
            .get_json(&format!("games/{game_id}/players/{address}"))
            .await?;
        Ok(dto.into())
    }

    async fn get_property(&self, game_id: u64, property_id: u8) -> RemoteResult<PropertyRecord> {
        let dto: PropertyDto = self
            .get_json(&format!("games/{game_id}/properties/{property_id}"))
            .await?;
        Ok(dto.into())
    }

    async fn username_by_address(&self, address: &Address) -> RemoteResult<Option<String>> {
        match self
            .get_json::<UsernameDto>(&format!("players/{address}/username"))
            .await
        {
            Ok(dto) => Ok(dto.username.filter(|name| !name.is_empty())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn register_player(&self, actor: &Address, username: &str) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::RegisterPlayer {
            caller: actor,
            username,
        })
        .await
    }

    async fn create_game(&self, game: &NewGame) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::CreateGame {
            caller: &game.creator,
            number_of_players: game.max_players,
            symbol: game.symbol.map(Token::name),
        })
        .await
    }

    async fn join_game(
        &self,
        game_id: u64,
        actor: &Address,
        symbol: Option<Token>,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::JoinGame {
            caller: actor,
            game_id,
            symbol: symbol.map(Token::name),
        })
        .await
    }

    async fn start_game(&self, game_id: u64, actor: &Address) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::StartGame {
            caller: actor,
            game_id,
        })
        .await
    }

    async fn end_game(&self, game_id: u64, actor: &Address) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::EndGame {
            caller: actor,
            game_id,
        })
        .await
    }

    async fn move_player(
        &self,
        game_id: u64,
        actor: &Address,
        steps: u8,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::MovePlayer {
            caller: actor,
            game_id,
            steps,
        })
        .await
    }

    async fn buy_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::BuyProperty {
            caller: actor,
            game_id,
            property_id,
        })
        .await
    }

    async fn pay_rent(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::PayRent {
            caller: actor,
            game_id,
            property_id,
        })
        .await
    }

    async fn buy_house_or_hotel(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::BuyHouseOrHotel {
            caller: actor,
            game_id,
            property_id,
        })
        .await
    }

    async fn sell_house_or_hotel(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::SellHouseOrHotel {
            caller: actor,
            game_id,
            property_id,
        })
        .await
    }

    async fn mortgage_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::MortgageProperty {
            caller: actor,
            game_id,
            property_id,
        })
        .await
    }

    async fn unmortgage_property(
        &self,
        game_id: u64,
        actor: &Address,
        property_id: u8,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::UnmortgageProperty {
            caller: actor,
            game_id,
            property_id,
        })
        .await
    }

    async fn process_card(
        &self,
        game_id: u64,
        actor: &Address,
        card: DrawnCard,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::ProcessCard {
            caller: actor,
            game_id,
            card,
        })
        .await
    }

    async fn finish_turn(&self, game_id: u64, actor: &Address) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::FinishTurn {
            caller: actor,
            game_id,
        })
        .await
    }

    async fn offer_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade: &TradeInputs,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::OfferTrade {
            caller: actor,
            game_id,
            trade,
        })
        .await
    }

    async fn accept_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade_id: u64,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::AcceptTrade {
            caller: actor,
            game_id,
            trade_id,
        })
        .await
    }

    async fn reject_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade_id: u64,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::RejectTrade {
            caller: actor,
            game_id,
            trade_id,
        })
        .await
    }

    async fn counter_trade(
        &self,
        game_id: u64,
        actor: &Address,
        trade_id: u64,
        trade: &TradeInputs,
    ) -> RemoteResult<TxReceipt> {
        self.submit(&TxCall::CounterTrade {
            caller: actor,
            game_id,
            trade_id,
            trade,
        })
        .await
    }
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum TxCall<'a> {
    RegisterPlayer {
        caller: &'a Address,
        username: &'a str,
    },
    CreateGame {
        caller: &'a Address,
        number_of_players: u8,
        symbol: Option<&'static str>,
    },
    JoinGame {
        caller: &'a Address,
        game_id: u64,
        symbol: Option<&'static str>,
    },
    StartGame {
        caller: &'a Address,
        game_id: u64,
    },
    EndGame {
        caller: &'a Address,
        game_id: u64,
    },
    MovePlayer {
        caller: &'a Address,
        game_id: u64,
        steps: u8,
    },
    BuyProperty {
        caller: &'a Address,
        game_id: u64,
        property_id: u8,
    },
    PayRent {
        caller: &'a Address,
        game_id: u64,
        property_id: u8,
    },
    BuyHouseOrHotel {
        caller: &'a Address,
        game_id: u64,
        property_id: u8,
    },
    SellHouseOrHotel {
        caller: &'a Address,
        game_id: u64,
        property_id: u8,
    },
    MortgageProperty {
        caller: &'a Address,
        game_id: u64,
        property_id: u8,
    },
    UnmortgageProperty {
        caller: &'a Address,
        game_id: u64,
        property_id: u8,
    },
    ProcessCard {
        caller: &'a Address,
        game_id: u64,
        card: DrawnCard,
    },
    FinishTurn {
        caller: &'a Address,
        game_id: u64,
    },
    OfferTrade {
        caller: &'a Address,
        game_id: u64,
        trade: &'a TradeInputs,
    },
    AcceptTrade {
        caller: &'a Address,
        game_id: u64,
        trade_id: u64,
    },
    RejectTrade {
        caller: &'a Address,
        game_id: u64,
        trade_id: u64,
    },
    CounterTrade {
        caller: &'a Address,
        game_id: u64,
        trade_id: u64,
        trade: &'a TradeInputs,
    },
}

/// Unset address fields come back as the zero address.
fn non_zero_address(raw: &str) -> Option<Address> {
    let digits = raw.trim().trim_start_matches("0x");
    if digits.chars().all(|c| c == '0') {
        None
    } else {
        Some(Address::new(raw))
    }
}

#[derive(Deserialize)]
struct CountDto {
    count: u64,
}

#[derive(Deserialize)]
struct UsernameDto {
    username: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxReceiptDto {
    tx_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameDto {
    id: u64,
    creator: String,
    status: u8,
    number_of_players: u8,
    players_joined: u8,
    is_initialised: bool,
    #[serde(default)]
    next_player: Option<String>,
    #[serde(default)]
    game_players: Vec<String>,
}

impl TryFrom<GameDto> for GameRecord {
    type Error = RemoteError;

    fn try_from(dto: GameDto) -> RemoteResult<Self> {
        let status = match dto.status {
            0 => GameStatus::Pending,
            1 => GameStatus::Ongoing,
            2 => GameStatus::Ended,
            other => {
                return Err(RemoteError::new(format!(
                    "game {} has unknown status {other}",
                    dto.id
                )));
            }
        };
        Ok(GameRecord {
            id: dto.id,
            creator: Address::new(dto.creator),
            status,
            max_players: dto.number_of_players,
            joined_players: dto.players_joined,
            is_initialised: dto.is_initialised,
            next_player: dto.next_player.as_deref().and_then(non_zero_address),
            players: dto.game_players.into_iter().map(Address::new).collect(),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDto {
    address: String,
    #[serde(default)]
    username: Option<String>,
    position: u8,
    balance: u64,
    #[serde(default)]
    jailed: bool,
    #[serde(default)]
    symbol: Option<String>,
}

impl From<PlayerDto> for PlayerRecord {
    fn from(dto: PlayerDto) -> Self {
        PlayerRecord {
            address: Address::new(dto.address),
            username: dto.username.filter(|name| !name.is_empty()),
            position: dto.position,
            balance: dto.balance,
            jailed: dto.jailed,
            symbol: dto.symbol.and_then(|symbol| symbol.parse().ok()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyDto {
    id: u8,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    development: u8,
    #[serde(default)]
    is_mortgaged: bool,
    rent_site_only: u64,
    rent_one_house: u64,
    rent_two_houses: u64,
    rent_three_houses: u64,
    rent_four_houses: u64,
    rent_hotel: u64,
}

impl From<PropertyDto> for PropertyRecord {
    fn from(dto: PropertyDto) -> Self {
        PropertyRecord {
            id: dto.id,
            owner: dto.owner.as_deref().and_then(non_zero_address),
            development: dto.development,
            mortgaged: dto.is_mortgaged,
            rent: RentTable::new(
                dto.rent_site_only,
                [
                    dto.rent_one_house,
                    dto.rent_two_houses,
                    dto.rent_three_houses,
                    dto.rent_four_houses,
                ],
                dto.rent_hotel,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use serde_json::json;

    #[test]
    fn game_dto__maps_status_and_zero_next_player() {
        // given
        let payload = json!({
            "id": 4,
            "creator": "0xABC1",
            "status": 1,
            "numberOfPlayers": 4,
            "playersJoined": 2,
            "isInitialised": true,
            "nextPlayer": "0x0",
            "gamePlayers": ["0xABC1", "0xdef2"],
        });

        // when
        let dto: GameDto = serde_json::from_value(payload).unwrap();
        let game = GameRecord::try_from(dto).unwrap();

        // then
        assert_eq!(game.status, GameStatus::Ongoing);
        assert_eq!(game.next_player, None);
        assert_eq!(game.creator, Address::new("0xabc1"));
        assert_eq!(game.players.len(), 2);
    }

    #[test]
    fn game_dto__rejects_unknown_status() {
        let dto: GameDto = serde_json::from_value(json!({
            "id": 1,
            "creator": "0x1",
            "status": 9,
            "numberOfPlayers": 2,
            "playersJoined": 1,
            "isInitialised": false,
        }))
        .unwrap();

        assert!(GameRecord::try_from(dto).is_err());
    }

    #[test]
    fn property_dto__unowned_property_has_no_owner() {
        let dto: PropertyDto = serde_json::from_value(json!({
            "id": 3,
            "owner": "0x0000000000",
            "development": 2,
            "isMortgaged": false,
            "rentSiteOnly": 4,
            "rentOneHouse": 20,
            "rentTwoHouses": 60,
            "rentThreeHouses": 180,
            "rentFourHouses": 320,
            "rentHotel": 450,
        }))
        .unwrap();

        let record = PropertyRecord::from(dto);
        assert_eq!(record.owner, None);
        assert_eq!(record.rent.for_development(2), 60);
    }

    #[test]
    fn tx_call__serializes_action_tag_and_camel_case_fields() {
        let caller = Address::new("0xAA");
        let call = TxCall::BuyHouseOrHotel {
            caller: &caller,
            game_id: 7,
            property_id: 39,
        };

        let value = serde_json::to_value(&call).unwrap();

        assert_eq!(
            value,
            json!({
                "action": "buy_house_or_hotel",
                "caller": "0xaa",
                "gameId": 7,
                "propertyId": 39,
            })
        );
    }

    #[test]
    fn new__rejects_malformed_url() {
        assert!(matches!(
            GatewayClient::new("not a url", Duration::from_secs(5)),
            Err(Error::Config(_))
        ));
    }
}
