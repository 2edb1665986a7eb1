use crate::error::{
    Error,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
};

/// Account address, stored lower case so comparisons and map keys ignore case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Address(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// Strict constructor: requires a `0x` prefix followed by an even number of
    /// hex digits.
    pub fn parse(raw: &str) -> Result<Self> {
        let address = Address::new(raw);
        let digits = address
            .0
            .strip_prefix("0x")
            .ok_or_else(|| Error::InvalidAddress(raw.to_string()))?;
        if digits.is_empty() || hex::decode(digits).is_err() {
            return Err(Error::InvalidAddress(raw.to_string()));
        }
        Ok(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234…cdef` form used wherever no username is known.
    pub fn short(&self) -> String {
        let s = self.0.as_str();
        if s.len() <= 12 || !s.is_ascii() {
            return s.to_string();
        }
        format!("{}…{}", &s[..6], &s[s.len() - 4..])
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Token {
    Hat,
    Car,
    Dog,
    Thimble,
    Iron,
    Battleship,
    Boot,
    Wheelbarrow,
}

impl Token {
    /// Assignment order for players without a declared symbol.
    pub const ALL: [Token; 8] = [
        Token::Hat,
        Token::Car,
        Token::Dog,
        Token::Thimble,
        Token::Iron,
        Token::Battleship,
        Token::Boot,
        Token::Wheelbarrow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Token::Hat => "hat",
            Token::Car => "car",
            Token::Dog => "dog",
            Token::Thimble => "thimble",
            Token::Iron => "iron",
            Token::Battleship => "battleship",
            Token::Boot => "boot",
            Token::Wheelbarrow => "wheelbarrow",
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Token::ALL
            .into_iter()
            .find(|token| token.name() == wanted)
            .ok_or_else(|| Error::Config(format!("unknown token symbol '{s}'")))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GameStatus {
    Pending,
    Ongoing,
    Ended,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameStatus::Pending => "Pending",
            GameStatus::Ongoing => "Ongoing",
            GameStatus::Ended => "Ended",
        };
        write!(f, "{name}")
    }
}

/// Rent owed at each development level of a property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentTable {
    pub site: u64,
    pub houses: [u64; 4],
    pub hotel: u64,
}

impl RentTable {
    pub const fn new(site: u64, houses: [u64; 4], hotel: u64) -> Self {
        Self {
            site,
            houses,
            hotel,
        }
    }

    pub fn for_development(&self, development: u8) -> u64 {
        match development {
            0 => self.site,
            1..=4 => self.houses[usize::from(development) - 1],
            _ => self.hotel,
        }
    }
}

// Remote records, as returned by the remote state client.

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: u64,
    pub creator: Address,
    pub status: GameStatus,
    pub max_players: u8,
    pub joined_players: u8,
    pub is_initialised: bool,
    #[serde(default)]
    pub next_player: Option<Address>,
    #[serde(default)]
    pub players: Vec<Address>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub address: Address,
    #[serde(default)]
    pub username: Option<String>,
    pub position: u8,
    pub balance: u64,
    #[serde(default)]
    pub jailed: bool,
    #[serde(default)]
    pub symbol: Option<Token>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: u8,
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default)]
    pub development: u8,
    #[serde(default)]
    pub mortgaged: bool,
    pub rent: RentTable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: String,
}

// Reconciled view-models.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameView {
    pub id: u64,
    pub creator: Address,
    pub status: GameStatus,
    pub max_players: u8,
    pub joined_players: u8,
    pub is_initialised: bool,
    pub next_player: Option<Address>,
    pub participants: Vec<Address>,
}

impl From<GameRecord> for GameView {
    fn from(record: GameRecord) -> Self {
        GameView {
            id: record.id,
            creator: record.creator,
            status: record.status,
            max_players: record.max_players,
            joined_players: record.joined_players,
            is_initialised: record.is_initialised,
            next_player: record.next_player,
            participants: record.players,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerView {
    pub address: Address,
    pub display_name: String,
    pub position: u8,
    pub balance: u64,
    pub jailed: bool,
    pub owned_properties: Vec<u8>,
    pub token: Option<Token>,
    pub is_next: bool,
}

pub type TokenAssignment = BTreeMap<Token, Address>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipEntry {
    pub owner: Address,
    pub owner_name: String,
    pub development: u8,
    pub mortgaged: bool,
    pub current_rent: u64,
}

pub type PropertyOwnershipView = BTreeMap<u8, OwnershipEntry>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    #[default]
    PropertyForProperty,
    PropertyForCash,
    CashForProperty,
    Mixed,
}

/// Form state for a proposed trade.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInputs {
    pub counterparty: Option<Address>,
    pub offered_properties: Vec<u8>,
    pub requested_properties: Vec<u8>,
    pub offered_cash: u64,
    pub requested_cash: u64,
    pub kind: TradeKind,
}

impl TradeInputs {
    pub fn is_empty(&self) -> bool {
        self.offered_properties.is_empty()
            && self.requested_properties.is_empty()
            && self.offered_cash == 0
            && self.requested_cash == 0
    }
}
