use crate::types::RentTable;
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};

pub const BOARD_SIZE: u8 = 40;
pub const JAIL_SQUARE: u8 = 10;
pub const MAX_DEVELOPMENT: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquareKind {
    Go,
    Street(ColorGroup),
    Railroad,
    Utility,
    CommunityChest,
    Chance,
    Tax(u64),
    Jail,
    FreeParking,
    GoToJail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Square {
    pub id: u8,
    pub name: &'static str,
    pub kind: SquareKind,
    pub price: u64,
    pub rent: RentTable,
}

impl Square {
    pub fn is_purchasable(&self) -> bool {
        matches!(
            self.kind,
            SquareKind::Street(_) | SquareKind::Railroad | SquareKind::Utility
        )
    }

    /// Only streets take houses and hotels.
    pub fn is_developable(&self) -> bool {
        matches!(self.kind, SquareKind::Street(_))
    }

    pub fn card_deck(&self) -> Option<CardDeck> {
        match self.kind {
            SquareKind::Chance => Some(CardDeck::Chance),
            SquareKind::CommunityChest => Some(CardDeck::CommunityChest),
            _ => None,
        }
    }

    /// Rent charged when no on-chain record exists for the square.
    pub fn base_rent(&self) -> u64 {
        self.rent.site
    }
}

const NO_RENT: RentTable = RentTable::new(0, [0; 4], 0);
const RAILROAD_RENT: RentTable = RentTable::new(25, [50, 100, 200, 200], 200);
const UTILITY_RENT: RentTable = RentTable::new(4, [10, 10, 10, 10], 10);

const fn plain(id: u8, name: &'static str, kind: SquareKind) -> Square {
    Square {
        id,
        name,
        kind,
        price: 0,
        rent: NO_RENT,
    }
}

const fn street(
    id: u8,
    name: &'static str,
    group: ColorGroup,
    price: u64,
    rent: RentTable,
) -> Square {
    Square {
        id,
        name,
        kind: SquareKind::Street(group),
        price,
        rent,
    }
}

const fn railroad(id: u8, name: &'static str) -> Square {
    Square {
        id,
        name,
        kind: SquareKind::Railroad,
        price: 200,
        rent: RAILROAD_RENT,
    }
}

const fn utility(id: u8, name: &'static str) -> Square {
    Square {
        id,
        name,
        kind: SquareKind::Utility,
        price: 150,
        rent: UTILITY_RENT,
    }
}

use ColorGroup::*;

pub const BOARD: [Square; BOARD_SIZE as usize] = [
    plain(0, "Go", SquareKind::Go),
    street(1, "Mediterranean Avenue", Brown, 60, RentTable::new(2, [10, 30, 90, 160], 250)),
    plain(2, "Community Chest", SquareKind::CommunityChest),
    street(3, "Baltic Avenue", Brown, 60, RentTable::new(4, [20, 60, 180, 320], 450)),
    plain(4, "Income Tax", SquareKind::Tax(200)),
    railroad(5, "Reading Railroad"),
    street(6, "Oriental Avenue", LightBlue, 100, RentTable::new(6, [30, 90, 270, 400], 550)),
    plain(7, "Chance", SquareKind::Chance),
    street(8, "Vermont Avenue", LightBlue, 100, RentTable::new(6, [30, 90, 270, 400], 550)),
    street(9, "Connecticut Avenue", LightBlue, 120, RentTable::new(8, [40, 100, 300, 450], 600)),
    plain(JAIL_SQUARE, "Jail", SquareKind::Jail),
    street(11, "St. Charles Place", Pink, 140, RentTable::new(10, [50, 150, 450, 625], 750)),
    utility(12, "Electric Company"),
    street(13, "States Avenue", Pink, 140, RentTable::new(10, [50, 150, 450, 625], 750)),
    street(14, "Virginia Avenue", Pink, 160, RentTable::new(12, [60, 180, 500, 700], 900)),
    railroad(15, "Pennsylvania Railroad"),
    street(16, "St. James Place", Orange, 180, RentTable::new(14, [70, 200, 550, 750], 950)),
    plain(17, "Community Chest", SquareKind::CommunityChest),
    street(18, "Tennessee Avenue", Orange, 180, RentTable::new(14, [70, 200, 550, 750], 950)),
    street(19, "New York Avenue", Orange, 200, RentTable::new(16, [80, 220, 600, 800], 1000)),
    plain(20, "Free Parking", SquareKind::FreeParking),
    street(21, "Kentucky Avenue", Red, 220, RentTable::new(18, [90, 250, 700, 875], 1050)),
    plain(22, "Chance", SquareKind::Chance),
    street(23, "Indiana Avenue", Red, 220, RentTable::new(18, [90, 250, 700, 875], 1050)),
    street(24, "Illinois Avenue", Red, 240, RentTable::new(20, [100, 300, 750, 925], 1100)),
    railroad(25, "B&O Railroad"),
    street(26, "Atlantic Avenue", Yellow, 260, RentTable::new(22, [110, 330, 800, 975], 1150)),
    street(27, "Ventnor Avenue", Yellow, 260, RentTable::new(22, [110, 330, 800, 975], 1150)),
    utility(28, "Water Works"),
    street(29, "Marvin Gardens", Yellow, 280, RentTable::new(24, [120, 360, 850, 1025], 1200)),
    plain(30, "Go To Jail", SquareKind::GoToJail),
    street(31, "Pacific Avenue", Green, 300, RentTable::new(26, [130, 390, 900, 1100], 1275)),
    street(
        32,
        "North Carolina Avenue",
        Green,
        300,
        RentTable::new(26, [130, 390, 900, 1100], 1275),
    ),
    plain(33, "Community Chest", SquareKind::CommunityChest),
    street(34, "Pennsylvania Avenue", Green, 320, RentTable::new(28, [150, 450, 1000, 1200], 1400)),
    railroad(35, "Short Line"),
    plain(36, "Chance", SquareKind::Chance),
    street(37, "Park Place", DarkBlue, 350, RentTable::new(35, [175, 500, 1100, 1300], 1500)),
    plain(38, "Luxury Tax", SquareKind::Tax(100)),
    street(39, "Boardwalk", DarkBlue, 400, RentTable::new(50, [200, 600, 1400, 1700], 2000)),
];

pub fn square(id: u8) -> Option<&'static Square> {
    BOARD.get(usize::from(id))
}

/// Ids of every purchasable square, in board order.
pub fn property_ids() -> Vec<u8> {
    BOARD
        .iter()
        .filter(|square| square.is_purchasable())
        .map(|square| square.id)
        .collect()
}

pub fn advance(position: u8, steps: u8) -> u8 {
    ((u16::from(position) + u16::from(steps)) % u16::from(BOARD_SIZE)) as u8
}

pub fn roll_dice(rng: &mut impl Rng) -> (u8, u8) {
    (rng.random_range(1..=6), rng.random_range(1..=6))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardDeck {
    Chance,
    CommunityChest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnCard {
    pub deck: CardDeck,
    pub index: u8,
}

const CHANCE_CARDS: [&str; 8] = [
    "Advance to Go (collect 200)",
    "Advance to Illinois Avenue",
    "Advance to St. Charles Place",
    "Bank pays you dividend of 50",
    "Go back 3 spaces",
    "Go directly to Jail",
    "Pay poor tax of 15",
    "Your building loan matures, collect 150",
];

const COMMUNITY_CHEST_CARDS: [&str; 8] = [
    "Advance to Go (collect 200)",
    "Bank error in your favor, collect 200",
    "Doctor's fee, pay 50",
    "From sale of stock you get 50",
    "Go directly to Jail",
    "Income tax refund, collect 20",
    "Pay hospital fees of 100",
    "You inherit 100",
];

impl CardDeck {
    fn cards(self) -> &'static [&'static str] {
        match self {
            CardDeck::Chance => &CHANCE_CARDS,
            CardDeck::CommunityChest => &COMMUNITY_CHEST_CARDS,
        }
    }

    pub fn draw(self, rng: &mut impl Rng) -> DrawnCard {
        let index = rng.random_range(0..self.cards().len()) as u8;
        DrawnCard { deck: self, index }
    }
}

impl DrawnCard {
    pub fn text(&self) -> &'static str {
        self.deck
            .cards()
            .get(usize::from(self.index))
            .copied()
            .unwrap_or("Unknown card")
    }
}
