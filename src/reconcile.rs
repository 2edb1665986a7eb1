//! Rebuilds the client view of a game from a fresh batch of remote reads.
//!
//! Nothing is patched incrementally: every refresh produces a new
//! [`GameSnapshot`] from scratch, so players, tokens and ownership can never
//! disagree with each other.

use crate::{
    board::{
        self,
        Square,
    },
    error::Result,
    remote::RemoteStateClient,
    types::{
        Address,
        GameRecord,
        GameView,
        OwnershipEntry,
        PlayerRecord,
        PlayerView,
        PropertyOwnershipView,
        PropertyRecord,
        Token,
        TokenAssignment,
    },
};
use futures::future::join_all;
use itertools::Itertools;
use std::{
    collections::{
        BTreeSet,
        HashMap,
    },
    sync::Arc,
};
use tracing::{
    debug,
    warn,
};

/// Raw reads for one game, as fetched.
#[derive(Clone, Debug, Default)]
pub struct RemoteBatch {
    pub participants: Vec<Address>,
    pub players: HashMap<Address, PlayerRecord>,
    pub property_ids: Vec<u8>,
    pub properties: HashMap<u8, PropertyRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSnapshot {
    pub game: GameView,
    pub players: Vec<PlayerView>,
    pub tokens: TokenAssignment,
    pub ownership: PropertyOwnershipView,
}

/// The square a player stands on, with the rent it currently charges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentSquare {
    pub square: &'static Square,
    pub ownership: Option<OwnershipEntry>,
    pub rent: u64,
}

impl GameSnapshot {
    pub fn player(&self, address: &Address) -> Option<&PlayerView> {
        self.players.iter().find(|p| &p.address == address)
    }

    pub fn is_player(&self, address: &Address) -> bool {
        self.player(address).is_some()
    }

    pub fn owner_of(&self, property_id: u8) -> Option<&OwnershipEntry> {
        self.ownership.get(&property_id)
    }

    pub fn next_player(&self) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.is_next)
    }

    pub fn current_square(&self, address: &Address) -> Option<CurrentSquare> {
        let player = self.player(address)?;
        resolve_square(player.position, &self.ownership)
    }
}

/// Rent a property charges at its current development.
pub fn current_rent(record: &PropertyRecord) -> u64 {
    if record.mortgaged {
        return 0;
    }
    record.rent.for_development(record.development)
}

pub fn resolve_square(
    position: u8,
    ownership: &PropertyOwnershipView,
) -> Option<CurrentSquare> {
    let square = board::square(position)?;
    if !square.is_purchasable() {
        return Some(CurrentSquare {
            square,
            ownership: None,
            rent: 0,
        });
    }
    let entry = ownership.get(&position).cloned();
    let rent = entry
        .as_ref()
        .map(|e| e.current_rent)
        .unwrap_or_else(|| square.base_rent());
    Some(CurrentSquare {
        square,
        ownership: entry,
        rent,
    })
}

/// Gives each player one token: their declared symbol when still free,
/// otherwise the first free symbol in [`Token::ALL`] order. Returns `None` for
/// a player once all eight are taken.
pub fn assign_tokens(
    players: &[(Address, Option<Token>)],
) -> (TokenAssignment, Vec<Option<Token>>) {
    let mut assignment = TokenAssignment::new();
    let mut per_player = Vec::with_capacity(players.len());
    for (address, declared) in players {
        let token = declared
            .filter(|token| !assignment.contains_key(token))
            .or_else(|| {
                Token::ALL
                    .into_iter()
                    .find(|token| !assignment.contains_key(token))
            });
        if let Some(token) = token {
            assignment.insert(token, address.clone());
        }
        per_player.push(token);
    }
    (assignment, per_player)
}

fn display_name(address: &Address, record: Option<&PlayerRecord>) -> String {
    record
        .and_then(|r| r.username.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| address.short())
}

/// Pure reconciliation of one batch into a snapshot.
pub fn reconcile(game: &GameRecord, batch: &RemoteBatch) -> GameSnapshot {
    // declared participants with a readable record, first occurrence wins
    let mut order: Vec<Address> = batch
        .participants
        .iter()
        .filter(|address| batch.players.contains_key(*address))
        .unique()
        .cloned()
        .collect();

    // owners the participant list does not mention
    let extra_owners: Vec<Address> = batch
        .property_ids
        .iter()
        .filter_map(|id| batch.properties.get(id))
        .filter_map(|record| record.owner.clone())
        .unique()
        .filter(|owner| !order.contains(owner))
        .collect();
    if !extra_owners.is_empty() {
        debug!(
            game_id = game.id,
            count = extra_owners.len(),
            "appending property owners missing from participant list"
        );
    }
    order.extend(extra_owners);

    let declared: Vec<(Address, Option<Token>)> = order
        .iter()
        .map(|address| {
            let symbol = batch.players.get(address).and_then(|r| r.symbol);
            (address.clone(), symbol)
        })
        .collect();
    let (tokens, per_player_tokens) = assign_tokens(&declared);

    let names: HashMap<&Address, String> = order
        .iter()
        .map(|address| (address, display_name(address, batch.players.get(address))))
        .collect();

    let mut ownership = PropertyOwnershipView::new();
    let mut owned: HashMap<&Address, BTreeSet<u8>> = HashMap::new();
    for id in &batch.property_ids {
        let Some(record) = batch.properties.get(id) else {
            continue;
        };
        let Some(owner) = record.owner.as_ref() else {
            continue;
        };
        let owner_name = names
            .get(owner)
            .cloned()
            .unwrap_or_else(|| owner.short());
        ownership.insert(
            *id,
            OwnershipEntry {
                owner: owner.clone(),
                owner_name,
                development: record.development,
                mortgaged: record.mortgaged,
                current_rent: current_rent(record),
            },
        );
        if let Some(key) = order.iter().find(|a| *a == owner) {
            owned.entry(key).or_default().insert(*id);
        }
    }

    let players = order
        .iter()
        .zip(per_player_tokens)
        .map(|(address, token)| {
            let record = batch.players.get(address);
            PlayerView {
                address: address.clone(),
                display_name: names
                    .get(address)
                    .cloned()
                    .unwrap_or_else(|| address.short()),
                position: record.map(|r| r.position).unwrap_or_default(),
                balance: record.map(|r| r.balance).unwrap_or_default(),
                jailed: record.map(|r| r.jailed).unwrap_or_default(),
                owned_properties: owned
                    .get(address)
                    .map(|ids| ids.iter().copied().collect())
                    .unwrap_or_default(),
                token,
                is_next: game.next_player.as_ref() == Some(address),
            }
        })
        .collect();

    GameSnapshot {
        game: GameView::from(game.clone()),
        players,
        tokens,
        ownership,
    }
}

/// Fetches everything one game view needs and reconciles it.
pub struct Reconciler<C> {
    client: Arc<C>,
    property_ids: Vec<u8>,
}

impl<C> Clone for Reconciler<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            property_ids: self.property_ids.clone(),
        }
    }
}

impl<C: RemoteStateClient> Reconciler<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            property_ids: board::property_ids(),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub async fn fetch_batch(&self, game: &GameRecord) -> RemoteBatch {
        let client = self.client.as_ref();
        let participants: Vec<Address> = game.players.iter().unique().cloned().collect();

        let player_reads = participants
            .iter()
            .map(|address| client.get_player(game.id, address));
        let property_reads = self
            .property_ids
            .iter()
            .map(|id| client.get_property(game.id, *id));
        let (player_results, property_results) =
            futures::join!(join_all(player_reads), join_all(property_reads));

        let mut players = HashMap::new();
        for (address, result) in participants.iter().zip(player_results) {
            match result {
                Ok(record) => {
                    players.insert(address.clone(), record);
                }
                Err(err) => {
                    warn!(game_id = game.id, %address, error = %err, "player read failed")
                }
            }
        }

        let mut properties = HashMap::new();
        for (id, result) in self.property_ids.iter().zip(property_results) {
            match result {
                Ok(record) => {
                    properties.insert(*id, record);
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    warn!(game_id = game.id, property_id = id, error = %err, "property read failed")
                }
            }
        }

        // best-effort records for owners outside the participant list
        let missing_owners: Vec<Address> = properties
            .values()
            .filter_map(|record| record.owner.clone())
            .unique()
            .filter(|owner| !players.contains_key(owner))
            .collect();
        let owner_reads = missing_owners
            .iter()
            .map(|address| client.get_player(game.id, address));
        for (address, result) in missing_owners.iter().zip(join_all(owner_reads).await) {
            if let Ok(record) = result {
                players.insert(address.clone(), record);
            }
        }

        RemoteBatch {
            participants,
            players,
            property_ids: self.property_ids.clone(),
            properties,
        }
    }

    /// Reads the game and rebuilds its snapshot. Only a failed game read fails.
    pub async fn refresh(&self, game_id: u64) -> Result<GameSnapshot> {
        let game = self.client.get_game(game_id).await?;
        let batch = self.fetch_batch(&game).await;
        Ok(reconcile(&game, &batch))
    }
}
