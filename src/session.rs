//! Lobby flows that have to wait for the remote index to catch up with a
//! write: creating, joining and starting games, and registering a username.

use crate::{
    error::{
        Error,
        Result,
    },
    poll::{
        PollConfig,
        poll_until,
    },
    remote::{
        NewGame,
        RemoteStateClient,
    },
    route::Route,
    store::LocalStore,
    types::{
        Address,
        GameRecord,
        GameStatus,
        Token,
    },
};
use std::sync::Arc;
use tracing::{
    info,
    warn,
};

pub const MIN_PLAYERS: u8 = 2;
pub const MAX_PLAYERS: u8 = 8;

/// Poll variants of the lobby flows. `creation` backs `create_game`, `status`
/// backs joining and the waiting room, `quick` backs username registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolls {
    pub creation: PollConfig,
    pub status: PollConfig,
    pub quick: PollConfig,
}

impl SessionPolls {
    /// The poll the flow behind `route` runs; `None` for views that only
    /// refresh through the sync loop.
    pub fn for_route(&self, route: &Route) -> Option<PollConfig> {
        match route {
            Route::Create => Some(self.creation),
            Route::Join { .. } | Route::WaitingRoom { .. } => Some(self.status),
            Route::Lobby | Route::Play { .. } => None,
        }
    }
}

impl Default for SessionPolls {
    fn default() -> Self {
        Self {
            creation: PollConfig::creation(),
            status: PollConfig::status(),
            quick: PollConfig::quick(),
        }
    }
}

pub struct SessionFlows<C> {
    client: Arc<C>,
    actor: Address,
    store: Option<LocalStore>,
    polls: SessionPolls,
}

impl<C: RemoteStateClient> SessionFlows<C> {
    pub fn new(client: Arc<C>, actor: Address) -> Self {
        Self {
            client,
            actor,
            store: None,
            polls: SessionPolls::default(),
        }
    }

    pub fn with_store(mut self, store: LocalStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_polls(mut self, polls: SessionPolls) -> Self {
        self.polls = polls;
        self
    }

    pub fn actor(&self) -> &Address {
        &self.actor
    }

    pub fn polls(&self) -> &SessionPolls {
        &self.polls
    }

    /// Creates a game and waits until it is initialised.
    ///
    /// The new id is found by watching the game counter move past its value
    /// before the write; if several games appeared meanwhile the newest one
    /// created by the actor wins.
    pub async fn create_game(
        &self,
        max_players: u8,
        symbol: Option<Token>,
    ) -> Result<GameRecord> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
            return Err(Error::Precondition(format!(
                "a game takes {MIN_PLAYERS} to {MAX_PLAYERS} players, got {max_players}"
            )));
        }
        let client = self.client.as_ref();
        let before = client.game_count().await?;
        let expected = before + 1;
        let receipt = client
            .create_game(&NewGame {
                creator: self.actor.clone(),
                max_players,
                symbol,
            })
            .await?;
        info!(tx_id = %receipt.tx_id, expected, "create game submitted");

        let counted = poll_until(
            self.polls.creation,
            "game counter",
            || client.game_count(),
            |count| *count >= expected,
        )
        .await;
        let attempts = counted.attempts;
        let latest = counted
            .into_option()
            .ok_or_else(|| Error::confirmation_timeout("the new game to be counted", attempts))?;
        let game_id = self.find_created_game(expected, latest).await;

        let initialised = poll_until(
            self.polls.creation,
            "game initialisation",
            || client.get_game(game_id),
            |game| game.is_initialised && game.id == game_id,
        )
        .await;
        let attempts = initialised.attempts;
        let game = initialised.into_option().ok_or_else(|| {
            Error::confirmation_timeout(format!("game {game_id} to initialise"), attempts)
        })?;
        info!(game_id, "game created");
        self.remember(game_id);
        Ok(game)
    }

    async fn find_created_game(&self, first: u64, last: u64) -> u64 {
        for id in (first..=last).rev() {
            match self.client.get_game(id).await {
                Ok(game) if game.creator == self.actor => return id,
                Ok(_) => {}
                Err(err) => warn!(game_id = id, error = %err, "could not inspect new game"),
            }
        }
        first
    }

    pub async fn join_game(&self, game_id: u64, symbol: Option<Token>) -> Result<GameRecord> {
        let client = self.client.as_ref();
        let game = client.get_game(game_id).await?;
        if game.status != GameStatus::Pending {
            return Err(Error::Precondition(format!(
                "game {game_id} is {} and can no longer be joined",
                game.status
            )));
        }
        if !game.players.contains(&self.actor) {
            let receipt = client.join_game(game_id, &self.actor, symbol).await?;
            info!(game_id, tx_id = %receipt.tx_id, "join submitted");
        }

        let actor = &self.actor;
        let joined = poll_until(
            self.polls.status,
            "join confirmation",
            || client.get_game(game_id),
            |game| game.players.contains(actor),
        )
        .await;
        let attempts = joined.attempts;
        let game = joined.into_option().ok_or_else(|| {
            Error::confirmation_timeout(format!("join of game {game_id}"), attempts)
        })?;
        self.remember(game_id);
        Ok(game)
    }

    pub async fn start_game(&self, game_id: u64) -> Result<GameRecord> {
        let client = self.client.as_ref();
        let receipt = client.start_game(game_id, &self.actor).await?;
        info!(game_id, tx_id = %receipt.tx_id, "start submitted");
        self.await_status(game_id, GameStatus::Ongoing).await
    }

    /// Waiting-room poll: returns once the game reports `status`.
    pub async fn await_status(&self, game_id: u64, status: GameStatus) -> Result<GameRecord> {
        let client = self.client.as_ref();
        let outcome = poll_until(
            self.polls.status,
            "game status",
            || client.get_game(game_id),
            |game| game.status == status,
        )
        .await;
        let attempts = outcome.attempts;
        outcome.into_option().ok_or_else(|| {
            Error::confirmation_timeout(format!("game {game_id} to become {status}"), attempts)
        })
    }

    /// Registers `username` for the actor. Confirmation is best effort: the
    /// username index may lag, which is not worth failing the flow over.
    pub async fn register(&self, username: &str) -> Result<bool> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::Precondition("username must not be empty".to_string()));
        }
        let client = self.client.as_ref();
        let actor = &self.actor;
        let receipt = client.register_player(actor, username).await?;
        info!(tx_id = %receipt.tx_id, username, "registration submitted");
        let confirmed = poll_until(
            self.polls.quick,
            "username",
            || client.username_by_address(actor),
            |found| found.as_deref() == Some(username),
        )
        .await
        .into_option()
        .is_some();
        if !confirmed {
            warn!(username, "registration not visible yet");
        }
        Ok(confirmed)
    }

    fn remember(&self, game_id: u64) {
        if let Some(store) = &self.store
            && let Err(err) = store.enter_game(game_id)
        {
            warn!(game_id, error = %err, "failed to persist current game");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn for_route__each_route_runs_its_flow_poll() {
        let polls = SessionPolls::default();

        assert_eq!(polls.for_route(&Route::Create), Some(PollConfig::creation()));
        assert_eq!(
            polls.for_route(&Route::Join { game_id: 3 }),
            Some(PollConfig::status())
        );
        assert_eq!(
            polls.for_route(&Route::WaitingRoom {
                game_id: 3,
                creator: None,
            }),
            Some(PollConfig::status())
        );
        assert_eq!(polls.for_route(&Route::Play { game_id: 3 }), None);
        assert_eq!(polls.for_route(&Route::Lobby), None);
    }
}
