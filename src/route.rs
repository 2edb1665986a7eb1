//! Entry routing from query parameters (`gameId`, `creator`, `action`).
//!
//! Accepts a bare query (`gameId=3&action=join`), one with a leading `?`, or
//! a full URL.

use crate::{
    error::{
        Error,
        Result,
    },
    types::Address,
};
use url::{
    Url,
    form_urlencoded,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// No game selected.
    Lobby,
    Create,
    Join { game_id: u64 },
    /// Creator-side waiting room before the game starts.
    WaitingRoom {
        game_id: u64,
        creator: Option<Address>,
    },
    Play { game_id: u64 },
}

impl Route {
    pub fn game_id(&self) -> Option<u64> {
        match self {
            Route::Join { game_id }
            | Route::WaitingRoom { game_id, .. }
            | Route::Play { game_id } => Some(*game_id),
            Route::Lobby | Route::Create => None,
        }
    }
}

pub fn parse(input: &str) -> Result<Route> {
    let input = input.trim();
    let query = if input.contains("://") {
        let url = Url::parse(input).map_err(|err| Error::InvalidRoute(err.to_string()))?;
        url.query().unwrap_or_default().to_string()
    } else {
        input.trim_start_matches('?').to_string()
    };

    let mut game_id = None;
    let mut creator = None;
    let mut action = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "gameId" => {
                let id = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidRoute(format!("gameId '{value}' is not a number")))?;
                game_id = Some(id);
            }
            "creator" => creator = Some(Address::parse(&value)?),
            "action" => action = Some(value.trim().to_ascii_lowercase()),
            _ => {}
        }
    }

    let require_game = |action: &str| {
        game_id.ok_or_else(|| Error::InvalidRoute(format!("action '{action}' needs a gameId")))
    };
    match action.as_deref() {
        Some("create") => Ok(Route::Create),
        Some("join") => Ok(Route::Join {
            game_id: require_game("join")?,
        }),
        Some("start") => Ok(Route::WaitingRoom {
            game_id: require_game("start")?,
            creator,
        }),
        Some("play") => Ok(Route::Play {
            game_id: require_game("play")?,
        }),
        Some(other) => Err(Error::InvalidRoute(format!("unknown action '{other}'"))),
        None => Ok(match (game_id, creator) {
            (Some(game_id), Some(creator)) => Route::WaitingRoom {
                game_id,
                creator: Some(creator),
            },
            (Some(game_id), None) => Route::Play { game_id },
            (None, _) => Route::Lobby,
        }),
    }
}
