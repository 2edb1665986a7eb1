//! Local session persistence: which game is current and which games the user
//! is taking part in. Stored as pretty-printed JSON in the data directory.

use crate::error::{
    Error,
    Result,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::debug;

pub const SESSION_FILE: &str = "session.json";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub current_game_id: Option<u64>,
    #[serde(default)]
    pub ongoing_games: Vec<u64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = ensure_store(data_dir.as_ref())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SessionRecord> {
        read_record(&self.path)
    }

    /// Applies `change` to the stored record and writes it back.
    pub fn update(&self, change: impl FnOnce(&mut SessionRecord)) -> Result<SessionRecord> {
        let mut record = self.load()?;
        change(&mut record);
        record.updated_at = Some(Utc::now().to_rfc3339());
        write_record(&self.path, &record)?;
        Ok(record)
    }

    pub fn current_game(&self) -> Result<Option<u64>> {
        Ok(self.load()?.current_game_id)
    }

    /// Makes `game_id` current and remembers it as ongoing.
    pub fn enter_game(&self, game_id: u64) -> Result<SessionRecord> {
        debug!(game_id, path = %self.path.display(), "recording current game");
        self.update(|record| {
            record.current_game_id = Some(game_id);
            if !record.ongoing_games.contains(&game_id) {
                record.ongoing_games.push(game_id);
            }
        })
    }

    pub fn leave_game(&self, game_id: u64) -> Result<SessionRecord> {
        self.update(|record| {
            record.ongoing_games.retain(|id| *id != game_id);
            if record.current_game_id == Some(game_id) {
                record.current_game_id = None;
            }
        })
    }
}

fn ensure_store(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|err| {
            Error::Store(format!("failed to create {}: {err}", dir.display()))
        })?;
    }
    let file_path = dir.join(SESSION_FILE);
    if !file_path.exists() {
        write_record(&file_path, &SessionRecord::default())?;
    }
    Ok(file_path)
}

fn read_record(path: &Path) -> Result<SessionRecord> {
    let data = fs::read(path)
        .map_err(|err| Error::Store(format!("failed to read {}: {err}", path.display())))?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(SessionRecord::default());
    }
    serde_json::from_slice(&data)
        .map_err(|err| Error::Store(format!("failed to parse {}: {err}", path.display())))
}

fn write_record(path: &Path, record: &SessionRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .map_err(|err| Error::Store(format!("failed to serialize session: {err}")))?;
    fs::write(path, json)
        .map_err(|err| Error::Store(format!("failed to write {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn new__creates_empty_session_file() {
        let dir = TempDir::new("blockopoly-store").unwrap();
        let store = LocalStore::new(dir.path().join("nested")).unwrap();

        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), SessionRecord::default());
    }

    #[test]
    fn enter_game__sets_current_and_dedups_ongoing() {
        // given
        let dir = TempDir::new("blockopoly-store").unwrap();
        let store = LocalStore::new(dir.path()).unwrap();

        // when
        store.enter_game(4).unwrap();
        store.enter_game(7).unwrap();
        let record = store.enter_game(4).unwrap();

        // then
        assert_eq!(record.current_game_id, Some(4));
        assert_eq!(record.ongoing_games, vec![4, 7]);
        assert!(record.updated_at.is_some());
        assert_eq!(store.load().unwrap(), record);
    }

    #[test]
    fn leave_game__clears_current_only_when_it_matches() {
        let dir = TempDir::new("blockopoly-store").unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        store.enter_game(1).unwrap();
        store.enter_game(2).unwrap();

        let record = store.leave_game(1).unwrap();
        assert_eq!(record.current_game_id, Some(2));
        assert_eq!(record.ongoing_games, vec![2]);

        let record = store.leave_game(2).unwrap();
        assert_eq!(record.current_game_id, None);
    }

    #[test]
    fn load__rejects_corrupt_file() {
        let dir = TempDir::new("blockopoly-store").unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        fs::write(store.path(), b"{not json").unwrap();

        assert!(matches!(store.load(), Err(Error::Store(_))));
    }
}
