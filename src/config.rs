use crate::{
    error::{
        Error,
        Result,
    },
    poll::{
        Backoff,
        DEFAULT_BACKOFF_BASE,
        DEFAULT_BACKOFF_MAX,
    },
    types::{
        Address,
        Token,
    },
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080/";
pub const DEFAULT_DATA_DIR: &str = "~/.blockopoly";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Parser, Debug)]
#[command(
    name = "blockopoly",
    about = "Terminal client for Blockopoly games",
    version
)]
pub struct Cli {
    /// Indexer gateway that serves game state and relays transactions
    #[arg(long, env = "BLOCKOPOLY_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    pub gateway_url: String,

    /// Account address to play as
    #[arg(long, env = "BLOCKOPOLY_ADDRESS")]
    pub address: String,

    /// Where the session file lives
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,

    /// Log directory (defaults to <data-dir>/logs)
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Base refresh interval while a game is open
    #[arg(long, default_value_t = DEFAULT_BACKOFF_BASE.as_millis() as u64)]
    pub poll_base_ms: u64,

    /// Ceiling for the refresh interval after repeated failures
    #[arg(long, default_value_t = DEFAULT_BACKOFF_MAX.as_millis() as u64)]
    pub poll_max_ms: u64,

    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a game and open its waiting room
    Create {
        #[arg(long, default_value_t = 4)]
        players: u8,
        #[arg(long)]
        symbol: Option<Token>,
    },
    /// Join a pending game
    Join {
        #[arg(long)]
        game_id: u64,
        #[arg(long)]
        symbol: Option<Token>,
    },
    /// Start a game you created
    Start {
        #[arg(long)]
        game_id: u64,
    },
    /// Open the board of a game (defaults to the current game)
    Play {
        #[arg(long)]
        game_id: Option<u64>,
    },
    /// Open a game link or query string such as `gameId=3&action=join`
    Open { query: String },
    /// List the games recorded in the session file
    Games,
    /// Register a username for this address
    Register {
        #[arg(long)]
        username: String,
    },
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub gateway_url: String,
    pub address: Address,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub backoff: Backoff,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let address = Address::parse(&cli.address)?;
        if cli.poll_base_ms == 0 {
            return Err(Error::Config("--poll-base-ms must be positive".to_string()));
        }
        if cli.poll_max_ms < cli.poll_base_ms {
            return Err(Error::Config(
                "--poll-max-ms must not be below --poll-base-ms".to_string(),
            ));
        }
        let data_dir = expand_path(&cli.data_dir);
        let log_dir = cli
            .log_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| data_dir.join("logs"));
        Ok(Self {
            gateway_url: cli.gateway_url.clone(),
            address,
            data_dir,
            log_dir,
            backoff: Backoff::new(
                Duration::from_millis(cli.poll_base_ms),
                Duration::from_millis(cli.poll_max_ms),
            ),
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
        })
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn cli__parses_subcommand_and_defaults() {
        // given
        let args = [
            "blockopoly",
            "--address",
            "0xABCD",
            "--data-dir",
            "/tmp/blockopoly",
            "join",
            "--game-id",
            "7",
            "--symbol",
            "dog",
        ];

        // when
        let cli = Cli::try_parse_from(args).unwrap();
        let config = ClientConfig::from_cli(&cli).unwrap();

        // then
        assert_eq!(
            cli.command,
            Command::Join {
                game_id: 7,
                symbol: Some(Token::Dog),
            }
        );
        assert_eq!(config.address, Address::new("0xabcd"));
        assert_eq!(config.log_dir, PathBuf::from("/tmp/blockopoly/logs"));
        assert_eq!(config.backoff.current(), DEFAULT_BACKOFF_BASE);
    }

    #[test]
    fn from_cli__rejects_inverted_backoff_bounds() {
        let cli = Cli::try_parse_from([
            "blockopoly",
            "--address",
            "0x01",
            "--poll-base-ms",
            "5000",
            "--poll-max-ms",
            "1000",
            "games",
        ])
        .unwrap();

        assert!(matches!(ClientConfig::from_cli(&cli), Err(Error::Config(_))));
    }

    #[test]
    fn from_cli__rejects_malformed_address() {
        let cli = Cli::try_parse_from(["blockopoly", "--address", "alice", "games"]).unwrap();

        assert!(matches!(
            ClientConfig::from_cli(&cli),
            Err(Error::InvalidAddress(_))
        ));
    }
}
