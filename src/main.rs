use blockopoly_client::{
    board,
    config::{
        Cli,
        ClientConfig,
        Command,
    },
    dispatch::{
        Dispatcher,
        GameAction,
        spec_for,
    },
    indexer_client::GatewayClient,
    reconcile::Reconciler,
    remote::RemoteStateClient,
    route::{
        self,
        Route,
    },
    session::SessionFlows,
    store::LocalStore,
    sync::{
        SharedView,
        SyncCommand,
        SyncEvent,
        SyncHandle,
        spawn_sync,
    },
    types::{
        GameStatus,
        Token,
    },
};
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::sync::{
    Arc,
    OnceLock,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod ui;

const DEFAULT_PLAYERS: u8 = 4;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logs go to a daily file; stdout belongs to the terminal UI.
fn init_tracing(config: &ClientConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .wrap_err_with(|| format!("creating log dir {}", config.log_dir.display()))?;
    let appender = rolling::daily(&config.log_dir, "blockopoly.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))
}

struct App {
    config: ClientConfig,
    client: Arc<GatewayClient>,
    store: LocalStore,
    flows: SessionFlows<GatewayClient>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = ClientConfig::from_cli(&cli)?;
    init_tracing(&config)?;
    info!(gateway = %config.gateway_url, address = %config.address, "starting blockopoly client");

    let client = Arc::new(GatewayClient::new(
        &config.gateway_url,
        config.request_timeout,
    )?);
    let store = LocalStore::new(&config.data_dir)?;
    let flows =
        SessionFlows::new(client.clone(), config.address.clone()).with_store(store.clone());
    let app = App {
        config,
        client,
        store,
        flows,
    };

    match cli.command {
        Command::Create { players, symbol } => app.create(players, symbol).await,
        Command::Join { game_id, symbol } => app.join(game_id, symbol).await,
        Command::Start { game_id } => {
            app.flows.start_game(game_id).await?;
            println!("Game #{game_id} started");
            app.play(game_id).await
        }
        Command::Play { game_id } => {
            let game_id = match game_id {
                Some(id) => id,
                None => app
                    .store
                    .current_game()?
                    .ok_or_else(|| eyre!("no current game; pass --game-id"))?,
            };
            app.play(game_id).await
        }
        Command::Open { query } => app.open(&query).await,
        Command::Games => app.list_games().await,
        Command::Register { username } => {
            let confirmed = app.flows.register(&username).await?;
            if confirmed {
                println!("Registered as {username}");
            } else {
                println!("Registration submitted; the name will show up shortly");
            }
            Ok(())
        }
    }
}

impl App {
    async fn open(&self, query: &str) -> Result<()> {
        let route = route::parse(query)?;
        let poll = self.flows.polls().for_route(&route);
        info!(?route, ?poll, "opening route");
        match route {
            Route::Lobby => self.list_games().await,
            Route::Create => self.create(DEFAULT_PLAYERS, None).await,
            Route::Join { game_id } => self.join(game_id, None).await,
            Route::WaitingRoom { game_id, creator } => {
                if let Some(creator) = creator {
                    println!("Waiting room of game #{game_id} (created by {})", creator.short());
                }
                self.waiting_room(game_id).await
            }
            Route::Play { game_id } => self.play(game_id).await,
        }
    }

    async fn create(&self, players: u8, symbol: Option<Token>) -> Result<()> {
        println!("Creating a {players}-player game...");
        let game = self.flows.create_game(players, symbol).await?;
        println!("Created game #{}. Share: gameId={}&action=join", game.id, game.id);
        self.play(game.id).await
    }

    async fn join(&self, game_id: u64, symbol: Option<Token>) -> Result<()> {
        println!("Joining game #{game_id}...");
        let game = self.flows.join_game(game_id, symbol).await?;
        println!(
            "Joined game #{game_id} ({}/{} players)",
            game.joined_players, game.max_players
        );
        self.play(game_id).await
    }

    /// Blocks until the creator starts the game, then opens the board.
    async fn waiting_room(&self, game_id: u64) -> Result<()> {
        loop {
            match self.flows.await_status(game_id, GameStatus::Ongoing).await {
                Ok(_) => break,
                Err(err) if err.is_retryable() => {
                    let game = self.client.get_game(game_id).await?;
                    if game.status == GameStatus::Ended {
                        return Err(eyre!("game #{game_id} ended before it started"));
                    }
                    println!(
                        "{}/{} players joined, still waiting for the start...",
                        game.joined_players, game.max_players
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.play(game_id).await
    }

    async fn list_games(&self) -> Result<()> {
        let session = self.store.load()?;
        if session.ongoing_games.is_empty() {
            println!("No games yet. Try `blockopoly create`.");
            return Ok(());
        }
        for game_id in &session.ongoing_games {
            let marker = if session.current_game_id == Some(*game_id) {
                "*"
            } else {
                " "
            };
            match self.client.get_game(*game_id).await {
                Ok(game) => println!(
                    "{marker} #{game_id}  {}  {}/{} players",
                    game.status, game.joined_players, game.max_players
                ),
                Err(err) => println!("{marker} #{game_id}  unavailable ({err})"),
            }
        }
        Ok(())
    }

    async fn play(&self, game_id: u64) -> Result<()> {
        self.store.enter_game(game_id)?;
        let view = SharedView::new();
        let (sync, mut sync_events) = spawn_sync(
            Reconciler::new(self.client.clone()),
            game_id,
            view.clone(),
            self.config.backoff,
        );
        sync.fetch_now();
        let mut dispatcher =
            Dispatcher::new(self.client.clone(), view, game_id, self.config.address.clone());
        let mut ui_state = ui::UiState::new(self.config.address.clone());
        let mut input_events = ui::input_event_stream();

        info!(game_id, "opening game view");
        ui::terminal_enter(&mut ui_state)?;
        let res = run_loop(
            &mut dispatcher,
            &mut ui_state,
            &mut input_events,
            &mut sync_events,
            &sync,
        )
        .await;
        let ended = sync
            .view()
            .snapshot()
            .is_some_and(|snapshot| snapshot.game.status == GameStatus::Ended);
        sync.shutdown().await;
        ui::terminal_exit()?;

        if ended {
            self.store.leave_game(game_id)?;
            println!("Game #{game_id} has ended");
        }
        res
    }
}

async fn run_loop<C: RemoteStateClient>(
    dispatcher: &mut Dispatcher<C>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    sync_events: &mut mpsc::UnboundedReceiver<SyncEvent>,
    sync: &SyncHandle,
) -> Result<()> {
    ui::draw(ui_state, None, dispatcher.state()).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            maybe_event = sync_events.recv() => {
                match maybe_event {
                    Some(SyncEvent::Snapshot(snapshot)) => {
                        ui_state.set_sync_error(None);
                        ui::draw(ui_state, Some(&snapshot), dispatcher.state())
                            .wrap_err("draw after refresh failed")?;
                    }
                    Some(SyncEvent::FetchFailed(message)) => {
                        ui_state.set_sync_error(Some(message));
                        ui::draw(ui_state, None, dispatcher.state())
                            .wrap_err("draw after failed refresh failed")?;
                    }
                    None => {
                        warn!("sync worker channel closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Visibility(visible) => {
                        sync.send(SyncCommand::SetVisible(visible));
                    }
                    ui::UserEvent::CloseCard => dispatcher.close_modal(),
                    ui::UserEvent::Retry => {
                        show_processing_status(ui_state, dispatcher, "Refreshing...")?;
                        if let Err(err) = dispatcher.retry().await {
                            error!(error = %err, "manual refresh failed");
                        }
                    }
                    ui::UserEvent::Roll => {
                        let (a, b) = board::roll_dice(&mut rand::rng());
                        info!(a, b, "rolled dice");
                        let roll = GameAction::RollAndMove { steps: a + b };
                        submit_action(ui_state, dispatcher, roll).await?;
                    }
                    ui::UserEvent::Action(action) => {
                        submit_action(ui_state, dispatcher, action).await?;
                    }
                }
                let snapshot = dispatcher.view().snapshot();
                ui::draw(ui_state, snapshot.as_ref(), dispatcher.state())
                    .wrap_err("draw after input failed")?;
            }
        }
    }
    Ok(())
}

async fn submit_action<C: RemoteStateClient>(
    ui_state: &mut ui::UiState,
    dispatcher: &mut Dispatcher<C>,
    action: GameAction,
) -> Result<()> {
    let name = spec_for(action.kind()).name;
    if dispatcher.check(&action).is_ok() {
        show_processing_status(ui_state, dispatcher, format!("{name}..."))?;
    }
    // failures land in the dispatcher state and are drawn by the caller
    if let Err(err) = dispatcher.dispatch(action).await {
        warn!(action = name, error = %err, "action not applied");
    }
    Ok(())
}

fn show_processing_status<C: RemoteStateClient>(
    ui_state: &mut ui::UiState,
    dispatcher: &Dispatcher<C>,
    status: impl Into<String>,
) -> Result<()> {
    let mut pending = dispatcher.state().clone();
    pending.loading = true;
    pending.status = Some(status.into());
    ui::draw(ui_state, None, &pending).wrap_err("draw while submitting failed")
}
