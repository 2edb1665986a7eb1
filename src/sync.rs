//! Keeping the game view current.
//!
//! [`SharedView`] holds the latest committed [`GameSnapshot`]. Fetches take a
//! [`FetchTicket`] before reading and may only commit if no newer ticket has
//! been issued since, so a slow response can never overwrite a fresher one.
//! [`spawn_sync`] runs the periodic refresh in the background.

use crate::{
    poll::Backoff,
    reconcile::{
        GameSnapshot,
        Reconciler,
    },
    remote::RemoteStateClient,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        Instant,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Default)]
struct ViewSlot {
    issued: u64,
    snapshot: Option<GameSnapshot>,
    closed: bool,
}

/// Sequence number handed out before a fetch starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Clone, Debug, Default)]
pub struct SharedView {
    slot: Arc<Mutex<ViewSlot>>,
}

impl SharedView {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ViewSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn issue(&self) -> FetchTicket {
        let mut slot = self.lock();
        slot.issued += 1;
        FetchTicket(slot.issued)
    }

    /// Stores `snapshot` if `ticket` is still the most recent one issued and
    /// the view has not been closed. Returns whether it was stored.
    pub fn commit(&self, ticket: FetchTicket, snapshot: GameSnapshot) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            debug!(ticket = ticket.0, "view closed, dropping fetch result");
            return false;
        }
        if ticket.0 != slot.issued {
            debug!(
                ticket = ticket.0,
                latest = slot.issued,
                "newer fetch issued, dropping stale result"
            );
            return false;
        }
        slot.snapshot = Some(snapshot);
        true
    }

    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.lock().snapshot.clone()
    }

    /// Stops accepting commits. Fetches still in flight resolve into nothing.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncCommand {
    FetchNow,
    /// Periodic refresh runs only while the view is visible.
    SetVisible(bool),
    Shutdown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    Snapshot(GameSnapshot),
    FetchFailed(String),
}

pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
    view: SharedView,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Sends a command; returns `false` once the worker is gone.
    pub fn send(&self, command: SyncCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn fetch_now(&self) -> bool {
        self.send(SyncCommand::FetchNow)
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    /// Closes the view and waits for the worker to exit.
    pub async fn shutdown(self) {
        self.view.close();
        let _ = self.commands.send(SyncCommand::Shutdown);
        if let Err(err) = self.task.await {
            warn!(error = %err, "sync worker did not exit cleanly");
        }
    }
}

pub fn spawn_sync<C>(
    reconciler: Reconciler<C>,
    game_id: u64,
    view: SharedView,
    backoff: Backoff,
) -> (SyncHandle, mpsc::UnboundedReceiver<SyncEvent>)
where
    C: RemoteStateClient + Send + Sync + 'static,
{
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(sync_worker(
        reconciler,
        game_id,
        view.clone(),
        backoff,
        command_rx,
        event_tx,
    ));
    let handle = SyncHandle {
        commands: command_tx,
        view,
        task,
    };
    (handle, event_rx)
}

async fn sync_worker<C: RemoteStateClient>(
    reconciler: Reconciler<C>,
    game_id: u64,
    view: SharedView,
    mut backoff: Backoff,
    mut command_rx: mpsc::UnboundedReceiver<SyncCommand>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
) {
    async fn fetch<C: RemoteStateClient>(
        reconciler: &Reconciler<C>,
        game_id: u64,
        view: &SharedView,
        backoff: &mut Backoff,
        event_tx: &mpsc::UnboundedSender<SyncEvent>,
    ) -> bool {
        let ticket = view.issue();
        let event = match reconciler.refresh(game_id).await {
            Ok(snapshot) => {
                backoff.on_success();
                if !view.commit(ticket, snapshot.clone()) {
                    return !view.is_closed();
                }
                SyncEvent::Snapshot(snapshot)
            }
            Err(err) => {
                let delay = backoff.on_failure();
                warn!(game_id, error = %err, next_in = ?delay, "game refresh failed");
                SyncEvent::FetchFailed(err.to_string())
            }
        };
        event_tx.send(event).is_ok()
    }

    info!(game_id, "sync worker started");
    let mut visible = true;
    let mut next_fetch = Instant::now();
    loop {
        tokio::select! {
            _ = time::sleep_until(next_fetch), if visible => {
                if !fetch(&reconciler, game_id, &view, &mut backoff, &event_tx).await {
                    break;
                }
                next_fetch = Instant::now() + backoff.current();
            }
            command = command_rx.recv() => {
                match command {
                    None | Some(SyncCommand::Shutdown) => break,
                    Some(SyncCommand::FetchNow) => {
                        if !fetch(&reconciler, game_id, &view, &mut backoff, &event_tx).await {
                            break;
                        }
                        next_fetch = Instant::now() + backoff.current();
                    }
                    Some(SyncCommand::SetVisible(now_visible)) => {
                        debug!(game_id, now_visible, "view visibility changed");
                        if now_visible && !visible {
                            next_fetch = Instant::now();
                        }
                        visible = now_visible;
                    }
                }
            }
        }
    }
    info!(game_id, "sync worker stopped");
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::types::{
        Address,
        GameStatus,
        GameView,
        PropertyOwnershipView,
        TokenAssignment,
    };

    fn snapshot(joined_players: u8) -> GameSnapshot {
        GameSnapshot {
            game: GameView {
                id: 1,
                creator: Address::new("0x01"),
                status: GameStatus::Pending,
                max_players: 4,
                joined_players,
                is_initialised: true,
                next_player: None,
                participants: Vec::new(),
            },
            players: Vec::new(),
            tokens: TokenAssignment::new(),
            ownership: PropertyOwnershipView::new(),
        }
    }

    #[test]
    fn commit__discards_result_of_superseded_ticket() {
        // given
        let view = SharedView::new();
        let slow = view.issue();
        let fast = view.issue();

        // when
        let fast_stored = view.commit(fast, snapshot(2));
        let slow_stored = view.commit(slow, snapshot(1));

        // then
        assert!(fast_stored);
        assert!(!slow_stored);
        assert_eq!(view.snapshot(), Some(snapshot(2)));
    }

    #[test]
    fn commit__rejected_after_close() {
        let view = SharedView::new();
        let ticket = view.issue();
        view.close();

        assert!(!view.commit(ticket, snapshot(1)));
        assert_eq!(view.snapshot(), None);
    }

    #[test]
    fn shared_view__clones_observe_the_same_slot() {
        let view = SharedView::new();
        let other = view.clone();
        let ticket = other.issue();

        assert!(other.commit(ticket, snapshot(3)));
        assert_eq!(view.snapshot(), Some(snapshot(3)));
    }
}
