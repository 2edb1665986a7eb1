use blockopoly_client::{
    poll::Backoff,
    reconcile::Reconciler,
    sync::{
        SharedView,
        SyncCommand,
        SyncEvent,
        spawn_sync,
    },
    test_helpers::*,
    types::{
        Address,
        GameStatus,
    },
};
use std::{
    sync::Arc,
    time::Duration,
};

const ALICE: &str = "0xaaaa";
const BOB: &str = "0xbbbb";

fn ongoing_remote() -> Arc<FakeRemote> {
    let mut game = game_record(1, &[ALICE, BOB]);
    game.status = GameStatus::Ongoing;
    game.next_player = Some(Address::new(ALICE));
    Arc::new(
        FakeRemote::new()
            .with_game(game)
            .with_player(1, player_record(ALICE, 0))
            .with_player(1, player_record(BOB, 0)),
    )
}

fn backoff() -> Backoff {
    Backoff::new(Duration::from_secs(1), Duration::from_secs(4))
}

#[tokio::test(start_paused = true)]
async fn spawn_sync__publishes_and_commits_first_snapshot() {
    // given
    let remote = ongoing_remote();
    let view = SharedView::new();

    // when
    let (handle, mut events) = spawn_sync(Reconciler::new(remote), 1, view.clone(), backoff());
    let event = events.recv().await;

    // then
    let Some(SyncEvent::Snapshot(snapshot)) = event else {
        panic!("expected a snapshot, got {event:?}");
    };
    assert_eq!(snapshot.game.id, 1);
    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(view.snapshot(), Some(snapshot));

    handle.shutdown().await;
    assert!(view.is_closed());
}

#[tokio::test(start_paused = true)]
async fn spawn_sync__periodic_refresh_sees_remote_changes() {
    // given
    let remote = ongoing_remote();
    let (handle, mut events) =
        spawn_sync(Reconciler::new(remote.clone()), 1, SharedView::new(), backoff());
    events.recv().await;

    // when
    remote.set_player(1, player_record(ALICE, 9));
    let event = events.recv().await;

    // then
    let Some(SyncEvent::Snapshot(snapshot)) = event else {
        panic!("expected a snapshot, got {event:?}");
    };
    assert_eq!(snapshot.player(&Address::new(ALICE)).unwrap().position, 9);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn spawn_sync__missing_game_reports_failure_and_keeps_view_empty() {
    // given
    let view = SharedView::new();

    // when
    let (handle, mut events) = spawn_sync(
        Reconciler::new(Arc::new(FakeRemote::new())),
        1,
        view.clone(),
        backoff(),
    );
    let event = events.recv().await;

    // then
    assert!(matches!(event, Some(SyncEvent::FetchFailed(_))));
    assert_eq!(view.snapshot(), None);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn spawn_sync__hidden_view_pauses_periodic_refresh() {
    // given
    let remote = ongoing_remote();
    let (handle, mut events) =
        spawn_sync(Reconciler::new(remote.clone()), 1, SharedView::new(), backoff());
    events.recv().await;
    let reads = remote.calls("get_game");

    // when
    handle.send(SyncCommand::SetVisible(false));
    tokio::time::sleep(Duration::from_secs(30)).await;

    // then
    assert_eq!(remote.calls("get_game"), reads);

    // and showing it again refreshes straight away
    handle.send(SyncCommand::SetVisible(true));
    assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));
    assert_eq!(remote.calls("get_game"), reads + 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn spawn_sync__fetch_now_refreshes_immediately() {
    let remote = ongoing_remote();
    let (handle, mut events) =
        spawn_sync(Reconciler::new(remote.clone()), 1, SharedView::new(), backoff());
    events.recv().await;

    remote.set_player(1, player_record(BOB, 20));
    assert!(handle.fetch_now());
    let event = events.recv().await;

    let Some(SyncEvent::Snapshot(snapshot)) = event else {
        panic!("expected a snapshot, got {event:?}");
    };
    assert_eq!(snapshot.player(&Address::new(BOB)).unwrap().position, 20);
    handle.shutdown().await;
}
