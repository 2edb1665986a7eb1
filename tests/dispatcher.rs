use blockopoly_client::{
    Error,
    board::CardDeck,
    dispatch::{
        Dispatcher,
        GameAction,
        GuardError,
        Modal,
    },
    poll::PollConfig,
    sync::SharedView,
    test_helpers::*,
    types::{
        Address,
        GameStatus,
    },
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::{
    sync::Arc,
    time::Duration,
};

const ALICE: &str = "0xaaaa";
const BOB: &str = "0xbbbb";

fn ongoing_game(next: &str) -> FakeRemote {
    let mut game = game_record(1, &[ALICE, BOB]);
    game.status = GameStatus::Ongoing;
    game.next_player = Some(Address::new(next));
    FakeRemote::new()
        .with_game(game)
        .with_player(1, player_record(ALICE, 0))
        .with_player(1, player_record(BOB, 0))
}

fn dispatcher_for(remote: &Arc<FakeRemote>) -> Dispatcher<FakeRemote> {
    Dispatcher::new(remote.clone(), SharedView::new(), 1, Address::new(ALICE))
        .with_status_poll(PollConfig::new(Duration::from_millis(100), 5))
        .with_rng(StdRng::seed_from_u64(3))
}

async fn loaded(remote: FakeRemote) -> (Arc<FakeRemote>, Dispatcher<FakeRemote>) {
    let remote = Arc::new(remote);
    let mut dispatcher = dispatcher_for(&remote);
    dispatcher.retry().await.unwrap();
    (remote, dispatcher)
}

#[tokio::test(start_paused = true)]
async fn check__before_first_refresh_reports_no_snapshot() {
    // given
    let remote = Arc::new(ongoing_game(ALICE));
    let dispatcher = dispatcher_for(&remote);

    // when
    let result = dispatcher.check(&GameAction::FinishTurn);

    // then
    assert_eq!(result, Err(GuardError::NoSnapshot));
}

#[tokio::test(start_paused = true)]
async fn dispatch__buy_house_on_unowned_property_makes_no_call() {
    // given
    let (remote, mut dispatcher) = loaded(ongoing_game(ALICE)).await;

    // when
    let result = dispatcher
        .dispatch(GameAction::BuyHouse { property_id: 3 })
        .await;

    // then
    assert!(matches!(
        result,
        Err(Error::Guard(GuardError::NotOwner("Baltic Avenue")))
    ));
    assert_eq!(remote.calls("buy_house_or_hotel"), 0);
    assert!(dispatcher.state().error.is_some());
    assert!(!dispatcher.state().loading);
}

#[tokio::test(start_paused = true)]
async fn dispatch__buy_property_refreshes_ownership() {
    // given
    let (remote, mut dispatcher) = loaded(ongoing_game(ALICE)).await;

    // when
    let receipt = dispatcher
        .dispatch(GameAction::BuyProperty { property_id: 1 })
        .await
        .unwrap();

    // then
    assert!(!receipt.tx_id.is_empty());
    assert_eq!(remote.calls("buy_property"), 1);
    let snapshot = dispatcher.view().snapshot().unwrap();
    let entry = snapshot.owner_of(1).unwrap();
    assert_eq!(entry.owner, Address::new(ALICE));
    assert_eq!(entry.current_rent, 2);
    assert_eq!(
        snapshot.player(&Address::new(ALICE)).unwrap().owned_properties,
        vec![1]
    );
    assert!(dispatcher.state().error.is_none());
    assert!(dispatcher.state().status.is_some());
}

#[tokio::test(start_paused = true)]
async fn dispatch__upgrading_a_street_raises_its_rent() {
    // given
    let remote = ongoing_game(ALICE).with_property(1, property_record(3, Some(ALICE), 1));
    let (remote, mut dispatcher) = loaded(remote).await;

    // when
    dispatcher
        .dispatch(GameAction::BuyHouse { property_id: 3 })
        .await
        .unwrap();

    // then
    assert_eq!(remote.property(1, 3).unwrap().development, 2);
    let snapshot = dispatcher.view().snapshot().unwrap();
    assert_eq!(snapshot.owner_of(3).unwrap().current_rent, 60);
}

#[tokio::test(start_paused = true)]
async fn dispatch__roll_onto_chance_holds_card_until_resolved() {
    // given
    let remote = ongoing_game(ALICE).with_player(1, player_record(ALICE, 4));
    let (remote, mut dispatcher) = loaded(remote).await;

    // when
    dispatcher
        .dispatch(GameAction::RollAndMove { steps: 3 })
        .await
        .unwrap();

    // then
    assert_eq!(remote.player(1, ALICE).unwrap().position, 7);
    let card = dispatcher.state().pending_card.unwrap();
    assert_eq!(card.deck, CardDeck::Chance);
    assert_eq!(dispatcher.state().modal, Some(Modal::Card(card)));

    // and the turn cannot end while the card is open
    let blocked = dispatcher.dispatch(GameAction::FinishTurn).await;
    assert!(matches!(
        blocked,
        Err(Error::Guard(GuardError::CardPending))
    ));
    assert_eq!(remote.calls("finish_turn"), 0);

    dispatcher.dispatch(GameAction::ResolveCard).await.unwrap();
    assert_eq!(remote.calls("process_card"), 1);
    assert!(dispatcher.state().pending_card.is_none());
    assert!(dispatcher.state().modal.is_none());
}

#[tokio::test(start_paused = true)]
async fn dispatch__roll_out_of_turn_is_rejected() {
    // given
    let (remote, mut dispatcher) = loaded(ongoing_game(BOB)).await;

    // when
    let result = dispatcher
        .dispatch(GameAction::RollAndMove { steps: 7 })
        .await;

    // then
    assert!(matches!(
        result,
        Err(Error::Guard(GuardError::NotYourTurn))
    ));
    assert_eq!(remote.calls("move_player"), 0);
}

#[tokio::test(start_paused = true)]
async fn dispatch__failed_write_keeps_snapshot_and_reports_error() {
    // given
    let (remote, mut dispatcher) = loaded(ongoing_game(ALICE)).await;
    let before = dispatcher.view().snapshot();
    remote.fail_writes("out of gas");

    // when
    let result = dispatcher
        .dispatch(GameAction::BuyProperty { property_id: 1 })
        .await;

    // then
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
    assert!(err.is_retryable());
    let state = dispatcher.state();
    assert!(!state.loading);
    assert!(state.error.as_deref().unwrap().contains("out of gas"));
    assert_eq!(dispatcher.view().snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn dispatch__finish_turn_passes_to_next_player() {
    // given
    let (_remote, mut dispatcher) = loaded(ongoing_game(ALICE)).await;

    // when
    dispatcher.dispatch(GameAction::FinishTurn).await.unwrap();

    // then
    let snapshot = dispatcher.view().snapshot().unwrap();
    assert_eq!(snapshot.next_player().unwrap().address, Address::new(BOB));
}

#[tokio::test(start_paused = true)]
async fn dispatch__start_game_waits_for_ongoing_status() {
    // given
    let remote = FakeRemote::new()
        .with_game(game_record(1, &[ALICE, BOB]))
        .with_player(1, player_record(ALICE, 0))
        .with_player(1, player_record(BOB, 0));
    let (remote, mut dispatcher) = loaded(remote).await;

    // when
    dispatcher.dispatch(GameAction::StartGame).await.unwrap();

    // then
    assert_eq!(remote.calls("start_game"), 1);
    let snapshot = dispatcher.view().snapshot().unwrap();
    assert_eq!(snapshot.game.status, GameStatus::Ongoing);
    assert_eq!(snapshot.next_player().unwrap().address, Address::new(ALICE));
}

#[tokio::test(start_paused = true)]
async fn dispatch__start_game_requires_creator() {
    // given
    let remote = FakeRemote::new()
        .with_game(game_record(1, &[BOB, ALICE]))
        .with_player(1, player_record(ALICE, 0))
        .with_player(1, player_record(BOB, 0));
    let (remote, mut dispatcher) = loaded(remote).await;

    // when
    let result = dispatcher.dispatch(GameAction::StartGame).await;

    // then
    assert!(matches!(result, Err(Error::Guard(GuardError::NotCreator))));
    assert_eq!(remote.calls("start_game"), 0);
}

#[tokio::test(start_paused = true)]
async fn dispatch__abandoned_submission_blocks_until_retry() {
    // given: the start is written but the index keeps reporting pending
    let remote = FakeRemote::new()
        .with_game(game_record(1, &[ALICE, BOB]))
        .with_player(1, player_record(ALICE, 0))
        .with_player(1, player_record(BOB, 0));
    let (remote, mut dispatcher) = loaded(remote).await;
    remote.script_game_reads(1, (0..3).map(|_| Ok(game_record(1, &[ALICE, BOB]))).collect());

    // when: the caller gives up while the status poll is sleeping
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        dispatcher.dispatch(GameAction::StartGame),
    )
    .await;

    // then
    assert!(abandoned.is_err());
    assert_eq!(remote.calls("start_game"), 1);
    assert!(dispatcher.state().loading);
    assert_eq!(
        dispatcher.check(&GameAction::EndGame),
        Err(GuardError::Busy)
    );
    let blocked = dispatcher.dispatch(GameAction::EndGame).await;
    assert!(matches!(blocked, Err(Error::Guard(GuardError::Busy))));
    assert_eq!(remote.calls("end_game"), 0);

    // and a refresh releases it
    dispatcher.retry().await.unwrap();
    assert!(!dispatcher.state().loading);
    assert_ne!(
        dispatcher.check(&GameAction::EndGame),
        Err(GuardError::Busy)
    );
}
