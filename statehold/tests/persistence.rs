use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use statehold::{
    DrainConfig, EntityId, EntityState, Persistence,
    store::{InMemoryStore, testing::RecordingStore},
};

mod common;
use common::{
    PlayerState, RoomState, init_logging, modify_on, setup, spawn_dirty_player, stored_player,
};

/// Tuple keys have no JSON representation, so any non-empty grid fails to
/// encode
#[derive(Debug, Default, Serialize, Deserialize)]
struct GridState {
    cells: HashMap<(u32, u32), u32>,
}

impl EntityState for GridState {}

#[tokio::test]
async fn each_type_gets_one_cache_registered_once() {
    init_logging();
    let (persistence, _store) = setup();

    let first = persistence.cache::<PlayerState>();
    let second = persistence.cache::<PlayerState>();
    let rooms = persistence.cache::<RoomState>();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(rooms.collection(), "rooms");
    assert_eq!(first.collection(), "PlayerState");
    assert_eq!(persistence.state_store().timer_hook_count(), 2);
    assert_eq!(persistence.state_store().shutdown_hook_count(), 2);
}

#[tokio::test]
async fn one_tick_flushes_every_type() {
    init_logging();
    let (persistence, store) = setup();

    let (_player, _player_mailbox) = spawn_dirty_player(&persistence, 1, 12).await;

    let room_id = EntityId::new(2);
    let room_mailbox = persistence.directory().spawn(room_id, persistence.runtime());
    let mut room = persistence.component::<RoomState>(room_id);
    room.activate().await.unwrap();
    modify_on(&room_mailbox, room.state().unwrap(), |r| r.occupants.push(1)).await;

    let summary = persistence.tick().await;

    assert!(summary.error.is_none());
    let collections: Vec<_> = summary.reports.iter().map(|r| r.collection).collect();
    assert_eq!(collections, vec!["PlayerState", "rooms"]);
    assert_eq!(stored_player(&store, 1).unwrap().gold, 12);
    let stored_room: RoomState = store
        .inner()
        .get_decoded("rooms", room_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored_room.occupants, vec![1]);
}

#[tokio::test]
async fn ticker_flushes_until_shutdown() {
    init_logging();
    let (persistence, store) = setup();
    persistence.spawn_ticker(Duration::from_millis(10));

    let (player, mailbox) = spawn_dirty_player(&persistence, 1, 3).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while stored_player(&store, 1).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ticker never flushed the player");

    persistence.shutdown().await;
    // Let a tick that was already under way finish
    tokio::time::sleep(Duration::from_millis(30)).await;
    let writes_at_shutdown = store.bulk_writes().len();

    // Changes made after shutdown are not picked up by the stopped ticker
    modify_on(&mailbox, player.state().unwrap(), |p| p.gold = 4).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.bulk_writes().len(), writes_at_shutdown);
    assert_eq!(stored_player(&store, 1).unwrap().gold, 3);
}

#[tokio::test]
async fn unencodable_entity_does_not_hold_back_other_types() {
    init_logging();
    let (persistence, store) = setup();

    // Registered first so its drain runs first on every tick
    let grid_id = EntityId::new(100);
    let grid_mailbox = persistence.directory().spawn(grid_id, persistence.runtime());
    let mut grid = persistence.component::<GridState>(grid_id);
    grid.activate().await.unwrap();
    modify_on(&grid_mailbox, grid.state().unwrap(), |g| {
        g.cells.insert((1, 1), 7);
    })
    .await;

    // A healthy entity of the same type is still written
    let (healthy, healthy_mailbox) = {
        let id = EntityId::new(101);
        let mailbox = persistence.directory().spawn(id, persistence.runtime());
        let mut healthy = persistence.component::<GridState>(id);
        healthy.activate().await.unwrap();
        modify_on(&mailbox, healthy.state().unwrap(), |g| g.cells.clear()).await;
        (healthy, mailbox)
    };

    let (_player, _mailbox) = spawn_dirty_player(&persistence, 1, 21).await;

    let summary = persistence.tick().await;
    assert!(summary.error.is_none());
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].unencodable, vec![grid_id]);
    assert_eq!(summary.reports[0].written, 1);
    assert_eq!(summary.reports[1].written, 1);
    assert_eq!(stored_player(&store, 1).unwrap().gold, 21);
    assert!(store.inner().get(GridState::collection(), EntityId::new(101)).is_some());

    grid_mailbox.call(|| ()).await.unwrap();
    healthy_mailbox.call(|| ()).await.unwrap();
    assert!(!grid.is_safe_to_reclaim());
    assert!(healthy.is_safe_to_reclaim());

    // Shutdown reports the entity instead of failing the whole type
    let summary = persistence.shutdown().await;
    assert_eq!(summary.failed_types, 0);
    let grid_report = summary
        .reports
        .iter()
        .find(|r| r.collection == GridState::collection())
        .unwrap();
    assert_eq!(grid_report.unencodable, vec![grid_id]);
    assert!(store.inner().get(GridState::collection(), grid_id).is_none());
    assert!(!grid.is_safe_to_reclaim());
}

#[tokio::test]
async fn tick_stops_when_a_shared_accepting_flag_is_cleared() {
    init_logging();
    let accepting = Arc::new(AtomicBool::new(true));
    let store = RecordingStore::new(InMemoryStore::new());
    let persistence = Persistence::build_tokio()
        .with_store(store.clone())
        .with_config(DrainConfig::default().without_delays())
        .with_accepting_flag(accepting.clone())
        .build();

    let player_id = EntityId::new(1);
    let player_mailbox = persistence.directory().spawn(player_id, persistence.runtime());
    let mut player = persistence.component::<PlayerState>(player_id);
    player.activate().await.unwrap();
    modify_on(&player_mailbox, player.state().unwrap(), |p| p.gold = 1).await;

    let room_id = EntityId::new(2);
    let room_mailbox = persistence.directory().spawn(room_id, persistence.runtime());
    let mut room = persistence.component::<RoomState>(room_id);
    room.activate().await.unwrap();
    modify_on(&room_mailbox, room.state().unwrap(), |r| r.occupants.push(1)).await;

    // The process stops accepting work while the first type is being written
    store.on_bulk_write({
        let accepting = accepting.clone();
        move |_batch| accepting.store(false, Ordering::SeqCst)
    });

    let summary = persistence.tick().await;

    assert!(summary.interrupted);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].collection, "PlayerState");
    let collections: Vec<_> = store.bulk_writes().into_iter().map(|w| w.collection).collect();
    assert_eq!(collections, vec!["PlayerState".to_string()]);
    assert!(!persistence.state_store().is_accepting_work());
}

#[tokio::test]
async fn registering_a_cache_twice_does_not_repeat_its_drains() {
    init_logging();
    let (persistence, store) = setup();

    let (_player, mailbox) = spawn_dirty_player(&persistence, 1, 9).await;
    let cache = persistence.cache::<PlayerState>();
    assert!(!cache.register(persistence.state_store()));
    assert_eq!(persistence.state_store().shutdown_hook_count(), 1);
    assert_eq!(persistence.state_store().timer_hook_count(), 1);

    mailbox.stop();
    let summary = persistence.shutdown().await;
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(store.bulk_writes().len(), 1);
}
