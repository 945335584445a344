use std::time::Duration;

use statehold::{EntityId, EntityState, PersistError, Phase, store::DocumentStore};

mod common;
use common::{
    PlayerState, init_logging, modify_on, settle, setup, spawn_dirty_player, stored_player,
};

async fn seed_player(store: &common::Store, id: u64, player: PlayerState) {
    let document = statehold::codec::encode_document(EntityId::new(id), &player).unwrap();
    store
        .inner()
        .save(PlayerState::collection(), EntityId::new(id), document)
        .await
        .unwrap();
}

#[tokio::test]
async fn activate_loads_once_and_indexes_the_state() {
    init_logging();
    let (persistence, store) = setup();
    seed_player(
        &store,
        1,
        PlayerState {
            gold: 42,
            name: "ada".to_string(),
        },
    )
    .await;

    let mut player = persistence.component::<PlayerState>(EntityId::new(1));
    assert_eq!(player.phase(), Phase::Inactive);
    player.activate().await.unwrap();
    player.activate().await.unwrap();

    assert_eq!(player.phase(), Phase::Active);
    assert_eq!(store.load_count(), 1);
    assert_eq!(player.read(|p| p.gold).unwrap(), 42);
    assert!(player.loaded_at().is_some());

    let cache = persistence.cache::<PlayerState>();
    assert_eq!(cache.len(), 1);
    assert!(cache.get(EntityId::new(1)).unwrap().same_state(player.state().unwrap()));
}

#[tokio::test]
async fn activate_starts_from_the_default_when_nothing_is_stored() {
    init_logging();
    let (persistence, _store) = setup();

    let mut player = persistence.component::<PlayerState>(EntityId::new(9));
    player.activate().await.unwrap();

    assert_eq!(player.read(PlayerState::clone).unwrap(), PlayerState::default());
    assert!(player.is_safe_to_reclaim());
}

#[tokio::test]
async fn activating_again_replaces_a_stale_entry() {
    init_logging();
    let (persistence, _store) = setup();
    let id = EntityId::new(1);

    let mut old = persistence.component::<PlayerState>(id);
    old.activate().await.unwrap();
    let mut new = persistence.component::<PlayerState>(id);
    new.activate().await.unwrap();

    let cache = persistence.cache::<PlayerState>();
    assert_eq!(cache.len(), 1);
    assert!(cache.get(id).unwrap().same_state(new.state().unwrap()));

    // The old component no longer owns the entry
    old.deactivate();
    assert!(cache.contains(id));
    new.deactivate();
    assert!(!cache.contains(id));
}

#[tokio::test]
async fn reload_throttled_skips_reads_inside_the_cold_window() {
    init_logging();
    let (persistence, store) = setup();

    let mut reader = persistence.component::<PlayerState>(EntityId::new(1));
    assert!(reader.reload_throttled().await.unwrap());
    assert!(!reader.reload_throttled().await.unwrap());
    assert_eq!(store.load_count(), 1);

    // Throttled reloads leave the phase and the cache alone
    assert_eq!(reader.phase(), Phase::Inactive);
    assert!(persistence.cache::<PlayerState>().is_empty());
}

#[tokio::test]
async fn reload_throttled_reads_again_once_the_window_passes() {
    init_logging();
    let (persistence, store) = setup();

    let mut reader = persistence.component::<PlayerState>(EntityId::new(1));
    let window = Duration::from_millis(20);
    assert!(reader.reload_throttled_within(window).await.unwrap());
    seed_player(
        &store,
        1,
        PlayerState {
            gold: 3,
            ..Default::default()
        },
    )
    .await;
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(reader.reload_throttled_within(window).await.unwrap());
    assert_eq!(store.load_count(), 2);
    assert_eq!(reader.read(|p| p.gold).unwrap(), 3);
}

#[tokio::test]
async fn read_fresh_picks_up_external_changes() {
    init_logging();
    let (persistence, store) = setup();
    let id = EntityId::new(1);

    let mut player = persistence.component::<PlayerState>(id);
    player.reload_throttled().await.unwrap();
    seed_player(
        &store,
        1,
        PlayerState {
            gold: 99,
            ..Default::default()
        },
    )
    .await;

    player.read_fresh().await.unwrap();

    assert_eq!(player.read(|p| p.gold).unwrap(), 99);
    assert!(player.is_active());
    assert!(persistence.cache::<PlayerState>().contains(id));
    assert_eq!(store.load_count(), 2);
}

#[tokio::test]
async fn write_now_saves_and_clears_the_dirty_flag() {
    init_logging();
    let (persistence, store) = setup();

    let (player, mailbox) = spawn_dirty_player(&persistence, 1, 8).await;
    assert!(!player.is_safe_to_reclaim());

    player.write_now().await.unwrap();

    assert!(player.is_safe_to_reclaim());
    assert_eq!(store.recording().saves.len(), 1);
    assert_eq!(stored_player(&store, 1).unwrap().gold, 8);

    // Nothing left for the next tick
    let summary = persistence.tick().await;
    assert_eq!(summary.reports[0].clean, 1);
    assert!(store.bulk_writes().is_empty());
    settle(&mailbox).await;
}

#[tokio::test]
async fn unloaded_component_refuses_reads_and_writes() {
    init_logging();
    let (persistence, _store) = setup();
    let player = persistence.component::<PlayerState>(EntityId::new(4));

    assert!(matches!(
        player.write_now().await,
        Err(PersistError::NotLoaded(id)) if id == EntityId::new(4)
    ));
    assert!(matches!(player.modify(|p| p.gold = 1), Err(PersistError::NotLoaded(_))));
    assert!(player.is_safe_to_reclaim());
}

#[tokio::test]
async fn deactivate_removes_the_entry_without_writing() {
    init_logging();
    let (persistence, store) = setup();
    let id = EntityId::new(1);

    let (mut player, mailbox) = spawn_dirty_player(&persistence, 1, 5).await;
    modify_on(&mailbox, player.state().unwrap(), |p| p.gold += 1).await;
    player.deactivate();

    assert_eq!(player.phase(), Phase::Deactivated);
    let cache = persistence.cache::<PlayerState>();
    assert!(!cache.contains(id));
    assert!(store.recording().saves.is_empty());
    assert!(store.bulk_writes().is_empty());

    // An untracked entity is no longer drained
    persistence.tick().await;
    assert!(store.bulk_writes().is_empty());

    player.activate().await.unwrap();
    assert!(player.is_active());
    assert!(cache.contains(id));
}

#[tokio::test]
async fn failed_load_leaves_the_component_inactive() {
    init_logging();
    let (persistence, store) = setup();
    store.fail_loads(true);

    let mut player = persistence.component::<PlayerState>(EntityId::new(1));
    let result = player.activate().await;

    assert!(matches!(result, Err(PersistError::Store(_))));
    assert_eq!(player.phase(), Phase::Inactive);
    assert!(persistence.cache::<PlayerState>().is_empty());

    store.fail_loads(false);
    player.activate().await.unwrap();
    assert!(player.is_active());
}
