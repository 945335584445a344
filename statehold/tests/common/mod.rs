#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use statehold::{
    DrainConfig, EntityId, EntityState, Mailbox, MailboxDirectory, Persistence, StateComponent,
    StateRef,
    store::{InMemoryStore, testing::RecordingStore},
};

pub type Store = RecordingStore<InMemoryStore>;
pub type TestPersistence = Persistence<Store, MailboxDirectory, tokio::runtime::Handle>;
pub type Player = StateComponent<PlayerState, Store, MailboxDirectory, tokio::runtime::Handle>;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub gold: u64,
    pub name: String,
}

impl EntityState for PlayerState {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub occupants: Vec<u64>,
}

impl EntityState for RoomState {
    fn collection() -> &'static str {
        "rooms"
    }
}

pub fn setup() -> (TestPersistence, Store) {
    setup_with(DrainConfig::default().without_delays())
}

pub fn setup_with(config: DrainConfig) -> (TestPersistence, Store) {
    let store = RecordingStore::new(InMemoryStore::new());
    let persistence = Persistence::build_tokio()
        .with_store(store.clone())
        .with_config(config)
        .build();
    (persistence, store)
}

/// Spawn a mailbox for `id`, activate its player state and set its gold on
/// the mailbox
pub async fn spawn_dirty_player(
    persistence: &TestPersistence,
    id: u64,
    gold: u64,
) -> (Player, Mailbox) {
    let id = EntityId::new(id);
    let mailbox = persistence.directory().spawn(id, persistence.runtime());
    let mut player = persistence.component::<PlayerState>(id);
    player.activate().await.unwrap();
    let state = player.state().cloned().unwrap();
    mailbox
        .call(move || state.modify(|p| p.gold = gold))
        .await
        .unwrap();
    (player, mailbox)
}

pub async fn modify_on<T, F>(mailbox: &Mailbox, state: &StateRef<T>, f: F)
where
    T: EntityState,
    F: FnOnce(&mut T) + Send + 'static,
{
    let state = state.clone();
    mailbox.call(move || state.modify(f)).await.unwrap();
}

/// Wait until everything already queued on `mailbox` has run
pub async fn settle(mailbox: &Mailbox) {
    let _ = mailbox.call(|| ()).await;
}

pub fn stored_player(store: &Store, id: u64) -> Option<PlayerState> {
    store
        .inner()
        .get_decoded(PlayerState::collection(), EntityId::new(id))
        .map(|decoded| decoded.unwrap())
}
