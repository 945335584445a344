//! Test support for [`DocumentStore`]s.
//!
//! [`RecordingStore`] wraps a store, counts every call, records each bulk
//! write and can be scripted to reject batches or fail loads.
//! [`run_store_adapter_tests`] checks the behaviour every store must share.

use std::sync::{Arc, Mutex};

use statehold_core::{BulkWriteResult, DocumentKey, EntityId, UpdateDescriptor, WriteOrdering};

use crate::{StoreError, store::DocumentStore};

type BatchPredicate = Arc<dyn Fn(&[UpdateDescriptor]) -> bool + Send + Sync>;
type BatchObserver = Arc<dyn Fn(&[UpdateDescriptor]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBulkWrite {
    pub collection: String,
    pub ids: Vec<EntityId>,
    pub ordering: WriteOrdering,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub loads: Vec<DocumentKey>,
    pub saves: Vec<DocumentKey>,
    pub bulk_writes: Vec<RecordedBulkWrite>,
}

#[derive(Default)]
struct Script {
    reject_when: Option<BatchPredicate>,
    observe: Option<BatchObserver>,
    fail_loads: bool,
}

#[derive(Clone)]
pub struct RecordingStore<S> {
    inner: S,
    recording: Arc<Mutex<Recording>>,
    script: Arc<Mutex<Script>>,
}

impl<S: DocumentStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        RecordingStore {
            inner,
            recording: Arc::new(Mutex::new(Recording::default())),
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn recording(&self) -> Recording {
        self.recording.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.recording.lock().unwrap().loads.len()
    }

    pub fn bulk_writes(&self) -> Vec<RecordedBulkWrite> {
        self.recording.lock().unwrap().bulk_writes.clone()
    }

    /// Answer bulk writes matching `predicate` with an unacknowledged result
    /// instead of passing them on
    pub fn reject_bulk_writes_when<F>(&self, predicate: F)
    where
        F: Fn(&[UpdateDescriptor]) -> bool + Send + Sync + 'static,
    {
        self.script.lock().unwrap().reject_when = Some(Arc::new(predicate));
    }

    /// Call `observer` with every batch before it is written
    pub fn on_bulk_write<F>(&self, observer: F)
    where
        F: Fn(&[UpdateDescriptor]) + Send + Sync + 'static,
    {
        self.script.lock().unwrap().observe = Some(Arc::new(observer));
    }

    pub fn fail_loads(&self, fail: bool) {
        self.script.lock().unwrap().fail_loads = fail;
    }
}

impl<S: DocumentStore> DocumentStore for RecordingStore<S> {
    fn load(
        &self,
        collection: &str,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send {
        self.recording
            .lock()
            .unwrap()
            .loads
            .push(DocumentKey::new(collection, id));
        let fail = self.script.lock().unwrap().fail_loads;
        let load = self.inner.load(collection, id);
        async move {
            if fail {
                return Err(StoreError::new("scripted load failure"));
            }
            load.await
        }
    }

    fn save(
        &self,
        collection: &str,
        id: EntityId,
        document: Vec<u8>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.recording
            .lock()
            .unwrap()
            .saves
            .push(DocumentKey::new(collection, id));
        self.inner.save(collection, id, document)
    }

    fn bulk_write(
        &self,
        collection: &str,
        updates: Vec<UpdateDescriptor>,
        ordering: WriteOrdering,
    ) -> impl Future<Output = Result<BulkWriteResult, StoreError>> + Send {
        let (reject_when, observe) = {
            let script = self.script.lock().unwrap();
            (script.reject_when.clone(), script.observe.clone())
        };
        if let Some(observe) = observe {
            observe(&updates);
        }
        let rejected = reject_when.is_some_and(|reject| reject(&updates));
        let ids = updates.iter().map(UpdateDescriptor::id).collect();
        let recording = self.recording.clone();
        let collection_name = collection.to_string();
        let write = (!rejected).then(|| self.inner.bulk_write(collection, updates, ordering));
        async move {
            let result = match write {
                Some(write) => write.await,
                None => Ok(BulkWriteResult::unacknowledged()),
            };
            recording.lock().unwrap().bulk_writes.push(RecordedBulkWrite {
                collection: collection_name,
                ids,
                ordering,
                acknowledged: matches!(result, Ok(BulkWriteResult { acknowledged: true, .. })),
            });
            result
        }
    }
}

/// Builds a fresh, empty store for [`run_store_adapter_tests`]
pub trait StoreTestFixture: Sized {
    type Store: DocumentStore;

    fn setup() -> impl Future<Output = Self>;

    fn store(&self) -> &Self::Store;
}

/// Run the checks every [`DocumentStore`] implementation has to pass.
///
/// Each check gets its own fixture.
pub async fn run_store_adapter_tests<F: StoreTestFixture>() {
    missing_document_loads_as_none::<F>().await;
    saved_document_loads_back::<F>().await;
    bulk_write_upserts_every_document::<F>().await;
    collections_are_isolated::<F>().await;
}

fn document(id: u64, value: u64) -> UpdateDescriptor {
    UpdateDescriptor::upsert("adapter_test", EntityId::new(id), &Value { value })
        .expect("test documents always encode")
}

#[derive(serde::Serialize)]
struct Value {
    value: u64,
}

async fn missing_document_loads_as_none<F: StoreTestFixture>() {
    let fixture = F::setup().await;
    let loaded = fixture
        .store()
        .load("adapter_test", EntityId::new(1))
        .await
        .expect("load failed");
    assert_eq!(loaded, None);
}

async fn saved_document_loads_back<F: StoreTestFixture>() {
    let fixture = F::setup().await;
    let id = EntityId::new(1);
    let doc = document(1, 7).document().to_vec();
    fixture
        .store()
        .save("adapter_test", id, doc.clone())
        .await
        .expect("save failed");
    let loaded = fixture.store().load("adapter_test", id).await.expect("load failed");
    assert_eq!(loaded, Some(doc));
}

async fn bulk_write_upserts_every_document<F: StoreTestFixture>() {
    let fixture = F::setup().await;
    let store = fixture.store();
    store
        .save("adapter_test", EntityId::new(2), document(2, 0).document().to_vec())
        .await
        .expect("save failed");

    let updates: Vec<_> = (1..=3).map(|id| document(id, id * 10)).collect();
    let expected: Vec<_> = updates.iter().map(|u| u.document().to_vec()).collect();
    let result = store
        .bulk_write("adapter_test", updates, WriteOrdering::Unordered)
        .await
        .expect("bulk write failed");
    assert!(result.acknowledged);
    assert_eq!(result.matched, 3);

    for (id, doc) in (1..=3).zip(expected) {
        let loaded = store
            .load("adapter_test", EntityId::new(id))
            .await
            .expect("load failed");
        assert_eq!(loaded, Some(doc), "document {id} was not upserted");
    }
}

async fn collections_are_isolated<F: StoreTestFixture>() {
    let fixture = F::setup().await;
    let id = EntityId::new(1);
    fixture
        .store()
        .save("adapter_test", id, document(1, 1).document().to_vec())
        .await
        .expect("save failed");
    let other = fixture.store().load("other", id).await.expect("load failed");
    assert_eq!(other, None);
}
