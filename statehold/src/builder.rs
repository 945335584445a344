use std::sync::{Arc, atomic::AtomicBool};

use statehold_core::DrainConfig;

use crate::{
    Persistence,
    actor::ActorDirectory,
    mailbox::MailboxDirectory,
    runtime::RuntimeHandle,
    store::{DocumentStore, InMemoryStore},
};

pub struct PersistenceBuilder<S, D, R> {
    pub(crate) store: S,
    pub(crate) directory: D,
    pub(crate) runtime: R,
    pub(crate) config: DrainConfig,
    pub(crate) accepting: Option<Arc<AtomicBool>>,
}

impl<S, D, R> PersistenceBuilder<S, D, R> {
    pub fn with_store<S2: DocumentStore>(self, store: S2) -> PersistenceBuilder<S2, D, R> {
        PersistenceBuilder {
            store,
            directory: self.directory,
            runtime: self.runtime,
            config: self.config,
            accepting: self.accepting,
        }
    }

    pub fn with_directory<D2: ActorDirectory>(self, directory: D2) -> PersistenceBuilder<S, D2, R> {
        PersistenceBuilder {
            directory,
            store: self.store,
            runtime: self.runtime,
            config: self.config,
            accepting: self.accepting,
        }
    }

    pub fn with_runtime<R2: RuntimeHandle>(self, runtime: R2) -> PersistenceBuilder<S, D, R2> {
        PersistenceBuilder {
            runtime,
            store: self.store,
            directory: self.directory,
            config: self.config,
            accepting: self.accepting,
        }
    }

    pub fn with_config(mut self, config: DrainConfig) -> Self {
        self.config = config;
        self
    }

    /// Share the process-wide "still accepting work" flag ticks stop on
    pub fn with_accepting_flag(mut self, accepting: Arc<AtomicBool>) -> Self {
        self.accepting = Some(accepting);
        self
    }
}

impl<R> PersistenceBuilder<InMemoryStore, MailboxDirectory, R> {
    pub fn new(runtime: R) -> PersistenceBuilder<InMemoryStore, MailboxDirectory, R> {
        PersistenceBuilder {
            store: InMemoryStore::new(),
            directory: MailboxDirectory::new(),
            runtime,
            config: DrainConfig::default(),
            accepting: None,
        }
    }
}

impl<S: DocumentStore, D: ActorDirectory, R: RuntimeHandle> PersistenceBuilder<S, D, R> {
    pub fn build(self) -> Persistence<S, D, R> {
        Persistence::from_builder(self)
    }
}
