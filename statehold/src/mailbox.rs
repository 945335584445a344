use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::channel::oneshot;
use statehold_core::EntityId;
use tracing::Instrument;

use crate::{
    Stopped,
    actor::{ActorDirectory, ActorHandle, ActorTask},
    runtime::RuntimeHandle,
    unbounded::{self, UnboundedSender},
};

/// A per-entity queue which runs submitted tasks one at a time, in order,
/// on a task spawned onto the runtime.
#[derive(Clone)]
pub struct Mailbox {
    id: EntityId,
    tx: UnboundedSender<ActorTask>,
    read_only: Arc<AtomicBool>,
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("id", &self.id)
            .field("read_only", &self.is_read_only())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Mailbox {
    pub fn spawn<R: RuntimeHandle>(id: EntityId, runtime: &R) -> Self {
        let (tx, rx) = unbounded::channel::<ActorTask>();
        let span = tracing::debug_span!("mailbox", %id);
        runtime.spawn(Box::pin(
            async move {
                while let Ok(task) = rx.recv().await {
                    if std::panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::error!("task panicked on entity mailbox");
                    }
                }
                tracing::trace!("mailbox closed, exiting");
            }
            .instrument(span),
        ));
        Mailbox {
            id,
            tx,
            read_only: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Run `f` on this mailbox and return its result
    pub fn call<F, R>(&self, f: F) -> impl Future<Output = Result<R, Stopped>> + Send + 'static
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task: ActorTask = Box::new(move || {
            let _ = tx.send(f());
        });
        let enqueued = self.tx.unbounded_send(task).is_ok();
        async move {
            if !enqueued {
                return Err(Stopped);
            }
            rx.await.map_err(|_| Stopped)
        }
    }

    /// Stop accepting tasks. Tasks already queued still run.
    pub fn stop(&self) {
        self.tx.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ActorHandle for Mailbox {
    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    fn submit(
        &self,
        task: ActorTask,
    ) -> impl Future<Output = Result<(), Stopped>> + Send + 'static {
        self.call(task)
    }
}

/// An [`ActorDirectory`] of [`Mailbox`]es kept in a shared map.
#[derive(Clone, Default)]
pub struct MailboxDirectory {
    mailboxes: Arc<Mutex<HashMap<EntityId, Mailbox>>>,
}

impl MailboxDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a mailbox for `id`, stopping any mailbox it replaces
    pub fn spawn<R: RuntimeHandle>(&self, id: EntityId, runtime: &R) -> Mailbox {
        let mailbox = Mailbox::spawn(id, runtime);
        if let Some(previous) = self.insert(mailbox.clone()) {
            tracing::debug!(%id, "replacing existing mailbox");
            previous.stop();
        }
        mailbox
    }

    pub fn insert(&self, mailbox: Mailbox) -> Option<Mailbox> {
        self.mailboxes
            .lock()
            .unwrap()
            .insert(mailbox.id(), mailbox)
    }

    /// Remove and stop the mailbox for `id`
    pub fn remove(&self, id: EntityId) -> Option<Mailbox> {
        let removed = self.mailboxes.lock().unwrap().remove(&id);
        if let Some(mailbox) = &removed {
            mailbox.stop();
        }
        removed
    }

    pub fn get(&self, id: EntityId) -> Option<Mailbox> {
        self.mailboxes.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.mailboxes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActorDirectory for MailboxDirectory {
    type Handle = Mailbox;

    /// Stopped mailboxes are still found until removed; the shutdown drain
    /// runs after every mailbox has stopped.
    fn lookup(&self, id: EntityId) -> Option<Mailbox> {
        self.get(id)
    }
}
