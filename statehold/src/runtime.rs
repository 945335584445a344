use std::{pin::Pin, time::Duration};

use futures::Future;

#[cfg(feature = "threadpool")]
pub mod threadpool;
#[cfg(feature = "tokio")]
pub mod tokio;

pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The executor mailboxes and background tickers run on, and the clock the
/// drains pause with.
pub trait RuntimeHandle: Clone + Send + Sync + 'static {
    /// Run `f` to completion in the background
    fn spawn(&self, f: BoxedTask);

    fn sleep(&self, duration: Duration) -> BoxedTask;
}
