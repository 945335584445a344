use std::time::Duration;

use futures::executor::ThreadPool;

use crate::runtime::{BoxedTask, RuntimeHandle};

#[cfg_attr(docsrs, doc(cfg(feature = "threadpool")))]
impl RuntimeHandle for ThreadPool {
    fn spawn(&self, f: BoxedTask) {
        self.spawn_ok(f);
    }

    fn sleep(&self, duration: Duration) -> BoxedTask {
        // futures-timer drives its own timer thread so it works on any executor
        Box::pin(futures_timer::Delay::new(duration))
    }
}
