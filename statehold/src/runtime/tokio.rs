use std::time::Duration;

use crate::runtime::{BoxedTask, RuntimeHandle};

#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
impl RuntimeHandle for tokio::runtime::Handle {
    fn spawn(&self, f: BoxedTask) {
        // Detached; the task reports its own outcome through channels
        drop(tokio::runtime::Handle::spawn(self, f));
    }

    fn sleep(&self, duration: Duration) -> BoxedTask {
        // The timer binds to whichever runtime is entered when it is created
        let _guard = self.enter();
        Box::pin(tokio::time::sleep(duration))
    }
}
