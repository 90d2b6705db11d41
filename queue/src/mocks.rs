//! Mock operations for testing.

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

/// A shared execution-order log.
pub type Log = Arc<Mutex<Vec<&'static str>>>;

/// Create an empty execution-order log.
pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// An operation that sleeps for `delay`, records `tag`, and settles with
/// `output`.
pub fn operation<T>(
    log: Log,
    tag: &'static str,
    delay: Duration,
    output: T,
) -> impl Future<Output = T> + Send + 'static
where
    T: Send + 'static,
{
    async move {
        tokio::time::sleep(delay).await;
        log.lock().unwrap().push(tag);
        output
    }
}
