/*!
Small async helpers shared by integration tests
*/

use std::future::Future;
use std::time::Duration;

/// Init logging for tests (`RUST_LOG` controls verbosity). Safe to call
/// from every test.
pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Poll `check` every 20 ms until it returns true or `timeout_ms` elapses.
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    log::warn!("⏰ Condition not met after {} ms", timeout_ms);
    false
}
