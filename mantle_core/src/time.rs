//! Functions to work with time.

use std::time::{Duration, Instant};

/// Return the current `Instant`. Goes through tokio's clock so tests can
/// pause and advance time.
pub fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Return the amount of time elapsed since `time`.
pub fn clock_elapsed(time: Instant) -> Duration {
    clock_now() - time
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clock_advances_with_tokio_time() {
        tokio::time::pause();
        let start = clock_now();
        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(clock_elapsed(start), Duration::from_secs(7));
    }
}
