//! Bounded polling shared by every vendor integration.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Poll cadence and wall-clock bound for one operation.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay between polls
    pub interval: Duration,
    /// Overall wall-clock limit, independent of poll count
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Poll `poll` until it yields a value or the wall-clock timeout elapses.
///
/// The closure returns `Ok(Some(v))` once the operation is terminal,
/// `Ok(None)` while it is still running, and `Err` for hard failures which
/// abort the loop immediately. After the deadline one last grace probe runs
/// before giving up, so an operation that finished during the final sleep
/// is still picked up.
pub async fn poll_until_terminal<T, F, Fut>(config: &PollConfig, mut poll: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ProviderResult<Option<T>>>,
{
    let started = Instant::now();

    loop {
        if let Some(value) = poll().await? {
            return Ok(value);
        }
        if started.elapsed() >= config.timeout {
            break;
        }
        tokio::time::sleep(config.interval).await;
    }

    // grace probe
    debug!("Poll deadline reached, running grace probe");
    if let Some(value) = poll().await? {
        return Ok(value);
    }

    Err(ProviderError::PollTimeout {
        waited_secs: started.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_returns_first_terminal_value() {
        let calls = AtomicU32::new(0);
        let result = poll_until_terminal(&quick(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(if n >= 2 { Some("done") } else { None }) }
        })
        .await
        .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_with_elapsed() {
        let config = PollConfig::new(Duration::from_millis(1), Duration::from_millis(10));
        let err = poll_until_terminal::<(), _, _>(&config, || async { Ok(None) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::PollTimeout { .. }));
    }

    #[tokio::test]
    async fn test_grace_probe_after_deadline() {
        // Zero budget: the loop breaks after the first pending poll, and
        // only the grace probe sees the terminal value.
        let calls = AtomicU32::new(0);
        let config = PollConfig::new(Duration::from_millis(5), Duration::ZERO);
        let result = poll_until_terminal(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(if n >= 1 { Some(42) } else { None }) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hard_failure_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let err = poll_until_terminal::<(), _, _>(&quick(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::RequestFailed {
                    status: 500,
                    body: "boom".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
