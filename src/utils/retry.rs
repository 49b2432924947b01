//! Backoff builders for the retry paths.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for replaying a gap through the ingestion client.
///
/// - Min delay: 200ms
/// - Max delay: 10s
/// - Max attempts: `max_attempts`
/// - Jitter enabled
pub fn replay_backoff(max_attempts: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(max_attempts)
        .with_jitter()
}

/// Backoff for reaching the operational database at startup.
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use backon::BackoffBuilder;

    use super::*;

    #[test]
    fn test_replay_backoff_honours_attempts() {
        assert_eq!(replay_backoff(3).build().count(), 3);
        assert_eq!(replay_backoff(0).build().count(), 0);
    }

    #[test]
    fn test_connection_backoff_is_capped() {
        // Jitter adds at most one extra delay on top of the cap.
        assert!(connection_backoff()
            .build()
            .all(|d| d <= Duration::from_secs(10)));
    }
}
