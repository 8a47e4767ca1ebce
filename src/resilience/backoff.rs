//! Backoff schedules.

use std::time::Duration;

/// Delay before retry number `attempt` of a REST request.
///
/// Grows linearly: `attempt * step`. Attempt 0 means no delay.
pub fn linear_backoff(attempt: u32, step: Duration) -> Duration {
    step.saturating_mul(attempt)
}

/// Delay before reconnect attempt number `attempt` of a persistent socket.
pub fn reconnect_backoff(attempt: u32) -> Duration {
    let secs = match attempt {
        0 => 0,
        1 => 1,
        2 => 2,
        3 => 4,
        4 => 10,
        _ => 15,
    };
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff() {
        let step = Duration::from_secs(2);
        assert_eq!(linear_backoff(0, step), Duration::ZERO);
        assert_eq!(linear_backoff(1, step), Duration::from_secs(2));
        assert_eq!(linear_backoff(3, step), Duration::from_secs(6));
    }

    #[test]
    fn test_reconnect_schedule_caps_at_fifteen_seconds() {
        let delays: Vec<u64> = (1..=8).map(|a| reconnect_backoff(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 10, 15, 15, 15, 15]);
        assert_eq!(reconnect_backoff(u32::MAX), Duration::from_secs(15));
    }
}
