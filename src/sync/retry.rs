use std::time::Duration;

/// Bounded retry schedule for uploads and confirmations.
///
/// The wait after failed attempt `k` (0-based) is `delays[k]`, clamped to the
/// last entry. Nothing is waited after the final attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>, max_attempts: u32) -> Self {
        Self {
            delays,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the attempt following failed attempt `attempt`, or `None`
    /// when the budget is spent
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }

        let idx = (attempt as usize).min(self.delays.len().saturating_sub(1));
        Some(self.delays.get(idx).copied().unwrap_or_default())
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, waiting 1s, 2s (and 5s when more attempts are configured)
    fn default() -> Self {
        Self::new(
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
            ],
            3,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_after(0), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(2), None);
    }

    #[test]
    fn longer_budgets_clamp_to_last_delay() {
        let policy = RetryPolicy::new(
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(5)],
            6,
        );
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_after(4), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_after(5), None);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(Vec::new(), 0);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_after(0), None);
    }
}
