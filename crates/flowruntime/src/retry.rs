use flowcore::{NodeError, RetryPolicy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a failed attempt may be retried.
#[derive(Clone)]
pub struct RetryPredicate(Arc<dyn Fn(&NodeError) -> bool + Send + Sync>);

impl RetryPredicate {
    pub fn new(f: impl Fn(&NodeError) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn is_retryable(&self, error: &NodeError) -> bool {
        // Cancellation and unresolved input never improve with time.
        if matches!(error, NodeError::Cancelled | NodeError::Unresolved(_)) {
            return false;
        }
        (self.0)(error)
    }
}

impl Default for RetryPredicate {
    fn default() -> Self {
        Self::new(NodeError::is_retryable)
    }
}

impl fmt::Debug for RetryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryPredicate")
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then run attempt number `attempt`
    Retry { attempt: u32, delay: Duration },
    /// Retryable, but out of attempts
    Exhausted,
    /// Not retryable at all
    Terminal,
}

/// Attempt counter and next backoff delay for one node.
#[derive(Debug, Clone)]
pub struct RetryState {
    max_attempts: u32,
    max_delay_ms: u64,
    multiplier: f64,
    attempt: u32,
    next_delay_ms: u64,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts.max(1),
            max_delay_ms: policy.max_delay_ms,
            multiplier: if policy.backoff_multiplier.is_finite()
                && policy.backoff_multiplier >= 1.0
            {
                policy.backoff_multiplier
            } else {
                1.0
            },
            attempt: 0,
            next_delay_ms: policy.base_delay_ms.min(policy.max_delay_ms),
        }
    }

    /// Start the next attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Record a failure of the current attempt.
    pub fn on_failure(&mut self, retryable: bool) -> RetryDecision {
        if !retryable {
            return RetryDecision::Terminal;
        }
        if self.attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        let delay = Duration::from_millis(self.next_delay_ms);
        let grown = (self.next_delay_ms as f64 * self.multiplier).round();
        self.next_delay_ms = if grown >= self.max_delay_ms as f64 {
            self.max_delay_ms
        } else {
            grown as u64
        };
        RetryDecision::Retry {
            attempt: self.attempt + 1,
            delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, base: u64, max: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: base,
            max_delay_ms: max,
            backoff_multiplier: 2.0,
        }
    }

    fn delays(state: &mut RetryState) -> Vec<u64> {
        let mut out = Vec::new();
        loop {
            state.begin_attempt();
            match state.on_failure(true) {
                RetryDecision::Retry { delay, .. } => out.push(delay.as_millis() as u64),
                RetryDecision::Exhausted => return out,
                RetryDecision::Terminal => unreachable!(),
            }
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let mut state = RetryState::new(&policy(4, 100, 10_000));
        assert_eq!(delays(&mut state), vec![100, 200, 400]);
        assert_eq!(state.attempts(), 4);
    }

    #[test]
    fn backoff_is_capped() {
        let mut state = RetryState::new(&policy(6, 100, 250));
        assert_eq!(delays(&mut state), vec![100, 200, 250, 250, 250]);
    }

    #[test]
    fn terminal_failures_skip_remaining_attempts() {
        let mut state = RetryState::new(&policy(5, 100, 1_000));
        assert_eq!(state.begin_attempt(), 1);
        assert_eq!(state.on_failure(false), RetryDecision::Terminal);
        assert_eq!(state.attempts(), 1);
    }

    #[test]
    fn retry_reports_next_attempt_number() {
        let mut state = RetryState::new(&policy(3, 10, 1_000));
        state.begin_attempt();
        assert_eq!(
            state.on_failure(true),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_millis(10)
            }
        );
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut state = RetryState::new(&policy(0, 10, 1_000));
        state.begin_attempt();
        assert_eq!(state.on_failure(true), RetryDecision::Exhausted);
    }

    #[test]
    fn predicate_never_retries_cancellation() {
        let always = RetryPredicate::new(|_| true);
        assert!(always.is_retryable(&NodeError::ExecutionFailed("x".into())));
        assert!(!always.is_retryable(&NodeError::Cancelled));

        let default = RetryPredicate::default();
        assert!(default.is_retryable(&NodeError::Transient("reset".into())));
        assert!(!default.is_retryable(&NodeError::Configuration("bad".into())));
    }
}
