//! Bounded-retry utilities for transient persistence failures.
//!
//! The first-access creation race (two writers inserting the same
//! (enrollment, lesson) record) is resolved optimistically: the
//! storage-layer uniqueness constraint rejects the losing insert and
//! the loser re-reads after a short, linearly growing delay. The
//! budget is deliberately small - contention on a single lesson row is
//! rare and short-lived.

use std::time::Duration;

use rand::Rng;

/// Retry schedule for the race-tolerant get-or-create.
#[derive(Debug, Clone)]
pub struct UpsertRetry {
    /// Total attempts, including the first (1 = no retries).
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
    /// Jitter factor (0.0-1.0) added on top of the linear delay to
    /// spread out herds of duplicate deliveries.
    pub jitter: f64,
}

impl Default for UpsertRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            jitter: 0.0,
        }
    }
}

impl UpsertRetry {
    /// Schedule without sleeps, for tests.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before re-reading after losing attempt `attempt`
    /// (1-indexed): 50ms, 100ms, ... for the default schedule.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let linear = self.base_delay.as_secs_f64() * f64::from(attempt);

        let delayed = if self.jitter > 0.0 {
            let spread = linear * self.jitter;
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (linear + offset).max(0.0)
        } else {
            linear
        };

        Duration::from_secs_f64(delayed)
    }

    /// Worst-case cumulative sleep across the whole budget.
    pub fn worst_case(&self) -> Duration {
        (1..self.max_attempts).fold(Duration::ZERO, |acc, attempt| {
            acc + self.base_delay * attempt
        })
    }
}

/// Check if a database error is worth retrying (connection trouble,
/// pool exhaustion, serialization failures) as opposed to a logic
/// error that will fail identically on redelivery.
pub fn is_retryable_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) => true,
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::PoolClosed => false,
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().unwrap_or_default();
            // PostgreSQL serialization failure
            code == "40001"
                // PostgreSQL deadlock detected
                || code == "40P01"
                // Connection exceptions
                || code.starts_with("08")
                // Operator intervention (admin disconnect, crash recovery)
                || code.starts_with("57")
        }
        _ => false,
    }
}

/// Check if a database error is a uniqueness violation - the signal
/// that another writer won a creation race.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().unwrap_or_default() == "23505",
        _ => false,
    }
}
