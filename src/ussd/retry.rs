//! Retry guard: bounds the number of invalid inputs per session.

use super::session::Session;

/// What to do after an invalid input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Re-prompt the same screen, showing `attempt` of `max`.
    Retry { attempt: u32, max: u32 },
    /// Attempts used up; the dialog must end.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryGuard {
    max_attempts: u32,
}

impl RetryGuard {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Count one invalid input against the session.
    ///
    /// `session.attempts` never exceeds the maximum.
    pub fn register_failure(&self, session: &mut Session) -> RetryVerdict {
        session.attempts = (session.attempts + 1).min(self.max_attempts);

        if session.attempts >= self.max_attempts {
            RetryVerdict::Exhausted
        } else {
            RetryVerdict::Retry {
                attempt: session.attempts,
                max: self.max_attempts,
            }
        }
    }
}
