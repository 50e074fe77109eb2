//! Decision tables for terminal statuses
//!
//! After every attempt the accessor classifies the completion status and
//! looks up what to do next here. Security upgrades are only attempted
//! when the retry budget allows another attempt.

use super::status::CompletionStatus;
use super::types::AccessorConfig;

/// Attempts a granted retry can extend a call to
const GRANTED_ATTEMPTS: u8 = 2;

/// Per-call retry accounting
#[derive(Debug, Clone)]
pub struct RetryBudget {
    retries: u8,
    attempts: u8,
    max_attempts: u8,
    granted: bool,
}

impl RetryBudget {
    pub fn new(config: &AccessorConfig) -> Self {
        Self {
            retries: config.security_retries,
            attempts: 0,
            max_attempts: config.max_attempts(),
            granted: false,
        }
    }

    /// Record the start of an attempt
    pub fn begin_attempt(&mut self) -> u8 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Whether another attempt would be allowed
    pub fn can_retry(&self) -> bool {
        self.retries > 0 && self.attempts < self.max_attempts
    }

    /// Use up one retry. Returns `false` if none is left.
    pub fn consume(&mut self) -> bool {
        if self.can_retry() {
            self.retries -= 1;
            true
        } else {
            false
        }
    }

    /// Add one retry, at most once per call.
    ///
    /// The attempt ceiling is raised to make room for a second attempt, never
    /// a third. Returns `false` if the grant was already used.
    pub fn grant(&mut self) -> bool {
        if self.granted {
            return false;
        }
        self.granted = true;
        self.retries = self.retries.saturating_add(1);
        let room = self.attempts.saturating_add(1).min(GRANTED_ATTEMPTS);
        self.max_attempts = self.max_attempts.max(room);
        true
    }
}

/// What a read does after an attempt completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAction {
    /// Return the accumulated value
    Accept,
    /// Peer cannot do long reads; return whatever arrived
    AcceptPartial,
    /// Security was raised; issue the read again
    RetryAfterUpgrade,
    /// Give up on the insufficient-security status
    FailSecurity,
    /// Give up
    Fail,
}

/// What a write does after an attempt completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Done,
    /// Peer refused the long write; retry as a single frame of this many bytes
    Truncate(usize),
    RetryAfterUpgrade,
    FailSecurity,
    /// Peer refused the long write and truncation is not allowed
    FailNotLong,
    Fail,
}

/// Read decision table.
///
/// `upgrade` is only called for an insufficient-security status with retry
/// budget left; a successful upgrade consumes one retry.
pub fn read_action<F>(status: CompletionStatus, budget: &mut RetryBudget, upgrade: F) -> ReadAction
where
    F: FnOnce() -> bool,
{
    if status.is_success() {
        ReadAction::Accept
    } else if status.is_not_long() {
        ReadAction::AcceptPartial
    } else if status.is_insufficient_security() {
        if budget.can_retry() && upgrade() && budget.consume() {
            ReadAction::RetryAfterUpgrade
        } else {
            ReadAction::FailSecurity
        }
    } else {
        ReadAction::Fail
    }
}

/// Write decision table.
///
/// A refused long write is granted one extra attempt to go out truncated
/// to `ceiling` bytes, even when no security retries are configured. The
/// grant is made once per call.
pub fn write_action<F>(
    status: CompletionStatus,
    budget: &mut RetryBudget,
    config: &AccessorConfig,
    ceiling: usize,
    upgrade: F,
) -> WriteAction
where
    F: FnOnce() -> bool,
{
    if status.is_success() {
        WriteAction::Done
    } else if status.is_not_long() {
        if !config.truncate_on_not_long {
            return WriteAction::FailNotLong;
        }
        if budget.grant() && budget.consume() {
            WriteAction::Truncate(ceiling)
        } else {
            WriteAction::FailNotLong
        }
    } else if status.is_insufficient_security() {
        if budget.can_retry() && upgrade() && budget.consume() {
            WriteAction::RetryAfterUpgrade
        } else {
            WriteAction::FailSecurity
        }
    } else {
        WriteAction::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::AttErrorCode;

    fn att(code: AttErrorCode) -> CompletionStatus {
        CompletionStatus::Att(code)
    }

    fn started(config: &AccessorConfig) -> RetryBudget {
        let mut budget = RetryBudget::new(config);
        budget.begin_attempt();
        budget
    }

    #[test]
    fn test_read_success_statuses() {
        let config = AccessorConfig::default();
        for status in [CompletionStatus::Success, CompletionStatus::Done] {
            let mut budget = started(&config);
            assert_eq!(
                read_action(status, &mut budget, || panic!("no upgrade on success")),
                ReadAction::Accept
            );
        }
    }

    #[test]
    fn test_read_not_long_is_partial() {
        let mut budget = started(&AccessorConfig::default());
        let action = read_action(att(AttErrorCode::AttributeNotLong), &mut budget, || {
            panic!("no upgrade on not-long")
        });
        assert_eq!(action, ReadAction::AcceptPartial);
    }

    #[test]
    fn test_read_security_retry_once() {
        let mut budget = started(&AccessorConfig::default());
        let status = att(AttErrorCode::InsufficientEncryption);

        assert_eq!(
            read_action(status, &mut budget, || true),
            ReadAction::RetryAfterUpgrade
        );

        budget.begin_attempt();
        let mut asked = false;
        let action = read_action(status, &mut budget, || {
            asked = true;
            true
        });
        assert_eq!(action, ReadAction::FailSecurity);
        assert!(!asked, "upgrade must not be attempted without budget");
    }

    #[test]
    fn test_read_security_without_upgrade() {
        let mut budget = started(&AccessorConfig::default());
        let action = read_action(
            att(AttErrorCode::InsufficientAuthorization),
            &mut budget,
            || false,
        );
        assert_eq!(action, ReadAction::FailSecurity);
        assert!(budget.can_retry());
    }

    #[test]
    fn test_read_other_fails() {
        let mut budget = started(&AccessorConfig::default());
        for status in [
            att(AttErrorCode::ReadNotPermitted),
            CompletionStatus::Host(6),
            CompletionStatus::Released,
        ] {
            assert_eq!(read_action(status, &mut budget, || true), ReadAction::Fail);
        }
    }

    #[test]
    fn test_write_truncates_on_not_long() {
        let config = AccessorConfig::default();
        let mut budget = started(&config);
        let action = write_action(
            att(AttErrorCode::AttributeNotLong),
            &mut budget,
            &config,
            20,
            || panic!("no upgrade on not-long"),
        );
        assert_eq!(action, WriteAction::Truncate(20));
        // The granted retry was the one used
        assert!(budget.can_retry());

        // Second attempt hits the ceiling
        budget.begin_attempt();
        let action = write_action(
            att(AttErrorCode::InsufficientAuthentication),
            &mut budget,
            &config,
            20,
            || true,
        );
        assert_eq!(action, WriteAction::FailSecurity);
    }

    #[test]
    fn test_write_not_long_without_truncation() {
        let config = AccessorConfig {
            truncate_on_not_long: false,
            ..AccessorConfig::default()
        };
        let mut budget = started(&config);
        let action = write_action(
            att(AttErrorCode::AttributeNotLong),
            &mut budget,
            &config,
            20,
            || true,
        );
        assert_eq!(action, WriteAction::FailNotLong);
    }

    #[test]
    fn test_write_security_and_other() {
        let config = AccessorConfig::default();
        let mut budget = started(&config);
        assert_eq!(
            write_action(
                att(AttErrorCode::InsufficientEncryption),
                &mut budget,
                &config,
                20,
                || true
            ),
            WriteAction::RetryAfterUpgrade
        );

        budget.begin_attempt();
        assert_eq!(
            write_action(CompletionStatus::Done, &mut budget, &config, 20, || true),
            WriteAction::Done
        );
        assert_eq!(
            write_action(CompletionStatus::Host(6), &mut budget, &config, 20, || true),
            WriteAction::Fail
        );
    }

    #[test]
    fn test_not_long_grant_without_security_retries() {
        let config = AccessorConfig {
            security_retries: 0,
            ..AccessorConfig::default()
        };
        let mut budget = started(&config);
        let action = write_action(
            att(AttErrorCode::AttributeNotLong),
            &mut budget,
            &config,
            20,
            || panic!("no upgrade on not-long"),
        );
        assert_eq!(action, WriteAction::Truncate(20));

        // The truncated write is the last attempt
        assert_eq!(budget.begin_attempt(), 2);
        assert_eq!(budget.attempts(), 2);
        assert!(!budget.can_retry());
        assert_eq!(
            write_action(
                att(AttErrorCode::AttributeNotLong),
                &mut budget,
                &config,
                20,
                || true
            ),
            WriteAction::FailNotLong
        );
    }

    #[test]
    fn test_not_long_on_second_attempt_is_final() {
        let config = AccessorConfig::default();
        let mut budget = started(&config);
        assert_eq!(
            write_action(
                att(AttErrorCode::InsufficientEncryption),
                &mut budget,
                &config,
                20,
                || true
            ),
            WriteAction::RetryAfterUpgrade
        );

        budget.begin_attempt();
        let action = write_action(
            att(AttErrorCode::AttributeNotLong),
            &mut budget,
            &config,
            20,
            || true,
        );
        assert_eq!(action, WriteAction::FailNotLong);
    }

    #[test]
    fn test_grant_is_once_per_call() {
        let mut budget = started(&AccessorConfig::default());
        assert!(budget.grant());
        assert!(!budget.grant());
        assert!(budget.consume());
        assert_eq!(budget.attempts(), 1);
    }

    #[test]
    fn test_zero_retries() {
        let config = AccessorConfig {
            security_retries: 0,
            ..AccessorConfig::default()
        };
        let mut budget = started(&config);
        assert!(!budget.can_retry());
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(
            read_action(att(AttErrorCode::InsufficientEncryption), &mut budget, || true),
            ReadAction::FailSecurity
        );
    }
}
