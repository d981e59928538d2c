//! Configuration for the sync engine.

use std::time::Duration;
use uuid::Uuid;

/// The capability a device role grants its engine.
///
/// Both roles run the same engine and the same handshake; the role only
/// determines which direction each handshake step actively pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The submitter: sole origin of record creation.
    FrontDesk,
    /// The authority: sole origin of the `Sent → Fulfilled` transition.
    BackOffice,
}

impl Role {
    /// Returns true if this role creates records (drives handshake steps
    /// 1 and 3).
    #[must_use]
    pub fn can_submit(&self) -> bool {
        matches!(self, Role::FrontDesk)
    }

    /// Returns true if this role fulfills records (drives handshake
    /// step 2).
    #[must_use]
    pub fn can_fulfill(&self) -> bool {
        matches!(self, Role::BackOffice)
    }
}

/// Configuration for retry behavior within a handshake step.
///
/// The protocol uses a bounded budget with fixed backoff so the state
/// machine never sits in a handshaking state indefinitely: once a record's
/// budget is exhausted the engine falls back to `Disconnected` and the
/// record is retried from scratch on the next reconnect.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts per transmission.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::from_secs(2),
        }
    }

    /// Creates a configuration with a single attempt and no backoff.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Sets the fixed backoff delay.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the delay before a given attempt (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.backoff
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Configuration for a sync engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// This device's role.
    pub role: Role,
    /// This device's identity, carried on snapshot requests for peer-side
    /// logging.
    pub device_id: Uuid,
    /// Per-operation transport timeout. The transport implementation
    /// enforces it; an operation exceeding it fails as a timeout for
    /// retry-accounting purposes.
    pub op_timeout: Duration,
    /// Retry budget for handshake transmissions.
    pub retry: RetryConfig,
}

impl EngineConfig {
    /// Creates a configuration for the given role with protocol defaults.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            device_id: Uuid::new_v4(),
            op_timeout: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the device id.
    #[must_use]
    pub fn with_device_id(mut self, device_id: Uuid) -> Self {
        self.device_id = device_id;
        self
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
