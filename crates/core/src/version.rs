#![forbid(unsafe_code)]

use crate::error::DaoError;
use serde::{Deserialize, Serialize};

/// Monotonically increasing version token.
///
/// One token is issued per reconciliation session and shared by every entity
/// that changed during that session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    number: i64,
    created_at_ms: i64,
}

impl Version {
    pub fn new(number: i64, created_at_ms: i64) -> Self {
        Self {
            number,
            created_at_ms,
        }
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.number)
    }
}

/// Issues strictly increasing version tokens.
pub trait VersionSource {
    fn next_version(&mut self) -> Result<Version, DaoError>;
}

/// In-process version source. Starts after `last` and counts up.
#[derive(Clone, Debug, Default)]
pub struct VersionClock {
    last: i64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_after(last: i64) -> Self {
        Self { last }
    }

    pub fn last(&self) -> i64 {
        self.last
    }
}

impl VersionSource for VersionClock {
    fn next_version(&mut self) -> Result<Version, DaoError> {
        let next = self
            .last
            .checked_add(1)
            .ok_or_else(|| DaoError::rejected("version counter overflow"))?;
        self.last = next;
        Ok(Version::new(next, now_ms()))
    }
}

/// Wall-clock milliseconds since the Unix epoch; 0 if the clock is before it.
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
