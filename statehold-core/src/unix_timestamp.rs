use std::{
    ops::{Add, Sub},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Wall-clock milliseconds since the unix epoch.
///
/// Used to stamp when an entity's state was last loaded so that cross-shard
/// readers can throttle reloads.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTimestamp {
    millis: u128,
}

impl std::fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.millis)
    }
}

impl std::fmt::Debug for UnixTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.millis)
    }
}

impl UnixTimestamp {
    pub fn now() -> Self {
        // A clock before the epoch is treated as the epoch itself
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self { millis }
    }

    pub fn from_millis(millis: u128) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u128 {
        self.millis
    }

    /// Time elapsed between `earlier` and `self`, zero if the clock went backwards
    pub fn since(&self, earlier: UnixTimestamp) -> Duration {
        *self - earlier
    }
}

impl Add<Duration> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self {
            millis: self.millis + rhs.as_millis(),
        }
    }
}

impl Sub<UnixTimestamp> for UnixTimestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        let diff = self.millis.saturating_sub(rhs.millis);
        Duration::from_millis(u64::try_from(diff).unwrap_or(u64::MAX))
    }
}
