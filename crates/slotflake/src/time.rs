use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Default epoch: Friday, December 1, 2017 00:00:00 UTC+08:00
pub const DEFAULT_EPOCH: Duration = Duration::from_millis(1_512_057_600_000);

/// A source of millisecond timestamps relative to a fixed epoch.
///
/// This abstraction allows you to plug in the system clock or a mocked time
/// source in tests.
///
/// # Example
///
/// ```
/// use slotflake::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the configured epoch.
    fn current_millis(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

/// A wall-clock time source offset from a user-defined epoch.
///
/// Every read goes to `SystemTime::now()`, so adjustments to the system
/// clock (NTP steps, manual changes) are visible to the generator, which
/// reports backward jumps as [`Error::ClockRegression`] instead of hiding
/// them.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    epoch: Duration,
}

impl SystemClock {
    /// Constructs a clock aligned to [`DEFAULT_EPOCH`].
    ///
    /// # Errors
    ///
    /// See [`SystemClock::with_epoch`].
    pub fn new() -> Result<Self> {
        Self::with_epoch(DEFAULT_EPOCH)
    }

    /// Constructs a clock whose zero point is `epoch`, given as a duration
    /// since 1970-01-01 UTC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EpochInFuture`] if the system clock currently reads
    /// earlier than `epoch`.
    pub fn with_epoch(epoch: Duration) -> Result<Self> {
        let now = unix_now();
        if now < epoch {
            return Err(Error::EpochInFuture {
                millis: (epoch - now).as_millis() as u64,
            });
        }
        Ok(Self { epoch })
    }

    pub const fn epoch(&self) -> Duration {
        self.epoch
    }
}

impl TimeSource for SystemClock {
    /// Saturates at zero if the system clock is stepped back past the epoch.
    fn current_millis(&self) -> u64 {
        unix_now().saturating_sub(self.epoch).as_millis() as u64
    }
}

fn unix_now() -> Duration {
    // A pre-1970 clock reads as the Unix epoch itself.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}
