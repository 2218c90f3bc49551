use core::cmp::Ordering;
use core::fmt;

use tracing::instrument;

use crate::{Error, Identity, Result, SnowflakeId, TimeSource, mutex::Mutex};

/// Mutable generator state, guarded by the generator's single lock.
#[derive(Debug, Default)]
struct GeneratorState {
    /// Timestamp of the last generated ID. `None` until the first call.
    last_timestamp: Option<u64>,
    sequence: u64,
}

/// A lock-based Snowflake ID generator for one fixed (node ID, datacenter
/// ID) pair.
///
/// All state sits behind one mutex, so only one caller runs the generation
/// algorithm at a time and the others block. Share it across threads with an
/// [`Arc`](std::sync::Arc).
///
/// ## Guarantees
/// - IDs from one instance are strictly increasing.
/// - When 4096 IDs have been issued within one millisecond, the next call
///   spins until the clock advances rather than reusing a sequence number.
/// - A clock that moves backward fails the call with
///   [`Error::ClockRegression`] and leaves the state untouched.
///
/// # Example
/// ```
/// use slotflake::{LockSnowflakeGenerator, SystemClock};
///
/// let generator = LockSnowflakeGenerator::new(1, 2, SystemClock::new()?)?;
/// let id = generator.next_id()?;
/// assert_eq!(id.node_id(), 1);
/// assert_eq!(id.datacenter_id(), 2);
/// # Ok::<(), slotflake::Error>(())
/// ```
pub struct LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    node_id: u64,
    datacenter_id: u64,
    state: Mutex<GeneratorState>,
    time: T,
}

impl<T> LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator that stamps `node_id` and `datacenter_id` into
    /// every ID and reads the current time from `time`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either ID exceeds 31.
    pub fn new(node_id: u64, datacenter_id: u64, time: T) -> Result<Self> {
        let identity = Identity::from_parts(node_id, datacenter_id)?;
        Ok(Self::from_identity(identity, time))
    }

    /// Creates a generator for a claimed [`Identity`].
    pub fn from_identity(identity: Identity, time: T) -> Self {
        Self {
            node_id: identity.node_id(),
            datacenter_id: identity.datacenter_id(),
            state: Mutex::new(GeneratorState::default()),
            time,
        }
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id
    }

    /// Generates the next ID, blocking for at most the rest of the current
    /// millisecond if its sequence space is used up.
    ///
    /// # Errors
    /// - [`Error::ClockRegression`] if the clock reads earlier than the last
    ///   generated timestamp. The generator stays usable.
    /// - [`Error::TimestampOverflow`] once the clock passes the 41-bit range.
    /// - [`Error::LockPoisoned`] if another thread panicked while generating
    ///   (std mutex only).
    #[instrument(level = "trace", skip(self), fields(node_id = self.node_id, datacenter_id = self.datacenter_id))]
    pub fn next_id(&self) -> Result<SnowflakeId> {
        let mut state = {
            #[cfg(feature = "parking-lot")]
            {
                self.state.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.state.lock()?
            }
        };

        let mut now = self.time.current_millis();
        let sequence = match state.last_timestamp {
            Some(last) => match now.cmp(&last) {
                Ordering::Less => return Err(Self::cold_clock_behind(now, last)),
                Ordering::Equal => {
                    let sequence = (state.sequence + 1) & SnowflakeId::SEQUENCE_MASK;
                    if sequence == 0 {
                        now = self.til_next_millis(last);
                    }
                    sequence
                }
                Ordering::Greater => 0,
            },
            None => 0,
        };

        if now > SnowflakeId::max_timestamp() {
            return Err(Error::TimestampOverflow {
                millis: now,
                max: SnowflakeId::max_timestamp(),
            });
        }

        state.sequence = sequence;
        state.last_timestamp = Some(now);

        Ok(SnowflakeId::from_components(
            now,
            self.datacenter_id,
            self.node_id,
            sequence,
        ))
    }

    /// Polls the clock until it reads strictly later than `last`. Spins, never
    /// sleeps.
    fn til_next_millis(&self, last: u64) -> u64 {
        loop {
            let now = self.time.current_millis();
            if now > last {
                return now;
            }
            core::hint::spin_loop();
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, last: u64) -> Error {
        Error::ClockRegression { millis: last - now }
    }
}

impl<T> fmt::Debug for LockSnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockSnowflakeGenerator")
            .field("node_id", &self.node_id)
            .field("datacenter_id", &self.datacenter_id)
            .finish_non_exhaustive()
    }
}
