use crate::coordination::CoordinationError;

/// A result type defaulting to the crate [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `slotflake` can emit.
///
/// Generator errors are scoped to the call that produced them: after a
/// [`Error::ClockRegression`] the generator is still usable. Allocation
/// errors ([`Error::IdentitySpaceExhausted`] and [`Error::Coordination`]
/// raised while preparing or listing the namespace) abort startup.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A node or datacenter ID was outside its bit range at construction.
    #[error("invalid {field}: {value} (must be between 0 and {max})")]
    InvalidArgument {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// The wall clock moved backward relative to the last generated
    /// timestamp. `millis` is the size of the regression.
    #[error("clock moved backwards, refusing to generate an id for {millis} ms")]
    ClockRegression { millis: u64 },

    /// The current time no longer fits in the timestamp field.
    #[error("timestamp {millis} ms since epoch exceeds the {max} ms range of the id layout")]
    TimestampOverflow { millis: u64, max: u64 },

    /// The configured epoch lies after the current wall-clock time.
    #[error("system clock is {millis} ms before the configured epoch")]
    EpochInFuture { millis: u64 },

    /// Every identity in `[0, max)` is held by a live process.
    #[error("identity space exhausted: no free identity below {max}")]
    IdentitySpaceExhausted { max: u64 },

    /// The coordination namespace could not be prepared or listed.
    #[error("coordination failure: {0}")]
    Coordination(#[from] CoordinationError),

    /// No generator has been installed in the registry yet.
    #[error("generator not initialized")]
    Uninitialized,

    /// A lock was poisoned by a panicking thread.
    ///
    /// The generator lock never poisons with the `parking-lot` feature.
    #[error("lock poisoned")]
    LockPoisoned,
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
