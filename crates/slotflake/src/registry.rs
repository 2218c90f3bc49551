use std::sync::Arc;

use tracing::{info, warn};

use crate::{Error, Identity, LockSnowflakeGenerator, Result, TimeSource, mutex::RwLock};

/// Process-scoped holder of the live generator.
///
/// Create one per process and share it. [`GeneratorRegistry::init`] is safe
/// to call repeatedly during startup: only the first call installs a
/// generator. [`GeneratorRegistry::reinit`] replaces it on purpose.
///
/// ```
/// use slotflake::{GeneratorRegistry, Identity, SystemClock};
///
/// let registry = GeneratorRegistry::new();
/// let first = registry.init(Identity::new(1)?, SystemClock::new()?)?;
/// let second = registry.init(Identity::new(2)?, SystemClock::new()?)?;
/// assert_eq!(second.node_id(), first.node_id());
///
/// let replaced = registry.reinit(Identity::new(2)?, SystemClock::new()?)?;
/// assert_eq!(replaced.node_id(), 2);
/// # Ok::<(), slotflake::Error>(())
/// ```
#[derive(Debug)]
pub struct GeneratorRegistry<T>
where
    T: TimeSource,
{
    live: RwLock<Option<Arc<LockSnowflakeGenerator<T>>>>,
}

impl<T> GeneratorRegistry<T>
where
    T: TimeSource,
{
    pub fn new() -> Self {
        Self {
            live: RwLock::new(None),
        }
    }

    /// Installs a generator for `identity` unless one is already live, and
    /// returns the live generator either way.
    ///
    /// A repeated call logs a warning and leaves the existing generator in
    /// place; `identity` and `time` are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a writer panicked (std lock only).
    pub fn init(&self, identity: Identity, time: T) -> Result<Arc<LockSnowflakeGenerator<T>>> {
        let mut live = {
            #[cfg(feature = "parking-lot")]
            {
                self.live.write()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.live.write()?
            }
        };
        if let Some(existing) = live.as_ref() {
            warn!(
                node_id = existing.node_id(),
                datacenter_id = existing.datacenter_id(),
                requested = %identity,
                "generator already initialized, keeping the existing one"
            );
            return Ok(Arc::clone(existing));
        }
        let generator = Arc::new(LockSnowflakeGenerator::from_identity(identity, time));
        info!(
            node_id = generator.node_id(),
            datacenter_id = generator.datacenter_id(),
            "generator initialized"
        );
        *live = Some(Arc::clone(&generator));
        Ok(generator)
    }

    /// Replaces the live generator unconditionally.
    ///
    /// Callers still holding the previous generator keep using it; only
    /// later [`GeneratorRegistry::get`] calls see the new one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a writer panicked (std lock only).
    pub fn reinit(&self, identity: Identity, time: T) -> Result<Arc<LockSnowflakeGenerator<T>>> {
        let generator = Arc::new(LockSnowflakeGenerator::from_identity(identity, time));
        let previous = {
            #[cfg(feature = "parking-lot")]
            {
                self.live.write().replace(Arc::clone(&generator))
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.live.write()?.replace(Arc::clone(&generator))
            }
        };
        info!(
            node_id = generator.node_id(),
            datacenter_id = generator.datacenter_id(),
            replaced = previous.is_some(),
            "generator reinitialized"
        );
        Ok(generator)
    }

    /// Returns the live generator, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a writer panicked (std lock only).
    pub fn get(&self) -> Result<Option<Arc<LockSnowflakeGenerator<T>>>> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.live.read().clone())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.live.read()?.clone())
        }
    }

    /// Like [`GeneratorRegistry::get`], but treats a missing generator as
    /// an error.
    pub fn require(&self) -> Result<Arc<LockSnowflakeGenerator<T>>> {
        self.get()?.ok_or(Error::Uninitialized)
    }
}

impl<T> Default for GeneratorRegistry<T>
where
    T: TimeSource,
{
    fn default() -> Self {
        Self::new()
    }
}
