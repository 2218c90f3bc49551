use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    Coordinator, GeneratorRegistry, LockSnowflakeGenerator, NamespaceLayout, Result, SlotAllocator,
    TimeSource,
};

/// Startup wiring: claims an identity through `coordinator`, splits it into
/// node and datacenter IDs, and installs the process generator in
/// `registry`.
///
/// The claimed identity stays reserved for as long as the coordinator's
/// session lives, so keep the session open for the life of the generator.
/// If `registry` already holds a generator it is kept and returned, and the
/// freshly claimed identity stays reserved but unused until the session
/// ends.
///
/// # Errors
///
/// Propagates [`SlotAllocator::acquire_identity`] failures; no generator is
/// installed in that case.
///
/// # Example
///
/// ```
/// use slotflake::{GeneratorRegistry, MemoryNamespace, NamespaceLayout, SystemClock, bootstrap};
///
/// let namespace = MemoryNamespace::new();
/// let session = namespace.session();
/// let registry = GeneratorRegistry::new();
///
/// let generator = bootstrap(&session, NamespaceLayout::default(), &registry, SystemClock::new()?)?;
/// assert_eq!((generator.node_id(), generator.datacenter_id()), (0, 0));
/// let _id = generator.next_id()?;
/// # Ok::<(), slotflake::Error>(())
/// ```
#[instrument(skip_all, fields(root = %layout.root()))]
pub fn bootstrap<C, T>(
    coordinator: C,
    layout: NamespaceLayout,
    registry: &GeneratorRegistry<T>,
    time: T,
) -> Result<Arc<LockSnowflakeGenerator<T>>>
where
    C: Coordinator,
    T: TimeSource,
{
    let identity = SlotAllocator::new(coordinator, layout).acquire_identity()?;
    info!(
        %identity,
        node_id = identity.node_id(),
        datacenter_id = identity.datacenter_id(),
        "identity acquired"
    );
    registry.init(identity, time)
}
