use std::collections::BTreeSet;

use tracing::{debug, error, info, instrument, warn};

use crate::{CoordinationError, Coordinator, Error, Identity, MAX_IDENTITY, Result};

/// Where identity markers live in the coordination namespace.
///
/// Under a configurable root, `<root>/work/all/<id>` holds a persistent
/// marker for every identity ever minted and `<root>/work/now/<id>` an
/// ephemeral marker for every identity held by a live process.
///
/// ```
/// use slotflake::NamespaceLayout;
///
/// let layout = NamespaceLayout::new("snowflake/");
/// assert_eq!(layout.root(), "/snowflake");
/// assert_eq!(layout.all_ids_path(), "/snowflake/work/all");
/// assert_eq!(layout.active_id_path(7), "/snowflake/work/now/7");
///
/// assert_eq!(NamespaceLayout::new("/").all_ids_path(), "/work/all");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub struct NamespaceLayout {
    root: String,
}

impl NamespaceLayout {
    pub const DEFAULT_ROOT: &'static str = "/snowflake";

    /// Normalizes `root` to either the empty string (the namespace root) or
    /// `/segment[/segment..]` without a trailing slash.
    pub fn new(root: impl AsRef<str>) -> Self {
        let trimmed = root.as_ref().trim().trim_matches('/');
        let root = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn all_ids_path(&self) -> String {
        format!("{}/work/all", self.root)
    }

    pub fn active_ids_path(&self) -> String {
        format!("{}/work/now", self.root)
    }

    pub fn all_id_path(&self, id: u64) -> String {
        format!("{}/work/all/{id}", self.root)
    }

    pub fn active_id_path(&self, id: u64) -> String {
        format!("{}/work/now/{id}", self.root)
    }
}

impl Default for NamespaceLayout {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT)
    }
}

impl From<String> for NamespaceLayout {
    fn from(root: String) -> Self {
        Self::new(root)
    }
}

impl From<NamespaceLayout> for String {
    fn from(layout: NamespaceLayout) -> Self {
        layout.root
    }
}

/// Claims a base identity that no other live process holds.
///
/// Claiming is a single atomic create of the identity's ephemeral marker, so
/// two processes can never both succeed for the same identity. Identities
/// whose owner died (ephemeral marker gone, persistent marker left) are
/// reclaimed lowest first; only when none can be claimed is a new one minted
/// above the current maximum.
#[derive(Debug)]
pub struct SlotAllocator<C> {
    coordinator: C,
    layout: NamespaceLayout,
    max_identity: u64,
}

impl<C> SlotAllocator<C>
where
    C: Coordinator,
{
    /// Creates an allocator over the full `[0, MAX_IDENTITY)` space.
    pub fn new(coordinator: C, layout: NamespaceLayout) -> Self {
        Self {
            coordinator,
            layout,
            max_identity: MAX_IDENTITY,
        }
    }

    /// Restricts allocation to `[0, max_identity)`. Values above
    /// [`MAX_IDENTITY`] are clamped.
    pub fn with_max_identity(mut self, max_identity: u64) -> Self {
        self.max_identity = max_identity.min(MAX_IDENTITY);
        self
    }

    pub fn layout(&self) -> &NamespaceLayout {
        &self.layout
    }

    pub fn max_identity(&self) -> u64 {
        self.max_identity
    }

    /// Claims an identity for the lifetime of the coordinator's session.
    ///
    /// Conflicts and transport failures while claiming one identity only
    /// move on to the next one.
    ///
    /// # Errors
    /// - [`Error::Coordination`] if the marker directories cannot be created
    ///   or listed.
    /// - [`Error::IdentitySpaceExhausted`] if no identity could be reclaimed
    ///   or minted.
    #[instrument(skip(self), fields(root = %self.layout.root(), max = self.max_identity))]
    pub fn acquire_identity(&self) -> Result<Identity> {
        let all_path = self.layout.all_ids_path();
        let active_path = self.layout.active_ids_path();
        self.coordinator.ensure_path(&all_path)?;
        self.coordinator.ensure_path(&active_path)?;

        let all_ids = self.list_ids(&all_path)?;
        let active_ids = self.list_ids(&active_path)?;

        // BTreeSet iterates in ascending numeric order.
        for &candidate in all_ids.difference(&active_ids) {
            let path = self.layout.active_id_path(candidate);
            match self.coordinator.create_ephemeral(&path) {
                Ok(()) => {
                    info!(identity = candidate, "reclaimed identity");
                    return Identity::new(candidate);
                }
                Err(e) => log_claim_failure(&e, candidate),
            }
        }

        let mut next = all_ids.last().map_or(0, |max| max + 1);
        while next < self.max_identity {
            match self.mint(next) {
                Ok(()) => {
                    info!(identity = next, "minted identity");
                    return Identity::new(next);
                }
                Err(e) => log_claim_failure(&e, next),
            }
            next += 1;
        }

        error!(
            minted = all_ids.len(),
            active = active_ids.len(),
            "identity space exhausted"
        );
        Err(Error::IdentitySpaceExhausted {
            max: self.max_identity,
        })
    }

    fn mint(&self, id: u64) -> Result<(), CoordinationError> {
        self.coordinator
            .create_persistent(&self.layout.all_id_path(id))?;
        self.coordinator
            .create_ephemeral(&self.layout.active_id_path(id))
    }

    /// Lists the identities under `path`, skipping names that are not
    /// canonical decimals inside the allocation space.
    fn list_ids(&self, path: &str) -> Result<BTreeSet<u64>> {
        let children = self.coordinator.list_children(path)?;
        let mut ids = BTreeSet::new();
        for name in children {
            match parse_id(&name) {
                Some(id) if id < self.max_identity => {
                    ids.insert(id);
                }
                _ => warn!(%path, %name, "ignoring unexpected identity marker"),
            }
        }
        Ok(ids)
    }
}

/// Parses a canonical non-negative decimal: digits only and no leading
/// zeros, so that the name maps back to the exact same path.
fn parse_id(name: &str) -> Option<u64> {
    let canonical = !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_digit())
        && (name == "0" || !name.starts_with('0'));
    if canonical { name.parse().ok() } else { None }
}

fn log_claim_failure(err: &CoordinationError, id: u64) {
    match err {
        CoordinationError::Conflict { path } => {
            debug!(identity = id, %path, "identity taken by another process");
        }
        CoordinationError::Transport { path, reason } => {
            warn!(identity = id, %path, %reason, "failed to claim identity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryNamespace, MemorySession};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    fn seed(namespace: &MemoryNamespace, all: &[u64], active: &[u64]) -> Vec<MemorySession> {
        let layout = NamespaceLayout::new("/");
        let admin = namespace.session();
        admin.ensure_path(&layout.all_ids_path()).unwrap();
        admin.ensure_path(&layout.active_ids_path()).unwrap();
        for &id in all {
            admin.create_persistent(&layout.all_id_path(id)).unwrap();
        }
        // One live session per active identity, returned to keep them alive.
        active
            .iter()
            .map(|&id| {
                let holder = namespace.session();
                holder.create_ephemeral(&layout.active_id_path(id)).unwrap();
                holder
            })
            .collect()
    }

    fn unrooted<C: Coordinator>(coordinator: C) -> SlotAllocator<C> {
        SlotAllocator::new(coordinator, NamespaceLayout::new("/"))
    }

    /// Lets `rival` create a marker right before `me` tries the same path.
    struct Rival<'a> {
        me: &'a MemorySession,
        rival: &'a MemorySession,
        steal: Mutex<Vec<String>>,
    }

    impl Rival<'_> {
        fn take(&self, path: &str) -> bool {
            let mut steal = self.steal.lock().unwrap();
            let found = steal.iter().position(|p| p == path);
            found.map(|i| steal.remove(i)).is_some()
        }
    }

    impl Coordinator for Rival<'_> {
        fn ensure_path(&self, path: &str) -> Result<(), CoordinationError> {
            self.me.ensure_path(path)
        }

        fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
            self.me.list_children(path)
        }

        fn create_persistent(&self, path: &str) -> Result<(), CoordinationError> {
            if self.take(path) {
                self.rival.create_persistent(path).unwrap();
            }
            self.me.create_persistent(path)
        }

        fn create_ephemeral(&self, path: &str) -> Result<(), CoordinationError> {
            if self.take(path) {
                self.rival.create_ephemeral(path).unwrap();
            }
            self.me.create_ephemeral(path)
        }
    }

    #[test]
    fn empty_namespace_mints_zero() {
        let namespace = MemoryNamespace::new();
        let session = namespace.session();

        let identity = unrooted(&session).acquire_identity().unwrap();
        assert_eq!(identity.get(), 0);
        assert_eq!(session.list_children("/work/all").unwrap(), ["0"]);
        assert_eq!(session.list_children("/work/now").unwrap(), ["0"]);
        assert!(!namespace.is_ephemeral("/work/all/0"));
        assert!(namespace.is_ephemeral("/work/now/0"));
    }

    #[test]
    fn reclaims_the_only_free_identity() {
        let namespace = MemoryNamespace::new();
        let _holders = seed(&namespace, &[0, 1, 2], &[0, 2]);
        let session = namespace.session();

        let identity = unrooted(&session).acquire_identity().unwrap();
        assert_eq!(identity.get(), 1);
        assert!(namespace.is_ephemeral("/work/now/1"));
        assert!(!namespace.exists("/work/all/3"));
    }

    #[test]
    fn reclaims_lowest_identity_by_numeric_value() {
        let namespace = MemoryNamespace::new();
        // Lexicographically "10" < "9".
        let _holders = seed(&namespace, &[9, 10], &[]);
        let session = namespace.session();

        assert_eq!(unrooted(&session).acquire_identity().unwrap().get(), 9);
        let other = namespace.session();
        assert_eq!(unrooted(&other).acquire_identity().unwrap().get(), 10);
    }

    #[test]
    fn mints_next_identity_when_all_are_active() {
        let namespace = MemoryNamespace::new();
        let _holders = seed(&namespace, &[0, 1, 2, 3, 4], &[0, 1, 2, 3, 4]);
        let session = namespace.session();

        let identity = unrooted(&session).acquire_identity().unwrap();
        assert_eq!(identity.get(), 5);
        assert!(namespace.exists("/work/all/5"));
        assert!(namespace.is_ephemeral("/work/now/5"));
    }

    #[test]
    fn fails_when_identity_space_is_exhausted() {
        let namespace = MemoryNamespace::new();
        let all: Vec<u64> = (0..MAX_IDENTITY).collect();
        let _holders = seed(&namespace, &all, &all);
        let session = namespace.session();

        assert_eq!(
            unrooted(&session).acquire_identity().unwrap_err(),
            Error::IdentitySpaceExhausted { max: MAX_IDENTITY }
        );
        assert!(!namespace.exists("/work/all/1024"));
    }

    #[test]
    fn fails_when_capped_space_is_exhausted() {
        let namespace = MemoryNamespace::new();
        let _holders = seed(&namespace, &[0, 1, 2], &[0, 1, 2]);
        let session = namespace.session();

        let allocator = unrooted(&session).with_max_identity(3);
        assert_eq!(
            allocator.acquire_identity().unwrap_err(),
            Error::IdentitySpaceExhausted { max: 3 }
        );

        let allocator = unrooted(&session).with_max_identity(4);
        assert_eq!(allocator.acquire_identity().unwrap().get(), 3);
    }

    #[test]
    fn transport_failure_on_candidate_moves_to_next() {
        let namespace = MemoryNamespace::new();
        let _holders = seed(&namespace, &[0, 1, 2, 3], &[0, 2]);
        namespace.fail_creates_under("/work/now/1");
        let session = namespace.session();

        assert_eq!(unrooted(&session).acquire_identity().unwrap().get(), 3);
    }

    #[test]
    fn transport_failure_while_minting_moves_to_next() {
        let namespace = MemoryNamespace::new();
        namespace.session().ensure_path("/work/all").unwrap();
        namespace.fail_creates_under("/work/all/0");
        let session = namespace.session();

        assert_eq!(unrooted(&session).acquire_identity().unwrap().get(), 1);
        assert!(!namespace.exists("/work/all/0"));
    }

    #[test]
    fn listing_failure_aborts() {
        let namespace = MemoryNamespace::new();
        namespace.session().ensure_path("/work/now").unwrap();
        namespace.fail_listing("/work/now");
        let session = namespace.session();

        let err = unrooted(&session).acquire_identity().unwrap_err();
        assert!(matches!(
            err,
            Error::Coordination(CoordinationError::Transport { .. })
        ));
    }

    #[test]
    fn losing_a_reclaim_race_falls_back_to_minting() {
        let namespace = MemoryNamespace::new();
        let _holders = seed(&namespace, &[0, 1, 2], &[0, 2]);
        let me = namespace.session();
        let rival = namespace.session();
        let coordinator = Rival {
            me: &me,
            rival: &rival,
            steal: Mutex::new(vec!["/work/now/1".into()]),
        };

        let identity = unrooted(&coordinator).acquire_identity().unwrap();
        assert_eq!(identity.get(), 3);

        // The rival still owns 1; ending its session frees it again.
        rival.close();
        assert!(!namespace.exists("/work/now/1"));
    }

    #[test]
    fn losing_a_mint_race_tries_next_identity() {
        let namespace = MemoryNamespace::new();
        let me = namespace.session();
        let rival = namespace.session();
        let coordinator = Rival {
            me: &me,
            rival: &rival,
            steal: Mutex::new(vec!["/work/all/0".into(), "/work/now/1".into()]),
        };

        // 0 is minted by the rival, 1 is minted by us but claimed by the
        // rival in between.
        let identity = unrooted(&coordinator).acquire_identity().unwrap();
        assert_eq!(identity.get(), 2);
        assert!(namespace.exists("/work/all/1"));
    }

    #[test]
    fn concurrent_allocators_never_share_an_identity() {
        let namespace = MemoryNamespace::new();
        let _holders = seed(&namespace, &[0, 1, 2], &[0, 2]);
        let barrier = Barrier::new(2);

        let (a, b) = thread::scope(|s| {
            let run = || {
                let session = namespace.session();
                barrier.wait();
                let identity = unrooted(&session).acquire_identity().unwrap();
                (identity.get(), session)
            };
            let a = s.spawn(run);
            let b = s.spawn(run);
            (a.join().unwrap(), b.join().unwrap())
        });

        let mut claimed = [a.0, b.0];
        claimed.sort_unstable();
        assert_eq!(claimed, [1, 3]);
    }

    #[test]
    fn crashed_process_identity_is_reclaimed() {
        let namespace = MemoryNamespace::new();
        let first = namespace.session();
        let second = namespace.session();
        assert_eq!(unrooted(&first).acquire_identity().unwrap().get(), 0);
        assert_eq!(unrooted(&second).acquire_identity().unwrap().get(), 1);

        drop(first);

        let replacement = namespace.session();
        assert_eq!(unrooted(&replacement).acquire_identity().unwrap().get(), 0);
    }

    #[test]
    fn ignores_unexpected_marker_names() {
        let namespace = MemoryNamespace::new();
        let admin = namespace.session();
        admin.ensure_path("/work/all").unwrap();
        admin.ensure_path("/work/now").unwrap();
        for name in ["abc", "007", "-1", "5000"] {
            admin.create_persistent(&format!("/work/all/{name}")).unwrap();
        }
        let session = namespace.session();

        assert_eq!(unrooted(&session).acquire_identity().unwrap().get(), 0);
    }

    #[test]
    fn uses_configured_root() {
        let namespace = MemoryNamespace::new();
        let session = namespace.session();
        let allocator = SlotAllocator::new(&session, NamespaceLayout::default());

        assert_eq!(allocator.acquire_identity().unwrap().get(), 0);
        assert!(namespace.exists("/snowflake/work/all/0"));
        assert!(namespace.is_ephemeral("/snowflake/work/now/0"));
    }

    #[test]
    fn parses_only_canonical_decimals() {
        assert_eq!(parse_id("0"), Some(0));
        assert_eq!(parse_id("1023"), Some(1023));
        assert_eq!(parse_id("00"), None);
        assert_eq!(parse_id("01"), None);
        assert_eq!(parse_id("+1"), None);
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("99999999999999999999999"), None);
    }

    #[test]
    fn layout_normalizes_root() {
        assert_eq!(NamespaceLayout::new("").root(), "");
        assert_eq!(NamespaceLayout::new("/").root(), "");
        assert_eq!(NamespaceLayout::new("a/b/").root(), "/a/b");
        assert_eq!(NamespaceLayout::default().root(), "/snowflake");
    }
}
