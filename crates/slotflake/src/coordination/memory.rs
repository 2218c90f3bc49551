use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::{
    coordination::{CoordinationError, Coordinator},
    mutex::{Mutex, MutexGuard},
};

type SessionId = u64;

#[derive(Debug, Default)]
struct Tree {
    /// Every node except the implicit root, keyed by absolute path. The value
    /// is the owning session for ephemeral nodes.
    nodes: BTreeMap<String, Option<SessionId>>,
    failing_creates: BTreeSet<String>,
    failing_lists: BTreeSet<String>,
}

/// An in-process, linearizable coordination namespace.
///
/// Every operation runs under one lock, so create-if-absent is atomic across
/// threads. Each [`MemorySession`] plays the role of one client session:
/// its ephemeral nodes vanish when the session is closed or dropped, the way
/// a crashed process loses its ZooKeeper session.
///
/// Cloning yields another handle to the same namespace.
///
/// ```
/// use slotflake::{Coordinator, MemoryNamespace};
///
/// let namespace = MemoryNamespace::new();
/// let session = namespace.session();
/// session.ensure_path("/work/now").unwrap();
/// session.create_ephemeral("/work/now/0").unwrap();
/// assert!(namespace.exists("/work/now/0"));
///
/// drop(session);
/// assert!(!namespace.exists("/work/now/0"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryNamespace {
    tree: Arc<Mutex<Tree>>,
    // Kept outside the tree lock so session ids stay unique even if it is
    // poisoned.
    last_session: Arc<AtomicU64>,
}

impl MemoryNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new client session on this namespace.
    pub fn session(&self) -> MemorySession {
        let id = self.last_session.fetch_add(1, Ordering::Relaxed) + 1;
        MemorySession {
            namespace: self.clone(),
            id,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        path == "/"
            || self
                .lock()
                .is_ok_and(|tree| tree.nodes.contains_key(path))
    }

    /// Returns true if `path` exists and is owned by a session.
    pub fn is_ephemeral(&self, path: &str) -> bool {
        self.lock()
            .is_ok_and(|tree| matches!(tree.nodes.get(path), Some(Some(_))))
    }

    /// Makes every create at or below `prefix` fail with a transport error
    /// until [`MemoryNamespace::clear_failures`] is called.
    pub fn fail_creates_under(&self, prefix: &str) {
        if let Ok(mut tree) = self.lock() {
            tree.failing_creates.insert(prefix.to_owned());
        }
    }

    /// Makes listing the children of `path` fail with a transport error.
    pub fn fail_listing(&self, path: &str) {
        if let Ok(mut tree) = self.lock() {
            tree.failing_lists.insert(path.to_owned());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut tree) = self.lock() {
            tree.failing_creates.clear();
            tree.failing_lists.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tree>, CoordinationError> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.tree.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            self.tree
                .lock()
                .map_err(|_| CoordinationError::transport("/", "namespace lock poisoned"))
        }
    }

    fn create(&self, path: &str, owner: Option<SessionId>) -> Result<(), CoordinationError> {
        validate(path)?;
        let mut tree = self.lock()?;
        if tree
            .failing_creates
            .iter()
            .any(|prefix| is_at_or_below(path, prefix))
        {
            return Err(CoordinationError::transport(path, "injected failure"));
        }
        if tree.nodes.contains_key(path) {
            return Err(CoordinationError::Conflict {
                path: path.to_owned(),
            });
        }
        let parent = parent(path);
        if parent != "/" && !tree.nodes.contains_key(parent) {
            return Err(CoordinationError::transport(path, "parent node does not exist"));
        }
        tree.nodes.insert(path.to_owned(), owner);
        Ok(())
    }

    fn expire(&self, session: SessionId) {
        if let Ok(mut tree) = self.lock() {
            tree.nodes.retain(|_, owner| *owner != Some(session));
        }
    }
}

/// One client session on a [`MemoryNamespace`].
#[derive(Debug)]
pub struct MemorySession {
    namespace: MemoryNamespace,
    id: SessionId,
}

impl MemorySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn namespace(&self) -> &MemoryNamespace {
        &self.namespace
    }

    /// Ends the session, deleting its ephemeral nodes.
    pub fn close(self) {}
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        debug!(session = self.id, "session closed");
        self.namespace.expire(self.id);
    }
}

impl Coordinator for MemorySession {
    fn ensure_path(&self, path: &str) -> Result<(), CoordinationError> {
        validate(path)?;
        if path == "/" {
            return Ok(());
        }
        let mut tree = self.namespace.lock()?;
        for (i, _) in path.match_indices('/').skip(1) {
            tree.nodes.entry(path[..i].to_owned()).or_insert(None);
        }
        tree.nodes.entry(path.to_owned()).or_insert(None);
        Ok(())
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        validate(path)?;
        let tree = self.namespace.lock()?;
        if tree.failing_lists.contains(path) {
            return Err(CoordinationError::transport(path, "injected failure"));
        }
        if path != "/" && !tree.nodes.contains_key(path) {
            return Err(CoordinationError::transport(path, "node does not exist"));
        }
        let prefix = if path == "/" {
            "/".to_owned()
        } else {
            format!("{path}/")
        };
        let children = tree
            .nodes
            .range(prefix.clone()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(&prefix))
            .map(|key| &key[prefix.len()..])
            .filter(|name| !name.contains('/'))
            .map(str::to_owned)
            .collect();
        Ok(children)
    }

    fn create_persistent(&self, path: &str) -> Result<(), CoordinationError> {
        self.namespace.create(path, None)
    }

    fn create_ephemeral(&self, path: &str) -> Result<(), CoordinationError> {
        self.namespace.create(path, Some(self.id))
    }
}

fn validate(path: &str) -> Result<(), CoordinationError> {
    let valid = path == "/"
        || (path.starts_with('/') && !path.ends_with('/') && !path.contains("//"));
    if valid {
        Ok(())
    } else {
        Err(CoordinationError::transport(path, "invalid path"))
    }
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn is_at_or_below(path: &str, prefix: &str) -> bool {
    path == prefix
        || prefix == "/"
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
