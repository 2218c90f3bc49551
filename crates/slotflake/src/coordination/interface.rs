use std::sync::Arc;

/// Failure of a single coordination-service call.
///
/// The two variants must stay distinct: the allocator treats a
/// [`CoordinationError::Conflict`] as "someone else won this key" and moves
/// on, while a [`CoordinationError::Transport`] on the namespace itself
/// aborts startup.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CoordinationError {
    /// The node already exists.
    #[error("node already exists: {path}")]
    Conflict { path: String },

    /// The call did not complete: connection loss, session expiry, missing
    /// parent, or any other service-side failure.
    #[error("transport failure at {path}: {reason}")]
    Transport { path: String, reason: String },
}

impl CoordinationError {
    pub fn transport(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// The subset of a hierarchical coordination service (ZooKeeper-style) that
/// identity allocation relies on.
///
/// Paths are absolute and `/`-separated. Create calls must be atomic
/// create-if-absent: exactly one concurrent caller succeeds and every other
/// caller observes [`CoordinationError::Conflict`].
pub trait Coordinator {
    /// Creates `path` and any missing ancestors as persistent nodes.
    /// Succeeds if `path` already exists.
    fn ensure_path(&self, path: &str) -> Result<(), CoordinationError>;

    /// Lists the names (not full paths) of the direct children of `path`.
    fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError>;

    /// Creates a durable node at `path`.
    fn create_persistent(&self, path: &str) -> Result<(), CoordinationError>;

    /// Creates a node at `path` owned by the caller's session. The service
    /// deletes it when that session ends.
    fn create_ephemeral(&self, path: &str) -> Result<(), CoordinationError>;
}

impl<C: Coordinator + ?Sized> Coordinator for &C {
    fn ensure_path(&self, path: &str) -> Result<(), CoordinationError> {
        (**self).ensure_path(path)
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        (**self).list_children(path)
    }

    fn create_persistent(&self, path: &str) -> Result<(), CoordinationError> {
        (**self).create_persistent(path)
    }

    fn create_ephemeral(&self, path: &str) -> Result<(), CoordinationError> {
        (**self).create_ephemeral(path)
    }
}

impl<C: Coordinator + ?Sized> Coordinator for Arc<C> {
    fn ensure_path(&self, path: &str) -> Result<(), CoordinationError> {
        (**self).ensure_path(path)
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        (**self).list_children(path)
    }

    fn create_persistent(&self, path: &str) -> Result<(), CoordinationError> {
        (**self).create_persistent(path)
    }

    fn create_ephemeral(&self, path: &str) -> Result<(), CoordinationError> {
        (**self).create_ephemeral(path)
    }
}
