use core::fmt;

use crate::{Error, Result, SnowflakeId};

/// Number of distinct identities: one per (datacenter ID, node ID) pair.
pub const MAX_IDENTITY: u64 = 1 << (SnowflakeId::DATACENTER_ID_BITS + SnowflakeId::NODE_ID_BITS);

/// A base identity claimed by one process from the coordination namespace.
///
/// The low [`SnowflakeId::NODE_ID_BITS`] bits are the node ID and the next
/// [`SnowflakeId::DATACENTER_ID_BITS`] bits are the datacenter ID.
///
/// ```
/// use slotflake::Identity;
///
/// let identity = Identity::new(37).unwrap();
/// assert_eq!(identity.node_id(), 5);
/// assert_eq!(identity.datacenter_id(), 1);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(u64);

impl Identity {
    /// Wraps a raw identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `raw >= MAX_IDENTITY`.
    pub fn new(raw: u64) -> Result<Self> {
        if raw >= MAX_IDENTITY {
            return Err(Error::InvalidArgument {
                field: "identity",
                value: raw,
                max: MAX_IDENTITY - 1,
            });
        }
        Ok(Self(raw))
    }

    /// Rebuilds the identity for a (node ID, datacenter ID) pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when either part is out of range.
    pub fn from_parts(node_id: u64, datacenter_id: u64) -> Result<Self> {
        if node_id > SnowflakeId::max_node_id() {
            return Err(Error::InvalidArgument {
                field: "node_id",
                value: node_id,
                max: SnowflakeId::max_node_id(),
            });
        }
        if datacenter_id > SnowflakeId::max_datacenter_id() {
            return Err(Error::InvalidArgument {
                field: "datacenter_id",
                value: datacenter_id,
                max: SnowflakeId::max_datacenter_id(),
            });
        }
        Ok(Self(
            (datacenter_id << SnowflakeId::NODE_ID_BITS) | node_id,
        ))
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    pub const fn node_id(&self) -> u64 {
        self.0 & SnowflakeId::NODE_ID_MASK
    }

    pub const fn datacenter_id(&self) -> u64 {
        (self.0 >> SnowflakeId::NODE_ID_BITS) & SnowflakeId::DATACENTER_ID_MASK
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
