//! Snowflake-style 64-bit IDs whose node identity is claimed from a shared
//! coordination namespace.
//!
//! A process starts by claiming a base identity with [`SlotAllocator`] (or
//! the [`bootstrap`] shortcut), which splits into a 5-bit datacenter ID and a
//! 5-bit node ID. A single [`LockSnowflakeGenerator`] per process then packs
//! a 41-bit millisecond timestamp, both IDs and a 12-bit sequence into each
//! [`SnowflakeId`].
//!
//! The coordination service is abstracted by [`Coordinator`]; the only
//! correctness-bearing primitive is its atomic create-if-absent.
//! [`MemoryNamespace`] is an in-process implementation with session expiry.
mod allocator;
mod bootstrap;
mod coordination;
mod error;
mod generator;
mod id;
mod identity;
mod mutex;
mod registry;
mod time;

pub use crate::allocator::*;
pub use crate::bootstrap::*;
pub use crate::coordination::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::identity::*;
pub use crate::registry::*;
pub use crate::time::*;
