//! Storage backends behind the [`Kvs`](crate::kvs::Kvs) facade.
//!
//! [`BackendProvider`] is the single seam between the facade and an engine.
//! Two adapters ship with the crate: [`MemoryBackend`] for transient stores
//! and, with the `fjall` feature, [`FjallBackend`] for persistent ones.

mod backend;
mod flag;
#[cfg(feature = "fjall")]
pub mod fjall_adapter;
mod iters;
mod memory;

pub use backend::*;
pub use flag::*;
#[cfg(feature = "fjall")]
pub use fjall_adapter::{FjallBackend, FjallConfig};
pub use iters::*;
pub use memory::*;
