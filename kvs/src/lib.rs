//! # kvs
//!
//! A dictionary-like key-value store with one uniform interface over
//! interchangeable backends.
//!
//! - Keys of many types (strings, bytes, integers, floats, tuples, sets...)
//!   are normalized to a canonical byte form before they reach storage.
//! - Values are any serde type and pass through a configurable codec
//!   (JSON or bincode, then zlib, LZ4 or no compression).
//! - Backends: a transient in-memory map, a persistent embedded store on
//!   [fjall](https://docs.rs/fjall), or any type implementing
//!   [`BackendProvider`](store::BackendProvider).
//!
//! Missing data is never an error. Reading a missing key yields `None`,
//! deleting a missing key succeeds, and storing `None` deletes the key.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use kvs::Kvs;
//!
//! let mut store = Kvs::open(":memory:")?;
//! store.set("a", &1)?;
//! store.set((1, "b"), "two")?;
//! assert_eq!(store.get::<i32>("a")?, Some(1));
//!
//! // persistent store with tuned options
//! let mut store = Kvs::builder()
//!     .database("/var/lib/app/store")
//!     .flag("c")
//!     .low_memory_preset()
//!     .open()?;
//! store.sync()?;
//! ```

pub mod codec;
pub mod common;
pub mod errors;
pub mod kvs;
pub mod kvs_builder;
pub mod store;

pub use crate::kvs::Kvs;
pub use crate::kvs_builder::{Database, KvsBuilder};
pub use common::{normalize, CanonicalKey, Key};
pub use errors::{ErrorKind, KvsError, KvsResult};
