//! Persistent backend on the fjall LSM-tree engine.

mod backend;
mod config;
mod wrapper;

pub use backend::FjallBackend;
pub use config::FjallConfig;
pub use fjall::CompressionType;
