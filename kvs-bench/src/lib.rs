//! kvs Benchmark Library
//!
//! Provides benchmark infrastructure for measuring store performance
//! across backends and value codecs.

pub mod config;
pub mod data_gen;
pub mod stores;
