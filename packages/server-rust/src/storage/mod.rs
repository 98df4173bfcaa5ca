//! Dataset storage implementations.
//!
//! The serving core treats storage as an opaque [`DatasetGraph`] handle;
//! this module supplies the implementations shipped with the server.
//!
//! [`DatasetGraph`]: crate::traits::DatasetGraph

pub mod memory;

pub use memory::MemoryDataset;
