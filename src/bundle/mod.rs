//! Read-only view over the bundler's compiled output.

mod chunk;
mod source;

pub use chunk::{ChunkGraph, ChunkInfo};
pub use source::{BundleFile, BundleSource};
