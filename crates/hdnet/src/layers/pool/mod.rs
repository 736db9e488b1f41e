//! # Pooling Layers
mod max_pool_3d;

pub use max_pool_3d::*;
