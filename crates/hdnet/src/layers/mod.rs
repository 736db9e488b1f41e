//! Common low-level modules for adding 3d layers and operations in Burn.
pub mod blocks;
pub mod pool;
