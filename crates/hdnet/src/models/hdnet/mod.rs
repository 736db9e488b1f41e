//! # `HD-Net` - Hierarchical Dilated Network
//!
//! A volumetric segmentation network built from a stack of levels:
//!
//! ```text
//! input -> level 0 -> level 1 -> ... -> level N-1
//!            |          |                  |
//!          logits     logits             logits
//!            \__________|_______ ... ______/
//!                       |
//!                     fusion -> output
//! ```
//!
//! Every level but the first halves the resolution with a 2x2x2 max pool,
//! runs a [`dilated_module::HierarchicalDilatedModule`], and projects back to the
//! input resolution with a [`tail::Tail`].
//!
//! See [`HDNetConfig`] and [`HDNet`].

pub mod dilated_module;
pub mod dilated_res_block;
pub mod error;
pub mod fusion;
pub mod hdnet_model;
pub mod level;
pub mod prefabs;
pub mod shapes;
pub mod stages;
pub mod tail;

pub use error::HDNetConfigError;
pub use hdnet_model::{HDNet, HDNetConfig, HDNetMeta, HDNetOutput};
pub use shapes::HDNetShapePlan;
