//! # Conv Blocks
//!
//! * [`cna`] - ``Conv3d + Norm + Activation`` block.
//! * [`conv_norm`] - ``Conv3d + Norm`` block.
pub mod cna;
pub mod conv_norm;
