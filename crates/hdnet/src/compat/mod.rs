//! # Compat
//!
//! Wrappers and shape arithmetic over ``burn`` layers,
//! generalized for channel-first volumes.
pub mod activation_wrapper;
pub mod conv_shape;
pub mod normalization_wrapper;
