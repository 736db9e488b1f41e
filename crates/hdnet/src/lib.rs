#![warn(missing_docs)]
//!# hdnet - Hierarchical Dilated Networks for Burn
//!
//! ## Notable Components
//!
//! * [`compat`] - compat code, ported or planned for an upcoming release of ``burn``.
//!   * [`compat::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//!   * [`compat::conv_shape`] - conv / pool output shape arithmetic.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::cna`] - ``Conv3d + Norm + Activation`` block.
//!     * [`layers::blocks::conv_norm`] - ``Conv3d + Norm`` block.
//!   * [`layers::pool`] - pooling layers.
//!     * [`layers::pool::MaxPool3d`] - 3d max pooling.
//! * [`models`] - complete model families.
//!   * [`models::hdnet`] - `HD-Net`.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;
pub mod layers;
pub mod models;
