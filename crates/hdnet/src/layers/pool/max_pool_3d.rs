//! # `MaxPool3d`
//!
//! Non-overlapping ``k*k*k`` max pooling for channel-first volumes.
//!
//! ``burn::nn::pool`` stops at 2d. The height/width windows are pooled by a
//! [`MaxPool2d`] over ``[batch, channels * depth, height, width]``, then the
//! depth pairs are reduced with ``max_dim``; no intermediate exceeds rank 5.
use crate::compat::conv_shape::maybe_pool_output_shape;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`MaxPool3d`] Config.
#[derive(Config, Debug)]
pub struct MaxPool3dConfig {
    /// Cubic kernel size; also the stride.
    #[config(default = 2)]
    pub kernel_size: usize,
}

impl MaxPool3dConfig {
    /// Initialize a [`MaxPool3d`].
    pub fn init(&self) -> MaxPool3d {
        let k = self.kernel_size;
        assert!(k > 0, "kernel_size must be > 0");
        MaxPool3d {
            kernel_size: k,
            plane: MaxPool2dConfig::new([k, k]).with_strides([k, k]).init(),
        }
    }
}

/// Non-overlapping 3d max pooling.
///
/// Trailing elements which do not fill a whole window are dropped.
#[derive(Module, Clone, Debug)]
pub struct MaxPool3d {
    /// Cubic kernel size; also the stride.
    pub kernel_size: usize,

    /// Height/width pooling.
    pub plane: MaxPool2d,
}

impl MaxPool3d {
    /// Get the output resolution for a given input resolution.
    ///
    /// # Returns
    ///
    /// ``[depth / k, height / k, width / k]``; or `None` if any would be empty.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> Option<[usize; 3]> {
        maybe_pool_output_shape(input_resolution, self.kernel_size)
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, depth / k, height / k, width / k]``
    ///
    /// # Panics
    ///
    /// If any spatial dim is smaller than the kernel.
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let [batch, channels, depth, height, width] = input.dims();
        let k = self.kernel_size;
        let [d, h, w] = match self.output_resolution([depth, height, width]) {
            Some(resolution) => resolution,
            None => panic!(
                "MaxPool3d kernel {k} exceeds input resolution {:?}",
                [depth, height, width]
            ),
        };

        let x = input.slice([0..batch, 0..channels, 0..d * k, 0..h * k, 0..w * k]);
        let [batch, channels, d, h, w] = unpack_shape_contract!(
            [
                "batch",
                "channels",
                "in_depth" = "depth" * "kernel",
                "in_height" = "height" * "kernel",
                "in_width" = "width" * "kernel"
            ],
            &x,
            &["batch", "channels", "depth", "height", "width"],
            &[("kernel", k)]
        );

        let x: Tensor<B, 4> = x.reshape([batch, channels * d * k, h * k, w * k]);
        let x = self.plane.forward(x);

        let x: Tensor<B, 4> = x.reshape([batch, channels * d, k, h * w]);
        let x = x.max_dim(2);
        let x: Tensor<B, 5> = x.reshape([batch, channels, d, h, w]);

        assert_shape_contract_periodically!(
            ["batch", "channels", "depth", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("channels", channels),
                ("depth", d),
                ("height", h),
                ("width", w)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type B = NdArray<f32>;

    #[test]
    fn test_config() {
        let pool = MaxPool3dConfig::new().init();
        assert_eq!(pool.kernel_size, 2);
        assert_eq!(pool.plane.kernel_size, [2, 2]);
        assert_eq!(pool.plane.stride, [2, 2]);
        assert_eq!(pool.output_resolution([8, 120, 120]), Some([4, 60, 60]));
        assert_eq!(pool.output_resolution([1, 4, 4]), None);
    }

    #[test]
    fn test_single_window() {
        let device = Default::default();
        let input: Tensor<B, 5> = Tensor::<B, 1, burn::tensor::Int>::arange(0..8, &device)
            .float()
            .reshape([1, 1, 2, 2, 2]);

        let output = MaxPool3dConfig::new().init().forward(input);

        output
            .to_data()
            .assert_eq(&TensorData::from([[[[[7.0f32]]]]]), false);
    }

    #[test]
    fn test_windows_and_channels() {
        let device = Default::default();
        // [1, 2, 2, 2, 4]: each channel holds two windows along width.
        let input: Tensor<B, 5> = Tensor::<B, 1, burn::tensor::Int>::arange(0..32, &device)
            .float()
            .reshape([1, 2, 2, 2, 4]);

        let output = MaxPool3dConfig::new().init().forward(input);
        assert_eq!(output.dims(), [1, 2, 1, 1, 2]);

        output.to_data().assert_eq(
            &TensorData::from([[[[[13.0f32, 15.0]]], [[[29.0, 31.0]]]]]),
            false,
        );
    }

    #[test]
    fn test_odd_extents_are_floored() {
        let device = Default::default();
        let input: Tensor<B, 5> = Tensor::ones([2, 3, 3, 5, 7], &device);

        let output = MaxPool3dConfig::new().init().forward(input);
        assert_eq!(output.dims(), [2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_matches_window_maxima() {
        let device = Default::default();
        let input: Tensor<B, 5> = Tensor::random([2, 3, 4, 6, 4], Distribution::Default, &device);

        let output = MaxPool3dConfig::new().init().forward(input.clone());
        assert_eq!(output.dims(), [2, 3, 2, 3, 2]);

        let data = input.to_data().to_vec::<f32>().unwrap();
        let index = |b: usize, c: usize, z: usize, y: usize, x: usize| {
            (((b * 3 + c) * 4 + z) * 6 + y) * 4 + x
        };
        let mut expected = Vec::new();
        for b in 0..2 {
            for c in 0..3 {
                for z in 0..2 {
                    for y in 0..3 {
                        for x in 0..2 {
                            let mut best = f32::NEG_INFINITY;
                            for dz in 0..2 {
                                for dy in 0..2 {
                                    for dx in 0..2 {
                                        best = best.max(
                                            data[index(b, c, 2 * z + dz, 2 * y + dy, 2 * x + dx)],
                                        );
                                    }
                                }
                            }
                            expected.push(best);
                        }
                    }
                }
            }
        }

        output
            .to_data()
            .assert_eq(&TensorData::new(expected, [2, 3, 2, 3, 2]), false);
    }

    #[test]
    fn test_kernel_three() {
        let device = Default::default();
        let input: Tensor<B, 5> = Tensor::<B, 1, burn::tensor::Int>::arange(0..54, &device)
            .float()
            .reshape([1, 2, 3, 3, 3]);

        let output = MaxPool3dConfig::new()
            .with_kernel_size(3)
            .init()
            .forward(input);

        output
            .to_data()
            .assert_eq(&TensorData::from([[[[[26.0f32]]], [[[53.0]]]]]), false);
    }

    #[test]
    #[should_panic(expected = "exceeds input resolution")]
    fn test_too_small() {
        let device = Default::default();
        let input: Tensor<B, 5> = Tensor::ones([1, 1, 1, 4, 4], &device);
        MaxPool3dConfig::new().init().forward(input);
    }
}
