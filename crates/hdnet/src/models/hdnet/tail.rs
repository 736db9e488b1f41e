//! # Level Tail
//!
//! A [`Tail`] projects a level's features to per-class logits,
//! restoring the network input resolution on the way:
//!
//! ```text
//! input -> CNA3d(filters) -> (ConvTranspose3d(scale) ->) CNA3d(filters / 2) -> Conv3d(1x1x1) -> classes
//! ```

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::conv_shape::maybe_conv_transpose_upsample_shape;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3d, CNA3dMeta, same_conv3d_config};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv3d, ConvTranspose3d, ConvTranspose3dConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Tail`] Meta API.
pub trait TailMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// Width of the first building block; the second uses half.
    fn filters(&self) -> usize;

    /// Number of output classes.
    fn classes(&self) -> usize;

    /// Spatial upsampling factor.
    fn scale(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[depth * scale, height * scale, width * scale]``; or `None` on overflow.
    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> Option<[usize; 3]> {
        maybe_conv_transpose_upsample_shape(input_resolution, self.scale())
    }
}

/// [`Tail`] Config.
#[derive(Config, Debug)]
pub struct TailConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// Width of the first building block; the second uses half.
    pub filters: usize,

    /// Number of output classes.
    pub classes: usize,

    /// Spatial upsampling factor; `1` adds no upsampling layer.
    #[config(default = 1)]
    pub scale: usize,

    /// Dilation rate of the building blocks.
    #[config(default = 1)]
    pub dilation: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl TailMeta for TailConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn filters(&self) -> usize {
        self.filters
    }

    fn classes(&self) -> usize {
        self.classes
    }

    fn scale(&self) -> usize {
        self.scale
    }
}

impl TailConfig {
    /// Initialize a [`Tail`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Tail<B> {
        assert!(self.scale > 0, "scale must be > 0");
        assert!(self.filters >= 2, "filters must be >= 2, got {}", self.filters);

        let cna_builder = AbstractCNA3dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };
        let half = self.filters / 2;

        let upsample = if self.scale > 1 {
            Some(
                ConvTranspose3dConfig::new([self.filters, self.filters], [self.scale; 3])
                    .with_stride([self.scale; 3])
                    .init(device),
            )
        } else {
            None
        };

        Tail {
            cna1: cna_builder
                .building_block(self.in_channels, self.filters, self.dilation)
                .init(device),
            upsample,
            cna2: cna_builder
                .building_block(self.filters, half, self.dilation)
                .init(device),
            proj: same_conv3d_config([half, self.classes], 1, 1).init(device),
        }
    }
}

/// `HD-Net` level tail.
#[derive(Module, Debug)]
pub struct Tail<B: Backend> {
    /// First building block.
    pub cna1: CNA3d<B>,

    /// Optional upsampling; present iff `scale > 1`.
    pub upsample: Option<ConvTranspose3d<B>>,

    /// Second, half-width building block.
    pub cna2: CNA3d<B>,

    /// 1x1x1 class projection.
    pub proj: Conv3d<B>,
}

impl<B: Backend> TailMeta for Tail<B> {
    fn in_channels(&self) -> usize {
        self.cna1.in_channels()
    }

    fn filters(&self) -> usize {
        self.cna1.out_channels()
    }

    fn classes(&self) -> usize {
        self.proj.weight.shape().dims[0]
    }

    fn scale(&self) -> usize {
        match &self.upsample {
            Some(upsample) => upsample.stride[0],
            None => 1,
        }
    }
}

impl<B: Backend> Tail<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, classes, depth * scale, height * scale, width * scale]``
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let [batch, depth, height, width] = unpack_shape_contract!(
            ["batch", "in_channels", "depth", "height", "width"],
            &input,
            &["batch", "depth", "height", "width"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.cna1.forward(input);
        let x = match &self.upsample {
            Some(upsample) => upsample.forward(x),
            None => x,
        };
        let x = self.cna2.forward(x);
        let x = self.proj.forward(x);

        let [out_depth, out_height, out_width] =
            match self.output_resolution([depth, height, width]) {
                Some(resolution) => resolution,
                None => panic!("Tail scale {} overflows resolution", self.scale()),
            };
        assert_shape_contract_periodically!(
            ["batch", "classes", "depth", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("classes", self.classes()),
                ("depth", out_depth),
                ("height", out_height),
                ("width", out_width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_config() {
        let config = TailConfig::new(12, 8, 3);
        assert_eq!(config.in_channels(), 12);
        assert_eq!(config.filters(), 8);
        assert_eq!(config.classes(), 3);
        assert_eq!(config.scale(), 1);
        assert_eq!(config.output_resolution([2, 3, 4]), Some([2, 3, 4]));

        let config = config.with_scale(4);
        assert_eq!(config.output_resolution([2, 3, 4]), Some([8, 12, 16]));
    }

    #[test]
    fn test_unit_scale_has_no_upsample() {
        let device = Default::default();

        let tail: Tail<B> = TailConfig::new(6, 4, 3).init(&device);
        assert!(tail.upsample.is_none());
        assert_eq!(tail.scale(), 1);
        assert_eq!(tail.cna2.out_channels(), 2);

        let input = Tensor::random([2, 6, 2, 3, 4], Distribution::Default, &device);
        let output = tail.forward(input);
        assert_eq!(output.dims(), [2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_upsampling_tail() {
        let device = Default::default();

        let tail: Tail<B> = TailConfig::new(6, 4, 5).with_scale(2).init(&device);
        assert!(tail.upsample.is_some());
        assert_eq!(tail.scale(), 2);
        assert_eq!(tail.classes(), 5);

        let input = Tensor::random([1, 6, 1, 2, 3], Distribution::Default, &device);
        let output = tail.forward(input);
        assert_eq!(output.dims(), [1, 5, 2, 4, 6]);
    }

    #[test]
    #[should_panic(expected = "filters must be >= 2")]
    fn test_narrow_filters() {
        let device = Default::default();
        let _tail: Tail<B> = TailConfig::new(6, 1, 5).init(&device);
    }
}
