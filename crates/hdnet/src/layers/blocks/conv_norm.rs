//! # `ConvNorm3d` Module
//!
//! A [`ConvNorm3d`] module is a [`Conv3d`] layer followed by a [`Normalization`] layer,
//! with no activation.

use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::prelude::{Backend, Tensor};

/// [`ConvNorm3d`] Meta.
pub trait ConvNorm3dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Cubic kernel size.
    fn kernel_size(&self) -> usize;

    /// Cubic dilation rate.
    fn dilation(&self) -> usize;
}

/// [`ConvNorm3d`] Config.
#[derive(Config, Debug)]
pub struct ConvNorm3dConfig {
    /// The [`Conv3d`] config.
    pub conv: Conv3dConfig,

    /// The [`Normalization`] config.
    ///
    /// The feature size will be auto-matched.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,
}

impl ConvNorm3dMeta for ConvNorm3dConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn kernel_size(&self) -> usize {
        self.conv.kernel_size[0]
    }

    fn dilation(&self) -> usize {
        self.conv.dilation[0]
    }
}

impl From<Conv3dConfig> for ConvNorm3dConfig {
    fn from(conv: Conv3dConfig) -> Self {
        Self::new(conv)
    }
}

impl ConvNorm3dConfig {
    /// Initialize a [`ConvNorm3d`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvNorm3d<B> {
        let features = self.out_channels();
        ConvNorm3d {
            conv: self.conv.init(device),
            norm: self.norm.with_num_features(features).init(device),
        }
    }
}

/// Grouped [`Conv3d`] and [`Normalization`] layer.
#[derive(Module, Debug)]
pub struct ConvNorm3d<B: Backend> {
    /// Internal Conv3d layer.
    pub conv: Conv3d<B>,

    /// Internal Norm Layer.
    pub norm: Normalization<B>,
}

impl<B: Backend> ConvNorm3dMeta for ConvNorm3d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn kernel_size(&self) -> usize {
        self.conv.kernel_size[0]
    }

    fn dilation(&self) -> usize {
        self.conv.dilation[0]
    }
}

impl<B: Backend> ConvNorm3d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, depth, height, width]``
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
        let x = self.conv.forward(input);

        let x = self.norm.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "depth", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("depth", depth),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::blocks::cna::same_conv3d_config;
    use burn::backend::NdArray;

    #[test]
    fn test_conv_norm_config() {
        let inner_config = same_conv3d_config([2, 4], 3, 2).with_bias(false);

        let config: ConvNorm3dConfig = inner_config.clone().into();

        assert_eq!(&config.conv.channels, &inner_config.channels);
        assert_eq!(&config.conv.kernel_size, &inner_config.kernel_size);
        assert_eq!(config.in_channels(), 2);
        assert_eq!(config.out_channels(), 4);
        assert_eq!(config.dilation(), 2);
    }

    #[test]
    fn test_conv_norm_shortcut() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ConvNorm3d<B> = ConvNorm3dConfig::from(same_conv3d_config([3, 5], 1, 1))
            .init(&device);
        assert_eq!(block.in_channels(), 3);
        assert_eq!(block.out_channels(), 5);
        assert_eq!(block.kernel_size(), 1);
        assert_eq!(block.norm.num_features(), 5);

        let input = Tensor::ones([2, 3, 2, 4, 4], &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [2, 5, 2, 4, 4]);

        let expected = block.norm.forward(block.conv.forward(input));
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
