//! # `CNA3d` - conv/norm/activation block.
//!
//! A [`CNA3d`] module is:
//! * a [`Conv3d`] layer,
//! * a [`Normalization`] layer,
//! * a [`Activation`] layer.
//!
//! This is the stride-1 "building block" of the hierarchical network;
//! spatial extents are preserved by "same" padding.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::compat::conv_shape::same_padding;
use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig3d;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::prelude::{Backend, Tensor};

/// Build a stride-1, "same"-padded, cubic [`Conv3dConfig`].
///
/// # Arguments
///
/// - `channels`: ``[in_channels, out_channels]``.
/// - `kernel_size`: odd cubic kernel size.
/// - `dilation`: cubic dilation rate.
pub fn same_conv3d_config(
    channels: [usize; 2],
    kernel_size: usize,
    dilation: usize,
) -> Conv3dConfig {
    let padding = same_padding(kernel_size, dilation);
    Conv3dConfig::new(channels, [kernel_size; 3])
        .with_dilation([dilation; 3])
        .with_padding(PaddingConfig3d::Explicit(padding, padding, padding))
}

/// Abstract policy for [`CNA3d`] Config.
///
/// Defines a [`NormalizationConfig`] and [`ActivationConfig`],
/// and can be lifted to a [`CNA3dConfig`] to match a [`Conv3dConfig`].
///
/// The abstract [`NormalizationConfig`] will be feature matched
/// with the target [`Conv3dConfig`].
#[derive(Config, Debug)]
pub struct AbstractCNA3dConfig {
    /// The [`Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,

    /// Activation Config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl AbstractCNA3dConfig {
    /// Merge with a [`Conv3dConfig`] to construct a [`CNA3dConfig`].
    ///
    /// The abstract [`NormalizationConfig`] will be feature matched
    /// with the target [`Conv3dConfig`], resulting in a normalization
    /// layer sized appropriately for the input convolution.
    pub fn build_config(
        &self,
        conv: Conv3dConfig,
    ) -> CNA3dConfig {
        CNA3dConfig {
            conv,
            norm: self.norm.clone(),
            act: self.act.clone(),
        }
        .match_norm_features()
    }

    /// Build the 3x3x3 "building block" config for a dilation rate.
    pub fn building_block(
        &self,
        in_channels: usize,
        out_channels: usize,
        dilation: usize,
    ) -> CNA3dConfig {
        self.build_config(same_conv3d_config(
            [in_channels, out_channels],
            3,
            dilation,
        ))
    }
}

/// [`CNA3d`] Meta.
pub trait CNA3dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Cubic kernel size.
    fn kernel_size(&self) -> usize;

    /// Cubic dilation rate.
    fn dilation(&self) -> usize;
}

/// [`CNA3d`] Config.
///
/// Implements [`CNA3dMeta`].
#[derive(Config, Debug)]
pub struct CNA3dConfig {
    /// The [`Conv3d`] config.
    pub conv: Conv3dConfig,

    /// The [`Normalization`] config.
    pub norm: NormalizationConfig,

    /// The [`Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl CNA3dMeta for CNA3dConfig {
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

impl CNA3dConfig {
    /// Initialize a [`CNA3d`].
    ///
    /// Auto-matches the norm layer input channels
    /// to the conv layer's output channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> CNA3d<B> {
        let cfg = self.match_norm_features();
        CNA3d {
            conv: cfg.conv.init(device),
            norm: cfg.norm.init(device),
            act: cfg.act.init(device),
        }
    }

    /// Adjust the norm features to match the conv output size.
    ///
    /// ['`CNA3dConfig::init`'] does this automatically.
    pub fn match_norm_features(self) -> Self {
        let features = self.out_channels();
        let norm = self.norm.with_num_features(features);
        Self { norm, ..self }
    }
}

/// Sequenced conv/norm/activation block.
///
/// Implements [`CNA3dMeta`].
#[derive(Module, Debug)]
pub struct CNA3d<B: Backend> {
    /// Internal Conv3d layer.
    pub conv: Conv3d<B>,

    /// Internal Norm Layer.
    pub norm: Normalization<B>,

    /// Activation layer.
    pub act: Activation<B>,
}

impl<B: Backend> CNA3dMeta for CNA3d<B> {
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

impl<B: Backend> CNA3d<B> {
    /// Forward Pass.
    ///
    /// Applies the conv/norm/act layers in sequence.
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
        let x = self.act.forward(x);

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
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::GroupNormConfig;
    use burn::tensor::Distribution;

    #[test]
    fn test_building_block_config() {
        let abstract_config = AbstractCNA3dConfig::new();

        let config: CNA3dConfig = abstract_config.building_block(2, 4, 3);

        assert_eq!(config.in_channels(), 2);
        assert_eq!(config.out_channels(), 4);
        assert_eq!(config.kernel_size(), 3);
        assert_eq!(config.dilation(), 3);
        assert_eq!(config.norm.num_features(), 4);
        assert!(matches!(
            config.conv.padding,
            PaddingConfig3d::Explicit(3, 3, 3)
        ));
    }

    #[test]
    fn test_abstract_config_norm_matching() {
        let abstract_config = AbstractCNA3dConfig::new()
            .with_norm(GroupNormConfig::new(2, 0).into())
            .with_act(ActivationConfig::Gelu);

        let config = abstract_config.build_config(same_conv3d_config([3, 6], 1, 1));
        assert_eq!(config.norm.num_features(), 6);
        assert!(matches!(config.act, ActivationConfig::Gelu));
        assert!(matches!(
            config.conv.padding,
            PaddingConfig3d::Explicit(0, 0, 0)
        ));
    }

    #[test]
    fn test_cna() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let layer: CNA3d<B> = AbstractCNA3dConfig::new()
            .building_block(2, 4, 2)
            .init(&device);
        assert_eq!(layer.in_channels(), 2);
        assert_eq!(layer.out_channels(), 4);
        assert_eq!(layer.kernel_size(), 3);
        assert_eq!(layer.dilation(), 2);

        let input = Tensor::random([2, 2, 3, 5, 6], Distribution::Default, &device);

        let output = layer.forward(input.clone());
        assert_eq!(output.dims(), [2, 4, 3, 5, 6]);

        let expected = {
            let x = layer.conv.forward(input);
            let x = layer.norm.forward(x);
            layer.act.forward(x)
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
