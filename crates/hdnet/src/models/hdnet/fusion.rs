//! # Multi-Level Fusion
//!
//! ```text
//!       ↗  mean ↘
//! input -> raw  -> concat -> CNA3d -> Conv3d(1x1x1) -> output
//!       ↘  max  ↗
//! ```
//!
//! The mean and max are taken across the channel axis of the stacked
//! per-level logits, and kept as one channel each.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3d, CNA3dMeta, same_conv3d_config};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv3d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Number of channels the fusion appends to its input.
pub const FUSION_STATISTIC_CHANNELS: usize = 2;

/// [`Fusion`] Meta API.
pub trait FusionMeta {
    /// The size of the stacked logits channel dimension.
    fn in_channels(&self) -> usize;

    /// Width of the fusion building block.
    fn filters(&self) -> usize;

    /// Number of output classes.
    fn classes(&self) -> usize;

    /// Channels entering the building block: ``in_channels + 2``.
    fn fused_channels(&self) -> usize {
        self.in_channels() + FUSION_STATISTIC_CHANNELS
    }
}

/// [`Fusion`] Config.
#[derive(Config, Debug)]
pub struct FusionConfig {
    /// The size of the stacked logits channel dimension.
    pub in_channels: usize,

    /// Number of output classes.
    pub classes: usize,

    /// Width of the fusion building block.
    #[config(default = 32)]
    pub filters: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl FusionMeta for FusionConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn filters(&self) -> usize {
        self.filters
    }

    fn classes(&self) -> usize {
        self.classes
    }
}

impl FusionConfig {
    /// Initialize a [`Fusion`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Fusion<B> {
        let cna = AbstractCNA3dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        }
        .building_block(self.fused_channels(), self.filters, 1);

        Fusion {
            cna: cna.init(device),
            proj: same_conv3d_config([self.filters, self.classes], 1, 1).init(device),
        }
    }
}

/// `HD-Net` multi-level fusion.
#[derive(Module, Debug)]
pub struct Fusion<B: Backend> {
    /// Fusion building block.
    pub cna: CNA3d<B>,

    /// 1x1x1 class projection.
    pub proj: Conv3d<B>,
}

impl<B: Backend> FusionMeta for Fusion<B> {
    fn in_channels(&self) -> usize {
        self.cna.in_channels() - FUSION_STATISTIC_CHANNELS
    }

    fn filters(&self) -> usize {
        self.cna.out_channels()
    }

    fn classes(&self) -> usize {
        self.proj.weight.shape().dims[0]
    }
}

/// Stack the channel-wise mean and max behind the input channels.
///
/// # Arguments
///
/// - `input`: ``[batch, channels, depth, height, width]``.
///
/// # Returns
///
/// ``[batch, channels + 2, depth, height, width]``
pub fn stack_channel_statistics<B: Backend>(input: Tensor<B, 5>) -> Tensor<B, 5> {
    let mean = input.clone().mean_dim(1);
    let max = input.clone().max_dim(1);
    Tensor::cat(vec![input, mean, max], 1)
}

impl<B: Backend> Fusion<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``; the stacked level logits.
    ///
    /// # Returns
    ///
    /// ``[batch, classes, depth, height, width]``
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

        let x = stack_channel_statistics(input);
        let x = self.cna.forward(x);
        let x = self.proj.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "classes", "depth", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("classes", self.classes()),
                ("depth", depth),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}
