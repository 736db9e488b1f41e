//! # Residual Dilated Block
//!
//! [`DilatedResBlock`] is the repeated convolution unit of `HD-Net`.
//!
//! ```text
//! input -> CNA3d(dilation) -> ConvNorm3d(dilation) -> + -> act -> output
//!       ↘ ----------- ConvNorm3d(1x1x1) ----------- ↗
//! ```
//!
//! [`DilatedResBlockMeta`] defines a common meta API for [`DilatedResBlock`]
//! and [`DilatedResBlockConfig`].

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3d, CNA3dMeta, same_conv3d_config};
use crate::layers::blocks::conv_norm::{ConvNorm3d, ConvNorm3dConfig, ConvNorm3dMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`DilatedResBlock`] Meta trait.
pub trait DilatedResBlockMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_channels(&self) -> usize;

    /// Dilation rate of both 3x3x3 convolutions.
    fn dilation(&self) -> usize;
}

/// [`DilatedResBlock`] Config.
///
/// Implements [`DilatedResBlockMeta`].
#[derive(Config, Debug)]
pub struct DilatedResBlockConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// Dilation rate of both 3x3x3 convolutions.
    #[config(default = 1)]
    pub dilation: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size of this config will be replaced
    /// with the appropriate feature size for the input layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl DilatedResBlockMeta for DilatedResBlockConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn dilation(&self) -> usize {
        self.dilation
    }
}

impl DilatedResBlockConfig {
    /// Initialize a [`DilatedResBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DilatedResBlock<B> {
        let cna_builder = AbstractCNA3dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let cna = cna_builder.building_block(self.in_channels, self.out_channels, self.dilation);

        let cn = ConvNorm3dConfig::new(same_conv3d_config(
            [self.out_channels, self.out_channels],
            3,
            self.dilation,
        ))
        .with_norm(self.normalization.clone());

        let shortcut = ConvNorm3dConfig::new(same_conv3d_config(
            [self.in_channels, self.out_channels],
            1,
            1,
        ))
        .with_norm(self.normalization.clone());

        DilatedResBlock {
            cna: cna.init(device),
            cn: cn.init(device),
            shortcut: shortcut.init(device),
            act: self.activation.init(device),
        }
    }
}

/// Residual Dilated Block for `HD-Net`.
///
/// Implements [`DilatedResBlockMeta`].
#[derive(Module, Debug)]
pub struct DilatedResBlock<B: Backend> {
    /// First Conv/Norm/Act Block.
    pub cna: CNA3d<B>,

    /// Second Conv/Norm Block; activated after the residual sum.
    pub cn: ConvNorm3d<B>,

    /// 1x1x1 projection of the input.
    pub shortcut: ConvNorm3d<B>,

    /// Post-sum activation.
    pub act: Activation<B>,
}

impl<B: Backend> DilatedResBlockMeta for DilatedResBlock<B> {
    fn in_channels(&self) -> usize {
        self.cna.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.cn.out_channels()
    }

    fn dilation(&self) -> usize {
        self.cna.dilation()
    }
}

impl<B: Backend> DilatedResBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, depth, height, width]`` tensor.
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

        let identity = self.shortcut.forward(input.clone());

        let x = self.cna.forward(input);
        let x = self.cn.forward(x);

        let x = self.act.forward(x + identity);

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
