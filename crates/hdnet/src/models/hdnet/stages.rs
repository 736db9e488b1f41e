//! # Level Entry Stages
//!
//! Every hierarchical level opens with an [`EntryStage`]:
//! * level 0 uses a [`Head`]: ``CNA3d -> DilatedResBlock``;
//! * deeper levels use a [`Down`]: ``MaxPool3d(2) -> Head``.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3d, CNA3dMeta};
use crate::layers::pool::{MaxPool3d, MaxPool3dConfig};
use crate::models::hdnet::dilated_res_block::{
    DilatedResBlock, DilatedResBlockConfig, DilatedResBlockMeta,
};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`EntryStage`] Meta API.
pub trait EntryStageMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_channels(&self) -> usize;

    /// Dilation rate of the stage convolutions.
    fn dilation(&self) -> usize;

    /// Spatial reduction factor; 1 for [`Head`], 2 for [`Down`].
    fn pool_factor(&self) -> usize;
}

/// [`Head`] Config.
#[derive(Config, Debug)]
pub struct HeadConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// Dilation rate of the stage convolutions.
    #[config(default = 1)]
    pub dilation: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl EntryStageMeta for HeadConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn dilation(&self) -> usize {
        self.dilation
    }

    fn pool_factor(&self) -> usize {
        1
    }
}

impl HeadConfig {
    /// Initialize a [`Head`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Head<B> {
        let cna = AbstractCNA3dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        }
        .building_block(self.in_channels, self.out_channels, self.dilation);

        let block = DilatedResBlockConfig::new(self.out_channels, self.out_channels)
            .with_dilation(self.dilation)
            .with_normalization(self.normalization)
            .with_activation(self.activation);

        Head {
            cna: cna.init(device),
            block: block.init(device),
        }
    }
}

/// `HD-Net` head: ``CNA3d -> DilatedResBlock``.
#[derive(Module, Debug)]
pub struct Head<B: Backend> {
    /// Channel projecting building block.
    pub cna: CNA3d<B>,

    /// Residual dilated block.
    pub block: DilatedResBlock<B>,
}

impl<B: Backend> EntryStageMeta for Head<B> {
    fn in_channels(&self) -> usize {
        self.cna.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.block.out_channels()
    }

    fn dilation(&self) -> usize {
        self.cna.dilation()
    }

    fn pool_factor(&self) -> usize {
        1
    }
}

impl<B: Backend> Head<B> {
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
        let x = self.cna.forward(input);
        self.block.forward(x)
    }
}

/// [`Down`] Config.
///
/// A [`HeadConfig`] behind a fixed 2x2x2 max pool.
#[derive(Config, Debug)]
pub struct DownConfig {
    /// The pooled [`Head`].
    pub head: HeadConfig,
}

impl From<HeadConfig> for DownConfig {
    fn from(head: HeadConfig) -> Self {
        Self { head }
    }
}

impl EntryStageMeta for DownConfig {
    fn in_channels(&self) -> usize {
        self.head.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.head.out_channels()
    }

    fn dilation(&self) -> usize {
        self.head.dilation()
    }

    fn pool_factor(&self) -> usize {
        2
    }
}

impl DownConfig {
    /// Initialize a [`Down`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Down<B> {
        Down {
            pool: MaxPool3dConfig::new().with_kernel_size(2).init(),
            head: self.head.init(device),
        }
    }
}

/// `HD-Net` down stage: ``MaxPool3d(2) -> Head``.
#[derive(Module, Debug)]
pub struct Down<B: Backend> {
    /// Spatial reduction.
    pub pool: MaxPool3d,

    /// Pooled head.
    pub head: Head<B>,
}

impl<B: Backend> EntryStageMeta for Down<B> {
    fn in_channels(&self) -> usize {
        self.head.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.head.out_channels()
    }

    fn dilation(&self) -> usize {
        self.head.dilation()
    }

    fn pool_factor(&self) -> usize {
        self.pool.kernel_size
    }
}

impl<B: Backend> Down<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, depth / 2, height / 2, width / 2]``
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let x = self.pool.forward(input);
        self.head.forward(x)
    }
}

/// [`EntryStage`] Config.
#[derive(Config, Debug)]
pub enum EntryStageConfig {
    /// Level 0 [`Head`].
    Head(HeadConfig),

    /// Deeper level [`Down`].
    Down(DownConfig),
}

impl From<HeadConfig> for EntryStageConfig {
    fn from(config: HeadConfig) -> Self {
        Self::Head(config)
    }
}

impl From<DownConfig> for EntryStageConfig {
    fn from(config: DownConfig) -> Self {
        Self::Down(config)
    }
}

impl EntryStageMeta for EntryStageConfig {
    fn in_channels(&self) -> usize {
        match self {
            Self::Head(config) => config.in_channels(),
            Self::Down(config) => config.in_channels(),
        }
    }

    fn out_channels(&self) -> usize {
        match self {
            Self::Head(config) => config.out_channels(),
            Self::Down(config) => config.out_channels(),
        }
    }

    fn dilation(&self) -> usize {
        match self {
            Self::Head(config) => config.dilation(),
            Self::Down(config) => config.dilation(),
        }
    }

    fn pool_factor(&self) -> usize {
        match self {
            Self::Head(config) => config.pool_factor(),
            Self::Down(config) => config.pool_factor(),
        }
    }
}

impl EntryStageConfig {
    /// Build the entry stage for a level.
    ///
    /// Level 0 gets a [`Head`]; every other level a [`Down`].
    pub fn for_level(
        level: usize,
        head: HeadConfig,
    ) -> Self {
        if level == 0 {
            head.into()
        } else {
            DownConfig::from(head).into()
        }
    }

    /// Initialize an [`EntryStage`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> EntryStage<B> {
        match self {
            Self::Head(config) => EntryStage::Head(config.init(device)),
            Self::Down(config) => EntryStage::Down(config.init(device)),
        }
    }
}

/// A [`Head`] or [`Down`] wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum EntryStage<B: Backend> {
    /// Level 0 [`Head`].
    Head(Head<B>),

    /// Deeper level [`Down`].
    Down(Down<B>),
}

impl<B: Backend> EntryStageMeta for EntryStage<B> {
    fn in_channels(&self) -> usize {
        match self {
            Self::Head(stage) => stage.in_channels(),
            Self::Down(stage) => stage.in_channels(),
        }
    }

    fn out_channels(&self) -> usize {
        match self {
            Self::Head(stage) => stage.out_channels(),
            Self::Down(stage) => stage.out_channels(),
        }
    }

    fn dilation(&self) -> usize {
        match self {
            Self::Head(stage) => stage.dilation(),
            Self::Down(stage) => stage.dilation(),
        }
    }

    fn pool_factor(&self) -> usize {
        match self {
            Self::Head(stage) => stage.pool_factor(),
            Self::Down(stage) => stage.pool_factor(),
        }
    }
}

impl<B: Backend> EntryStage<B> {
    /// Apply the wrapped stage to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: \
    ///   ``[batch, in_channels, in_depth=depth*pool, in_height=height*pool, in_width=width*pool]``;
    ///   trailing elements past a whole pool window are dropped.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, depth, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_depth", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );
        let [_, _, in_depth, in_height, in_width] = input.dims();
        let pool = self.pool_factor();

        let x = match self {
            Self::Head(stage) => stage.forward(input),
            Self::Down(stage) => stage.forward(input),
        };

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "depth", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("depth", in_depth / pool),
                ("height", in_height / pool),
                ("width", in_width / pool)
            ]
        );

        x
    }
}
