//! # Hierarchical Level
//!
//! A [`HierarchicalLevel`] is:
//! * an [`EntryStage`] ([`super::stages::Head`] at level 0, [`super::stages::Down`] otherwise),
//! * a [`HierarchicalDilatedModule`],
//! * a [`Tail`].
//!
//! The entry stage output is carried to the next level;
//! the tail output is the level's logits, fed to the fusion.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::models::hdnet::dilated_module::{
    HierarchicalDilatedModule, HierarchicalDilatedModuleConfig, HierarchicalDilatedModuleMeta,
};
use crate::models::hdnet::stages::{EntryStage, EntryStageConfig, EntryStageMeta, HeadConfig};
use crate::models::hdnet::tail::{Tail, TailConfig, TailMeta};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`HierarchicalLevel`] Meta API.
pub trait HierarchicalLevelMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The level channel width.
    fn filters(&self) -> usize;

    /// The number of dilated units.
    fn modules(&self) -> usize;

    /// Number of output classes.
    fn classes(&self) -> usize;

    /// Tail upsampling factor.
    fn scale(&self) -> usize;

    /// Entry stage spatial reduction factor.
    fn pool_factor(&self) -> usize;

    /// Channels of the pre-tail features: ``filters * (modules + 1)``.
    fn feature_channels(&self) -> usize {
        self.filters() * (self.modules() + 1)
    }
}

/// [`HierarchicalLevel`] Config.
#[derive(Config, Debug)]
pub struct HierarchicalLevelConfig {
    /// Level index; level 0 does not pool.
    pub level: usize,

    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The level channel width.
    pub filters: usize,

    /// Number of output classes.
    pub classes: usize,

    /// Dilation of each dilated unit.
    pub dilations: Vec<usize>,

    /// Tail upsampling factor.
    #[config(default = 1)]
    pub scale: usize,

    /// Dilation of the entry stage convolutions.
    #[config(default = 1)]
    pub head_dilation: usize,

    /// Width of the tail's first building block.
    #[config(default = 64)]
    pub tail_filters: usize,

    /// Dense input wiring for the dilated module.
    #[config(default = false)]
    pub dense_module_inputs: bool,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl HierarchicalLevelMeta for HierarchicalLevelConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn filters(&self) -> usize {
        self.filters
    }

    fn modules(&self) -> usize {
        self.dilations.len()
    }

    fn classes(&self) -> usize {
        self.classes
    }

    fn scale(&self) -> usize {
        self.scale
    }

    fn pool_factor(&self) -> usize {
        self.entry_config().pool_factor()
    }
}

impl HierarchicalLevelConfig {
    /// The [`EntryStageConfig`] for this level.
    pub fn entry_config(&self) -> EntryStageConfig {
        EntryStageConfig::for_level(
            self.level,
            HeadConfig::new(self.in_channels, self.filters)
                .with_dilation(self.head_dilation)
                .with_normalization(self.normalization.clone())
                .with_activation(self.activation.clone()),
        )
    }

    /// The [`HierarchicalDilatedModuleConfig`] for this level.
    pub fn module_config(&self) -> HierarchicalDilatedModuleConfig {
        HierarchicalDilatedModuleConfig::new(self.filters, self.dilations.clone())
            .with_dense_inputs(self.dense_module_inputs)
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone())
    }

    /// The [`TailConfig`] for this level.
    pub fn tail_config(&self) -> TailConfig {
        TailConfig::new(self.feature_channels(), self.tail_filters, self.classes)
            .with_scale(self.scale)
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone())
    }

    /// Initialize a [`HierarchicalLevel`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> HierarchicalLevel<B> {
        HierarchicalLevel {
            entry: self.entry_config().init(device),
            module: self.module_config().init(device),
            tail: self.tail_config().init(device),
        }
    }
}

/// The tensors produced by one [`HierarchicalLevel`].
#[derive(Debug, Clone)]
pub struct LevelOutput<B: Backend> {
    /// Entry stage output; the next level's input.
    ///
    /// ``[batch, filters, depth, height, width]``
    pub stage: Tensor<B, 5>,

    /// Dilated module output.
    ///
    /// ``[batch, filters * (modules + 1), depth, height, width]``
    pub features: Tensor<B, 5>,

    /// Tail output.
    ///
    /// ``[batch, classes, depth * scale, height * scale, width * scale]``
    pub logits: Tensor<B, 5>,
}

/// One level of `HD-Net`.
#[derive(Module, Debug)]
pub struct HierarchicalLevel<B: Backend> {
    /// Head or down stage.
    pub entry: EntryStage<B>,

    /// Hierarchical dilated module.
    pub module: HierarchicalDilatedModule<B>,

    /// Class projecting tail.
    pub tail: Tail<B>,
}

impl<B: Backend> HierarchicalLevelMeta for HierarchicalLevel<B> {
    fn in_channels(&self) -> usize {
        self.entry.in_channels()
    }

    fn filters(&self) -> usize {
        self.module.filters()
    }

    fn modules(&self) -> usize {
        self.module.len()
    }

    fn classes(&self) -> usize {
        self.tail.classes()
    }

    fn scale(&self) -> usize {
        self.tail.scale()
    }

    fn pool_factor(&self) -> usize {
        self.entry.pool_factor()
    }
}

impl<B: Backend> HierarchicalLevel<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// The level's [`LevelOutput`].
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> LevelOutput<B> {
        let stage = self.entry.forward(input);
        let features = self.module.forward(stage.clone());
        let logits = self.tail.forward(features.clone());

        LevelOutput {
            stage,
            features,
            logits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_config_wiring() {
        let config = HierarchicalLevelConfig::new(1, 4, 6, 3, vec![1, 2])
            .with_scale(2)
            .with_tail_filters(8);

        assert_eq!(config.modules(), 2);
        assert_eq!(config.feature_channels(), 18);
        assert_eq!(config.pool_factor(), 2);

        let entry = config.entry_config();
        assert_eq!(entry.in_channels(), 4);
        assert_eq!(entry.out_channels(), 6);

        let module = config.module_config();
        assert_eq!(module.out_channels(), 18);

        let tail = config.tail_config();
        assert_eq!(tail.in_channels(), 18);
        assert_eq!(tail.filters(), 8);
        assert_eq!(tail.scale(), 2);
    }

    #[test]
    fn test_level_zero() {
        let device = Default::default();

        let level: HierarchicalLevel<B> = HierarchicalLevelConfig::new(0, 2, 4, 3, vec![1, 3])
            .with_tail_filters(4)
            .init(&device);
        assert_eq!(level.pool_factor(), 1);
        assert_eq!(level.scale(), 1);
        assert_eq!(level.feature_channels(), 12);

        let input = Tensor::random([2, 2, 2, 4, 4], Distribution::Default, &device);
        let output = level.forward(input);

        assert_eq!(output.stage.dims(), [2, 4, 2, 4, 4]);
        assert_eq!(output.features.dims(), [2, 12, 2, 4, 4]);
        assert_eq!(output.logits.dims(), [2, 3, 2, 4, 4]);
    }

    #[test]
    fn test_pooled_level() {
        let device = Default::default();

        let level: HierarchicalLevel<B> = HierarchicalLevelConfig::new(1, 4, 5, 2, vec![2])
            .with_scale(2)
            .with_tail_filters(4)
            .init(&device);
        assert_eq!(level.pool_factor(), 2);
        assert_eq!(level.scale(), 2);

        let input = Tensor::random([1, 4, 2, 4, 6], Distribution::Default, &device);
        let output = level.forward(input);

        assert_eq!(output.stage.dims(), [1, 5, 1, 2, 3]);
        assert_eq!(output.features.dims(), [1, 10, 1, 2, 3]);
        assert_eq!(output.logits.dims(), [1, 2, 2, 4, 6]);
    }
}
