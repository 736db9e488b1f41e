//! # Volume Normalization
//!
//! Per-channel norm layers for ``[batch, channels, depth, height, width]`` volumes.
//!
//! Configs are built feature-less (``0`` channels) and sized to the
//! producing convolution with [`NormalizationConfig::with_num_features`].
//! ``LayerNorm`` normalizes the trailing (spatial) axis of a channel-first
//! volume, and is not offered.

use burn::nn::{
    BatchNorm, BatchNormConfig, GroupNorm, GroupNormConfig, InstanceNorm, InstanceNormConfig,
};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Normalization`] Configuration.
#[derive(Config, Debug)]
pub enum NormalizationConfig {
    /// Batch statistics, over ``depth x height x width``.
    Batch(BatchNormConfig),

    /// Statistics per sample, over groups of channels.
    Group(GroupNormConfig),

    /// Statistics per sample and channel.
    Instance(InstanceNormConfig),
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self::batch()
    }
}

impl From<BatchNormConfig> for NormalizationConfig {
    fn from(config: BatchNormConfig) -> Self {
        Self::Batch(config)
    }
}

impl From<GroupNormConfig> for NormalizationConfig {
    fn from(config: GroupNormConfig) -> Self {
        Self::Group(config)
    }
}

impl From<InstanceNormConfig> for NormalizationConfig {
    fn from(config: InstanceNormConfig) -> Self {
        Self::Instance(config)
    }
}

impl NormalizationConfig {
    /// Feature-less batch norm.
    pub fn batch() -> Self {
        BatchNormConfig::new(0).into()
    }

    /// Feature-less group norm over `num_groups` groups.
    ///
    /// The matched feature count must be divisible by `num_groups`.
    pub fn group(num_groups: usize) -> Self {
        GroupNormConfig::new(num_groups, 0).into()
    }

    /// Feature-less instance norm.
    pub fn instance() -> Self {
        InstanceNormConfig::new(0).into()
    }

    /// Set the channel count.
    pub fn with_num_features(
        self,
        num_features: usize,
    ) -> Self {
        match self {
            Self::Batch(config) => Self::Batch(BatchNormConfig {
                num_features,
                ..config
            }),
            Self::Group(config) => Self::Group(GroupNormConfig {
                num_channels: num_features,
                ..config
            }),
            Self::Instance(config) => Self::Instance(InstanceNormConfig {
                num_channels: num_features,
                ..config
            }),
        }
    }

    /// The channel count.
    pub fn num_features(&self) -> usize {
        match self {
            Self::Batch(config) => config.num_features,
            Self::Group(config) => config.num_channels,
            Self::Instance(config) => config.num_channels,
        }
    }

    /// Initialize a [`Normalization`] layer.
    ///
    /// # Panics
    ///
    /// If the feature count is `0`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Normalization<B> {
        assert!(
            self.num_features() > 0,
            "normalization features must be matched before init"
        );
        match self {
            Self::Batch(config) => Normalization::Batch(config.init(device)),
            Self::Group(config) => Normalization::Group(config.init(device)),
            Self::Instance(config) => Normalization::Instance(config.init(device)),
        }
    }
}

/// Volume normalization layer.
#[derive(Module, Debug)]
pub enum Normalization<B: Backend> {
    /// [`BatchNorm`] over 3 spatial dims.
    Batch(BatchNorm<B, 3>),

    /// [`GroupNorm`].
    Group(GroupNorm<B>),

    /// [`InstanceNorm`].
    Instance(InstanceNorm<B>),
}

impl<B: Backend> Normalization<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// A tensor of the same shape.
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        match self {
            Self::Batch(norm) => norm.forward(input),
            Self::Group(norm) => norm.forward(input),
            Self::Instance(norm) => norm.forward(input),
        }
    }

    /// The channel count.
    pub fn num_features(&self) -> usize {
        match self {
            Self::Batch(norm) => norm.gamma.shape().dims[0],
            Self::Group(norm) => norm.num_channels,
            Self::Instance(norm) => norm.num_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, ElementConversion};

    type B = NdArray<f32>;

    #[test]
    fn test_with_num_features() {
        for config in [
            NormalizationConfig::default(),
            NormalizationConfig::group(2),
            NormalizationConfig::instance(),
        ] {
            assert_eq!(config.num_features(), 0);
            assert_eq!(config.with_num_features(6).num_features(), 6);
        }

        match NormalizationConfig::group(3).with_num_features(9) {
            NormalizationConfig::Group(config) => assert_eq!(config.num_groups, 3),
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "normalization features must be matched")]
    fn test_unmatched_init() {
        let device = Default::default();
        let _layer: Normalization<B> = NormalizationConfig::default().init(&device);
    }

    #[test]
    fn test_layers() {
        let device = Default::default();
        let input: Tensor<B, 5> = Tensor::random([2, 4, 2, 3, 3], Distribution::Default, &device);

        for config in [
            NormalizationConfig::batch(),
            NormalizationConfig::group(2),
            NormalizationConfig::instance(),
        ] {
            let layer: Normalization<B> = config.with_num_features(4).init(&device);
            assert_eq!(layer.num_features(), 4);

            let output = layer.forward(input.clone());
            assert_eq!(output.dims(), input.dims());
        }
    }

    #[test]
    fn test_instance_norm_centers_each_channel() {
        let device = Default::default();
        let input: Tensor<B, 5> =
            Tensor::random([2, 3, 2, 4, 4], Distribution::Uniform(1.0, 5.0), &device);

        let layer: Normalization<B> = NormalizationConfig::instance()
            .with_num_features(3)
            .init(&device);

        let means = layer.forward(input).reshape([2, 3, 32]).mean_dim(2);
        assert_eq!(means.dims(), [2, 3, 1]);
        let worst: f32 = means.abs().max().into_scalar().elem();
        assert!(worst < 1e-4, "channel mean {worst} is not centered");
    }
}
