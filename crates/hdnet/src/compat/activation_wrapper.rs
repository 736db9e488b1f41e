//! # Activation Wrapper
//!
//! The rectifier family used between volumetric convolutions.
//!
//! `HD-Net` uses [`Relu`] throughout; the leaky, parametric and
//! smooth variants are offered for ablations.
use burn::nn::{Gelu, LeakyRelu, LeakyReluConfig, PRelu, PReluConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
pub enum ActivationConfig {
    /// [`Relu`]; the network default.
    Relu,

    /// [`LeakyRelu`].
    LeakyRelu(LeakyReluConfig),

    /// [`PRelu`]; carries learned slopes.
    PRelu(PReluConfig),

    /// [`Gelu`].
    Gelu,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl From<PReluConfig> for ActivationConfig {
    fn from(config: PReluConfig) -> Self {
        Self::PRelu(config)
    }
}

impl ActivationConfig {
    /// A [`LeakyRelu`] config with the given negative slope.
    pub fn leaky(negative_slope: f64) -> Self {
        LeakyReluConfig::new()
            .with_negative_slope(negative_slope)
            .into()
    }

    /// Does the activation hold parameters.
    pub fn is_parametric(&self) -> bool {
        matches!(self, Self::PRelu(_))
    }

    /// Initialize an [`Activation`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            Self::Relu => Activation::Relu(Relu),
            Self::LeakyRelu(config) => Activation::LeakyRelu(config.init()),
            Self::PRelu(config) => Activation::PRelu(config.init(device)),
            Self::Gelu => Activation::Gelu(Gelu),
        }
    }
}

/// Activation layer.
#[derive(Module, Debug)]
pub enum Activation<B: Backend> {
    /// [`Relu`].
    Relu(Relu),

    /// [`LeakyRelu`].
    LeakyRelu(LeakyRelu),

    /// [`PRelu`].
    PRelu(PRelu<B>),

    /// [`Gelu`].
    Gelu(Gelu),
}

impl<B: Backend> Activation<B> {
    /// Forward pass; the output has the input's shape.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Self::Relu(layer) => layer.forward(input),
            Self::LeakyRelu(layer) => layer.forward(input),
            Self::PRelu(layer) => layer.forward(input),
            Self::Gelu(layer) => layer.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type B = NdArray<f32>;

    // [1, 1, 1, 2, 3]
    fn volume(device: &<B as Backend>::Device) -> Tensor<B, 5> {
        Tensor::<B, 1>::from_floats([-2.0, -0.5, 0.0, 1.0, 0.5, 3.0], device)
            .reshape([1, 1, 1, 2, 3])
    }

    #[test]
    fn test_default() {
        let config = ActivationConfig::default();
        assert!(matches!(config, ActivationConfig::Relu));
        assert!(!config.is_parametric());
        assert!(ActivationConfig::PRelu(PReluConfig::new()).is_parametric());
    }

    #[test]
    fn test_relu() {
        let device = Default::default();
        let act: Activation<B> = ActivationConfig::Relu.init(&device);

        act.forward(volume(&device)).to_data().assert_eq(
            &TensorData::from([[[[[0.0f32, 0.0, 0.0], [1.0, 0.5, 3.0]]]]]),
            false,
        );
    }

    #[test]
    fn test_leaky_relu() {
        let device = Default::default();
        let act: Activation<B> = ActivationConfig::leaky(0.25).init(&device);
        assert!(matches!(act, Activation::LeakyRelu(_)));

        act.forward(volume(&device)).to_data().assert_eq(
            &TensorData::from([[[[[-0.5f32, -0.125, 0.0], [1.0, 0.5, 3.0]]]]]),
            false,
        );
    }

    #[test]
    fn test_prelu_record() {
        let device = Default::default();
        let config = ActivationConfig::from(PReluConfig::new().with_alpha(0.5));

        let source: Activation<B> = config.init(&device);
        let expected = source.forward(volume(&device));

        let reloaded: Activation<B> = config.init(&device).load_record(source.into_record());
        reloaded
            .forward(volume(&device))
            .to_data()
            .assert_eq(&expected.to_data(), true);

        expected.to_data().assert_eq(
            &TensorData::from([[[[[-1.0f32, -0.25, 0.0], [1.0, 0.5, 3.0]]]]]),
            false,
        );
    }

    #[test]
    fn test_gelu_keeps_shape() {
        let device = Default::default();
        let act: Activation<B> = ActivationConfig::Gelu.init(&device);

        let input = volume(&device);
        let expected = Gelu.forward(input.clone());
        let output = act.forward(input);

        assert_eq!(output.dims(), [1, 1, 1, 2, 3]);
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
