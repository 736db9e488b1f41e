//! # Hierarchical Dilated Module
//!
//! A [`HierarchicalDilatedModule`] is a chain of [`DilatedUnit`]s whose outputs
//! are stacked on the channel axis together with the module input.
//!
//! ```text
//! input -> unit[0] -> unit[1] -> unit[2] -> concat -> output
//!       ↘ ---> ↓ -------> ↓ -------> ↓ ------ ↗
//! ```
//!
//! Each [`DilatedUnit`] is a pair of [`DilatedResBlock`]s at the same dilation.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::models::hdnet::dilated_res_block::{
    DilatedResBlock, DilatedResBlockConfig, DilatedResBlockMeta,
};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Two [`DilatedResBlock`]s applied in sequence.
#[derive(Module, Debug)]
pub struct DilatedUnit<B: Backend> {
    /// First block; maps the unit input to `filters` channels.
    pub first: DilatedResBlock<B>,

    /// Second block; `filters` to `filters`.
    pub second: DilatedResBlock<B>,
}

impl<B: Backend> DilatedUnit<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        self.second.forward(self.first.forward(input))
    }
}

/// [`HierarchicalDilatedModule`] Meta API.
pub trait HierarchicalDilatedModuleMeta {
    /// The number of dilated units.
    fn len(&self) -> usize;

    /// Check if the module has no units.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The channel width of the input, and of every unit output.
    fn filters(&self) -> usize;

    /// Units read the concatenation of everything before them.
    fn dense_inputs(&self) -> bool;

    /// The number of input channels of unit `idx`.
    fn unit_in_channels(
        &self,
        idx: usize,
    ) -> usize {
        if self.dense_inputs() {
            self.filters() * (idx + 1)
        } else {
            self.filters()
        }
    }

    /// The number of output channels.
    ///
    /// ``filters * (len + 1)``
    fn out_channels(&self) -> usize {
        self.filters() * (self.len() + 1)
    }
}

/// [`HierarchicalDilatedModule`] Configuration.
#[derive(Config, Debug)]
pub struct HierarchicalDilatedModuleConfig {
    /// The channel width of the input, and of every unit output.
    pub filters: usize,

    /// The dilation of each unit; one unit per entry.
    pub dilations: Vec<usize>,

    /// When set, unit `i` reads the concatenation of the input and units `0..i`;
    /// otherwise it reads the output of unit `i - 1` (or the input).
    #[config(default = false)]
    pub dense_inputs: bool,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl HierarchicalDilatedModuleMeta for HierarchicalDilatedModuleConfig {
    fn len(&self) -> usize {
        self.dilations.len()
    }

    fn filters(&self) -> usize {
        self.filters
    }

    fn dense_inputs(&self) -> bool {
        self.dense_inputs
    }
}

impl HierarchicalDilatedModuleConfig {
    /// Initialize a new [`HierarchicalDilatedModule`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> HierarchicalDilatedModule<B> {
        let block = |in_channels: usize, dilation: usize| {
            DilatedResBlockConfig::new(in_channels, self.filters)
                .with_dilation(dilation)
                .with_normalization(self.normalization.clone())
                .with_activation(self.activation.clone())
                .init(device)
        };

        let units = self
            .dilations
            .iter()
            .enumerate()
            .map(|(idx, &dilation)| DilatedUnit {
                first: block(self.unit_in_channels(idx), dilation),
                second: block(self.filters, dilation),
            })
            .collect();

        HierarchicalDilatedModule {
            filters: self.filters,
            dense_inputs: self.dense_inputs,
            units,
        }
    }
}

/// Hierarchical dilated module.
#[derive(Module, Debug)]
pub struct HierarchicalDilatedModule<B: Backend> {
    /// Input / unit output channel width.
    pub filters: usize,

    /// Dense input wiring.
    pub dense_inputs: bool,

    /// Internal units.
    pub units: Vec<DilatedUnit<B>>,
}

impl<B: Backend> HierarchicalDilatedModuleMeta for HierarchicalDilatedModule<B> {
    fn len(&self) -> usize {
        self.units.len()
    }

    fn filters(&self) -> usize {
        self.filters
    }

    fn dense_inputs(&self) -> bool {
        self.dense_inputs
    }
}

impl<B: Backend> HierarchicalDilatedModule<B> {
    /// The dilation of each unit.
    pub fn dilations(&self) -> Vec<usize> {
        self.units.iter().map(|unit| unit.first.dilation()).collect()
    }

    /// Apply the module.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, filters, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, filters * (len + 1), depth, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let [batch, depth, height, width] = unpack_shape_contract!(
            ["batch", "filters", "depth", "height", "width"],
            &input,
            &["batch", "depth", "height", "width"],
            &[("filters", self.filters())],
        );

        let mut outputs = Vec::with_capacity(self.len() + 1);
        outputs.push(input);

        for unit in self.units.iter() {
            let x = if self.dense_inputs {
                Tensor::cat(outputs.clone(), 1)
            } else {
                outputs[outputs.len() - 1].clone()
            };
            outputs.push(unit.forward(x));
        }

        let x = Tensor::cat(outputs, 1);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "depth", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("depth", depth),
                ("height", height),
                ("width", width)
            ],
        );

        x
    }
}
