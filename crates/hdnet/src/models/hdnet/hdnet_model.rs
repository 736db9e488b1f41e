//! # `HD-Net` Core Model
//!
//! [`HDNetConfig`] implements [`Config`], validates the level parameters,
//! and provides [`HDNetConfig::init`] to initialize an [`HDNet`].
//!
//! [`HDNet`] implements [`Module`], and provides [`HDNet::forward`]
//! and the per-level [`HDNet::forward_levels`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::models::hdnet::error::HDNetConfigError;
use crate::models::hdnet::fusion::{Fusion, FusionConfig, FusionMeta};
use crate::models::hdnet::level::{
    HierarchicalLevel, HierarchicalLevelConfig, HierarchicalLevelMeta, LevelOutput,
};
use crate::models::hdnet::shapes::HDNetShapePlan;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`HDNet`] Meta API.
pub trait HDNetMeta {
    /// The number of input channels.
    fn in_channels(&self) -> usize;

    /// The number of output classes.
    fn classes(&self) -> usize;

    /// The number of hierarchical levels.
    fn num_levels(&self) -> usize;
}

/// [`HDNet`] Configuration.
///
/// The per-level parameters ``modules``, ``filters``, ``dilations`` and ``scales``
/// must each have ``levels`` entries, and ``dilations[level]`` must have
/// ``modules[level]`` entries.
#[derive(Config, Debug)]
pub struct HDNetConfig {
    /// Unbatched input shape: ``[channels, depth, height, width]``.
    pub input_shape: [usize; 4],

    /// Number of segmentation classes.
    pub classes: usize,

    /// Number of hierarchical levels.
    pub levels: usize,

    /// Number of dilated units per level.
    pub modules: Vec<usize>,

    /// Channel width per level.
    pub filters: Vec<usize>,

    /// Dilation per dilated unit, per level.
    pub dilations: Vec<Vec<usize>>,

    /// Tail upsampling factor per level.
    pub scales: Vec<usize>,

    /// Dilation of the head / down stage convolutions.
    #[config(default = 1)]
    pub head_dilation: usize,

    /// Width of each tail's first building block; the second uses half.
    #[config(default = 64)]
    pub tail_filters: usize,

    /// Width of the fusion building block.
    #[config(default = 32)]
    pub fusion_filters: usize,

    /// Dense input wiring for the dilated modules.
    #[config(default = false)]
    pub dense_module_inputs: bool,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl HDNetMeta for HDNetConfig {
    fn in_channels(&self) -> usize {
        self.input_shape[0]
    }

    fn classes(&self) -> usize {
        self.classes
    }

    fn num_levels(&self) -> usize {
        self.levels
    }
}

fn require_positive(
    field: impl FnOnce() -> String,
    value: usize,
) -> Result<(), HDNetConfigError> {
    if value == 0 {
        Err(HDNetConfigError::ZeroValue { field: field() })
    } else {
        Ok(())
    }
}

impl HDNetConfig {
    fn check_structure(&self) -> Result<(), HDNetConfigError> {
        if self.levels == 0 {
            return Err(HDNetConfigError::NoLevels);
        }
        require_positive(|| "classes".to_string(), self.classes)?;
        for (idx, &extent) in self.input_shape.iter().enumerate() {
            require_positive(|| format!("input_shape[{idx}]"), extent)?;
        }
        require_positive(|| "head_dilation".to_string(), self.head_dilation)?;
        require_positive(|| "fusion_filters".to_string(), self.fusion_filters)?;
        if self.tail_filters < 2 {
            return Err(HDNetConfigError::NarrowTail {
                tail_filters: self.tail_filters,
            });
        }

        for (field, len) in [
            ("modules", self.modules.len()),
            ("filters", self.filters.len()),
            ("dilations", self.dilations.len()),
            ("scales", self.scales.len()),
        ] {
            if len != self.levels {
                return Err(HDNetConfigError::LevelCountMismatch {
                    field,
                    len,
                    levels: self.levels,
                });
            }
        }

        for level in 0..self.levels {
            let dilations = &self.dilations[level];
            if dilations.len() != self.modules[level] {
                return Err(HDNetConfigError::DilationCountMismatch {
                    level,
                    len: dilations.len(),
                    modules: self.modules[level],
                });
            }
            require_positive(|| format!("filters[{level}]"), self.filters[level])?;
            require_positive(|| format!("scales[{level}]"), self.scales[level])?;
            for (module, &dilation) in dilations.iter().enumerate() {
                require_positive(|| format!("dilations[{level}][{module}]"), dilation)?;
            }
        }

        Ok(())
    }

    /// Predict the shape of every stage.
    ///
    /// # Errors
    ///
    /// Any [`HDNetConfigError`]; this performs the full validation.
    pub fn shape_plan(&self) -> Result<HDNetShapePlan, HDNetConfigError> {
        self.check_structure()?;
        HDNetShapePlan::plan(self)
    }

    /// Check if the config is valid.
    ///
    /// Validates level parameter counts, non-zero sizes,
    /// and that every level's logits come back to the input resolution.
    pub fn try_validate(&self) -> Result<(), HDNetConfigError> {
        self.shape_plan().map(|_| ())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// The [`HierarchicalLevelConfig`] of each level.
    ///
    /// The config should be valid; see [`HDNetConfig::try_validate`].
    pub fn level_configs(&self) -> Vec<HierarchicalLevelConfig> {
        let mut in_channels = self.in_channels();
        (0..self.levels)
            .map(|level| {
                let config = HierarchicalLevelConfig::new(
                    level,
                    in_channels,
                    self.filters[level],
                    self.classes,
                    self.dilations[level].clone(),
                )
                .with_scale(self.scales[level])
                .with_head_dilation(self.head_dilation)
                .with_tail_filters(self.tail_filters)
                .with_dense_module_inputs(self.dense_module_inputs)
                .with_normalization(self.normalization.clone())
                .with_activation(self.activation.clone());

                in_channels = self.filters[level];
                config
            })
            .collect()
    }

    /// The [`FusionConfig`].
    pub fn fusion_config(&self) -> FusionConfig {
        FusionConfig::new(self.levels * self.classes, self.classes)
            .with_filters(self.fusion_filters)
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone())
    }

    /// Initialize a new [`HDNet`].
    ///
    /// # Errors
    ///
    /// If the config is invalid.
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<HDNet<B>, HDNetConfigError> {
        let plan = self.shape_plan()?;

        let levels = self
            .level_configs()
            .into_iter()
            .zip(plan.levels.iter())
            .map(|(config, shapes)| {
                tracing::debug!(
                    level = shapes.level,
                    stage = ?shapes.stage,
                    features = ?shapes.features,
                    logits = ?shapes.logits,
                    "building hierarchical level"
                );
                config.init(device)
            })
            .collect();

        tracing::debug!(
            fusion_input = ?plan.fusion_input,
            output = ?plan.output,
            "building fusion"
        );

        Ok(HDNet {
            levels,
            fusion: self.fusion_config().init(device),
        })
    }

    /// Initialize a new [`HDNet`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> HDNet<B> {
        match self.try_init(device) {
            Ok(model) => model,
            Err(err) => panic!("{}", err),
        }
    }
}

/// The tensors produced by [`HDNet::forward_levels`].
#[derive(Debug, Clone)]
pub struct HDNetOutput<B: Backend> {
    /// Per level outputs, in level order.
    pub levels: Vec<LevelOutput<B>>,

    /// Network output: ``[batch, classes, depth, height, width]``.
    pub output: Tensor<B, 5>,
}

/// `HD-Net` model.
///
/// Implements [`HDNetMeta`].
#[derive(Module, Debug)]
pub struct HDNet<B: Backend> {
    /// Hierarchical levels, in level order.
    pub levels: Vec<HierarchicalLevel<B>>,

    /// Multi-level fusion.
    pub fusion: Fusion<B>,
}

impl<B: Backend> HDNetMeta for HDNet<B> {
    fn in_channels(&self) -> usize {
        self.levels[0].in_channels()
    }

    fn classes(&self) -> usize {
        self.fusion.classes()
    }

    fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

impl<B: Backend> HDNet<B> {
    /// Forward pass, keeping every level's tensors.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// The [`HDNetOutput`].
    pub fn forward_levels(
        &self,
        input: Tensor<B, 5>,
    ) -> HDNetOutput<B> {
        let [batch, depth, height, width] = unpack_shape_contract!(
            ["batch", "in_channels", "depth", "height", "width"],
            &input,
            &["batch", "depth", "height", "width"],
            &[("in_channels", self.in_channels())]
        );

        let mut levels: Vec<LevelOutput<B>> = Vec::with_capacity(self.num_levels());
        let mut x = input;
        for level in self.levels.iter() {
            let output = level.forward(x);
            x = output.stage.clone();
            levels.push(output);
        }

        let stacked = Tensor::cat(
            levels.iter().map(|level| level.logits.clone()).collect(),
            1,
        );
        let output = self.fusion.forward(stacked);

        assert_shape_contract_periodically!(
            ["batch", "classes", "depth", "height", "width"],
            &output,
            &[
                ("batch", batch),
                ("classes", self.classes()),
                ("depth", depth),
                ("height", height),
                ("width", width)
            ]
        );

        HDNetOutput { levels, output }
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, classes, depth, height, width]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        self.forward_levels(input).output
    }
}
