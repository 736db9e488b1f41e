//! # `HD-Net` Shape Planning
//!
//! Predicts every stage shape of an [`HDNetConfig`] without building tensors.
//!
//! All shapes are unbatched ``[channels, depth, height, width]``.

use crate::compat::conv_shape::{maybe_conv_transpose_upsample_shape, maybe_pool_output_shape};
use crate::models::hdnet::error::HDNetConfigError;
use crate::models::hdnet::fusion::FUSION_STATISTIC_CHANNELS;
use crate::models::hdnet::hdnet_model::HDNetConfig;
use std::fmt;

/// Prepend a batch dim to an unbatched ``[channels, depth, height, width]`` shape.
pub fn batched_shape(
    batch: usize,
    shape: [usize; 4],
) -> [usize; 5] {
    let [c, d, h, w] = shape;
    [batch, c, d, h, w]
}

/// Predicted shapes for one hierarchical level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelShapePlan {
    /// Level index.
    pub level: usize,

    /// Entry stage input.
    pub input: [usize; 4],

    /// Entry stage output; carried to the next level.
    pub stage: [usize; 4],

    /// Dilated module output.
    pub features: [usize; 4],

    /// Tail output.
    pub logits: [usize; 4],

    /// The tail upsampling factor; `1` means no upsampling layer.
    pub scale: usize,
}

/// Predicted shapes for a whole network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HDNetShapePlan {
    /// Network input.
    pub input: [usize; 4],

    /// Per level shapes, in level order.
    pub levels: Vec<LevelShapePlan>,

    /// Stacked level logits entering the fusion.
    pub fusion_input: [usize; 4],

    /// Stacked logits plus mean/max statistics.
    pub fusion_stack: [usize; 4],

    /// Network output.
    pub output: [usize; 4],
}

impl HDNetShapePlan {
    /// Plan the shapes of an [`HDNetConfig`].
    ///
    /// Structural parameters are expected to be checked already;
    /// see [`HDNetConfig::try_validate`].
    ///
    /// # Errors
    ///
    /// [`HDNetConfigError::EmptyResolution`], [`HDNetConfigError::ResolutionMismatch`]
    /// and [`HDNetConfigError::ShapeOverflow`].
    pub(crate) fn plan(config: &HDNetConfig) -> Result<Self, HDNetConfigError> {
        let [in_channels, depth, height, width] = config.input_shape;
        let expected = [depth, height, width];

        let mut channels = in_channels;
        let mut resolution = expected;
        let mut levels = Vec::with_capacity(config.levels);

        for level in 0..config.levels {
            let input = [channels, resolution[0], resolution[1], resolution[2]];

            if level > 0 {
                resolution = maybe_pool_output_shape(resolution, 2)
                    .ok_or(HDNetConfigError::EmptyResolution { level, resolution })?;
            }

            let filters = config.filters[level];
            let scale = config.scales[level];
            let [d, h, w] = resolution;

            let upsampled = maybe_conv_transpose_upsample_shape(resolution, scale).ok_or(
                HDNetConfigError::ShapeOverflow {
                    level,
                    quantity: "upsampled resolution",
                },
            )?;
            if upsampled != expected {
                return Err(HDNetConfigError::ResolutionMismatch {
                    level,
                    scale,
                    expected,
                    actual: upsampled,
                });
            }

            let feature_channels = config.modules[level]
                .checked_add(1)
                .and_then(|units| filters.checked_mul(units))
                .ok_or(HDNetConfigError::ShapeOverflow {
                    level,
                    quantity: "features",
                })?;

            levels.push(LevelShapePlan {
                level,
                input,
                stage: [filters, d, h, w],
                features: [feature_channels, d, h, w],
                logits: [config.classes, depth, height, width],
                scale,
            });

            channels = filters;
        }

        let fusion_overflow = HDNetConfigError::ShapeOverflow {
            level: config.levels,
            quantity: "fusion channels",
        };
        let fusion_channels = config
            .levels
            .checked_mul(config.classes)
            .ok_or(fusion_overflow.clone())?;
        let stack_channels = fusion_channels
            .checked_add(FUSION_STATISTIC_CHANNELS)
            .ok_or(fusion_overflow)?;

        Ok(Self {
            input: config.input_shape,
            levels,
            fusion_input: [fusion_channels, depth, height, width],
            fusion_stack: [stack_channels, depth, height, width],
            output: [config.classes, depth, height, width],
        })
    }
}

impl fmt::Display for HDNetShapePlan {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "input        {:?}", self.input)?;
        for level in &self.levels {
            writeln!(
                f,
                "level {}: in {:?} -> stage {:?} -> features {:?} -> logits {:?} (scale {})",
                level.level, level.input, level.stage, level.features, level.logits, level.scale
            )?;
        }
        writeln!(f, "fusion input {:?}", self.fusion_input)?;
        writeln!(f, "fusion stack {:?}", self.fusion_stack)?;
        write!(f, "output       {:?}", self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HDNetConfig {
        HDNetConfig::new(
            [3, 8, 120, 120],
            10,
            3,
            vec![3, 3, 3],
            vec![32, 48, 72],
            vec![vec![1, 3, 5], vec![1, 2, 4], vec![1, 2, 2]],
            vec![1, 2, 4],
        )
    }

    #[test]
    fn test_plan() {
        let plan = config().shape_plan().unwrap();

        assert_eq!(plan.input, [3, 8, 120, 120]);
        assert_eq!(plan.levels.len(), 3);

        let l0 = &plan.levels[0];
        assert_eq!(l0.input, [3, 8, 120, 120]);
        assert_eq!(l0.stage, [32, 8, 120, 120]);
        assert_eq!(l0.features, [128, 8, 120, 120]);
        assert_eq!(l0.logits, [10, 8, 120, 120]);

        let l1 = &plan.levels[1];
        assert_eq!(l1.input, [32, 8, 120, 120]);
        assert_eq!(l1.stage, [48, 4, 60, 60]);
        assert_eq!(l1.features, [192, 4, 60, 60]);
        assert_eq!(l1.logits, [10, 8, 120, 120]);

        let l2 = &plan.levels[2];
        assert_eq!(l2.input, [48, 4, 60, 60]);
        assert_eq!(l2.stage, [72, 2, 30, 30]);
        assert_eq!(l2.features, [288, 2, 30, 30]);
        assert_eq!(l2.scale, 4);

        assert_eq!(plan.fusion_input, [30, 8, 120, 120]);
        assert_eq!(plan.fusion_stack, [32, 8, 120, 120]);
        assert_eq!(plan.output, [10, 8, 120, 120]);
    }

    #[test]
    fn test_batched_shape() {
        assert_eq!(batched_shape(4, [1, 2, 3, 5]), [4, 1, 2, 3, 5]);
    }

    #[test]
    fn test_resolution_mismatch() {
        let mut config = config();
        config.scales = vec![1, 2, 2];
        let err = config.shape_plan().unwrap_err();
        assert_eq!(
            err,
            HDNetConfigError::ResolutionMismatch {
                level: 2,
                scale: 2,
                expected: [8, 120, 120],
                actual: [4, 60, 60],
            }
        );
    }

    #[test]
    fn test_odd_resolution_cannot_be_restored() {
        let mut config = config();
        config.input_shape = [3, 8, 121, 120];
        let err = config.shape_plan().unwrap_err();
        assert!(matches!(
            err,
            HDNetConfigError::ResolutionMismatch { level: 1, .. }
        ));
    }

    #[test]
    fn test_empty_resolution() {
        let mut config = config();
        config.input_shape = [3, 2, 120, 120];
        let err = config.shape_plan().unwrap_err();
        assert_eq!(
            err,
            HDNetConfigError::EmptyResolution {
                level: 2,
                resolution: [1, 60, 60],
            }
        );
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut config = config();
        config.scales = vec![1, 2, usize::MAX];
        assert_eq!(
            config.shape_plan(),
            Err(HDNetConfigError::ShapeOverflow {
                level: 2,
                quantity: "upsampled resolution",
            })
        );

        let mut config = self::config();
        config.filters = vec![32, usize::MAX / 2, 72];
        assert_eq!(
            config.shape_plan(),
            Err(HDNetConfigError::ShapeOverflow {
                level: 1,
                quantity: "features",
            })
        );

        let mut config = self::config();
        config.classes = usize::MAX / 2;
        assert_eq!(
            config.shape_plan(),
            Err(HDNetConfigError::ShapeOverflow {
                level: 3,
                quantity: "fusion channels",
            })
        );
    }

    #[test]
    fn test_display() {
        let text = config().shape_plan().unwrap().to_string();
        assert!(text.contains("level 2: in [48, 4, 60, 60] -> stage [72, 2, 30, 30]"));
        assert!(text.ends_with("output       [10, 8, 120, 120]"));
    }
}
