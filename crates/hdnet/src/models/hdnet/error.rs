//! # `HD-Net` Configuration Errors

/// Reasons an [`super::HDNetConfig`] cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HDNetConfigError {
    /// The network has no levels.
    #[error("levels must be > 0")]
    NoLevels,

    /// A scalar or per-level parameter is zero.
    #[error("{field} must be > 0")]
    ZeroValue {
        /// The offending parameter, e.g. ``filters[1]``.
        field: String,
    },

    /// A per-level parameter does not have one entry per level.
    #[error("{field}.len() ({len}) != levels ({levels})")]
    LevelCountMismatch {
        /// The per-level parameter.
        field: &'static str,
        /// Its length.
        len: usize,
        /// The configured number of levels.
        levels: usize,
    },

    /// A level's dilation list does not have one entry per module.
    #[error("dilations[{level}].len() ({len}) != modules[{level}] ({modules})")]
    DilationCountMismatch {
        /// The level.
        level: usize,
        /// Length of ``dilations[level]``.
        len: usize,
        /// ``modules[level]``.
        modules: usize,
    },

    /// The tail's second block would have no channels.
    #[error("tail_filters must be >= 2, got {tail_filters}")]
    NarrowTail {
        /// The configured tail width.
        tail_filters: usize,
    },

    /// A level's input volume is too small to be pooled.
    #[error("level {level}: resolution {resolution:?} is too small for 2x2x2 pooling")]
    EmptyResolution {
        /// The level which pools.
        level: usize,
        /// The ``[depth, height, width]`` entering the pool.
        resolution: [usize; 3],
    },

    /// A level's logits do not come back to the input resolution.
    #[error(
        "level {level}: tail output resolution {actual:?} != input resolution {expected:?} (scale {scale})"
    )]
    ResolutionMismatch {
        /// The level.
        level: usize,
        /// The tail upsampling factor.
        scale: usize,
        /// The network input ``[depth, height, width]``.
        expected: [usize; 3],
        /// The level's logits ``[depth, height, width]``.
        actual: [usize; 3],
    },

    /// A planned extent or channel count does not fit in `usize`.
    #[error("level {level}: {quantity} overflows usize")]
    ShapeOverflow {
        /// The level; ``levels`` for the fusion.
        level: usize,
        /// What was being computed, e.g. ``features``.
        quantity: &'static str,
    },
}
