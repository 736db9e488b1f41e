//! # Well-Known `HD-Net` Configurations
//!
//! Each [`HDNetPreFab`] has a unique name; see [`lookup_prefab`].

use crate::models::hdnet::hdnet_model::HDNetConfig;
use std::fmt::Debug;

/// Static builder for a named [`HDNetConfig`].
pub struct HDNetPreFab {
    /// Name of the model config pre-fab.
    pub name: &'static str,

    /// Description of the model config pre-fab.
    pub description: &'static str,

    /// Builder function for the config.
    pub builder: fn() -> HDNetConfig,
}

impl HDNetPreFab {
    /// Build a new config.
    pub fn new_config(&self) -> HDNetConfig {
        (self.builder)()
    }
}

impl Debug for HDNetPreFab {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let pretty = f.alternate();

        let mut handle = f.debug_struct("HDNetPreFab");
        handle
            .field("name", &self.name)
            .field("description", &self.description);

        if pretty {
            handle.field("config", &self.new_config());
        }

        handle.finish()
    }
}

/// Three level `HD-Net` for 3-channel ``8x120x120`` volumes and 10 classes.
pub static HDNET_REFERENCE: HDNetPreFab = HDNetPreFab {
    name: "hdnet_reference",
    description: "3 levels, 3 dilated units each, filters 32/48/72, 3x8x120x120 input",
    builder: || {
        HDNetConfig::new(
            [3, 8, 120, 120],
            10,
            3,
            vec![3, 3, 3],
            vec![32, 48, 72],
            vec![vec![1, 3, 5], vec![1, 2, 4], vec![1, 2, 2]],
            vec![1, 2, 4],
        )
    },
};

/// Two level `HD-Net` small enough to run on a CPU backend.
pub static HDNET_TINY: HDNetPreFab = HDNetPreFab {
    name: "hdnet_tiny",
    description: "2 levels, 1 dilated unit each, filters 8/12, 1x4x16x16 input",
    builder: || {
        HDNetConfig::new(
            [1, 4, 16, 16],
            2,
            2,
            vec![1, 1],
            vec![8, 12],
            vec![vec![1], vec![2]],
            vec![1, 2],
        )
        .with_tail_filters(8)
        .with_fusion_filters(8)
    },
};

/// All registered pre-fabs.
pub static HDNET_PREFABS: &[&HDNetPreFab] = &[&HDNET_REFERENCE, &HDNET_TINY];

/// Find a pre-fab by name.
pub fn lookup_prefab(name: &str) -> Option<&'static HDNetPreFab> {
    HDNET_PREFABS
        .iter()
        .copied()
        .find(|prefab| prefab.name == name)
}
