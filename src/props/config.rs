//! Prop placement configuration.

use log::warn;
use serde::{Deserialize, Serialize};

use super::definition::{PropDefinition, default_props};

/// Configuration for environment prop placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropPlacementConfig {
    pub enabled: bool,
    /// Sample every Nth cell on both axes
    pub skip_interval: u32,
    /// Random yaw per instance
    pub random_rotation: bool,
    /// Uniform scale jitter: factor in `1 ± scale_variation`
    pub scale_variation: f32,
    /// Minimum spacing between props of conflicting groups
    pub min_distance: f32,
    /// Footprint for props without a collision size
    pub default_collision_size: [f32; 2],
    pub register_with_navigation: bool,
    /// Toggle prop batches by the view frustum
    pub prop_culling: bool,
    /// Extra height above terrain covered by the culling bounds
    pub cull_height: f32,
    /// Chunks populated per frame
    pub max_prop_chunks_per_frame: usize,
    pub props: Vec<PropDefinition>,
}

impl Default for PropPlacementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_interval: 1,
            random_rotation: true,
            scale_variation: 0.2,
            min_distance: 1.5,
            default_collision_size: [1.0, 1.0],
            register_with_navigation: true,
            prop_culling: true,
            cull_height: 16.0,
            max_prop_chunks_per_frame: 2,
            props: default_props(),
        }
    }
}

impl PropPlacementConfig {
    /// Clamp out-of-range values in place, warning about each.
    pub fn validate(&mut self) {
        if self.props.is_empty() {
            warn!("No prop definitions configured, using defaults");
            self.props = default_props();
        }
        if self.skip_interval == 0 {
            warn!("skip_interval is 0, using 1");
            self.skip_interval = 1;
        }
        if !(0.0..=1.0).contains(&self.scale_variation) {
            warn!("scale_variation {} out of [0, 1], clamping", self.scale_variation);
            self.scale_variation = self.scale_variation.clamp(0.0, 1.0);
        }
        if self.max_prop_chunks_per_frame == 0 {
            warn!("max_prop_chunks_per_frame is 0, using 1");
            self.max_prop_chunks_per_frame = 1;
        }
        for prop in &mut self.props {
            if !(0.0..=1.0).contains(&prop.probability) {
                warn!("Prop '{}' probability {} out of [0, 1], clamping", prop.name, prop.probability);
                prop.probability = prop.probability.clamp(0.0, 1.0);
            }
            if prop.max_cluster_size == 0 {
                prop.max_cluster_size = 1;
            }
            prop.cluster_decay_rate = prop.cluster_decay_rate.clamp(0.0, 1.0);
        }
    }
}
