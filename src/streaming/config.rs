//! Streaming configuration

use log::warn;
use serde::{Deserialize, Serialize};

/// Chunk streaming parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Chebyshev radius (in chunks) of the square kept loaded around the viewpoint
    pub render_distance: u32,
    /// Loaded chunks farther than this are unloaded
    pub unload_distance: u32,
    /// Generation jobs allowed to run at once
    pub max_concurrent_jobs: usize,
    /// Finished chunks committed to the renderer per frame
    pub max_commits_per_frame: usize,
    /// Toggle renderer visibility of loaded chunks by the view frustum
    pub frustum_culling: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            render_distance: 4,
            unload_distance: 6,
            max_concurrent_jobs: 4,
            max_commits_per_frame: 2,
            frustum_culling: true,
        }
    }
}

impl StreamingConfig {
    /// Clamp values that would stall or thrash streaming.
    pub fn validate(&mut self) {
        if self.unload_distance < self.render_distance {
            warn!(
                "unload_distance {} < render_distance {}, using {}",
                self.unload_distance, self.render_distance, self.render_distance
            );
            self.unload_distance = self.render_distance;
        }
        if self.max_concurrent_jobs == 0 {
            warn!("max_concurrent_jobs is 0, using 1");
            self.max_concurrent_jobs = 1;
        }
        if self.max_commits_per_frame == 0 {
            warn!("max_commits_per_frame is 0, using 1");
            self.max_commits_per_frame = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_clamps() {
        let mut config = StreamingConfig {
            render_distance: 5,
            unload_distance: 2,
            max_concurrent_jobs: 0,
            max_commits_per_frame: 0,
            frustum_culling: false,
        };
        config.validate();
        assert_eq!(config.unload_distance, 5);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.max_commits_per_frame, 1);
    }

    #[test]
    fn test_default_is_valid() {
        let mut config = StreamingConfig::default();
        config.validate();
        assert_eq!(config, StreamingConfig::default());
    }
}
