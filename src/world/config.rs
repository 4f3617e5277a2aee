//! Aggregate world configuration

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::Error;
use crate::core::types::Result;
use crate::props::PropPlacementConfig;
use crate::resources::LEDGER_FILENAME;
use crate::streaming::StreamingConfig;
use crate::terrain::TerrainConfig;

/// Everything needed to stand up a [`World`](super::World)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub terrain: TerrainConfig,
    pub streaming: StreamingConfig,
    pub props: PropPlacementConfig,
    /// Harvested-resource save file; `None` keeps the ledger in memory only
    pub ledger_path: Option<PathBuf>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig::default(),
            streaming: StreamingConfig::default(),
            props: PropPlacementConfig::default(),
            ledger_path: Some(PathBuf::from(LEDGER_FILENAME)),
        }
    }
}

impl WorldConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    ///
    /// Prop names must be unique: they are part of every resource id.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_json::from_str(&json)?;
        config.validate();
        config.check_prop_names()?;
        Ok(config)
    }

    fn check_prop_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        match self.props.props.iter().find(|p| !seen.insert(p.name.as_str())) {
            Some(duplicate) => Err(Error::Config(format!("duplicate prop name '{}'", duplicate.name))),
            None => Ok(()),
        }
    }

    /// Like [`load`](Self::load), falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded world config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Could not load world config from {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp invalid values in place, warning about each.
    pub fn validate(&mut self) {
        let terrain = &mut self.terrain;
        if terrain.chunk_size == 0 {
            warn!("chunk_size is 0, using 1");
            terrain.chunk_size = 1;
        }
        if !(terrain.pixel_size > 0.0) {
            warn!("pixel_size {} is not positive, using 1.0", terrain.pixel_size);
            terrain.pixel_size = 1.0;
        }
        if terrain.beach_width < 0.0 {
            warn!("beach_width {} is negative, using 0", terrain.beach_width);
            terrain.beach_width = 0.0;
        }
        self.streaming.validate();
        self.props.validate();
    }
}
