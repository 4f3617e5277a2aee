//! Deterministic environment props on loaded chunks

pub mod definition;
pub mod hash;
pub mod collision;
pub mod navigation;
pub mod config;
pub mod placer;

pub use definition::{CollisionMode, PlacementPattern, PropDefinition, default_props};
pub use hash::{deterministic_random, position_hash};
pub use collision::{AvoidanceTable, CollisionSet, PlacedPropRecord};
pub use navigation::{InMemoryNavigationGrid, NavFootprint, NavigationGrid, NavigationStats, nav_position};
pub use config::PropPlacementConfig;
pub use placer::{EnvironmentPropPlacer, PlacementStats};
