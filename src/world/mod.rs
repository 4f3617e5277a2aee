//! Per-frame facade tying streaming, prop placement and resources together

pub mod config;

pub use config::WorldConfig;

use std::sync::Arc;

use log::{debug, error, info};

use crate::core::types::{Result, Vec3};
use crate::math::Frustum;
use crate::props::{EnvironmentPropPlacer, InMemoryNavigationGrid, NavigationGrid, NavigationStats};
use crate::render::{ChunkRenderer, HeadlessRenderer};
use crate::resources::{ResourceId, ResourceLedger, ResourceRecord};
use crate::streaming::{ChunkLifecycleManager, FrameStats};
use crate::terrain::TerrainGenerator;

/// Frames between navigation consistency sweeps
const NAV_SYNC_INTERVAL: u64 = 300;

/// What one [`World::update`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldFrame {
    pub streaming: FrameStats,
    /// Chunks that received their props this frame
    pub props_populated: usize,
}

/// A streamed world around one viewpoint.
///
/// Owns the renderer and navigation grid it feeds. The harvested-resource
/// ledger is saved on drop if it has unsaved harvests.
pub struct World<R: ChunkRenderer = HeadlessRenderer, N: NavigationGrid = InMemoryNavigationGrid> {
    generator: Arc<TerrainGenerator>,
    lifecycle: ChunkLifecycleManager,
    placer: EnvironmentPropPlacer,
    renderer: R,
    nav: N,
    frame: u64,
}

impl World {
    /// World rendered into a [`HeadlessRenderer`] with an in-memory navigation grid
    pub fn headless(config: WorldConfig) -> Result<Self> {
        Self::new(config, HeadlessRenderer::new(), InMemoryNavigationGrid::new())
    }
}

impl<R: ChunkRenderer, N: NavigationGrid> World<R, N> {
    pub fn new(config: WorldConfig, renderer: R, nav: N) -> Result<Self> {
        let mut config = config;
        config.validate();

        let generator = Arc::new(TerrainGenerator::new(&config.terrain));
        let lifecycle = ChunkLifecycleManager::new(config.streaming, generator.clone())?;
        let ledger = match &config.ledger_path {
            Some(path) => ResourceLedger::open(path),
            None => ResourceLedger::new(),
        };
        let placer = EnvironmentPropPlacer::new(config.props, generator.clone(), ledger, &renderer);

        info!(
            "World ready: {}x{} cells per chunk, {} biomes",
            generator.chunk_size(),
            generator.chunk_size(),
            generator.classifier().len()
        );

        Ok(Self { generator, lifecycle, placer, renderer, nav, frame: 0 })
    }

    /// Advance one frame: stream chunks around `viewpoint`, populate props on
    /// newly loaded chunks, and cull by `frustum` when given.
    pub fn update(&mut self, viewpoint: Vec3, frustum: Option<&Frustum>) -> WorldFrame {
        let streaming = self.lifecycle.update(viewpoint, frustum, &mut self.renderer);
        self.dispatch_events();

        let lifecycle = &self.lifecycle;
        let props_populated = self
            .placer
            .update(&mut self.renderer, &mut self.nav, |c| lifecycle.is_loaded(c));

        if let Some(frustum) = frustum {
            self.placer.update_visibility(frustum, &mut self.renderer);
        }

        self.frame += 1;
        if self.frame % NAV_SYNC_INTERVAL == 0 {
            let lifecycle = &self.lifecycle;
            let orphaned = self.placer.verify_navigation_sync(&mut self.nav, |c| lifecycle.is_loaded(c));
            if orphaned > 0 {
                debug!("Navigation sweep removed {} orphaned chunks", orphaned);
            }
        }

        WorldFrame { streaming, props_populated }
    }

    fn dispatch_events(&mut self) {
        let events = self.lifecycle.take_events();
        if !events.is_empty() {
            self.placer.handle_events(&events, &mut self.renderer, &mut self.nav);
        }
    }

    /// Start or stop streaming. Stopping clears the world.
    pub fn set_active(&mut self, active: bool) {
        self.lifecycle.set_active(active, &mut self.renderer);
        self.dispatch_events();
        if !active {
            self.placer.clear_all(&mut self.renderer, &mut self.nav);
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn harvest(&mut self, id: &ResourceId) -> bool {
        self.placer.harvest(id, &mut self.renderer, &mut self.nav)
    }

    /// Harvest the closest live resource of `group` within `max_distance`.
    pub fn harvest_nearest(&mut self, from: Vec3, group: &str, max_distance: f32) -> Option<ResourceId> {
        let id = self.placer.ledger().find_nearest(from, group, max_distance)?.id.clone();
        self.harvest(&id).then_some(id)
    }

    pub fn find_nearest(&self, from: Vec3, group: &str, max_distance: f32) -> Option<&ResourceRecord> {
        self.placer.ledger().find_nearest(from, group, max_distance)
    }

    /// Persist the harvested set if the ledger has a save path.
    pub fn save(&mut self) -> Result<()> {
        self.placer.ledger_mut().save()
    }

    pub fn generator(&self) -> &Arc<TerrainGenerator> {
        &self.generator
    }

    pub fn lifecycle(&self) -> &ChunkLifecycleManager {
        &self.lifecycle
    }

    pub fn placer(&self) -> &EnvironmentPropPlacer {
        &self.placer
    }

    pub fn ledger(&self) -> &ResourceLedger {
        self.placer.ledger()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn nav(&self) -> &N {
        &self.nav
    }

    pub fn navigation_stats(&self) -> NavigationStats {
        self.placer.navigation_stats(&self.nav)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}

impl<R: ChunkRenderer, N: NavigationGrid> Drop for World<R, N> {
    fn drop(&mut self) {
        if self.placer.ledger().is_dirty() {
            if let Err(e) = self.save() {
                error!("Failed to save harvested resources: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use crate::props::{PropDefinition, PropPlacementConfig};
    use crate::streaming::{ChunkCoord, StreamingConfig};
    use crate::terrain::{TerrainConfig, default_biomes};

    const CENTER: Vec3 = Vec3::new(4.0, 0.0, 4.0);

    fn config(ledger_path: Option<&Path>) -> WorldConfig {
        let biomes = default_biomes();
        let names: Vec<String> = biomes.iter().map(|b| b.name.clone()).collect();
        WorldConfig {
            terrain: TerrainConfig { chunk_size: 8, enable_water: false, biomes, ..TerrainConfig::default() },
            streaming: StreamingConfig {
                render_distance: 1,
                unload_distance: 2,
                max_concurrent_jobs: 2,
                max_commits_per_frame: 4,
                frustum_culling: false,
            },
            props: PropPlacementConfig {
                props: vec![
                    PropDefinition::new("stone")
                        .with_biomes(names)
                        .with_probability(0.5)
                        .with_collision_size(1.0, 1.0)
                        .harvestable(),
                ],
                ..PropPlacementConfig::default()
            },
            ledger_path: ledger_path.map(Path::to_path_buf),
        }
    }

    /// Tick until `done` holds or the timeout expires.
    fn pump(world: &mut World, viewpoint: Vec3, done: impl Fn(&World) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(world) && Instant::now() < deadline {
            world.update(viewpoint, None);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_props_follow_loaded_chunks() {
        let mut world = World::headless(config(None)).unwrap();
        pump(&mut world, CENTER, |w| w.placer().loaded_prop_chunk_count() == 9);

        assert_eq!(world.lifecycle().loaded_chunk_count(), 9);
        assert_eq!(world.placer().loaded_prop_chunk_count(), 9);
        assert!(world.ledger().loaded_resource_count() > 0);
        assert_eq!(world.nav().obstacle_count(), world.ledger().loaded_resource_count());
        assert!(world.renderer().prop_instance_count("stone") > 0);

        // Walk far enough that the origin chunk leaves the unload distance
        let far = Vec3::new(84.0, 0.0, 4.0);
        pump(&mut world, far, |w| {
            w.placer().loaded_prop_chunk_count() == 9 && !w.placer().is_populated(ChunkCoord::new(0, 0))
        });
        assert!(!world.lifecycle().is_loaded(ChunkCoord::new(0, 0)));
        assert!(!world.placer().is_populated(ChunkCoord::new(0, 0)));
        assert!(world.ledger().chunk_resources(ChunkCoord::new(0, 0)).is_empty());
        assert!(world.renderer().objects().all(|(_, o)| o.coord.x >= 9));
    }

    #[test]
    fn test_harvest_persists_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvested.json");

        let harvested = {
            let mut world = World::headless(config(Some(&path))).unwrap();
            pump(&mut world, CENTER, |w| w.placer().loaded_prop_chunk_count() == 9);
            let before = world.renderer().prop_instance_count("stone");

            let id = world.harvest_nearest(CENTER, "stone", 100.0).unwrap();
            assert!(world.ledger().is_harvested(&id));
            assert!(!world.harvest(&id));
            assert_eq!(world.renderer().prop_instance_count("stone"), before - 1);
            id
            // Dropped with an unsaved harvest
        };
        assert!(path.exists());

        let mut world = World::headless(config(Some(&path))).unwrap();
        assert_eq!(world.ledger().harvested_count(), 1);
        assert!(world.ledger().is_harvested(&harvested));
        pump(&mut world, CENTER, |w| w.placer().loaded_prop_chunk_count() == 9);
        assert!(world.ledger().get(&harvested).is_none());
        assert_eq!(world.placer().stats().suppressed, 1);
    }

    #[test]
    fn test_deactivate_clears_everything() {
        let mut world = World::headless(config(None)).unwrap();
        pump(&mut world, CENTER, |w| w.placer().loaded_prop_chunk_count() == 9);

        world.set_active(false);
        assert!(!world.is_active());
        assert_eq!(world.renderer().object_count(), 0);
        assert_eq!(world.nav().obstacle_count(), 0);
        assert_eq!(world.placer().loaded_prop_chunk_count(), 0);
        assert_eq!(world.ledger().loaded_resource_count(), 0);

        let frame = world.update(CENTER, None);
        assert_eq!(frame, WorldFrame::default());

        world.set_active(true);
        pump(&mut world, CENTER, |w| w.placer().loaded_prop_chunk_count() == 9);
        assert_eq!(world.lifecycle().loaded_chunk_count(), 9);
    }
}
