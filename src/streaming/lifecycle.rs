//! Chunk lifecycle: which chunks exist, when they are generated, committed,
//! culled and dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::{debug, error, info, warn};

use crate::core::types::{Result, Vec3};
use crate::math::{Aabb, Frustum};
use crate::render::{ChunkRenderer, RenderHandle};
use crate::terrain::{LandSurface, TerrainGenerator, WaterSurface};
use super::chunk_loader::{ChunkPayload, GenerationPool, JOB_GENERATING, JobOutcome, JobState};
use super::config::StreamingConfig;
use super::coord::ChunkCoord;

/// Per-coordinate load state. A coordinate with no state is not loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Dispatched, waiting for a pool slot
    Queued,
    /// Admitted to the pool, generating
    Generating,
    /// Committed to the renderer
    Loaded,
    /// Handles being released
    Unloading,
}

/// A committed chunk
#[derive(Debug)]
pub struct ChunkRecord {
    pub coord: ChunkCoord,
    pub land: LandSurface,
    pub water: Option<WaterSurface>,
    pub land_handle: RenderHandle,
    pub water_handle: Option<RenderHandle>,
    pub state: LoadState,
    pub visible: bool,
    pub bounds: Aabb,
}

impl ChunkRecord {
    fn handles(&self) -> impl Iterator<Item = RenderHandle> + '_ {
        std::iter::once(self.land_handle).chain(self.water_handle)
    }
}

/// Lifecycle notifications for downstream consumers such as prop placement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    Loaded(ChunkCoord),
    Unloaded(ChunkCoord),
}

/// Per-frame counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// New generation jobs
    pub dispatched: usize,
    /// Chunks committed to the renderer
    pub committed: usize,
    /// Chunks dropped
    pub unloaded: usize,
    /// Payloads that failed validation or generation
    pub rejected: usize,
    /// Results thrown away: cancelled, from an old epoch, or out of range
    pub discarded: usize,
}

/// Owns the loaded-chunk table and the in-flight set; all of it is mutated
/// only from the thread that calls [`update`](Self::update).
pub struct ChunkLifecycleManager {
    config: StreamingConfig,
    pool: GenerationPool,
    loaded: HashMap<ChunkCoord, ChunkRecord>,
    loading: HashMap<ChunkCoord, JobState>,
    viewpoint_chunk: Option<ChunkCoord>,
    active: bool,
    events: Vec<ChunkEvent>,
}

impl ChunkLifecycleManager {
    pub fn new(config: StreamingConfig, generator: Arc<TerrainGenerator>) -> Result<Self> {
        let mut config = config;
        config.validate();
        let pool = GenerationPool::new(generator, config.max_concurrent_jobs)?;

        info!(
            "Chunk streaming ready: render distance {}, unload distance {}, {} workers",
            config.render_distance, config.unload_distance, config.max_concurrent_jobs
        );

        Ok(Self {
            config,
            pool,
            loaded: HashMap::new(),
            loading: HashMap::new(),
            viewpoint_chunk: None,
            active: true,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn generator(&self) -> &Arc<TerrainGenerator> {
        self.pool.generator()
    }

    /// Per-frame tick: retarget on viewpoint chunk change, commit finished
    /// chunks, cull by `frustum` when given.
    pub fn update(
        &mut self,
        viewpoint: Vec3,
        frustum: Option<&Frustum>,
        renderer: &mut dyn ChunkRenderer,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        if !self.active {
            return stats;
        }

        let current = self.generator().world_to_chunk(viewpoint);
        if self.viewpoint_chunk != Some(current) {
            debug!("Viewpoint entered chunk {}", current);
            self.viewpoint_chunk = Some(current);
            stats.unloaded = self.unload_distant(renderer);
            stats.dispatched = self.request_targets(current);
        }

        self.drain_results(renderer, &mut stats);

        if self.config.frustum_culling {
            if let Some(frustum) = frustum {
                self.update_visibility(frustum, renderer);
            }
        }

        stats
    }

    /// Dispatch every coordinate in render distance of `center` that is
    /// neither loaded nor in flight, nearest first.
    fn request_targets(&mut self, center: ChunkCoord) -> usize {
        let mut targets: Vec<ChunkCoord> = center
            .square(self.config.render_distance)
            .filter(|c| !self.loaded.contains_key(c) && !self.loading.contains_key(c))
            .collect();
        targets.sort_by_key(|c| c.distance_squared(center));

        targets.into_iter().filter(|&c| self.request_chunk(c)).count()
    }

    /// Dispatch generation of `coord`. Returns `false` when the coordinate is
    /// already loaded or in flight, or streaming is inactive.
    pub fn request_chunk(&mut self, coord: ChunkCoord) -> bool {
        if !self.active || self.loaded.contains_key(&coord) || self.loading.contains_key(&coord) {
            return false;
        }
        let state = self.pool.dispatch(coord);
        self.loading.insert(coord, state);
        true
    }

    fn drain_results(&mut self, renderer: &mut dyn ChunkRenderer, stats: &mut FrameStats) {
        while stats.committed < self.config.max_commits_per_frame {
            let Some(result) = self.pool.try_recv() else {
                break;
            };

            if result.epoch != self.pool.epoch() {
                stats.discarded += 1;
                continue;
            }
            self.apply_outcome(result.outcome, renderer, stats);
        }
    }

    /// Settle one current-epoch job. Rejected and failed coordinates are left
    /// unloaded and not in flight, so the next retarget requests them again.
    fn apply_outcome(&mut self, outcome: JobOutcome, renderer: &mut dyn ChunkRenderer, stats: &mut FrameStats) {
        let coord = outcome.coord();
        self.loading.remove(&coord);

        match outcome {
            JobOutcome::Generated(payload) => {
                if !self.in_unload_range(coord) || self.loaded.contains_key(&coord) {
                    debug!("Discarding generated chunk {}", coord);
                    stats.discarded += 1;
                    return;
                }
                match self.commit(payload, renderer) {
                    Ok(()) => stats.committed += 1,
                    Err(e) => {
                        error!("Rejected chunk payload: {}", e);
                        stats.rejected += 1;
                    }
                }
            }
            JobOutcome::Cancelled(_) => stats.discarded += 1,
            JobOutcome::Failed(_, reason) => {
                error!("Generation of chunk {} failed: {}", coord, reason);
                stats.rejected += 1;
            }
        }
    }

    fn in_unload_range(&self, coord: ChunkCoord) -> bool {
        self.viewpoint_chunk
            .is_none_or(|center| center.chebyshev_distance(coord) <= self.config.unload_distance)
    }

    /// Validate a payload and realize it. Nothing reaches the renderer when
    /// validation fails.
    fn commit(&mut self, payload: ChunkPayload, renderer: &mut dyn ChunkRenderer) -> Result<()> {
        let ChunkPayload { coord, land, water } = payload;
        let generator = self.pool.generator();

        let water_cells = water.as_ref().map_or(0, WaterSurface::water_cell_count);
        land.validate(coord, generator.cell_count() - water_cells)?;

        let size = generator.chunk_world_size();
        let center = coord.world_center(size);
        let origin = coord.world_origin(size);
        let half_height = generator.max_height().max(generator.water_height().abs()) + 1.0;
        let bounds = Aabb::column(origin.x, origin.y, size, half_height);

        let land_handle = renderer.create_land(coord, center, &land);
        let water_handle = water
            .as_ref()
            .filter(|w| w.has_water())
            .map(|w| renderer.create_water(coord, center, w));

        debug!("Loaded chunk {} ({} land cells, {} water cells)", coord, land.len(), water_cells);
        self.loaded.insert(coord, ChunkRecord {
            coord,
            land,
            water,
            land_handle,
            water_handle,
            state: LoadState::Loaded,
            visible: true,
            bounds,
        });
        self.events.push(ChunkEvent::Loaded(coord));
        Ok(())
    }

    /// Unload every chunk beyond unload distance of the viewpoint chunk.
    fn unload_distant(&mut self, renderer: &mut dyn ChunkRenderer) -> usize {
        let distant: Vec<ChunkCoord> = self
            .loaded
            .keys()
            .copied()
            .filter(|&c| !self.in_unload_range(c))
            .collect();

        distant.into_iter().filter(|&c| self.unload_chunk(c, renderer)).count()
    }

    /// Release a loaded chunk's render handles and drop its record.
    pub fn unload_chunk(&mut self, coord: ChunkCoord, renderer: &mut dyn ChunkRenderer) -> bool {
        let Some(mut record) = self.loaded.remove(&coord) else {
            return false;
        };
        record.state = LoadState::Unloading;
        for handle in record.handles() {
            renderer.release(handle);
        }
        debug!("Unloaded chunk {}", coord);
        self.events.push(ChunkEvent::Unloaded(coord));
        true
    }

    /// Toggle renderer visibility by frustum test without changing load state.
    pub fn update_visibility(&mut self, frustum: &Frustum, renderer: &mut dyn ChunkRenderer) -> usize {
        let mut visible = 0;
        for record in self.loaded.values_mut() {
            let now_visible = frustum.intersects_aabb(&record.bounds);
            if now_visible != record.visible {
                record.visible = now_visible;
                for handle in record.handles() {
                    renderer.set_visible(handle, now_visible);
                }
            }
            if now_visible {
                visible += 1;
            }
        }
        visible
    }

    /// Activate or deactivate streaming. Deactivation cancels all jobs and
    /// clears the world.
    pub fn set_active(&mut self, active: bool, renderer: &mut dyn ChunkRenderer) {
        if active == self.active {
            return;
        }
        self.active = active;
        if active {
            info!("Chunk streaming activated");
        } else {
            self.clear_world(renderer);
            info!("Chunk streaming deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Release every chunk and cancel in-flight jobs. Their results arrive
    /// in a retired epoch and are discarded.
    pub fn clear_world(&mut self, renderer: &mut dyn ChunkRenderer) {
        let coords: Vec<ChunkCoord> = self.loaded.keys().copied().collect();
        for coord in coords {
            self.unload_chunk(coord, renderer);
        }
        if !self.loading.is_empty() {
            warn!("Clearing world with {} chunks still generating", self.loading.len());
            self.pool.cancel_all();
            self.loading.clear();
        }
        self.viewpoint_chunk = None;
    }

    /// Take the load/unload notifications accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<ChunkEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn load_state(&self, coord: ChunkCoord) -> Option<LoadState> {
        if let Some(record) = self.loaded.get(&coord) {
            return Some(record.state);
        }
        self.loading.get(&coord).map(|state| {
            if state.load(Ordering::Acquire) >= JOB_GENERATING {
                LoadState::Generating
            } else {
                LoadState::Queued
            }
        })
    }

    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains_key(&coord)
    }

    pub fn is_visible(&self, coord: ChunkCoord) -> bool {
        self.loaded.get(&coord).is_some_and(|r| r.visible)
    }

    pub fn record(&self, coord: ChunkCoord) -> Option<&ChunkRecord> {
        self.loaded.get(&coord)
    }

    pub fn loaded_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.loaded.keys().copied()
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn loading_chunk_count(&self) -> usize {
        self.loading.len()
    }

    pub fn viewpoint_chunk(&self) -> Option<ChunkCoord> {
        self.viewpoint_chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use crate::core::types::Color;
    use crate::render::HeadlessRenderer;
    use crate::terrain::TerrainConfig;

    fn manager(render_distance: u32, unload_distance: u32) -> ChunkLifecycleManager {
        let terrain = TerrainConfig { chunk_size: 8, ..TerrainConfig::default() };
        let config = StreamingConfig {
            render_distance,
            unload_distance,
            max_concurrent_jobs: 2,
            max_commits_per_frame: 4,
            frustum_culling: false,
        };
        ChunkLifecycleManager::new(config, Arc::new(TerrainGenerator::new(&terrain))).unwrap()
    }

    /// Tick until `done` holds or the timeout expires.
    fn pump(
        manager: &mut ChunkLifecycleManager,
        renderer: &mut HeadlessRenderer,
        viewpoint: Vec3,
        done: impl Fn(&ChunkLifecycleManager) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(manager) && Instant::now() < deadline {
            manager.update(viewpoint, None, renderer);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_loads_square_around_viewpoint() {
        let mut manager = manager(1, 2);
        let mut renderer = HeadlessRenderer::new();

        let stats = manager.update(Vec3::new(4.0, 0.0, 4.0), None, &mut renderer);
        assert_eq!(stats.dispatched, 9);
        assert_eq!(manager.viewpoint_chunk(), Some(ChunkCoord::new(0, 0)));

        pump(&mut manager, &mut renderer, Vec3::new(4.0, 0.0, 4.0), |m| m.loaded_chunk_count() == 9);
        assert_eq!(manager.loaded_chunk_count(), 9);
        assert_eq!(manager.loading_chunk_count(), 0);
        assert_eq!(renderer.land_count(), 9);
        assert_eq!(manager.load_state(ChunkCoord::new(-1, 1)), Some(LoadState::Loaded));
        assert_eq!(manager.load_state(ChunkCoord::new(5, 5)), None);

        let events = manager.take_events();
        assert_eq!(events.len(), 9);
        assert!(events.iter().all(|e| matches!(e, ChunkEvent::Loaded(_))));
    }

    #[test]
    fn test_single_flight_request() {
        let mut manager = manager(1, 2);
        let coord = ChunkCoord::new(3, 3);

        assert!(manager.request_chunk(coord));
        assert!(!manager.request_chunk(coord));
        assert_eq!(manager.loading_chunk_count(), 1);
        assert!(matches!(
            manager.load_state(coord),
            Some(LoadState::Queued) | Some(LoadState::Generating)
        ));
    }

    #[test]
    fn test_commit_throttle() {
        let mut manager = manager(2, 3);
        manager.config.max_commits_per_frame = 1;
        let mut renderer = HeadlessRenderer::new();

        let mut stats = manager.update(Vec3::ZERO, None, &mut renderer);
        assert_eq!(stats.dispatched, 25);
        let deadline = Instant::now() + Duration::from_secs(10);
        while stats.committed == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            stats = manager.update(Vec3::ZERO, None, &mut renderer);
        }
        assert_eq!(stats.committed, 1);
        assert_eq!(manager.loaded_chunk_count(), 1);
        assert_eq!(renderer.land_count(), 1);
    }

    #[test]
    fn test_clear_world_cancels_in_flight_jobs() {
        let mut manager = manager(1, 2);
        let mut renderer = HeadlessRenderer::new();
        let coord = ChunkCoord::new(0, 0);

        assert!(manager.request_chunk(coord));
        manager.clear_world(&mut renderer);
        assert_eq!(manager.loading_chunk_count(), 0);
        assert!(manager.request_chunk(coord));

        let epoch = manager.pool.epoch();
        assert_eq!(epoch, 1);

        let mut received = 0;
        let mut generated_now = 0;
        let deadline = Instant::now() + Duration::from_secs(10);
        while received < 2 && Instant::now() < deadline {
            match manager.pool.try_recv() {
                Some(result) => {
                    received += 1;
                    assert_eq!(result.outcome.coord(), coord);
                    if result.epoch == epoch && matches!(result.outcome, JobOutcome::Generated(_)) {
                        generated_now += 1;
                    }
                }
                None => std::thread::sleep(Duration::from_millis(2)),
            }
        }
        assert_eq!(received, 2);
        assert_eq!(generated_now, 1);
    }

    #[test]
    fn test_rejected_payload_stays_retriable() {
        let mut manager = manager(1, 2);
        let mut renderer = HeadlessRenderer::new();
        let coord = ChunkCoord::new(2, -1);

        let generator = Arc::clone(manager.generator());
        let mut land = generator.generate_land(coord);
        land.colors.push(Color::WHITE);
        let payload = ChunkPayload { coord, land, water: generator.generate_water(coord) };

        let mut stats = FrameStats::default();
        manager.apply_outcome(JobOutcome::Generated(payload), &mut renderer, &mut stats);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.committed, 0);
        assert_eq!(renderer.object_count(), 0);
        assert_eq!(manager.load_state(coord), None);
        assert!(manager.take_events().is_empty());

        assert!(manager.request_chunk(coord));
        pump(&mut manager, &mut renderer, Vec3::new(20.0, 0.0, -4.0), |m| m.is_loaded(coord));
        assert_eq!(manager.load_state(coord), Some(LoadState::Loaded));
    }

    #[test]
    fn test_failed_and_cancelled_jobs() {
        let mut manager = manager(1, 2);
        let mut renderer = HeadlessRenderer::new();
        let coord = ChunkCoord::new(5, 5);

        assert!(manager.request_chunk(coord));
        let mut stats = FrameStats::default();
        manager.apply_outcome(JobOutcome::Failed(coord, "worker panicked".to_string()), &mut renderer, &mut stats);
        assert_eq!(stats.rejected, 1);
        assert_eq!(manager.load_state(coord), None);
        assert_eq!(manager.loading_chunk_count(), 0);

        assert!(manager.request_chunk(coord));
        manager.apply_outcome(JobOutcome::Cancelled(coord), &mut renderer, &mut stats);
        assert_eq!(stats.discarded, 1);
        assert_eq!(manager.load_state(coord), None);
        assert_eq!(renderer.object_count(), 0);
    }

    #[test]
    fn test_unload_count_decreases_exactly() {
        let mut manager = manager(1, 1);
        let mut renderer = HeadlessRenderer::new();
        let start = Vec3::new(4.0, 0.0, 4.0);
        pump(&mut manager, &mut renderer, start, |m| m.loaded_chunk_count() == 9);
        assert_eq!(manager.loaded_chunk_count(), 9);

        // One chunk east: the x = -1 column is now two chunks away
        let stats = manager.update(Vec3::new(12.0, 0.0, 4.0), None, &mut renderer);
        assert_eq!(stats.unloaded, 3);
        assert_eq!(manager.loaded_chunk_count(), 6);
        assert!(renderer.released_count() >= 3);

        let before = manager.loaded_chunk_count();
        assert!(manager.unload_chunk(ChunkCoord::new(0, 0), &mut renderer));
        assert!(!manager.unload_chunk(ChunkCoord::new(0, 0), &mut renderer));
        assert_eq!(manager.loaded_chunk_count(), before - 1);
    }

    #[test]
    fn test_deactivate_clears_world() {
        let mut manager = manager(1, 2);
        let mut renderer = HeadlessRenderer::new();
        let origin = Vec3::new(4.0, 0.0, 4.0);
        pump(&mut manager, &mut renderer, origin, |m| m.loaded_chunk_count() == 9);

        manager.set_active(false, &mut renderer);
        assert_eq!(manager.loaded_chunk_count(), 0);
        assert_eq!(manager.loading_chunk_count(), 0);
        assert_eq!(renderer.object_count(), 0);
        assert!(!manager.request_chunk(ChunkCoord::new(0, 0)));
        assert_eq!(manager.update(origin, None, &mut renderer), FrameStats::default());

        manager.set_active(true, &mut renderer);
        pump(&mut manager, &mut renderer, origin, |m| m.loaded_chunk_count() == 9);
        assert_eq!(manager.loaded_chunk_count(), 9);
    }

    #[test]
    fn test_frustum_culling_toggles_visibility() {
        let mut manager = manager(1, 2);
        let mut renderer = HeadlessRenderer::new();
        let origin = Vec3::new(4.0, 0.0, 4.0);
        pump(&mut manager, &mut renderer, origin, |m| m.loaded_chunk_count() == 9);

        // Camera high above the far +z side looking further along +z
        let view = crate::core::types::Mat4::look_at_rh(
            Vec3::new(4.0, 5.0, 100.0),
            Vec3::new(4.0, 5.0, 200.0),
            Vec3::Y,
        );
        let proj = crate::core::types::Mat4::perspective_rh(1.0, 1.0, 0.1, 500.0);
        let frustum = Frustum::from_view_projection(&(proj * view));

        let visible = manager.update_visibility(&frustum, &mut renderer);
        assert_eq!(visible, 0);
        assert_eq!(manager.loaded_chunk_count(), 9);
        assert!(!manager.is_visible(ChunkCoord::new(0, 0)));
        assert_eq!(renderer.visible_count(), 0);
    }
}
