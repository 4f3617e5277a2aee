//! Environment prop placement for loaded chunks.
//!
//! Every decision is a pure function of the cell's world position and the
//! prop's salts, so repopulating a chunk reproduces the same instances with
//! the same enumeration indices. Harvested instances keep their collision
//! claim while suppressed, which keeps every other outcome stable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::core::types::{Mat4, Quat, Vec2, Vec3};
use crate::math::{Aabb, Frustum};
use crate::render::{ChunkRenderer, RenderHandle};
use crate::resources::{ResourceId, ResourceLedger};
use crate::streaming::{ChunkCoord, ChunkEvent};
use crate::terrain::{TerrainGenerator, cell_center};
use super::collision::{AvoidanceTable, CollisionSet, PlacedPropRecord, collides};
use super::config::PropPlacementConfig;
use super::definition::{PlacementPattern, PropDefinition};
use super::hash::deterministic_random;
use super::navigation::{NavFootprint, NavigationGrid, NavigationStats, nav_position};

/// Cluster spread chance below which flooding stops
const CLUSTER_FLOOR: f32 = 0.01;

/// Placement counters since construction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementStats {
    pub chunks_populated: usize,
    pub spawned: usize,
    /// Accepted instances not spawned because they were harvested
    pub suppressed: usize,
    pub collision_rejected: usize,
    pub nav_registered: usize,
    pub harvested: usize,
}

/// A definition bound to this world's biomes and the renderer's visuals
struct ResolvedProp {
    def: PropDefinition,
    /// Allowed flag per biome index
    allowed: Vec<bool>,
    visuals: Vec<String>,
    salt_rot: String,
    salt_scale: String,
    salt_variant: String,
    salt_cluster: String,
}

impl ResolvedProp {
    fn eligible(&self, cell: &Candidate) -> bool {
        self.allowed.get(cell.biome).copied().unwrap_or(false) && !(self.def.avoid_beaches && cell.beach)
    }

    fn roll(&self, cell: &Candidate) -> bool {
        deterministic_random(cell.world.x, cell.world.y, &self.def.name) < self.def.probability
    }

    fn transform(&self, position: Vec3, config: &PropPlacementConfig) -> Mat4 {
        let rotation = if config.random_rotation {
            let r = deterministic_random(position.x, position.z, &self.salt_rot);
            Quat::from_rotation_y(r * std::f32::consts::TAU)
        } else {
            Quat::IDENTITY
        };
        let r = deterministic_random(position.x, position.z, &self.salt_scale);
        let factor = 1.0 + (r - 0.5) * 2.0 * config.scale_variation;
        Mat4::from_scale_rotation_translation(self.def.base_scale() * factor, rotation, position)
    }

    fn variant(&self, world: Vec2) -> usize {
        let count = self.visuals.len();
        if count <= 1 {
            return 0;
        }
        let r = deterministic_random(world.x, world.y, &self.salt_variant);
        ((r * count as f32) as usize).min(count - 1)
    }
}

/// A land cell on the sampling sub-grid
#[derive(Clone, Copy, Debug)]
struct Candidate {
    world: Vec2,
    biome: usize,
    beach: bool,
    height: f32,
}

/// Strided sub-grid of a chunk; water cells are `None`
struct CandidateGrid {
    side: usize,
    cells: Vec<Option<Candidate>>,
}

impl CandidateGrid {
    fn sample(generator: &TerrainGenerator, coord: ChunkCoord, skip: u32) -> Self {
        let size = generator.chunk_size();
        let skip = skip.max(1);
        let side = size.div_ceil(skip) as usize;
        let mut cells = Vec::with_capacity(side * side);

        for z in (0..size).step_by(skip as usize) {
            for x in (0..size).step_by(skip as usize) {
                let world = cell_center(coord, size, generator.pixel_size(), x, z);
                let sample = generator.sample_cell(world.x, world.y);
                cells.push((!sample.water).then_some(Candidate {
                    world,
                    biome: sample.biome,
                    beach: sample.beach,
                    height: sample.height,
                }));
            }
        }

        Self { side, cells }
    }

    /// 8-connected neighbours in a fixed order
    fn neighbors(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let side = self.side as i64;
        let (cx, cz) = ((cell % self.side) as i64, (cell / self.side) as i64);
        (-1..=1i64)
            .flat_map(move |dz| (-1..=1i64).map(move |dx| (cx + dx, cz + dz)))
            .filter(move |&(x, z)| (x, z) != (cx, cz) && x >= 0 && z >= 0 && x < side && z < side)
            .map(move |(x, z)| (z * side + x) as usize)
    }
}

/// One instanced batch: (prop, variant) within a chunk
struct PropBatch {
    prop: usize,
    handle: RenderHandle,
    /// (enumeration index, world transform)
    instances: Vec<(u32, Mat4)>,
}

/// Everything placed in one loaded chunk
struct PropChunk {
    batches: Vec<PropBatch>,
    nav: Vec<NavFootprint>,
    records: Vec<PlacedPropRecord>,
    visible: bool,
}

/// Mutable state of one chunk population pass
struct Population<'a> {
    coord: ChunkCoord,
    config: &'a PropPlacementConfig,
    avoidance: &'a AvoidanceTable,
    ledger: &'a mut ResourceLedger,
    nav: &'a mut dyn NavigationGrid,
    stats: &'a mut PlacementStats,
    collisions: CollisionSet,
    footprints: Vec<NavFootprint>,
}

impl Population<'_> {
    /// Collision check, enumeration, harvest suppression and registration of
    /// one candidate that already passed its probability roll. Returns whether
    /// the candidate was accepted; suppressed instances count as accepted.
    fn try_place(
        &mut self,
        pi: usize,
        prop: &ResolvedProp,
        cell: &Candidate,
        next_index: &mut u32,
        out: &mut [Vec<(u32, Mat4)>],
    ) -> bool {
        let def = &prop.def;
        if collides(def) {
            let radius = def.collision_radius();
            if !self.collisions.is_clear(self.avoidance, pi, cell.world, radius) {
                self.stats.collision_rejected += 1;
                return false;
            }
            self.collisions.insert(PlacedPropRecord { position: cell.world, prop: pi, radius });
        }

        let index = *next_index;
        *next_index += 1;

        if def.harvestable && !self.ledger.should_spawn(self.coord, index, &def.name) {
            self.stats.suppressed += 1;
            return true;
        }

        let position = Vec3::new(cell.world.x, cell.height, cell.world.y);
        out[prop.variant(cell.world)].push((index, prop.transform(position, self.config)));

        if def.harvestable {
            self.ledger.register(self.coord, position, &def.name, def.group(), index);
        }

        if self.config.register_with_navigation && def.blocks_navigation {
            let footprint = def.footprint().unwrap_or(Vec2::from(self.config.default_collision_size));
            let at = nav_position(position);
            self.nav.register_obstacle(at, footprint, &def.name);
            self.footprints.push(NavFootprint { position: at, footprint, prop: def.name.clone(), index });
            self.stats.nav_registered += 1;
        }

        self.stats.spawned += 1;
        true
    }

    fn scatter(&mut self, pi: usize, prop: &ResolvedProp, grid: &CandidateGrid, out: &mut [Vec<(u32, Mat4)>]) {
        let mut next_index = 0;
        for cell in grid.cells.iter().flatten() {
            if prop.eligible(cell) && prop.roll(cell) {
                self.try_place(pi, prop, cell, &mut next_index, out);
            }
        }
    }

    fn cluster(&mut self, pi: usize, prop: &ResolvedProp, grid: &CandidateGrid, out: &mut [Vec<(u32, Mat4)>]) {
        let def = &prop.def;
        let decay = 1.0 - def.cluster_decay_rate;
        let max_size = def.max_cluster_size.max(1);
        let mut next_index = 0;
        let mut taken = vec![false; grid.cells.len()];

        for seed in 0..grid.cells.len() {
            if taken[seed] {
                continue;
            }
            let Some(cell) = &grid.cells[seed] else {
                continue;
            };
            if !prop.eligible(cell) || !prop.roll(cell) {
                continue;
            }
            if !self.try_place(pi, prop, cell, &mut next_index, out) {
                continue;
            }
            taken[seed] = true;

            let mut size = 1;
            let mut tested = HashSet::from([seed]);
            let mut frontier = VecDeque::from([(seed, def.cluster_spread_chance)]);

            while let Some((current, chance)) = frontier.pop_front() {
                if size >= max_size {
                    break;
                }
                if chance < CLUSTER_FLOOR {
                    continue;
                }
                for next in grid.neighbors(current) {
                    if size >= max_size {
                        break;
                    }
                    if taken[next] || !tested.insert(next) {
                        continue;
                    }
                    let Some(neighbor) = &grid.cells[next] else {
                        continue;
                    };
                    if !prop.eligible(neighbor) {
                        continue;
                    }
                    if deterministic_random(neighbor.world.x, neighbor.world.y, &prop.salt_cluster) >= chance {
                        continue;
                    }
                    if self.try_place(pi, prop, neighbor, &mut next_index, out) {
                        taken[next] = true;
                        size += 1;
                        frontier.push_back((next, chance * decay));
                    }
                }
            }
        }
    }
}

/// Places biome-appropriate props on loaded chunks and tracks them until unload.
pub struct EnvironmentPropPlacer {
    config: PropPlacementConfig,
    generator: Arc<TerrainGenerator>,
    /// Resolved props in placement order (priority descending, stable)
    props: Vec<ResolvedProp>,
    avoidance: AvoidanceTable,
    ledger: ResourceLedger,
    chunks: HashMap<ChunkCoord, PropChunk>,
    pending: VecDeque<ChunkCoord>,
    stats: PlacementStats,
}

impl EnvironmentPropPlacer {
    /// Resolve prop definitions against the world's biomes and the renderer's
    /// visuals. Props left without a usable visual are skipped.
    pub fn new(
        config: PropPlacementConfig,
        generator: Arc<TerrainGenerator>,
        ledger: ResourceLedger,
        renderer: &dyn ChunkRenderer,
    ) -> Self {
        let mut config = config;
        config.validate();

        let mut defs = config.props.clone();
        defs.sort_by_key(|p| std::cmp::Reverse(p.priority));

        let classifier = generator.classifier();
        let mut props = Vec::with_capacity(defs.len());
        for def in defs {
            let mut allowed = vec![false; classifier.len()];
            for biome in &def.allowed_biomes {
                match classifier.index_of(biome) {
                    Some(i) => allowed[i] = true,
                    None => warn!("Prop '{}' references unknown biome '{}'", def.name, biome),
                }
            }
            if !allowed.contains(&true) {
                warn!("Prop '{}' is not allowed in any biome", def.name);
            }

            let (visuals, missing): (Vec<String>, Vec<String>) =
                def.visuals.iter().cloned().partition(|v| renderer.has_visual(v));
            for visual in &missing {
                warn!("Prop '{}': visual '{}' not found", def.name, visual);
            }
            if visuals.is_empty() {
                warn!("Prop '{}' has no usable visual, skipping", def.name);
                continue;
            }

            props.push(ResolvedProp {
                salt_rot: format!("{}_rot", def.name),
                salt_scale: format!("{}_scale", def.name),
                salt_variant: format!("{}_variant", def.name),
                salt_cluster: format!("{}_cluster", def.name),
                def,
                allowed,
                visuals,
            });
        }

        let definitions: Vec<PropDefinition> = props.iter().map(|p| p.def.clone()).collect();
        let avoidance = AvoidanceTable::build(&definitions);

        info!(
            "Prop placement ready: {} props, {} harvested resources on record",
            props.len(),
            ledger.harvested_count()
        );

        Self {
            config,
            generator,
            props,
            avoidance,
            ledger,
            chunks: HashMap::new(),
            pending: VecDeque::new(),
            stats: PlacementStats::default(),
        }
    }

    pub fn config(&self) -> &PropPlacementConfig {
        &self.config
    }

    /// Prop names in placement order
    pub fn placement_order(&self) -> Vec<&str> {
        self.props.iter().map(|p| p.def.name.as_str()).collect()
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    pub fn stats(&self) -> PlacementStats {
        self.stats
    }

    /// React to chunk lifecycle notifications.
    pub fn handle_events(
        &mut self,
        events: &[ChunkEvent],
        renderer: &mut dyn ChunkRenderer,
        nav: &mut dyn NavigationGrid,
    ) {
        for event in events {
            match *event {
                ChunkEvent::Loaded(coord) => self.queue_chunk(coord),
                ChunkEvent::Unloaded(coord) => {
                    self.unload_chunk(coord, renderer, nav);
                }
            }
        }
    }

    /// Schedule a loaded chunk for population.
    pub fn queue_chunk(&mut self, coord: ChunkCoord) {
        if !self.chunks.contains_key(&coord) && !self.pending.contains(&coord) {
            self.pending.push_back(coord);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Populate up to `max_prop_chunks_per_frame` queued chunks that are
    /// still loaded. Returns the number populated.
    pub fn update(
        &mut self,
        renderer: &mut dyn ChunkRenderer,
        nav: &mut dyn NavigationGrid,
        is_loaded: impl Fn(ChunkCoord) -> bool,
    ) -> usize {
        if !self.config.enabled {
            self.pending.clear();
            return 0;
        }

        let mut populated = 0;
        while populated < self.config.max_prop_chunks_per_frame {
            let Some(coord) = self.pending.pop_front() else {
                break;
            };
            if !is_loaded(coord) || self.chunks.contains_key(&coord) {
                continue;
            }
            self.populate_chunk(coord, renderer, nav);
            populated += 1;
        }
        populated
    }

    /// Place every prop on `coord` right away. Returns the number of
    /// instances spawned, or 0 if the chunk was already populated.
    pub fn populate_chunk(
        &mut self,
        coord: ChunkCoord,
        renderer: &mut dyn ChunkRenderer,
        nav: &mut dyn NavigationGrid,
    ) -> usize {
        if self.chunks.contains_key(&coord) {
            return 0;
        }
        self.pending.retain(|&c| c != coord);

        let grid = CandidateGrid::sample(&self.generator, coord, self.config.skip_interval);
        let spawned_before = self.stats.spawned;
        let mut population = Population {
            coord,
            config: &self.config,
            avoidance: &self.avoidance,
            ledger: &mut self.ledger,
            nav,
            stats: &mut self.stats,
            collisions: CollisionSet::new(self.config.min_distance),
            footprints: Vec::new(),
        };

        let mut batches = Vec::new();
        for (pi, prop) in self.props.iter().enumerate() {
            let mut placed = vec![Vec::new(); prop.visuals.len()];
            match prop.def.pattern {
                PlacementPattern::Scattered => population.scatter(pi, prop, &grid, &mut placed),
                PlacementPattern::Clustered => population.cluster(pi, prop, &grid, &mut placed),
            }

            for (variant, instances) in placed.into_iter().enumerate() {
                if instances.is_empty() {
                    continue;
                }
                let transforms: Vec<Mat4> = instances.iter().map(|(_, m)| *m).collect();
                let handle = renderer.create_prop_batch(coord, &prop.visuals[variant], &transforms);
                batches.push(PropBatch { prop: pi, handle, instances });
            }
        }

        let Population { collisions, footprints, .. } = population;
        self.stats.chunks_populated += 1;
        let spawned = self.stats.spawned - spawned_before;
        debug!(
            "Chunk {}: {} props in {} batches, {} nav obstacles",
            coord,
            spawned,
            batches.len(),
            footprints.len()
        );

        self.chunks.insert(coord, PropChunk {
            batches,
            nav: footprints,
            records: collisions.records().to_vec(),
            visible: true,
        });
        spawned
    }

    /// Release a chunk's batches and navigation footprints and drop its
    /// in-memory resource records.
    pub fn unload_chunk(
        &mut self,
        coord: ChunkCoord,
        renderer: &mut dyn ChunkRenderer,
        nav: &mut dyn NavigationGrid,
    ) -> bool {
        self.pending.retain(|&c| c != coord);
        self.ledger.unload_chunk(coord);

        let Some(chunk) = self.chunks.remove(&coord) else {
            return false;
        };
        for batch in &chunk.batches {
            renderer.release(batch.handle);
        }
        for footprint in &chunk.nav {
            nav.unregister_obstacle(footprint.position, footprint.footprint);
        }
        debug!("Unloaded props of chunk {} ({} nav obstacles)", coord, chunk.nav.len());
        true
    }

    /// Harvest a live resource: record it permanently, shrink its batch to the
    /// surviving instances and free its navigation footprint.
    pub fn harvest(
        &mut self,
        id: &ResourceId,
        renderer: &mut dyn ChunkRenderer,
        nav: &mut dyn NavigationGrid,
    ) -> bool {
        let Some(record) = self.ledger.take(id) else {
            return false;
        };
        self.stats.harvested += 1;

        let surviving = self.ledger.surviving_indices(record.chunk, &record.prop);
        let props = &self.props;
        if let Some(chunk) = self.chunks.get_mut(&record.chunk) {
            for batch in chunk
                .batches
                .iter_mut()
                .filter(|b| props[b.prop].def.name == record.prop)
            {
                let before = batch.instances.len();
                batch.instances.retain(|(index, _)| surviving.contains(index));
                if batch.instances.len() != before {
                    let transforms: Vec<Mat4> = batch.instances.iter().map(|(_, m)| *m).collect();
                    renderer.update_prop_batch(batch.handle, &transforms);
                }
            }

            if let Some(i) = chunk
                .nav
                .iter()
                .position(|f| f.prop == record.prop && f.index == record.index)
            {
                let footprint = chunk.nav.swap_remove(i);
                nav.unregister_obstacle(footprint.position, footprint.footprint);
            }
        }

        info!("Harvested {} ({}) at {}", record.prop, record.id, record.position);
        true
    }

    /// Toggle each chunk's batches by its column's frustum test.
    pub fn update_visibility(&mut self, frustum: &Frustum, renderer: &mut dyn ChunkRenderer) -> usize {
        if !self.config.prop_culling {
            return self.chunks.len();
        }

        let size = self.generator.chunk_world_size();
        let half_height = self.generator.max_height() + self.config.cull_height;
        let mut visible = 0;
        for (coord, chunk) in &mut self.chunks {
            let origin = coord.world_origin(size);
            let bounds = Aabb::column(origin.x, origin.y, size, half_height);
            let now_visible = frustum.intersects_aabb(&bounds);
            if now_visible != chunk.visible {
                chunk.visible = now_visible;
                for batch in &chunk.batches {
                    renderer.set_visible(batch.handle, now_visible);
                }
            }
            if now_visible {
                visible += 1;
            }
        }
        visible
    }

    /// Unregister footprints of chunks that are no longer loaded. Returns the
    /// number of orphaned chunks cleaned.
    pub fn verify_navigation_sync(
        &mut self,
        nav: &mut dyn NavigationGrid,
        is_loaded: impl Fn(ChunkCoord) -> bool,
    ) -> usize {
        let mut orphaned = 0;
        for (coord, chunk) in &mut self.chunks {
            if is_loaded(*coord) || chunk.nav.is_empty() {
                continue;
            }
            for footprint in chunk.nav.drain(..) {
                nav.unregister_obstacle(footprint.position, footprint.footprint);
            }
            info!("Cleaned orphaned navigation data for chunk {}", coord);
            orphaned += 1;
        }
        orphaned
    }

    pub fn navigation_stats(&self, nav: &dyn NavigationGrid) -> NavigationStats {
        NavigationStats {
            loaded_prop_chunks: self.chunks.len(),
            nav_chunks: self.chunks.values().filter(|c| !c.nav.is_empty()).count(),
            total_nav_props: self.chunks.values().map(|c| c.nav.len()).sum(),
            blocked: nav.blocked_count(),
        }
    }

    /// Unload every populated chunk and drop the queue.
    pub fn clear_all(&mut self, renderer: &mut dyn ChunkRenderer, nav: &mut dyn NavigationGrid) {
        let coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        for coord in coords {
            self.unload_chunk(coord, renderer, nav);
        }
        self.pending.clear();
    }

    pub fn loaded_prop_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_populated(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Live instances of `prop` in `coord`, ordered by enumeration index
    pub fn instances(&self, coord: ChunkCoord, prop: &str) -> Vec<(u32, Mat4)> {
        let mut instances: Vec<(u32, Mat4)> = self
            .chunks
            .get(&coord)
            .into_iter()
            .flat_map(|c| c.batches.iter())
            .filter(|b| self.props[b.prop].def.name == prop)
            .flat_map(|b| b.instances.iter().copied())
            .collect();
        instances.sort_by_key(|(index, _)| *index);
        instances
    }

    /// Collision records claimed in `coord` during its population
    pub fn placed_records(&self, coord: ChunkCoord) -> &[PlacedPropRecord] {
        self.chunks.get(&coord).map(|c| c.records.as_slice()).unwrap_or(&[])
    }
}
