//! Harvestable resource tracking and the permanent harvested-id set

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::core::types::{Result, Vec3};
use crate::streaming::ChunkCoord;
use super::persistence;

/// Deterministic resource id: `"{chunk_x}_{chunk_z}_{prop}_{index}"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(chunk: ChunkCoord, prop: &str, index: u32) -> Self {
        Self(format!("{}_{}_{}_{}", chunk.x, chunk.z, prop, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live, unharvested resource instance of a loaded chunk
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub position: Vec3,
    pub chunk: ChunkCoord,
    pub prop: String,
    pub group: String,
    /// Enumeration index of the instance within its prop and chunk
    pub index: u32,
}

/// Registry of live resources plus the harvested-id set that survives restarts.
///
/// Owned by the prop placer and touched only from the main thread.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    harvested: HashSet<ResourceId>,
    chunks: HashMap<ChunkCoord, Vec<ResourceRecord>>,
    save_path: Option<PathBuf>,
    dirty: bool,
}

impl ResourceLedger {
    /// In-memory ledger with nothing harvested and no save file
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger backed by `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let harvested = match persistence::load_harvested(&path) {
            Ok(set) => {
                info!("Loaded {} harvested resources from {}", set.len(), path.display());
                set
            }
            Err(e) => {
                error!("Failed to load harvested resources from {}: {}", path.display(), e);
                HashSet::new()
            }
        };
        Self { harvested, save_path: Some(path), ..Self::default() }
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// False iff this instance was harvested in this or an earlier session.
    pub fn should_spawn(&self, chunk: ChunkCoord, index: u32, prop: &str) -> bool {
        !self.harvested.contains(&ResourceId::new(chunk, prop, index))
    }

    /// Track a live instance. Returns `None` (and tracks nothing) if it was
    /// already harvested.
    pub fn register(
        &mut self,
        chunk: ChunkCoord,
        position: Vec3,
        prop: &str,
        group: &str,
        index: u32,
    ) -> Option<ResourceId> {
        let id = ResourceId::new(chunk, prop, index);
        if self.harvested.contains(&id) {
            return None;
        }
        self.chunks.entry(chunk).or_default().push(ResourceRecord {
            id: id.clone(),
            position,
            chunk,
            prop: prop.to_string(),
            group: group.to_string(),
            index,
        });
        Some(id)
    }

    /// Mark a live resource harvested. Idempotent: unknown or already
    /// harvested ids return `false`.
    pub fn harvest(&mut self, id: &ResourceId) -> bool {
        self.take(id).is_some()
    }

    /// Harvest and hand back the removed record.
    pub fn take(&mut self, id: &ResourceId) -> Option<ResourceRecord> {
        if self.harvested.contains(id) {
            return None;
        }
        let (chunk, pos) = self.chunks.iter().find_map(|(chunk, records)| {
            records.iter().position(|r| &r.id == id).map(|pos| (*chunk, pos))
        })?;

        let records = self.chunks.get_mut(&chunk)?;
        let record = records.remove(pos);
        if records.is_empty() {
            self.chunks.remove(&chunk);
        }

        self.harvested.insert(id.clone());
        self.dirty = true;
        debug!("Harvested {} at {}", record.id, record.position);
        Some(record)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceRecord> {
        self.chunks.values().flatten().find(|r| &r.id == id)
    }

    pub fn is_harvested(&self, id: &ResourceId) -> bool {
        self.harvested.contains(id)
    }

    /// Enumeration indices of the live instances of `prop` in `chunk`
    pub fn surviving_indices(&self, chunk: ChunkCoord, prop: &str) -> HashSet<u32> {
        self.chunks
            .get(&chunk)
            .map(|records| records.iter().filter(|r| r.prop == prop).map(|r| r.index).collect())
            .unwrap_or_default()
    }

    pub fn chunk_resources(&self, chunk: ChunkCoord) -> &[ResourceRecord] {
        self.chunks.get(&chunk).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Forget a chunk's live records. Harvested ids are kept.
    pub fn unload_chunk(&mut self, chunk: ChunkCoord) {
        self.chunks.remove(&chunk);
    }

    /// Closest live resource of `group` strictly within `max_distance`.
    pub fn find_nearest(&self, from: Vec3, group: &str, max_distance: f32) -> Option<&ResourceRecord> {
        let limit = max_distance * max_distance;
        self.chunks
            .values()
            .flatten()
            .filter(|r| r.group == group)
            .map(|r| (from.distance_squared(r.position), r))
            .filter(|(d, _)| *d < limit)
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)))
            .map(|(_, r)| r)
    }

    /// Every live resource of `group` within `radius`, nearest first.
    pub fn find_in_radius(&self, center: Vec3, group: &str, radius: f32) -> Vec<&ResourceRecord> {
        let limit = radius * radius;
        let mut found: Vec<(f32, &ResourceRecord)> = self
            .chunks
            .values()
            .flatten()
            .filter(|r| r.group == group)
            .map(|r| (center.distance_squared(r.position), r))
            .filter(|(d, _)| *d <= limit)
            .collect();
        found.sort_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)));
        found.into_iter().map(|(_, r)| r).collect()
    }

    pub fn harvested_count(&self) -> usize {
        self.harvested.len()
    }

    pub fn loaded_resource_count(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }

    /// Whether harvests happened since the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the harvested set to the save path, if there is one.
    pub fn save(&mut self) -> Result<()> {
        let Some(path) = self.save_path.clone() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        persistence::save_harvested(path, &self.harvested)?;
        self.dirty = false;
        info!("Saved {} harvested resources to {}", self.harvested.len(), path.display());
        Ok(())
    }

    /// Replace the harvested set with the contents of `path`.
    pub fn load_from(&mut self, path: &Path) -> Result<()> {
        self.harvested = persistence::load_harvested(path)?;
        self.dirty = false;
        Ok(())
    }

    /// Forget every harvest and delete the save file.
    pub fn clear_harvested(&mut self) -> Result<()> {
        self.harvested.clear();
        self.dirty = false;
        if let Some(path) = &self.save_path {
            persistence::delete_harvested(path)?;
        }
        info!("Cleared harvested resources");
        Ok(())
    }
}
