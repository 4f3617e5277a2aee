//! In-memory renderer that records what would be drawn

use std::collections::{HashMap, HashSet};

use image::RgbaImage;
use log::trace;

use crate::core::types::{Color, Mat4, Vec2};
use crate::streaming::ChunkCoord;
use crate::terrain::{LandSurface, WaterSurface};
use super::{ChunkRenderer, RenderHandle};

/// What a headless object stands for
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    Land,
    Water { mask: RgbaImage, height: f32 },
    PropBatch { visual: String },
}

/// A realized object
#[derive(Clone, Debug)]
pub struct HeadlessObject {
    pub coord: ChunkCoord,
    pub center: Vec2,
    pub kind: ObjectKind,
    pub transforms: Vec<Mat4>,
    pub colors: Vec<Color>,
    pub visible: bool,
}

impl HeadlessObject {
    pub fn instance_count(&self) -> usize {
        self.transforms.len()
    }
}

/// Renderer for tests, benchmarks and the headless driver.
#[derive(Default)]
pub struct HeadlessRenderer {
    objects: HashMap<RenderHandle, HeadlessObject>,
    next_handle: u64,
    /// `None` resolves every visual
    known_visuals: Option<HashSet<String>>,
    released: usize,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer that only resolves the listed visual references.
    pub fn with_visuals<I, S>(visuals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_visuals: Some(visuals.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    fn insert(&mut self, object: HeadlessObject) -> RenderHandle {
        let handle = RenderHandle(self.next_handle);
        self.next_handle += 1;
        trace!("Realized {:?} for chunk {} as {:?}", object.kind_name(), object.coord, handle);
        self.objects.insert(handle, object);
        handle
    }

    pub fn get(&self, handle: RenderHandle) -> Option<&HeadlessObject> {
        self.objects.get(&handle)
    }

    /// Live objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn visible_count(&self) -> usize {
        self.objects.values().filter(|o| o.visible).count()
    }

    /// Objects released so far
    pub fn released_count(&self) -> usize {
        self.released
    }

    pub fn objects(&self) -> impl Iterator<Item = (&RenderHandle, &HeadlessObject)> {
        self.objects.iter()
    }

    /// Live land objects
    pub fn land_count(&self) -> usize {
        self.objects.values().filter(|o| o.kind == ObjectKind::Land).count()
    }

    /// Live water quads
    pub fn water_count(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o.kind, ObjectKind::Water { .. }))
            .count()
    }

    /// Total prop instances across live batches of `visual`
    pub fn prop_instance_count(&self, visual: &str) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(&o.kind, ObjectKind::PropBatch { visual: v } if v == visual))
            .map(HeadlessObject::instance_count)
            .sum()
    }
}

impl HeadlessObject {
    fn kind_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Land => "land",
            ObjectKind::Water { .. } => "water",
            ObjectKind::PropBatch { .. } => "prop batch",
        }
    }
}

impl ChunkRenderer for HeadlessRenderer {
    fn create_land(&mut self, coord: ChunkCoord, center: Vec2, land: &LandSurface) -> RenderHandle {
        self.insert(HeadlessObject {
            coord,
            center,
            kind: ObjectKind::Land,
            transforms: land.transforms.iter().map(|t| t.to_mat4()).collect(),
            colors: land.colors.clone(),
            visible: true,
        })
    }

    fn create_water(&mut self, coord: ChunkCoord, center: Vec2, water: &WaterSurface) -> RenderHandle {
        self.insert(HeadlessObject {
            coord,
            center,
            kind: ObjectKind::Water { mask: water.mask_image(), height: water.height },
            transforms: Vec::new(),
            colors: Vec::new(),
            visible: true,
        })
    }

    fn has_visual(&self, visual: &str) -> bool {
        self.known_visuals.as_ref().is_none_or(|known| known.contains(visual))
    }

    fn create_prop_batch(&mut self, coord: ChunkCoord, visual: &str, transforms: &[Mat4]) -> RenderHandle {
        self.insert(HeadlessObject {
            coord,
            center: Vec2::ZERO,
            kind: ObjectKind::PropBatch { visual: visual.to_string() },
            transforms: transforms.to_vec(),
            colors: Vec::new(),
            visible: true,
        })
    }

    fn update_prop_batch(&mut self, handle: RenderHandle, transforms: &[Mat4]) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.transforms = transforms.to_vec();
        }
    }

    fn set_visible(&mut self, handle: RenderHandle, visible: bool) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.visible = visible;
        }
    }

    fn release(&mut self, handle: RenderHandle) {
        if self.objects.remove(&handle).is_some() {
            self.released += 1;
        }
    }
}
