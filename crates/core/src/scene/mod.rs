use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicU64, Ordering},
};

use glam::Vec3;
use serde::Serialize;

use crate::Color;

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a mesh inside the draw registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Primitive {
    /// One splat per position.
    Points,
    /// Consecutive positions joined by line segments.
    LineStrip,
    /// Axis aligned unit box; the transform gives it its extent.
    Box,
    /// Filled disc; the first position is the centre, the rest the rim.
    Disc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Color,
    pub opacity: f32,
    /// Point size in world units; ignored by non-point primitives.
    pub size: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            opacity: 1.0,
            size: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    /// Rotation around the vertical axis, in radians.
    pub rotation_y: f32,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation_y: 0.0,
            scale: Vec3::ONE,
        }
    }
}

/// Geometry, material and placement of one drawable.
#[derive(Debug, Clone)]
pub struct Mesh {
    id: MeshId,
    pub primitive: Primitive,
    pub positions: Vec<Vec3>,
    /// Per-position colours; when absent the material colour is used.
    pub colors: Option<Vec<Color>>,
    pub material: Material,
    pub transform: Transform,
}

impl Mesh {
    pub fn new(primitive: Primitive, positions: Vec<Vec3>) -> Self {
        Self {
            id: MeshId::next(),
            primitive,
            positions,
            colors: None,
            material: Material::default(),
            transform: Transform::default(),
        }
    }

    pub fn with_vertex_colors(mut self) -> Self {
        self.colors = Some(vec![Color::WHITE; self.positions.len()]);
        self
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Releases the geometry buffers.
    pub fn clear(&mut self) {
        self.positions = Vec::new();
        self.colors = None;
    }
}

/// Draw registry of the rendering backend.
///
/// Waveforms own their meshes; the scene only records which ones are
/// attached, along with global presentation state.
#[derive(Debug, Clone)]
pub struct Scene {
    attached: BTreeSet<MeshId>,
    background: Color,
    bloom: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            attached: BTreeSet::new(),
            background: Color::BLACK,
            bloom: false,
        }
    }

    pub fn attach(&mut self, mesh: &Mesh) {
        self.attached.insert(mesh.id());
    }

    pub fn detach(&mut self, mesh: &Mesh) {
        self.attached.remove(&mesh.id());
    }

    pub fn is_attached(&self, id: MeshId) -> bool {
        self.attached.contains(&id)
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn bloom(&self) -> bool {
        self.bloom
    }

    pub fn set_bloom(&mut self, enabled: bool) {
        self.bloom = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meshes_get_unique_ids() {
        let a = Mesh::new(Primitive::Points, vec![Vec3::ZERO]);
        let b = Mesh::new(Primitive::Points, vec![Vec3::ZERO]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn attach_and_detach_track_the_draw_list() {
        let mut scene = Scene::new();
        let mesh = Mesh::new(Primitive::LineStrip, vec![Vec3::ZERO, Vec3::X]);

        scene.attach(&mesh);
        scene.attach(&mesh);
        assert_eq!(scene.attached_count(), 1);
        assert!(scene.is_attached(mesh.id()));

        scene.detach(&mesh);
        assert_eq!(scene.attached_count(), 0);
    }

    #[test]
    fn vertex_colors_match_positions() {
        let mesh = Mesh::new(Primitive::Points, vec![Vec3::ZERO; 4]).with_vertex_colors();
        assert_eq!(mesh.colors.as_ref().map(Vec::len), Some(4));
    }
}
