//! Scene nodes and their components
//!
//! A [`Node`] carries a local [`Transform`], the resolved world matrix and
//! optional render participation. Whether a node takes part in transform
//! propagation and in rendering is fixed when it is created.

use nalgebra::Unit;

use crate::foundation::math::{Mat4, Mat4Ext, Transform, Vec3};
use crate::foundation::object::{Object, ObjectId, Shared};
use crate::render::draw_queue::MeshId;
use crate::render::material::Material;
use crate::render::transform_block::TransformMatrixBlock;
use crate::render::PassId;

use super::culling::AABB;
use super::NodeHandle;

/// Per-frame modification of a node's local transform
pub trait Animator {
    /// Advance the animation by `dt` seconds
    fn animate(&mut self, local: &mut Transform, dt: f32);
}

/// Spins a node around a fixed axis
#[derive(Debug, Clone, Copy)]
pub struct Rotator {
    axis: Unit<Vec3>,
    speed: f32,
}

impl Rotator {
    /// Rotation around `axis` at `radians_per_second`
    pub fn new(axis: Unit<Vec3>, radians_per_second: f32) -> Self {
        Self {
            axis,
            speed: radians_per_second,
        }
    }
}

impl Animator for Rotator {
    fn animate(&mut self, local: &mut Transform, dt: f32) {
        local.rotate(&self.axis, self.speed * dt);
    }
}

/// Mesh drawn by a node
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Mesh handle owned by the device
    pub mesh: MeshId,
    /// Pass the draw is queued for
    pub pass: PassId,
    /// Material, `None` draws with the pass shader only
    pub material: Option<Shared<Material>>,
    /// Per-instance matrices relative to the node, empty for a single draw
    pub instances: Vec<Mat4>,
}

impl Geometry {
    /// Geometry drawn in `pass` without a material
    pub fn new(mesh: MeshId, pass: PassId) -> Self {
        Self {
            mesh,
            pass,
            material: None,
            instances: Vec::new(),
        }
    }

    /// Attach a material
    pub fn with_material(mut self, material: Shared<Material>) -> Self {
        self.material = Some(material);
        self
    }

    /// Draw the mesh once per matrix
    pub fn with_instances(mut self, instances: Vec<Mat4>) -> Self {
        self.instances = instances;
        self
    }
}

/// Camera attached to a node
///
/// The view matrix is the inverse of the node's world transform; it is
/// published to `pass` together with the projection before the scene draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Pass receiving view and projection
    pub pass: PassId,
    /// Projection matrix
    pub projection: Mat4,
}

impl Camera {
    /// Default vertical field of view in degrees
    pub const DEFAULT_FOV: f32 = 60.0;
    /// Default near plane
    pub const DEFAULT_NEAR: f32 = 0.001;
    /// Default far plane
    pub const DEFAULT_FAR: f32 = 1000.0;

    /// Camera with an explicit projection
    pub fn new(pass: PassId, projection: Mat4) -> Self {
        Self { pass, projection }
    }

    /// Perspective camera; `fov_degrees` is the vertical field of view
    ///
    /// A zero `height` falls back to an aspect ratio of 1.
    pub fn perspective(pass: PassId, fov_degrees: f32, width: f32, height: f32, near: f32, far: f32) -> Self {
        let aspect = if height != 0.0 { width / height } else { 1.0 };
        Self::new(pass, Mat4::perspective(fov_degrees.to_radians(), aspect, near, far))
    }

    /// Orthographic camera covering `width` x `height` around the origin
    pub fn orthographic(pass: PassId, width: f32, height: f32, near: f32, far: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self::new(pass, Mat4::orthographic(-hw, hw, -hh, hh, near, far))
    }
}

/// Hierarchical scene entity
pub struct Node {
    pub(super) object: Object,
    pub(super) id: u32,
    pub(super) parent: Option<NodeHandle>,
    pub(super) children: Vec<NodeHandle>,
    pub(super) transform_enabled: bool,
    pub(super) render_enabled: bool,
    pub(super) active: bool,
    pub(super) local: Transform,
    pub(super) world: Mat4,
    pub(super) last_block: Option<TransformMatrixBlock>,
    pub(super) geometry: Vec<Geometry>,
    pub(super) camera: Option<Camera>,
    pub(super) animator: Option<Box<dyn Animator>>,
    pub(super) bounds: Option<AABB>,
}

impl Node {
    pub(super) fn new(name: &str, id: u32, transform_enabled: bool, render_enabled: bool, parent: Option<NodeHandle>) -> Self {
        Self {
            object: Object::new(name),
            id,
            parent,
            children: Vec::new(),
            transform_enabled,
            render_enabled,
            active: true,
            local: Transform::identity(),
            world: Mat4::identity(),
            last_block: None,
            geometry: Vec::new(),
            camera: None,
            animator: None,
            bounds: None,
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Identity derived from the name
    pub fn object_id(&self) -> ObjectId {
        self.object.id()
    }

    /// Id issued by the stage allocator
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Parent handle, `None` for roots
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Child handles in insertion order
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// Whether the node takes part in transform propagation
    pub fn is_transform_enabled(&self) -> bool {
        self.transform_enabled
    }

    /// Whether the node submits draws
    pub fn is_render_enabled(&self) -> bool {
        self.render_enabled
    }

    /// Whether the node and its subtree are rendered
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Local transform relative to the parent
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// World matrix resolved by the last update
    pub fn world_transform(&self) -> &Mat4 {
        &self.world
    }

    /// Matrices of the last draw this node submitted
    pub fn last_block(&self) -> Option<&TransformMatrixBlock> {
        self.last_block.as_ref()
    }

    /// Attached geometry
    pub fn geometry(&self) -> &[Geometry] {
        &self.geometry
    }

    /// Attach geometry; ignored with a warning on render-disabled nodes
    pub fn add_geometry(&mut self, geometry: Geometry) -> bool {
        if !self.render_enabled {
            log::warn!("Node '{}' is not render-enabled, geometry ignored", self.name());
            return false;
        }
        self.geometry.push(geometry);
        true
    }

    /// Attached camera
    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// Attach or replace the camera
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = Some(camera);
    }

    /// Attach or replace the animator
    pub fn set_animator(&mut self, animator: impl Animator + 'static) {
        self.animator = Some(Box::new(animator));
    }

    /// Local-space bounds used for culling
    pub fn bounds(&self) -> Option<&AABB> {
        self.bounds.as_ref()
    }

    /// Set local-space bounds
    pub fn set_bounds(&mut self, bounds: AABB) {
        self.bounds = Some(bounds);
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name())
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("transform_enabled", &self.transform_enabled)
            .field("render_enabled", &self.render_enabled)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rotator_advances_with_time() {
        let mut rotator = Rotator::new(Vec3::z_axis(), std::f32::consts::PI);
        let mut local = Transform::identity();
        rotator.animate(&mut local, 0.5);

        let rotated = local.rotation * Vec3::x();
        assert_relative_eq!(rotated, Vec3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_geometry_rejected_on_render_disabled_node() {
        let mut node = Node::new("group", 0, true, false, None);
        assert!(!node.add_geometry(Geometry::new(MeshId(1), PassId::RENDER)));
        assert!(node.geometry().is_empty());

        let mut mesh = Node::new("mesh", 1, true, true, None);
        assert!(mesh.add_geometry(Geometry::new(MeshId(1), PassId::RENDER)));
        assert_eq!(mesh.geometry().len(), 1);
    }

    #[test]
    fn test_perspective_camera_zero_height() {
        let camera = Camera::perspective(PassId::RENDER, 90.0, 800.0, 0.0, 0.1, 10.0);
        assert_relative_eq!(camera.projection[(0, 0)], camera.projection[(1, 1)], epsilon = 1e-6);
    }
}
