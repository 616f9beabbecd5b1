//! Stage: the node arena of one scene
//!
//! The stage owns every node. Parent and child links are handles into the
//! arena, so a node can never outlive the stage and destroying a node
//! removes its whole subtree, children first.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::config::RenderCoreConfig;
use crate::foundation::ids::Ids;
use crate::foundation::math::{Mat4, Transform};
use crate::render::backend::{RenderBackendService, RenderDevice};
use crate::render::draw_queue::DrawItem;
use crate::render::transform_block::TransformMatrixBlock;
use crate::render::PassId;

use super::culling::Frustum;
use super::handoff::{TransformBatch, TransformReader};
use super::node::Node;
use super::{NodeHandle, SceneError, SceneResult, TraverseMode};

/// Counters from one [`Stage::on_render`] traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderVisit {
    /// Draws submitted
    pub submitted: usize,
    /// Geometry skipped by frustum culling
    pub culled: usize,
    /// Cameras that published view and projection
    pub cameras: usize,
}

/// Owner of a scene's node hierarchy
pub struct Stage {
    name: String,
    nodes: SlotMap<NodeHandle, Node>,
    roots: Vec<NodeHandle>,
    ids: Ids,
    dirty: bool,
}

impl Stage {
    /// Empty stage
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            ids: Ids::default(),
            dirty: false,
        }
    }

    /// Empty stage with node ids starting at the configured base
    ///
    /// `config` is expected to be validated, as [`crate::config::Config`]
    /// loading does.
    pub fn with_config(name: impl Into<String>, config: &RenderCoreConfig) -> Self {
        let mut stage = Self::new(name);
        stage.ids = Ids::new(config.id_base);
        stage
    }

    /// Stage name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Root nodes in creation order
    pub fn roots(&self) -> &[NodeHandle] {
        &self.roots
    }

    /// Node behind `handle`
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// Mutable node behind `handle`
    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        let node = self.nodes.get_mut(handle)?;
        self.dirty = true;
        Some(node)
    }

    fn get(&self, handle: NodeHandle) -> SceneResult<&Node> {
        self.nodes.get(handle).ok_or(SceneError::InvalidHandle(handle))
    }

    /// Create a node, attached below `parent` or as a new root
    pub fn create_node(
        &mut self,
        name: &str,
        transform_enabled: bool,
        render_enabled: bool,
        parent: Option<NodeHandle>,
    ) -> SceneResult<NodeHandle> {
        if let Some(parent) = parent {
            self.get(parent)?;
        }

        let id = self.ids.unique_id();
        let handle = self
            .nodes
            .insert(Node::new(name, id, transform_enabled, render_enabled, parent));

        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.push(handle),
            None => self.roots.push(handle),
        }

        log::debug!("Stage '{}': created node '{}' (id {})", self.name, name, id);
        self.dirty = true;
        Ok(handle)
    }

    /// Move `child` below `parent`, detaching it from its previous place
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> SceneResult<()> {
        self.get(parent)?;
        self.get(child)?;

        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::CycleDetected {
                parent: self.nodes[parent].name().to_string(),
                child: self.nodes[child].name().to_string(),
            });
        }

        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        self.dirty = true;
        Ok(())
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    fn is_ancestor_or_self(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.nodes.get(handle).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, handle: NodeHandle) {
        match self.nodes.get(handle).and_then(|n| n.parent) {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.retain(|c| *c != handle);
                }
            }
            None => self.roots.retain(|r| *r != handle),
        }
        if let Some(node) = self.nodes.get_mut(handle) {
            node.parent = None;
        }
    }

    /// Destroy the first node named `name` below `parent`
    ///
    /// `Flat` only looks at direct children; `Recursive` checks each child
    /// and then its subtree before moving to the next child.
    pub fn remove_child(&mut self, parent: NodeHandle, name: &str, mode: TraverseMode) -> bool {
        if name.is_empty() {
            return false;
        }
        match self.find_below(parent, name, mode) {
            Some(found) => {
                self.destroy_node(found);
                true
            }
            None => false,
        }
    }

    fn find_below(&self, parent: NodeHandle, name: &str, mode: TraverseMode) -> Option<NodeHandle> {
        let node = self.nodes.get(parent)?;
        for &child in &node.children {
            if self.nodes.get(child).is_some_and(|c| c.name() == name) {
                return Some(child);
            }
            if mode == TraverseMode::Recursive {
                if let Some(found) = self.find_below(child, name, mode) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Direct child of `parent` named `name`
    pub fn find_child(&self, parent: NodeHandle, name: &str) -> Option<NodeHandle> {
        if name.is_empty() {
            return None;
        }
        self.find_below(parent, name, TraverseMode::Flat)
    }

    /// First node named `name` in depth-first order over all roots
    pub fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.roots.iter().find_map(|&root| {
            if self.nodes.get(root).is_some_and(|n| n.name() == name) {
                Some(root)
            } else {
                self.find_below(root, name, TraverseMode::Recursive)
            }
        })
    }

    /// Number of direct children
    pub fn child_count(&self, handle: NodeHandle) -> usize {
        self.nodes.get(handle).map_or(0, |n| n.children.len())
    }

    /// Direct child at `index`
    pub fn child_at(&self, handle: NodeHandle, index: usize) -> Option<NodeHandle> {
        self.nodes.get(handle)?.children.get(index).copied()
    }

    /// Parent of `handle`, `None` for roots and stale handles
    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(handle)?.parent
    }

    /// Destroy every child subtree of `handle`
    pub fn release_children(&mut self, handle: NodeHandle) {
        let children = match self.nodes.get_mut(handle) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            self.destroy_subtree(child);
        }
        self.dirty = true;
    }

    /// Destroy `handle` and its subtree, children first
    ///
    /// Returns the number of nodes destroyed.
    pub fn destroy_node(&mut self, handle: NodeHandle) -> usize {
        if !self.nodes.contains_key(handle) {
            return 0;
        }
        self.detach(handle);
        self.dirty = true;
        self.destroy_subtree(handle)
    }

    fn destroy_subtree(&mut self, handle: NodeHandle) -> usize {
        let children = match self.nodes.get_mut(handle) {
            Some(node) => std::mem::take(&mut node.children),
            None => return 0,
        };
        let mut destroyed = 0;
        for child in children {
            destroyed += self.destroy_subtree(child);
        }
        if let Some(node) = self.nodes.remove(handle) {
            log::trace!("Destroyed node '{}'", node.name());
            self.ids.release_id(node.id);
            destroyed += 1;
        }
        destroyed
    }

    /// Include or exclude a subtree from rendering
    pub fn set_active(&mut self, handle: NodeHandle, active: bool) -> SceneResult<()> {
        let node = self.nodes.get_mut(handle).ok_or(SceneError::InvalidHandle(handle))?;
        node.active = active;
        Ok(())
    }

    /// Replace the local transform of a transform-enabled node
    pub fn set_local_transform(&mut self, handle: NodeHandle, transform: Transform) -> SceneResult<()> {
        let node = self.nodes.get_mut(handle).ok_or(SceneError::InvalidHandle(handle))?;
        if !node.transform_enabled {
            return Err(SceneError::TransformDisabled(node.name().to_string()));
        }
        node.local = transform;
        self.dirty = true;
        Ok(())
    }

    /// World matrix of `handle` as of the last update
    pub fn world_transform(&self, handle: NodeHandle) -> Option<Mat4> {
        self.nodes.get(handle).map(|n| n.world)
    }

    /// Apply a batch from the transform handoff
    ///
    /// Entries for destroyed or transform-disabled nodes are skipped.
    /// Returns the number of transforms applied.
    pub fn apply_transform_batch(&mut self, batch: TransformBatch) -> usize {
        let mut applied = 0;
        for (handle, transform) in batch.updates {
            match self.set_local_transform(handle, transform) {
                Ok(()) => applied += 1,
                Err(err) => log::debug!("Skipping handoff entry for frame {}: {}", batch.frame, err),
            }
        }
        applied
    }

    /// Take and apply the latest batch of `reader`, if any
    pub fn sync_transforms(&mut self, reader: &TransformReader) -> usize {
        reader.take().map_or(0, |batch| self.apply_transform_batch(batch))
    }

    /// Resolve world transforms, parents before children
    ///
    /// Transform-enabled nodes run their animator and compose
    /// `world = parent_world * local`; other nodes inherit the parent world.
    pub fn on_update(&mut self, dt: f32) {
        let identity = Mat4::identity();
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            update_subtree(&mut self.nodes, root, &identity, dt);
        }
        self.dirty = false;
    }

    /// Submit draws for every active, render-enabled node
    ///
    /// Cameras publish their view and projection first. With culling
    /// enabled, geometry of nodes whose world bounds miss the frustum of
    /// the target pass is skipped; children are still visited.
    pub fn on_render<D: RenderDevice>(&mut self, backend: &mut RenderBackendService<D>) -> RenderVisit {
        if self.dirty {
            debug_assert!(false, "on_render called without on_update after a scene change");
            log::warn!("Stage '{}' rendered with stale transforms", self.name);
        }

        let mut visit = RenderVisit::default();
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            publish_cameras(&self.nodes, root, backend, &mut visit);
        }

        let mut frustums: HashMap<PassId, Option<Frustum>> = HashMap::new();
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            render_subtree(&mut self.nodes, root, backend, &mut frustums, &mut visit);
        }
        visit
    }
}

fn update_subtree(nodes: &mut SlotMap<NodeHandle, Node>, handle: NodeHandle, parent_world: &Mat4, dt: f32) {
    let Some(node) = nodes.get_mut(handle) else {
        return;
    };

    if node.transform_enabled {
        if let Some(animator) = node.animator.as_mut() {
            animator.animate(&mut node.local, dt);
        }
        node.world = parent_world * node.local.to_matrix();
    } else {
        node.world = *parent_world;
    }

    let world = node.world;
    for i in 0..node.children.len() {
        let child = nodes[handle].children[i];
        update_subtree(nodes, child, &world, dt);
    }
}

fn publish_cameras<D: RenderDevice>(
    nodes: &SlotMap<NodeHandle, Node>,
    handle: NodeHandle,
    backend: &mut RenderBackendService<D>,
    visit: &mut RenderVisit,
) {
    let Some(node) = nodes.get(handle) else {
        return;
    };
    if !node.active {
        return;
    }

    if let Some(camera) = &node.camera {
        let view = node.world.try_inverse().unwrap_or_else(Mat4::identity);
        if backend.set_view_projection(camera.pass, view, camera.projection) {
            visit.cameras += 1;
        }
    }

    for &child in &node.children {
        publish_cameras(nodes, child, backend, visit);
    }
}

fn render_subtree<D: RenderDevice>(
    nodes: &mut SlotMap<NodeHandle, Node>,
    handle: NodeHandle,
    backend: &mut RenderBackendService<D>,
    frustums: &mut HashMap<PassId, Option<Frustum>>,
    visit: &mut RenderVisit,
) {
    let Some(node) = nodes.get_mut(handle) else {
        return;
    };
    if !node.active {
        return;
    }

    if node.render_enabled {
        let world = node.world;
        let world_bounds = node.bounds.map(|b| b.transformed(&world));
        let mut last_block = None;

        for geometry in &node.geometry {
            if backend.culling_enabled() {
                if let Some(bounds) = &world_bounds {
                    let frustum = frustums
                        .entry(geometry.pass)
                        .or_insert_with(|| backend.frustum(geometry.pass));
                    if frustum.as_ref().is_some_and(|f| !f.intersects_aabb(bounds)) {
                        visit.culled += 1;
                        continue;
                    }
                }
            }

            let mut item = DrawItem::new(geometry.mesh, world);
            item.material = geometry.material.clone();
            if !geometry.instances.is_empty() {
                item = item.with_instance_transforms(geometry.instances.clone());
            }
            backend.submit(geometry.pass, item);
            visit.submitted += 1;

            if let Some(pass) = backend.pipeline().and_then(|p| p.pass_by_id(geometry.pass)) {
                last_block = Some(TransformMatrixBlock::from_matrices(world, *pass.view(), *pass.projection()));
            }
        }

        if last_block.is_some() {
            node.last_block = last_block;
        }
    }

    for i in 0..node.children.len() {
        let child = nodes[handle].children[i];
        render_subtree(nodes, child, backend, frustums, visit);
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots.len())
            .finish()
    }
}
