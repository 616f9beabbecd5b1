//! # Draw Queue
//!
//! Collects the draws submitted during scene traversal, grouped by the pass
//! they target. At pipeline execution each pass takes its queue, sorted so
//! draws sharing a material are adjacent and the material is bound once per
//! run.
//!
//! The sort is stable: draws with the same material keep their submission
//! order.

use std::collections::HashMap;

use crate::foundation::math::Mat4;
use crate::foundation::object::{Shared, SharedKey};

use super::material::{Material, MaterialId};
use super::PassId;

/// Handle of a mesh owned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// One draw submitted for a pass
///
/// A draw renders `instances` copies of the mesh. When `instance_transforms`
/// is non-empty it holds one matrix per instance, relative to `world`.
#[derive(Debug, Clone)]
pub struct DrawItem {
    /// Mesh to draw
    pub mesh: MeshId,
    /// Material bound for the draw, `None` uses the pass shader only
    pub material: Option<Shared<Material>>,
    /// World transform of the submitting node
    pub world: Mat4,
    /// Number of instances, 1 for a plain draw
    pub instances: u32,
    /// Per-instance matrices, empty when all instances share `world`
    pub instance_transforms: Vec<Mat4>,
}

impl DrawItem {
    /// Draw of `mesh` at `world` without a material
    pub fn new(mesh: MeshId, world: Mat4) -> Self {
        Self {
            mesh,
            material: None,
            world,
            instances: 1,
            instance_transforms: Vec::new(),
        }
    }

    /// Attach a material
    pub fn with_material(mut self, material: Shared<Material>) -> Self {
        self.material = Some(material);
        self
    }

    /// Draw `count` instances sharing the world transform
    pub fn with_instance_count(mut self, count: u32) -> Self {
        self.instances = count;
        self.instance_transforms.clear();
        self
    }

    /// Draw one instance per matrix
    pub fn with_instance_transforms(mut self, transforms: Vec<Mat4>) -> Self {
        self.instances = u32::try_from(transforms.len()).unwrap_or(u32::MAX);
        self.instance_transforms = transforms;
        self
    }

    /// Batching key: the identity of the material handle
    ///
    /// Draws without material sort first. Distinct materials never share a
    /// key, even when their names match.
    pub fn batch_key(&self) -> Option<SharedKey> {
        self.material.as_ref().map(Shared::key)
    }

    /// Name-derived id of the material
    pub fn material_id(&self) -> Option<MaterialId> {
        self.material.as_ref().map(|m| m.id())
    }
}

/// Per-pass collection of submitted draws
#[derive(Debug, Default)]
pub struct DrawQueue {
    queues: HashMap<PassId, Vec<DrawItem>>,
}

impl DrawQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a draw for `pass`
    pub fn push(&mut self, pass: PassId, item: DrawItem) {
        self.queues.entry(pass).or_default().push(item);
    }

    /// Number of draws queued for `pass`
    pub fn len_for(&self, pass: PassId) -> usize {
        self.queues.get(&pass).map_or(0, Vec::len)
    }

    /// Total number of queued draws
    pub fn len(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    /// Check if no draws are queued
    pub fn is_empty(&self) -> bool {
        self.queues.values().all(Vec::is_empty)
    }

    /// Remove and return the draws of `pass`, stably sorted by material
    pub fn take_sorted(&mut self, pass: PassId) -> Vec<DrawItem> {
        let mut items = self.queues.remove(&pass).unwrap_or_default();
        items.sort_by_key(DrawItem::batch_key);
        items
    }

    /// Drop every queue whose pass is not accepted by `known`
    ///
    /// Returns the number of draws dropped.
    pub fn retain_passes(&mut self, mut known: impl FnMut(PassId) -> bool) -> usize {
        let mut dropped = 0;
        self.queues.retain(|pass, items| {
            let keep = known(*pass);
            if !keep {
                log::warn!("Dropping {} draws queued for pass {} missing from the pipeline", items.len(), pass);
                dropped += items.len();
            }
            keep
        });
        dropped
    }

    /// Remove all queued draws
    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(name: &str) -> Shared<Material> {
        Shared::new(Material::new(name, ""))
    }

    #[test]
    fn test_queue_creation() {
        let queue = DrawQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_draws_grouped_by_pass() {
        let mut queue = DrawQueue::new();
        queue.push(PassId::RENDER, DrawItem::new(MeshId(1), Mat4::identity()));
        queue.push(PassId::UI, DrawItem::new(MeshId(2), Mat4::identity()));
        queue.push(PassId::RENDER, DrawItem::new(MeshId(3), Mat4::identity()));

        assert_eq!(queue.len_for(PassId::RENDER), 2);
        assert_eq!(queue.len_for(PassId::UI), 1);
        assert_eq!(queue.len_for(PassId::DBG), 0);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_sort_groups_materials_stably() {
        let stone = material("stone");
        let wood = material("wood");

        let mut queue = DrawQueue::new();
        for (mesh, mat) in [(0, &stone), (1, &wood), (2, &stone), (3, &wood)] {
            queue.push(
                PassId::RENDER,
                DrawItem::new(MeshId(mesh), Mat4::identity()).with_material(mat.acquire()),
            );
        }
        queue.push(PassId::RENDER, DrawItem::new(MeshId(4), Mat4::identity()));

        let items = queue.take_sorted(PassId::RENDER);
        assert_eq!(items[0].mesh, MeshId(4));

        let runs: Vec<_> = items[1..].iter().map(|i| (i.batch_key(), i.mesh)).collect();
        let first_material = runs[0].0;
        assert_eq!(runs[1].0, first_material);
        assert_ne!(runs[2].0, first_material);
        assert_eq!(runs[2].0, runs[3].0);
        assert!(runs[0].1 < runs[1].1);
        assert!(runs[2].1 < runs[3].1);
        assert_eq!(queue.len_for(PassId::RENDER), 0);
    }

    #[test]
    fn test_same_named_materials_are_separate_batches() {
        let red = material("brick");
        let blue = material("brick");

        let mut queue = DrawQueue::new();
        for (mesh, mat) in [(0, &red), (1, &blue), (2, &red)] {
            queue.push(
                PassId::RENDER,
                DrawItem::new(MeshId(mesh), Mat4::identity()).with_material(mat.acquire()),
            );
        }

        let items = queue.take_sorted(PassId::RENDER);
        assert!(items.iter().all(|i| i.material_id() == Some(red.id())));

        // Red draws form one run, blue is its own run before or after it
        let keys: Vec<_> = items.iter().map(DrawItem::batch_key).collect();
        let red_key = Some(red.key());
        let blue_key = Some(blue.key());
        assert_ne!(red_key, blue_key);
        assert!(keys == vec![red_key, red_key, blue_key] || keys == vec![blue_key, red_key, red_key]);
    }

    #[test]
    fn test_instance_builders() {
        let plain = DrawItem::new(MeshId(0), Mat4::identity());
        assert_eq!(plain.instances, 1);
        assert!(plain.instance_transforms.is_empty());

        let counted = DrawItem::new(MeshId(0), Mat4::identity()).with_instance_count(16);
        assert_eq!(counted.instances, 16);

        let offsets = (0..3)
            .map(|i| Mat4::new_translation(&crate::foundation::math::Vec3::new(i as f32, 0.0, 0.0)))
            .collect();
        let placed = counted.with_instance_transforms(offsets);
        assert_eq!(placed.instances, 3);
        assert_eq!(placed.instance_transforms.len(), 3);
    }

    #[test]
    fn test_retain_passes_counts_dropped() {
        let mut queue = DrawQueue::new();
        queue.push(PassId::RENDER, DrawItem::new(MeshId(1), Mat4::identity()));
        queue.push(PassId(9), DrawItem::new(MeshId(2), Mat4::identity()));
        queue.push(PassId(9), DrawItem::new(MeshId(3), Mat4::identity()));

        let dropped = queue.retain_passes(|pass| pass == PassId::RENDER);
        assert_eq!(dropped, 2);
        assert_eq!(queue.len(), 1);
    }
}
