//! Render pipelines
//!
//! A [`Pipeline`] is the ordered list of passes forming one frame's
//! execution plan. Passes execute in insertion order regardless of their
//! numeric id, and a pipeline never holds two passes with the same id.

use crate::foundation::object::{Object, ObjectId};

use super::error::{RenderError, RenderResult};
use super::render_pass::RenderPass;
use super::PassId;

/// Default exclusive ceiling for pass ids
pub const DEFAULT_MAX_PASSES: u32 = 16;

/// Ordered sequence of render passes
#[derive(Debug)]
pub struct Pipeline {
    object: Object,
    passes: Vec<RenderPass>,
    max_passes: u32,
    in_frame: bool,
    current_pass: Option<usize>,
}

impl Pipeline {
    /// Empty pipeline accepting pass ids below [`DEFAULT_MAX_PASSES`]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_max_passes(name, DEFAULT_MAX_PASSES)
    }

    /// Empty pipeline accepting pass ids below `max_passes`
    pub fn with_max_passes(name: impl Into<String>, max_passes: u32) -> Self {
        Self {
            object: Object::new(name),
            passes: Vec::new(),
            max_passes,
            in_frame: false,
            current_pass: None,
        }
    }

    /// Pipeline name
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Identity derived from the name
    pub fn id(&self) -> ObjectId {
        self.object.id()
    }

    /// Exclusive pass id ceiling
    pub fn max_passes(&self) -> u32 {
        self.max_passes
    }

    /// Append a pass at the end of the execution order
    pub fn add_pass(&mut self, pass: RenderPass) -> RenderResult<()> {
        let id = pass.id();
        if id.0 >= self.max_passes {
            return Err(RenderError::PassIdOutOfRange {
                id,
                limit: self.max_passes,
            });
        }
        if self.passes.iter().any(|p| p.id() == id) {
            return Err(RenderError::DuplicatePass(id));
        }

        log::debug!("Pipeline '{}': added pass {} at position {}", self.name(), id, self.passes.len());
        self.passes.push(pass);
        Ok(())
    }

    /// Number of passes
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Pass at position `index` in execution order
    pub fn pass_at(&self, index: usize) -> Option<&RenderPass> {
        self.passes.get(index)
    }

    /// Pass with the given id
    pub fn pass_by_id(&self, id: PassId) -> Option<&RenderPass> {
        self.passes.iter().find(|p| p.id() == id)
    }

    /// Mutable pass with the given id
    pub fn pass_by_id_mut(&mut self, id: PassId) -> Option<&mut RenderPass> {
        self.passes.iter_mut().find(|p| p.id() == id)
    }

    /// Whether a pass with this id exists
    pub fn contains(&self, id: PassId) -> bool {
        self.pass_by_id(id).is_some()
    }

    /// Passes in execution order
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    /// Mutable passes in execution order
    pub fn passes_mut(&mut self) -> &mut [RenderPass] {
        &mut self.passes
    }

    /// Remove every pass
    pub fn clear(&mut self) {
        debug_assert!(!self.in_frame, "pipeline cleared inside a frame");
        self.passes.clear();
        self.in_frame = false;
        self.current_pass = None;
    }

    /// Open a frame; returns the number of passes to iterate
    ///
    /// Returns 0 when a frame is already open or the pipeline is empty.
    pub fn begin_frame(&mut self) -> usize {
        if self.in_frame || self.passes.is_empty() {
            return 0;
        }
        self.in_frame = true;
        self.passes.len()
    }

    /// Enter the pass at `index`; `None` outside a frame or out of range
    pub fn begin_pass(&mut self, index: usize) -> Option<&RenderPass> {
        if !self.in_frame {
            return None;
        }
        let pass = self.passes.get(index)?;
        self.current_pass = Some(index);
        Some(pass)
    }

    /// Leave the pass at `index`; `false` if it is not the current pass
    pub fn end_pass(&mut self, index: usize) -> bool {
        if !self.in_frame || self.current_pass != Some(index) {
            return false;
        }
        self.current_pass = None;
        true
    }

    /// Close the frame
    pub fn end_frame(&mut self) {
        self.in_frame = false;
        self.current_pass = None;
    }

    /// Whether a frame is open
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(id: PassId) -> RenderPass {
        RenderPass::create(id, None)
    }

    #[test]
    fn test_add_and_clear() {
        let mut pipeline = Pipeline::new("test");
        assert_eq!(pipeline.pass_count(), 0);

        pipeline.add_pass(pass(PassId::RENDER)).unwrap();
        assert_eq!(pipeline.pass_count(), 1);

        pipeline.clear();
        assert_eq!(pipeline.pass_count(), 0);
    }

    #[test]
    fn test_insertion_order_is_execution_order() {
        let mut pipeline = Pipeline::new("test");
        pipeline.add_pass(pass(PassId::RENDER)).unwrap();
        pipeline.add_pass(pass(PassId::DBG)).unwrap();
        pipeline.add_pass(pass(PassId::UI)).unwrap();

        let order: Vec<_> = pipeline.passes().iter().map(|p| p.id()).collect();
        assert_eq!(order, vec![PassId::RENDER, PassId::DBG, PassId::UI]);
    }

    #[test]
    fn test_duplicate_pass_rejected() {
        let mut pipeline = Pipeline::new("test");
        pipeline.add_pass(pass(PassId::UI)).unwrap();

        let result = pipeline.add_pass(pass(PassId::UI));
        assert!(matches!(result, Err(RenderError::DuplicatePass(PassId::UI))));
        assert_eq!(pipeline.pass_count(), 1);
    }

    #[test]
    fn test_pass_id_ceiling() {
        let mut pipeline = Pipeline::with_max_passes("small", 3);
        assert!(pipeline.add_pass(pass(PassId(2))).is_ok());
        assert!(matches!(
            pipeline.add_pass(pass(PassId(3))),
            Err(RenderError::PassIdOutOfRange { limit: 3, .. })
        ));
    }

    #[test]
    fn test_frame_bracket_iteration() {
        let mut pipeline = Pipeline::new("test");
        pipeline.add_pass(pass(PassId::RENDER)).unwrap();
        pipeline.add_pass(pass(PassId::DBG)).unwrap();

        let count = pipeline.begin_frame();
        assert_eq!(count, 2);
        assert_eq!(pipeline.begin_frame(), 0);

        for index in 0..count {
            assert!(pipeline.begin_pass(index).is_some());
            assert!(pipeline.end_pass(index));
        }
        pipeline.end_frame();
        assert!(!pipeline.in_frame());
    }

    #[test]
    fn test_begin_pass_outside_frame() {
        let mut pipeline = Pipeline::new("test");
        pipeline.add_pass(pass(PassId::RENDER)).unwrap();
        assert!(pipeline.begin_pass(0).is_none());
        assert!(!pipeline.end_pass(0));
    }

    #[test]
    fn test_empty_pipeline_opens_no_frame() {
        let mut pipeline = Pipeline::new("empty");
        assert_eq!(pipeline.begin_frame(), 0);
        assert!(!pipeline.in_frame());
    }

    #[test]
    fn test_lookup_by_id() {
        let mut pipeline = Pipeline::new("test");
        pipeline.add_pass(pass(PassId::UI)).unwrap();
        assert!(pipeline.contains(PassId::UI));
        assert!(pipeline.pass_by_id(PassId::RENDER).is_none());
    }
}
