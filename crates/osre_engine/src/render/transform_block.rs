//! Per-draw transform matrices
//!
//! A [`TransformMatrixBlock`] holds the matrices a draw call needs on the
//! GPU side. The backend fills `model` from the node's world transform and
//! `view`/`projection` from the pass, then calls [`TransformMatrixBlock::update`]
//! once before handing the block to the device.

use crate::foundation::math::Mat4;

/// Matrices submitted with every draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrixBlock {
    /// Projection matrix
    pub projection: Mat4,
    /// Model (world) matrix
    pub model: Mat4,
    /// View matrix
    pub view: Mat4,
    /// Normal matrix, transpose of the inverse model-view
    pub normal: Mat4,
    /// Combined model-view-projection
    pub mvp: Mat4,
}

impl Default for TransformMatrixBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformMatrixBlock {
    /// Block with all matrices set to identity
    pub fn new() -> Self {
        Self {
            projection: Mat4::identity(),
            model: Mat4::identity(),
            view: Mat4::identity(),
            normal: Mat4::identity(),
            mvp: Mat4::identity(),
        }
    }

    /// Block for the given model, view and projection, already updated
    pub fn from_matrices(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        let mut block = Self {
            projection,
            model,
            view,
            ..Self::new()
        };
        block.update();
        block
    }

    /// Recompute `mvp` and `normal` from projection, view and model
    ///
    /// Depends only on the three inputs, so calling it twice yields the same
    /// bits. A singular model-view leaves the normal matrix at identity.
    pub fn update(&mut self) {
        let model_view = self.view * self.model;
        self.mvp = self.projection * model_view;
        self.normal = model_view
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or_else(Mat4::identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4Ext, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_new_block_is_identity() {
        let block = TransformMatrixBlock::new();
        assert_eq!(block.mvp, Mat4::identity());
        assert_eq!(block.normal, Mat4::identity());
    }

    #[test]
    fn test_update_composes_projection_view_model() {
        let model = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let projection = Mat4::perspective(45.0_f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);

        let block = TransformMatrixBlock::from_matrices(model, view, projection);
        assert_relative_eq!(block.mvp, projection * view * model, epsilon = 1e-5);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut block = TransformMatrixBlock::new();
        block.model = Mat4::new_scaling(2.0) * Mat4::rotation_y(0.7);
        block.view = Mat4::new_translation(&Vec3::new(0.0, -1.0, -4.0));
        block.projection = Mat4::perspective(1.0, 1.5, 0.5, 50.0);

        block.update();
        let first = block;
        block.update();
        assert_eq!(block, first);
    }

    #[test]
    fn test_normal_matrix_with_uniform_scale() {
        let mut block = TransformMatrixBlock::new();
        block.model = Mat4::new_scaling(2.0);
        block.update();

        assert_relative_eq!(block.normal, Mat4::new_scaling(0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_singular_model_falls_back_to_identity_normal() {
        let mut block = TransformMatrixBlock::new();
        block.model = Mat4::zeros();
        block.update();
        assert_eq!(block.normal, Mat4::identity());
    }
}
