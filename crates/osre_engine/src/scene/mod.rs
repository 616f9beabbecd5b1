//! Scene management system
//!
//! A [`Stage`] owns every [`Node`] of a scene in an arena addressed by
//! [`NodeHandle`]. Each frame the stage resolves world transforms parent
//! before child ([`Stage::on_update`]) and then submits the draws of
//! render-enabled nodes to the render backend ([`Stage::on_render`]).
//!
//! ```text
//! TransformWriter (other thread)
//!      ↓  handoff, once per frame
//! Stage::on_update   (world = parent_world * local)
//!      ↓
//! Stage::on_render   (cameras, culling, DrawItems)
//!      ↓
//! RenderBackendService
//! ```

pub mod culling;
pub mod handoff;
pub mod node;
pub mod stage;

pub use culling::{Frustum, Plane, AABB};
pub use handoff::{transform_handoff, TransformBatch, TransformReader, TransformWriter};
pub use node::{Animator, Camera, Geometry, Node, Rotator};
pub use stage::{RenderVisit, Stage};

slotmap::new_key_type! {
    /// Stable handle of a node inside its stage
    pub struct NodeHandle;
}

/// How far a child lookup descends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraverseMode {
    /// Direct children only
    #[default]
    Flat,
    /// The whole subtree, depth-first
    Recursive,
}

/// Scene graph errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The handle does not refer to a live node of this stage
    #[error("Invalid node handle {0:?}")]
    InvalidHandle(NodeHandle),

    /// The node was created without transform support
    #[error("Node '{0}' has transforms disabled")]
    TransformDisabled(String),

    /// The re-parenting would make a node its own ancestor
    #[error("Attaching '{child}' below '{parent}' would create a cycle")]
    CycleDetected {
        /// Requested parent
        parent: String,
        /// Node being attached
        child: String,
    },
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;
