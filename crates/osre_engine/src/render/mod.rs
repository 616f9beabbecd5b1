//! # Rendering System
//!
//! Render passes, pipelines and the backend service that executes them.
//!
//! ## Architecture
//!
//! - **RenderPass**: GPU state bundle bound to a [`PassId`]
//! - **Pipeline**: ordered list of passes, executed in insertion order
//! - **PipelineBuilder**: builds pipelines from line-oriented descriptions
//! - **RenderBackendService**: queues draws during scene traversal and runs
//!   the pipeline through a [`RenderDevice`]
//!
//! The render core never talks to a graphics API directly; everything goes
//! through the [`RenderDevice`] trait.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod draw_queue;
mod error;
pub mod headless;
pub mod material;
pub mod pipeline;
pub mod pipeline_builder;
pub mod render_pass;
pub mod shader;
pub mod states;
pub mod transform_block;

pub use backend::{FrameStats, RenderBackendService, RenderDevice};
pub use draw_queue::{DrawItem, DrawQueue, MeshId};
pub use error::{RenderError, RenderResult};
pub use headless::{DeviceCommand, HeadlessDevice};
pub use material::{Material, MaterialColor, MaterialId, MaterialParameter};
pub use pipeline::Pipeline;
pub use pipeline_builder::{
    parse_include, FsSourceProvider, MemorySourceProvider, PipelineBuilder, PipelineError,
    SourceProvider,
};
pub use render_pass::{pass_name_by_id, RenderPass, RenderTarget, Viewport};
pub use shader::{Shader, ShaderType};
pub use states::{ClearState, RenderStates, StateChanges};
pub use transform_block::TransformMatrixBlock;

/// Identifier of a render pass
///
/// The three built-in passes have fixed ids; applications may use any id
/// below the pipeline's pass ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassId(pub u32);

impl PassId {
    /// Main scene pass
    pub const RENDER: PassId = PassId(0);
    /// User interface overlay
    pub const UI: PassId = PassId(1);
    /// Debug drawing
    pub const DBG: PassId = PassId(2);
    /// Number of built-in passes
    pub const BUILTIN_COUNT: u32 = 3;
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match render_pass::pass_name_by_id(*self) {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}
