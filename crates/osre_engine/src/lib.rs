//! # OSRE Engine
//!
//! Scene graph and render-pass pipeline core of the OSRE render engine.
//!
//! ## Features
//!
//! - **Scene Graph**: arena-backed node hierarchy with parent-before-child
//!   transform propagation
//! - **Render Passes**: passes bundle GPU state and are executed in
//!   pipeline order
//! - **Pipeline Descriptions**: pipelines built from text files with
//!   `#include` support
//! - **Device Abstraction**: all GPU work goes through [`render::RenderDevice`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use osre_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenderCoreConfig::load_from_file("render.toml")?;
//!     osre_engine::foundation::logging::init_from_config(&config);
//!
//!     let pipeline = PipelineBuilder::from_config(&config)?.build_configured(&config)?;
//!     let mut backend = RenderBackendService::new(HeadlessDevice::new(), &config);
//!     backend.set_pipeline(pipeline)?;
//!
//!     let mut stage = Stage::with_config("main", &config);
//!     let root = stage.create_node("root", true, false, None)?;
//!     let mesh = stage.create_node("mesh", true, true, Some(root))?;
//!     if let Some(node) = stage.node_mut(mesh) {
//!         node.add_geometry(Geometry::new(MeshId(0), PassId::RENDER));
//!     }
//!
//!     stage.on_update(1.0 / 60.0);
//!     backend.begin_frame()?;
//!     stage.on_render(&mut backend);
//!     let stats = backend.end_frame()?;
//!     println!("{} draws", stats.draws);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, RenderCoreConfig},
        foundation::{
            ids::Ids,
            math::{Color4, Mat4, Mat4Ext, Transform, Vec3},
            object::{Object, ObjectId, Shared},
        },
        render::{
            DrawItem, FrameStats, HeadlessDevice, Material, MeshId, PassId, Pipeline,
            PipelineBuilder, RenderBackendService, RenderDevice, RenderError, RenderPass,
            RenderResult, RenderStates, Shader, ShaderType,
        },
        scene::{Camera, Geometry, Node, NodeHandle, Stage, TraverseMode},
    };
}
