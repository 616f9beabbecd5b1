//! Headless render device
//!
//! [`HeadlessDevice`] implements [`RenderDevice`] without a GPU by recording
//! every call it receives. Tests and tools inspect the recorded
//! [`DeviceCommand`] stream to check what a frame would have submitted.

use std::collections::HashSet;

use crate::foundation::math::{Color4, Mat4};

use super::backend::RenderDevice;
use super::draw_queue::{DrawItem, MeshId};
use super::error::{RenderError, RenderResult};
use super::material::{Material, MaterialId};
use super::render_pass::{RenderPass, RenderTarget, Viewport};
use super::shader::Shader;
use super::states::{ClearState, RenderStates, StateChanges};
use super::transform_block::TransformMatrixBlock;
use super::PassId;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Frame started
    BeginFrame,
    /// Pass bound with its target and viewport
    BindPass {
        /// Bound pass
        pass: PassId,
        /// Target the pass renders into
        target: RenderTarget,
        /// Viewport of the pass
        viewport: Viewport,
    },
    /// State groups applied
    ApplyStates(StateChanges),
    /// Shader bound, by name
    BindShader(String),
    /// Buffers cleared
    Clear(ClearState),
    /// Material bound
    BindMaterial(MaterialId),
    /// Draw issued with its matrix block
    Draw {
        /// Drawn mesh
        mesh: MeshId,
        /// Matrices of the draw
        block: TransformMatrixBlock,
        /// Instance count
        instances: u32,
        /// Per-instance matrices, empty when instances share the model matrix
        instance_transforms: Vec<Mat4>,
    },
    /// Frame finished
    EndFrame,
    /// Shader compiled, by name
    CompileShader(String),
}

/// Device recording commands instead of executing them
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    commands: Vec<DeviceCommand>,
    failing_shaders: HashSet<String>,
    frames: u64,
    last_clear_color: Option<Color4>,
}

impl HeadlessDevice {
    /// Device with an empty command log
    pub fn new() -> Self {
        Self::default()
    }

    /// Make compilation of the named shader fail
    pub fn with_failing_shader(mut self, name: impl Into<String>) -> Self {
        self.fail_shader(name);
        self
    }

    /// Make compilation of the named shader fail from now on
    pub fn fail_shader(&mut self, name: impl Into<String>) {
        self.failing_shaders.insert(name.into());
    }

    /// All recorded commands
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget the recorded commands
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Completed frames
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Color of the most recent color clear
    pub fn last_clear_color(&self) -> Option<Color4> {
        self.last_clear_color
    }

    /// Pass ids in bind order
    pub fn bound_passes(&self) -> Vec<PassId> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindPass { pass, .. } => Some(*pass),
                _ => None,
            })
            .collect()
    }

    /// Targets and viewports in pass bind order
    pub fn bound_targets(&self) -> Vec<(RenderTarget, Viewport)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindPass { target, viewport, .. } => Some((target.clone(), *viewport)),
                _ => None,
            })
            .collect()
    }

    /// Shader names in bind order
    pub fn bound_shaders(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindShader(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Issued draws in order
    pub fn draws(&self) -> Vec<(MeshId, TransformMatrixBlock)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw { mesh, block, .. } => Some((*mesh, *block)),
                _ => None,
            })
            .collect()
    }

    /// Mesh, instance count and per-instance matrices of issued draws
    pub fn instanced_draws(&self) -> Vec<(MeshId, u32, Vec<Mat4>)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw {
                    mesh,
                    instances,
                    instance_transforms,
                    ..
                } => Some((*mesh, *instances, instance_transforms.clone())),
                _ => None,
            })
            .collect()
    }
}

impl RenderDevice for HeadlessDevice {
    fn begin_frame(&mut self) -> RenderResult<()> {
        self.commands.push(DeviceCommand::BeginFrame);
        Ok(())
    }

    fn bind_pass(&mut self, pass: &RenderPass) -> RenderResult<()> {
        self.commands.push(DeviceCommand::BindPass {
            pass: pass.id(),
            target: pass.target().clone(),
            viewport: pass.viewport(),
        });
        Ok(())
    }

    fn apply_states(&mut self, _states: &RenderStates, changes: StateChanges) -> RenderResult<()> {
        self.commands.push(DeviceCommand::ApplyStates(changes));
        Ok(())
    }

    fn bind_shader(&mut self, shader: &Shader) -> RenderResult<()> {
        self.commands.push(DeviceCommand::BindShader(shader.name().to_string()));
        Ok(())
    }

    fn clear(&mut self, clear: ClearState, color: Color4) -> RenderResult<()> {
        if clear.contains(ClearState::COLOR) {
            self.last_clear_color = Some(color);
        }
        self.commands.push(DeviceCommand::Clear(clear));
        Ok(())
    }

    fn bind_material(&mut self, material: &Material) -> RenderResult<()> {
        self.commands.push(DeviceCommand::BindMaterial(material.id()));
        Ok(())
    }

    fn draw(&mut self, item: &DrawItem, block: &TransformMatrixBlock) -> RenderResult<()> {
        self.commands.push(DeviceCommand::Draw {
            mesh: item.mesh,
            block: *block,
            instances: item.instances,
            instance_transforms: item.instance_transforms.clone(),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        self.frames += 1;
        self.commands.push(DeviceCommand::EndFrame);
        Ok(())
    }

    fn compile_shader(&mut self, shader: &Shader) -> RenderResult<()> {
        if self.failing_shaders.contains(shader.name()) {
            return Err(RenderError::ShaderCompilationFailed {
                name: shader.name().to_string(),
                reason: "rejected by headless device".to_string(),
            });
        }
        self.commands.push(DeviceCommand::CompileShader(shader.name().to_string()));
        Ok(())
    }
}
