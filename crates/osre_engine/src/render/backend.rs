//! Render backend service
//!
//! [`RenderBackendService`] is the facade between the scene and the GPU
//! submission layer. Scene traversal submits [`DrawItem`]s between
//! [`RenderBackendService::begin_frame`] and [`RenderBackendService::end_frame`];
//! `end_frame` executes the installed [`Pipeline`] through a [`RenderDevice`].
//!
//! Execution per pass, in pipeline insertion order:
//! bind pass, apply changed state groups, bind shader, clear, then the pass's
//! draws sorted by material.

use crate::config::RenderCoreConfig;
use crate::foundation::math::{Color4, Mat4};
use crate::foundation::object::{Shared, SharedKey};
use crate::scene::culling::Frustum;

use super::draw_queue::{DrawItem, DrawQueue};
use super::error::{RenderError, RenderResult};
use super::material::Material;
use super::pipeline::Pipeline;
use super::render_pass::{RenderPass, RenderTarget, Viewport};
use super::shader::Shader;
use super::states::{ClearState, RenderStates, StateChanges};
use super::transform_block::TransformMatrixBlock;
use super::PassId;

/// GPU submission layer
///
/// Implemented outside the render core for a concrete graphics API, and by
/// [`super::headless::HeadlessDevice`] for tests.
pub trait RenderDevice {
    /// Start recording a frame
    fn begin_frame(&mut self) -> RenderResult<()>;

    /// Bind the target and viewport of a pass
    fn bind_pass(&mut self, pass: &RenderPass) -> RenderResult<()>;

    /// Apply the state groups flagged in `changes`
    fn apply_states(&mut self, states: &RenderStates, changes: StateChanges) -> RenderResult<()>;

    /// Bind a compiled shader
    fn bind_shader(&mut self, shader: &Shader) -> RenderResult<()>;

    /// Clear the buffers flagged in `clear`
    fn clear(&mut self, clear: ClearState, color: Color4) -> RenderResult<()>;

    /// Bind textures, colors and uniforms of a material
    fn bind_material(&mut self, material: &Material) -> RenderResult<()>;

    /// Issue one draw of `item.instances` instances
    ///
    /// `item.instance_transforms` is either empty or holds one matrix per
    /// instance.
    fn draw(&mut self, item: &DrawItem, block: &TransformMatrixBlock) -> RenderResult<()>;

    /// Finish and present the frame
    fn end_frame(&mut self) -> RenderResult<()>;

    /// Compile a shader ahead of use
    fn compile_shader(&mut self, shader: &Shader) -> RenderResult<()>;
}

/// Counters for one executed frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Passes executed
    pub passes: u32,
    /// Draws issued
    pub draws: u32,
    /// Instances rendered by the issued draws
    pub instances: u32,
    /// State groups re-applied
    pub state_changes: u32,
    /// Material binds
    pub material_binds: u32,
    /// Draws dropped because their pass is not in the pipeline
    pub dropped_draws: u32,
}

/// Facade queuing draws and executing the pipeline
pub struct RenderBackendService<D: RenderDevice> {
    device: D,
    pipeline: Option<Pipeline>,
    queue: DrawQueue,
    in_frame: bool,
    clear_color: Color4,
    culling_enabled: bool,
    pending_reloads: Vec<(PassId, Shader)>,
    last_stats: FrameStats,
}

impl<D: RenderDevice> RenderBackendService<D> {
    /// Service driving `device`
    ///
    /// `config` is expected to be validated, as [`crate::config::Config`]
    /// loading does.
    pub fn new(device: D, config: &RenderCoreConfig) -> Self {
        Self {
            device,
            pipeline: None,
            queue: DrawQueue::new(),
            in_frame: false,
            clear_color: config.clear_color,
            culling_enabled: config.enable_culling,
            pending_reloads: Vec::new(),
            last_stats: FrameStats::default(),
        }
    }

    /// Install a pipeline, compiling every pass shader
    ///
    /// On a compilation failure the previous pipeline stays installed.
    pub fn set_pipeline(&mut self, pipeline: Pipeline) -> RenderResult<()> {
        if self.in_frame {
            debug_assert!(false, "set_pipeline called inside a frame");
            return Err(RenderError::InvalidFrameState(
                "pipeline replaced inside a frame".to_string(),
            ));
        }

        for pass in pipeline.passes() {
            if let Some(shader) = pass.shader() {
                self.device.compile_shader(shader)?;
            }
        }

        log::info!(
            "Installed pipeline '{}' with {} passes",
            pipeline.name(),
            pipeline.pass_count()
        );
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Installed pipeline
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    /// Remove and return the installed pipeline
    pub fn take_pipeline(&mut self) -> Option<Pipeline> {
        debug_assert!(!self.in_frame, "pipeline removed inside a frame");
        self.pipeline.take()
    }

    /// Device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Whether frustum culling is enabled
    pub fn culling_enabled(&self) -> bool {
        self.culling_enabled
    }

    /// Enable or disable frustum culling
    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.culling_enabled = enabled;
    }

    /// Color used by passes clearing the color buffer
    pub fn set_clear_color(&mut self, color: Color4) {
        self.clear_color = color;
    }

    /// Set view and projection of a pass; `false` if the pass is unknown
    pub fn set_view_projection(&mut self, pass: PassId, view: Mat4, projection: Mat4) -> bool {
        match self.pipeline.as_mut().and_then(|p| p.pass_by_id_mut(pass)) {
            Some(render_pass) => {
                render_pass.set_view_projection(view, projection);
                true
            }
            None => {
                log::warn!("set_view_projection: pass {} not in the pipeline", pass);
                false
            }
        }
    }

    /// Resize the area a pass renders to
    ///
    /// Sets the pass viewport; an offscreen target is resized to the
    /// viewport extent. Returns `false` if the pass is unknown.
    pub fn resize(&mut self, pass: PassId, viewport: Viewport) -> bool {
        let Some(render_pass) = self.pipeline.as_mut().and_then(|p| p.pass_by_id_mut(pass)) else {
            log::warn!("resize: pass {} not in the pipeline", pass);
            return false;
        };

        if let RenderTarget::Offscreen { name, width, height } = render_pass.target() {
            let target = RenderTarget::Offscreen {
                name: name.clone(),
                width: viewport.width,
                height: viewport.height,
            };
            log::debug!(
                "Offscreen target '{}' resized from {}x{} to {}x{}",
                name,
                width,
                height,
                viewport.width,
                viewport.height
            );
            render_pass.set_target(target);
        }
        render_pass.set_viewport(viewport);
        true
    }

    /// View frustum of a pass
    pub fn frustum(&self, pass: PassId) -> Option<Frustum> {
        let render_pass = self.pipeline.as_ref()?.pass_by_id(pass)?;
        Some(Frustum::from_matrix(&(render_pass.projection() * render_pass.view())))
    }

    /// Replace the shader of `pass` at the next frame boundary
    pub fn request_shader_reload(&mut self, pass: PassId, shader: Shader) {
        log::debug!("Shader reload for pass {} queued: '{}'", pass, shader.name());
        self.pending_reloads.retain(|(p, _)| *p != pass);
        self.pending_reloads.push((pass, shader));
    }

    /// Number of reloads waiting for the next frame boundary
    pub fn pending_reload_count(&self) -> usize {
        self.pending_reloads.len()
    }

    /// Whether a frame is open
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Counters of the last executed frame
    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Open a frame for submissions
    ///
    /// Pending shader reloads are applied first. The frame opens even when a
    /// reload fails; the affected pass keeps its previous shader and the
    /// first failure is returned.
    pub fn begin_frame(&mut self) -> RenderResult<()> {
        if self.in_frame {
            debug_assert!(false, "begin_frame called twice");
            log::warn!("begin_frame called while a frame is open, ignoring");
            return Ok(());
        }

        let reload_result = self.apply_pending_reloads();
        self.in_frame = true;
        log::trace!("Frame opened");
        reload_result
    }

    fn apply_pending_reloads(&mut self) -> RenderResult<()> {
        let mut first_error = None;
        for (pass_id, shader) in std::mem::take(&mut self.pending_reloads) {
            let Some(pass) = self.pipeline.as_mut().and_then(|p| p.pass_by_id_mut(pass_id)) else {
                log::warn!("Shader reload for unknown pass {} discarded", pass_id);
                continue;
            };

            match self.device.compile_shader(&shader) {
                Ok(()) => {
                    log::info!("Reloaded shader '{}' for pass {}", shader.name(), pass_id);
                    pass.set_shader(Some(Shared::new(shader)));
                }
                Err(err) => {
                    log::warn!("Shader reload for pass {} failed: {}", pass_id, err);
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Queue a draw for `pass`; only valid inside a frame
    pub fn submit(&mut self, pass: PassId, item: DrawItem) {
        if !self.in_frame {
            debug_assert!(false, "submit called outside begin_frame/end_frame");
            log::warn!("Draw for pass {} submitted outside a frame, dropped", pass);
            return;
        }
        self.queue.push(pass, item);
    }

    /// Close the frame and execute the pipeline
    pub fn end_frame(&mut self) -> RenderResult<FrameStats> {
        if !self.in_frame {
            debug_assert!(false, "end_frame called without begin_frame");
            return Err(RenderError::InvalidFrameState(
                "end_frame without begin_frame".to_string(),
            ));
        }
        self.in_frame = false;

        let Some(pipeline) = self.pipeline.as_mut() else {
            self.queue.clear();
            return Err(RenderError::NoPipeline);
        };

        let mut stats = FrameStats::default();
        let dropped = self.queue.retain_passes(|id| pipeline.contains(id));
        stats.dropped_draws = u32::try_from(dropped).unwrap_or(u32::MAX);

        let result = execute(&mut self.device, pipeline, &mut self.queue, self.clear_color, &mut stats);
        pipeline.end_frame();
        self.queue.clear();
        result?;

        log::trace!(
            "Frame executed: {} passes, {} draws, {} state changes",
            stats.passes,
            stats.draws,
            stats.state_changes
        );
        self.last_stats = stats;
        Ok(stats)
    }
}

fn execute<D: RenderDevice>(
    device: &mut D,
    pipeline: &mut Pipeline,
    queue: &mut DrawQueue,
    clear_color: Color4,
    stats: &mut FrameStats,
) -> RenderResult<()> {
    device.begin_frame()?;

    let count = pipeline.begin_frame();
    let mut previous: Option<RenderStates> = None;

    for index in 0..count {
        let Some(pass) = pipeline.begin_pass(index) else {
            continue;
        };

        device.bind_pass(pass)?;

        let states = *pass.states();
        let changes = states.diff(previous.as_ref());
        if !changes.is_empty() {
            device.apply_states(&states, changes)?;
            stats.state_changes += changes.bits().count_ones();
        }
        previous = Some(states);

        if let Some(shader) = pass.shader() {
            device.bind_shader(shader)?;
        }

        if !states.clear.is_empty() {
            device.clear(states.clear, clear_color)?;
        }

        let mut bound: Option<SharedKey> = None;
        for item in queue.take_sorted(pass.id()) {
            if item.instances == 0 {
                log::trace!("Skipping draw of mesh {:?} with zero instances", item.mesh);
                continue;
            }

            if let Some(material) = &item.material {
                if bound != Some(material.key()) {
                    device.bind_material(material)?;
                    bound = Some(material.key());
                    stats.material_binds += 1;
                }
            }

            let block = TransformMatrixBlock::from_matrices(item.world, *pass.view(), *pass.projection());
            device.draw(&item, &block)?;
            stats.draws += 1;
            stats.instances = stats.instances.saturating_add(item.instances);
        }

        stats.passes += 1;
        pipeline.end_pass(index);
    }

    device.end_frame()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4Ext, Vec3};
    use crate::render::draw_queue::MeshId;
    use crate::render::headless::{DeviceCommand, HeadlessDevice};
    use crate::render::material::MaterialColor;
    use crate::render::states::{BlendFunc, BlendState};
    use approx::assert_relative_eq;

    fn service_with(passes: &[RenderPass]) -> RenderBackendService<HeadlessDevice> {
        let mut pipeline = Pipeline::new("test");
        for pass in passes {
            pipeline.add_pass(pass.clone()).unwrap();
        }
        let mut service = RenderBackendService::new(HeadlessDevice::new(), &RenderCoreConfig::default());
        service.set_pipeline(pipeline).unwrap();
        service
    }

    #[test]
    fn test_passes_execute_in_insertion_order() {
        let mut service = service_with(&[
            RenderPass::create(PassId::RENDER, None),
            RenderPass::create(PassId::DBG, None),
            RenderPass::create(PassId::UI, None),
        ]);

        service.begin_frame().unwrap();
        let stats = service.end_frame().unwrap();

        assert_eq!(stats.passes, 3);
        assert_eq!(
            service.device().bound_passes(),
            vec![PassId::RENDER, PassId::DBG, PassId::UI]
        );
    }

    #[test]
    fn test_empty_pass_still_clears() {
        let mut service = service_with(&[
            RenderPass::create(PassId::UI, None).with_clear_state(ClearState::COLOR),
        ]);

        service.begin_frame().unwrap();
        service.end_frame().unwrap();

        assert!(service
            .device()
            .commands()
            .iter()
            .any(|c| matches!(c, DeviceCommand::Clear(ClearState::COLOR))));
    }

    #[test]
    fn test_only_changed_state_groups_are_applied() {
        let base = RenderPass::create(PassId::RENDER, None);
        let blended = RenderPass::create(PassId::UI, None).with_blend_state(BlendState::new(BlendFunc::Add));
        let same_as_ui = RenderPass::create(PassId::DBG, None).with_blend_state(BlendState::new(BlendFunc::Add));
        let mut service = service_with(&[base, blended, same_as_ui]);

        service.begin_frame().unwrap();
        service.end_frame().unwrap();

        let applied: Vec<_> = service
            .device()
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::ApplyStates(changes) => Some(*changes),
                _ => None,
            })
            .collect();
        assert_eq!(applied, vec![StateChanges::all(), StateChanges::BLEND]);
    }

    #[test]
    fn test_materials_bound_once_per_run() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, None)]);
        let stone = Shared::new(Material::new("stone", ""));
        let wood = Shared::new(Material::new("wood", ""));

        service.begin_frame().unwrap();
        for (mesh, material) in [(0, &stone), (1, &wood), (2, &stone), (3, &wood), (4, &stone)] {
            service.submit(
                PassId::RENDER,
                DrawItem::new(MeshId(mesh), Mat4::identity()).with_material(material.acquire()),
            );
        }
        let stats = service.end_frame().unwrap();

        assert_eq!(stats.draws, 5);
        assert_eq!(stats.material_binds, 2);
    }

    #[test]
    fn test_same_named_materials_bound_separately() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, None)]);
        let mut red = Material::new("brick", "materials/red_brick");
        red.set_color(MaterialColor::Diffuse, [1.0, 0.0, 0.0, 1.0]);
        let mut blue = Material::new("brick", "materials/blue_brick");
        blue.set_color(MaterialColor::Diffuse, [0.0, 0.0, 1.0, 1.0]);
        let (red, blue) = (Shared::new(red), Shared::new(blue));

        service.begin_frame().unwrap();
        service.submit(PassId::RENDER, DrawItem::new(MeshId(1), Mat4::identity()).with_material(red.acquire()));
        service.submit(PassId::RENDER, DrawItem::new(MeshId(2), Mat4::identity()).with_material(blue.acquire()));
        let stats = service.end_frame().unwrap();

        assert_eq!(stats.material_binds, 2);
        let binds = service
            .device()
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::BindMaterial(_)))
            .count();
        assert_eq!(binds, 2);
    }

    #[test]
    fn test_instanced_draws_reach_device() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, None)]);
        let offsets: Vec<Mat4> = (0..4)
            .map(|i| Mat4::new_translation(&Vec3::new(i as f32 * 2.0, 0.0, 0.0)))
            .collect();

        service.begin_frame().unwrap();
        service.submit(
            PassId::RENDER,
            DrawItem::new(MeshId(3), Mat4::identity()).with_instance_transforms(offsets.clone()),
        );
        service.submit(PassId::RENDER, DrawItem::new(MeshId(4), Mat4::identity()).with_instance_count(10));
        service.submit(PassId::RENDER, DrawItem::new(MeshId(5), Mat4::identity()).with_instance_count(0));
        let stats = service.end_frame().unwrap();

        assert_eq!(stats.draws, 2);
        assert_eq!(stats.instances, 14);

        let instanced = service.device().instanced_draws();
        assert_eq!(instanced.len(), 2);
        assert_eq!(instanced[0], (MeshId(3), 4, offsets));
        assert_eq!(instanced[1], (MeshId(4), 10, Vec::new()));
    }

    #[test]
    fn test_resize_updates_viewport_and_offscreen_target() {
        let offscreen = RenderTarget::Offscreen {
            name: "shadow".to_string(),
            width: 512,
            height: 512,
        };
        let mut service = service_with(&[
            RenderPass::create(PassId::RENDER, None),
            RenderPass::create(PassId(3), None).with_target(offscreen),
        ]);

        assert!(service.resize(PassId::RENDER, Viewport::new(0, 0, 1280, 720)));
        assert!(service.resize(PassId(3), Viewport::new(0, 0, 1024, 1024)));
        assert!(!service.resize(PassId::UI, Viewport::new(0, 0, 1, 1)));

        service.begin_frame().unwrap();
        service.end_frame().unwrap();

        let targets = service.device().bound_targets();
        assert_eq!(
            targets,
            vec![
                (RenderTarget::Framebuffer, Viewport::new(0, 0, 1280, 720)),
                (
                    RenderTarget::Offscreen {
                        name: "shadow".to_string(),
                        width: 1024,
                        height: 1024,
                    },
                    Viewport::new(0, 0, 1024, 1024)
                ),
            ]
        );
    }

    #[test]
    fn test_draw_carries_updated_matrix_block() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, None)]);
        let view = Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0));
        let projection = Mat4::new_scaling(0.5);
        assert!(service.set_view_projection(PassId::RENDER, view, projection));

        let world = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        service.begin_frame().unwrap();
        service.submit(PassId::RENDER, DrawItem::new(MeshId(7), world));
        service.end_frame().unwrap();

        let draws = service.device().draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].0, MeshId(7));
        assert_relative_eq!(draws[0].1.mvp, projection * view * world, epsilon = 1e-6);
    }

    #[test]
    fn test_draws_for_unknown_pass_are_dropped() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, None)]);

        service.begin_frame().unwrap();
        service.submit(PassId::UI, DrawItem::new(MeshId(1), Mat4::identity()));
        service.submit(PassId::RENDER, DrawItem::new(MeshId(2), Mat4::identity()));
        let stats = service.end_frame().unwrap();

        assert_eq!(stats.draws, 1);
        assert_eq!(stats.dropped_draws, 1);
    }

    #[test]
    fn test_end_frame_without_pipeline() {
        let mut service = RenderBackendService::new(HeadlessDevice::new(), &RenderCoreConfig::default());
        service.begin_frame().unwrap();
        assert!(matches!(service.end_frame(), Err(RenderError::NoPipeline)));
        assert!(!service.in_frame());
    }

    #[test]
    fn test_set_pipeline_reports_compile_failure() {
        let device = HeadlessDevice::new().with_failing_shader("broken");
        let mut service = RenderBackendService::new(device, &RenderCoreConfig::default());

        let mut pipeline = Pipeline::new("bad");
        pipeline
            .add_pass(RenderPass::create(PassId::RENDER, Some(Shared::new(Shader::new("broken")))))
            .unwrap();

        let err = service.set_pipeline(pipeline).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompilationFailed { name, .. } if name == "broken"));
        assert!(service.pipeline().is_none());
    }

    #[test]
    fn test_shader_reload_deferred_to_frame_boundary() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, Some(Shared::new(Shader::new("v1"))))]);

        service.begin_frame().unwrap();
        service.request_shader_reload(PassId::RENDER, Shader::new("v2"));
        service.end_frame().unwrap();
        assert_eq!(service.device().bound_shaders(), vec!["v1".to_string()]);
        assert_eq!(service.pending_reload_count(), 1);

        service.begin_frame().unwrap();
        service.end_frame().unwrap();
        assert_eq!(service.pending_reload_count(), 0);
        assert_eq!(service.device().bound_shaders().last().map(String::as_str), Some("v2"));
    }

    #[test]
    fn test_failed_reload_keeps_previous_shader() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, Some(Shared::new(Shader::new("v1"))))]);
        service.device_mut().fail_shader("v2");
        service.request_shader_reload(PassId::RENDER, Shader::new("v2"));

        assert!(matches!(
            service.begin_frame(),
            Err(RenderError::ShaderCompilationFailed { .. })
        ));
        assert!(service.in_frame());
        service.end_frame().unwrap();

        let shader_name = service
            .pipeline()
            .and_then(|p| p.pass_by_id(PassId::RENDER))
            .and_then(|p| p.shader())
            .map(|s| s.name().to_string());
        assert_eq!(shader_name.as_deref(), Some("v1"));
    }

    #[test]
    fn test_frustum_of_pass() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, None)]);
        assert!(service.frustum(PassId::UI).is_none());

        let projection = Mat4::perspective(1.0, 1.0, 0.1, 10.0);
        service.set_view_projection(PassId::RENDER, Mat4::identity(), projection);
        let frustum = service.frustum(PassId::RENDER).unwrap();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -1.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 1.0)));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "submit called outside")]
    fn test_submit_outside_frame_asserts() {
        let mut service = service_with(&[RenderPass::create(PassId::RENDER, None)]);
        service.submit(PassId::RENDER, DrawItem::new(MeshId(0), Mat4::identity()));
    }
}
