//! Render passes
//!
//! A [`RenderPass`] is one bound configuration of GPU state executed as a
//! unit within a frame: a target, a [`RenderStates`] bundle, an optional
//! shader and the view/projection used by the draws queued against it.
//! Passes are built once at setup, usually with the by-value `with_*`
//! builders, and compared by [`PassId`] only.

use crate::foundation::math::Mat4;
use crate::foundation::object::Shared;

use super::shader::Shader;
use super::states::{
    BlendState, ClearState, CullState, DepthState, PolygonState, RenderStates, SamplerState,
    StencilState,
};
use super::PassId;

/// Destination a pass renders into
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenderTarget {
    /// The default framebuffer
    #[default]
    Framebuffer,
    /// A named offscreen target
    Offscreen {
        /// Target name
        name: String,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

/// Viewport rectangle in pixels; a zero size means the full target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Viewport rectangle
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Human-readable name of a built-in pass id
pub fn pass_name_by_id(id: PassId) -> Option<&'static str> {
    match id {
        PassId::RENDER => Some("RenderPass"),
        PassId::UI => Some("UiPass"),
        PassId::DBG => Some("DbgPass"),
        _ => None,
    }
}

/// GPU state bundle bound to a pass id
#[derive(Debug, Clone)]
pub struct RenderPass {
    id: PassId,
    target: RenderTarget,
    states: RenderStates,
    shader: Option<Shared<Shader>>,
    view: Mat4,
    projection: Mat4,
    viewport: Viewport,
}

impl RenderPass {
    /// Pass `id` drawing with `shader` into the default framebuffer
    pub fn create(id: PassId, shader: Option<Shared<Shader>>) -> Self {
        Self {
            id,
            target: RenderTarget::default(),
            states: RenderStates::default(),
            shader,
            view: Mat4::identity(),
            projection: Mat4::identity(),
            viewport: Viewport::default(),
        }
    }

    /// Pass id
    pub fn id(&self) -> PassId {
        self.id
    }

    /// Built-in name of the pass, if it has one
    pub fn name(&self) -> Option<&'static str> {
        pass_name_by_id(self.id)
    }

    /// Replace target and the whole state bundle
    pub fn with(mut self, target: RenderTarget, states: RenderStates) -> Self {
        self.target = target;
        self.states = states;
        self
    }

    /// Set the polygon state
    pub fn with_polygon_state(mut self, state: PolygonState) -> Self {
        self.states.polygon = state;
        self
    }

    /// Set the cull state
    pub fn with_cull_state(mut self, state: CullState) -> Self {
        self.states.cull = state;
        self
    }

    /// Set the blend state
    pub fn with_blend_state(mut self, state: BlendState) -> Self {
        self.states.blend = state;
        self
    }

    /// Set the sampler state
    pub fn with_sampler_state(mut self, state: SamplerState) -> Self {
        self.states.sampler = state;
        self
    }

    /// Set the clear state
    pub fn with_clear_state(mut self, state: ClearState) -> Self {
        self.states.clear = state;
        self
    }

    /// Set the stencil state
    pub fn with_stencil_state(mut self, state: StencilState) -> Self {
        self.states.stencil = state;
        self
    }

    /// Set the depth state
    pub fn with_depth_state(mut self, state: DepthState) -> Self {
        self.states.depth = state;
        self
    }

    /// Set the render target
    pub fn with_target(mut self, target: RenderTarget) -> Self {
        self.target = target;
        self
    }

    /// Set the shader
    pub fn with_shader(mut self, shader: Shared<Shader>) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Set the viewport
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Set view and projection
    pub fn with_view_projection(mut self, view: Mat4, projection: Mat4) -> Self {
        self.set_view_projection(view, projection);
        self
    }

    /// Mutable access to the state bundle for in-place edits
    pub fn states_mut(&mut self) -> &mut RenderStates {
        &mut self.states
    }

    /// Replace the shader in place
    pub fn set_shader(&mut self, shader: Option<Shared<Shader>>) {
        self.shader = shader;
    }

    /// Replace view and projection in place
    pub fn set_view_projection(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    /// Replace the viewport in place
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Replace the render target in place
    pub fn set_target(&mut self, target: RenderTarget) {
        self.target = target;
    }

    /// Full state bundle
    pub fn states(&self) -> &RenderStates {
        &self.states
    }

    /// Render target
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Bound shader
    pub fn shader(&self) -> Option<&Shared<Shader>> {
        self.shader.as_ref()
    }

    /// View matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Viewport
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

impl PartialEq for RenderPass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RenderPass {}
