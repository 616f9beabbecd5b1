//! Render state definitions
//!
//! The fixed-function state a render pass binds: polygon, cull, blend,
//! sampler, clear, depth and stencil state, bundled in [`RenderStates`].
//! [`RenderStates::diff`] tells the backend which groups changed between two
//! bundles so unchanged state is not re-applied.

use bitflags::bitflags;

bitflags! {
    /// Buffers cleared when a pass is bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearState: u32 {
        /// Clear the color buffer
        const COLOR = 1 << 0;
        /// Clear the depth buffer
        const DEPTH = 1 << 1;
        /// Clear the stencil buffer
        const STENCIL = 1 << 2;
    }
}

impl Default for ClearState {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// State groups that differ between two [`RenderStates`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateChanges: u32 {
        /// Clear flags changed
        const CLEAR = 1 << 0;
        /// Depth test changed
        const DEPTH = 1 << 1;
        /// Polygon mode changed
        const POLYGON = 1 << 2;
        /// Blend function changed
        const BLEND = 1 << 3;
        /// Cull mode or face changed
        const CULL = 1 << 4;
        /// Sampler binding changed
        const SAMPLER = 1 << 5;
        /// Stencil function or ops changed
        const STENCIL = 1 << 6;
    }
}

/// Polygon rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    /// Point cloud mode
    Point,
    /// Wireframe mode
    Line,
    /// Normal solid rendering
    #[default]
    Fill,
}

/// Polygon state of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PolygonState {
    /// Rasterization mode
    pub mode: PolygonMode,
}

impl PolygonState {
    /// Polygon state with the given mode
    pub fn new(mode: PolygonMode) -> Self {
        Self { mode }
    }
}

/// Winding considered front-facing, or culling disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Clockwise winding
    #[default]
    Cw,
    /// Counter-clockwise winding
    Ccw,
    /// No culling
    Off,
}

/// Faces removed by culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
    /// Cull both
    FrontAndBack,
}

/// Face culling state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CullState {
    /// Winding / enable
    pub mode: CullMode,
    /// Culled faces
    pub face: CullFace,
}

impl CullState {
    /// Cull state with mode and face
    pub fn new(mode: CullMode, face: CullFace) -> Self {
        Self { mode, face }
    }

    /// Culling disabled
    pub fn off() -> Self {
        Self::new(CullMode::Off, CullFace::Back)
    }
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFunc {
    /// Blending without an equation (source replaces destination)
    #[default]
    None,
    /// source + destination
    Add,
    /// source - destination
    Subtract,
    /// destination - source
    ReverseSubtract,
    /// min(source, destination)
    Min,
    /// max(source, destination)
    Max,
    /// Blending disabled
    Off,
}

/// Blend state of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendState {
    /// Blend equation
    pub func: BlendFunc,
}

impl BlendState {
    /// Blend state with the given equation
    pub fn new(func: BlendFunc) -> Self {
        Self { func }
    }
}

/// Texture target sampled by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    /// 1D texture
    Texture1D,
    /// 2D texture
    #[default]
    Texture2D,
    /// 3D texture
    Texture3D,
}

/// Sampler binding of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerState {
    /// Texture target
    pub target: TextureTarget,
    /// Texture unit
    pub stage: u32,
}

impl SamplerState {
    /// Sampler bound to `target` on texture unit `stage`
    pub fn new(target: TextureTarget, stage: u32) -> Self {
        Self { target, stage }
    }
}

/// Comparison used for depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    /// Always passes
    #[default]
    Always,
    /// Never passes
    Never,
    /// Passes if less
    Less,
    /// Passes if equal
    Equal,
    /// Passes if less or equal
    LessEqual,
    /// Passes if greater
    Greater,
    /// Passes if not equal
    NotEqual,
    /// Passes if greater or equal
    GreaterEqual,
}

/// Depth test state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// Depth test enabled
    pub enabled: bool,
    /// Depth comparison
    pub func: CompareFunc,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            enabled: true,
            func: CompareFunc::Always,
        }
    }
}

impl DepthState {
    /// Depth state with explicit test and comparison
    pub fn new(enabled: bool, func: CompareFunc) -> Self {
        Self { enabled, func }
    }
}

/// Stencil buffer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    /// Keep the current value
    #[default]
    Keep,
    /// Set to zero
    Zero,
    /// Replace with the reference value
    Replace,
    /// Increment and clamp
    Incr,
    /// Increment and wrap
    IncrWrap,
    /// Decrement and clamp
    Decr,
    /// Decrement and wrap
    DecrWrap,
    /// Bitwise invert
    Invert,
}

/// Stencil test state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// Stencil comparison, `None` disables the test
    pub func: Option<CompareFunc>,
    /// Reference value
    pub reference: i32,
    /// Compare mask
    pub mask: u8,
    /// Op when the stencil test fails
    pub stencil_fail: StencilOp,
    /// Op when the depth test fails
    pub depth_fail: StencilOp,
    /// Op when both tests pass
    pub depth_pass: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            func: None,
            reference: 1,
            mask: 0xFF,
            stencil_fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            depth_pass: StencilOp::Keep,
        }
    }
}

impl StencilState {
    /// Set the stencil comparison, reference and mask
    pub fn with_func(mut self, func: CompareFunc, reference: i32, mask: u8) -> Self {
        self.func = Some(func);
        self.reference = reference;
        self.mask = mask;
        self
    }

    /// Set the ops for stencil fail, depth fail and depth pass
    pub fn with_ops(mut self, stencil_fail: StencilOp, depth_fail: StencilOp, depth_pass: StencilOp) -> Self {
        self.stencil_fail = stencil_fail;
        self.depth_fail = depth_fail;
        self.depth_pass = depth_pass;
        self
    }
}

/// Complete fixed-function state of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderStates {
    /// Buffers cleared on bind
    pub clear: ClearState,
    /// Depth test
    pub depth: DepthState,
    /// Polygon mode
    pub polygon: PolygonState,
    /// Blending
    pub blend: BlendState,
    /// Face culling
    pub cull: CullState,
    /// Sampler binding
    pub sampler: SamplerState,
    /// Stencil test
    pub stencil: StencilState,
}

impl RenderStates {
    /// State groups that must be re-applied to go from `previous` to `self`
    ///
    /// With no previous state everything is reported as changed.
    pub fn diff(&self, previous: Option<&RenderStates>) -> StateChanges {
        let Some(prev) = previous else {
            return StateChanges::all();
        };

        let mut changes = StateChanges::empty();
        changes.set(StateChanges::CLEAR, self.clear != prev.clear);
        changes.set(StateChanges::DEPTH, self.depth != prev.depth);
        changes.set(StateChanges::POLYGON, self.polygon != prev.polygon);
        changes.set(StateChanges::BLEND, self.blend != prev.blend);
        changes.set(StateChanges::CULL, self.cull != prev.cull);
        changes.set(StateChanges::SAMPLER, self.sampler != prev.sampler);
        changes.set(StateChanges::STENCIL, self.stencil != prev.stencil);
        changes
    }
}
