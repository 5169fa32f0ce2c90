//! Static render state blocks.
//!
//! A [`RenderState`] item inside a shader pass replaces the whole fixed
//! function state for every draw that follows it in the same pass. Each pass
//! starts from [`RenderState::default`].

use glam::Vec4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    SrcAlphaSaturated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

/// Stencil function and operations of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
        }
    }
}

/// Complete fixed-function state applied to subsequent draws of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    // === Rasterizer ===
    pub polygon_mode: PolygonMode,
    pub cull: bool,
    pub cull_face: CullFace,
    pub front_face: FrontFace,
    pub depth_clamp: bool,

    // === Blending ===
    pub blend: bool,
    pub alpha_to_coverage: bool,
    pub blend_src_color: BlendFactor,
    pub blend_dst_color: BlendFactor,
    pub blend_op_color: BlendOperation,
    pub blend_src_alpha: BlendFactor,
    pub blend_dst_alpha: BlendFactor,
    pub blend_op_alpha: BlendOperation,
    pub blend_constant: Vec4,

    // === Depth ===
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_function: CompareFunction,
    pub depth_bias: f32,

    // === Stencil ===
    pub stencil_test: bool,
    pub stencil_reference: u32,
    pub stencil_mask: u32,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull: true,
            cull_face: CullFace::Back,
            front_face: FrontFace::Ccw,
            depth_clamp: false,
            blend: false,
            alpha_to_coverage: false,
            blend_src_color: BlendFactor::SrcAlpha,
            blend_dst_color: BlendFactor::OneMinusSrcAlpha,
            blend_op_color: BlendOperation::Add,
            blend_src_alpha: BlendFactor::One,
            blend_dst_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOperation::Add,
            blend_constant: Vec4::ZERO,
            depth_test: true,
            depth_write: true,
            depth_function: CompareFunction::Less,
            depth_bias: 0.0,
            stencil_test: false,
            stencil_reference: 0,
            stencil_mask: 0xFF,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),
        }
    }
}

impl RenderState {
    /// Default state carrying over only culling and winding.
    ///
    /// Used while rendering vertex/instance index buffers, where blending,
    /// stencil and depth bias would corrupt the encoded index.
    #[must_use]
    pub fn culling_only(&self) -> Self {
        Self {
            cull: self.cull,
            cull_face: self.cull_face,
            front_face: self.front_face,
            ..Self::default()
        }
    }
}
