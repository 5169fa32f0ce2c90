//! Render pipeline cache.
//!
//! GL binds programs and fixed-function state independently; wgpu bakes both
//! into one immutable pipeline. Pipelines are therefore built lazily on the
//! first draw that needs a combination and cached under a [`PipelineKey`].
//!
//! [`RenderState`] carries floats and a dynamic blend constant, so it is not
//! used as a key directly. [`StateKey`] mirrors the fields that shape a
//! pipeline and derives `Hash` / `Eq`.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::GpuProgram;
use super::glsl::UniformType;
use crate::device::{PrimitiveTopology, ProgramId};
use crate::pipeline::RenderState;
use crate::pipeline::state::{
    BlendFactor, BlendOperation, CompareFunction, CullFace, FrontFace, PolygonMode,
    StencilFaceState, StencilOperation,
};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Hashable mirror of the pipeline-shaping part of [`RenderState`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    polygon_mode: PolygonMode,
    cull: Option<CullFace>,
    front_face: FrontFace,
    depth_clamp: bool,
    blend: Option<[(BlendFactor, BlendFactor, BlendOperation); 2]>,
    alpha_to_coverage: bool,
    depth: Option<(CompareFunction, bool)>,
    depth_bias: i32,
    stencil: Option<(u32, StencilFaceState, StencilFaceState)>,
}

impl From<&RenderState> for StateKey {
    fn from(state: &RenderState) -> Self {
        Self {
            polygon_mode: state.polygon_mode,
            cull: state.cull.then_some(state.cull_face),
            front_face: state.front_face,
            depth_clamp: state.depth_clamp,
            blend: state.blend.then_some([
                (state.blend_src_color, state.blend_dst_color, state.blend_op_color),
                (state.blend_src_alpha, state.blend_dst_alpha, state.blend_op_alpha),
            ]),
            alpha_to_coverage: state.alpha_to_coverage,
            depth: state
                .depth_test
                .then_some((state.depth_function, state.depth_write)),
            depth_bias: state.depth_bias as i32,
            stencil: state
                .stencil_test
                .then_some((state.stencil_mask, state.stencil_front, state.stencil_back)),
        }
    }
}

/// Everything a render pipeline depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramId,
    pub state: StateKey,
    pub colors: SmallVec<[Option<wgpu::TextureFormat>; 4]>,
    pub depth: Option<wgpu::TextureFormat>,
    pub samples: u32,
    pub topology: PrimitiveTopology,
}

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct PipelineCache {
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        features: wgpu::Features,
        key: PipelineKey,
        program: &GpuProgram,
    ) -> Option<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Some(pipeline.clone());
        }
        let pipeline = create_pipeline(device, features, &key, program)?;
        self.pipelines.insert(key, pipeline.clone());
        log::debug!("Pipeline cache holds {} pipelines", self.pipelines.len());
        Some(pipeline)
    }

    /// Drops every pipeline built from `program`.
    pub fn evict_program(&mut self, program: ProgramId) {
        self.pipelines.retain(|key, _| key.program != program);
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    features: wgpu::Features,
    key: &PipelineKey,
    program: &GpuProgram,
) -> Option<wgpu::RenderPipeline> {
    let (vertex, fragment) = program.graphics_modules()?;
    let state = &key.state;

    let attributes: Vec<wgpu::VertexAttribute> = program
        .layout
        .vertex_inputs
        .iter()
        .scan(0u64, |offset, input| {
            let attribute = wgpu::VertexAttribute {
                format: vertex_format(input.ty)?,
                offset: *offset,
                shader_location: input.location,
            };
            *offset += input.ty.attribute_size();
            Some(attribute)
        })
        .collect();
    let buffers: SmallVec<[wgpu::VertexBufferLayout<'_>; 1]> = if attributes.is_empty() {
        SmallVec::new()
    } else {
        smallvec::smallvec![wgpu::VertexBufferLayout {
            array_stride: program.layout.vertex_stride(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }]
    };

    let targets: SmallVec<[Option<wgpu::ColorTargetState>; 4]> = key
        .colors
        .iter()
        .map(|format| {
            format.map(|format| wgpu::ColorTargetState {
                format,
                blend: state.blend.filter(|_| is_blendable(format)).map(|[color, alpha]| {
                    wgpu::BlendState {
                        color: blend_component(color),
                        alpha: blend_component(alpha),
                    }
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    let polygon_mode = match state.polygon_mode {
        PolygonMode::Line if features.contains(wgpu::Features::POLYGON_MODE_LINE) => {
            wgpu::PolygonMode::Line
        }
        PolygonMode::Point if features.contains(wgpu::Features::POLYGON_MODE_POINT) => {
            wgpu::PolygonMode::Point
        }
        _ => wgpu::PolygonMode::Fill,
    };

    let depth_stencil = key.depth.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: Some(state.depth.is_some_and(|(_, write)| write)),
        depth_compare: Some(
            state
                .depth
                .map_or(wgpu::CompareFunction::Always, |(compare, _)| compare_function(compare)),
        ),
        stencil: match state.stencil {
            Some((mask, front, back)) => wgpu::StencilState {
                front: stencil_face(front),
                back: stencil_face(back),
                read_mask: mask,
                write_mask: mask,
            },
            None => wgpu::StencilState::default(),
        },
        bias: wgpu::DepthBiasState {
            constant: state.depth_bias,
            ..Default::default()
        },
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: program.label.as_deref(),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("main"),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("main"),
            targets: &targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: primitive_topology(key.topology),
            strip_index_format: None,
            front_face: match state.front_face {
                FrontFace::Ccw => wgpu::FrontFace::Ccw,
                FrontFace::Cw => wgpu::FrontFace::Cw,
            },
            cull_mode: match state.cull {
                Some(CullFace::Front) => Some(wgpu::Face::Front),
                Some(CullFace::Back) => Some(wgpu::Face::Back),
                // both faces are skipped before a draw gets here
                Some(CullFace::FrontAndBack) | None => None,
            },
            unclipped_depth: state.depth_clamp
                && features.contains(wgpu::Features::DEPTH_CLIP_CONTROL),
            polygon_mode,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: key.samples,
            mask: !0,
            alpha_to_coverage_enabled: state.alpha_to_coverage && key.samples > 1,
        },
        multiview_mask: None,
        cache: None,
    });
    Some(pipeline)
}

// ─── Conversions ─────────────────────────────────────────────────────────────

pub fn vertex_format(ty: UniformType) -> Option<wgpu::VertexFormat> {
    Some(match ty {
        UniformType::Float => wgpu::VertexFormat::Float32,
        UniformType::Vec2 => wgpu::VertexFormat::Float32x2,
        UniformType::Vec3 => wgpu::VertexFormat::Float32x3,
        UniformType::Vec4 => wgpu::VertexFormat::Float32x4,
        UniformType::Int => wgpu::VertexFormat::Sint32,
        UniformType::IVec2 => wgpu::VertexFormat::Sint32x2,
        UniformType::IVec3 => wgpu::VertexFormat::Sint32x3,
        UniformType::IVec4 => wgpu::VertexFormat::Sint32x4,
        UniformType::UInt => wgpu::VertexFormat::Uint32,
        UniformType::UVec2 => wgpu::VertexFormat::Uint32x2,
        UniformType::UVec3 => wgpu::VertexFormat::Uint32x3,
        UniformType::UVec4 => wgpu::VertexFormat::Uint32x4,
        UniformType::Bool | UniformType::Mat2 | UniformType::Mat3 | UniformType::Mat4 => {
            return None;
        }
    })
}

fn is_blendable(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba16Float
    )
}

fn primitive_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn compare_function(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn blend_component(
    (src, dst, operation): (BlendFactor, BlendFactor, BlendOperation),
) -> wgpu::BlendComponent {
    let operation = match operation {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOperation::Min => wgpu::BlendOperation::Min,
        BlendOperation::Max => wgpu::BlendOperation::Max,
    };
    // min and max ignore the factors but wgpu insists on One
    if matches!(
        operation,
        wgpu::BlendOperation::Min | wgpu::BlendOperation::Max
    ) {
        return wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation,
        };
    }
    wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::ConstantColor => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusConstantColor => wgpu::BlendFactor::OneMinusConstant,
        BlendFactor::SrcAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

fn stencil_face(face: StencilFaceState) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: compare_function(face.compare),
        fail_op: stencil_operation(face.fail_op),
        depth_fail_op: stencil_operation(face.depth_fail_op),
        pass_op: stencil_operation(face.pass_op),
    }
}

fn stencil_operation(operation: StencilOperation) -> wgpu::StencilOperation {
    match operation {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
        StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_constant_does_not_split_pipelines() {
        let mut a = RenderState::default();
        let mut b = RenderState::default();
        a.blend_constant = glam::Vec4::ONE;
        b.blend_constant = glam::Vec4::ZERO;
        assert_eq!(StateKey::from(&a), StateKey::from(&b));

        b.depth_write = false;
        assert_ne!(StateKey::from(&a), StateKey::from(&b));
    }

    #[test]
    fn disabled_tests_ignore_their_settings() {
        let mut a = RenderState::default();
        a.stencil_test = false;
        a.stencil_mask = 0x0F;
        assert_eq!(StateKey::from(&a), StateKey::from(&RenderState::default()));
    }

    #[test]
    fn min_max_force_unit_factors() {
        let component = blend_component((
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendOperation::Max,
        ));
        assert_eq!(component.src_factor, wgpu::BlendFactor::One);
        assert_eq!(component.dst_factor, wgpu::BlendFactor::One);
    }
}
