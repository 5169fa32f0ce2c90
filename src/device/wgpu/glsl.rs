//! GL-style GLSL to naga GLSL.
//!
//! naga only reads Vulkan-flavored GLSL 4.50: resources need a set and a
//! binding, interface variables need locations, and loose uniforms have to
//! live in a block. [`prepare_program`] rewrites every stage of a program in
//! one go so that the stages agree on a single resource layout:
//!
//! ```text
//! set 0   binding 0        loose uniforms of all stages (std140)
//!         binding 1 + n    uniform block n
//! set 1   binding 2n / 2n+1  texture / sampler of sampler slot n
//! set 2   binding n        storage block n
//! set 3   binding n        image n
//! ```
//!
//! Varyings get their locations by name, so a vertex output always meets the
//! fragment input of the same name. Rewrites keep every original line on its
//! own line; a short header is inserted after `#version` and
//! [`PreparedStage::original_line`] maps naga's line numbers back.

use glam::Mat3;
use rustc_hash::FxHashMap;

use crate::device::{TextureFormat, TextureKind};
use crate::errors::CompileError;
use crate::pipeline::UniformValue;
use crate::shader::ShaderStage;

const VERSION_LINE: &str = "#version 450";
const GLOBALS_BLOCK: &str = "PrismGlobals";
const BOOL_PREFIX: &str = "prism_bool_";

/// Words that may precede the type of a global declaration.
const QUALIFIERS: &[&str] = &[
    "uniform",
    "in",
    "out",
    "buffer",
    "flat",
    "smooth",
    "noperspective",
    "centroid",
    "readonly",
    "writeonly",
    "coherent",
    "restrict",
    "volatile",
    "highp",
    "mediump",
    "lowp",
];

// ─── Layout ──────────────────────────────────────────────────────────────────

/// Non-opaque types allowed for loose uniforms and vertex inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Bool,
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "uint" => Self::UInt,
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "uvec2" => Self::UVec2,
            "uvec3" => Self::UVec3,
            "uvec4" => Self::UVec4,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            _ => return None,
        })
    }

    /// Name used inside the globals block. Booleans are not host-shareable
    /// and travel as `uint`.
    fn block_type(self) -> &'static str {
        match self {
            Self::Bool | Self::UInt => "uint",
            Self::Int => "int",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::UVec2 => "uvec2",
            Self::UVec3 => "uvec3",
            Self::UVec4 => "uvec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
        }
    }

    /// std140 base alignment and size in bytes.
    fn std140(self) -> (u64, u64) {
        match self {
            Self::Bool | Self::Int | Self::UInt | Self::Float => (4, 4),
            Self::Vec2 | Self::IVec2 | Self::UVec2 => (8, 8),
            Self::Vec3 | Self::IVec3 | Self::UVec3 => (16, 12),
            Self::Vec4 | Self::IVec4 | Self::UVec4 => (16, 16),
            Self::Mat2 => (16, 32),
            Self::Mat3 => (16, 48),
            Self::Mat4 => (16, 64),
        }
    }

    /// Tightly packed size as a vertex attribute.
    #[must_use]
    pub fn attribute_size(self) -> u64 {
        match self {
            Self::Mat2 => 16,
            Self::Mat3 => 36,
            _ => self.std140().1,
        }
    }

    /// std140 bytes of `value`, or `None` when the value does not fit the
    /// declared type.
    fn encode(self, value: &UniformValue) -> Option<Vec<u8>> {
        let bytes = match (self, value) {
            (Self::Float, UniformValue::Float(v)) => bytemuck::bytes_of(v).to_vec(),
            (Self::Vec2, UniformValue::Vec2(v)) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            (Self::Vec3, UniformValue::Vec3(v)) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            (Self::Vec4, UniformValue::Vec4(v)) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            (Self::Int, UniformValue::Int(v)) => bytemuck::bytes_of(v).to_vec(),
            (Self::Int, UniformValue::Bool(v)) => bytemuck::bytes_of(&i32::from(*v)).to_vec(),
            (Self::Bool, UniformValue::Bool(v)) => bytemuck::bytes_of(&u32::from(*v)).to_vec(),
            (Self::Bool, UniformValue::Int(v)) => {
                bytemuck::bytes_of(&u32::from(*v != 0)).to_vec()
            }
            (Self::UInt, UniformValue::UInt(v)) => bytemuck::bytes_of(v).to_vec(),
            (Self::IVec2, UniformValue::IVec2(v)) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            (Self::IVec3, UniformValue::IVec3(v)) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            (Self::IVec4, UniformValue::IVec4(v)) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            (Self::Mat3, UniformValue::Mat3(m)) => padded_mat3(m),
            (Self::Mat4, UniformValue::Mat4(m)) => {
                bytemuck::cast_slice(&m.to_cols_array()).to_vec()
            }
            _ => return None,
        };
        Some(bytes)
    }
}

/// Columns of a `mat3` padded to `vec4` stride.
fn padded_mat3(m: &Mat3) -> Vec<u8> {
    let mut columns = [0f32; 12];
    for (i, column) in [m.x_axis, m.y_axis, m.z_axis].into_iter().enumerate() {
        columns[i * 4..i * 4 + 3].copy_from_slice(&column.to_array());
    }
    bytemuck::cast_slice(&columns).to_vec()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub ty: UniformType,
    pub offset: u64,
    pub array_len: Option<u32>,
}

/// How a sampled texture is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Float,
    Sint,
    Uint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub slot: u32,
    pub kind: TextureKind,
    pub sample: SampleKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBinding {
    pub name: String,
    pub slot: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBinding {
    pub name: String,
    pub slot: u32,
    pub kind: TextureKind,
    pub format: TextureFormat,
    pub access: ImageAccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub name: String,
    pub ty: UniformType,
    pub location: u32,
}

/// Resources of a whole program after rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    pub uniforms: Vec<UniformField>,
    /// Size of the globals block, zero when there are no loose uniforms.
    pub uniform_size: u64,
    pub uniform_blocks: Vec<BlockBinding>,
    pub storage_blocks: Vec<BlockBinding>,
    pub samplers: Vec<SamplerBinding>,
    pub images: Vec<ImageBinding>,
    /// Sorted by location.
    pub vertex_inputs: Vec<VertexInput>,
}

impl ProgramLayout {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.uniforms.iter().find(|f| f.name == name)
    }

    /// Interleaved stride of the vertex inputs.
    #[must_use]
    pub fn vertex_stride(&self) -> u64 {
        self.vertex_inputs.iter().map(|i| i.ty.attribute_size()).sum()
    }

    /// Writes `value` into the globals block data. Returns `false` when the
    /// name is unknown or the value does not match the declared type.
    pub fn write_uniform(&self, data: &mut [u8], name: &str, value: &UniformValue) -> bool {
        let Some(field) = self.field(name) else {
            return false;
        };
        let Some(bytes) = field.ty.encode(value) else {
            log::debug!("Uniform '{name}' is {:?}, ignoring {value:?}", field.ty);
            return false;
        };
        let start = field.offset as usize;
        match data.get_mut(start..start + bytes.len()) {
            Some(slot) => {
                slot.copy_from_slice(&bytes);
                true
            }
            None => false,
        }
    }

    fn add_uniform(&mut self, name: &str, ty: UniformType, array_len: Option<u32>) {
        if self.field(name).is_none() {
            self.uniforms.push(UniformField {
                name: name.to_owned(),
                ty,
                offset: 0,
                array_len,
            });
        }
    }

    /// Assigns std140 offsets in declaration order.
    fn finish_uniforms(&mut self) {
        let mut offset = 0u64;
        for field in &mut self.uniforms {
            let (mut align, mut size) = field.ty.std140();
            if let Some(len) = field.array_len {
                align = align.max(16);
                size = size.next_multiple_of(16) * u64::from(len);
            }
            offset = offset.next_multiple_of(align);
            field.offset = offset;
            offset += size;
        }
        self.uniform_size = offset.next_multiple_of(16);
    }

    /// One-line declaration of the globals block.
    fn globals_block(&self) -> Option<String> {
        if self.uniforms.is_empty() {
            return None;
        }
        let mut block = format!("layout(set = 0, binding = 0, std140) uniform {GLOBALS_BLOCK} {{");
        for field in &self.uniforms {
            let name = if field.ty == UniformType::Bool {
                format!("{BOOL_PREFIX}{}", field.name)
            } else {
                field.name.clone()
            };
            block.push_str(&format!(" {} {name}", field.ty.block_type()));
            if let Some(len) = field.array_len {
                block.push_str(&format!("[{len}]"));
            }
            block.push(';');
        }
        block.push_str(" };");
        Some(block)
    }
}

// ─── Prepared stages ─────────────────────────────────────────────────────────

/// Rewritten source of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStage {
    pub stage: ShaderStage,
    pub source: String,
    /// Original lines above the inserted header.
    inserted_at: u32,
    header_lines: u32,
}

impl PreparedStage {
    /// Maps a 1-based line of [`source`](Self::source) back to the stage
    /// source the device was given.
    #[must_use]
    pub fn original_line(&self, line: u32) -> u32 {
        if line <= self.inserted_at {
            line
        } else if line <= self.inserted_at + self.header_lines {
            self.inserted_at.max(1)
        } else {
            line - self.header_lines
        }
    }
}

/// Rewrites all stages of one program.
pub fn prepare_program(
    stages: &[(ShaderStage, &str)],
) -> Result<(ProgramLayout, Vec<PreparedStage>), CompileError> {
    let mut scanner = Scanner::default();
    let scans = stages
        .iter()
        .map(|&(stage, source)| scanner.scan(stage, source))
        .collect::<Result<Vec<_>, _>>()?;

    let mut layout = scanner.layout;
    layout.finish_uniforms();
    layout.vertex_inputs.sort_by_key(|i| i.location);
    let globals = layout.globals_block();

    let prepared = stages
        .iter()
        .zip(scans)
        .map(|(&(stage, source), scan)| assemble(stage, source, &scan, globals.as_deref()))
        .collect();

    Ok((layout, prepared))
}

/// Edits collected from one stage.
#[derive(Debug, Default)]
struct StageScan {
    /// Replacement text per 0-based line index.
    edits: Vec<(usize, String)>,
    bools: Vec<String>,
    /// Sampler names with their combined GLSL type.
    samplers: Vec<(String, &'static str)>,
}

#[derive(Debug, Default)]
struct Scanner {
    layout: ProgramLayout,
    varyings: FxHashMap<String, u32>,
    next_uniform_block: u32,
    next_storage_block: u32,
    next_sampler: u32,
    next_image: u32,
}

impl Scanner {
    fn scan(&mut self, stage: ShaderStage, source: &str) -> Result<StageScan, CompileError> {
        let mut scan = StageScan::default();
        let mut depth = 0i32;
        let mut next_attribute = 0u32;
        let mut next_output = 0u32;

        for (index, line) in source.lines().enumerate() {
            let code = strip_comment(line);
            let at_global_scope = depth == 0;
            depth += brace_delta(code);
            if !at_global_scope {
                continue;
            }
            let Some(decl) = Declaration::parse(code) else {
                continue;
            };
            let line_number = index + 1;
            let fail = |message: String| {
                CompileError::new(stage, format!("ERROR: 0:{line_number}: {message}"))
            };

            if decl.is_block {
                let replacement = if decl.has("uniform") {
                    let slot = decl.binding().unwrap_or(self.next_uniform_block);
                    self.next_uniform_block = self.next_uniform_block.max(slot + 1);
                    push_block(&mut self.layout.uniform_blocks, decl.ty, slot);
                    Some(decl.rewrite_layout(&format!("set = 0, binding = {}", slot + 1)))
                } else if decl.has("buffer") {
                    let slot = decl.binding().unwrap_or(self.next_storage_block);
                    self.next_storage_block = self.next_storage_block.max(slot + 1);
                    push_block(&mut self.layout.storage_blocks, decl.ty, slot);
                    Some(decl.rewrite_layout(&format!("set = 2, binding = {slot}")))
                } else {
                    None
                };
                if let Some(replacement) = replacement {
                    scan.edits.push((index, replacement));
                }
                continue;
            }

            if decl.has("uniform") {
                let replacement = self.scan_uniform(&decl, &mut scan).map_err(fail)?;
                scan.edits.push((index, replacement));
            } else if decl.has("in") || decl.has("out") {
                let input = decl.has("in");
                let mut parts = Vec::with_capacity(decl.names.len());
                for &(name, _) in &decl.names {
                    let location = match (stage, input) {
                        (ShaderStage::Vertex, true) => {
                            let ty = UniformType::parse(decl.ty).ok_or_else(|| {
                                fail(format!("unsupported vertex input type '{}'", decl.ty))
                            })?;
                            let location = decl.location().unwrap_or(next_attribute);
                            next_attribute = location + 1;
                            self.layout.vertex_inputs.push(VertexInput {
                                name: name.to_owned(),
                                ty,
                                location,
                            });
                            location
                        }
                        (ShaderStage::Fragment, false) => {
                            let location = decl.location().unwrap_or(next_output);
                            next_output = location + 1;
                            location
                        }
                        (ShaderStage::Compute, _) => break,
                        _ => self.varying_location(name, decl.location()),
                    };
                    parts.push(decl.declare_one(&format!("location = {location}"), name));
                }
                if !parts.is_empty() {
                    scan.edits.push((index, parts.join(" ")));
                }
            }
        }

        Ok(scan)
    }

    /// Handles a `uniform` declaration that is not a block.
    fn scan_uniform(&mut self, decl: &Declaration<'_>, scan: &mut StageScan) -> Result<String, String> {
        if let Some(&(glsl, view, sample)) = sampler_type(decl.ty) {
            let mut parts = Vec::new();
            for &(name, _) in &decl.names {
                let slot = self.sampler_slot(name, decl.binding(), view, sample);
                let kind = texture_kind(view);
                parts.push(format!(
                    "layout(set = 1, binding = {}) uniform {} {name}_texture; \
                     layout(set = 1, binding = {}) uniform sampler {name}_sampler;",
                    slot * 2,
                    texture_type(kind, sample),
                    slot * 2 + 1,
                ));
                scan.samplers.push((name.to_owned(), glsl));
            }
            return Ok(parts.join(" "));
        }

        if let Some(kind) = image_type(decl.ty) {
            let format = decl
                .image_format()
                .ok_or_else(|| format!("image '{}' needs a supported format qualifier", decl.ty))?;
            let access = if decl.has("readonly") {
                ImageAccess::ReadOnly
            } else if decl.has("writeonly") {
                ImageAccess::WriteOnly
            } else {
                ImageAccess::ReadWrite
            };
            let mut parts = Vec::new();
            for &(name, _) in &decl.names {
                let slot = decl.binding().unwrap_or(self.next_image);
                self.next_image = self.next_image.max(slot + 1);
                if !self.layout.images.iter().any(|i| i.name == name) {
                    self.layout.images.push(ImageBinding {
                        name: name.to_owned(),
                        slot,
                        kind,
                        format,
                        access,
                    });
                }
                parts.push(decl.declare_one(&format!("set = 3, binding = {slot}"), name));
            }
            return Ok(parts.join(" "));
        }

        let ty = UniformType::parse(decl.ty)
            .ok_or_else(|| format!("unsupported uniform type '{}'", decl.ty))?;
        for &(name, array_len) in &decl.names {
            self.layout.add_uniform(name, ty, array_len);
            if ty == UniformType::Bool {
                scan.bools.push(name.to_owned());
            }
        }
        Ok(String::new())
    }

    fn sampler_slot(
        &mut self,
        name: &str,
        explicit: Option<u32>,
        view: TextureView,
        sample: SampleKind,
    ) -> u32 {
        if let Some(existing) = self.layout.samplers.iter().find(|s| s.name == name) {
            return existing.slot;
        }
        let slot = explicit.unwrap_or(self.next_sampler);
        self.next_sampler = self.next_sampler.max(slot + 1);
        self.layout.samplers.push(SamplerBinding {
            name: name.to_owned(),
            slot,
            kind: texture_kind(view),
            sample,
        });
        slot
    }

    fn varying_location(&mut self, name: &str, explicit: Option<u32>) -> u32 {
        if let Some(location) = explicit {
            self.varyings.insert(name.to_owned(), location);
            return location;
        }
        if let Some(&location) = self.varyings.get(name) {
            return location;
        }
        let location = (0..)
            .find(|l| !self.varyings.values().any(|v| v == l))
            .unwrap_or_default();
        self.varyings.insert(name.to_owned(), location);
        location
    }
}

fn push_block(blocks: &mut Vec<BlockBinding>, name: &str, slot: u32) {
    if !blocks.iter().any(|b| b.name == name) {
        blocks.push(BlockBinding {
            name: name.to_owned(),
            slot,
        });
    }
}

/// Applies the collected edits and inserts the header.
fn assemble(stage: ShaderStage, source: &str, scan: &StageScan, globals: Option<&str>) -> PreparedStage {
    let mut lines: Vec<String> = source.lines().map(str::to_owned).collect();
    for (index, replacement) in &scan.edits {
        lines[*index].clone_from(replacement);
    }

    let version = lines.iter().position(|l| l.trim_start().starts_with("#version"));
    let mut header = Vec::new();
    if version.is_none() {
        header.push(VERSION_LINE.to_owned());
    }
    header.extend(globals.map(str::to_owned));
    for name in &scan.bools {
        header.push(format!("#define {name} bool({BOOL_PREFIX}{name})"));
    }

    let inserted_at = match version {
        Some(version) => {
            lines[version] = VERSION_LINE.to_owned();
            // #extension directives must stay ahead of any declaration
            let mut after = version + 1;
            while lines
                .get(after)
                .is_some_and(|l| l.trim_start().starts_with("#extension"))
            {
                after += 1;
            }
            after
        }
        None => 0,
    };

    let header_lines = header.len() as u32;
    let mut output = lines[..inserted_at].to_vec();
    output.extend(header);
    output.extend_from_slice(&lines[inserted_at..]);

    let mut text = output.join("\n");
    text.push('\n');
    for (name, glsl) in &scan.samplers {
        text = replace_identifier(&text, name, &format!("{glsl}({name}_texture, {name}_sampler)"));
    }
    if stage == ShaderStage::Vertex {
        text = replace_identifier(&text, "gl_VertexID", "gl_VertexIndex");
        text = replace_identifier(&text, "gl_InstanceID", "gl_InstanceIndex");
    }

    PreparedStage {
        stage,
        source: text,
        inserted_at: inserted_at as u32,
        header_lines,
    }
}

// ─── Declarations ────────────────────────────────────────────────────────────

/// A single-line global declaration such as
/// `layout(location = 0) flat out int id;` or the header of a block.
#[derive(Debug)]
struct Declaration<'a> {
    layout: Vec<(&'a str, Option<&'a str>)>,
    qualifiers: Vec<&'a str>,
    ty: &'a str,
    /// Declarators with their array length.
    names: Vec<(&'a str, Option<u32>)>,
    is_block: bool,
    /// Text after the block name, `{` included.
    block_rest: &'a str,
}

impl<'a> Declaration<'a> {
    fn parse(code: &'a str) -> Option<Self> {
        let mut rest = code.trim();
        let mut layout = Vec::new();
        if let Some(after) = rest.strip_prefix("layout") {
            let open = after.find('(')?;
            let close = after.find(')')?;
            for item in after[open + 1..close].split(',') {
                let mut kv = item.splitn(2, '=');
                let key = kv.next()?.trim();
                if !key.is_empty() {
                    layout.push((key, kv.next().map(str::trim)));
                }
            }
            rest = after[close + 1..].trim_start();
        }

        let mut qualifiers = Vec::new();
        loop {
            let word_end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let word = &rest[..word_end];
            if !QUALIFIERS.contains(&word) {
                break;
            }
            qualifiers.push(word);
            rest = rest[word_end..].trim_start();
        }
        if !qualifiers
            .iter()
            .any(|q| matches!(*q, "uniform" | "in" | "out" | "buffer"))
        {
            return None;
        }

        let ty_end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
        let ty = &rest[..ty_end];
        if ty.is_empty() {
            return None;
        }
        let after_ty = rest[ty_end..].trim_start();

        if after_ty.is_empty() || after_ty.starts_with('{') {
            return Some(Self {
                layout,
                qualifiers,
                ty,
                names: Vec::new(),
                is_block: true,
                block_rest: after_ty,
            });
        }

        let statement = &after_ty[..after_ty.find(';')?];
        if statement.contains('(') || statement.contains('{') {
            return None;
        }
        let names = statement
            .split(',')
            .map(|declarator| {
                let declarator = declarator.split('=').next().unwrap_or_default().trim();
                match declarator.split_once('[') {
                    Some((name, len)) => (
                        name.trim(),
                        len.trim_end_matches(']').trim().parse().ok(),
                    ),
                    None => (declarator, None),
                }
            })
            .filter(|(name, _)| !name.is_empty())
            .collect::<Vec<_>>();
        if names.is_empty() {
            return None;
        }

        Some(Self {
            layout,
            qualifiers,
            ty,
            names,
            is_block: false,
            block_rest: "",
        })
    }

    fn has(&self, qualifier: &str) -> bool {
        self.qualifiers.contains(&qualifier)
    }

    fn layout_value(&self, key: &str) -> Option<u32> {
        self.layout
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.and_then(|v| v.parse().ok()))
    }

    fn binding(&self) -> Option<u32> {
        self.layout_value("binding")
    }

    fn location(&self) -> Option<u32> {
        self.layout_value("location")
    }

    fn image_format(&self) -> Option<TextureFormat> {
        self.layout.iter().find_map(|(key, value)| {
            if value.is_some() {
                return None;
            }
            Some(match *key {
                "rgba8" => TextureFormat::Rgba8Unorm,
                "rgba16f" => TextureFormat::Rgba16Float,
                "rgba32f" => TextureFormat::Rgba32Float,
                "r32f" => TextureFormat::R32Float,
                "r32ui" => TextureFormat::R32Uint,
                _ => return None,
            })
        })
    }

    /// Layout items other than the ones the rewrite assigns.
    fn kept_layout(&self) -> Vec<String> {
        self.layout
            .iter()
            .filter(|(key, _)| !matches!(*key, "binding" | "set" | "location"))
            .map(|(key, value)| match value {
                Some(value) => format!("{key} = {value}"),
                None => (*key).to_owned(),
            })
            .collect()
    }

    fn layout_prefix(&self, assigned: &str) -> String {
        let mut items = vec![assigned.to_owned()];
        items.extend(self.kept_layout());
        format!("layout({})", items.join(", "))
    }

    /// Block header with a new set and binding.
    fn rewrite_layout(&self, assigned: &str) -> String {
        format!(
            "{} {} {} {}",
            self.layout_prefix(assigned),
            self.qualifiers.join(" "),
            self.ty,
            self.block_rest
        )
        .trim_end()
        .to_owned()
    }

    /// One declarator of this declaration with its own layout.
    fn declare_one(&self, assigned: &str, name: &str) -> String {
        let array = self
            .names
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, len)| *len)
            .map(|len| format!("[{len}]"))
            .unwrap_or_default();
        format!(
            "{} {} {} {name}{array};",
            self.layout_prefix(assigned),
            self.qualifiers.join(" "),
            self.ty
        )
    }
}

// ─── Opaque types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureView {
    D2,
    Cube,
    D3,
}

/// Combined sampler types: GLSL name, view, sample kind.
const SAMPLER_TYPES: &[(&str, TextureView, SampleKind)] = &[
    ("sampler2D", TextureView::D2, SampleKind::Float),
    ("samplerCube", TextureView::Cube, SampleKind::Float),
    ("sampler3D", TextureView::D3, SampleKind::Float),
    ("isampler2D", TextureView::D2, SampleKind::Sint),
    ("usampler2D", TextureView::D2, SampleKind::Uint),
    ("isampler3D", TextureView::D3, SampleKind::Sint),
    ("usampler3D", TextureView::D3, SampleKind::Uint),
];

fn sampler_type(ty: &str) -> Option<&'static (&'static str, TextureView, SampleKind)> {
    SAMPLER_TYPES.iter().find(|(name, ..)| *name == ty)
}

fn image_type(ty: &str) -> Option<TextureKind> {
    match ty {
        "image2D" | "uimage2D" | "iimage2D" => Some(TextureKind::D2),
        "image3D" | "uimage3D" | "iimage3D" => Some(TextureKind::D3),
        _ => None,
    }
}

fn texture_kind(view: TextureView) -> TextureKind {
    match view {
        TextureView::D2 => TextureKind::D2,
        TextureView::Cube => TextureKind::Cube,
        TextureView::D3 => TextureKind::D3,
    }
}

fn texture_type(kind: TextureKind, sample: SampleKind) -> &'static str {
    match (kind, sample) {
        (TextureKind::D2, SampleKind::Float) => "texture2D",
        (TextureKind::D2, SampleKind::Sint) => "itexture2D",
        (TextureKind::D2, SampleKind::Uint) => "utexture2D",
        (TextureKind::Cube, _) => "textureCube",
        (TextureKind::D3, SampleKind::Float) => "texture3D",
        (TextureKind::D3, SampleKind::Sint) => "itexture3D",
        (TextureKind::D3, SampleKind::Uint) => "utexture3D",
    }
}

// ─── Text helpers ────────────────────────────────────────────────────────────

fn strip_comment(line: &str) -> &str {
    line.find("//").map_or(line, |at| &line[..at])
}

fn brace_delta(code: &str) -> i32 {
    code.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Replaces whole-word occurrences of `from`, skipping member accesses.
fn replace_identifier(source: &str, from: &str, to: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(found) = source[search..].find(from) {
        let start = search + found;
        let end = start + from.len();
        let bounded_left = start == 0 || !(is_identifier_byte(bytes[start - 1]) || bytes[start - 1] == b'.');
        let bounded_right = end == bytes.len() || !is_identifier_byte(bytes[end]);
        if bounded_left && bounded_right {
            out.push_str(&source[copied..start]);
            out.push_str(to);
            copied = end;
        }
        search = end;
    }
    out.push_str(&source[copied..]);
    out
}
