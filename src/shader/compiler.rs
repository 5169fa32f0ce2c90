//! Compiler Adapter
//!
//! Turns the stage descriptions of a pass into linked programs:
//!
//! ```text
//! file ──► ProjectFiles ──┬─ GLSL ──► IncludeResolver ──► inject_macros ─┐
//!                         └─ HLSL / Vulkan GLSL ──► ShaderTranscompiler ─┴─► StageCode
//! StageCode* ──► GpuDevice::create_program ──► ProgramId | CompileError ──► MessageStack
//! ```
//!
//! Every failure is reported to the message stack under the item's name and
//! leaves the program as `None`. Nothing here returns an error to the caller.

use std::path::{Path, PathBuf};

use super::preprocessor::{IncludeResolver, inject_macros};
use super::rewrite::DEBUG_ID_FRAGMENT;
use super::{ShaderLanguage, ShaderStage};
use crate::device::{GpuDevice, ProgramDescriptor, ProgramId, ProgramStages, StageSource};
use crate::errors::CompileError;
use crate::pipeline::{AudioPass, ComputePass, ShaderMacro, ShaderPass, ShaderStageDesc};
use crate::services::{EngineServices, Severity, TranscompileRequest};
use crate::settings::EngineSettings;
use crate::utils::normalize_path;

/// Entry point of every stage handed to the device. Transcompiled stages are
/// renamed to it.
const GLSL_ENTRY: &str = "main";

/// Final GLSL text of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCode {
    pub source: String,
    /// Lines added above the author's code by preprocessing.
    pub line_bias: u32,
}

impl StageCode {
    /// Wraps source that did not go through the preprocessor.
    #[must_use]
    pub fn raw(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            line_bias: 0,
        }
    }

    fn as_stage(&self) -> StageSource<'_> {
        StageSource {
            source: &self.source,
            entry: GLSL_ENTRY,
        }
    }
}

/// Sources a shader pass was last built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSources {
    pub vertex: StageCode,
    pub fragment: StageCode,
    pub geometry: Option<StageCode>,
    /// Stage files and every file they include.
    pub files: Vec<PathBuf>,
}

impl PassSources {
    #[must_use]
    pub fn depends_on(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f == path)
    }

    fn stage(&self, stage: ShaderStage) -> Option<&StageCode> {
        match stage {
            ShaderStage::Vertex => Some(&self.vertex),
            ShaderStage::Fragment => Some(&self.fragment),
            ShaderStage::Geometry => self.geometry.as_ref(),
            ShaderStage::Compute => None,
        }
    }
}

/// Source a compute pass was last built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeSource {
    pub code: StageCode,
    pub files: Vec<PathBuf>,
}

/// Programs produced for a shader pass.
#[derive(Debug, Default)]
pub struct PassPrograms {
    pub program: Option<ProgramId>,
    /// Vertex stage linked with the id-encoding fragment stage.
    pub debug_program: Option<ProgramId>,
}

/// One parsed line of a compiler log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    pub severity: Severity,
    /// Line in the author's file, already corrected by the line bias.
    pub line: Option<u32>,
    pub text: String,
}

/// Parses a GLSL compiler log.
///
/// Understands the `ERROR: 0:12: message` / `WARNING: 0:12: message` layout,
/// the `0(12) : error C0000: message` layout, and falls back to line-less
/// records for anything else. Reported lines are moved up by `line_bias`
/// and never go below 1.
#[must_use]
pub fn parse_compile_log(log: &str, line_bias: u32) -> Vec<CompileDiagnostic> {
    let map_line = |line: u32| line.saturating_sub(line_bias).max(1);

    log.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            if let Some((severity, rest)) = strip_severity_prefix(line) {
                return match split_file_line(rest) {
                    Some((number, text)) => CompileDiagnostic {
                        severity,
                        line: Some(map_line(number)),
                        text: text.to_owned(),
                    },
                    None => CompileDiagnostic {
                        severity,
                        line: None,
                        text: rest.to_owned(),
                    },
                };
            }

            if let Some((number, text)) = split_paren_line(line) {
                return CompileDiagnostic {
                    severity: severity_from_text(text),
                    line: Some(map_line(number)),
                    text: text.to_owned(),
                };
            }

            CompileDiagnostic {
                severity: severity_from_text(line),
                line: None,
                text: line.to_owned(),
            }
        })
        .collect()
}

fn strip_severity_prefix(line: &str) -> Option<(Severity, &str)> {
    if let Some(rest) = line.strip_prefix("ERROR:") {
        Some((Severity::Error, rest.trim_start()))
    } else {
        line.strip_prefix("WARNING:")
            .map(|rest| (Severity::Warning, rest.trim_start()))
    }
}

/// `0:12: message` → `(12, "message")`
fn split_file_line(rest: &str) -> Option<(u32, &str)> {
    let (file, after) = rest.split_once(':')?;
    file.trim().parse::<u32>().ok()?;
    let (line, text) = after.split_once(':')?;
    let line = line.trim().parse::<u32>().ok()?;
    Some((line, text.trim()))
}

/// `0(12) : error C0000: message` → `(12, "error C0000: message")`
fn split_paren_line(line: &str) -> Option<(u32, &str)> {
    let open = line.find('(')?;
    line[..open].trim().parse::<u32>().ok()?;
    let close = open + line[open..].find(')')?;
    let number = line[open + 1..close].trim().parse::<u32>().ok()?;
    let text = line[close + 1..].trim_start();
    let text = text.strip_prefix(':').unwrap_or(text).trim();
    Some((number, text))
}

fn severity_from_text(text: &str) -> Severity {
    if text.to_ascii_lowercase().contains("warning") {
        Severity::Warning
    } else {
        Severity::Error
    }
}

/// Builds programs for pipeline items, reporting to the message stack.
pub struct ShaderCompiler<'a> {
    settings: &'a EngineSettings,
    services: &'a mut EngineServices,
}

impl<'a> ShaderCompiler<'a> {
    pub fn new(settings: &'a EngineSettings, services: &'a mut EngineServices) -> Self {
        Self { settings, services }
    }

    // ── Stage loading ────────────────────────────────────────────────────────

    /// Loads one stage and turns it into compilable GLSL.
    ///
    /// Included files are appended to `files`.
    pub fn load_stage(
        &mut self,
        group: &str,
        stage: ShaderStage,
        desc: &ShaderStageDesc,
        macros: &[ShaderMacro],
        files: &mut Vec<PathBuf>,
    ) -> Option<StageCode> {
        let source = match self.services.project.read_to_string(&desc.path) {
            Ok(source) => source,
            Err(err) => {
                self.services.messages.add(
                    group,
                    Severity::Error,
                    format!("Failed to load \"{}\": {err}", desc.path.display()),
                    None,
                    Some(stage),
                );
                return None;
            }
        };
        files.push(normalize_path(&desc.path));

        let language = self.settings.language_of(&desc.path);
        if language.is_native() {
            Some(self.preprocess(group, stage, &source, &desc.path, macros, files))
        } else {
            self.transcompile(group, stage, &source, language, &desc.entry, macros)
                .map(StageCode::raw)
        }
    }

    fn preprocess(
        &mut self,
        group: &str,
        stage: ShaderStage,
        source: &str,
        path: &Path,
        macros: &[ShaderMacro],
        files: &mut Vec<PathBuf>,
    ) -> StageCode {
        let resolver = IncludeResolver::new(&*self.services.project, &self.settings.include_paths);
        let expanded = resolver.expand(source, path);

        for diagnostic in &expanded.diagnostics {
            self.services
                .messages
                .add(group, diagnostic.severity, diagnostic.text.as_str(), None, Some(stage));
        }
        files.extend(expanded.includes);

        let mut text = expanded.source;
        let defines = inject_macros(&mut text, macros);

        StageCode {
            source: text,
            line_bias: expanded.line_bias + defines,
        }
    }

    fn transcompile(
        &mut self,
        group: &str,
        stage: ShaderStage,
        source: &str,
        language: ShaderLanguage,
        entry: &str,
        macros: &[ShaderMacro],
    ) -> Option<String> {
        let Some(transcompiler) = self.services.transcompiler.as_deref() else {
            self.services.messages.add(
                group,
                Severity::Error,
                "No transcompiler available",
                None,
                Some(stage),
            );
            return None;
        };

        let request = TranscompileRequest {
            source,
            language,
            stage,
            entry,
            macros,
        };
        match transcompiler.transcompile(&request) {
            Ok(glsl) => Some(glsl),
            Err(log) => {
                for line in log.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    self.services
                        .messages
                        .add(group, Severity::Error, line, None, Some(stage));
                }
                None
            }
        }
    }

    // ── Shader passes ────────────────────────────────────────────────────────

    /// Loads every stage of a shader pass. Clears the item's previous
    /// messages first.
    pub fn load_pass(&mut self, group: &str, pass: &ShaderPass) -> Option<PassSources> {
        self.services.messages.clear_group(group);

        if pass.vertex.is_empty() || pass.fragment.is_empty() {
            log::error!("No shader paths are set for '{group}'");
            self.services
                .messages
                .add(group, Severity::Error, "No shader paths are set", None, None);
            return None;
        }

        let mut files = Vec::new();
        let vertex = self.load_stage(group, ShaderStage::Vertex, &pass.vertex, &pass.macros, &mut files);
        let fragment =
            self.load_stage(group, ShaderStage::Fragment, &pass.fragment, &pass.macros, &mut files);

        let geometry = if pass.geometry_used && !pass.geometry.is_empty() {
            if !self.settings.language_of(&pass.geometry.path).is_native() {
                self.services.messages.add(
                    group,
                    Severity::Warning,
                    "Geometry shaders are currently not supported by the transcompiler",
                    None,
                    Some(ShaderStage::Geometry),
                );
            }
            Some(self.load_stage(group, ShaderStage::Geometry, &pass.geometry, &pass.macros, &mut files))
        } else {
            None
        };

        // an unused geometry stage is fine, a used one that failed is not
        let geometry = match geometry {
            None => Some(None),
            Some(loaded) => loaded.map(Some),
        };
        let (Some(vertex), Some(fragment), Some(geometry)) = (vertex, fragment, geometry) else {
            self.services.messages.add(
                group,
                Severity::Error,
                "Failed to compile the shader(s)",
                None,
                None,
            );
            return None;
        };

        Some(PassSources {
            vertex,
            fragment,
            geometry,
            files,
        })
    }

    /// Links the graphics program and, for passes without a geometry stage,
    /// the debug program.
    pub fn link_pass(
        &mut self,
        device: &mut dyn GpuDevice,
        group: &str,
        sources: &PassSources,
    ) -> PassPrograms {
        let desc = ProgramDescriptor {
            label: Some(group),
            stages: ProgramStages::Graphics {
                vertex: sources.vertex.as_stage(),
                fragment: sources.fragment.as_stage(),
                geometry: sources.geometry.as_ref().map(StageCode::as_stage),
            },
        };

        let program = match device.create_program(&desc) {
            Ok(program) => program,
            Err(err) => {
                let bias = sources.stage(err.stage).map_or(0, |s| s.line_bias);
                self.report_compile_error(group, &err, bias);
                log::error!("Shaders of '{group}' not compiled");
                self.services.messages.add(
                    group,
                    Severity::Error,
                    "Failed to compile the shader(s)",
                    None,
                    None,
                );
                return PassPrograms::default();
            }
        };

        self.services
            .messages
            .add(group, Severity::Message, "Compiled the shaders.", None, None);

        let debug_program = if sources.geometry.is_some() {
            None
        } else {
            let debug_fragment = StageCode::raw(DEBUG_ID_FRAGMENT);
            let desc = ProgramDescriptor {
                label: Some(group),
                stages: ProgramStages::Graphics {
                    vertex: sources.vertex.as_stage(),
                    fragment: debug_fragment.as_stage(),
                    geometry: None,
                },
            };
            match device.create_program(&desc) {
                Ok(program) => Some(program),
                Err(err) => {
                    log::warn!("Debug program of '{group}' failed to link: {}", err.log);
                    None
                }
            }
        };

        PassPrograms {
            program: Some(program),
            debug_program,
        }
    }

    /// Loads and links a shader pass in one go.
    pub fn build_pass(
        &mut self,
        device: &mut dyn GpuDevice,
        group: &str,
        pass: &ShaderPass,
    ) -> (Option<PassSources>, PassPrograms) {
        let Some(sources) = self.load_pass(group, pass) else {
            return (None, PassPrograms::default());
        };
        let programs = self.link_pass(device, group, &sources);
        (Some(sources), programs)
    }

    // ── Compute passes ───────────────────────────────────────────────────────

    pub fn build_compute(
        &mut self,
        device: &mut dyn GpuDevice,
        group: &str,
        pass: &ComputePass,
    ) -> (Option<ComputeSource>, Option<ProgramId>) {
        self.services.messages.clear_group(group);

        if pass.shader.is_empty() {
            self.services
                .messages
                .add(group, Severity::Error, "No shader paths are set", None, None);
            return (None, None);
        }

        let mut files = Vec::new();
        let Some(code) =
            self.load_stage(group, ShaderStage::Compute, &pass.shader, &pass.macros, &mut files)
        else {
            self.services.messages.add(
                group,
                Severity::Error,
                "Failed to compile the compute shader",
                None,
                None,
            );
            return (None, None);
        };

        let program = self.link_compute(device, group, &code);
        (Some(ComputeSource { code, files }), program)
    }

    pub fn link_compute(
        &mut self,
        device: &mut dyn GpuDevice,
        group: &str,
        code: &StageCode,
    ) -> Option<ProgramId> {
        let desc = ProgramDescriptor {
            label: Some(group),
            stages: ProgramStages::Compute(code.as_stage()),
        };

        match device.create_program(&desc) {
            Ok(program) => {
                self.services.messages.add(
                    group,
                    Severity::Message,
                    "Compiled the compute shader.",
                    None,
                    None,
                );
                Some(program)
            }
            Err(err) => {
                self.report_compile_error(group, &err, code.line_bias);
                log::error!("Compute shader of '{group}' not compiled");
                self.services.messages.add(
                    group,
                    Severity::Error,
                    "Failed to compile the compute shader",
                    None,
                    None,
                );
                None
            }
        }
    }

    // ── Audio passes ─────────────────────────────────────────────────────────

    /// Compiles an audio pass through its stream. Returns the files the
    /// source was read from.
    pub fn build_audio(
        &mut self,
        device: &mut dyn GpuDevice,
        group: &str,
        pass: &mut AudioPass,
    ) -> Vec<PathBuf> {
        self.services.messages.clear_group(group);

        let mut files = Vec::new();
        let desc = ShaderStageDesc::new(pass.path.clone(), GLSL_ENTRY);
        let language = self.settings.language_of(&pass.path);

        let code = if language.is_native() {
            self.load_stage(group, ShaderStage::Fragment, &desc, &pass.macros, &mut files)
        } else {
            // audio streams translate their own sources
            match self.services.project.read_to_string(&pass.path) {
                Ok(source) => {
                    files.push(normalize_path(&pass.path));
                    Some(StageCode::raw(source))
                }
                Err(err) => {
                    self.services.messages.add(
                        group,
                        Severity::Error,
                        format!("Failed to load \"{}\": {err}", pass.path.display()),
                        None,
                        None,
                    );
                    None
                }
            }
        };

        let (Some(code), Some(stream)) = (code, pass.stream.as_mut()) else {
            return files;
        };

        match stream.compile(device, &code.source, language) {
            Ok(()) => self.services.messages.add(
                group,
                Severity::Message,
                "Compiled the shaders.",
                None,
                None,
            ),
            Err(log) => {
                let err = CompileError::new(ShaderStage::Fragment, log);
                self.report_compile_error(group, &err, code.line_bias);
                self.services.messages.add(
                    group,
                    Severity::Error,
                    "Failed to compile the shader(s)",
                    None,
                    None,
                );
            }
        }

        files
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    /// Drops the previous messages of `group`.
    pub fn clear_messages(&mut self, group: &str) {
        self.services.messages.clear_group(group);
    }

    /// Adds a line-less message to `group`.
    pub fn report(&mut self, group: &str, severity: Severity, text: &str) {
        self.services.messages.add(group, severity, text, None, None);
    }

    /// Routes a compiler log to the message stack.
    pub fn report_compile_error(&mut self, group: &str, err: &CompileError, line_bias: u32) {
        for diagnostic in parse_compile_log(&err.log, line_bias) {
            self.services.messages.add(
                group,
                diagnostic.severity,
                diagnostic.text,
                diagnostic.line,
                Some(err.stage),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mesa_layout_with_bias() {
        let log = "ERROR: 0:14: 'foo' : undeclared identifier\nWARNING: 0:3: unused\n";
        let parsed = parse_compile_log(log, 4);
        assert_eq!(
            parsed,
            vec![
                CompileDiagnostic {
                    severity: Severity::Error,
                    line: Some(10),
                    text: "'foo' : undeclared identifier".into(),
                },
                CompileDiagnostic {
                    severity: Severity::Warning,
                    line: Some(1),
                    text: "unused".into(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_nvidia_layout() {
        let parsed = parse_compile_log("0(27) : error C1008: undefined variable \"x\"", 2);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].severity, Severity::Error);
        assert_eq!(parsed[0].line, Some(25));
        assert_eq!(parsed[0].text, "error C1008: undefined variable \"x\"");

        let parsed = parse_compile_log("0(5) : warning C7050: maybe", 0);
        assert_eq!(parsed[0].severity, Severity::Warning);
    }

    #[test]
    fn test_parse_lines_without_numbers() {
        let parsed = parse_compile_log("ERROR: Linking failed\nsomething odd happened", 0);
        assert_eq!(parsed[0].line, None);
        assert_eq!(parsed[0].text, "Linking failed");
        assert_eq!(parsed[1].severity, Severity::Error);
        assert_eq!(parsed[1].line, None);
    }
}
