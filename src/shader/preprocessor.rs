//! Shader Preprocessor
//!
//! Two text transforms run before a stage is handed to the compiler:
//!
//! 1. [`IncludeResolver::expand`] splices `#include` directives recursively.
//! 2. [`inject_macros`] inserts the pass's `#define`s after `#version`.
//!
//! Both shift the line numbers the compiler reports. The number of lines
//! added above the author's code is tracked as the *line bias* and
//! subtracted again when diagnostics are parsed.
//!
//! Include expansion keeps a stack of the files currently being expanded,
//! seeded with the root file. A directive naming a file already on the stack
//! is reported once and dropped, so expansion terminates on cyclic include
//! graphs.

use std::path::{Path, PathBuf};

use crate::pipeline::ShaderMacro;
use crate::services::{ProjectFiles, Severity};
use crate::utils::normalize_path;

const INCLUDE_DIRECTIVE: &str = "#include";
const VERSION_DIRECTIVE: &str = "#version";

/// A problem found while expanding includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessDiagnostic {
    pub severity: Severity,
    pub text: String,
}

/// Result of include expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessedSource {
    pub source: String,
    /// Lines added to the source by expansion.
    pub line_bias: u32,
    /// Every file spliced in, in expansion order.
    pub includes: Vec<PathBuf>,
    pub diagnostics: Vec<PreprocessDiagnostic>,
}

impl PreprocessedSource {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Resolves `#include` directives against the project files.
///
/// Each file name is looked up in `include_paths`, in order, and then in the
/// directory of the including file. The first candidate that exists wins.
pub struct IncludeResolver<'a> {
    files: &'a dyn ProjectFiles,
    include_paths: &'a [PathBuf],
}

impl<'a> IncludeResolver<'a> {
    pub fn new(files: &'a dyn ProjectFiles, include_paths: &'a [PathBuf]) -> Self {
        Self {
            files,
            include_paths,
        }
    }

    /// Expands every include of `source`, which was read from `path`.
    #[must_use]
    pub fn expand(&self, source: &str, path: &Path) -> PreprocessedSource {
        let mut out = PreprocessedSource {
            source: source.to_owned(),
            ..Default::default()
        };

        let mut stack = vec![normalize_path(path)];
        let mut text = std::mem::take(&mut out.source);
        self.expand_into(&mut text, &mut stack, &mut out);

        let added = count_lines(&text).saturating_sub(count_lines(source));
        out.line_bias = u32::try_from(added).unwrap_or(u32::MAX);
        out.source = text;
        out
    }

    fn expand_into(&self, src: &mut String, stack: &mut Vec<PathBuf>, out: &mut PreprocessedSource) {
        let mut search_from = 0;

        while let Some(offset) = src[search_from..].find(INCLUDE_DIRECTIVE) {
            let loc = search_from + offset;

            // only directives starting a line count
            if loc != 0 && src.as_bytes()[loc - 1] != b'\n' {
                search_from = loc + INCLUDE_DIRECTIVE.len();
                continue;
            }

            let line_end = src[loc..].find('\n').map_or(src.len(), |e| loc + e);
            let file_name = parse_include_name(&src[loc..line_end]);
            src.replace_range(loc..line_end, "");
            search_from = loc;

            let Some(file_name) = file_name else {
                out.diagnostics.push(PreprocessDiagnostic {
                    severity: Severity::Warning,
                    text: "Malformed #include directive".to_owned(),
                });
                continue;
            };

            let Some(resolved) = self.locate(&file_name, stack.last().map(PathBuf::as_path)) else {
                out.diagnostics.push(PreprocessDiagnostic {
                    severity: Severity::Warning,
                    text: format!("Cannot find included file \"{file_name}\""),
                });
                continue;
            };

            if stack.contains(&resolved) {
                out.diagnostics.push(PreprocessDiagnostic {
                    severity: Severity::Error,
                    text: "Recursive #include detected".to_owned(),
                });
                continue;
            }

            let mut included = match self.files.read_to_string(&resolved) {
                Ok(text) => text,
                Err(err) => {
                    out.diagnostics.push(PreprocessDiagnostic {
                        severity: Severity::Warning,
                        text: format!("Failed to read included file \"{}\": {err}", resolved.display()),
                    });
                    continue;
                }
            };

            stack.push(resolved.clone());
            self.expand_into(&mut included, stack, out);
            stack.pop();

            out.includes.push(resolved);
            src.insert_str(loc, &included);
            search_from = loc + included.len();
        }
    }

    fn locate(&self, file_name: &str, including: Option<&Path>) -> Option<PathBuf> {
        let own_dir = including.map(|p| p.parent().unwrap_or_else(|| Path::new("")));

        self.include_paths
            .iter()
            .map(PathBuf::as_path)
            .chain(own_dir)
            .map(|dir| normalize_path(&dir.join(file_name)))
            .find(|candidate| self.files.exists(candidate))
    }
}

/// Extracts the file name of `#include "name"` or `#include <name>`.
fn parse_include_name(directive: &str) -> Option<String> {
    let open = directive.find(['"', '<'])?;
    let rest = &directive[open + 1..];
    let close = rest.find(['"', '>'])?;
    let name = rest[..close].trim();
    (!name.is_empty()).then(|| name.to_owned())
}

fn count_lines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

/// Inserts one `#define` line per active macro right after the `#version`
/// line, in list order. Sources without `#version` get the defines at the
/// very top.
///
/// Returns the number of inserted lines.
pub fn inject_macros(source: &mut String, macros: &[ShaderMacro]) -> u32 {
    let mut defines = String::new();
    let mut count = 0;
    for m in macros.iter().filter(|m| m.active) {
        defines.push_str(&m.define_line());
        defines.push('\n');
        count += 1;
    }

    if count == 0 {
        return 0;
    }

    let insert_at = match source.find(VERSION_DIRECTIVE) {
        Some(version) => match source[version..].find('\n') {
            Some(newline) => version + newline + 1,
            None => {
                source.push('\n');
                source.len()
            }
        },
        None => 0,
    };

    source.insert_str(insert_at, &defines);
    count
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;

    use super::*;

    #[derive(Default)]
    struct Files(HashMap<PathBuf, String>);

    impl Files {
        fn with(mut self, path: &str, text: &str) -> Self {
            self.0.insert(PathBuf::from(path), text.to_owned());
            self
        }
    }

    impl ProjectFiles for Files {
        fn resolve(&self, path: &Path) -> PathBuf {
            normalize_path(path)
        }

        fn exists(&self, path: &Path) -> bool {
            self.0.contains_key(&normalize_path(path))
        }

        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.0
                .get(&normalize_path(path))
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    #[test]
    fn test_macros_follow_version_line_in_order() {
        let mut src = "#version 330\nvoid main(){}".to_owned();
        let macros = [
            ShaderMacro::new("A", "1"),
            ShaderMacro {
                active: false,
                ..ShaderMacro::new("SKIP", "0")
            },
            ShaderMacro::new("B", ""),
        ];

        assert_eq!(inject_macros(&mut src, &macros), 2);
        assert_eq!(src, "#version 330\n#define A 1\n#define B\nvoid main(){}");
    }

    #[test]
    fn test_macros_without_version() {
        let mut src = "void main(){}".to_owned();
        inject_macros(&mut src, &[ShaderMacro::new("X", "2")]);
        assert_eq!(src, "#define X 2\nvoid main(){}");

        let mut src = "#version 450".to_owned();
        inject_macros(&mut src, &[ShaderMacro::new("X", "2")]);
        assert_eq!(src, "#version 450\n#define X 2\n");
    }

    #[test]
    fn test_nested_includes_splice_in_order() {
        let files = Files::default()
            .with("lib/a.glsl", "float a;\n#include \"b.glsl\"\n")
            .with("lib/b.glsl", "float b;\n");
        let paths = [PathBuf::from("lib")];
        let resolver = IncludeResolver::new(&files, &paths);

        let out = resolver.expand("#version 330\n#include <a.glsl>\nvoid main(){}\n", Path::new("main.vert"));

        assert_eq!(out.source, "#version 330\nfloat a;\nfloat b;\n\n\nvoid main(){}\n");
        assert_eq!(out.line_bias, 3);
        assert_eq!(out.includes, vec![PathBuf::from("lib/b.glsl"), PathBuf::from("lib/a.glsl")]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_including_file_directory_is_searched_last() {
        let files = Files::default()
            .with("shaders/common.glsl", "// local\n")
            .with("inc/common.glsl", "// from include path\n");
        let paths = [PathBuf::from("inc")];
        let resolver = IncludeResolver::new(&files, &paths);

        let out = resolver.expand("#include \"common.glsl\"\n", Path::new("shaders/main.frag"));
        assert!(out.source.starts_with("// from include path"));

        let resolver = IncludeResolver::new(&files, &[]);
        let out = resolver.expand("#include \"common.glsl\"\n", Path::new("shaders/main.frag"));
        assert!(out.source.starts_with("// local"));
    }

    #[test]
    fn test_directive_not_starting_a_line_is_ignored() {
        let files = Files::default().with("x.glsl", "X\n");
        let resolver = IncludeResolver::new(&files, &[]);
        let src = "// #include \"x.glsl\"\n";
        let out = resolver.expand(src, Path::new("main.frag"));
        assert_eq!(out.source, src);
        assert_eq!(out.line_bias, 0);
    }

    #[test]
    fn test_include_cycle_terminates_with_one_error() {
        let files = Files::default()
            .with("a.glsl", "// a\n#include \"b.glsl\"\n")
            .with("b.glsl", "// b\n#include \"a.glsl\"\n");
        let resolver = IncludeResolver::new(&files, &[]);

        let root = files.0[Path::new("a.glsl")].clone();
        let out = resolver.expand(&root, Path::new("a.glsl"));

        let errors: Vec<_> = out
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text, "Recursive #include detected");
        assert!(!out.source.contains("#include"));
        assert_eq!(out.source, "// a\n// b\n\n\n");
    }

    #[test]
    fn test_missing_include_is_removed_with_warning() {
        let files = Files::default();
        let resolver = IncludeResolver::new(&files, &[]);
        let out = resolver.expand("#include \"nope.glsl\"\nvoid main(){}", Path::new("m.vert"));
        assert_eq!(out.source, "\nvoid main(){}");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].severity, Severity::Warning);
        assert!(!out.has_errors());
    }
}
