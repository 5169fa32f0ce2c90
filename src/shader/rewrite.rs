//! Built-in pick shaders and vertex-stage rewriting.
//!
//! Debug renders replace every fragment stage with [`DEBUG_ID_FRAGMENT`],
//! which writes the id color set through [`PICK_COLOR_UNIFORM`].
//!
//! Vertex and instance picks go one step further: the pass's own vertex stage
//! is rewritten to forward `gl_VertexID` / `gl_InstanceID` to an
//! index-encoding fragment stage. The index is written plus one so that the
//! cleared background (all zero) never decodes to index 0.

/// Uniform holding the encoded id color of the item being drawn.
pub const PICK_COLOR_UNIFORM: &str = "u_prism_pick_color";

/// Varying carrying the vertex or instance index to the fragment stage.
pub const PICK_INDEX_VARYING: &str = "prism_pick_index";

/// Fragment stage of every debug program.
pub const DEBUG_ID_FRAGMENT: &str = r"#version 330

uniform vec3 u_prism_pick_color;
out vec4 outColor;

void main()
{
    outColor = vec4(u_prism_pick_color, 1.0);
}
";

/// Fragment stage of vertex/instance pick programs.
pub const PICK_INDEX_FRAGMENT: &str = r"#version 330

flat in int prism_pick_index;
out vec4 outColor;

void main()
{
    float r = float(prism_pick_index & 0xFF) / 255.0;
    float g = float((prism_pick_index >> 8) & 0xFF) / 255.0;
    float b = float((prism_pick_index >> 16) & 0xFF) / 255.0;

    outColor = vec4(r, g, b, 1.0);
}
";

/// Which built-in index a rewritten vertex stage forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickIndexSource {
    Vertex,
    Instance,
}

impl PickIndexSource {
    #[must_use]
    pub fn builtin(self) -> &'static str {
        match self {
            Self::Vertex => "gl_VertexID",
            Self::Instance => "gl_InstanceID",
        }
    }
}

/// Rewrites a vertex stage so it forwards `source`'s index to
/// [`PICK_INDEX_FRAGMENT`].
///
/// The varying declaration goes on the line after `#version` and the
/// assignment right after the opening brace of `main`. Returns `None` when
/// the stage has no recognizable `main` function.
#[must_use]
pub fn inject_pick_index(vertex_source: &str, source: PickIndexSource) -> Option<String> {
    let main_brace = find_main_body(vertex_source)?;

    let mut out = String::with_capacity(vertex_source.len() + 96);
    out.push_str(&vertex_source[..=main_brace]);
    out.push_str(&format!(
        "\n    {PICK_INDEX_VARYING} = {} + 1;",
        source.builtin()
    ));
    out.push_str(&vertex_source[main_brace + 1..]);

    let declaration = format!("flat out int {PICK_INDEX_VARYING};\n");
    let insert_at = match out.find("#version") {
        Some(version) => match out[version..].find('\n') {
            Some(newline) => version + newline + 1,
            None => {
                out.push('\n');
                out.len()
            }
        },
        None => 0,
    };
    out.insert_str(insert_at, &declaration);

    Some(out)
}

/// Byte offset of the `{` opening the body of `void main()`.
fn find_main_body(source: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut from = 0;
    while let Some(offset) = source[from..].find("main") {
        let start = from + offset;
        let end = start + "main".len();
        from = end;

        let preceded_by_space = start > 0 && bytes[start - 1].is_ascii_whitespace();
        if !preceded_by_space {
            continue;
        }

        let rest = source[end..].trim_start();
        if !rest.starts_with('(') {
            continue;
        }

        let close = end + source[end..].find(')')?;
        let brace = close + source[close..].find('{')?;
        return Some(brace);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_vertex_index() {
        let src = "#version 330\nlayout(location = 0) in vec3 pos;\nvoid main() {\n    gl_Position = vec4(pos, 1.0);\n}\n";
        let out = inject_pick_index(src, PickIndexSource::Vertex).unwrap();
        assert_eq!(
            out,
            "#version 330\nflat out int prism_pick_index;\nlayout(location = 0) in vec3 pos;\nvoid main() {\n    prism_pick_index = gl_VertexID + 1;\n    gl_Position = vec4(pos, 1.0);\n}\n"
        );
    }

    #[test]
    fn test_inject_skips_identifiers_containing_main() {
        let src = "#version 330\nfloat domain(){ return 1.0; }\nvoid main ( ) { }\n";
        let out = inject_pick_index(src, PickIndexSource::Instance).unwrap();
        assert!(out.contains("float domain(){ return 1.0; }"));
        assert!(out.contains("void main ( ) {\n    prism_pick_index = gl_InstanceID + 1; }"));
    }

    #[test]
    fn test_inject_without_main() {
        assert!(inject_pick_index("#version 330\n", PickIndexSource::Vertex).is_none());
    }
}
