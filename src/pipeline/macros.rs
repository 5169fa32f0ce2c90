/// A `#define` injected into every stage of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderMacro {
    pub name: String,
    pub value: String,
    /// Inactive macros stay in the list but are not injected.
    pub active: bool,
}

impl ShaderMacro {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            active: true,
        }
    }

    /// The `#define` line for this macro, without a trailing newline.
    #[must_use]
    pub fn define_line(&self) -> String {
        if self.value.is_empty() {
            format!("#define {}", self.name)
        } else {
            format!("#define {} {}", self.name, self.value)
        }
    }
}
