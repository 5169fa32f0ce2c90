//! Diagnostic message stack.
//!
//! Compiler output and engine-level problems are collected here, grouped by
//! the name of the item they belong to, so the host can list them next to the
//! item. Every message is also forwarded to the `log` facade.

use serde::{Deserialize, Serialize};

use crate::shader::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Message,
    Warning,
    Error,
}

/// One diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the pipeline item the message belongs to.
    pub group: String,
    pub severity: Severity,
    pub text: String,
    /// Line in the author's source file, if known.
    pub line: Option<u32>,
    pub stage: Option<ShaderStage>,
}

#[derive(Debug, Default)]
pub struct MessageStack {
    messages: Vec<Message>,
}

impl MessageStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        group: impl Into<String>,
        severity: Severity,
        text: impl Into<String>,
        line: Option<u32>,
        stage: Option<ShaderStage>,
    ) {
        let message = Message {
            group: group.into(),
            severity,
            text: text.into(),
            line,
            stage,
        };

        let line_suffix = message.line.map(|l| format!(" (line {l})")).unwrap_or_default();
        match severity {
            Severity::Error => log::error!("[{}] {}{}", message.group, message.text, line_suffix),
            Severity::Warning => log::warn!("[{}] {}{}", message.group, message.text, line_suffix),
            Severity::Message => log::info!("[{}] {}", message.group, message.text),
        }

        self.messages.push(message);
    }

    /// Removes every message of `group`.
    pub fn clear_group(&mut self, group: &str) {
        self.messages.retain(|m| m.group != group);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages of one group, in insertion order.
    pub fn group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.group == group)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .count()
    }
}
