//! Accumulating diagnostics.
//!
//! Every non-fatal error produced by hierarchy validation, feature
//! collection or type checking is appended to a [`Diagnostics`] list and
//! never thrown; a pass completes even after its first error. The driver
//! only treats parse errors and hierarchy cycles as fatal, in the sense
//! that they cause later passes to be skipped.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(line: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Diagnostics that don't originate at a specific source line (e.g. the
/// hierarchy-cycle report, which names several classes across several
/// lines at once) use line 0 and render without the line prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeformDiagnostic(pub String);

#[derive(Debug, Default)]
pub struct Diagnostics {
    pub located: Vec<Diagnostic>,
    pub freeform: Vec<FreeformDiagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, line: u32, message: impl Into<String>) {
        self.located.push(Diagnostic::error(line, message));
    }

    pub fn push_freeform(&mut self, message: impl Into<String>) {
        self.freeform.push(FreeformDiagnostic(message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.located.is_empty() && self.freeform.is_empty()
    }

    pub fn len(&self) -> usize {
        self.located.len() + self.freeform.len()
    }

    /// Render every diagnostic prefixed with the source file name, in the
    /// compiler's standard format: `"<file>", line N: ...`.
    pub fn render(&self, file: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.len());
        for d in &self.located {
            lines.push(format!("\"{}\", line {}: {}", file, d.line, d.message));
        }
        for d in &self.freeform {
            lines.push(d.0.clone());
        }
        lines
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.located.extend(other.located);
        self.freeform.extend(other.freeform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_located_diagnostics_with_file_prefix() {
        let mut d = Diagnostics::new();
        d.push(12, "undefined identifier x");
        let rendered = d.render("test.cl");
        assert_eq!(rendered, vec!["\"test.cl\", line 12: undefined identifier x".to_string()]);
    }

    #[test]
    fn freeform_diagnostics_render_without_prefix() {
        let mut d = Diagnostics::new();
        d.push_freeform("Detected 1 loops in the type hierarchy:\n1) B <- A <- ".to_string());
        assert_eq!(d.render("x.cl").len(), 1);
        assert!(!d.render("x.cl")[0].starts_with('"'));
    }

    #[test]
    fn accumulates_across_passes() {
        let mut d = Diagnostics::new();
        d.push(1, "a");
        d.push(2, "b");
        assert_eq!(d.len(), 2);
        assert!(!d.is_empty());
    }
}
