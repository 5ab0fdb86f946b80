//! Compiler configuration.
//!
//! A small builder, in the spirit of the Seq compiler's extensible
//! `CompilerConfig`, but deliberately tiny: COOL has no external-builtin
//! extensibility story, so the only knobs a batch run actually has are
//! where the assembly goes and whether to keep checking after the first
//! wave of semantic errors.
//!
//! # Example
//!
//! ```rust,ignore
//! use coolc::CompilerConfig;
//!
//! let config = CompilerConfig::new().with_output(output_path);
//! ```

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub output_path: Option<PathBuf>,
    /// Always `true` in this compiler: diagnostics accumulate across a
    /// whole pass rather than stopping at the first one, per spec.
    pub accumulate_diagnostics: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            output_path: None,
            accumulate_diagnostics: true,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_output_path() {
        let config = CompilerConfig::new();
        assert!(config.output_path.is_none());
        assert!(config.accumulate_diagnostics);
    }

    #[test]
    fn with_output_sets_the_path() {
        let config = CompilerConfig::new().with_output("out.s");
        assert_eq!(config.output_path.unwrap(), PathBuf::from("out.s"));
    }
}
