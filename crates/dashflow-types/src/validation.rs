//! Structural validation report

use serde::{Deserialize, Serialize};

/// Outcome of a structural check: errors make it invalid, warnings do not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Empty, valid report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an error
    pub fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    /// Record a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Fold another report into this one, prefixing its messages
    pub fn absorb(&mut self, prefix: &str, other: ValidationReport) {
        for error in other.errors {
            self.error(format!("{prefix}: {error}"));
        }
        for warning in other.warnings {
            self.warn(format!("{prefix}: {warning}"));
        }
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
