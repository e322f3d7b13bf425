//! Configuration validation
//!
//! Collects every problem in one pass instead of stopping at the first, so
//! `certrenew test` can report them all.

mod domains;
mod lint;

pub use domains::validate_domains;
pub use lint::lint_config;

use std::fmt;

use crate::Config;

/// Area of the configuration an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Domain,
    Endpoint,
    Policy,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Domain => "domain",
            ErrorCategory::Endpoint => "endpoint",
            ErrorCategory::Policy => "policy",
            ErrorCategory::Validation => "validation",
        };
        f.write_str(s)
    }
}

/// A problem that prevents certrenew from running
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// A suspicious setting that does not prevent running
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Accumulated errors and warnings
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run every validation pass over `config`
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Err(e) = config.gateway.endpoint_url() {
        result.add_error(ValidationError::new(
            ErrorCategory::Endpoint,
            format!("gateway: {}", e),
        ));
    }
    if let Err(e) = config.authority.endpoint_url() {
        result.add_error(ValidationError::new(
            ErrorCategory::Endpoint,
            format!("authority: {}", e),
        ));
    }

    result.merge(validate_domains(config));
    result.merge(lint_config(config));

    result
}
