//! Domain list validation
//!
//! Checks that the configured domains are plausible host names.

use std::collections::HashSet;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::Config;

/// Validate the configured domain list
pub fn validate_domains(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.renewal.domains.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Domain,
            "no domains configured under [renewal]",
        ));
        return result;
    }

    let mut seen = HashSet::new();
    for domain in &config.renewal.domains {
        if let Err(reason) = check_host_name(domain) {
            result.add_error(ValidationError::new(
                ErrorCategory::Domain,
                format!("invalid domain '{}': {}", domain, reason),
            ));
            continue;
        }

        if !seen.insert(domain.to_ascii_lowercase()) {
            result.add_warning(ValidationWarning::new(format!(
                "domain '{}' is listed more than once",
                domain
            )));
        }
    }

    result
}

fn check_host_name(domain: &str) -> Result<(), &'static str> {
    if domain.is_empty() {
        return Err("empty");
    }
    if domain.len() > 253 {
        return Err("longer than 253 characters");
    }
    if domain.starts_with("*.") {
        return Err("wildcard domains cannot be bound to the gateway");
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("not a fully qualified name");
    }

    for label in labels {
        if label.is_empty() || label.len() > 63 {
            return Err("label length out of range");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("label starts or ends with '-'");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("label contains invalid characters");
        }
    }

    Ok(())
}
