//! Renewal policy linting
//!
//! Flags settings that will fail at run time or that are likely mistakes.

use std::time::Duration;

use certrenew_common::ValidationType;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::Config;

/// Lint the renewal policy
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    let renewal = &config.renewal;

    if renewal.poll_attempts == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Policy,
            "poll-attempts must be at least 1",
        ));
    }

    if !renewal.renew_before_days.is_finite() || renewal.renew_before_days < 0.0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Policy,
            format!(
                "renew-before-days must be a non-negative number, got {}",
                renewal.renew_before_days
            ),
        ));
    } else if renewal.renew_before_days < 1.0 {
        result.add_warning(ValidationWarning::new(format!(
            "renew-before-days is {}; certificates may expire before a failed renewal is retried",
            renewal.renew_before_days
        )));
    }

    match renewal.validation_type {
        ValidationType::File if renewal.webroot.is_none() => {
            result.add_error(ValidationError::new(
                ErrorCategory::Validation,
                "validation-type FILE requires webroot",
            ));
        }
        ValidationType::Dns => {
            result.add_warning(ValidationWarning::new(
                "DNS validation records are not published by certrenew; \
                 the authority must be able to validate the zone on its own",
            ));
        }
        _ => {}
    }

    // The authority rate-limits status queries
    let total_wait = renewal.poll_interval() * renewal.poll_attempts;
    if total_wait < Duration::from_secs(5) {
        result.add_warning(ValidationWarning::new(format!(
            "order polling gives up after {:?}; issuance usually takes longer",
            total_wait
        )));
    }

    if config.http.timeout_secs == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Policy,
            "http timeout-secs must be at least 1",
        ));
    }

    result
}
