//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
///
/// Only checks what can be judged from the file itself. Cron expressions are
/// checked for field count here and fully parsed when the job is registered.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_scheduler(config, &mut result);
        Self::validate_history(config, &mut result);
        Self::validate_jobs(config, &mut result);

        Ok(result)
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        if config.scheduler.pool_size == 0 {
            result.add_error(ValidationError::new(
                "scheduler.pool_size",
                "pool_size must be greater than 0",
            ));
        }

        if config.scheduler.pool_size > 256 {
            result.add_warning(ValidationWarning::new(
                "scheduler.pool_size",
                "pool_size is very high (>256), each slot may hold an external process",
            ));
        }

        if config.scheduler.shell.trim().is_empty() {
            result.add_error(ValidationError::new(
                "scheduler.shell",
                "shell cannot be empty",
            ));
        }

        if config.scheduler.idle_wait_secs == 0 {
            result.add_error(ValidationError::new(
                "scheduler.idle_wait_secs",
                "idle_wait_secs must be greater than 0",
            ));
        }
    }

    fn validate_history(config: &Config, result: &mut ValidationResult) {
        let valid_backends = ["memory", "sqlite"];
        if !valid_backends.contains(&config.history.backend.as_str()) {
            result.add_error(ValidationError::new(
                "history.backend",
                format!(
                    "Unknown history backend '{}', valid values: {:?}",
                    config.history.backend, valid_backends
                ),
            ));
        }

        if config.history.backend == "sqlite" && config.history.path.is_none() {
            result.add_warning(ValidationWarning::new(
                "history.path",
                "SQLite history path not set, will use default location",
            ));
        }
    }

    fn validate_jobs(config: &Config, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (index, job) in config.jobs.iter().enumerate() {
            let path = format!("jobs[{}]", index);

            if job.name.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    "Job name cannot be empty",
                ));
            } else if !seen.insert(job.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    format!("Duplicate job name '{}'", job.name),
                ));
            }

            if job.command.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.command", path),
                    "Command cannot be empty",
                ));
            }

            let fields = job.cron.split_whitespace().count();
            if !(6..=7).contains(&fields) {
                result.add_error(ValidationError::new(
                    format!("{}.cron", path),
                    format!(
                        "Cron expression must have 6 or 7 fields (seconds first), found {}",
                        fields
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
