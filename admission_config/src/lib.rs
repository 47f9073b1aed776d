//! Configuration values for the admission controller, with environment
//! variable overrides following the pattern `ADMCTL_{GROUP_NAME}_{FIELD_NAME}`.

pub mod groups;
mod macros;
mod parse;

pub use parse::ParseConfigValue;

/// Primary configuration struct containing all config sections.
#[derive(Debug, Clone, Default)]
pub struct AdmissionConfig {
    pub controller: groups::controller::ConfigValues,
}

impl AdmissionConfig {
    /// Create a new config instance with default values and environment
    /// variable overrides applied. Equivalent to
    /// `AdmissionConfig::default().with_env_overrides()`.
    pub fn new() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides to all configuration sections.
    /// Returns a new `AdmissionConfig` instance with overrides applied.
    pub fn with_env_overrides(mut self) -> Self {
        self.controller.apply_env_overrides();
        self
    }
}
