use thiserror::Error;

use crate::hooks::HookError;

/// Errors surfaced by the admission controller. Per-sample and per-interval
/// numeric degeneracies are resolved locally with saturation or a skipped
/// cycle and never appear here; only configuration, runtime-setup, and
/// cross-component notification failures reach the caller.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Admission hook failed: {0}")]
    Hook(#[from] HookError),

    #[error("Tokio runtime unavailable: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
