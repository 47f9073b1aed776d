use thiserror::Error;

/// Failure reported by the embedding engine's budget notification.
///
/// A failed notification means the admission path's allowance is in an
/// unknown state, so the controller never swallows it: callers of
/// [`crate::SlowFastCodel::reset`] and configuration apply see it directly,
/// and a failure inside a control-loop tick stops the loops and is reported
/// by [`crate::SlowFastCodel::shutdown`].
#[derive(Error, Debug, Clone)]
#[error("budget notification rejected: {message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// The controller's view of the embedding admission path.
///
/// Implemented by the storage engine that owns the transaction queue. Both
/// methods are called from submission-path threads and from the control-loop
/// tasks, so implementations must be cheap and must not call back into the
/// controller (the controller invokes them outside its own lock, but a
/// re-entrant adjustment would still deadlock the embedding side's own
/// locking).
pub trait AdmissionHooks: Send + Sync {
    /// The budget changed; `new_budget` is the new authoritative allowance of
    /// in-flight bytes for the admission path.
    fn budget_changed(&self, new_budget: i64) -> Result<(), HookError>;

    /// Current outstanding queue depth (in-flight bytes), used to bound
    /// budget growth to what traffic has actually exercised.
    fn current_inflight(&self) -> i64;
}
