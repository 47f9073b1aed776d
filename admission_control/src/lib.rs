//! Adaptive congestion control for a storage I/O admission path.
//!
//! A CoDel-style controller extended with a second, slower control loop: the
//! fast loop tracks the minimum queuing latency per short interval and
//! throttles the admission budget on sustained violations of the target
//! latency; the slow loop fits a regression between target latency and
//! throughput over many intervals and retunes the target itself, with
//! randomized exploration. The embedding storage engine supplies
//! per-transaction `(start time, size)` observations and receives budget
//! changes through the [`AdmissionHooks`] trait.

pub use controller::SlowFastCodel;
pub use diagnostics::{ControllerModelState, IntervalRecord};
pub use error::{ControllerError, Result};
pub use hooks::{AdmissionHooks, HookError};
pub use options::CodelOptions;

mod budget;
mod controller;
mod diagnostics;
mod error;
mod hooks;
mod options;
mod stats;
mod timer;
