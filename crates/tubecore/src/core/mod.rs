//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod operation;
pub mod paths;
pub mod process;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_tools_configuration};
pub use operation::{OperationGuard, OperationSlot, OperationState};
pub use paths::AppPaths;
pub use process::{ProcessEvent, ProcessExit, ProcessHandle, ProcessOutcome, ProcessRunner, RunningProcess};
