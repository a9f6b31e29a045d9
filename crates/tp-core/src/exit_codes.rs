//! Exit codes for the tableprov CLI.
//!
//! Scripts can tell the outcome apart without parsing output.

/// Exit codes for tableprov operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean run / file valid
    Clean = 0,

    /// `validate` found a schema violation
    ValidationFailed = 1,

    /// Configuration error
    ConfigError = 10,

    /// I/O error
    IoError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for an error that ended a command.
    pub fn for_error(err: &tp_common::Error) -> Self {
        match err {
            tp_common::Error::Config(_) => ExitCode::ConfigError,
            tp_common::Error::Validation(_) => ExitCode::ValidationFailed,
            tp_common::Error::Io(_) | tp_common::Error::Read(_) | tp_common::Error::Copy(_) => {
                ExitCode::IoError
            }
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
