//! OpenCL error type and status-code checking helpers.

use std::panic::Location;

use crate::ffi::{error_string, ClInt, CL_SUCCESS};

/// OpenCL dispatch errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClError {
    #[error("OpenCL not available (no ICD loader found)")]
    NotAvailable,

    #[error("OpenCL error {code} ({name}) in {context}", name = status_name(.code))]
    Api { code: ClInt, context: String },

    #[error(
        "failed to set argument {index} of kernel '{kernel}': OpenCL error {code} ({name})",
        name = status_name(.code)
    )]
    ArgumentBinding { kernel: String, index: u32, code: ClInt },

    #[error(
        "failed to enqueue kernel '{kernel}' (global {global}, local {local}): OpenCL error {code} ({name})",
        name = status_name(.code)
    )]
    Launch { kernel: String, code: ClInt, global: String, local: String },
}

impl ClError {
    /// The native status code carried by this error, if any.
    pub fn code(&self) -> Option<ClInt> {
        match self {
            Self::NotAvailable => None,
            Self::Api { code, .. }
            | Self::ArgumentBinding { code, .. }
            | Self::Launch { code, .. } => Some(*code),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClError>;

fn status_name(code: &ClInt) -> &'static str {
    error_string(*code)
}

/// Check an OpenCL status code, returning `ClError::Api` on failure.
///
/// The caller's source location is recorded in the error context.
#[track_caller]
pub fn check_cl(code: ClInt, context: &str) -> Result<()> {
    if code == CL_SUCCESS {
        Ok(())
    } else {
        Err(ClError::Api {
            code,
            context: format!("{} ({})", context, Location::caller()),
        })
    }
}

/// Like [`check_cl`] but for contexts with no way to report an error:
/// a failing status aborts with the code, its name, and the caller location.
#[track_caller]
pub fn enforce_cl(code: ClInt, context: &str) {
    if code != CL_SUCCESS {
        panic!(
            "{}\nOpenCL Error Code  : {}\n       Error String: {}\n{}",
            Location::caller(),
            code,
            error_string(code),
            context
        );
    }
}
