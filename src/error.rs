//! Error handling for the numeric diff engine.
//!
//! Per spec §7, the engine distinguishes three error classes. Only two of
//! them are `NdiffError` variants:
//!
//! - Resource failures (I/O, invalid option values) are fatal and surface
//!   here as `Io` / `InvalidOption`.
//! - Invariant violations (no rule for a position, `check`-mode
//!   disagreement) are fatal and surface here as `NoRule` /
//!   `RuleContextDisagreement`.
//!
//! Comparison failures are NOT represented in this enum: they are the
//! normal product of `test_num`, returned as a `DiffBits` value, not
//! propagated as a Rust `Result::Err`.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NdiffError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("No such file or directory: {file}")]
    FileNotFound { file: String },

    #[error("invalid option value: {message}")]
    InvalidOption { message: String },

    #[error("buffer growth failed: requested {requested} bytes")]
    BufferGrowthFailed { requested: usize },

    #[error(
        "rule context returned no rule for row {row}, column {col}"
    )]
    NoRule { row: usize, col: usize },

    #[error(
        "check mode: incremental and random-access rule lookups disagree at row {row}, column {col}"
    )]
    RuleContextDisagreement { row: usize, col: usize },
}

impl NdiffError {
    /// Exit code matching the teacher's `EXIT_SUCCESS`/`EXIT_FAILURE`
    /// convention: resource and invariant failures both abort the process
    /// with `2`, distinct from the `1` used when diffs were merely found.
    pub fn exit_code(&self) -> i32 {
        crate::RESOURCE_FAILURE
    }

    pub fn file_not_found(file: &str) -> Self {
        Self::FileNotFound {
            file: file.to_string(),
        }
    }

    pub fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption {
            message: message.into(),
        }
    }
}

pub type NdiffResult<T> = Result<T, NdiffError>;

/// Context trait for adding a filename to an I/O error, in the teacher's
/// `with_file_context` style.
pub trait NdiffContext<T> {
    fn with_file_context(self, filename: &str) -> NdiffResult<T>;
}

impl<T> NdiffContext<T> for Result<T, io::Error> {
    fn with_file_context(self, filename: &str) -> NdiffResult<T> {
        self.map_err(|io_err| match io_err.kind() {
            io::ErrorKind::NotFound => NdiffError::file_not_found(filename),
            _ => NdiffError::Io(io::Error::new(
                io_err.kind(),
                format!("{filename}: {io_err}"),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_and_invariant_errors_share_the_resource_exit_code() {
        assert_eq!(NdiffError::file_not_found("x").exit_code(), crate::RESOURCE_FAILURE);
        assert_eq!(
            NdiffError::NoRule { row: 1, col: 1 }.exit_code(),
            crate::RESOURCE_FAILURE
        );
    }
}
