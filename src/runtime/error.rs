use miette::Diagnostic;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Type mismatch: {message}")]
    #[diagnostic(code(prime_rt::type_mismatch))]
    TypeMismatch { message: String },
    #[error("Invalid cast: {message}")]
    #[diagnostic(
        code(prime_rt::invalid_cast),
        help("real values cannot be cast to boolean or character")
    )]
    InvalidCast { message: String },
    #[error("Invalid operand kind: {message}")]
    #[diagnostic(
        code(prime_rt::invalid_operand_kind),
        help("mixed, null and identity arrays must be promoted before use")
    )]
    InvalidOperandKind { message: String },
    #[error("Invalid size: {message}")]
    #[diagnostic(code(prime_rt::invalid_size))]
    InvalidSize { message: String },
    #[error("Dimension mismatch: {message}")]
    #[diagnostic(code(prime_rt::dimension_mismatch))]
    DimensionMismatch { message: String },
    #[error("Index {index} is out of range for length {length}")]
    #[diagnostic(code(prime_rt::index_out_of_range), help("indices start at 1"))]
    IndexOutOfRange { index: i64, length: usize },
    #[error("Division by zero: {message}")]
    #[diagnostic(code(prime_rt::division_by_zero))]
    DivisionByZero { message: String },
    #[error("Invalid interval {head}..{tail}")]
    #[diagnostic(code(prime_rt::invalid_interval), help("an interval head must not exceed its tail"))]
    InvalidInterval { head: i32, tail: i32 },
    #[error("Attempt to restore scope stack to mark {mark} with {len} items")]
    #[diagnostic(code(prime_rt::invalid_mark))]
    InvalidMark { mark: usize, len: usize },
    #[error("Handle to slot {slot} no longer refers to a live value")]
    #[diagnostic(code(prime_rt::dangling_handle))]
    DanglingHandle { slot: usize },
    #[error("Internal runtime error: {message}")]
    #[diagnostic(code(prime_rt::internal))]
    Internal { message: String },
}

impl RuntimeError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
        }
    }

    pub fn operand_kind(message: impl Into<String>) -> Self {
        RuntimeError::InvalidOperandKind {
            message: message.into(),
        }
    }

    pub fn dimension(message: impl Into<String>) -> Self {
        RuntimeError::DimensionMismatch {
            message: message.into(),
        }
    }

    pub fn size(message: impl Into<String>) -> Self {
        RuntimeError::InvalidSize {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RuntimeError::Internal {
            message: message.into(),
        }
    }

    pub fn out_of_range(index: i64, length: usize) -> Self {
        RuntimeError::IndexOutOfRange { index, length }
    }
}

/// Fatal path for the generated-code boundary. Never returns.
pub fn abort(error: RuntimeError) -> ! {
    tracing::error!(%error, "runtime aborted");
    crate::diagnostics::emit_runtime_error(&error);
    std::process::exit(1)
}
