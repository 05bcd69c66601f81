//! Error types for the calculator engine.

use thiserror::Error;

/// Domain errors a calculation can raise.
///
/// These never cross the public API as a `Result`; the engine catches them,
/// enters the sticky error state and pins the display to the error token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalcError {
    /// Division where the divisor is exactly zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Square root of a negative operand.
    #[error("square root of a negative number")]
    NegativeSquareRoot,
}

/// Result type alias for calculator operations.
pub type CalcResult<T> = Result<T, CalcError>;
