use snafu::Snafu;

use crate::types::Type;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Call argument count does not match the callee signature.
    #[snafu(display("call to `{callee}` expects {expected} arguments, got {actual}"))]
    CallArityMismatch { callee: String, expected: usize, actual: usize },

    /// Call argument type does not match the callee signature.
    #[snafu(display("call to `{callee}`: argument {index} has type {actual}, expected {expected}"))]
    CallArgTypeMismatch { callee: String, index: usize, expected: Type, actual: Type },

    /// Binary operands have different types.
    #[snafu(display("binary operand type mismatch: {lhs} vs {rhs}"))]
    BinaryTypeMismatch { lhs: Type, rhs: Type },

    /// Binary operands must be integers.
    #[snafu(display("binary operands must be integers, got {ty}"))]
    BinaryNotInteger { ty: Type },

    /// Unsigned integer cast on a non-integer type.
    #[snafu(display("unsigned cast requires integer types, got {from} -> {to}"))]
    CastNotInteger { from: Type, to: Type },

    /// Clone target precondition violated.
    #[snafu(display("clone target `{name}` must be an empty declaration with a matching signature"))]
    CloneTargetMismatch { name: String },
}
