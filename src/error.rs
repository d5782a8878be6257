//! Error types for the Pigeon compiler

use crate::location::Location;
use thiserror::Error;

/// Pigeon compilation errors
///
/// Every error is fatal to the compilation that raised it. The rendered
/// message is prefixed with the source location.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Front end
    /// A character that cannot start any token
    #[error("{location}: Unexpected character '{character}'")]
    UnexpectedCharacter {
        /// Where the character was found
        location: Location,
        /// The offending character
        character: char,
    },

    /// Malformed source text
    ///
    /// **Triggered by:** token sequences the grammar does not accept
    /// **Example:** `i32 x = ;` (missing initializer)
    #[error("{location}: Syntax error, {message}")]
    SyntaxError {
        /// Where parsing failed
        location: Location,
        /// Error description
        message: String,
    },

    // Declarations and lookup
    /// Reference to an identifier that is neither a variable, a parameter nor a function
    #[error("{location}: Unknown identifier {name}")]
    UnknownIdentifier {
        /// Where the identifier was used
        location: Location,
        /// Identifier text
        name: String,
    },

    /// A name declared twice in the same namespace
    #[error("{location}: Identifier {name} already declared in {previous}")]
    IdentifierAlreadyDeclared {
        /// Location of the redeclaration
        location: Location,
        /// Identifier text
        name: String,
        /// Location of the first declaration
        previous: Location,
    },

    // Typing
    /// Illegal implicit or explicit conversion
    ///
    /// **Triggered by:** signedness changes, implicit narrowing, out-of-range literals
    /// **Example:** `u8 b = 300;`
    #[error("{location}: Invalid type cast from type {from} to type {to}, {reason}")]
    InvalidTypeCast {
        /// Where the conversion was required
        location: Location,
        /// Source type name (`integer` for untyped literals)
        from: String,
        /// Destination type name
        to: String,
        /// Why the conversion is rejected
        reason: String,
    },

    /// Negation of an unsigned operand
    #[error("{location}: {type_name} type is unsigned, {reason}")]
    UnsignedType {
        /// Where the operation was attempted
        location: Location,
        /// The unsigned type
        type_name: String,
        /// What required a signed type
        reason: String,
    },

    /// Assignment target that does not denote a location
    #[error("{location}: Expected lvalue")]
    NotLValue {
        /// Location of the offending target
        location: Location,
    },

    /// Call syntax applied to a value that is not a function
    #[error("{location}: {type_name} type is not callable")]
    NotCallable {
        /// Location of the callee
        location: Location,
        /// Type of the callee (`integer` for literals)
        type_name: String,
    },

    /// A call whose result is needed targets a function without return type
    #[error("{location}: The function of type {function_type} does not return any value")]
    NoReturnValue {
        /// Location of the call
        location: Location,
        /// Rendered function type
        function_type: String,
    },

    /// `return` with a value in a function without return type, or vice versa
    #[error("{location}: Mismatching return statement, {expected} expected")]
    MismatchingReturn {
        /// Location of the return statement
        location: Location,
        /// Expected return type name, or `no value`
        expected: String,
    },

    /// Call with the wrong number of arguments
    #[error("{location}: Function of type {function_type} expects {expected} arguments, {found} given")]
    ArgumentCountMismatch {
        /// Location of the call
        location: Location,
        /// Rendered function type
        function_type: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    // Resources
    /// Every physical register is holding a live value
    ///
    /// **Triggered by:** expressions with more simultaneously live sub-results than registers.
    /// There is no spill path, so this is a hard limit.
    #[error("{location}: Unable to allocate a register, no free registers left")]
    OutOfRegisters {
        /// Location of the expression needing the register
        location: Location,
    },

    // Contract violations
    /// A syntax node in a position the code generator has no case for
    #[error("{location}: Unexpected syntax node, {expected} expected")]
    UnexpectedSyntaxNode {
        /// Location of the node
        location: Location,
        /// What was expected at this position
        expected: String,
    },

    /// A compiler invariant was broken
    #[error("{location}: Internal compiler error: {message}")]
    InternalError {
        /// Location being compiled when the invariant broke
        location: Location,
        /// Description of the broken invariant
        message: String,
    },
}

/// Error origin classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The source program is invalid
    User,
    /// The compiler (or the AST producer) broke its own contract
    Internal,
}

impl Error {
    /// Create an invalid type cast error
    pub fn invalid_cast(
        location: &Location,
        from: Option<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidTypeCast {
            location: location.clone(),
            from: from.unwrap_or_else(|| "integer".to_string()),
            to: to.into(),
            reason: reason.into(),
        }
    }

    /// Create an unexpected syntax node error
    pub fn unexpected_node(location: &Location, expected: impl Into<String>) -> Self {
        Error::UnexpectedSyntaxNode {
            location: location.clone(),
            expected: expected.into(),
        }
    }

    /// Create an internal compiler error
    pub fn internal(location: &Location, message: impl Into<String>) -> Self {
        Error::InternalError {
            location: location.clone(),
            message: message.into(),
        }
    }

    /// The source location the error refers to
    pub fn location(&self) -> &Location {
        match self {
            Error::UnexpectedCharacter { location, .. }
            | Error::SyntaxError { location, .. }
            | Error::UnknownIdentifier { location, .. }
            | Error::IdentifierAlreadyDeclared { location, .. }
            | Error::InvalidTypeCast { location, .. }
            | Error::UnsignedType { location, .. }
            | Error::NotLValue { location }
            | Error::NotCallable { location, .. }
            | Error::NoReturnValue { location, .. }
            | Error::MismatchingReturn { location, .. }
            | Error::ArgumentCountMismatch { location, .. }
            | Error::OutOfRegisters { location }
            | Error::UnexpectedSyntaxNode { location, .. }
            | Error::InternalError { location, .. } => location,
        }
    }

    /// Classify error origin
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Error::UnexpectedSyntaxNode { .. } | Error::InternalError { .. } => {
                ErrorSeverity::Internal
            }
            _ => ErrorSeverity::User,
        }
    }
}

/// Result type for Pigeon operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_includes_location() {
        let error = Error::OutOfRegisters {
            location: Location::new("main.pg", 3, 14),
        };
        assert_eq!(
            error.to_string(),
            "File \"main.pg\" at 3:14: Unable to allocate a register, no free registers left"
        );
    }

    #[test]
    fn test_invalid_cast_defaults_to_integer() {
        let error = Error::invalid_cast(&Location::builtin(), None, "u8", "value loss");
        assert!(error.to_string().contains("from type integer to type u8"));
        assert_eq!(error.severity(), ErrorSeverity::User);
    }

    #[test]
    fn test_severity() {
        let error = Error::unexpected_node(&Location::builtin(), "statement");
        assert_eq!(error.severity(), ErrorSeverity::Internal);
        assert_eq!(error.location(), &Location::builtin());
    }
}
