//! Error types for ripple.

use alloc::string::String;

/// Result type alias for ripple operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by stores, editors and operators.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An operator or request was configured with an invalid value.
    #[error("invalid configuration for `{parameter}`: {message}")]
    Configuration {
        parameter: &'static str,
        message: String,
    },
    /// An index fell outside the collection.
    #[error("index {index} is out of range for a collection of {len} items")]
    IndexOutOfRange { index: usize, len: usize },
    /// A value-addressed operation did not find its item.
    #[error("item not found in collection")]
    ItemNotFound,
    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a configuration error for the named parameter.
    pub fn configuration(parameter: &'static str, message: impl Into<String>) -> Self {
        Error::Configuration {
            parameter,
            message: message.into(),
        }
    }

    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("capacity", "must be greater than zero");
        assert!(err.to_string().contains("capacity"));
        assert!(err.to_string().contains("greater than zero"));

        let err = Error::index_out_of_range(4, 2);
        assert!(err.to_string().contains('4'));
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::configuration("page", "must be at least 1");
        match err {
            Error::Configuration { parameter, .. } => assert_eq!(parameter, "page"),
            _ => panic!("Wrong error type"),
        }
        assert!(Error::configuration("size", "zero").is_configuration());
        assert!(!Error::ItemNotFound.is_configuration());
    }
}
