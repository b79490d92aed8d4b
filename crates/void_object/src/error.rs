//! Error types for the object runtime
//!
//! Only recoverable failures and startup registration failures are errors.
//! Contract violations on the lifetime path (null `Ptr` dereference,
//! singleton misuse) panic instead.

use thiserror::Error;

use crate::type_code::TypeCode;

/// Class registration and factory errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    /// No class with this name is registered
    #[error("Class not found: {0}")]
    UnknownClass(Box<str>),

    /// No class with this type code is registered
    #[error("Class not found for type code '{0}'")]
    UnknownTypeCode(TypeCode),

    /// The class is registered but has no factory function
    #[error("Class '{0}' is not dynamically constructible")]
    NotConstructible(Box<str>),

    /// The same type record was registered twice
    #[error("Class already registered: {0}")]
    AlreadyRegistered(Box<str>),

    /// Another class already uses this name
    #[error("Duplicate class name '{name}' (already registered with type code '{existing_code}')")]
    DuplicateName {
        name: Box<str>,
        existing_code: TypeCode,
    },

    /// Another class already uses this type code
    #[error("Duplicate type code '{code}': '{name}' collides with '{existing}'")]
    DuplicateTypeCode {
        code: TypeCode,
        name: Box<str>,
        existing: Box<str>,
    },

    /// The parent class has not been registered yet
    #[error("Class '{name}' registered before its parent '{parent}'")]
    UnregisteredParent { name: Box<str>, parent: Box<str> },

    /// The created object is not of the requested class
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Box<str>, found: Box<str> },

    /// Text that does not encode a 4-byte type code
    #[error("Invalid type code '{0}': expected exactly 4 ASCII characters")]
    InvalidTypeCode(Box<str>),
}

impl ClassError {
    /// Whether this error can only come out of registration
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            ClassError::AlreadyRegistered(_)
                | ClassError::DuplicateName { .. }
                | ClassError::DuplicateTypeCode { .. }
                | ClassError::UnregisteredParent { .. }
        )
    }
}

/// Runtime configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The crate-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Class error: {0}")]
    Class(#[from] ClassError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_collision() {
        let err = ClassError::DuplicateTypeCode {
            code: TypeCode::from_bytes(b"DER1"),
            name: "Ns::Other".into(),
            existing: "Ns::Derived".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DER1"));
        assert!(msg.contains("Ns::Other"));
        assert!(msg.contains("Ns::Derived"));
        assert!(err.is_registration_error());

        assert!(!ClassError::UnknownClass("Ns::Unknown".into()).is_registration_error());
    }

    #[test]
    fn test_conversion() {
        let err: Error = ClassError::UnknownClass("X".into()).into();
        assert!(matches!(err, Error::Class(ClassError::UnknownClass(_))));
    }
}
