//! Class registry and dynamic factory
//!
//! Maps class names and type codes to their [`TypeRecord`] so objects can be
//! built when the concrete class is only known at runtime (from a file, a
//! network message, a script). Registration happens in an explicit startup
//! sequence; lookups afterwards are pure queries.
//!
//! Name lookup hashes a string, type-code lookup hashes a `u32`; hot paths
//! should prefer [`ClassRegistry::create_by_code`].

use core::fmt;
use std::collections::HashMap;

use crate::error::ClassError;
use crate::object::{Class, Object};
use crate::ptr::Ptr;
use crate::rtti::TypeRecord;
use crate::type_code::TypeCode;

/// Name and type-code index of every registered class
pub struct ClassRegistry {
    /// Class name to record
    by_name: HashMap<&'static str, &'static TypeRecord>,
    /// Type code to record
    by_code: HashMap<TypeCode, &'static TypeRecord>,
    /// Registration order
    order: Vec<&'static TypeRecord>,
    /// Reject classes whose parent is not registered yet
    require_registered_parent: bool,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_code: HashMap::new(),
            order: Vec::new(),
            require_registered_parent: false,
        }
    }

    /// Require parents to be registered before their subclasses
    pub fn with_parent_check(mut self, enabled: bool) -> Self {
        self.require_registered_parent = enabled;
        self
    }

    /// Register a class.
    ///
    /// On error neither index is modified.
    pub fn register(&mut self, record: &'static TypeRecord) -> Result<(), ClassError> {
        if let Some(existing) = self.by_name.get(record.name()) {
            if core::ptr::eq(*existing, record) {
                return Err(ClassError::AlreadyRegistered(record.name().into()));
            }
            return Err(ClassError::DuplicateName {
                name: record.name().into(),
                existing_code: existing.code(),
            });
        }

        if let Some(existing) = self.by_code.get(&record.code()) {
            return Err(ClassError::DuplicateTypeCode {
                code: record.code(),
                name: record.name().into(),
                existing: existing.name().into(),
            });
        }

        if self.require_registered_parent {
            if let Some(parent) = record.parent() {
                if !self.contains(parent) {
                    return Err(ClassError::UnregisteredParent {
                        name: record.name().into(),
                        parent: parent.name().into(),
                    });
                }
            }
        }

        self.by_name.insert(record.name(), record);
        self.by_code.insert(record.code(), record);
        self.order.push(record);
        log::debug!("Registered class {}", record);
        Ok(())
    }

    /// Register classes in order, stopping at the first failure
    pub fn register_all(&mut self, records: &[&'static TypeRecord]) -> Result<(), ClassError> {
        for &record in records {
            self.register(record)?;
        }
        Ok(())
    }

    /// Build an instance of the named class
    pub fn create(&self, name: &str) -> Result<Ptr<dyn Object>, ClassError> {
        let record = self
            .record(name)
            .ok_or_else(|| ClassError::UnknownClass(name.into()))?;
        Self::instantiate(record)
    }

    /// Build an instance of the class with this type code
    pub fn create_by_code(&self, code: TypeCode) -> Result<Ptr<dyn Object>, ClassError> {
        let record = self
            .record_by_code(code)
            .ok_or(ClassError::UnknownTypeCode(code))?;
        Self::instantiate(record)
    }

    /// Build an instance of the named class, which must be exactly `T`
    pub fn create_as<T: Class>(&self, name: &str) -> Result<Ptr<T>, ClassError> {
        self.create(name)?.downcast::<T>().map_err(|object| ClassError::TypeMismatch {
            expected: T::class_record().name().into(),
            found: object.class_name().into(),
        })
    }

    fn instantiate(record: &'static TypeRecord) -> Result<Ptr<dyn Object>, ClassError> {
        let object = record
            .create()
            .ok_or_else(|| ClassError::NotConstructible(record.name().into()))?;
        debug_assert!(
            object.is_instance_of(record),
            "factory of {} built a {}",
            record.name(),
            object.class_name()
        );
        Ok(object)
    }

    /// Check if a class is registered by name
    pub fn class_exists(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Check if a class is registered by type code
    pub fn class_exists_code(&self, code: TypeCode) -> bool {
        self.by_code.contains_key(&code)
    }

    /// Check if this exact record is registered
    pub fn contains(&self, record: &TypeRecord) -> bool {
        self.by_name
            .get(record.name())
            .is_some_and(|existing| core::ptr::eq(*existing, record))
    }

    /// Get a record by class name
    pub fn record(&self, name: &str) -> Option<&'static TypeRecord> {
        self.by_name.get(name).copied()
    }

    /// Get a record by type code
    pub fn record_by_code(&self, code: TypeCode) -> Option<&'static TypeRecord> {
        self.by_code.get(&code).copied()
    }

    /// Registered classes whose immediate parent is `record`
    pub fn subclasses_of<'a>(
        &'a self,
        record: &'a TypeRecord,
    ) -> impl Iterator<Item = &'static TypeRecord> + 'a {
        self.iter()
            .filter(move |candidate| candidate.parent().is_some_and(|p| core::ptr::eq(p, record)))
    }

    /// Registered classes that derive from `record`, directly or not
    pub fn descendants_of<'a>(
        &'a self,
        record: &'a TypeRecord,
    ) -> impl Iterator<Item = &'static TypeRecord> + 'a {
        self.iter()
            .filter(move |candidate| !core::ptr::eq(*candidate, record) && candidate.is_a(record))
    }

    /// Iterate over all registered classes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &'static TypeRecord> + '_ {
        self.order.iter().copied()
    }

    /// Get the number of registered classes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.order.len())
            .field("require_registered_parent", &self.require_registered_parent)
            .finish()
    }
}
