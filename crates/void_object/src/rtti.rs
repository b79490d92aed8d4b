//! Runtime type information without native RTTI
//!
//! Every class owns exactly one [`TypeRecord`], declared as a `static` and
//! therefore built before first use and never mutated. Records link to their
//! parent record, which is all the information needed to answer exact-type
//! and is-a queries and to rebuild the class hierarchy.
//!
//! ```ignore
//! static BASE: TypeRecord = TypeRecord::new("Ns::Base", TypeCode::from_bytes(b"BASE"), None);
//! static DERIVED: TypeRecord =
//!     TypeRecord::new("Ns::Derived", TypeCode::from_bytes(b"DER1"), Some(&BASE))
//!         .with_factory(construct::<Derived>);
//! ```

use core::fmt;
use core::hash::{Hash, Hasher};

use crate::object::Object;
use crate::ptr::Ptr;
use crate::type_code::TypeCode;

/// Factory function producing a fresh default instance of exactly one class
pub type CreateFn = fn() -> Ptr<dyn Object>;

/// Immutable per-class descriptor
pub struct TypeRecord {
    name: &'static str,
    code: TypeCode,
    parent: Option<&'static TypeRecord>,
    create: Option<CreateFn>,
}

impl TypeRecord {
    /// Describe a class that cannot be built by name or type code
    pub const fn new(
        name: &'static str,
        code: TypeCode,
        parent: Option<&'static TypeRecord>,
    ) -> Self {
        Self {
            name,
            code,
            parent,
            create: None,
        }
    }

    /// Make the class dynamically constructible
    pub const fn with_factory(self, create: CreateFn) -> Self {
        Self {
            create: Some(create),
            ..self
        }
    }

    /// Fully qualified class name
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Four-character class code
    #[inline]
    pub const fn code(&self) -> TypeCode {
        self.code
    }

    /// Record of the immediate base class, `None` for a root class
    #[inline]
    pub const fn parent(&self) -> Option<&'static TypeRecord> {
        self.parent
    }

    /// Whether the class supplies a zero-argument factory
    #[inline]
    pub const fn is_constructible(&self) -> bool {
        self.create.is_some()
    }

    /// Number of ancestors above this class
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// Build a new instance, `None` if the class has no factory
    pub fn create(&self) -> Option<Ptr<dyn Object>> {
        self.create.map(|create| create())
    }

    /// True if `other` is this class or one of its ancestors.
    ///
    /// Compares record identity, never names.
    pub fn is_a(&self, other: &TypeRecord) -> bool {
        self.ancestors().any(|record| core::ptr::eq(record, other))
    }

    /// Same as [`is_a`](Self::is_a), keyed by class name
    pub fn is_a_name(&self, name: &str) -> bool {
        self.ancestors().any(|record| record.name == name)
    }

    /// Same as [`is_a`](Self::is_a), keyed by type code
    pub fn is_a_code(&self, code: TypeCode) -> bool {
        self.ancestors().any(|record| record.code == code)
    }

    /// Walk from this class up to the root, starting with `self`
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }
}

/// Iterator over a record and its ancestors
pub struct Ancestors<'a> {
    next: Option<&'a TypeRecord>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a TypeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

// Records are compared by identity: one record per class.
impl PartialEq for TypeRecord {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

impl Eq for TypeRecord {}

impl Hash for TypeRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self as *const TypeRecord).hash(state);
    }
}

impl fmt::Debug for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRecord")
            .field("name", &self.name)
            .field("code", &self.code)
            .field("parent", &self.parent.map(TypeRecord::name))
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

impl fmt::Display for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.name, self.code)
    }
}

/// Factory function for any default-constructible class.
///
/// Pass `construct::<T>` to [`TypeRecord::with_factory`].
pub fn construct<T: Object + Default>() -> Ptr<dyn Object> {
    Ptr::new(T::default()).into_dyn()
}
