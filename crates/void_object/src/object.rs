//! Reference-counted object base
//!
//! Domain types embed an [`ObjectHeader`] and implement [`Object`]. The
//! header carries the intrusive reference count and the class record; all
//! count bookkeeping goes through [`Ptr`](crate::Ptr).
//!
//! The count is a plain `Cell<u32>`: objects and their handles belong to a
//! single runtime context. Sharing them across threads without an external
//! synchronization collaborator is undefined behavior, which is why headers
//! (and so every object) are `!Sync` and `Ptr` is `!Send`.

use core::any::Any;
use core::cell::Cell;
use core::fmt;

use crate::rtti::TypeRecord;
use crate::type_code::TypeCode;

/// Per-instance state shared by every reference-counted object
pub struct ObjectHeader {
    ref_count: Cell<u32>,
    record: &'static TypeRecord,
    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    serial: u64,
}

impl ObjectHeader {
    /// Create a header for an instance of `record`.
    ///
    /// The count starts at zero; wrapping the object in a `Ptr` takes it to one.
    pub fn new(record: &'static TypeRecord) -> Self {
        Self {
            ref_count: Cell::new(0),
            record,
            #[cfg(any(debug_assertions, feature = "leak-tracking"))]
            serial: crate::leak_tracker::register(record),
        }
    }

    /// Create a header for an instance of class `T`
    pub fn of<T: Class>() -> Self {
        Self::new(T::class_record())
    }

    /// Current number of strong holders
    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.ref_count.get()
    }

    /// The exact class of the owning object
    #[inline]
    pub fn type_record(&self) -> &'static TypeRecord {
        self.record
    }

    /// Allocation serial used by the leak tracker
    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    #[inline]
    pub(crate) fn add_ref(&self) {
        self.ref_count.set(self.ref_count.get() + 1);
    }

    /// Decrement; returns `true` when the last holder let go
    #[inline]
    pub(crate) fn release(&self) -> bool {
        let count = self.ref_count.get();
        debug_assert!(count > 0, "release() on {} with zero count", self.record.name());
        self.ref_count.set(count - 1);
        count == 1
    }
}

#[cfg(any(debug_assertions, feature = "leak-tracking"))]
impl Drop for ObjectHeader {
    fn drop(&mut self) {
        crate::leak_tracker::deregister(self.serial);
    }
}

impl fmt::Debug for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeader")
            .field("class", &self.record.name())
            .field("ref_count", &self.ref_count.get())
            .finish()
    }
}

/// Access to `Any` for downcasting trait objects
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A reference-counted object with runtime type information
pub trait Object: AsAny {
    /// The embedded header
    fn header(&self) -> &ObjectHeader;

    /// Exact class record of this instance
    #[inline]
    fn type_record(&self) -> &'static TypeRecord {
        self.header().type_record()
    }

    /// Fully qualified class name
    #[inline]
    fn class_name(&self) -> &'static str {
        self.type_record().name()
    }

    /// Four-character class code
    #[inline]
    fn class_type_code(&self) -> TypeCode {
        self.type_record().code()
    }

    /// True only for the exact class, never for an ancestor
    #[inline]
    fn is_instance_of(&self, record: &TypeRecord) -> bool {
        core::ptr::eq(self.type_record(), record)
    }

    /// Exact-class check by name
    fn is_instance_of_name(&self, name: &str) -> bool {
        self.class_name() == name
    }

    /// True for the exact class and every ancestor
    fn is_a(&self, record: &TypeRecord) -> bool {
        self.type_record().is_a(record)
    }

    /// Ancestor check by name
    fn is_a_name(&self, name: &str) -> bool {
        self.type_record().is_a_name(name)
    }

    /// Ancestor check by type code
    fn is_a_code(&self, code: TypeCode) -> bool {
        self.type_record().is_a_code(code)
    }

    /// Current strong count
    fn ref_count(&self) -> u32 {
        self.header().ref_count()
    }
}

impl dyn Object {
    /// Borrow as the concrete class `T`
    pub fn downcast_ref<T: Class>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Whether the concrete class is `T`
    pub fn is<T: Class>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl fmt::Debug for dyn Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class_name())
            .field("code", &self.class_type_code())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Static side of a class: ties a Rust type to its type record
pub trait Class: Object + Sized {
    /// The one record describing this class
    fn class_record() -> &'static TypeRecord;
}

#[cfg(test)]
mod tests {
    use super::*;

    static WIDGET: TypeRecord = TypeRecord::new("Test::Widget", TypeCode::from_bytes(b"WDGT"), None);

    struct Widget {
        header: ObjectHeader,
    }

    impl Object for Widget {
        fn header(&self) -> &ObjectHeader {
            &self.header
        }
    }

    impl Class for Widget {
        fn class_record() -> &'static TypeRecord {
            &WIDGET
        }
    }

    #[test]
    fn test_header_counts() {
        let header = ObjectHeader::new(&WIDGET);
        assert_eq!(header.ref_count(), 0);
        header.add_ref();
        header.add_ref();
        assert!(!header.release());
        assert!(header.release());
        assert_eq!(header.ref_count(), 0);
    }

    #[test]
    fn test_rtti_queries() {
        let widget = Widget { header: ObjectHeader::of::<Widget>() };
        assert_eq!(widget.class_name(), "Test::Widget");
        assert_eq!(widget.class_type_code(), TypeCode::from_bytes(b"WDGT"));
        assert!(widget.is_instance_of(&WIDGET));
        assert!(widget.is_instance_of_name("Test::Widget"));

        let object: &dyn Object = &widget;
        assert!(object.is::<Widget>());
        assert!(object.downcast_ref::<Widget>().is_some());
    }
}
