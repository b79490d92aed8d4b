//! Intrusive smart pointer
//!
//! A [`Ptr`] owns one unit of its target's reference count. Cloning adds a
//! unit, dropping or reassigning gives it back, and the object is destroyed
//! the moment the last unit goes away. Containers of `Ptr` therefore clean
//! up like containers of values.
//!
//! Dereferencing a null `Ptr` panics immediately; use [`Ptr::get`] when the
//! handle may legitimately be empty.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::ptr::NonNull;

use crate::object::{Class, Object};

/// A counted handle to a heap-allocated object, or null
pub struct Ptr<T: ?Sized + Object> {
    ptr: Option<NonNull<T>>,
    _marker: PhantomData<T>,
}

impl<T: Object> Ptr<T> {
    /// Move `value` to the heap and take the first reference
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Erase the concrete class without touching the count
    pub fn into_dyn(self) -> Ptr<dyn Object> {
        let ptr = self.into_raw().map(|raw| -> NonNull<dyn Object> { raw });
        Ptr {
            ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Object> Ptr<T> {
    /// An empty handle
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _marker: PhantomData,
        }
    }

    /// Take ownership of a boxed object and take the first reference
    pub fn from_box(boxed: Box<T>) -> Self {
        let raw = NonNull::from(Box::leak(boxed));
        // SAFETY: freshly leaked, so valid and uniquely owned by this handle
        unsafe { raw.as_ref() }.header().add_ref();
        Self {
            ptr: Some(raw),
            _marker: PhantomData,
        }
    }

    /// Check if this handle is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Check if this handle points at an object
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.ptr.is_some()
    }

    /// Borrow the target without the null check panic
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a held unit of count keeps the target alive for `&self`
        self.ptr.map(|raw| unsafe { &*raw.as_ptr() })
    }

    /// Target's strong count, zero for a null handle
    pub fn ref_count(&self) -> u32 {
        self.get().map_or(0, |object| object.header().ref_count())
    }

    /// Move the target out, leaving this handle null
    pub fn take(&mut self) -> Self {
        core::mem::replace(self, Self::null())
    }

    /// Release the target (if any) and become null
    pub fn reset(&mut self) {
        *self = Self::null();
    }

    /// Whether both handles refer to the same object (two nulls are equal)
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.addr() == b.addr()
    }

    /// Thin address of the target, zero for null
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr
            .map_or(0, |raw| raw.as_ptr() as *const () as usize)
    }

    /// Give up the handle without releasing; the unit of count travels with
    /// the raw pointer and must come back through [`Ptr::from_raw`].
    pub fn into_raw(self) -> Option<NonNull<T>> {
        let this = ManuallyDrop::new(self);
        this.ptr
    }

    /// Rebuild a handle from [`Ptr::into_raw`] without adding a reference.
    ///
    /// # Safety
    /// `raw` must come from `into_raw` (or carry a unit added with
    /// [`Ptr::add_ref_raw`]) and that unit must not be reclaimed twice.
    pub unsafe fn from_raw(raw: NonNull<T>) -> Self {
        Self {
            ptr: Some(raw),
            _marker: PhantomData,
        }
    }

    /// Add a unit of count for a manual holder.
    ///
    /// # Safety
    /// `raw` must point at a live object owned by some `Ptr`.
    pub unsafe fn add_ref_raw(raw: NonNull<T>) {
        raw.as_ref().header().add_ref();
    }

    /// Give back a unit held manually, destroying the object if it was the last.
    ///
    /// # Safety
    /// Must balance an earlier [`Ptr::add_ref_raw`] or [`Ptr::into_raw`].
    pub unsafe fn release_raw(raw: NonNull<T>) {
        drop(Self::from_raw(raw));
    }
}

impl Ptr<dyn Object> {
    /// Recover the concrete class. Fails (returning the handle) for null or
    /// for any other class, including subclasses of `U`.
    pub fn downcast<U: Class>(self) -> Result<Ptr<U>, Self> {
        let matches = self.get().is_some_and(|object| object.is::<U>());
        if !matches {
            return Err(self);
        }
        let ptr = self.into_raw().map(NonNull::cast::<U>);
        Ok(Ptr {
            ptr,
            _marker: PhantomData,
        })
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn null_dereference<T: ?Sized>() -> ! {
    panic!("null Ptr<{}> dereference", core::any::type_name::<T>())
}

impl<T: ?Sized + Object> Deref for Ptr<T> {
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(object) => object,
            None => null_dereference::<T>(),
        }
    }
}

impl<T: ?Sized + Object> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        if let Some(object) = self.get() {
            object.header().add_ref();
        }
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Object> Drop for Ptr<T> {
    fn drop(&mut self) {
        let Some(raw) = self.ptr.take() else {
            return;
        };
        // SAFETY: this handle held one unit, so the target is still alive;
        // when it was the last unit nobody else can observe the object.
        unsafe {
            if raw.as_ref().header().release() {
                drop(Box::from_raw(raw.as_ptr()));
            }
        }
    }
}

impl<T: ?Sized + Object> Default for Ptr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized + Object> From<Box<T>> for Ptr<T> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

// Identity semantics: compare addresses, never pointee values.
impl<T: ?Sized + Object> PartialEq for Ptr<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized + Object> Eq for Ptr<T> {}

impl<T: ?Sized + Object> PartialOrd for Ptr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized + Object> Ord for Ptr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<T: ?Sized + Object> Hash for Ptr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized + Object> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            None => write!(f, "Ptr(null)"),
            Some(object) => write!(
                f,
                "Ptr<{}>({:#x}, rc={})",
                object.class_name(),
                self.addr(),
                object.header().ref_count()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::object::ObjectHeader;
    use crate::rtti::TypeRecord;
    use crate::type_code::TypeCode;

    static NODE: TypeRecord = TypeRecord::new("Test::Node", TypeCode::from_bytes(b"NODE"), None);
    static LEAF: TypeRecord = TypeRecord::new("Test::Leaf", TypeCode::from_bytes(b"LEAF"), Some(&NODE));

    struct Node {
        header: ObjectHeader,
        value: i32,
        drops: Rc<Cell<u32>>,
    }

    impl Node {
        fn new(value: i32, drops: &Rc<Cell<u32>>) -> Self {
            Self {
                header: ObjectHeader::of::<Node>(),
                value,
                drops: drops.clone(),
            }
        }
    }

    impl Drop for Node {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    impl Object for Node {
        fn header(&self) -> &ObjectHeader {
            &self.header
        }
    }

    impl Class for Node {
        fn class_record() -> &'static TypeRecord {
            &NODE
        }
    }

    struct Leaf {
        header: ObjectHeader,
    }

    impl Object for Leaf {
        fn header(&self) -> &ObjectHeader {
            &self.header
        }
    }

    impl Class for Leaf {
        fn class_record() -> &'static TypeRecord {
            &LEAF
        }
    }

    #[test]
    fn test_count_follows_handles() {
        let drops = Rc::new(Cell::new(0));
        let a = Ptr::new(Node::new(1, &drops));
        assert_eq!(a.ref_count(), 1);

        let b = a.clone();
        let c = b.clone();
        assert_eq!(a.ref_count(), 3);

        drop(b);
        assert_eq!(a.ref_count(), 2);
        drop(c);
        assert_eq!(a.ref_count(), 1);
        assert_eq!(drops.get(), 0);

        drop(a);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_reassignment_releases_previous_target() {
        let drops = Rc::new(Cell::new(0));
        let mut a = Ptr::new(Node::new(1, &drops));
        let b = Ptr::new(Node::new(2, &drops));

        a = b.clone();
        assert_eq!(drops.get(), 1);
        assert_eq!(a.value, 2);
        assert_eq!(b.ref_count(), 2);

        a.reset();
        assert!(a.is_null());
        assert_eq!(b.ref_count(), 1);
    }

    #[test]
    fn test_containers_clean_up() {
        let drops = Rc::new(Cell::new(0));
        let shared = Ptr::new(Node::new(7, &drops));
        let list: Vec<_> = (0..5).map(|_| shared.clone()).collect();
        assert_eq!(shared.ref_count(), 6);

        drop(list);
        assert_eq!(shared.ref_count(), 1);
        drop(shared);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    #[should_panic(expected = "null Ptr")]
    fn test_null_dereference_panics() {
        let ptr: Ptr<Node> = Ptr::null();
        assert_eq!(ptr.value, 0);
    }

    #[test]
    fn test_identity_comparison() {
        let drops = Rc::new(Cell::new(0));
        let a = Ptr::new(Node::new(1, &drops));
        let b = Ptr::new(Node::new(1, &drops));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(Ptr::<Node>::null(), Ptr::null());
        assert!(Ptr::<Node>::null() < a);
    }

    #[test]
    fn test_upcast_and_downcast_keep_count() {
        let drops = Rc::new(Cell::new(0));
        let node = Ptr::new(Node::new(3, &drops));
        let keep = node.clone();

        let object = node.into_dyn();
        assert_eq!(object.ref_count(), 2);
        assert_eq!(object.class_name(), "Test::Node");

        let object = match object.downcast::<Leaf>() {
            Ok(_) => panic!("Node is not a Leaf"),
            Err(object) => object,
        };
        let node = object.downcast::<Node>().unwrap();
        assert_eq!(node.value, 3);
        assert_eq!(keep.ref_count(), 2);
    }

    #[test]
    fn test_raw_round_trip() {
        let drops = Rc::new(Cell::new(0));
        let node = Ptr::new(Node::new(9, &drops));
        let raw = node.into_raw().unwrap();

        unsafe {
            Ptr::add_ref_raw(raw);
            assert_eq!(raw.as_ref().ref_count(), 2);
            Ptr::release_raw(raw);
            assert_eq!(drops.get(), 0);

            let node = Ptr::from_raw(raw);
            assert_eq!(node.ref_count(), 1);
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_leaf_record() {
        let leaf = Ptr::new(Leaf { header: ObjectHeader::of::<Leaf>() });
        assert!(leaf.is_a(&NODE));
        assert!(!leaf.is_instance_of(&NODE));
        assert_eq!(format!("{:?}", Ptr::<Leaf>::null()), "Ptr(null)");
    }
}
