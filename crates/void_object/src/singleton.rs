//! Per-context singleton slots
//!
//! A handful of well-known services exist at most once per runtime context.
//! Each service class gets a slot in [`Singletons`]; the slot does not hold a
//! strong reference, the service manages its own lifetime through `Ptr`.
//!
//! Slot lifecycle: `Unconstructed -> Live -> Unconstructed`. [`Singletons::install`]
//! claims the slot and hands a [`SingletonToken`] to the constructor, which
//! stores it as a field of the instance. Dropping the instance drops the
//! token, which clears the slot before the memory is freed. `install` checks
//! that the token really lives inside the instance, so a slot can never
//! outlive the object it points at. Constructing while live, destructing
//! while unconstructed and asking for a missing instance are programming
//! errors and panic.
//!
//! ```ignore
//! struct AudioServer {
//!     header: ObjectHeader,
//!     singleton: SingletonToken<AudioServer>,
//! }
//!
//! impl Singleton for AudioServer {
//!     fn singleton_token(&self) -> &SingletonToken<Self> { &self.singleton }
//! }
//!
//! let server = runtime.singletons().install(|token| AudioServer::new(token));
//! assert!(runtime.singletons().has_instance::<AudioServer>());
//! ```

use core::any::TypeId;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::leak_tracker;
use crate::object::Object;
use crate::ptr::Ptr;

/// A service class with at most one live instance per context.
///
/// The instance owns the token that claimed its slot.
pub trait Singleton: Object + Sized {
    /// The token handed to the constructor, stored inline in `self`
    fn singleton_token(&self) -> &SingletonToken<Self>;
}

struct Slot {
    class: &'static str,
    /// Set once the instance lives behind a `Ptr`
    instance: Option<NonNull<()>>,
}

/// Singleton slots of one runtime context.
///
/// Clones share the same slots.
#[derive(Clone, Default)]
pub struct Singletons {
    slots: Rc<RefCell<HashMap<TypeId, Slot>>>,
    /// Leak-tracker owner for instances built by `install`
    owner: Option<u64>,
}

impl Singletons {
    /// Create an empty slot table
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty slot table whose instances are attributed to leak owner `owner`
    pub(crate) fn owned_by(owner: u64) -> Self {
        Self {
            slots: Rc::default(),
            owner: Some(owner),
        }
    }

    /// Claim the slot for `T`.
    ///
    /// Prefer [`install`](Self::install), which upholds the contract below.
    ///
    /// # Safety
    /// The token must end up as a field of the instance later passed to
    /// [`bind`](Self::bind) and must never be moved out of it, so that the
    /// slot is cleared before that instance is freed.
    ///
    /// # Panics
    /// If an instance of `T` is already live in this context.
    #[track_caller]
    pub unsafe fn construct<T: Object>(&self) -> SingletonToken<T> {
        let class = core::any::type_name::<T>();
        let mut slots = self.slots.borrow_mut();
        if slots.contains_key(&TypeId::of::<T>()) {
            panic!("singleton {} constructed while an instance is live", class);
        }
        slots.insert(TypeId::of::<T>(), Slot { class, instance: None });
        log::debug!("Singleton {} constructed", class);

        SingletonToken {
            singletons: self.clone(),
            _marker: PhantomData,
        }
    }

    /// Publish the heap instance so [`instance`](Self::instance) can hand it out.
    ///
    /// # Safety
    /// `instance` must own the token returned by [`construct`](Self::construct)
    /// for this table, stored inline.
    ///
    /// # Panics
    /// If the slot for `T` was not claimed with [`construct`](Self::construct).
    #[track_caller]
    pub unsafe fn bind<T: Object>(&self, instance: &Ptr<T>) {
        let mut slots = self.slots.borrow_mut();
        let Some(slot) = slots.get_mut(&TypeId::of::<T>()) else {
            panic!(
                "singleton {} bound without being constructed",
                core::any::type_name::<T>()
            );
        };
        slot.instance = instance.get().map(|object| NonNull::from(object).cast::<()>());
    }

    /// Construct, heap-allocate and bind in one step.
    ///
    /// `build` receives the token and must store it in the instance.
    ///
    /// # Panics
    /// If `T` is already live, or if the instance returned by `build` does
    /// not hold this table's token inline. The slot stays unbound then.
    #[track_caller]
    pub fn install<T: Singleton>(&self, build: impl FnOnce(SingletonToken<T>) -> T) -> Ptr<T> {
        // SAFETY: checked by `holds_own_token` before binding
        let token = unsafe { self.construct::<T>() };
        let instance = {
            let _scope = self.owner.map(leak_tracker::enter);
            Ptr::new(build(token))
        };

        if !self.holds_own_token(&instance) {
            panic!(
                "singleton {} token is not stored in the instance",
                core::any::type_name::<T>()
            );
        }
        // SAFETY: the token lies inside the instance allocation
        unsafe { self.bind(&instance) };
        instance
    }

    fn holds_own_token<T: Singleton>(&self, instance: &Ptr<T>) -> bool {
        let token = instance.singleton_token();
        let start = token as *const SingletonToken<T> as usize;
        let end = start + core::mem::size_of::<SingletonToken<T>>();
        let base = instance.addr();

        Rc::ptr_eq(&token.singletons.slots, &self.slots)
            && start >= base
            && end <= base + core::mem::size_of::<T>()
    }

    /// Release the slot for `T`. Normally called by the token's drop.
    ///
    /// # Panics
    /// If no instance of `T` was constructed.
    #[track_caller]
    pub fn destruct<T: Object>(&self) {
        let removed = self.slots.borrow_mut().remove(&TypeId::of::<T>());
        match removed {
            Some(slot) => log::debug!("Singleton {} destructed", slot.class),
            None => panic!(
                "singleton {} destructed while not constructed",
                core::any::type_name::<T>()
            ),
        }
    }

    /// A new strong handle to the live instance of `T`.
    ///
    /// # Panics
    /// If no instance is live and bound, or it is being destroyed.
    #[track_caller]
    pub fn instance<T: Object>(&self) -> Ptr<T> {
        let slots = self.slots.borrow();
        let raw = slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.instance)
            .map(NonNull::cast::<T>);
        let Some(raw) = raw else {
            panic!("singleton {} has no instance", core::any::type_name::<T>());
        };

        // SAFETY: the bound instance holds the token inline, which clears
        // the slot before the instance is freed
        unsafe {
            if raw.as_ref().ref_count() == 0 {
                panic!(
                    "singleton {} requested while being destroyed",
                    core::any::type_name::<T>()
                );
            }
            Ptr::add_ref_raw(raw);
            Ptr::from_raw(raw)
        }
    }

    /// Whether [`instance`](Self::instance) would succeed
    pub fn has_instance<T: Object>(&self) -> bool {
        self.slots
            .borrow()
            .get(&TypeId::of::<T>())
            .is_some_and(|slot| slot.instance.is_some())
    }

    /// Whether the slot for `T` is claimed (bound or not)
    pub fn is_constructed<T: Object>(&self) -> bool {
        self.slots.borrow().contains_key(&TypeId::of::<T>())
    }

    /// Number of claimed slots
    pub fn live_count(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Class names of the claimed slots
    pub fn live_classes(&self) -> Vec<&'static str> {
        let mut classes: Vec<_> = self.slots.borrow().values().map(|slot| slot.class).collect();
        classes.sort_unstable();
        classes
    }
}

impl fmt::Debug for Singletons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Singletons")
            .field("live", &self.live_classes())
            .finish()
    }
}

/// Proof that the slot for `T` is claimed; clears it on drop
pub struct SingletonToken<T: Object> {
    singletons: Singletons,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Object> SingletonToken<T> {
    /// The slot table this token belongs to
    pub fn singletons(&self) -> &Singletons {
        &self.singletons
    }
}

impl<T: Object> Drop for SingletonToken<T> {
    fn drop(&mut self) {
        self.singletons.destruct::<T>();
    }
}

impl<T: Object> fmt::Debug for SingletonToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingletonToken<{}>", core::any::type_name::<T>())
    }
}
