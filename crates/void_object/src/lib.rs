//! # void_object - Void Engine Object Model
//!
//! The object runtime every other subsystem builds on:
//! - **Reference counting**: intrusive, non-atomic counts with deterministic destruction
//! - **Ptr**: a smart handle that makes lifetime management implicit
//! - **RTTI**: exact-type and is-a queries over static class records
//! - **Factory**: build objects from a class name or a four-character type code
//! - **Singletons**: at most one live service instance per runtime context
//! - **Leak tracking**: debug builds report objects still alive at shutdown
//!
//! ## Threading
//! Objects, `Ptr` handles and runtimes belong to a single execution context.
//! Counts are not atomic; the types are `!Send`/`!Sync` so the compiler keeps
//! them on their thread. Cross-context communication goes through a separate,
//! explicit channel, never through shared object graphs.
//!
//! ## Declaring a class
//! ```ignore
//! static DERIVED: TypeRecord =
//!     TypeRecord::new("Ns::Derived", TypeCode::from_bytes(b"DER1"), Some(&BASE))
//!         .with_factory(construct::<Derived>);
//!
//! #[derive(Default)]
//! struct Derived { header: ObjectHeader, /* ... */ }
//!
//! impl Object for Derived {
//!     fn header(&self) -> &ObjectHeader { &self.header }
//! }
//!
//! impl Class for Derived {
//!     fn class_record() -> &'static TypeRecord { &DERIVED }
//! }
//!
//! let runtime = Runtime::with_classes(RuntimeConfig::default(), &[&BASE, &DERIVED])?;
//! let object = runtime.create("Ns::Derived")?;
//! assert!(object.is_a(&BASE));
//! ```

pub mod class_registry;
pub mod config;
pub mod error;
pub mod leak_tracker;
pub mod object;
pub mod ptr;
pub mod rtti;
pub mod runtime;
pub mod singleton;
pub mod type_code;

pub use class_registry::ClassRegistry;
pub use config::RuntimeConfig;
pub use error::{ClassError, ConfigError, Error, Result};
pub use leak_tracker::{LeakRecord, LeakReport, OwnerScope};
pub use object::{AsAny, Class, Object, ObjectHeader};
pub use ptr::Ptr;
pub use rtti::{construct, Ancestors, CreateFn, TypeRecord};
pub use runtime::Runtime;
pub use singleton::{Singleton, SingletonToken, Singletons};
pub use type_code::TypeCode;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::class_registry::ClassRegistry;
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{ClassError, Error, Result};
    pub use crate::object::{Class, Object, ObjectHeader};
    pub use crate::ptr::Ptr;
    pub use crate::rtti::{construct, TypeRecord};
    pub use crate::runtime::Runtime;
    pub use crate::singleton::{Singleton, SingletonToken, Singletons};
    pub use crate::type_code::TypeCode;
}
