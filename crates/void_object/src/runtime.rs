//! Isolated runtime context
//!
//! A [`Runtime`] owns one class registry and one set of singleton slots.
//! Code that needs dynamic construction or a service gets the runtime passed
//! in explicitly; two runtimes never share either table, so each may hold
//! its own live instance of the same singleton class.
//!
//! Objects created through a runtime stay on the thread that created them.
//! Objects built by its factory or singleton installs, or inside
//! [`Runtime::enter`], belong to it for leak reporting.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::class_registry::ClassRegistry;
use crate::config::RuntimeConfig;
use crate::error::ClassError;
use crate::leak_tracker::{self, LeakReport, OwnerScope};
use crate::object::{Class, Object};
use crate::ptr::Ptr;
use crate::rtti::TypeRecord;
use crate::singleton::Singletons;
use crate::type_code::TypeCode;

/// One isolated object-model context
pub struct Runtime {
    id: u64,
    config: RuntimeConfig,
    classes: ClassRegistry,
    singletons: Singletons,
}

impl Runtime {
    /// Create a runtime with empty tables
    pub fn new(config: RuntimeConfig) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);

        log::info!("Runtime '{}' started (id {})", config.name, id);
        Self {
            id,
            classes: ClassRegistry::new().with_parent_check(config.require_registered_parent),
            singletons: Singletons::owned_by(id),
            config,
        }
    }

    /// Create a runtime and run its class registration sequence.
    ///
    /// A registration error aborts startup.
    pub fn with_classes(
        config: RuntimeConfig,
        records: &[&'static TypeRecord],
    ) -> Result<Self, ClassError> {
        let mut runtime = Self::new(config);
        runtime.register_classes(records)?;
        Ok(runtime)
    }

    /// Register classes in order
    pub fn register_classes(&mut self, records: &[&'static TypeRecord]) -> Result<(), ClassError> {
        self.classes.register_all(records).map_err(|err| {
            log::error!("Runtime '{}': class registration failed: {}", self.config.name, err);
            err
        })
    }

    /// Process-unique id, also the leak-tracker owner of this runtime
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Context name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The class registry
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// The class registry (mutable)
    pub fn classes_mut(&mut self) -> &mut ClassRegistry {
        &mut self.classes
    }

    /// The singleton slots
    pub fn singletons(&self) -> &Singletons {
        &self.singletons
    }

    /// Attribute objects allocated on this thread to this runtime until the
    /// scope is dropped
    pub fn enter(&self) -> OwnerScope {
        leak_tracker::enter(self.id)
    }

    /// Build an instance by class name
    pub fn create(&self, name: &str) -> Result<Ptr<dyn Object>, ClassError> {
        let _scope = self.enter();
        self.classes.create(name)
    }

    /// Build an instance by type code
    pub fn create_by_code(&self, code: TypeCode) -> Result<Ptr<dyn Object>, ClassError> {
        let _scope = self.enter();
        self.classes.create_by_code(code)
    }

    /// Build an instance by class name as the concrete class `T`
    pub fn create_as<T: Class>(&self, name: &str) -> Result<Ptr<T>, ClassError> {
        let _scope = self.enter();
        self.classes.create_as(name)
    }

    /// Check if a class is registered by name
    pub fn class_exists(&self, name: &str) -> bool {
        self.classes.class_exists(name)
    }

    /// Check if a class is registered by type code
    pub fn class_exists_code(&self, code: TypeCode) -> bool {
        self.classes.class_exists_code(code)
    }

    /// Tear the context down and report objects that are still alive.
    ///
    /// Only objects owned by this runtime are considered; other runtimes on
    /// the same thread do not show up. Without leak tracking the report is
    /// always clean.
    ///
    /// # Panics
    /// If `panic_on_leaks` is set and something leaked.
    pub fn shutdown(self) -> LeakReport {
        for class in self.singletons.live_classes() {
            log::warn!("Runtime '{}': singleton {} still live at shutdown", self.config.name, class);
        }

        let report = self.leak_report();
        if self.config.report_leaks_on_shutdown {
            report.log();
        }
        log::info!(
            "Runtime '{}' stopped ({} leaked object(s))",
            self.config.name,
            report.len()
        );

        if self.config.panic_on_leaks && !report.is_clean() {
            panic!("runtime '{}' leaked objects: {}", self.config.name, report);
        }
        report
    }

    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    fn leak_report(&self) -> LeakReport {
        LeakReport {
            leaks: leak_tracker::snapshot_owned_by(self.id),
        }
    }

    #[cfg(not(any(debug_assertions, feature = "leak-tracking")))]
    fn leak_report(&self) -> LeakReport {
        LeakReport::default()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("classes", &self.classes.len())
            .field("singletons", &self.singletons.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectHeader;
    use crate::rtti::construct;

    static ENTITY: TypeRecord = TypeRecord::new("Test::Entity", TypeCode::from_bytes(b"ENTT"), None)
        .with_factory(construct::<Entity>);
    static ORPHAN: TypeRecord =
        TypeRecord::new("Test::Orphan", TypeCode::from_bytes(b"ORPH"), Some(&ENTITY));

    struct Entity {
        header: ObjectHeader,
    }

    impl Default for Entity {
        fn default() -> Self {
            Self {
                header: ObjectHeader::new(&ENTITY),
            }
        }
    }

    impl Object for Entity {
        fn header(&self) -> &ObjectHeader {
            &self.header
        }
    }

    #[test]
    fn test_create_through_runtime() {
        let runtime = Runtime::with_classes(RuntimeConfig::named("test"), &[&ENTITY]).unwrap();
        assert_eq!(runtime.name(), "test");
        assert!(runtime.class_exists("Test::Entity"));
        assert!(runtime.class_exists_code(TypeCode::from_bytes(b"ENTT")));

        let entity = runtime.create("Test::Entity").unwrap();
        assert!(entity.is_instance_of(&ENTITY));
        drop(entity);

        assert!(runtime.shutdown().is_clean());
    }

    #[test]
    fn test_parent_check_from_config() {
        let config = RuntimeConfig {
            require_registered_parent: true,
            ..Default::default()
        };
        let result = Runtime::with_classes(config, &[&ORPHAN]);
        assert!(matches!(result, Err(ClassError::UnregisteredParent { .. })));
    }

    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    #[test]
    fn test_shutdown_reports_leaks() {
        let runtime = Runtime::with_classes(RuntimeConfig::default(), &[&ENTITY]).unwrap();
        let leaked = runtime.create_by_code(TypeCode::from_bytes(b"ENTT")).unwrap();

        let report = runtime.shutdown();
        assert_eq!(report.count_of("Test::Entity"), 1);
        drop(leaked);
    }

    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    #[test]
    #[should_panic(expected = "leaked objects")]
    fn test_panic_on_leaks() {
        let config = RuntimeConfig {
            panic_on_leaks: true,
            ..Default::default()
        };
        let runtime = Runtime::with_classes(config, &[&ENTITY]).unwrap();
        let _leaked = runtime.create("Test::Entity").unwrap();
        runtime.shutdown();
    }

    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    #[test]
    fn test_leak_reports_are_per_runtime() {
        let a = Runtime::with_classes(RuntimeConfig::named("a"), &[&ENTITY]).unwrap();
        let b = Runtime::with_classes(RuntimeConfig::named("b"), &[&ENTITY]).unwrap();
        assert_ne!(a.id(), b.id());

        let kept = b.create("Test::Entity").unwrap();
        let unowned = Ptr::new(Entity::default());

        assert!(a.shutdown().is_clean());
        let report = b.shutdown();
        assert_eq!(report.len(), 1);
        assert_eq!(report.leaks[0].serial, kept.header().serial());
        drop((kept, unowned));
    }

    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    #[test]
    fn test_enter_attributes_direct_allocations() {
        let runtime = Runtime::default();
        let direct = {
            let _scope = runtime.enter();
            Ptr::new(Entity::default())
        };
        let outside = Ptr::new(Entity::default());

        let report = runtime.shutdown();
        assert_eq!(report.count_of("Test::Entity"), 1);
        assert_eq!(report.leaks[0].serial, direct.header().serial());
        drop((direct, outside));
    }
}
