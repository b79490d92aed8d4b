//! Live-object tracking for leak reports
//!
//! Every [`ObjectHeader`](crate::ObjectHeader) registers itself on
//! construction and deregisters on drop. Whatever is still registered at
//! shutdown never saw its count reach zero.
//!
//! The registry is per thread, matching the one-context-per-thread usage of
//! the object model. Each entry remembers the owner that was current when the
//! object was allocated (see [`enter`]); a runtime reports only the objects it
//! owns, so several runtimes can share a thread. The registry only exists
//! with `debug_assertions` or the `leak-tracking` feature; otherwise headers
//! carry no serial and reports are always clean.

use core::fmt;
use core::marker::PhantomData;

use crate::type_code::TypeCode;

/// One object that was still alive when the report was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakRecord {
    /// Allocation order on this thread
    pub serial: u64,
    pub class_name: &'static str,
    pub type_code: TypeCode,
    /// Owner current at allocation, if any
    pub owner: Option<u64>,
}

/// Objects still alive at shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakReport {
    pub leaks: Vec<LeakRecord>,
}

impl LeakReport {
    /// No leaks
    pub fn is_clean(&self) -> bool {
        self.leaks.is_empty()
    }

    /// Number of leaked objects
    pub fn len(&self) -> usize {
        self.leaks.len()
    }

    /// Same as [`is_clean`](Self::is_clean)
    pub fn is_empty(&self) -> bool {
        self.leaks.is_empty()
    }

    /// Leaked objects of one class
    pub fn count_of(&self, class_name: &str) -> usize {
        self.leaks
            .iter()
            .filter(|leak| leak.class_name == class_name)
            .count()
    }

    /// Emit one warning per leaked object
    pub fn log(&self) {
        for leak in &self.leaks {
            log::warn!(
                "Leaked object #{}: {} '{}'",
                leak.serial,
                leak.class_name,
                leak.type_code
            );
        }
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "no leaked objects");
        }
        writeln!(f, "{} leaked object(s):", self.leaks.len())?;
        for leak in &self.leaks {
            writeln!(f, "  #{} {} '{}'", leak.serial, leak.class_name, leak.type_code)?;
        }
        Ok(())
    }
}

/// Attributes allocations on this thread to one owner until dropped
#[must_use = "allocations are attributed only while the scope is alive"]
pub struct OwnerScope {
    #[cfg(any(debug_assertions, feature = "leak-tracking"))]
    previous: Option<u64>,
    _thread_bound: PhantomData<*const ()>,
}

/// Make `owner` the current owner of new allocations on this thread.
///
/// Scopes nest; dropping one restores the previous owner.
pub fn enter(owner: u64) -> OwnerScope {
    #[cfg(not(any(debug_assertions, feature = "leak-tracking")))]
    let _ = owner;

    OwnerScope {
        #[cfg(any(debug_assertions, feature = "leak-tracking"))]
        previous: tracking::swap_owner(Some(owner)),
        _thread_bound: PhantomData,
    }
}

impl Drop for OwnerScope {
    fn drop(&mut self) {
        #[cfg(any(debug_assertions, feature = "leak-tracking"))]
        tracking::swap_owner(self.previous);
    }
}

impl fmt::Debug for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerScope").finish_non_exhaustive()
    }
}

#[cfg(any(debug_assertions, feature = "leak-tracking"))]
pub use tracking::{
    current_owner, deregister, live_count, live_count_of, mark, register, report,
    report_owned_by, report_since, snapshot, snapshot_owned_by, snapshot_since,
};

#[cfg(any(debug_assertions, feature = "leak-tracking"))]
mod tracking {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::{LeakRecord, LeakReport};
    use crate::rtti::TypeRecord;

    struct Entry {
        record: &'static TypeRecord,
        owner: Option<u64>,
    }

    impl Entry {
        fn leak(&self, serial: u64) -> LeakRecord {
            LeakRecord {
                serial,
                class_name: self.record.name(),
                type_code: self.record.code(),
                owner: self.owner,
            }
        }
    }

    #[derive(Default)]
    struct Tracker {
        next_serial: u64,
        owner: Option<u64>,
        live: BTreeMap<u64, Entry>,
    }

    thread_local! {
        static TRACKER: RefCell<Tracker> = RefCell::new(Tracker::default());
    }

    /// Record a new instance, returning its serial
    pub fn register(record: &'static TypeRecord) -> u64 {
        TRACKER.with(|tracker| {
            let mut tracker = tracker.borrow_mut();
            let serial = tracker.next_serial;
            tracker.next_serial += 1;
            let owner = tracker.owner;
            tracker.live.insert(serial, Entry { record, owner });
            serial
        })
    }

    pub(super) fn swap_owner(owner: Option<u64>) -> Option<u64> {
        TRACKER
            .try_with(|tracker| core::mem::replace(&mut tracker.borrow_mut().owner, owner))
            .unwrap_or(None)
    }

    /// Owner new allocations are attributed to
    pub fn current_owner() -> Option<u64> {
        TRACKER.with(|tracker| tracker.borrow().owner)
    }

    /// Forget a destroyed instance
    pub fn deregister(serial: u64) {
        // Objects dropped during thread teardown may outlive the tracker.
        let _ = TRACKER.try_with(|tracker| {
            tracker.borrow_mut().live.remove(&serial);
        });
    }

    /// Serial the next instance will get; pass to [`report_since`]
    pub fn mark() -> u64 {
        TRACKER.with(|tracker| tracker.borrow().next_serial)
    }

    /// Number of live instances on this thread
    pub fn live_count() -> usize {
        TRACKER.with(|tracker| tracker.borrow().live.len())
    }

    /// Number of live instances of exactly `record`
    pub fn live_count_of(record: &TypeRecord) -> usize {
        TRACKER.with(|tracker| {
            tracker
                .borrow()
                .live
                .values()
                .filter(|entry| core::ptr::eq(entry.record, record))
                .count()
        })
    }

    /// Live instances allocated at or after `mark`, oldest first
    pub fn snapshot_since(mark: u64) -> Vec<LeakRecord> {
        TRACKER.with(|tracker| {
            tracker
                .borrow()
                .live
                .range(mark..)
                .map(|(serial, entry)| entry.leak(*serial))
                .collect()
        })
    }

    /// Live instances allocated while `owner` was current, oldest first
    pub fn snapshot_owned_by(owner: u64) -> Vec<LeakRecord> {
        TRACKER.with(|tracker| {
            tracker
                .borrow()
                .live
                .iter()
                .filter(|(_, entry)| entry.owner == Some(owner))
                .map(|(serial, entry)| entry.leak(*serial))
                .collect()
        })
    }

    /// Every live instance on this thread, oldest first
    pub fn snapshot() -> Vec<LeakRecord> {
        snapshot_since(0)
    }

    /// Report (and log) instances allocated at or after `mark`
    pub fn report_since(mark: u64) -> LeakReport {
        let report = LeakReport {
            leaks: snapshot_since(mark),
        };
        report.log();
        report
    }

    /// Report (and log) instances owned by `owner`
    pub fn report_owned_by(owner: u64) -> LeakReport {
        let report = LeakReport {
            leaks: snapshot_owned_by(owner),
        };
        report.log();
        report
    }

    /// Report (and log) every live instance on this thread
    pub fn report() -> LeakReport {
        report_since(0)
    }
}
