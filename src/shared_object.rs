//! Shared ownership for loggers and appenders.
//!
//! [`SharedObject`] pairs a value with the access mutex callers hold while
//! driving it, and [`Handle`] is the atomically swappable reference through
//! which loggers, the hierarchy and the at-exit hooks reach it. The reference
//! count is the `Arc` strong count; the object is dropped exactly once, by
//! whichever handle releases the last reference.

use std::fmt;
use std::ops::Deref;
use std::ptr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, MutexGuard};

/// A value participating in shared ownership.
///
/// Cloning produces an unrelated object with its own access mutex; the copy
/// never shares a reference count with its source.
pub struct SharedObject<T> {
    access_mutex: Mutex<()>,
    value: T,
}

impl<T> SharedObject<T> {
    pub fn new(value: T) -> Self {
        Self {
            access_mutex: Mutex::new(()),
            value,
        }
    }

    /// Lock the object's access mutex.
    ///
    /// Appenders are always driven with this lock held so `append` and
    /// `flush` never interleave on the same instance.
    pub fn access_lock(&self) -> MutexGuard<'_, ()> {
        self.access_mutex.lock()
    }

    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for SharedObject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Clone> Clone for SharedObject<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObject")
            .field("value", &self.value)
            .finish()
    }
}

/// Reference to a [`SharedObject`] that may be copied, reassigned and read
/// concurrently without external locking.
///
/// Each handle owns at most one share of its target. Reassignment acquires
/// the new target before releasing the old one, so a thread reading the old
/// pointer never observes it freed underneath it.
pub struct Handle<T> {
    pointee: ArcSwapOption<SharedObject<T>>,
}

impl<T> Handle<T> {
    /// Wrap `value` in a fresh shared object with a single reference.
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(SharedObject::new(value)))
    }

    /// A handle pointing at nothing.
    pub fn null() -> Self {
        Self {
            pointee: ArcSwapOption::empty(),
        }
    }

    pub fn from_arc(target: Arc<SharedObject<T>>) -> Self {
        Self {
            pointee: ArcSwapOption::new(Some(target)),
        }
    }

    /// Return a new strong reference to the target, if any.
    pub fn get(&self) -> Option<Arc<SharedObject<T>>> {
        self.pointee.load_full()
    }

    pub fn is_null(&self) -> bool {
        self.pointee.load().is_none()
    }

    /// Point this handle at `other`'s target.
    ///
    /// The incoming target is acquired before the outgoing one is released;
    /// assigning a handle to itself leaves the count untouched.
    pub fn assign(&self, other: &Handle<T>) {
        if ptr::eq(self, other) {
            return;
        }
        let incoming = other.pointee.load_full();
        self.replace(incoming);
    }

    /// Point this handle at `target`, releasing the previous target.
    pub fn assign_arc(&self, target: Option<Arc<SharedObject<T>>>) {
        self.replace(target);
    }

    /// Detach the target from this handle and hand its reference to the caller.
    pub fn take(&self) -> Option<Arc<SharedObject<T>>> {
        self.pointee.swap(None)
    }

    /// Release the target, leaving the handle null.
    pub fn reset(&self) {
        self.replace(None);
    }

    /// Current strong count of the target, or zero for a null handle.
    pub fn ref_count(&self) -> usize {
        let guard = self.pointee.load();
        Option::as_ref(&guard).map_or(0, Arc::strong_count)
    }

    /// Compare targets by identity.
    pub fn ptr_eq(&self, other: &Handle<T>) -> bool {
        self.target_ptr() == other.target_ptr()
    }

    /// Return `true` when this handle points at `target`.
    pub fn is_target(&self, target: *const T) -> bool {
        self.target_ptr() == target
    }

    fn target_ptr(&self) -> *const T {
        let guard = self.pointee.load();
        Option::as_ref(&guard).map_or(ptr::null(), |obj| ptr::from_ref(obj.get()))
    }

    fn replace(&self, incoming: Option<Arc<SharedObject<T>>>) {
        let outgoing = self.pointee.swap(incoming);
        drop(outgoing);
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            pointee: ArcSwapOption::new(self.pointee.load_full()),
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialEq<*const T> for Handle<T> {
    fn eq(&self, other: &*const T) -> bool {
        self.is_target(*other)
    }
}

impl<T> From<Arc<SharedObject<T>>> for Handle<T> {
    fn from(target: Arc<SharedObject<T>>) -> Self {
        Self::from_arc(target)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.target_ptr();
        if target.is_null() {
            f.write_str("Handle(null)")
        } else {
            write!(f, "Handle({target:p})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn self_assignment_keeps_target_alive() {
        let drops = Arc::new(AtomicUsize::new(0));
        let handle = Handle::new(DropCounter(Arc::clone(&drops)));
        handle.assign(&handle);
        let alias = handle.clone();
        handle.assign(&alias);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(handle.ref_count(), 2);
        drop(alias);
        drop(handle);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn assignment_releases_previous_target() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = Handle::new(DropCounter(Arc::clone(&drops)));
        let second = Handle::new(DropCounter(Arc::clone(&drops)));
        first.assign(&second);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(first.ptr_eq(&second));
        assert_eq!(second.ref_count(), 2);
    }

    #[test]
    fn moving_a_handle_does_not_touch_the_count() {
        let handle = Handle::new(5_u32);
        let moved = handle;
        assert_eq!(moved.ref_count(), 1);
        let taken = moved.take().expect("target present");
        assert!(moved.is_null());
        assert_eq!(Arc::strong_count(&taken), 1);
    }

    #[test]
    fn compares_against_raw_target_pointer() {
        let handle = Handle::new(String::from("appender"));
        let target = handle.get().expect("target present");
        assert!(handle == ptr::from_ref(target.get()));
        assert!(Handle::<String>::null() == ptr::null());
        assert_ne!(handle, Handle::new(String::from("appender")));
    }

    #[test]
    fn cloned_object_has_independent_lifetime() {
        let original = SharedObject::new(vec![1, 2, 3]);
        let copy = original.clone();
        let _guard = original.access_lock();
        // The copy owns its own mutex, so this does not deadlock.
        let _copy_guard = copy.access_lock();
        assert_eq!(*copy, vec![1, 2, 3]);
    }
}
