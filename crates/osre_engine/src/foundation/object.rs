//! Named objects and shared ownership
//!
//! [`Object`] carries the display name and the name-derived identity that
//! engine entities (pipelines, shaders, materials, nodes) are looked up by.
//! [`Shared`] is the shared-ownership handle those entities are passed around
//! in: every holder owns one count, and the value is destroyed when the last
//! holder releases it.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

/// Identity hash of an object, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Derive the identity for `name`; equal names give equal ids
    pub fn from_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Named engine entity
///
/// The identity is fixed at construction; renaming only changes the display
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    name: String,
    id: ObjectId,
}

impl Object {
    /// Create an object whose identity is derived from `name`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = ObjectId::from_name(&name);
        Self { name, id }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the display name, keeping the identity
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Identity hash assigned at construction
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

/// Identity of the value behind a [`Shared`] handle
///
/// Equal exactly for handles owning the same value. Only meaningful while one
/// of those handles is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SharedKey(usize);

/// Shared-ownership handle
///
/// Each handle is one owner. [`Shared::acquire`] adds an owner and
/// [`Shared::release`] gives one up; the wrapped value is dropped exactly
/// when the last owner releases. `release` consumes the handle, so a handle
/// can never be released twice.
pub struct Shared<T> {
    inner: Rc<T>,
}

impl<T> Shared<T> {
    /// Wrap `value` with a single owner
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(value),
        }
    }

    /// Take an additional ownership of the value
    #[must_use]
    pub fn acquire(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Give up this ownership
    ///
    /// Returns `true` when this was the last owner and the value was destroyed.
    pub fn release(self) -> bool {
        Rc::into_inner(self.inner).is_some()
    }

    /// Number of live owners
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Whether two handles own the same value
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Identity of the owned value, independent of its contents
    pub fn key(&self) -> SharedKey {
        SharedKey(Rc::as_ptr(&self.inner) as usize)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("refs", &self.ref_count())
            .field("value", &*self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct DropCounter<'a> {
        drops: &'a Cell<u32>,
    }

    impl Drop for DropCounter<'_> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn test_same_name_same_identity() {
        let a = Object::new("camera");
        let b = Object::new("camera");
        let c = Object::new("mesh");
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_rename_keeps_identity() {
        let mut obj = Object::new("first");
        let id = obj.id();
        obj.set_name("second");
        assert_eq!(obj.name(), "second");
        assert_eq!(obj.id(), id);
    }

    #[test]
    fn test_new_handle_has_one_owner() {
        let handle = Shared::new(5);
        assert_eq!(handle.ref_count(), 1);
        assert_eq!(*handle, 5);
    }

    #[test]
    fn test_last_release_destroys_exactly_once() {
        let drops = Cell::new(0);
        let first = Shared::new(DropCounter { drops: &drops });

        let extra: Vec<_> = (0..3).map(|_| first.acquire()).collect();
        assert_eq!(first.ref_count(), 4);

        for handle in extra {
            assert!(!handle.release());
            assert_eq!(drops.get(), 0);
        }

        assert!(first.release());
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_acquired_handles_share_the_value() {
        let a = Shared::new(String::from("shader"));
        let b = a.acquire();
        let c = Shared::new(String::from("shader"));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }
}
