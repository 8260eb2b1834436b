//! Shared single-threaded handle over `Rc<RefCell<T>>`.

use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

/// A single-threaded, reference-counted resource with interior mutability.
///
/// `StResource` lets several owners on the tick thread refer to the same value.
/// The spatial index and the regeneration queue both hold chunks this way, so a
/// chunk swapped by the meshing pipeline is immediately visible through the index.
///
/// # Examples
///
/// ```
/// use voxel_mesher::core::StResource;
///
/// let counter = StResource::new(0);
/// let alias = counter.clone();
///
/// *alias.get_mut() += 1;
/// assert_eq!(*counter.get(), 1);
/// assert!(counter.ptr_eq(&alias));
/// ```
///
/// # Panics
/// - Panics if a shared borrow is held while a mutable borrow is requested
/// - Panics if a mutable borrow is held while any borrow is requested
pub struct StResource<T> {
    resource: Rc<RefCell<T>>,
}

impl<T> StResource<T> {
    /// Wraps `resource` in a new shared handle.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Rc::new(RefCell::new(resource)),
        }
    }

    /// Returns a guard that allows reading the contained value.
    pub fn get(&self) -> Ref<'_, T> {
        self.resource.borrow()
    }

    /// Returns a guard that allows modifying the contained value.
    pub fn get_mut(&self) -> RefMut<'_, T> {
        self.resource.borrow_mut()
    }

    /// Whether both handles point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.resource, &other.resource)
    }

    /// Number of live handles to the value.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.resource)
    }
}

impl<T> Clone for StResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StResource").field(&*self.get()).finish()
    }
}
