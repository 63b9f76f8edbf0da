use crate::{Error, Result};
use std::{alloc::Layout, ptr::NonNull};

/// Ends the lifetime of an object owned by a control block
///
/// A deleter is invoked at most once, when the last strong handle to its object is dropped.
///
/// Any `FnMut(NonNull<T>)` closure can be used as a deleter.
pub trait Deleter<T: ?Sized> {
    /// Destroys the object at `object` and releases the memory it occupies
    ///
    /// # Safety
    ///
    /// `object` must be the pointer that the deleter's owner was constructed with, and it must
    /// not be used again after this call.
    unsafe fn delete(&mut self, object: NonNull<T>);
}

/// The default [Deleter], for objects that were allocated in a [Box]
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    unsafe fn delete(&mut self, object: NonNull<T>) {
        // Safety: the caller guarantees that the pointer came from `Box::into_raw` or similar
        drop(unsafe { Box::from_raw(object.as_ptr()) });
    }
}

impl<T: ?Sized, F> Deleter<T> for F
where
    F: FnMut(NonNull<T>),
{
    unsafe fn delete(&mut self, object: NonNull<T>) {
        self(object)
    }
}

/// Provides and reclaims the memory used by control blocks
///
/// The strategy is stored inside the block that it allocated, and is used to release the
/// block once both its strong and weak counts have reached zero.
pub trait Storage {
    /// Allocates memory that fits the given layout
    ///
    /// Returns [Error::AllocationFailed] if no memory is available.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>>;

    /// Releases memory that was previously returned by [Storage::allocate]
    ///
    /// # Safety
    ///
    /// `memory` must have been allocated by this strategy (or a clone of it) with the same
    /// `layout`, and it must not be used again after this call.
    unsafe fn deallocate(&self, memory: NonNull<u8>, layout: Layout);
}

/// The default [Storage], backed by the global allocator
#[derive(Copy, Clone, Debug, Default)]
pub struct Global;

impl Storage for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        debug_assert!(layout.size() > 0, "control blocks are never zero-sized");
        // Safety: control block layouts always have a non-zero size
        let memory = unsafe { std::alloc::alloc(layout) };
        NonNull::new(memory).ok_or_else(|| Error::allocation_failed(layout))
    }

    unsafe fn deallocate(&self, memory: NonNull<u8>, layout: Layout) {
        // Safety: the caller guarantees that the memory came from `allocate` with this layout
        unsafe { std::alloc::dealloc(memory.as_ptr(), layout) }
    }
}
