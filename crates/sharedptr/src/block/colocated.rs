use super::{BlockHeader, BlockRef, ControlBlock};
use crate::{Error, Result, Storage};
use std::{
    alloc::Layout,
    mem::{self, ManuallyDrop, MaybeUninit},
    ptr::NonNull,
};

/// A control block that stores its object inline
///
/// The block and the object share a single allocation, which is released by the block's
/// storage strategy once the block is no longer referenced.
#[repr(C)]
pub(crate) struct ColocatedBlock<T, S> {
    header: BlockHeader,
    storage: ManuallyDrop<S>,
    value: MaybeUninit<T>,
}

impl<T, S: Storage + 'static> ColocatedBlock<T, S> {
    /// Allocates a block and then constructs its object in the block's storage
    ///
    /// The returned block has a single strong count.
    ///
    /// If `init` fails then the block's storage is reclaimed before returning
    /// [Error::Construction]. The storage is also reclaimed if `init` panics.
    pub(crate) fn allocate<F, E>(storage: S, init: F) -> Result<(BlockRef, NonNull<T>)>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let block = storage.allocate(Self::layout())?.cast::<Self>();
        let raw = block.as_ptr();

        unsafe {
            (&raw mut (*raw).header).write(BlockHeader::new::<Self>(1, 0));
            (&raw mut (*raw).storage).write(ManuallyDrop::new(storage));
        }

        let guard = UninitGuard(block);
        let value = init().map_err(|error| {
            let error = Error::Construction(error.into());
            log_debug!("{error}, releasing colocated block");
            error
        })?;
        mem::forget(guard);

        let object = unsafe {
            let slot = &raw mut (*raw).value;
            (*slot).write(value);
            NonNull::new_unchecked((*slot).as_mut_ptr())
        };

        Ok((unsafe { BlockRef::new(block) }, object))
    }
}

impl<T, S> ColocatedBlock<T, S> {
    pub(crate) fn layout() -> Layout {
        Layout::new::<Self>()
    }

    /// Releases the block's storage, leaving the object slot untouched
    unsafe fn release_storage(this: NonNull<Self>)
    where
        S: Storage,
    {
        unsafe {
            let storage = ManuallyDrop::take(&mut (*this.as_ptr()).storage);
            storage.deallocate(this.cast(), Self::layout());
        }
    }
}

unsafe impl<T, S: Storage + 'static> ControlBlock for ColocatedBlock<T, S> {
    const KIND: &'static str = "colocated";

    unsafe fn destroy(this: NonNull<Self>) {
        unsafe { (*this.as_ptr()).value.assume_init_drop() }
    }

    unsafe fn deallocate(this: NonNull<Self>) {
        unsafe { Self::release_storage(this) }
    }
}

// Releases a block whose object hasn't been constructed
struct UninitGuard<T, S: Storage>(NonNull<ColocatedBlock<T, S>>);

impl<T, S: Storage> Drop for UninitGuard<T, S> {
    fn drop(&mut self) {
        unsafe { ColocatedBlock::release_storage(self.0) }
    }
}
