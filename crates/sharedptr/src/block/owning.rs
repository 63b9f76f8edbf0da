use super::{BlockHeader, BlockRef, ControlBlock};
use crate::{Deleter, Result, Storage};
use std::{alloc::Layout, mem::ManuallyDrop, ptr::NonNull};

/// A control block for an object that was allocated separately
///
/// The object is released by the block's deleter, while the block itself is released by its
/// storage strategy. The two don't need to agree on where their memory comes from.
#[repr(C)]
pub(crate) struct OwningBlock<T: ?Sized, D, S> {
    header: BlockHeader,
    object: Option<NonNull<T>>,
    deleter: ManuallyDrop<D>,
    storage: ManuallyDrop<S>,
}

impl<T, D, S> OwningBlock<T, D, S>
where
    T: ?Sized,
    D: Deleter<T> + 'static,
    S: Storage + 'static,
{
    /// Makes a block that owns `object`, with a single strong count
    ///
    /// If the block can't be allocated then the object is passed to the deleter before the
    /// error is returned, ownership of the object has been transferred either way.
    ///
    /// # Safety
    ///
    /// `object` must point to a live object that `deleter` is able to destroy, and nothing else
    /// may destroy the object.
    pub(crate) unsafe fn allocate(
        object: NonNull<T>,
        mut deleter: D,
        storage: S,
    ) -> Result<BlockRef> {
        let layout = Layout::new::<Self>();

        match storage.allocate(layout) {
            Ok(memory) => {
                let block = memory.cast::<Self>();
                unsafe {
                    block.as_ptr().write(Self {
                        header: BlockHeader::new::<Self>(1, 0),
                        object: Some(object),
                        deleter: ManuallyDrop::new(deleter),
                        storage: ManuallyDrop::new(storage),
                    });
                    Ok(BlockRef::new(block))
                }
            }
            Err(error) => {
                log_debug!("{error}, the object will be destroyed");
                unsafe { deleter.delete(object) };
                Err(error)
            }
        }
    }
}

unsafe impl<T, D, S> ControlBlock for OwningBlock<T, D, S>
where
    T: ?Sized,
    D: Deleter<T> + 'static,
    S: Storage + 'static,
{
    const KIND: &'static str = "owning";

    unsafe fn destroy(this: NonNull<Self>) {
        let block = this.as_ptr();
        unsafe {
            if let Some(object) = (*block).object.take() {
                (*block).deleter.delete(object);
            }
        }
    }

    unsafe fn deallocate(this: NonNull<Self>) {
        let block = this.as_ptr();
        unsafe {
            debug_assert!((*block).object.is_none(), "the object must be destroyed first");
            ManuallyDrop::drop(&mut (*block).deleter);
            let storage = ManuallyDrop::take(&mut (*block).storage);
            storage.deallocate(this.cast(), Layout::new::<Self>());
        }
    }
}

impl<T: ?Sized, D, S> OwningBlock<T, D, S> {
    pub(crate) fn layout() -> Layout {
        Layout::new::<Self>()
    }
}
