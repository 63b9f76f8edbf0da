//! Control blocks shared between the handles of a single managed object

mod colocated;
mod owning;

pub(crate) use colocated::ColocatedBlock;
pub(crate) use owning::OwningBlock;

use crate::Address;
use std::{cell::Cell, ptr::NonNull};

/// The bookkeeping that's common to every kind of control block
///
/// Each concrete block is `#[repr(C)]` with the header as its first field, so a pointer to the
/// block can be used as a pointer to its header and vice versa.
pub(crate) struct BlockHeader {
    strong: Cell<usize>,
    weak: Cell<usize>,
    destroy: unsafe fn(NonNull<BlockHeader>),
    deallocate: unsafe fn(NonNull<BlockHeader>),
    kind: &'static str,
}

impl BlockHeader {
    /// Makes a header that dispatches to `B`'s implementation of [ControlBlock]
    pub(crate) fn new<B: ControlBlock>(strong: usize, weak: usize) -> Self {
        Self {
            strong: Cell::new(strong),
            weak: Cell::new(weak),
            destroy: destroy_erased::<B>,
            deallocate: deallocate_erased::<B>,
            kind: B::KIND,
        }
    }
}

/// The operations that distinguish one kind of control block from another
///
/// # Safety
///
/// Implementers must be `#[repr(C)]` with a [BlockHeader] made by `BlockHeader::new::<Self>`
/// as their first field.
pub(crate) unsafe trait ControlBlock: Sized {
    /// A short name for the kind of block, used in log messages
    const KIND: &'static str;

    /// Ends the lifetime of the managed object, without releasing the block
    ///
    /// # Safety
    ///
    /// `this` must point to a live block, and this must be called at most once per block.
    unsafe fn destroy(this: NonNull<Self>);

    /// Releases the block's storage
    ///
    /// # Safety
    ///
    /// `this` must point to a live block with no remaining references, and the block must not
    /// be used again after this call.
    unsafe fn deallocate(this: NonNull<Self>);
}

unsafe fn destroy_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    unsafe { B::destroy(header.cast()) }
}

unsafe fn deallocate_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    unsafe { B::deallocate(header.cast()) }
}

// Overflow can only be reached by leaking handles, abort like `std::rc::Rc`
fn increment(count: &Cell<usize>) {
    match count.get().checked_add(1) {
        Some(incremented) => count.set(incremented),
        None => std::process::abort(),
    }
}

/// An uncounted reference to a control block
///
/// Handles are responsible for acquiring and releasing the counts that keep the block alive.
#[derive(Copy, Clone)]
pub(crate) struct BlockRef(NonNull<BlockHeader>);

impl BlockRef {
    /// Wraps a pointer to a freshly initialized block
    ///
    /// # Safety
    ///
    /// `block` must point to an initialized `B`.
    pub(crate) unsafe fn new<B: ControlBlock>(block: NonNull<B>) -> Self {
        let result = Self(block.cast());
        log_trace!(
            "created {} block at {} (strong: {}, weak: {})",
            result.header().kind,
            result.address(),
            result.strong_count(),
            result.weak_count()
        );
        result
    }

    fn header(&self) -> &BlockHeader {
        // Safety: a BlockRef is only held while the block is kept alive by a count
        unsafe { self.0.as_ref() }
    }

    pub(crate) fn address(&self) -> Address {
        Address::from(self.0.as_ptr() as *const BlockHeader)
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.header().strong.get()
    }

    pub(crate) fn weak_count(&self) -> usize {
        self.header().weak.get()
    }

    pub(crate) fn acquire_strong(&self) {
        increment(&self.header().strong);
    }

    pub(crate) fn acquire_weak(&self) {
        increment(&self.header().weak);
    }

    /// Gives up a strong count, destroying the object and releasing the block as needed
    ///
    /// # Safety
    ///
    /// The caller must own one of the block's strong counts, and must not use the block again.
    pub(crate) unsafe fn release_strong(self) {
        let header = self.header();
        debug_assert!(header.strong.get() > 0);

        let remaining = header.strong.get() - 1;
        header.strong.set(remaining);

        if remaining == 0 {
            log_trace!("destroying object in {} block at {}", header.kind, self.address());

            // The temporary weak count keeps the block alive while the object is being dropped,
            // the object may own weak handles to its own block.
            self.acquire_weak();
            let destroy = header.destroy;
            unsafe { destroy(self.0) };
            let weak = &self.header().weak;
            weak.set(weak.get() - 1);
        }

        unsafe { self.deallocate_if_unreferenced() }
    }

    /// Gives up a weak count, releasing the block if it's no longer referenced
    ///
    /// # Safety
    ///
    /// The caller must own one of the block's weak counts, and must not use the block again.
    pub(crate) unsafe fn release_weak(self) {
        let weak = &self.header().weak;
        debug_assert!(weak.get() > 0);
        weak.set(weak.get() - 1);

        unsafe { self.deallocate_if_unreferenced() }
    }

    unsafe fn deallocate_if_unreferenced(self) {
        let header = self.header();
        if header.strong.get() == 0 && header.weak.get() == 0 {
            log_trace!("releasing {} block at {}", header.kind, self.address());
            let deallocate = header.deallocate;
            unsafe { deallocate(self.0) }
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DefaultDelete, Global};
    use std::{cell::Cell, rc::Rc};

    struct Probe(Rc<Cell<usize>>);

    impl Drop for Probe {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn owning_block(drops: &Rc<Cell<usize>>) -> BlockRef {
        let object = NonNull::from(Box::leak(Box::new(Probe(drops.clone()))));
        unsafe { OwningBlock::allocate(object, DefaultDelete, Global) }.unwrap()
    }

    #[test]
    fn new_block_has_a_single_strong_count() {
        let drops = Rc::new(Cell::new(0));
        let block = owning_block(&drops);

        assert_eq!(block.strong_count(), 1);
        assert_eq!(block.weak_count(), 0);

        unsafe { block.release_strong() };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn weak_count_outlives_object() {
        let drops = Rc::new(Cell::new(0));
        let block = owning_block(&drops);
        block.acquire_weak();

        unsafe { block.release_strong() };
        assert_eq!(drops.get(), 1);
        assert_eq!(block.strong_count(), 0);
        assert_eq!(block.weak_count(), 1);

        unsafe { block.release_weak() };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn object_is_destroyed_on_last_strong_release() {
        let drops = Rc::new(Cell::new(0));
        let block = owning_block(&drops);
        block.acquire_strong();
        block.acquire_strong();

        unsafe { block.release_strong() };
        unsafe { block.release_strong() };
        assert_eq!(drops.get(), 0);

        unsafe { block.release_strong() };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn increment_reaches_the_maximum_count() {
        let count = Cell::new(usize::MAX - 1);
        increment(&count);
        assert_eq!(count.get(), usize::MAX);
    }

    #[test]
    fn colocated_block() {
        let drops = Rc::new(Cell::new(0));
        let (block, object) = ColocatedBlock::allocate(Global, || {
            Ok::<_, std::convert::Infallible>(Probe(drops.clone()))
        })
        .unwrap();

        assert_eq!(block.strong_count(), 1);
        assert!(Rc::ptr_eq(&unsafe { object.as_ref() }.0, &drops));

        unsafe { block.release_strong() };
        assert_eq!(drops.get(), 1);
    }
}
