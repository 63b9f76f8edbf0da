use sharedptr::{Error, Global, Result, Storage};
use std::{alloc::Layout, cell::Cell, ptr::NonNull, rc::Rc};

#[derive(Debug, Default)]
struct Stats {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    live_bytes: Cell<usize>,
}

/// A [Storage] that counts the allocations it makes, delegating to [Global]
///
/// Clones share the same counts, so a clone can be moved into a control block while the
/// original is kept by the test.
#[derive(Clone, Debug, Default)]
pub struct CountingStorage(Rc<Stats>);

impl CountingStorage {
    /// Makes a new storage with all counts at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of successful allocations
    pub fn allocations(&self) -> usize {
        self.0.allocations.get()
    }

    /// The number of deallocations
    pub fn deallocations(&self) -> usize {
        self.0.deallocations.get()
    }

    /// The number of allocations that haven't been released yet
    pub fn live(&self) -> usize {
        self.allocations() - self.deallocations()
    }

    /// The number of bytes in allocations that haven't been released yet
    pub fn live_bytes(&self) -> usize {
        self.0.live_bytes.get()
    }
}

impl Storage for CountingStorage {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        let memory = Global.allocate(layout)?;
        let stats = &self.0;
        stats.allocations.set(stats.allocations.get() + 1);
        stats.live_bytes.set(stats.live_bytes.get() + layout.size());
        Ok(memory)
    }

    unsafe fn deallocate(&self, memory: NonNull<u8>, layout: Layout) {
        let stats = &self.0;
        assert!(
            stats.deallocations.get() < stats.allocations.get(),
            "deallocation without a matching allocation"
        );
        stats.deallocations.set(stats.deallocations.get() + 1);
        stats.live_bytes.set(stats.live_bytes.get() - layout.size());
        unsafe { Global.deallocate(memory, layout) }
    }
}

/// A [Storage] that's always out of memory
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingStorage;

impl Storage for FailingStorage {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        Err(Error::AllocationFailed {
            size: layout.size(),
            align: layout.align(),
        })
    }

    unsafe fn deallocate(&self, _memory: NonNull<u8>, _layout: Layout) {
        panic!("FailingStorage never allocates, so it can't deallocate");
    }
}
