use crate::{
    Address, Cast, DefaultDelete, Deleter, Error, Global, Result, SharedFromThis, Storage, Weak,
    block::{BlockRef, ColocatedBlock, OwningBlock},
};
use std::{
    alloc::handle_alloc_error,
    any::type_name,
    cmp::Ordering,
    convert::Infallible,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops::Deref,
    ptr::{self, NonNull},
};

/// A pointer to a managed object along with the control block that tracks it
///
/// Raw parts don't own a count by themselves; the handle that holds them does.
pub(crate) struct Raw<T: ?Sized> {
    pub(crate) object: NonNull<T>,
    pub(crate) block: BlockRef,
}

impl<T: ?Sized> Clone for Raw<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Raw<T> {}

/// A strong reference-counted handle to a managed object
///
/// Cloning a `Shared` increments the strong count of the object's control block, and dropping
/// it decrements the count. The object is destroyed when the count reaches zero, and the control
/// block is released once there are no [Weak] handles left either.
///
/// A `Shared` can be empty (see [Shared::default]), in which case it doesn't refer to an object
/// or a control block. Dereferencing an empty handle panics, [Shared::get] is the non-panicking
/// alternative.
///
/// Because `Shared` dereferences to `T`, its operations are associated functions,
/// e.g. `Shared::use_count(&handle)` rather than `handle.use_count()`.
pub struct Shared<T: ?Sized> {
    raw: Option<Raw<T>>,
    _marker: PhantomData<T>,
}

impl<T> Shared<T> {
    /// Makes a new `Shared`, with the value stored inside its control block
    ///
    /// Like [Box::new], this calls [handle_alloc_error] if the allocation fails,
    /// see [Shared::try_new] for a fallible version.
    pub fn new(value: T) -> Self {
        match Self::try_new(value) {
            Ok(shared) => shared,
            Err(_) => handle_alloc_error(ColocatedBlock::<T, Global>::layout()),
        }
    }

    /// Makes a new `Shared` with the value stored inside its control block
    pub fn try_new(value: T) -> Result<Self> {
        Self::try_new_in(value, Global)
    }

    /// Makes a new `Shared`, allocating the combined block and value with the given [Storage]
    pub fn try_new_in<S>(value: T, storage: S) -> Result<Self>
    where
        S: Storage + 'static,
    {
        Self::try_new_with_in(|| Ok::<_, Infallible>(value), storage)
    }

    /// Makes a new `Shared` by running a fallible constructor after the block has been allocated
    ///
    /// If the constructor returns an error then the block's storage is released and
    /// [Error::Construction] is returned.
    pub fn try_new_with<F, E>(init: F) -> Result<Self>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::try_new_with_in(init, Global)
    }

    /// Makes a new `Shared` by running a fallible constructor, using the given [Storage]
    ///
    /// See [Shared::try_new_with].
    pub fn try_new_with_in<F, E, S>(init: F, storage: S) -> Result<Self>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        S: Storage + 'static,
    {
        let (block, object) = ColocatedBlock::allocate(storage, init)?;
        Ok(Self::from_counted(Raw { object, block }))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Takes ownership of an object that was allocated in a [Box]
    ///
    /// The object is destroyed by reclaiming the box, while the control block is allocated
    /// separately with the global allocator.
    pub fn from_box(boxed: Box<T>) -> Self {
        let object = NonNull::from(Box::leak(boxed));
        // Safety: the object came from a Box, which is what DefaultDelete expects
        match unsafe { Self::from_raw_in(object, DefaultDelete, Global) } {
            Ok(shared) => shared,
            Err(_) => handle_alloc_error(OwningBlock::<T, DefaultDelete, Global>::layout()),
        }
    }

    /// Takes ownership of an object that was allocated in a [Box] and then leaked
    ///
    /// # Safety
    ///
    /// `object` must have been produced by [Box::into_raw] or [Box::leak], and must not be
    /// owned by anything else.
    pub unsafe fn from_raw(object: NonNull<T>) -> Result<Self> {
        unsafe { Self::from_raw_in(object, DefaultDelete, Global) }
    }

    /// Takes ownership of an object that will be destroyed by the given [Deleter]
    ///
    /// # Safety
    ///
    /// `object` must point to a live object that `deleter` is able to destroy, and nothing else
    /// may destroy the object.
    pub unsafe fn from_raw_with<D>(object: NonNull<T>, deleter: D) -> Result<Self>
    where
        D: Deleter<T> + 'static,
    {
        unsafe { Self::from_raw_in(object, deleter, Global) }
    }

    /// Takes ownership of an object, allocating the control block with the given [Storage]
    ///
    /// If the control block can't be allocated, the object is passed to the deleter before
    /// returning [Error::AllocationFailed].
    ///
    /// # Safety
    ///
    /// `object` must point to a live object that `deleter` is able to destroy, and nothing else
    /// may destroy the object.
    pub unsafe fn from_raw_in<D, S>(object: NonNull<T>, deleter: D, storage: S) -> Result<Self>
    where
        D: Deleter<T> + 'static,
        S: Storage + 'static,
    {
        let block = unsafe { OwningBlock::allocate(object, deleter, storage) }?;
        Ok(Self::from_counted(Raw { object, block }))
    }

    /// Wraps raw parts for which a strong count has already been acquired
    pub(crate) fn from_counted(raw: Raw<T>) -> Self {
        Self {
            raw: Some(raw),
            _marker: PhantomData,
        }
    }

    pub(crate) fn raw(this: &Self) -> Option<Raw<T>> {
        this.raw
    }

    // Gives up ownership of the handle's strong count, if it has one
    fn into_block(this: Self) -> Option<BlockRef> {
        let this = ManuallyDrop::new(this);
        this.raw.map(|raw| raw.block)
    }

    /// Returns a reference to the managed object, or `None` if the handle is empty
    pub fn get(this: &Self) -> Option<&T> {
        // Safety: the handle's strong count keeps the object alive
        this.raw.map(|raw| unsafe { raw.object.as_ref() })
    }

    /// Returns a pointer to the managed object, or `None` if the handle is empty
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.raw.map(|raw| raw.object)
    }

    /// Returns true if the handle doesn't refer to an object
    pub fn is_empty(this: &Self) -> bool {
        this.raw.is_none()
    }

    /// Returns the number of strong handles sharing the object, or 0 for an empty handle
    pub fn use_count(this: &Self) -> usize {
        this.raw.map_or(0, |raw| raw.block.strong_count())
    }

    /// Returns the number of weak handles observing the object, or 0 for an empty handle
    pub fn weak_count(this: &Self) -> usize {
        this.raw.map_or(0, |raw| raw.block.weak_count())
    }

    /// Makes a new [Weak] handle that observes the same object
    pub fn downgrade(this: &Self) -> Weak<T> {
        Weak::from(this)
    }

    /// Returns true if the two handles point to the same object
    ///
    /// Two empty handles are considered to be equal.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (this.raw, other.raw) {
            (Some(a), Some(b)) => ptr::addr_eq(a.object.as_ptr(), b.object.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns true if the two handles share a control block
    ///
    /// Handles with different pointee types can share a block after a conversion.
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &Shared<U>) -> bool {
        match (this.raw, other.raw) {
            (Some(a), Some(b)) => a.block.ptr_eq(&b.block),
            _ => false,
        }
    }

    /// Returns the address of the managed object, or a null address for an empty handle
    pub fn address(this: &Self) -> Address {
        this.raw
            .map_or(Address::null(), |raw| (raw.object.as_ptr() as *const T).into())
    }

    /// Releases the handle's object, leaving the handle empty
    pub fn reset(this: &mut Self) {
        let mut empty = Self::default();
        Self::swap(this, &mut empty);
    }

    /// Replaces the handle's object with a newly boxed one
    pub fn reset_with(this: &mut Self, boxed: Box<T>) {
        let mut replacement = Self::from_box(boxed);
        Self::swap(this, &mut replacement);
    }

    /// Replaces the handle's object with a new owning allocation
    ///
    /// The handle is left unchanged if the control block can't be allocated.
    ///
    /// # Safety
    ///
    /// See [Shared::from_raw_in].
    pub unsafe fn reset_raw_in<D, S>(
        this: &mut Self,
        object: NonNull<T>,
        deleter: D,
        storage: S,
    ) -> Result<()>
    where
        D: Deleter<T> + 'static,
        S: Storage + 'static,
    {
        let mut replacement = unsafe { Self::from_raw_in(object, deleter, storage) }?;
        Self::swap(this, &mut replacement);
        Ok(())
    }

    /// Exchanges the objects referred to by two handles
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(&mut this.raw, &mut other.raw);
    }
}

impl<T: ?Sized + 'static> Shared<T> {
    /// Converts the handle into a handle to something reachable from the object
    ///
    /// The returned handle shares the original control block, so e.g. a handle to a field of an
    /// object keeps the whole object alive. Counts are unchanged, the strong count is transferred.
    ///
    /// This is also how a handle to a concrete type is converted into a handle to a trait
    /// object:
    ///
    /// ```
    /// use sharedptr::Shared;
    /// use std::fmt::Display;
    ///
    /// fn as_display(n: &i32) -> &(dyn Display + 'static) {
    ///     n
    /// }
    ///
    /// let number = Shared::new(42);
    /// let display: Shared<dyn Display> = Shared::map(number, as_display);
    /// assert_eq!(display.to_string(), "42");
    /// ```
    pub fn map<U: ?Sized>(this: Self, f: impl FnOnce(&T) -> &U) -> Shared<U> {
        let object = match Self::get(&this) {
            Some(object) => NonNull::from(f(object)),
            None => return Shared::default(),
        };
        match Self::into_block(this) {
            Some(block) => Shared::from_counted(Raw { object, block }),
            None => Shared::default(),
        }
    }

    /// Like [Shared::map], but the original handle is kept and a new strong count is acquired
    pub fn clone_map<U: ?Sized>(this: &Self, f: impl FnOnce(&T) -> &U) -> Shared<U> {
        match this.raw {
            Some(raw) => {
                // Safety: the handle's strong count keeps the object alive
                let object = NonNull::from(f(unsafe { raw.object.as_ref() }));
                raw.block.acquire_strong();
                Shared::from_counted(Raw {
                    object,
                    block: raw.block,
                })
            }
            None => Shared::default(),
        }
    }

    /// Attempts to convert the handle, returning the original handle if `f` returns `None`
    ///
    /// A failed conversion never produces a handle with a control block but no object.
    pub fn try_map<U: ?Sized>(
        this: Self,
        f: impl FnOnce(&T) -> Option<&U>,
    ) -> std::result::Result<Shared<U>, Self> {
        let object = match Self::get(&this) {
            Some(object) => match f(object) {
                Some(target) => NonNull::from(target),
                None => return Err(this),
            },
            None => return Ok(Shared::default()),
        };
        match Self::into_block(this) {
            Some(block) => Ok(Shared::from_counted(Raw { object, block })),
            None => Ok(Shared::default()),
        }
    }

    /// Converts the handle into a handle of another pointee type, see [Cast]
    ///
    /// If the object's dynamic type is incompatible then the original handle is returned.
    pub fn cast<U: ?Sized>(this: Self) -> std::result::Result<Shared<U>, Self>
    where
        T: Cast<U>,
    {
        Self::try_map(this, |object| <T as Cast<U>>::cast_ref(object)).inspect_err(|_| {
            log_debug!(
                "rejected conversion from '{}' to '{}'",
                type_name::<T>(),
                type_name::<U>()
            );
        })
    }

    /// Makes a new handle of another pointee type that shares this handle's object
    ///
    /// Returns [Error::IncompatibleType] without touching any counts if the object's dynamic
    /// type is incompatible. Converting an empty handle produces an empty handle.
    pub fn cast_clone<U: ?Sized>(this: &Self) -> Result<Shared<U>>
    where
        T: Cast<U>,
    {
        let Some(raw) = this.raw else {
            return Ok(Shared::default());
        };

        // Safety: the handle's strong count keeps the object alive
        match <T as Cast<U>>::cast_ref(unsafe { raw.object.as_ref() }) {
            Some(target) => {
                let object = NonNull::from(target);
                raw.block.acquire_strong();
                Ok(Shared::from_counted(Raw {
                    object,
                    block: raw.block,
                }))
            }
            None => {
                let error = Error::incompatible_type::<T, U>();
                log_debug!("{error}");
                Err(error)
            }
        }
    }

    /// Exchanges the objects of two handles with different pointee types
    ///
    /// Both conversions are made before either handle is modified, so if either conversion
    /// fails then both handles are left unchanged.
    pub fn swap_cast<U>(this: &mut Self, other: &mut Shared<U>) -> Result<()>
    where
        T: Cast<U>,
        U: ?Sized + Cast<T> + 'static,
    {
        let incoming = Shared::<U>::cast_clone::<T>(other)?;
        let outgoing = Self::cast_clone::<U>(this)?;
        *other = outgoing;
        *this = incoming;
        Ok(())
    }
}

impl<T: ?Sized + SharedFromThis> Shared<T> {
    /// Takes ownership of a boxed self-observing object
    ///
    /// The object's [SelfRef](crate::SelfRef) is pointed at the new control block, so that
    /// [SharedFromThis::shared_from_this] returns handles that share it.
    pub fn from_box_observed(boxed: Box<T>) -> Self {
        Self::observe(Self::from_box(boxed))
    }

    /// Takes ownership of a self-observing object
    ///
    /// If the object is already owned by a live control block, then a handle sharing that block
    /// is returned and `deleter` and `storage` are dropped unused. Otherwise a new control block
    /// is made and registered with the object.
    ///
    /// # Safety
    ///
    /// See [Shared::from_raw_in].
    pub unsafe fn from_raw_observed_in<D, S>(
        object: NonNull<T>,
        deleter: D,
        storage: S,
    ) -> Result<Self>
    where
        D: Deleter<T> + 'static,
        S: Storage + 'static,
    {
        let existing = unsafe { object.as_ref() }.shared_from_this();
        if Self::use_count(&existing) != 0 {
            log_trace!(
                "{} at {} is already owned, sharing its block",
                type_name::<T>(),
                Self::address(&existing)
            );
            return Ok(existing);
        }

        let shared = unsafe { Self::from_raw_in(object, deleter, storage) }?;
        Ok(Self::observe(shared))
    }

    fn observe(this: Self) -> Self {
        if let Some(object) = Self::get(&this) {
            object.self_ref().install(&this);
        }
        this
    }
}

impl<T: SharedFromThis> Shared<T> {
    /// Makes a new `Shared` for a self-observing object, stored inside its control block
    pub fn new_observed(value: T) -> Self {
        Self::observe(Self::new(value))
    }

    /// Makes a new `Shared` for a self-observing object, using the given [Storage]
    pub fn try_new_observed_in<S>(value: T, storage: S) -> Result<Self>
    where
        S: Storage + 'static,
    {
        Self::try_new_in(value, storage).map(Self::observe)
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // Safety: the handle owns one of the block's strong counts
            unsafe { raw.block.release_strong() }
        }
    }
}

impl<T: ?Sized> Default for Shared<T> {
    /// Makes an empty handle, without a control block
    fn default() -> Self {
        Self {
            raw: None,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.block.acquire_strong();
        }
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        let mut copy = source.clone();
        Self::swap(self, &mut copy);
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match Self::get(self) {
            Some(object) => object,
            None => panic!("Attempted to dereference an empty Shared<{}>", type_name::<T>()),
        }
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for Shared<T> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(object) => f.debug_tuple("Shared").field(&object).finish(),
            None => f.write_str("Shared(<empty>)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw {
            Some(raw) => fmt::Pointer::fmt(&raw.object.as_ptr(), f),
            None => fmt::Pointer::fmt(&ptr::null::<u8>(), f),
        }
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::get(self) == Self::get(other)
    }
}

impl<T: ?Sized + Eq> Eq for Shared<T> {}

impl<T: ?Sized + Hash> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::get(self).hash(state)
    }
}

impl<T: ?Sized + Ord> Ord for Shared<T> {
    fn cmp(&self, other: &Shared<T>) -> Ordering {
        Self::get(self).cmp(&Self::get(other))
    }
}

impl<T: ?Sized + PartialOrd> PartialOrd for Shared<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Self::get(self).partial_cmp(&Self::get(other))
    }
}
