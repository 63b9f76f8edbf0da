use crate::{Cast, Error, Result, Shared, shared::Raw};
use std::{
    any::type_name,
    fmt,
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
};

/// A non-owning handle that observes an object managed by [Shared] handles
///
/// A `Weak` keeps the object's control block alive, but not the object itself. Use
/// [Weak::lock] or [Weak::upgrade] to get temporary access to the object.
pub struct Weak<T: ?Sized> {
    raw: Option<Raw<T>>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> Weak<T> {
    /// Makes an empty `Weak` that doesn't observe anything
    pub fn new() -> Self {
        Self {
            raw: None,
            _marker: PhantomData,
        }
    }

    // Wraps raw parts for which a weak count has already been acquired
    fn from_counted(raw: Raw<T>) -> Self {
        Self {
            raw: Some(raw),
            _marker: PhantomData,
        }
    }

    /// Makes a new strong handle to the observed object
    ///
    /// If the object has already been destroyed (or if this handle is empty), then an empty
    /// [Shared] is returned and the counts are left untouched.
    pub fn lock(&self) -> Shared<T> {
        match self.raw {
            Some(raw) if raw.block.strong_count() > 0 => {
                raw.block.acquire_strong();
                Shared::from_counted(raw)
            }
            _ => Shared::default(),
        }
    }

    /// Makes a new strong handle to the observed object, if it's still alive
    pub fn upgrade(&self) -> Option<Shared<T>> {
        let shared = self.lock();
        if Shared::is_empty(&shared) {
            None
        } else {
            Some(shared)
        }
    }

    /// Returns true if the observed object has been destroyed, or if this handle is empty
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Returns the number of strong handles keeping the object alive
    pub fn use_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.strong_count())
    }

    /// Returns the number of weak handles observing the object, including this one
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.block.weak_count())
    }

    /// Exchanges the observed objects of two handles
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Returns true if the two handles observe the same object
    ///
    /// The object isn't accessed, so this can be used after the object has expired. Handles
    /// only compare equal if they share a control block, the address of an expired object may
    /// have been reused by another one.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.raw, other.raw) {
            (Some(a), Some(b)) => {
                a.block.ptr_eq(&b.block) && ptr::addr_eq(a.object.as_ptr(), b.object.as_ptr())
            }
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized + 'static> Weak<T> {
    /// Makes a new `Weak` of another pointee type that observes the same object, see [Cast]
    ///
    /// The conversion has to inspect the object, so [Error::Expired] is returned if it has
    /// already been destroyed. Converting an empty handle produces an empty handle.
    pub fn cast<U: ?Sized>(&self) -> Result<Weak<U>>
    where
        T: Cast<U>,
    {
        if self.raw.is_none() {
            return Ok(Weak::new());
        }

        let shared = self.upgrade().ok_or(Error::Expired)?;
        let converted = Shared::cast_clone::<U>(&shared)?;
        Ok(Shared::downgrade(&converted))
    }

    /// Converts the handle into a `Weak` of another pointee type, transferring its weak count
    ///
    /// The original handle is returned if the object has expired or if its dynamic type is
    /// incompatible. Converting an empty handle produces an empty handle.
    pub fn cast_into<U: ?Sized>(self) -> std::result::Result<Weak<U>, Self>
    where
        T: Cast<U>,
    {
        let Some(raw) = self.raw else {
            return Ok(Weak::new());
        };
        if raw.block.strong_count() == 0 {
            log_debug!("unable to convert an expired '{}'", type_name::<T>());
            return Err(self);
        }

        // Safety: the strong count is non-zero, so the object is alive
        let object = match <T as Cast<U>>::cast_ref(unsafe { raw.object.as_ref() }) {
            Some(target) => NonNull::from(target),
            None => {
                log_debug!(
                    "rejected conversion from '{}' to '{}'",
                    type_name::<T>(),
                    type_name::<U>()
                );
                return Err(self);
            }
        };

        // The weak count moves to the converted handle
        mem::forget(self);
        Ok(Weak::from_counted(Raw {
            object,
            block: raw.block,
        }))
    }

    /// Exchanges the observed objects of two handles with different pointee types
    ///
    /// Both conversions are made before either handle is modified, so if either conversion
    /// fails then both handles are left unchanged.
    pub fn swap_cast<U>(&mut self, other: &mut Weak<U>) -> Result<()>
    where
        T: Cast<U>,
        U: ?Sized + Cast<T> + 'static,
    {
        let incoming = other.cast::<T>()?;
        let outgoing = self.cast::<U>()?;
        *other = outgoing;
        *self = incoming;
        Ok(())
    }
}

impl<T: ?Sized> From<&Shared<T>> for Weak<T> {
    fn from(shared: &Shared<T>) -> Self {
        let raw = Shared::raw(shared);
        if let Some(raw) = raw {
            raw.block.acquire_weak();
        }
        Self {
            raw,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for Weak<T> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // Safety: the handle owns one of the block's weak counts
            unsafe { raw.block.release_weak() }
        }
    }
}

impl<T: ?Sized> Default for Weak<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.block.acquire_weak();
        }
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        let mut copy = source.clone();
        self.swap(&mut copy);
    }
}

impl<T: ?Sized> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_weak() {
        let weak = Weak::<String>::new();
        assert!(weak.expired());
        assert_eq!(weak.use_count(), 0);
        assert_eq!(weak.weak_count(), 0);
        assert!(weak.upgrade().is_none());
        assert!(Shared::is_empty(&weak.lock()));
    }

    #[test]
    fn lock_shares_the_block() {
        let shared = Shared::new(String::from("x"));
        let weak = Shared::downgrade(&shared);
        let locked = weak.lock();

        assert!(Shared::ptr_eq(&shared, &locked));
        assert_eq!(Shared::use_count(&shared), 2);
        assert_eq!(weak.weak_count(), 1);
    }

    #[test]
    fn clone_from_swaps_observation() {
        let a = Shared::new(1);
        let b = Shared::new(2);
        let mut weak_a = Shared::downgrade(&a);
        let weak_b = Shared::downgrade(&b);

        weak_a.clone_from(&weak_b);
        assert!(weak_a.ptr_eq(&weak_b));
        assert_eq!(Shared::weak_count(&a), 0);
        assert_eq!(Shared::weak_count(&b), 2);
    }
}
