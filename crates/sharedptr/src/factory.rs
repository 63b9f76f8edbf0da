//! Free functions for creating shared objects

use crate::{Deleter, Result, Shared, Storage};
use std::ptr::NonNull;

/// Makes a new [Shared] with the value stored inside a single combined allocation
///
/// ```
/// let shared = sharedptr::make_shared(vec![1, 2, 3]);
/// assert_eq!(shared.len(), 3);
/// ```
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

/// Makes a new [Shared] in a combined allocation provided by the given [Storage]
pub fn allocate_shared<T, S>(storage: S, value: T) -> Result<Shared<T>>
where
    S: Storage + 'static,
{
    Shared::try_new_in(value, storage)
}

/// Makes a new [Shared] in a combined allocation, constructing the value after allocating
///
/// If `init` fails, the allocation is released and [Error::Construction](crate::Error) is
/// returned.
///
/// ```
/// use sharedptr::{Error, Global, make_shared_with};
///
/// let parsed = make_shared_with(Global, || "42".parse::<u32>());
/// assert_eq!(*parsed.unwrap(), 42);
///
/// let failed = make_shared_with(Global, || "forty-two".parse::<u32>());
/// assert!(matches!(failed, Err(Error::Construction(_))));
/// ```
pub fn make_shared_with<T, S, F, E>(storage: S, init: F) -> Result<Shared<T>>
where
    S: Storage + 'static,
    F: FnOnce() -> std::result::Result<T, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Shared::try_new_with_in(init, storage)
}

/// Makes a new [Shared] that takes ownership of an existing object
///
/// The object is destroyed by `deleter`, while the control block is allocated by `storage`.
///
/// # Safety
///
/// See [Shared::from_raw_in].
pub unsafe fn create_owned<T, D, S>(object: NonNull<T>, deleter: D, storage: S) -> Result<Shared<T>>
where
    T: ?Sized,
    D: Deleter<T> + 'static,
    S: Storage + 'static,
{
    unsafe { Shared::from_raw_in(object, deleter, storage) }
}
