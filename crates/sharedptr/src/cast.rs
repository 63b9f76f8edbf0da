use std::any::Any;

/// Converts a reference to a managed object into a reference of another type
///
/// Implementing `Cast` enables conversions between handles with different pointee types via
/// [Shared::cast](crate::Shared::cast), [Shared::cast_clone](crate::Shared::cast_clone),
/// [Shared::swap_cast](crate::Shared::swap_cast) and [Weak::cast](crate::Weak::cast).
///
/// Returning `None` rejects the conversion, e.g. when a trait object's dynamic type doesn't
/// match the requested type. The returned reference must be reachable from `self`, the
/// converted handle keeps `self`'s allocation alive.
///
/// `dyn Any` can be converted into any concrete `'static` type:
///
/// ```
/// use sharedptr::Shared;
/// use std::any::Any;
///
/// fn as_any(n: &u8) -> &dyn Any {
///     n
/// }
///
/// let any: Shared<dyn Any> = Shared::map(Shared::new(99u8), as_any);
///
/// let any = Shared::cast::<String>(any).unwrap_err();
/// let number = Shared::cast::<u8>(any).unwrap();
/// assert_eq!(*number, 99);
/// ```
pub trait Cast<U: ?Sized> {
    /// Returns `self` as a `U`, or `None` if the conversion isn't possible
    fn cast_ref(&self) -> Option<&U>;
}

impl<U: Any> Cast<U> for dyn Any {
    fn cast_ref(&self) -> Option<&U> {
        self.downcast_ref()
    }
}
