use crate::{Shared, Weak};
use std::{cell::RefCell, fmt};

/// Allows an object to make new strong handles to itself
///
/// Implementers embed a [SelfRef] and return it from [SharedFromThis::self_ref]. When the object
/// is placed under shared ownership with one of the `_observed` constructors (e.g.
/// [Shared::new_observed] or [Shared::from_raw_observed_in]), the `SelfRef` is pointed at the new
/// control block. Handles returned by [SharedFromThis::shared_from_this] then share that block.
///
/// ```
/// use sharedptr::{SelfRef, Shared, SharedFromThis};
///
/// struct Node {
///     name: String,
///     this: SelfRef<Node>,
/// }
///
/// impl SharedFromThis for Node {
///     fn self_ref(&self) -> &SelfRef<Self> {
///         &self.this
///     }
/// }
///
/// let node = Shared::new_observed(Node {
///     name: "root".into(),
///     this: SelfRef::new(),
/// });
///
/// let again = node.shared_from_this();
/// assert_eq!(again.name, "root");
/// assert_eq!(Shared::use_count(&node), 2);
/// assert!(Shared::ptr_eq(&node, &again));
/// ```
pub trait SharedFromThis: 'static {
    /// Returns the object's [SelfRef]
    fn self_ref(&self) -> &SelfRef<Self>;

    /// Returns a new strong handle that shares the object's control block
    ///
    /// The returned handle is empty if the object isn't currently owned by a [Shared] handle.
    fn shared_from_this(&self) -> Shared<Self> {
        self.self_ref().lock()
    }

    /// Returns a new weak handle that shares the object's control block
    fn weak_from_this(&self) -> Weak<Self> {
        self.self_ref().weak.borrow().clone()
    }
}

/// An object's weak observation of its own control block, see [SharedFromThis]
pub struct SelfRef<T: ?Sized> {
    weak: RefCell<Weak<T>>,
}

impl<T: ?Sized> SelfRef<T> {
    /// Makes a new `SelfRef` that isn't yet associated with a control block
    pub fn new() -> Self {
        Self {
            weak: RefCell::new(Weak::new()),
        }
    }

    fn lock(&self) -> Shared<T> {
        self.weak.borrow().lock()
    }

    /// Starts observing the block of the given handle
    ///
    /// An observation that's still live is kept, so that all handles that are made for the
    /// object share the first block.
    pub(crate) fn install(&self, shared: &Shared<T>) {
        let mut weak = self.weak.borrow_mut();
        if weak.expired() {
            *weak = Shared::downgrade(shared);
        }
    }
}

impl<T: ?Sized> Default for SelfRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for SelfRef<T> {
    /// Makes a new unassociated `SelfRef`, a cloned object is owned separately from the original
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for SelfRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfRef")
            .field("expired", &self.weak.borrow().expired())
            .finish()
    }
}
